mod error;
mod spec;
pub use error::*;
pub use spec::*;

use std::f64::consts::PI;
use tracing::debug;
use crate::simulate::SimulationTrace;

/// How far one junction strayed from the spec
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionDeviation {
    pub name: String,
    /// Largest distance between sampled and expected switches, in units of 2π
    pub max_deviation: f64,
    /// First spec time at which the junction exceeded the threshold
    pub failed_at: Option<f64>,
}

impl JunctionDeviation {
    pub fn passed(&self) -> bool {
        self.failed_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub passed: bool,
    pub junctions: Vec<JunctionDeviation>,
}

impl VerificationResult {
    pub fn worst(&self) -> Option<&JunctionDeviation> {
        self.junctions.iter().max_by(|a, b| a.max_deviation.total_cmp(&b.max_deviation))
    }
}

/// Checks simulated phase traces against a spec file
#[derive(Debug, Clone)]
pub struct SpecVerifier {
    spec: SpecFile,
    threshold: f64,
}

impl SpecVerifier {
    pub const DEFAULT_THRESHOLD: f64 = 0.05;

    pub fn new(spec: SpecFile, threshold: f64) -> Self {
        Self { spec, threshold }
    }

    pub fn spec(&self) -> &SpecFile {
        &self.spec
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Junctions the simulator must print, in spec order
    pub fn probes(&self) -> Vec<String> {
        self.spec.names().to_vec()
    }

    pub fn verify(&self, trace: &SimulationTrace) -> VerificationResult {
        let calibration = self.spec.calibration();
        let mut junctions = Vec::with_capacity(self.spec.names().len());

        for (index, name) in self.spec.names().iter().enumerate() {
            let mut deviation = JunctionDeviation { name: name.clone(), max_deviation: 0.0, failed_at: None };

            let origin = trace.phase_at(name, calibration.time);
            for entry in self.spec.checks() {
                let difference = match (origin, trace.phase_at(name, entry.time)) {
                    (Some(origin), Some(phase)) => {
                        let sampled = (phase - origin) / (2.0 * PI);
                        let expected = (entry.counts[index] - calibration.counts[index]) as f64;
                        (sampled - expected).abs()
                    }
                    _ => f64::INFINITY,
                };

                if difference > deviation.max_deviation {
                    deviation.max_deviation = difference;
                }
                if difference > self.threshold && deviation.failed_at.is_none() {
                    debug!("junction '{}' off by {:.3} flux quanta at {:e}", name, difference, entry.time);
                    deviation.failed_at = Some(entry.time);
                }
            }

            junctions.push(deviation);
        }

        let passed = junctions.iter().all(JunctionDeviation::passed);
        VerificationResult { passed, junctions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = "time B1 B2\n0 0 0\n100e-12 1 1\n200e-12 2 1\n";

    fn verifier() -> SpecVerifier {
        SpecVerifier::new(SpecFile::parse(SPEC).unwrap(), SpecVerifier::DEFAULT_THRESHOLD)
    }

    fn trace(b1: &[f64], b2: &[f64]) -> SimulationTrace {
        let mut trace = SimulationTrace::new(vec![0.0, 50e-12, 100e-12, 150e-12, 200e-12]);
        trace.push_trace("B1", b1.iter().map(|n| n * 2.0 * PI).collect());
        trace.push_trace("B2", b2.iter().map(|n| n * 2.0 * PI).collect());
        trace
    }

    #[test]
    fn test_ideal_trace_passes() {
        let verifier = verifier();
        let result = verifier.verify(&verifier.spec().ideal_trace());
        assert!(result.passed);
        assert!(result.junctions.iter().all(|j| j.max_deviation < 1e-12));
    }

    #[test]
    fn test_calibration_offset_is_removed() {
        // both junctions already switched once before the calibration time
        let result = verifier().verify(&trace(&[1.0, 1.5, 2.0, 2.5, 3.0], &[1.0, 1.0, 2.0, 2.0, 2.0]));
        assert!(result.passed);
    }

    #[test]
    fn test_threshold() {
        let within = trace(&[0.0, 0.5, 1.04, 1.5, 2.0], &[0.0, 0.5, 1.0, 1.0, 1.0]);
        assert!(verifier().verify(&within).passed);

        let outside = trace(&[0.0, 0.5, 1.06, 1.5, 2.0], &[0.0, 0.5, 1.0, 1.0, 1.0]);
        let result = verifier().verify(&outside);
        assert!(!result.passed);
        assert_eq!(result.junctions[0].failed_at, Some(100e-12));
        assert!(result.junctions[1].passed());
        approx::assert_abs_diff_eq!(result.worst().unwrap().max_deviation, 0.06, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_switch_fails() {
        let result = verifier().verify(&trace(&[0.0, 0.5, 1.0, 1.5, 2.0], &[0.0, 0.0, 0.0, 0.0, 0.0]));
        assert!(!result.passed);
        assert_eq!(result.worst().unwrap().name, "B2");
    }

    #[test]
    fn test_missing_junction_fails() {
        let mut trace = SimulationTrace::new(vec![0.0, 100e-12, 200e-12]);
        trace.push_trace("B1", vec![0.0, 2.0 * PI, 4.0 * PI]);
        let result = verifier().verify(&trace);
        assert!(!result.passed);
        assert!(result.junctions[1].max_deviation.is_infinite());
    }

    #[test]
    fn test_no_interpolation() {
        // sample between steps takes the earlier value
        let mut trace = SimulationTrace::new(vec![0.0, 90e-12, 110e-12, 190e-12]);
        trace.push_trace("B1", vec![0.0, 0.0, 2.0 * PI, 4.0 * PI]);
        trace.push_trace("B2", vec![0.0, 2.0 * PI, 2.0 * PI, 2.0 * PI]);
        let result = verifier().verify(&trace);
        assert!(!result.passed);
        assert_eq!(result.junctions[0].failed_at, Some(100e-12));
    }
}
