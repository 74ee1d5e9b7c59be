use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use crate::{
    config::{ConfigError, YieldConfig},
    params::{ParameterAssignment, ParameterSpace},
    JosimToolsResult,
};
use super::{first_error, AnalysisError, Evaluator, PartialResult};

#[derive(Debug, Clone, PartialEq)]
pub struct YieldSettings {
    pub num_samples: usize,
    pub seed: Option<u64>,
    pub keep_samples: bool,
}

impl From<&YieldConfig> for YieldSettings {
    fn from(config: &YieldConfig) -> Self {
        Self { num_samples: config.num_samples, seed: config.seed, keep_samples: config.keep_samples }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldSample {
    pub index: usize,
    pub assignment: ParameterAssignment,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldResult {
    pub passes: usize,
    pub total: usize,
    /// Base seed, sample `i` was drawn with `seed + i`
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<YieldSample>>,
}

impl YieldResult {
    pub fn fraction(&self) -> f64 {
        self.passes as f64 / self.total as f64
    }

    pub fn percentage(&self) -> f64 {
        self.fraction() * 100.0
    }
}

/// Monte-Carlo estimate of the passing fraction under the parameter
/// distributions
pub struct YieldAnalysis<'a> {
    evaluator: &'a Evaluator,
    space: &'a ParameterSpace,
}

impl<'a> YieldAnalysis<'a> {
    pub fn new(evaluator: &'a Evaluator, space: &'a ParameterSpace) -> Self {
        Self { evaluator, space }
    }

    pub fn run(&self, settings: &YieldSettings) -> JosimToolsResult<YieldResult> {
        if settings.num_samples == 0 {
            return Err(ConfigError::invalid("yield.num_samples", "yield over zero samples is undefined").into());
        }

        let seed = settings.seed.unwrap_or_else(|| rand::rng().random());
        info!("yield analysis over {} samples, seed {}", settings.num_samples, seed);

        let results: Vec<JosimToolsResult<YieldSample>> = (0..settings.num_samples)
            .into_par_iter()
            .map(|index| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
                let assignment = self.space.sample(&mut rng);
                let passed = self.evaluator.check(&assignment)?;
                debug!("sample {}: {}", index, if passed { "pass" } else { "fail" });
                Ok(YieldSample { index, assignment, passed })
            })
            .collect();

        let mut samples = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(sample) => samples.push(sample),
                Err(e) => errors.push(e),
            }
        }

        let passes = samples.iter().filter(|s| s.passed).count();
        let total = samples.len();

        if let Some(err) = first_error(errors) {
            return Err(AnalysisError::aborted(PartialResult::Yield { passes, total }, err).into());
        }

        info!("yield {} / {}", passes, total);
        Ok(YieldResult {
            passes,
            total,
            seed,
            samples: settings.keep_samples.then_some(samples),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use crate::{params::{Distribution, Parameter}, JosimToolsError};
    use super::super::testing::*;
    use super::*;

    fn space() -> ParameterSpace {
        ParameterSpace::new([
            Parameter::new("Itotal".into(), 1.0).with_distribution(Distribution::Uniform { low: 0.5, high: 1.5 }),
            Parameter::new("Btotal".into(), 1.0),
        ]).unwrap()
    }

    fn settings(num_samples: usize) -> YieldSettings {
        YieldSettings { num_samples, seed: Some(42), keep_samples: true }
    }

    #[test]
    fn test_zero_samples_rejected() {
        let adapter = Arc::new(WindowAdapter::new(&[]));
        let evaluator = evaluator(adapter.clone());
        let space = space();

        let err = YieldAnalysis::new(&evaluator, &space).run(&settings(0)).unwrap_err();
        assert!(matches!(err, JosimToolsError::Config(ConfigError::InvalidValue { .. })));
        assert_eq!(adapter.calls(), 0);
    }

    #[test]
    fn test_yield_is_reproducible() {
        let adapter = Arc::new(WindowAdapter::new(&[("Itotal", 0.75, 1.2)]));
        let evaluator = evaluator(adapter);
        let space = space();
        let analysis = YieldAnalysis::new(&evaluator, &space);

        let first = analysis.run(&settings(200)).unwrap();
        let second = analysis.run(&settings(200)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total, 200);

        // window covers 45 % of the uniform range
        assert!(first.passes > 60 && first.passes < 120);

        let samples = first.samples.unwrap();
        for sample in samples.iter() {
            let value = sample.assignment.get("Itotal").unwrap();
            assert_eq!(sample.passed, (0.75..=1.2).contains(&value));
            assert_eq!(sample.assignment.get("Btotal"), Some(1.0));
        }
    }

    #[test]
    fn test_samples_dropped_unless_kept() {
        let evaluator = evaluator(Arc::new(WindowAdapter::new(&[])));
        let space = space();
        let mut settings = settings(10);
        settings.keep_samples = false;

        let result = YieldAnalysis::new(&evaluator, &space).run(&settings).unwrap();
        assert_eq!(result.passes, 10);
        assert!(result.samples.is_none());
        approx::assert_relative_eq!(result.percentage(), 100.0);
    }

    #[test]
    fn test_fatal_error_keeps_counts() {
        let mut adapter = WindowAdapter::new(&[]);
        adapter.fatal_above = Some(("Itotal".into(), 1.4));
        let evaluator = evaluator(Arc::new(adapter));
        let space = space();

        let err = YieldAnalysis::new(&evaluator, &space).run(&settings(100)).unwrap_err();
        match err {
            JosimToolsError::Analysis(AnalysisError::Aborted { partial: PartialResult::Yield { passes, total }, .. }) => {
                assert!(total < 100);
                assert_eq!(passes, total);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
