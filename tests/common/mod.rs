#![allow(dead_code)]

use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use josim_tools::{
    config::Config,
    params::ParameterAssignment,
    simulate::{SimulateResult, SimulationAdapter, SimulationTrace},
};

pub fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data").join(name)
}

/// Config for the splitter fixture with `extra` appended
pub fn config(mode: &str, extra: &str) -> Config {
    let content = format!(
        r#"
mode = "{}"

[verify]
method = "spec_file"
circuit = "{}"
file = "{}"

[parameters]
Btotal = {{ nominal = 1.0 }}
Ltotal = {{ nominal = 1.0 }}
Itotal = {{ nominal = 1.0 }}
{}
"#,
        mode,
        data("splitter.cir").display(),
        data("splitter.spec").display(),
        extra,
    );
    Config::parse(&content).unwrap()
}

/// In process simulator with the same pass windows as `fake_josim.sh`
pub struct SplitterModel {
    calls: AtomicUsize,
}

impl SplitterModel {
    pub const WINDOWS: [(&'static str, f64, f64); 3] = [("Btotal", 0.6, 1.5), ("Ltotal", 0.3, 1.7), ("Itotal", 0.75, 1.2)];

    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn passes(assignment: &ParameterAssignment) -> bool {
        Self::WINDOWS.iter().all(|(name, low, high)| {
            assignment.get(name).is_none_or(|v| *low <= v && v <= *high)
        })
    }
}

impl SimulationAdapter for SplitterModel {
    fn run(&self, _: &Path, assignment: &ParameterAssignment) -> SimulateResult<SimulationTrace> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let steps: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let mut trace = SimulationTrace::new(steps.iter().map(|i| i * 50e-12).collect());
        if Self::passes(assignment) {
            trace.push_trace("B1|X1", steps.iter().map(|i| i * PI).collect());
            trace.push_trace("B2|X1", steps.iter().map(|i| i.min(2.0) * PI).collect());
        } else {
            trace.push_trace("B1|X1", vec![0.0; 5]);
            trace.push_trace("B2|X1", vec![0.0; 5]);
        }
        Ok(trace)
    }
}
