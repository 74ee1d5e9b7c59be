mod csv;
pub use csv::*;

use std::f64::consts::PI;

/// Phase samples of one junction, aligned with `SimulationTrace::time_steps`
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub name: String,
    pub phases: Vec<f64>,
}

/// Per-junction phase traces of one simulation run.
///
/// Phases are in radians, one `2π` step is one switch of the junction, so
/// the cumulative switch count at a time is `phase / 2π`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationTrace {
    time_steps: Vec<f64>,
    traces: Vec<Trace>,
}

impl SimulationTrace {
    pub fn new(time_steps: Vec<f64>) -> Self {
        Self { time_steps, traces: vec![] }
    }

    /// Add a junction trace, its length must match the time axis
    pub fn push_trace(&mut self, name: impl Into<String>, phases: Vec<f64>) -> bool {
        if phases.len() != self.time_steps.len() {
            return false;
        }
        self.traces.push(Trace { name: name.into(), phases });
        true
    }

    pub fn time_steps(&self) -> &[f64] {
        &self.time_steps
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Junction names compare case-insensitively, and `.` and `|` are the
    /// same hierarchy separator
    pub fn trace(&self, name: &str) -> Option<&Trace> {
        let key = normalize_name(name);
        self.traces.iter().find(|t| normalize_name(&t.name) == key)
    }

    /// Phase of `name` at the last time step at or before `time`.
    /// No interpolation.
    pub fn phase_at(&self, name: &str, time: f64) -> Option<f64> {
        let trace = self.trace(name)?;
        let index = self.time_steps.partition_point(|&t| t <= time);
        if index == 0 {
            return None;
        }
        trace.phases.get(index - 1).copied()
    }

    pub fn switch_count_at(&self, name: &str, time: f64) -> Option<f64> {
        self.phase_at(name, time).map(|phase| phase / (2.0 * PI))
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_uppercase().replace('.', "|")
}
