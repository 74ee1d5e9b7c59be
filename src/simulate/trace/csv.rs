//! JoSIM CSV output parsing.
//!
//! The simulator writes one header line followed by one row per time step:
//!
//! ```csv
//! time,P(B1|X1),P(B2|X1)
//! 0.000000e+00,0.000000e+00,0.000000e+00
//! 2.500000e-13,1.234567e-03,2.345678e-03
//! ```

use std::path::Path;
use super::{normalize_name, SimulationTrace};
use crate::simulate::SimulateError;

/// Strip the `P(...)` phase wrapper JoSIM puts around probe names
pub fn column_probe_name(column: &str) -> String {
    let column = column.trim().trim_matches('"');
    let upper = column.to_ascii_uppercase();
    let inner = if (upper.starts_with("P(") || upper.starts_with("PHASE(")) && upper.ends_with(')') {
        let open = column.find('(').map(|i| i + 1).unwrap_or(0);
        &column[open..column.len() - 1]
    } else {
        column
    };
    normalize_name(inner)
}

/// Parse simulator output, keeping only `probes` in the order given.
/// Every probe must be present.
pub fn parse_josim_csv(content: &str, probes: &[String]) -> Result<SimulationTrace, SimulateError> {
    let mut lines = content.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().ok_or(SimulateError::EmptyOutput)?;
    let columns: Vec<String> = header.split(',').map(column_probe_name).collect();

    if columns.first().map(|c| c.as_str()) != Some("TIME") {
        return Err(SimulateError::UnparseableOutput {
            line: 1,
            reason: format!("expected 'time' as first column, got '{}'", header),
        });
    }

    // column index of each probe
    let mut indices = Vec::with_capacity(probes.len());
    for probe in probes {
        let key = normalize_name(probe);
        match columns.iter().position(|c| *c == key) {
            Some(index) => indices.push(index),
            None => return Err(SimulateError::ProbeNotFound { probe: probe.clone(), columns: columns[1..].join(", ") }),
        }
    }

    let mut time_steps = vec![];
    let mut phases = vec![vec![]; probes.len()];
    for (line_index, line) in lines {
        let values = line
            .split(',')
            .map(|token| token.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SimulateError::UnparseableOutput { line: line_index + 1, reason: e.to_string() })?;

        if values.len() != columns.len() {
            return Err(SimulateError::UnparseableOutput {
                line: line_index + 1,
                reason: format!("expected {} values but got {}", columns.len(), values.len()),
            });
        }

        time_steps.push(values[0]);
        for (phase, &index) in phases.iter_mut().zip(indices.iter()) {
            phase.push(values[index]);
        }
    }

    if time_steps.is_empty() {
        return Err(SimulateError::EmptyOutput);
    }

    let mut trace = SimulationTrace::new(time_steps);
    for (probe, phase) in probes.iter().zip(phases) {
        trace.push_trace(probe.clone(), phase);
    }
    Ok(trace)
}

pub fn load_josim_csv(path: &Path, probes: &[String]) -> Result<SimulationTrace, SimulateError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SimulateError::ReadOutput(path.to_path_buf(), e))?;
    parse_josim_csv(&content, probes)
}
