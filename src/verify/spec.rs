use std::f64::consts::PI;
use std::path::Path;
use crate::simulate::SimulationTrace;
use super::SpecError;

/// One data line of a spec file
#[derive(Debug, Clone, PartialEq)]
pub struct SpecEntry {
    pub time: f64,
    /// Cumulative switch count per junction, in name line order
    pub counts: Vec<i64>,
}

/// Expected switching behaviour of a circuit.
///
/// ```text
/// time     B1|X1  B2|X1
/// 0        0      0
/// 100e-12  1      1
/// 200e-12  2      1
/// ```
///
/// The first data line calibrates every junction, later lines give counts
/// relative to the same origin. Times strictly increase and counts never
/// decrease.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFile {
    names: Vec<String>,
    entries: Vec<SpecEntry>,
}

impl SpecFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SpecError::Read(path.to_path_buf(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SpecError> {
        // (1-based line number, tokens), blank lines skipped
        let lines: Vec<(usize, Vec<&str>)> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| (index + 1, line.split_whitespace().collect()))
            .collect();

        if lines.len() <= 2 {
            return Err(SpecError::NotEnoughLines);
        }

        let (_, name_line) = &lines[0];
        if name_line[0] != "time" {
            return Err(SpecError::MissingTimeColumn);
        }
        if name_line.len() < 2 {
            return Err(SpecError::NoJunctions);
        }
        let names: Vec<String> = name_line[1..].iter().map(|s| s.to_string()).collect();
        let expected = name_line.len();

        let mut entries: Vec<SpecEntry> = Vec::with_capacity(lines.len() - 1);
        for (line, tokens) in lines[1..].iter() {
            let line = *line;
            if tokens.len() != expected {
                return Err(SpecError::ColumnCountMismatch { line, expected, found: tokens.len() });
            }

            let time: f64 = tokens[0]
                .parse()
                .map_err(|_| SpecError::InvalidTime { line, token: tokens[0].to_string() })?;
            if !time.is_finite() {
                return Err(SpecError::InvalidTime { line, token: tokens[0].to_string() });
            }

            let counts = tokens[1..]
                .iter()
                .map(|token| token.parse::<i64>().map_err(|_| SpecError::InvalidCount { line, token: token.to_string() }))
                .collect::<Result<Vec<_>, _>>()?;

            if let Some(previous) = entries.last() {
                if time <= previous.time {
                    return Err(SpecError::NonIncreasingTime { line, time, previous: previous.time });
                }
                for ((name, &count), &before) in names.iter().zip(counts.iter()).zip(previous.counts.iter()) {
                    if count < before {
                        return Err(SpecError::NonMonotonicCount { line, junction: name.clone(), previous: before, count });
                    }
                }
            }

            entries.push(SpecEntry { time, counts });
        }

        Ok(Self { names, entries })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn entries(&self) -> &[SpecEntry] {
        &self.entries
    }

    pub fn calibration(&self) -> &SpecEntry {
        &self.entries[0]
    }

    /// Data lines after the calibration line
    pub fn checks(&self) -> &[SpecEntry] {
        &self.entries[1..]
    }

    /// The trace a circuit behaving exactly as specified would produce
    pub fn ideal_trace(&self) -> SimulationTrace {
        let mut trace = SimulationTrace::new(self.entries.iter().map(|e| e.time).collect());
        for (index, name) in self.names.iter().enumerate() {
            let phases = self.entries.iter().map(|e| e.counts[index] as f64 * 2.0 * PI).collect();
            trace.push_trace(name.clone(), phases);
        }
        trace
    }
}
