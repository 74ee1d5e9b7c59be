use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("read spec file '{0}' failed: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("spec file doesn't have enough lines, expect a name line, a calibration line and at least one data line")]
    NotEnoughLines,

    #[error("spec file should start with: 'time' names...")]
    MissingTimeColumn,

    #[error("spec file must specify at least one junction")]
    NoJunctions,

    #[error("line {line}: expect {expected} values but got {found}")]
    ColumnCountMismatch { line: usize, expected: usize, found: usize },

    #[error("line {line}: expected a real number specifying time, got '{token}'")]
    InvalidTime { line: usize, token: String },

    #[error("line {line}: number of phase jumps should be an integer, got '{token}'")]
    InvalidCount { line: usize, token: String },

    #[error("line {line}: time '{time}' is not after the previous line's '{previous}'")]
    NonIncreasingTime { line: usize, time: f64, previous: f64 },

    #[error("line {line}: switch count of '{junction}' drops from {previous} to {count}")]
    NonMonotonicCount { line: usize, junction: String, previous: i64, count: i64 },
}
