use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SimulateError {
    #[error("execute command '{0}' failed for '{1}'")]
    ExecuteError(String, String),

    #[error("command '{0}' returns '{1}'")]
    ExitStatus(String, i32),

    #[error("command '{0}' quit unnormal")]
    Killed(String),

    #[error("command '{0}' timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("read circuit '{0}' failed: {1}")]
    ReadCircuit(PathBuf, std::io::Error),

    #[error("write simulate input failed: {0}")]
    WriteInput(std::io::Error),

    #[error("read simulate output '{0}' failed: {1}")]
    ReadOutput(PathBuf, std::io::Error),

    #[error("parameter '{0}' has no .param line in the circuit")]
    UnknownNetlistParameter(String),

    #[error("simulate output is empty")]
    EmptyOutput,

    #[error("unparseable simulate output at line {line}: {reason}")]
    UnparseableOutput { line: usize, reason: String },

    #[error("probe '{probe}' not found in simulate output, got [{columns}]")]
    ProbeNotFound { probe: String, columns: String },
}

impl SimulateError {
    /// A non-fatal error only sinks the sample it came from, the parameter
    /// set is then counted as not working.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ExitStatus(..) | Self::Killed(..) | Self::Timeout(..))
    }
}

pub type SimulateResult<T> = Result<T, SimulateError>;
