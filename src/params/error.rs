#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("unknown parameter '{0}', it is not defined in [parameters]")]
    UnknownParameter(String),

    #[error("parameter '{0}' defined more than once")]
    DuplicateParameter(String),

    #[error("parameter '{name}' has a non-finite nominal value '{value}'")]
    InvalidNominal { name: String, value: f64 },

    #[error("parameter '{name}' has min '{min}' greater than max '{max}'")]
    InvalidBounds { name: String, min: f64, max: f64 },

    #[error("invalid distribution for parameter '{name}': {reason}")]
    InvalidDistribution { name: String, reason: String },
}
