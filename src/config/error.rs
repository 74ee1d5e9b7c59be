use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config file '{0}' failed: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("parse config file failed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("mode '{0}' needs a [{1}] table")]
    MissingTable(&'static str, &'static str),

    #[error("invalid '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue { field, reason: reason.into() }
    }
}
