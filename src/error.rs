use crate::{analysis::AnalysisError, config::ConfigError, params::ParameterError, simulate::SimulateError, verify::SpecError};

#[derive(Debug, thiserror::Error)]
pub enum JosimToolsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Simulate(#[from] SimulateError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("{0}")]
    Message(String),

    #[error("{msg} >> {err}")]
    Context { msg: String, err: Box<dyn std::error::Error + Send + Sync> }
}

pub type JosimToolsResult<T> = Result<T, JosimToolsError>;

pub trait ErrorContext<T> {
    fn context<S: Into<String>>(self, msg: S) -> JosimToolsResult<T>;
    fn with_context<S: Into<String>>(self, f: impl Fn() -> S) -> JosimToolsResult<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ErrorContext<T> for Result<T, E> {
    fn context<S: Into<String>>(self, msg: S) -> JosimToolsResult<T> {
        self.map_err(|e| JosimToolsError::Context { msg: msg.into(), err: Box::new(e) })
    }

    fn with_context<S: Into<String>>(self, f: impl Fn() -> S) -> JosimToolsResult<T> {
        let msg = f();
        self.context(msg)
    }
}

impl JosimToolsError {
    /// Walk through `Context` wrappers down to the error that caused them
    pub fn root(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            Self::Context { err, .. } => match err.downcast_ref::<JosimToolsError>() {
                Some(inner) => inner.root(),
                None => err.as_ref() as &(dyn std::error::Error + 'static),
            }
            _ => self as &(dyn std::error::Error + 'static),
        }
    }
}
