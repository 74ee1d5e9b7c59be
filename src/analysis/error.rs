use crate::JosimToolsError;
use super::PartialResult;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("nominal point failed verification")]
    NominalFailed,

    #[error("analysis cancelled")]
    Cancelled,

    #[error("analysis aborted: {source}")]
    Aborted {
        partial: PartialResult,
        source: Box<JosimToolsError>,
    },
}

impl AnalysisError {
    pub fn aborted(partial: PartialResult, source: JosimToolsError) -> Self {
        Self::Aborted { partial, source: Box::new(source) }
    }
}
