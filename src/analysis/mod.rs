mod error;
mod margin;
mod yields;
mod optimize;
mod report;
pub use error::*;
pub use margin::*;
pub use yields::*;
pub use optimize::*;
pub use report::*;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use crate::{
    params::ParameterAssignment,
    simulate::SimulationAdapter,
    verify::{SpecVerifier, VerificationResult},
    JosimToolsError, JosimToolsResult,
};

/// Shared flag telling every worker to stop before its next simulation
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one trial ended with
#[derive(Debug, Clone)]
pub enum Outcome {
    Verified(VerificationResult),
    /// The simulator ran but gave no usable answer, counts as a fail
    SimulationFailed(String),
}

impl Outcome {
    pub fn passed(&self) -> bool {
        match self {
            Self::Verified(result) => result.passed,
            Self::SimulationFailed(_) => false,
        }
    }
}

/// Simulate then verify, the single trial every analysis is built from.
///
/// Cheap to clone, clones share the adapter and the cancel flag.
#[derive(Clone)]
pub struct Evaluator {
    adapter: Arc<dyn SimulationAdapter>,
    verifier: Arc<SpecVerifier>,
    circuit_path: PathBuf,
    cancel: CancelToken,
}

impl Evaluator {
    pub fn new(
        adapter: Arc<dyn SimulationAdapter>,
        verifier: Arc<SpecVerifier>,
        circuit_path: impl Into<PathBuf>,
        cancel: CancelToken,
    ) -> Self {
        Self { adapter, verifier, circuit_path: circuit_path.into(), cancel }
    }

    pub fn verifier(&self) -> &SpecVerifier {
        &self.verifier
    }

    pub fn circuit_path(&self) -> &Path {
        &self.circuit_path
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn evaluate(&self, assignment: &ParameterAssignment) -> JosimToolsResult<Outcome> {
        if self.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled.into());
        }

        match self.adapter.run(&self.circuit_path, assignment) {
            Ok(trace) => {
                let result = self.verifier.verify(&trace);
                debug!("trial {:?}: {}", assignment, if result.passed { "pass" } else { "fail" });
                Ok(Outcome::Verified(result))
            }
            Err(e) if !e.is_fatal() => {
                warn!("simulation failed, counted as a fail: {}", e);
                Ok(Outcome::SimulationFailed(e.to_string()))
            }
            Err(e) => {
                // siblings stop at their next trial
                self.cancel.cancel();
                Err(e.into())
            }
        }
    }

    pub fn check(&self, assignment: &ParameterAssignment) -> JosimToolsResult<bool> {
        self.evaluate(assignment).map(|outcome| outcome.passed())
    }
}

pub(crate) fn is_cancellation(err: &JosimToolsError) -> bool {
    matches!(err, JosimToolsError::Analysis(AnalysisError::Cancelled))
}

/// Pick the error worth reporting out of a parallel batch, the cause
/// rather than the cancellations it triggered
pub(crate) fn first_error(errors: impl IntoIterator<Item = JosimToolsError>) -> Option<JosimToolsError> {
    let mut cancelled = None;
    for err in errors {
        if !is_cancellation(&err) {
            return Some(err);
        }
        cancelled.get_or_insert(err);
    }
    cancelled
}
