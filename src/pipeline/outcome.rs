//! Per-stage outcome used to fan results back in

use crate::error::AnalysisError;
use tracing::warn;

/// Result of one pipeline stage
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// Stage succeeded
    Ok(T),
    /// Stage failed but the request continues with a default value
    Degraded { value: T, reason: AnalysisError },
    /// Stage failed and the request must fail
    Fatal(AnalysisError),
}

impl<T> StageOutcome<T> {
    /// Critical stage: any error is fatal
    pub fn critical(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(value) => StageOutcome::Ok(value),
            Err(e) => StageOutcome::Fatal(e),
        }
    }

    /// Non-critical stage: errors are downgraded to warnings and replaced by `default`
    pub fn degradable(result: crate::error::Result<T>, default: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => StageOutcome::Ok(value),
            Err(e) => {
                let reason = e.into_warning();
                warn!(
                    code = reason.code.as_str(),
                    stage = reason.stage.map(|s| s.as_str()).unwrap_or("unknown"),
                    "Stage degraded: {}",
                    reason.message
                );
                StageOutcome::Degraded {
                    value: default(),
                    reason,
                }
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    /// Value for `Ok`/`Degraded`, error for `Fatal`
    pub fn into_result(self) -> crate::error::Result<T> {
        match self {
            StageOutcome::Ok(value) | StageOutcome::Degraded { value, .. } => Ok(value),
            StageOutcome::Fatal(e) => Err(e),
        }
    }
}
