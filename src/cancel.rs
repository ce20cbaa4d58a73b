//! Cooperative cancellation shared between the orchestrator and DSP loops

use crate::error::{AnalysisError, Result};
use crate::types::Stage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag raised by the orchestrator when a stage envelope times out
///
/// DSP loops poll it between frames and bail out with `ANALYSIS_TIMEOUT`.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }

    /// Error out if cancellation was requested
    pub fn check(&self, stage: Stage) -> Result<()> {
        if self.is_cancelled() {
            Err(AnalysisError::cancelled(stage))
        } else {
            Ok(())
        }
    }
}
