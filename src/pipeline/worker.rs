//! Bridge from async orchestration to the rayon DSP pool
//!
//! CPU-bound stages run on a dedicated rayon pool; the result travels back
//! over a tokio oneshot channel so the async side never blocks a runtime
//! thread on DSP work.

use crate::error::{AnalysisError, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Shared handle to the DSP thread pool
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tunelens-dsp-{}", i))
            .build()
            .map_err(pool_build_error)?;

        debug!("Configured DSP pool with {} threads", threads);
        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on the pool and await its result
    ///
    /// A panic inside the job surfaces as `UNKNOWN_ERROR` rather than
    /// tearing down the pool.
    pub async fn run<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job));
            // Receiver gone means the caller timed out; nothing to report
            let _ = tx.send(outcome);
        });

        match rx.await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(AnalysisError::unknown(format!("Analysis worker panicked: {}", message)))
            }
            Err(_) => Err(AnalysisError::unknown("Analysis worker dropped its result")),
        }
    }
}

/// Thread spawn failures are an internal fault, not a processing limit
fn pool_build_error(cause: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::unknown(format!("Failed to configure thread pool: {}", cause))
        .with_detail("cause", cause.to_string())
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("threads", &self.threads()).finish()
    }
}
