//! Async orchestration of the analysis stages
//!
//! CPU-bound stages run on a rayon pool bridged back to tokio; the
//! orchestrator adds timeouts, retry, the memory ceiling and the synthetic
//! fallback entry point.

pub mod fallback;
pub mod monitor;
pub mod orchestrator;
pub mod outcome;
pub mod retry;
pub mod worker;

pub use fallback::synthesize_analysis;
pub use monitor::{MemoryMonitor, MemoryProbe, MemorySnapshot, SysinfoProbe};
pub use orchestrator::{AnalysisPipeline, PipelineBuilder};
pub use outcome::StageOutcome;
pub use retry::{should_retry, RetryPolicy};
pub use worker::WorkerPool;
