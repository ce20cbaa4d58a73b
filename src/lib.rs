//! tunelens - Musical metadata from audio files
//!
//! Decodes an audio file and derives tempo, musical key, timbral feature
//! statistics, genre and mood through a staged analysis pipeline with
//! timeouts, retry, a memory ceiling and partial-failure tolerance.
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `audio`: Format sniffing and decoding using hound and symphonia
//! - `analysis`: Features, tempo, key, genre and mood (with swappable backends)
//! - `fetch`: Download collaborator
//! - `pipeline`: Async orchestration over a rayon DSP pool
//! - `export`: JSON output
//!
//! # Example
//!
//! ```no_run
//! use tunelens::{config::AnalysisSettings, pipeline::AnalysisPipeline};
//!
//! # async fn run() -> tunelens::Result<()> {
//! let pipeline = AnalysisPipeline::new(AnalysisSettings::default())?;
//! let bytes = std::fs::read("track.wav").expect("read input");
//! let result = pipeline.analyze_bytes(bytes, Some("req-1")).await?;
//! println!("{} BPM, {}", result.tempo.bpm, result.key.key);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod audio;
pub mod cancel;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod pipeline;
pub mod types;

// Re-export key types at crate root
pub use error::{AnalysisError, ErrorCode, Result};
pub use types::{AnalysisResult, GenreResult, KeyResult, MoodResult, PcmBuffer, TempoResult};
