//! Runtime configuration settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 50 MB upload cap
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 512 MB process memory ceiling
pub const DEFAULT_MEMORY_LIMIT: u64 = 512 * 1024 * 1024;

/// Runtime settings for the analysis pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Maximum accepted input size in bytes
    pub max_file_size: u64,
    /// Timeout envelope for each parallel analysis group
    pub analysis_timeout: Duration,
    /// Timeout for a single download attempt
    pub download_timeout: Duration,
    /// Timeout for validating and decoding downloaded bytes
    pub decode_timeout: Duration,
    /// Process memory ceiling in bytes
    pub memory_limit: u64,
    /// How often the memory monitor samples the process
    pub memory_poll_interval: Duration,
    /// Download attempt budget
    pub max_retries: u32,
    /// First retry delay, doubled on every further attempt
    pub retry_base_delay: Duration,
    /// Minimum clip length accepted by the orchestrator (seconds)
    pub min_analysis_duration: f64,
    /// Minimum clip length for tempo detection (seconds)
    pub tempo_min_duration: f64,
    /// Minimum clip length for key detection (seconds)
    pub key_min_duration: f64,
    /// Maximum clip length for tempo/key detection (seconds)
    pub max_duration: f64,
    /// Key confidence below this is logged as uncertain
    pub key_uncertain_threshold: f64,
    /// Number of DSP worker threads
    pub analysis_threads: usize,
    /// Synthesize a placeholder waveform when a compressed stream cannot be decoded
    pub synthetic_decode_fallback: bool,
}

impl AnalysisSettings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &super::cli::Cli) -> Self {
        let defaults = Self::default();

        Self {
            max_file_size: cli
                .max_file_mb
                .map(|mb| mb.saturating_mul(1024 * 1024))
                .unwrap_or(defaults.max_file_size),
            analysis_timeout: cli
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.analysis_timeout),
            download_timeout: cli
                .download_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            memory_limit: cli
                .memory_limit_mb
                .map(|mb| mb.saturating_mul(1024 * 1024))
                .unwrap_or(defaults.memory_limit),
            max_retries: cli.retries.unwrap_or(defaults.max_retries),
            analysis_threads: cli.threads.unwrap_or(defaults.analysis_threads).max(1),
            synthetic_decode_fallback: cli.synthetic_decode,
            ..defaults
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            analysis_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            decode_timeout: Duration::from_secs(30),
            memory_limit: DEFAULT_MEMORY_LIMIT,
            memory_poll_interval: Duration::from_millis(250),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            min_analysis_duration: 10.0,
            tempo_min_duration: 5.0,
            key_min_duration: 10.0,
            max_duration: 600.0,
            key_uncertain_threshold: 0.6,
            analysis_threads: num_cpus::get().saturating_sub(1).max(1),
            synthetic_decode_fallback: false,
        }
    }
}
