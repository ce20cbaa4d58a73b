//! CLI argument parsing and configuration

use clap::Parser;
use std::path::PathBuf;

/// tunelens - Musical metadata from audio files
///
/// Analyzes an audio file (local path or http(s) URL) and reports tempo, key,
/// timbral feature statistics, genre and mood as JSON.
#[derive(Parser, Debug)]
#[command(name = "tunelens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input audio file path or http(s) URL
    #[arg(short, long, value_name = "PATH|URL")]
    pub input: String,

    /// Write the JSON result to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Return a synthetic, clearly flagged result instead of failing on non-critical errors
    #[arg(long, default_value = "false")]
    pub fallback: bool,

    /// Identifier attached to logs and to the result
    #[arg(long, value_name = "ID")]
    pub request_id: Option<String>,

    /// Timeout for each analysis stage group in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Timeout for each download attempt in seconds
    #[arg(long, value_name = "SECS")]
    pub download_timeout_secs: Option<u64>,

    /// Process memory ceiling in megabytes
    #[arg(long, value_name = "MB")]
    pub memory_limit_mb: Option<u64>,

    /// Maximum input size in megabytes
    #[arg(long, value_name = "MB")]
    pub max_file_mb: Option<u64>,

    /// Download attempt budget
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Number of DSP worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Synthesize a placeholder waveform when compressed audio cannot be decoded
    #[arg(long, default_value = "false")]
    pub synthetic_decode: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Cli {
    /// True when the input should be fetched over HTTP
    pub fn is_remote(&self) -> bool {
        self.input.starts_with("http://") || self.input.starts_with("https://")
    }

    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
