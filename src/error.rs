//! Unified error type for tunelens
//!
//! Error strategy:
//! - Download/timeout errors: retryable, the source fetch is attempted again
//! - Format/decode errors: fatal for the request, user-actionable
//! - Core analysis errors (tempo, key, features): fatal, propagate with stage context
//! - Classification errors (genre, mood): absorbed by the orchestrator as warnings
//!
//! Every error carries a machine-readable code, an internal message, a short
//! user-facing message and a JSON details bag so it can be logged structurally.

use crate::types::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, OGG";

/// Error families, used for retry and fallback policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFamily {
    Download,
    Format,
    Analysis,
    Resource,
    System,
}

/// Closed enumeration of failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // =========================================================================
    // Download
    // =========================================================================
    DownloadFailed,
    DownloadTimeout,
    FileTooLarge,

    // =========================================================================
    // Format / decode
    // =========================================================================
    UnsupportedFormat,
    DecodeFailed,
    CorruptedFile,
    InvalidFile,

    // =========================================================================
    // Analysis
    // =========================================================================
    InsufficientAudio,
    AudioTooShort,
    AudioTooLong,
    SilentAudio,
    NoSamples,
    EmptySamples,
    InvalidSampleRate,
    InvalidDuration,
    NoValidFrames,
    InvalidFeatures,
    NoGenresDetected,
    TempoDetectionFailed,
    KeyDetectionFailed,
    FeatureExtractionFailed,
    GenreClassificationFailed,
    MoodDetectionFailed,
    AnalysisTimeout,

    // =========================================================================
    // Resource
    // =========================================================================
    MemoryLimitExceeded,
    ProcessingLimitExceeded,

    // =========================================================================
    // System
    // =========================================================================
    TempStorageFailed,
    CleanupFailed,
    UnknownError,
}

impl ErrorCode {
    /// Family this code belongs to
    pub fn family(self) -> ErrorFamily {
        use ErrorCode::*;
        match self {
            DownloadFailed | DownloadTimeout | FileTooLarge => ErrorFamily::Download,
            UnsupportedFormat | DecodeFailed | CorruptedFile | InvalidFile => ErrorFamily::Format,
            MemoryLimitExceeded | ProcessingLimitExceeded => ErrorFamily::Resource,
            TempStorageFailed | CleanupFailed | UnknownError => ErrorFamily::System,
            _ => ErrorFamily::Analysis,
        }
    }

    /// Whether a caller may reasonably retry an operation that failed with this code
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::DownloadFailed | ErrorCode::DownloadTimeout | ErrorCode::AnalysisTimeout
        )
    }

    /// Wire name of the code (e.g. `ANALYSIS_TIMEOUT`)
    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            DownloadFailed => "DOWNLOAD_FAILED",
            DownloadTimeout => "DOWNLOAD_TIMEOUT",
            FileTooLarge => "FILE_TOO_LARGE",
            UnsupportedFormat => "UNSUPPORTED_FORMAT",
            DecodeFailed => "DECODE_FAILED",
            CorruptedFile => "CORRUPTED_FILE",
            InvalidFile => "INVALID_FILE",
            InsufficientAudio => "INSUFFICIENT_AUDIO",
            AudioTooShort => "AUDIO_TOO_SHORT",
            AudioTooLong => "AUDIO_TOO_LONG",
            SilentAudio => "SILENT_AUDIO",
            NoSamples => "NO_SAMPLES",
            EmptySamples => "EMPTY_SAMPLES",
            InvalidSampleRate => "INVALID_SAMPLE_RATE",
            InvalidDuration => "INVALID_DURATION",
            NoValidFrames => "NO_VALID_FRAMES",
            InvalidFeatures => "INVALID_FEATURES",
            NoGenresDetected => "NO_GENRES_DETECTED",
            TempoDetectionFailed => "TEMPO_DETECTION_FAILED",
            KeyDetectionFailed => "KEY_DETECTION_FAILED",
            FeatureExtractionFailed => "FEATURE_EXTRACTION_FAILED",
            GenreClassificationFailed => "GENRE_CLASSIFICATION_FAILED",
            MoodDetectionFailed => "MOOD_DETECTION_FAILED",
            AnalysisTimeout => "ANALYSIS_TIMEOUT",
            MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            ProcessingLimitExceeded => "PROCESSING_LIMIT_EXCEEDED",
            TempStorageFailed => "TEMP_STORAGE_FAILED",
            CleanupFailed => "CLEANUP_FAILED",
            UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Short, non-technical message shown to end users
    pub fn user_message(self) -> &'static str {
        use ErrorCode::*;
        match self {
            DownloadFailed => "We couldn't download your audio file. Please try again.",
            DownloadTimeout => "Downloading your audio file took too long. Please try again.",
            FileTooLarge => "This file is too large. Please upload a smaller file.",
            UnsupportedFormat => "This audio format isn't supported. Please upload MP3, WAV, FLAC or OGG.",
            DecodeFailed => "We couldn't read the audio in this file.",
            CorruptedFile => "This audio file appears to be damaged.",
            InvalidFile => "This file doesn't contain usable audio.",
            InsufficientAudio | AudioTooShort => "This track is too short to analyze. Please upload at least 10 seconds.",
            AudioTooLong => "This track is too long to analyze. Please upload under 10 minutes.",
            SilentAudio => "This track appears to be silent.",
            NoSamples | EmptySamples | NoValidFrames => "We couldn't find any audio to analyze in this file.",
            InvalidSampleRate | InvalidDuration => "This audio file has invalid timing information.",
            AnalysisTimeout => "Analysis took too long. Please try again later.",
            MemoryLimitExceeded | ProcessingLimitExceeded => {
                "The analysis service is busy. Please try again in a few minutes."
            }
            TempStorageFailed | CleanupFailed | UnknownError => {
                "Something went wrong on our side. Please try again later."
            }
            InvalidFeatures
            | NoGenresDetected
            | TempoDetectionFailed
            | KeyDetectionFailed
            | FeatureExtractionFailed
            | GenreClassificationFailed
            | MoodDetectionFailed => "We couldn't analyze this track.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for tunelens operations
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct AnalysisError {
    pub code: ErrorCode,
    /// Internal, technical description
    pub message: String,
    /// Pre-rendered message for end users
    pub user_message: String,
    /// Machine-readable context (stage, timing, memory, original error text)
    pub details: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub retryable: bool,
    /// Set when the error was absorbed and only logged
    pub warning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

/// Result type alias for tunelens operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            user_message: code.user_message().to_string(),
            details: Map::new(),
            timestamp: Utc::now(),
            retryable: code.is_retryable(),
            warning: false,
            stage: None,
        }
    }

    /// Attach a detail value
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Attach the stage that produced the error (first stage wins)
    pub fn at_stage(mut self, stage: Stage) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage);
            self.details
                .insert("stage".to_string(), Value::from(stage.as_str()));
        }
        self
    }

    /// Mark the error as absorbed (logged as a warning, not surfaced)
    pub fn into_warning(mut self) -> Self {
        self.warning = true;
        self
    }

    pub fn family(&self) -> ErrorFamily {
        self.code.family()
    }

    /// Critical errors are never papered over by synthetic fallback results:
    /// the input itself is unusable or the service is out of resources.
    pub fn is_critical(&self) -> bool {
        match self.code.family() {
            ErrorFamily::Format | ErrorFamily::Resource => true,
            ErrorFamily::Download => self.code == ErrorCode::FileTooLarge,
            ErrorFamily::Analysis | ErrorFamily::System => false,
        }
    }

    // =========================================================================
    // Constructors for common failures
    // =========================================================================

    pub fn unsupported_format(detected: impl Into<String>) -> Self {
        let detected = detected.into();
        Self::new(
            ErrorCode::UnsupportedFormat,
            format!("Unsupported audio format: {detected}. Supported formats: {SUPPORTED_FORMATS}"),
        )
        .with_detail("detectedFormat", detected)
    }

    pub fn decode_failed(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::DecodeFailed, format!("Failed to decode audio: {}", reason.into()))
    }

    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::CorruptedFile, format!("Audio container is corrupted: {}", reason.into()))
    }

    pub fn file_too_large(size: u64, limit: u64) -> Self {
        let limit_mb = limit as f64 / (1024.0 * 1024.0);
        let mut err = Self::new(
            ErrorCode::FileTooLarge,
            format!(
                "File too large ({:.1} MB). Maximum supported size is {:.1} MB.",
                size as f64 / (1024.0 * 1024.0),
                limit_mb
            ),
        );
        let readable = if limit >= 1024 * 1024 {
            format!("{:.0} MB", limit_mb)
        } else {
            format!("{:.0} KB", limit as f64 / 1024.0)
        };
        err.user_message = format!("This file is too large. Please upload a file under {readable}.");
        err.with_detail("sizeBytes", size)
            .with_detail("limitBytes", limit)
    }

    pub fn too_short(code: ErrorCode, duration: f64, minimum: f64) -> Self {
        Self::new(
            code,
            format!("Audio too short ({duration:.1}s). Minimum {minimum:.0}s required."),
        )
        .with_detail("durationSeconds", duration)
        .with_detail("minimumSeconds", minimum)
    }

    pub fn too_long(duration: f64, maximum: f64) -> Self {
        Self::new(
            ErrorCode::AudioTooLong,
            format!("Audio too long ({duration:.1}s). Maximum {maximum:.0}s supported."),
        )
        .with_detail("durationSeconds", duration)
        .with_detail("maximumSeconds", maximum)
    }

    pub fn silent(peak: f32, threshold: f32) -> Self {
        Self::new(
            ErrorCode::SilentAudio,
            format!("Audio is silent (peak amplitude {peak:.5} below {threshold})"),
        )
        .with_detail("peakAmplitude", peak as f64)
    }

    pub fn invalid_features(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFeatures, format!("Invalid features: {}", reason.into()))
    }

    pub fn timeout(stage: Stage, limit: Duration) -> Self {
        Self::new(
            ErrorCode::AnalysisTimeout,
            format!("{} did not finish within {:.1}s", stage.as_str(), limit.as_secs_f64()),
        )
        .with_detail("timeoutMs", limit.as_millis() as u64)
        .at_stage(stage)
    }

    pub fn memory_exceeded(used: u64, limit: u64) -> Self {
        Self::new(
            ErrorCode::MemoryLimitExceeded,
            format!(
                "Process memory {} MB exceeds ceiling of {} MB",
                used / (1024 * 1024),
                limit / (1024 * 1024)
            ),
        )
        .with_detail("memoryBytes", used)
        .with_detail("limitBytes", limit)
    }

    /// Error raised inside a DSP loop after the cancellation flag was set
    pub fn cancelled(stage: Stage) -> Self {
        Self::new(
            ErrorCode::AnalysisTimeout,
            format!("{} was cancelled", stage.as_str()),
        )
        .at_stage(stage)
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnknownError, reason)
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Tag the error with a stage, elapsed time and a memory snapshot
    fn with_stage(self, stage: Stage, elapsed: Duration, memory_bytes: Option<u64>) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn with_stage(self, stage: Stage, elapsed: Duration, memory_bytes: Option<u64>) -> Result<T> {
        self.map_err(|e| {
            let mut e = e
                .at_stage(stage)
                .with_detail("elapsedMs", elapsed.as_millis() as u64);
            if let Some(bytes) = memory_bytes {
                e = e.with_detail("memoryBytes", bytes);
            }
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_codes() {
        assert!(ErrorCode::DownloadFailed.is_retryable());
        assert!(ErrorCode::DownloadTimeout.is_retryable());
        assert!(ErrorCode::AnalysisTimeout.is_retryable());
        assert!(!ErrorCode::FileTooLarge.is_retryable());
        assert!(!ErrorCode::UnsupportedFormat.is_retryable());
        assert!(!ErrorCode::MemoryLimitExceeded.is_retryable());
    }

    #[test]
    fn test_families() {
        assert_eq!(ErrorCode::FileTooLarge.family(), ErrorFamily::Download);
        assert_eq!(ErrorCode::CorruptedFile.family(), ErrorFamily::Format);
        assert_eq!(ErrorCode::SilentAudio.family(), ErrorFamily::Analysis);
        assert_eq!(ErrorCode::MemoryLimitExceeded.family(), ErrorFamily::Resource);
        assert_eq!(ErrorCode::CleanupFailed.family(), ErrorFamily::System);
    }

    #[test]
    fn test_serialized_code_matches_wire_name() {
        let json = serde_json::to_string(&ErrorCode::NoGenresDetected).unwrap();
        assert_eq!(json, "\"NO_GENRES_DETECTED\"");
        assert_eq!(ErrorCode::NoGenresDetected.as_str(), "NO_GENRES_DETECTED");
    }

    #[test]
    fn test_with_stage_adds_context() {
        let result: Result<()> = Err(AnalysisError::silent(0.0, 0.001));
        let err = result
            .with_stage(Stage::Key, Duration::from_millis(42), Some(1024))
            .unwrap_err();
        assert_eq!(err.stage, Some(Stage::Key));
        assert_eq!(err.details["elapsedMs"], 42);
        assert_eq!(err.details["memoryBytes"], 1024);
        assert_eq!(err.details["stage"], "key");
    }

    #[test]
    fn test_critical_classification() {
        assert!(AnalysisError::unsupported_format("UNKNOWN").is_critical());
        assert!(AnalysisError::file_too_large(60, 50).is_critical());
        assert!(!AnalysisError::new(ErrorCode::DownloadFailed, "x").is_critical());
        assert!(!AnalysisError::unknown("x").is_critical());
    }

    #[test]
    fn test_file_too_large_names_configured_limit() {
        let default = AnalysisError::file_too_large(60 * 1024 * 1024, 50 * 1024 * 1024);
        assert!(default.user_message.contains("50 MB"), "{}", default.user_message);

        let custom = AnalysisError::file_too_large(30 * 1024 * 1024, 20 * 1024 * 1024);
        assert!(custom.user_message.contains("20 MB"), "{}", custom.user_message);
        assert!(!custom.user_message.contains("50 MB"));

        let tiny = AnalysisError::file_too_large(8192, 4096);
        assert!(tiny.user_message.contains("4 KB"), "{}", tiny.user_message);
    }

    #[test]
    fn test_user_message_differs_from_internal() {
        let err = AnalysisError::too_short(ErrorCode::AudioTooShort, 3.0, 5.0);
        assert_ne!(err.message, err.user_message);
        assert!(err.to_string().contains("AUDIO_TOO_SHORT"));
    }
}
