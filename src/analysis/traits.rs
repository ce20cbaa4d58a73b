//! Analysis trait abstractions
//!
//! These traits define the interface for swappable analysis backends. The
//! numerical primitives (`FrameAnalyzer`, `BeatTracker`) sit underneath the
//! stage detectors so windowing, aggregation and correction heuristics can be
//! tested without a particular DSP backend.

use crate::analysis::features::{AggregatedFeatures, FrameFeatures};
use crate::cancel::CancellationFlag;
use crate::error::Result;
use crate::types::{GenreResult, KeyResult, MoodResult, PcmBuffer, StemRefs, TempoResult};
use async_trait::async_trait;

/// Per-frame feature computation
pub trait FrameAnalyzer: Send + Sync {
    /// Compute features for one frame of exactly `frame_size()` samples
    fn analyze(&self, frame: &[f32]) -> FrameFeatures;

    /// Number of samples the analyzer expects per frame
    fn frame_size(&self) -> usize;
}

/// Shape of a periodicity estimate as returned by a beat tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawTempo {
    /// Bare BPM value
    Bpm(f64),
    /// Structured estimate with optional extras
    Detailed {
        bpm: f64,
        confidence: Option<f64>,
        offset_seconds: Option<f64>,
    },
}

impl RawTempo {
    pub fn bpm(&self) -> f64 {
        match *self {
            RawTempo::Bpm(bpm) | RawTempo::Detailed { bpm, .. } => bpm,
        }
    }
}

/// Beat periodicity estimation
pub trait BeatTracker: Send + Sync {
    fn track(&self, samples: &[f32], sample_rate: u32, cancel: &CancellationFlag) -> Result<RawTempo>;

    /// Get the name of this tracker (for logging)
    fn name(&self) -> &'static str;
}

/// Tempo detection backend
pub trait TempoDetector: Send + Sync {
    fn detect(&self, buffer: &PcmBuffer, cancel: &CancellationFlag) -> Result<TempoResult>;

    /// Get the name of this detector (for logging)
    fn name(&self) -> &'static str;
}

/// Musical key detection backend
pub trait KeyDetector: Send + Sync {
    fn detect(&self, buffer: &PcmBuffer, cancel: &CancellationFlag) -> Result<KeyResult>;

    /// Get the name of this detector (for logging)
    fn name(&self) -> &'static str;
}

/// Frame-based feature extraction backend
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, buffer: &PcmBuffer, cancel: &CancellationFlag) -> Result<AggregatedFeatures>;

    /// Get the name of this extractor (for logging)
    fn name(&self) -> &'static str;
}

/// Genre classification backend
pub trait GenreClassifier: Send + Sync {
    fn classify(&self, features: &AggregatedFeatures, tempo: Option<&TempoResult>) -> Result<GenreResult>;

    /// Get the name of this classifier (for logging)
    fn name(&self) -> &'static str;
}

/// Mood detection backend
pub trait MoodDetector: Send + Sync {
    fn detect(&self, features: &AggregatedFeatures, tempo: Option<&TempoResult>) -> Result<MoodResult>;

    /// Get the name of this detector (for logging)
    fn name(&self) -> &'static str;
}

/// Stem separation backend
///
/// Runs as a side-channel next to the analysis; a failure never fails the
/// overall request.
#[async_trait]
pub trait StemSeparator: Send + Sync {
    /// Separate the audio at `source` into stems, returning opaque references
    async fn separate(&self, source: &str) -> Result<StemRefs>;

    /// Check if the separator is available (service reachable, credentials set, etc.)
    fn is_available(&self) -> bool;

    /// Get the name of this separator (for logging)
    fn name(&self) -> &'static str;
}
