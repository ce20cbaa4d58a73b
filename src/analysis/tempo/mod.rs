//! Tempo estimation
//!
//! Wraps a `BeatTracker`, normalizes its output into a `TempoResult`, assigns
//! a heuristic confidence when the tracker supplies none and corrects
//! octave errors (half/double tempo).

pub mod tracker;

use crate::analysis::traits::{BeatTracker, RawTempo, TempoDetector};
use crate::cancel::CancellationFlag;
use crate::error::{AnalysisError, ErrorCode, Result};
use crate::types::{PcmBuffer, TempoResult};
use tracing::debug;

pub use tracker::AutocorrelationTracker;

/// Peak amplitude below which a clip is treated as silent
pub const SILENCE_THRESHOLD: f32 = 0.001;

/// Plausible tempo range after octave correction
const PLAUSIBLE_MIN: f64 = 60.0;
const PLAUSIBLE_MAX: f64 = 200.0;

/// Confidence ceiling when the octave could not be corrected
const UNCORRECTED_CAP: f64 = 0.3;

/// Confidence multiplier applied after an octave correction
const CORRECTION_PENALTY: f64 = 0.8;

/// Confidence floor after an octave correction
const CORRECTION_FLOOR: f64 = 0.1;

/// Default tempo detector: validates the clip, runs the tracker, then
/// normalizes and corrects the estimate
pub struct TempoEstimator {
    tracker: Box<dyn BeatTracker>,
    min_duration: f64,
    max_duration: f64,
}

impl TempoEstimator {
    pub fn new(tracker: Box<dyn BeatTracker>) -> Self {
        Self {
            tracker,
            min_duration: 5.0,
            max_duration: 600.0,
        }
    }

    pub fn with_limits(mut self, min_duration: f64, max_duration: f64) -> Self {
        self.min_duration = min_duration;
        self.max_duration = max_duration;
        self
    }

    fn validate(&self, buffer: &PcmBuffer) -> Result<()> {
        if buffer.is_empty() {
            return Err(AnalysisError::new(ErrorCode::NoSamples, "Audio buffer has no samples"));
        }
        if buffer.sample_rate == 0 {
            return Err(AnalysisError::new(ErrorCode::InvalidSampleRate, "Sample rate is 0 Hz"));
        }
        if buffer.duration < self.min_duration {
            return Err(AnalysisError::too_short(ErrorCode::AudioTooShort, buffer.duration, self.min_duration));
        }
        if buffer.duration > self.max_duration {
            return Err(AnalysisError::too_long(buffer.duration, self.max_duration));
        }
        let peak = buffer.peak();
        if peak < SILENCE_THRESHOLD {
            return Err(AnalysisError::silent(peak, SILENCE_THRESHOLD));
        }
        Ok(())
    }
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self::new(Box::new(AutocorrelationTracker::new()))
    }
}

impl TempoDetector for TempoEstimator {
    fn detect(&self, buffer: &PcmBuffer, cancel: &CancellationFlag) -> Result<TempoResult> {
        self.validate(buffer)?;

        let raw = self
            .tracker
            .track(&buffer.samples, buffer.sample_rate, cancel)
            .map_err(|e| match e.code {
                ErrorCode::AnalysisTimeout | ErrorCode::TempoDetectionFailed => e,
                _ => AnalysisError::new(ErrorCode::TempoDetectionFailed, e.message.clone())
                    .with_detail("cause", e.code.as_str()),
            })?;

        let result = normalize(raw)?;
        debug!(
            "{}: {:.2} BPM (confidence {:.3}, octave corrected: {})",
            self.tracker.name(),
            result.bpm,
            result.confidence,
            result.octave_corrected
        );
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "tempo-estimator"
    }
}

/// Heuristic confidence for a raw BPM value
pub fn heuristic_confidence(bpm: f64) -> f64 {
    if bpm <= 0.0 {
        0.0
    } else if (80.0..=160.0).contains(&bpm) {
        0.9
    } else if (PLAUSIBLE_MIN..=PLAUSIBLE_MAX).contains(&bpm) {
        0.7
    } else {
        0.3
    }
}

/// Try doubling slow and halving fast estimates
///
/// Returns `(bpm, confidence, corrected)`.
pub fn correct_octave(bpm: f64, confidence: f64) -> (f64, f64, bool) {
    let candidate = if bpm < PLAUSIBLE_MIN {
        bpm * 2.0
    } else if bpm > PLAUSIBLE_MAX {
        bpm / 2.0
    } else {
        return (bpm, confidence, false);
    };

    if (PLAUSIBLE_MIN..=PLAUSIBLE_MAX).contains(&candidate) {
        (candidate, (confidence * CORRECTION_PENALTY).max(CORRECTION_FLOOR), true)
    } else {
        (bpm, confidence.min(UNCORRECTED_CAP), false)
    }
}

/// Turn any tracker output into a rounded, corrected `TempoResult`
pub fn normalize(raw: RawTempo) -> Result<TempoResult> {
    let (bpm, confidence, offset) = match raw {
        RawTempo::Bpm(bpm) => (bpm, None, None),
        RawTempo::Detailed {
            bpm,
            confidence,
            offset_seconds,
        } => (bpm, confidence, offset_seconds),
    };

    if !bpm.is_finite() {
        return Err(AnalysisError::new(
            ErrorCode::TempoDetectionFailed,
            format!("Beat tracker returned an invalid tempo ({})", bpm),
        ));
    }
    let offset_seconds = offset.filter(|o| o.is_finite() && *o >= 0.0).unwrap_or(0.0);

    // No octave to correct; downstream range checks decide what to do with it
    if bpm <= 0.0 {
        return Ok(TempoResult {
            bpm: round_to(bpm, 2),
            confidence: 0.0,
            offset_seconds,
            octave_corrected: false,
        });
    }

    let confidence = confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or_else(|| heuristic_confidence(bpm));
    let (bpm, confidence, octave_corrected) = correct_octave(bpm, confidence);

    Ok(TempoResult {
        bpm: round_to(bpm, 2),
        confidence: round_to(confidence, 3),
        offset_seconds,
        octave_corrected,
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
