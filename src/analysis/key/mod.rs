//! Key detection module
//!
//! Chromagram over energy-gated frames, matched against Krumhansl-Kessler
//! profiles for all 24 keys.

pub mod profiles;

use crate::analysis::features::chroma::{fold_spectrum, normalize_max, normalize_sum};
use crate::analysis::features::spectral::{rms, PowerSpectrum, CHROMA_MAX_HZ, CHROMA_MIN_HZ};
use crate::analysis::traits::KeyDetector;
use crate::analysis::tempo::SILENCE_THRESHOLD;
use crate::cancel::CancellationFlag;
use crate::error::{AnalysisError, ErrorCode, Result};
use crate::types::{KeyResult, PcmBuffer, Stage};
use tracing::{debug, warn};

/// Key analysis window in samples
pub const KEY_FRAME_SIZE: usize = 4096;

/// Hop between key analysis frames
pub const KEY_HOP_SIZE: usize = 2048;

/// Frames quieter than this RMS are left out of the chromagram
pub const MIN_FRAME_RMS: f32 = 0.01;

/// Krumhansl-Schmuckler key detector
pub struct ChromaKeyDetector {
    min_duration: f64,
    max_duration: f64,
    uncertain_threshold: f64,
}

impl ChromaKeyDetector {
    pub fn new() -> Self {
        Self {
            min_duration: 10.0,
            max_duration: 600.0,
            uncertain_threshold: 0.6,
        }
    }

    pub fn with_limits(mut self, min_duration: f64, max_duration: f64) -> Self {
        self.min_duration = min_duration;
        self.max_duration = max_duration;
        self
    }

    pub fn with_uncertain_threshold(mut self, threshold: f64) -> Self {
        self.uncertain_threshold = threshold;
        self
    }

    fn validate(&self, buffer: &PcmBuffer) -> Result<()> {
        if buffer.is_empty() {
            return Err(AnalysisError::new(ErrorCode::EmptySamples, "Audio buffer has no samples"));
        }
        if buffer.sample_rate == 0 {
            return Err(AnalysisError::new(ErrorCode::InvalidSampleRate, "Sample rate is 0 Hz"));
        }
        if !buffer.duration.is_finite() || buffer.duration <= 0.0 {
            return Err(AnalysisError::new(
                ErrorCode::InvalidDuration,
                format!("Invalid clip duration: {}", buffer.duration),
            ));
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

    /// Averaged, L1-normalized chromagram over frames above the RMS gate
    fn chromagram(&self, buffer: &PcmBuffer, cancel: &CancellationFlag) -> Result<[f64; 12]> {
        let spectrum = PowerSpectrum::new(KEY_FRAME_SIZE);
        let bin_hz = buffer.sample_rate as f32 / KEY_FRAME_SIZE as f32;

        let mut sum = [0.0f64; 12];
        let mut kept = 0usize;
        let mut total = 0usize;
        let mut start = 0usize;

        while start + KEY_FRAME_SIZE <= buffer.len() {
            cancel.check(Stage::Key)?;
            total += 1;

            let frame = &buffer.samples[start..start + KEY_FRAME_SIZE];
            start += KEY_HOP_SIZE;

            if rms(frame) < MIN_FRAME_RMS {
                continue;
            }

            let mut chroma = fold_spectrum(&spectrum.compute(frame), bin_hz, CHROMA_MIN_HZ, CHROMA_MAX_HZ);
            normalize_max(&mut chroma);
            if chroma.iter().any(|c| !c.is_finite()) {
                continue;
            }
            for (acc, c) in sum.iter_mut().zip(chroma) {
                *acc += c as f64;
            }
            kept += 1;
        }

        if kept == 0 {
            return Err(AnalysisError::new(
                ErrorCode::NoValidFrames,
                format!("None of {} frames rose above RMS {}", total, MIN_FRAME_RMS),
            )
            .with_detail("frameCount", total as u64));
        }

        debug!("Chromagram from {} of {} frames", kept, total);

        let mut averaged = [0.0f32; 12];
        for (avg, s) in averaged.iter_mut().zip(sum) {
            *avg = (s / kept as f64) as f32;
        }
        normalize_sum(&mut averaged);

        Ok(averaged.map(|c| c as f64))
    }
}

impl Default for ChromaKeyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDetector for ChromaKeyDetector {
    fn detect(&self, buffer: &PcmBuffer, cancel: &CancellationFlag) -> Result<KeyResult> {
        self.validate(buffer)?;

        let chroma = self.chromagram(buffer, cancel)?;
        if chroma.iter().all(|c| *c == 0.0) {
            return Err(AnalysisError::new(
                ErrorCode::KeyDetectionFailed,
                "No tonal energy in the analysed frequency range",
            ));
        }

        let best = profiles::best_key(&chroma);
        let confidence = best.correlation.clamp(0.0, 1.0);
        let result = KeyResult::new(best.root, best.scale, (confidence * 1000.0).round() / 1000.0);

        if confidence < self.uncertain_threshold {
            warn!("Uncertain key estimate {} (confidence {:.3})", result.key, confidence);
        } else {
            debug!("Key: {} (confidence {:.3})", result.key, confidence);
        }

        Ok(result)
    }

    fn name(&self) -> &'static str {
        "krumhansl-schmuckler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PitchClass;
    use std::f32::consts::PI;

    fn harmonic(fundamental: f32, sample_rate: u32, seconds: f32) -> PcmBuffer {
        let n = (sample_rate as f32 * seconds) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.5 * (2.0 * PI * fundamental * t).sin()
                    + 0.25 * (2.0 * PI * 2.0 * fundamental * t).sin()
                    + 0.125 * (2.0 * PI * 3.0 * fundamental * t).sin()
            })
            .collect();
        PcmBuffer::new(samples, sample_rate)
    }

    #[test]
    fn test_harmonic_series_root() {
        let detector = ChromaKeyDetector::new();
        let result = detector.detect(&harmonic(220.0, 22050, 11.0), &CancellationFlag::new()).unwrap();
        assert_eq!(result.root, PitchClass::A);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);

        let c = detector.detect(&harmonic(261.63, 22050, 11.0), &CancellationFlag::new()).unwrap();
        assert_eq!(c.root, PitchClass::C);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let buffer = harmonic(329.63, 22050, 10.5);
        let detector = ChromaKeyDetector::new();
        let a = detector.detect(&buffer, &CancellationFlag::new()).unwrap();
        let b = detector.detect(&buffer, &CancellationFlag::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_clips() {
        let detector = ChromaKeyDetector::new();
        let cancel = CancellationFlag::new();

        let empty = PcmBuffer::new(Vec::new(), 22050);
        assert_eq!(detector.detect(&empty, &cancel).unwrap_err().code, ErrorCode::EmptySamples);

        let short = harmonic(220.0, 22050, 5.0);
        assert_eq!(detector.detect(&short, &cancel).unwrap_err().code, ErrorCode::AudioTooShort);

        let silent = PcmBuffer::new(vec![0.0; 22050 * 12], 22050);
        assert_eq!(detector.detect(&silent, &cancel).unwrap_err().code, ErrorCode::SilentAudio);
    }

    #[test]
    fn test_validation_errors() {
        let detector = ChromaKeyDetector::new();
        let cancel = CancellationFlag::new();

        let mut nan_duration = harmonic(220.0, 8000, 11.0);
        nan_duration.duration = f64::NAN;
        let mut zero_duration = harmonic(220.0, 8000, 11.0);
        zero_duration.duration = 0.0;

        let cases = [
            (PcmBuffer::new(vec![0.3; 4096], 0), ErrorCode::InvalidSampleRate),
            (nan_duration, ErrorCode::InvalidDuration),
            (zero_duration, ErrorCode::InvalidDuration),
            (harmonic(220.0, 1000, 601.0), ErrorCode::AudioTooLong),
        ];
        for (buffer, expected) in cases {
            let err = detector.detect(&buffer, &cancel).unwrap_err();
            assert_eq!(err.code, expected, "duration {} @ {}Hz", buffer.duration, buffer.sample_rate);
        }

        let tight = ChromaKeyDetector::new().with_limits(10.0, 11.0);
        let err = tight.detect(&harmonic(220.0, 8000, 12.0), &cancel).unwrap_err();
        assert_eq!(err.code, ErrorCode::AudioTooLong);
    }

    #[test]
    fn test_quiet_clip_has_no_valid_frames() {
        // Peak above the silence gate, RMS below the frame gate
        let samples: Vec<f32> = (0..22050 * 11)
            .map(|i| 0.005 * (i as f32 * 0.05).sin())
            .collect();
        let err = ChromaKeyDetector::new()
            .detect(&PcmBuffer::new(samples, 22050), &CancellationFlag::new())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoValidFrames);
    }
}
