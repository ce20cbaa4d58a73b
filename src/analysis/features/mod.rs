//! Frame-based feature extraction
//!
//! Slides a 2048-sample window with a 1024-sample hop over the clip, runs a
//! `FrameAnalyzer` on each frame and folds the results into per-feature
//! mean/variance in a single pass.

pub mod chroma;
pub mod mel;
pub mod spectral;

use crate::analysis::traits::{FeatureExtractor, FrameAnalyzer};
use crate::cancel::CancellationFlag;
use crate::error::{AnalysisError, ErrorCode, Result};
use crate::types::{PcmBuffer, Stage};
use mel::MFCC_COUNT;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use spectral::FftFrameAnalyzer;

/// Analysis window in samples
pub const FRAME_SIZE: usize = 2048;

/// Hop between consecutive frames (50% overlap)
pub const HOP_SIZE: usize = 1024;

/// Fewest frames an extraction may produce
pub const MIN_FRAMES: usize = 10;

/// Features of a single analysis frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameFeatures {
    pub mfcc: [f32; MFCC_COUNT],
    /// Hz
    pub spectral_centroid: f32,
    /// Hz
    pub spectral_rolloff: f32,
    /// Crossings per sample
    pub zero_crossing_rate: f32,
    pub rms: f32,
    /// Max-normalized pitch-class energy, C first
    pub chroma: [f32; 12],
}

impl FrameFeatures {
    pub fn is_finite(&self) -> bool {
        self.mfcc.iter().all(|v| v.is_finite())
            && self.chroma.iter().all(|v| v.is_finite())
            && self.spectral_centroid.is_finite()
            && self.spectral_rolloff.is_finite()
            && self.zero_crossing_rate.is_finite()
            && self.rms.is_finite()
    }
}

/// Clip-level feature statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedFeatures {
    pub mfcc_mean: [f32; MFCC_COUNT],
    pub mfcc_variance: [f32; MFCC_COUNT],
    pub spectral_centroid_mean: f32,
    pub spectral_centroid_variance: f32,
    pub spectral_rolloff_mean: f32,
    pub spectral_rolloff_variance: f32,
    pub zero_crossing_rate_mean: f32,
    pub zero_crossing_rate_variance: f32,
    pub rms_mean: f32,
    pub rms_variance: f32,
    pub chroma_mean: [f32; 12],
    pub chroma_variance: [f32; 12],
    /// Standard deviation of the per-frame centroid (dispersion proxy)
    pub spectral_bandwidth: f32,
    /// Coefficient of variation of per-frame RMS (tonality proxy)
    pub spectral_flatness: f32,
    pub frame_count: usize,
    pub sample_rate: u32,
    pub duration: f64,
    /// Most recent valid frame
    pub latest: FrameFeatures,
}

impl AggregatedFeatures {
    pub fn is_finite(&self) -> bool {
        let arrays = self
            .mfcc_mean
            .iter()
            .chain(&self.mfcc_variance)
            .chain(&self.chroma_mean)
            .chain(&self.chroma_variance);
        let scalars = [
            self.spectral_centroid_mean,
            self.spectral_centroid_variance,
            self.spectral_rolloff_mean,
            self.spectral_rolloff_variance,
            self.zero_crossing_rate_mean,
            self.zero_crossing_rate_variance,
            self.rms_mean,
            self.rms_variance,
            self.spectral_bandwidth,
            self.spectral_flatness,
        ];
        arrays.chain(scalars.iter()).all(|v| v.is_finite()) && self.latest.is_finite()
    }
}

/// Running sum and sum of squares for one value
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn push(&mut self, value: f32) {
        let v = value as f64;
        self.sum += v;
        self.sum_sq += v * v;
    }

    /// (mean, variance) with variance = E[x²] − E[x]², clamped at 0
    fn finish(&self, n: usize) -> (f32, f32) {
        let n = n as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        (mean as f32, variance as f32)
    }
}

/// One-pass accumulator over frame features
#[derive(Debug, Default)]
struct FeatureAccumulator {
    mfcc: [Moments; MFCC_COUNT],
    centroid: Moments,
    rolloff: Moments,
    zcr: Moments,
    rms: Moments,
    chroma: [Moments; 12],
    count: usize,
    latest: Option<FrameFeatures>,
}

impl FeatureAccumulator {
    fn push(&mut self, frame: FrameFeatures) {
        for (m, v) in self.mfcc.iter_mut().zip(frame.mfcc) {
            m.push(v);
        }
        for (m, v) in self.chroma.iter_mut().zip(frame.chroma) {
            m.push(v);
        }
        self.centroid.push(frame.spectral_centroid);
        self.rolloff.push(frame.spectral_rolloff);
        self.zcr.push(frame.zero_crossing_rate);
        self.rms.push(frame.rms);
        self.count += 1;
        self.latest = Some(frame);
    }

    fn finish(self, buffer: &PcmBuffer) -> Option<AggregatedFeatures> {
        let latest = self.latest?;
        let n = self.count;

        let split = |moments: &[Moments]| -> (Vec<f32>, Vec<f32>) { moments.iter().map(|m| m.finish(n)).unzip() };
        let (mfcc_mean, mfcc_variance) = split(&self.mfcc);
        let (chroma_mean, chroma_variance) = split(&self.chroma);

        let (spectral_centroid_mean, spectral_centroid_variance) = self.centroid.finish(n);
        let (spectral_rolloff_mean, spectral_rolloff_variance) = self.rolloff.finish(n);
        let (zero_crossing_rate_mean, zero_crossing_rate_variance) = self.zcr.finish(n);
        let (rms_mean, rms_variance) = self.rms.finish(n);

        let spectral_flatness = if rms_mean > 0.0 {
            rms_variance.sqrt() / rms_mean
        } else {
            0.0
        };

        Some(AggregatedFeatures {
            mfcc_mean: mfcc_mean.try_into().ok()?,
            mfcc_variance: mfcc_variance.try_into().ok()?,
            spectral_centroid_mean,
            spectral_centroid_variance,
            spectral_rolloff_mean,
            spectral_rolloff_variance,
            zero_crossing_rate_mean,
            zero_crossing_rate_variance,
            rms_mean,
            rms_variance,
            chroma_mean: chroma_mean.try_into().ok()?,
            chroma_variance: chroma_variance.try_into().ok()?,
            spectral_bandwidth: spectral_centroid_variance.sqrt(),
            spectral_flatness,
            frame_count: n,
            sample_rate: buffer.sample_rate,
            duration: buffer.duration,
            latest,
        })
    }
}

/// Start offsets of every frame: full frames, then one zero-padded partial frame
pub fn frame_starts(len: usize, frame_size: usize, hop: usize) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut start = 0;
    while start + frame_size <= len {
        starts.push(start);
        start += hop;
    }
    if start < len {
        starts.push(start);
    }
    starts
}

/// Default extractor built on `FftFrameAnalyzer`
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralFeatureExtractor;

impl SpectralFeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Run the windowing and aggregation loop with any frame analyzer
    pub fn extract_with(
        &self,
        analyzer: &dyn FrameAnalyzer,
        buffer: &PcmBuffer,
        cancel: &CancellationFlag,
    ) -> Result<AggregatedFeatures> {
        check_input(buffer)?;

        let frame_size = analyzer.frame_size();
        let starts = frame_starts(buffer.len(), frame_size, HOP_SIZE);
        if starts.len() < MIN_FRAMES {
            return Err(AnalysisError::new(
                ErrorCode::AudioTooShort,
                format!(
                    "Only {} analysis frames fit in {:.2}s of audio, {} required",
                    starts.len(),
                    buffer.duration,
                    MIN_FRAMES
                ),
            )
            .with_detail("frameCount", starts.len() as u64));
        }

        let mut acc = FeatureAccumulator::default();
        let mut padded = vec![0.0f32; frame_size];
        let mut skipped = 0usize;

        for start in starts {
            cancel.check(Stage::Features)?;

            let end = (start + frame_size).min(buffer.len());
            let frame = if end - start == frame_size {
                &buffer.samples[start..end]
            } else {
                padded.iter_mut().for_each(|s| *s = 0.0);
                padded[..end - start].copy_from_slice(&buffer.samples[start..end]);
                &padded[..]
            };

            let features = analyzer.analyze(frame);
            if !features.is_finite() {
                warn!("Skipping frame at sample {} with non-finite features", start);
                skipped += 1;
                continue;
            }
            acc.push(features);
        }

        if acc.count < MIN_FRAMES {
            return Err(AnalysisError::new(
                ErrorCode::NoValidFrames,
                format!("{} of {} frames had non-finite features", skipped, skipped + acc.count),
            ));
        }

        debug!("Aggregated {} frames ({} skipped)", acc.count, skipped);

        acc.finish(buffer)
            .ok_or_else(|| AnalysisError::new(ErrorCode::FeatureExtractionFailed, "No frames aggregated"))
    }
}

impl FeatureExtractor for SpectralFeatureExtractor {
    fn extract(&self, buffer: &PcmBuffer, cancel: &CancellationFlag) -> Result<AggregatedFeatures> {
        check_input(buffer)?;
        let analyzer = FftFrameAnalyzer::new(FRAME_SIZE, buffer.sample_rate);
        self.extract_with(&analyzer, buffer, cancel)
    }

    fn name(&self) -> &'static str {
        "spectral"
    }
}

fn check_input(buffer: &PcmBuffer) -> Result<()> {
    if buffer.is_empty() {
        return Err(AnalysisError::new(ErrorCode::NoSamples, "Audio buffer has no samples"));
    }
    if buffer.sample_rate == 0 {
        return Err(AnalysisError::new(ErrorCode::InvalidSampleRate, "Sample rate is 0 Hz"));
    }
    Ok(())
}
