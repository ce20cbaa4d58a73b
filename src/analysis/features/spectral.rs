//! FFT-backed frame analysis
//!
//! Spectral features are computed from the Hann-windowed magnitude spectrum;
//! zero-crossing rate and RMS come from the raw frame.

use super::chroma::{fold_spectrum, normalize_max};
use super::mel::MelFilterbank;
use super::FrameFeatures;
use crate::analysis::traits::FrameAnalyzer;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Spectral rolloff threshold (85% of spectral energy)
const ROLLOFF_THRESHOLD: f32 = 0.85;

/// Chroma frequency range in Hz
pub const CHROMA_MIN_HZ: f32 = 55.0;
pub const CHROMA_MAX_HZ: f32 = 5000.0;

/// Symmetric Hann window (zero at both ends)
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / (size as f32 - 1.0).max(1.0)).cos())
        })
        .collect()
}

/// Windowed forward FFT returning the power spectrum (positive frequencies)
pub struct PowerSpectrum {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl PowerSpectrum {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            window: hann_window(fft_size),
        }
    }

    pub fn size(&self) -> usize {
        self.window.len()
    }

    /// Power per bin, `size / 2 + 1` values; short frames are zero-padded
    pub fn compute(&self, frame: &[f32]) -> Vec<f32> {
        let size = self.size();
        let mut buffer: Vec<Complex<f32>> = self
            .window
            .iter()
            .enumerate()
            .map(|(i, w)| Complex::new(frame.get(i).copied().unwrap_or(0.0) * w, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        buffer[..size / 2 + 1].iter().map(|c| c.norm_sqr()).collect()
    }
}

/// Default `FrameAnalyzer`: rustfft spectrum, mel cepstrum and chroma
pub struct FftFrameAnalyzer {
    spectrum: PowerSpectrum,
    mel: MelFilterbank,
    sample_rate: u32,
}

impl FftFrameAnalyzer {
    pub fn new(frame_size: usize, sample_rate: u32) -> Self {
        Self {
            spectrum: PowerSpectrum::new(frame_size),
            mel: MelFilterbank::new(sample_rate, frame_size),
            sample_rate,
        }
    }

    fn bin_hz(&self) -> f32 {
        self.sample_rate as f32 / self.spectrum.size() as f32
    }
}

impl FrameAnalyzer for FftFrameAnalyzer {
    fn analyze(&self, frame: &[f32]) -> FrameFeatures {
        let power = self.spectrum.compute(frame);
        let magnitude: Vec<f32> = power.iter().map(|p| p.sqrt()).collect();
        let bin_hz = self.bin_hz();

        let mut chroma = fold_spectrum(&power, bin_hz, CHROMA_MIN_HZ, CHROMA_MAX_HZ);
        normalize_max(&mut chroma);

        FrameFeatures {
            mfcc: self.mel.mfcc(&power),
            spectral_centroid: spectral_centroid(&magnitude, bin_hz),
            spectral_rolloff: spectral_rolloff(&power, bin_hz),
            zero_crossing_rate: zero_crossing_rate(frame),
            rms: rms(frame),
            chroma,
        }
    }

    fn frame_size(&self) -> usize {
        self.spectrum.size()
    }
}

/// Magnitude-weighted mean frequency in Hz
pub fn spectral_centroid(magnitude: &[f32], bin_hz: f32) -> f32 {
    let weighted: f32 = magnitude
        .iter()
        .enumerate()
        .map(|(i, m)| i as f32 * bin_hz * m)
        .sum();
    let total: f32 = magnitude.iter().sum();

    if total > 1e-10 {
        weighted / total
    } else {
        0.0
    }
}

/// Frequency below which 85% of the spectral energy lies
pub fn spectral_rolloff(power: &[f32], bin_hz: f32) -> f32 {
    let total: f32 = power.iter().sum();
    if total < 1e-10 {
        return 0.0;
    }

    let threshold = ROLLOFF_THRESHOLD * total;
    let mut cumulative = 0.0;
    for (i, p) in power.iter().enumerate() {
        cumulative += p;
        if cumulative >= threshold {
            return i as f32 * bin_hz;
        }
    }

    (power.len().saturating_sub(1)) as f32 * bin_hz
}

/// Sign changes per sample
pub fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / frame.len() as f32
}

/// Root-mean-square amplitude
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}
