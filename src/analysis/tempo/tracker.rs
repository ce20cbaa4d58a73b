//! Autocorrelation beat tracker
//!
//! 1. Onset strength: half-wave rectified flux of frame energy
//!    (1024-sample window, 512-sample hop)
//! 2. Mean-removed autocorrelation of the onset envelope over lags
//!    spanning 30-300 BPM
//! 3. Parabolic interpolation around the strongest lag
//!
//! The first onset above mean + one standard deviation is reported as the
//! beat offset. No confidence is supplied; the estimator assigns one.

use crate::analysis::traits::{BeatTracker, RawTempo};
use crate::cancel::CancellationFlag;
use crate::error::{AnalysisError, ErrorCode, Result};
use crate::types::Stage;
use tracing::trace;

const WINDOW: usize = 1024;
const HOP: usize = 512;
const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 300.0;

/// How many lags to correlate between cancellation checks
const CANCEL_CHECK_EVERY: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct AutocorrelationTracker;

impl AutocorrelationTracker {
    pub fn new() -> Self {
        Self
    }
}

/// Half-wave rectified energy flux, one value per hop
pub fn onset_envelope(samples: &[f32], cancel: &CancellationFlag) -> Result<Vec<f32>> {
    if samples.len() < WINDOW {
        return Ok(Vec::new());
    }

    let frames = (samples.len() - WINDOW) / HOP + 1;
    let mut envelope = Vec::with_capacity(frames);
    let mut previous = 0.0f32;

    for i in 0..frames {
        if i % 256 == 0 {
            cancel.check(Stage::Tempo)?;
        }
        let start = i * HOP;
        let energy: f32 = samples[start..start + WINDOW].iter().map(|s| s * s).sum();
        envelope.push(if i == 0 { 0.0 } else { (energy - previous).max(0.0) });
        previous = energy;
    }

    Ok(envelope)
}

impl BeatTracker for AutocorrelationTracker {
    fn track(&self, samples: &[f32], sample_rate: u32, cancel: &CancellationFlag) -> Result<RawTempo> {
        let envelope = onset_envelope(samples, cancel)?;
        let frame_rate = sample_rate as f64 / HOP as f64;

        let min_lag = (60.0 * frame_rate / MAX_BPM).floor().max(1.0) as usize;
        let max_lag = (60.0 * frame_rate / MIN_BPM).ceil() as usize;
        if envelope.len() <= max_lag + 1 {
            return Err(AnalysisError::new(
                ErrorCode::TempoDetectionFailed,
                format!("Onset envelope too short ({} frames)", envelope.len()),
            ));
        }

        let mean = envelope.iter().map(|v| *v as f64).sum::<f64>() / envelope.len() as f64;
        let centred: Vec<f64> = envelope.iter().map(|v| *v as f64 - mean).collect();

        // One extra lag on each side for interpolation
        let lo = min_lag.saturating_sub(1).max(1);
        let hi = max_lag + 1;
        let mut acf = vec![0.0f64; hi + 1];
        for lag in lo..=hi {
            if (lag - lo) % CANCEL_CHECK_EVERY == 0 {
                cancel.check(Stage::Tempo)?;
            }
            acf[lag] = centred[..centred.len() - lag]
                .iter()
                .zip(&centred[lag..])
                .map(|(a, b)| a * b)
                .sum();
        }

        let (best_lag, best_value) = (min_lag..=max_lag)
            .map(|lag| (lag, acf[lag]))
            .fold((0usize, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if best_lag == 0 || best_value <= 0.0 {
            return Err(AnalysisError::new(
                ErrorCode::TempoDetectionFailed,
                "No periodicity found in onset envelope",
            ));
        }

        let refined = best_lag as f64 + parabolic_offset(acf[best_lag - 1], acf[best_lag], acf[best_lag + 1]);
        let bpm = 60.0 * frame_rate / refined;

        trace!("ACF peak at lag {:.2} frames -> {:.2} BPM", refined, bpm);

        Ok(RawTempo::Detailed {
            bpm,
            confidence: None,
            offset_seconds: first_strong_onset(&envelope).map(|frame| frame as f64 / frame_rate),
        })
    }

    fn name(&self) -> &'static str {
        "autocorrelation"
    }
}

/// Vertex offset of the parabola through three equally spaced points, in [-0.5, 0.5]
fn parabolic_offset(left: f64, centre: f64, right: f64) -> f64 {
    let denom = left - 2.0 * centre + right;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

fn first_strong_onset(envelope: &[f32]) -> Option<usize> {
    let n = envelope.len() as f64;
    let mean = envelope.iter().map(|v| *v as f64).sum::<f64>() / n;
    let var = envelope.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / n;
    let threshold = mean + var.sqrt();
    envelope.iter().position(|v| *v as f64 > threshold)
}
