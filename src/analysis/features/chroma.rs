//! Pitch-class folding of a power spectrum

use crate::types::PitchClass;

/// Fold spectral power into 12 pitch-class bins
///
/// Each bin between `min_hz` and `max_hz` adds its power to the pitch class
/// nearest to its centre frequency. The result is not normalized.
pub fn fold_spectrum(power: &[f32], bin_hz: f32, min_hz: f32, max_hz: f32) -> [f32; 12] {
    let mut chroma = [0.0f32; 12];
    if bin_hz <= 0.0 {
        return chroma;
    }

    let first = ((min_hz / bin_hz).ceil() as usize).max(1);
    let last = ((max_hz / bin_hz).floor() as usize).min(power.len().saturating_sub(1));

    for (bin, &p) in power.iter().enumerate().take(last + 1).skip(first) {
        if let Some(pc) = PitchClass::from_frequency(bin as f32 * bin_hz) {
            chroma[pc.to_index()] += p;
        }
    }
    chroma
}

/// Scale so the strongest bin is 1.0 (no-op on an all-zero vector)
pub fn normalize_max(chroma: &mut [f32; 12]) {
    let max = chroma.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        chroma.iter_mut().for_each(|c| *c /= max);
    }
}

/// Scale so the bins sum to 1.0 (no-op on an all-zero vector)
pub fn normalize_sum(chroma: &mut [f32; 12]) {
    let sum: f32 = chroma.iter().sum();
    if sum > 0.0 {
        chroma.iter_mut().for_each(|c| *c /= sum);
    }
}
