//! Krumhansl-Kessler key profiles and correlation search

use crate::types::{PitchClass, Scale};

/// Krumhansl-Kessler major profile, tonic first
pub const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor profile, tonic first
pub const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

/// Best-matching key hypothesis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyHypothesis {
    pub root: PitchClass,
    pub scale: Scale,
    pub correlation: f64,
}

/// Pearson correlation; 0 when either side has no variance
pub fn pearson(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < 1e-12 {
        0.0
    } else {
        cov / denom
    }
}

/// Profile rotated so its tonic lands on `root`
pub fn rotate(profile: &[f64; 12], root: usize) -> [f64; 12] {
    let mut rotated = [0.0; 12];
    for (i, v) in profile.iter().enumerate() {
        rotated[(i + root) % 12] = *v;
    }
    rotated
}

/// Evaluate all 24 root/scale hypotheses, keeping the highest correlation
///
/// Ties resolve to the first hypothesis in C..B order, major before minor.
pub fn best_key(chroma: &[f64; 12]) -> KeyHypothesis {
    let mut best = KeyHypothesis {
        root: PitchClass::C,
        scale: Scale::Major,
        correlation: f64::MIN,
    };

    for root in PitchClass::ALL {
        for (scale, profile) in [(Scale::Major, &MAJOR_PROFILE), (Scale::Minor, &MINOR_PROFILE)] {
            let correlation = pearson(chroma, &rotate(profile, root.to_index()));
            if correlation > best.correlation {
                best = KeyHypothesis {
                    root,
                    scale,
                    correlation,
                };
            }
        }
    }

    best
}
