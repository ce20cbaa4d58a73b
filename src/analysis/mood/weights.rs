//! Mood normalization ranges, dimension weights and label profiles

use crate::types::{EnergyLevel, IntensityLevel, Mood, ValenceLevel};
use serde::{Deserialize, Serialize};

/// Bucket a label profile rewards
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BucketCondition {
    Energy(EnergyLevel),
    Valence(ValenceLevel),
    Intensity(IntensityLevel),
}

/// Tempo-derived boost a label profile receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempoBoost {
    None,
    Fast,
    Slow,
}

/// Linear combination of the three dimensions for one label
///
/// A negative weight scores the complement `1 - x` with weight `|w|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodProfile {
    pub mood: Mood,
    pub energy: f64,
    pub valence: f64,
    pub intensity: f64,
    pub bucket: BucketCondition,
    pub bucket_bonus: f64,
    pub tempo: TempoBoost,
}

impl MoodProfile {
    #[allow(clippy::too_many_arguments)]
    const fn new(
        mood: Mood,
        energy: f64,
        valence: f64,
        intensity: f64,
        bucket: BucketCondition,
        bucket_bonus: f64,
        tempo: TempoBoost,
    ) -> Self {
        Self {
            mood,
            energy,
            valence,
            intensity,
            bucket,
            bucket_bonus,
            tempo,
        }
    }
}

/// Weights for the three dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub first: f64,
    pub second: f64,
    pub third: f64,
}

/// Named ranges and weights of the mood detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodConfig {
    // Normalization ranges: value / range, clamped to [0, 1]
    pub rms_range: f64,
    pub tempo_floor: f64,
    pub tempo_span: f64,
    pub rolloff_range: f64,
    pub centroid_range: f64,
    pub zcr_range: f64,
    pub rms_variance_range: f64,
    pub centroid_variance_range: f64,
    /// Tempo score used when no tempo is available
    pub neutral_tempo: f64,

    /// RMS, tempo, rolloff
    pub energy_weights: DimensionWeights,
    /// Centroid, chroma brightness, triad quality
    pub valence_weights: DimensionWeights,
    /// ZCR, RMS variance, centroid variance
    pub intensity_weights: DimensionWeights,
    pub major_triad_score: f64,
    pub minor_triad_score: f64,

    pub energy_thresholds: (f64, f64),
    pub valence_thresholds: (f64, f64),
    pub intensity_thresholds: (f64, f64),

    pub profiles: Vec<MoodProfile>,
    pub fast_tempo: f64,
    pub slow_tempo: f64,
    pub tempo_boost: f64,

    pub tag_threshold: f64,
    pub max_tags: usize,
    pub separation_factor: f64,
    pub separation_cap: f64,
}

impl Default for MoodConfig {
    fn default() -> Self {
        use BucketCondition::*;
        use Mood::*;
        Self {
            rms_range: 0.3,
            tempo_floor: 60.0,
            tempo_span: 120.0,
            rolloff_range: 8000.0,
            centroid_range: 4000.0,
            zcr_range: 0.2,
            rms_variance_range: 0.02,
            centroid_variance_range: 1e6,
            neutral_tempo: 0.5,
            energy_weights: DimensionWeights {
                first: 0.5,
                second: 0.3,
                third: 0.2,
            },
            valence_weights: DimensionWeights {
                first: 0.5,
                second: 0.2,
                third: 0.3,
            },
            intensity_weights: DimensionWeights {
                first: 0.4,
                second: 0.35,
                third: 0.25,
            },
            major_triad_score: 0.8,
            minor_triad_score: 0.2,
            energy_thresholds: (0.35, 0.65),
            valence_thresholds: (0.35, 0.55),
            intensity_thresholds: (0.35, 0.65),
            profiles: vec![
                MoodProfile::new(Energetic, 0.6, 0.2, 0.2, Energy(EnergyLevel::High), 0.2, TempoBoost::Fast),
                MoodProfile::new(Melancholic, -0.3, -0.5, -0.2, Valence(ValenceLevel::Sad), 0.2, TempoBoost::Slow),
                MoodProfile::new(Uplifting, 0.3, 0.5, -0.2, Valence(ValenceLevel::Happy), 0.2, TempoBoost::None),
                MoodProfile::new(
                    Aggressive,
                    0.3,
                    -0.2,
                    0.5,
                    Intensity(IntensityLevel::Aggressive),
                    0.2,
                    TempoBoost::None,
                ),
                MoodProfile::new(Chill, -0.4, 0.2, -0.4, Energy(EnergyLevel::Low), 0.2, TempoBoost::Slow),
                MoodProfile::new(Dark, -0.2, -0.6, 0.2, Valence(ValenceLevel::Sad), 0.1, TempoBoost::None),
                MoodProfile::new(Bright, 0.2, 0.6, -0.2, Valence(ValenceLevel::Happy), 0.1, TempoBoost::None),
                MoodProfile::new(
                    Tense,
                    0.2,
                    -0.3,
                    0.5,
                    Intensity(IntensityLevel::Aggressive),
                    0.1,
                    TempoBoost::None,
                ),
                MoodProfile::new(Relaxed, -0.3, 0.2, -0.5, Intensity(IntensityLevel::Calm), 0.2, TempoBoost::None),
                MoodProfile::new(Party, 0.4, 0.3, 0.3, Energy(EnergyLevel::High), 0.1, TempoBoost::Fast),
            ],
            fast_tempo: 120.0,
            slow_tempo: 90.0,
            tempo_boost: 0.2,
            tag_threshold: 0.3,
            max_tags: 4,
            separation_factor: 2.0,
            separation_cap: 0.3,
        }
    }
}
