//! Mood detection from energy, valence and intensity dimensions

pub mod weights;

use crate::analysis::features::AggregatedFeatures;
use crate::analysis::traits::MoodDetector;
use crate::error::{AnalysisError, Result};
use crate::types::{
    EnergyLevel, IntensityLevel, Mood, MoodDimensions, MoodResult, TempoResult, ValenceLevel,
};
use std::collections::BTreeMap;
use tracing::debug;
use weights::{BucketCondition, DimensionWeights, MoodProfile, TempoBoost};

pub use weights::MoodConfig;

/// Semitone steps of the major scale above its tonic
const MAJOR_SCALE: [usize; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Dimension-based mood detector
#[derive(Debug, Clone, Default)]
pub struct DimensionalMoodDetector {
    config: MoodConfig,
}

impl DimensionalMoodDetector {
    pub fn new(config: MoodConfig) -> Self {
        Self { config }
    }

    fn norm(value: f64, range: f64) -> f64 {
        if range <= 0.0 {
            return 0.0;
        }
        (value / range).clamp(0.0, 1.0)
    }

    fn weighted(w: &DimensionWeights, a: f64, b: f64, c: f64) -> f64 {
        w.first * a + w.second * b + w.third * c
    }

    /// Continuous dimensions in [0, 1]
    pub fn dimensions(&self, features: &AggregatedFeatures, tempo: Option<&TempoResult>) -> MoodDimensions {
        let cfg = &self.config;

        let tempo_score = tempo
            .map(|t| Self::norm(t.bpm - cfg.tempo_floor, cfg.tempo_span))
            .unwrap_or(cfg.neutral_tempo);
        let energy = Self::weighted(
            &cfg.energy_weights,
            Self::norm(features.rms_mean as f64, cfg.rms_range),
            tempo_score,
            Self::norm(features.spectral_rolloff_mean as f64, cfg.rolloff_range),
        );

        let (major, minor) = triad_strengths(&features.chroma_mean);
        let triad = if major > minor {
            cfg.major_triad_score
        } else {
            cfg.minor_triad_score
        };
        let valence = Self::weighted(
            &cfg.valence_weights,
            Self::norm(features.spectral_centroid_mean as f64, cfg.centroid_range),
            chroma_brightness(&features.chroma_mean),
            triad,
        );

        let intensity = Self::weighted(
            &cfg.intensity_weights,
            Self::norm(features.zero_crossing_rate_mean as f64, cfg.zcr_range),
            Self::norm(features.rms_variance as f64, cfg.rms_variance_range),
            Self::norm(features.spectral_centroid_variance as f64, cfg.centroid_variance_range),
        );

        MoodDimensions {
            energy: energy.clamp(0.0, 1.0),
            valence: valence.clamp(0.0, 1.0),
            intensity: intensity.clamp(0.0, 1.0),
        }
    }

    fn energy_level(&self, energy: f64) -> EnergyLevel {
        let (low, high) = self.config.energy_thresholds;
        if energy < low {
            EnergyLevel::Low
        } else if energy < high {
            EnergyLevel::Medium
        } else {
            EnergyLevel::High
        }
    }

    fn valence_level(&self, valence: f64) -> ValenceLevel {
        let (sad, happy) = self.config.valence_thresholds;
        if valence < sad {
            ValenceLevel::Sad
        } else if valence < happy {
            ValenceLevel::Neutral
        } else {
            ValenceLevel::Happy
        }
    }

    fn intensity_level(&self, intensity: f64) -> IntensityLevel {
        let (calm, aggressive) = self.config.intensity_thresholds;
        if intensity < calm {
            IntensityLevel::Calm
        } else if intensity < aggressive {
            IntensityLevel::Moderate
        } else {
            IntensityLevel::Aggressive
        }
    }

    fn raw_score(
        &self,
        profile: &MoodProfile,
        dims: &MoodDimensions,
        levels: (EnergyLevel, ValenceLevel, IntensityLevel),
        bpm: Option<f64>,
    ) -> f64 {
        let term = |w: f64, x: f64| if w >= 0.0 { w * x } else { -w * (1.0 - x) };
        let mut score = term(profile.energy, dims.energy)
            + term(profile.valence, dims.valence)
            + term(profile.intensity, dims.intensity);

        let bucket_hit = match profile.bucket {
            BucketCondition::Energy(level) => level == levels.0,
            BucketCondition::Valence(level) => level == levels.1,
            BucketCondition::Intensity(level) => level == levels.2,
        };
        if bucket_hit {
            score += profile.bucket_bonus;
        }

        if let Some(bpm) = bpm {
            let boosted = match profile.tempo {
                TempoBoost::Fast => bpm > self.config.fast_tempo,
                TempoBoost::Slow => bpm < self.config.slow_tempo,
                TempoBoost::None => false,
            };
            if boosted {
                score += self.config.tempo_boost;
            }
        }

        score
    }

    /// Top score plus a capped bonus for its lead over the runner-up
    fn confidence(&self, top: f64, runner_up: f64) -> f64 {
        let cfg = &self.config;
        let separation = (cfg.separation_factor * (top - runner_up)).min(cfg.separation_cap);
        (top + separation).min(1.0)
    }

    /// Labels whose score relative to the top clears the tag threshold
    ///
    /// `ranked` must be sorted by descending score.
    fn tags(&self, ranked: &[(Mood, f64)]) -> Vec<Mood> {
        let cfg = &self.config;
        let max = ranked.first().map(|(_, s)| *s).filter(|s| *s > 0.0).unwrap_or(1.0);
        ranked
            .iter()
            .filter(|(_, s)| s / max > cfg.tag_threshold)
            .take(cfg.max_tags)
            .map(|(m, _)| *m)
            .collect()
    }
}

impl MoodDetector for DimensionalMoodDetector {
    fn detect(&self, features: &AggregatedFeatures, tempo: Option<&TempoResult>) -> Result<MoodResult> {
        validate(features, tempo)?;
        let cfg = &self.config;

        let dims = self.dimensions(features, tempo);
        let levels = (
            self.energy_level(dims.energy),
            self.valence_level(dims.valence),
            self.intensity_level(dims.intensity),
        );
        let bpm = tempo.map(|t| t.bpm);

        let mut raw: Vec<(Mood, f64)> = Mood::VOCABULARY
            .iter()
            .map(|mood| {
                let score = cfg
                    .profiles
                    .iter()
                    .find(|p| p.mood == *mood)
                    .map(|p| self.raw_score(p, &dims, levels, bpm))
                    .unwrap_or(0.0);
                (*mood, score.max(0.0))
            })
            .collect();
        raw.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (primary, top) = raw[0];
        let runner_up = raw.get(1).map(|(_, s)| *s).unwrap_or(0.0);
        let max = if top > 0.0 { top } else { 1.0 };

        let confidence = self.confidence(top, runner_up);
        let tags = self.tags(&raw);

        let scores: BTreeMap<Mood, f64> = raw.iter().map(|(m, s)| (*m, s / max)).collect();

        debug!(
            "Mood: {:?} (confidence {:.3}), energy {:.2}, valence {:.2}, intensity {:.2}",
            primary, confidence, dims.energy, dims.valence, dims.intensity
        );

        Ok(MoodResult {
            primary,
            energy: levels.0,
            valence: levels.1,
            intensity: Some(levels.2),
            confidence,
            tags,
            scores,
            dimensions: dims,
        })
    }

    fn name(&self) -> &'static str {
        "dimensional"
    }
}

fn validate(features: &AggregatedFeatures, tempo: Option<&TempoResult>) -> Result<()> {
    let scalars = [
        ("rms", features.rms_mean),
        ("rms variance", features.rms_variance),
        ("spectral centroid", features.spectral_centroid_mean),
        ("spectral centroid variance", features.spectral_centroid_variance),
        ("spectral rolloff", features.spectral_rolloff_mean),
        ("zero crossing rate", features.zero_crossing_rate_mean),
    ];
    if let Some((name, value)) = scalars.iter().find(|(_, v)| !v.is_finite()) {
        return Err(AnalysisError::invalid_features(format!("{} is {}", name, value)));
    }
    if features.chroma_mean.iter().any(|c| !c.is_finite()) {
        return Err(AnalysisError::invalid_features("chroma contains non-finite values"));
    }
    if let Some(t) = tempo {
        if !t.bpm.is_finite() {
            return Err(AnalysisError::invalid_features("tempo is not finite"));
        }
    }
    Ok(())
}

/// Strongest major and minor triad sums over all roots
fn triad_strengths(chroma: &[f32; 12]) -> (f64, f64) {
    let at = |i: usize| chroma[i % 12] as f64;
    (0..12).fold((0.0f64, 0.0f64), |(major, minor), root| {
        (
            major.max(at(root) + at(root + 4) + at(root + 7)),
            minor.max(at(root) + at(root + 3) + at(root + 7)),
        )
    })
}

/// Share of chroma energy on the major scale of the strongest bin
fn chroma_brightness(chroma: &[f32; 12]) -> f64 {
    let total: f64 = chroma.iter().map(|c| c.max(0.0) as f64).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let tonic = (0..12)
        .max_by(|a, b| chroma[*a].total_cmp(&chroma[*b]))
        .unwrap_or(0);
    let on_scale: f64 = MAJOR_SCALE
        .iter()
        .map(|step| chroma[(tonic + step) % 12].max(0.0) as f64)
        .sum();
    on_scale / total
}
