//! Heuristic genre classification
//!
//! Every label starts at a base score and collects additive bonuses from
//! four overlapping rule groups: tempo bands, spectral shape, energy and
//! rhythm, and harmony. Scores are min-max normalized across the
//! vocabulary afterwards, so a clip can rank highly for several genres.

pub mod weights;

use crate::analysis::features::AggregatedFeatures;
use crate::analysis::traits::GenreClassifier;
use crate::error::{AnalysisError, ErrorCode, Result};
use crate::types::{Genre, GenreResult, TempoResult};
use std::collections::BTreeMap;
use tracing::debug;
use weights::*;

pub use weights::GenreConfig;

/// Score accumulator keyed by vocabulary position
struct Scores {
    values: [f64; 15],
}

impl Scores {
    fn new(base: f64) -> Self {
        Self { values: [base; 15] }
    }

    fn add(&mut self, genre: Genre, bonus: f64) {
        if let Some(i) = Genre::VOCABULARY.iter().position(|g| *g == genre) {
            self.values[i] += bonus;
        }
    }

    fn add_all(&mut self, genres: &[Genre], bonus: f64) {
        for genre in genres {
            self.add(*genre, bonus);
        }
    }
}

/// Rule-based classifier over aggregated features and tempo
#[derive(Debug, Clone, Default)]
pub struct HeuristicGenreClassifier {
    config: GenreConfig,
}

impl HeuristicGenreClassifier {
    pub fn new(config: GenreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GenreConfig {
        &self.config
    }

    fn score_tempo(&self, scores: &mut Scores, bpm: f64) {
        let cfg = &self.config;
        for band in &cfg.tempo_bands {
            let centre = (band.min_bpm + band.max_bpm) / 2.0;
            let half = (band.max_bpm - band.min_bpm) / 2.0;

            if bpm >= band.min_bpm && bpm <= band.max_bpm {
                let distance = if half > 0.0 { (bpm - centre).abs() / half } else { 0.0 };
                scores.add(band.genre, (1.0 - distance) * band.weight);
            } else {
                let miss = if bpm < band.min_bpm {
                    band.min_bpm - bpm
                } else {
                    bpm - band.max_bpm
                };
                if miss <= cfg.near_miss_bpm {
                    scores.add(
                        band.genre,
                        cfg.near_miss_factor * band.weight * (1.0 - miss / cfg.near_miss_bpm),
                    );
                }
            }
        }
    }

    fn score_spectral(&self, scores: &mut Scores, features: &AggregatedFeatures) {
        let cfg = &self.config;
        let centroid = features.spectral_centroid_mean;

        if centroid > cfg.bright_centroid || features.spectral_rolloff_mean > cfg.high_rolloff {
            scores.add_all(BRIGHT_GENRES, cfg.spectral_bonus);
        } else if centroid >= cfg.mid_centroid {
            scores.add_all(MID_GENRES, cfg.spectral_bonus);
        } else {
            scores.add_all(DARK_GENRES, cfg.spectral_bonus);
        }

        if features.spectral_bandwidth > cfg.wide_bandwidth {
            scores.add_all(WIDE_GENRES, cfg.spectral_bonus);
        } else if features.spectral_bandwidth < cfg.narrow_bandwidth {
            scores.add_all(NARROW_GENRES, cfg.spectral_bonus);
        }
    }

    fn score_energy(&self, scores: &mut Scores, features: &AggregatedFeatures) {
        let cfg = &self.config;
        let rms = features.rms_mean;

        let group = if rms > cfg.high_rms {
            HIGH_ENERGY_GENRES
        } else if rms >= cfg.medium_rms {
            MEDIUM_ENERGY_GENRES
        } else {
            LOW_ENERGY_GENRES
        };
        scores.add_all(group, cfg.energy_bonus);

        if features.zero_crossing_rate_mean > cfg.percussive_zcr {
            scores.add_all(PERCUSSIVE_GENRES, cfg.energy_bonus);
        }
        if features.rms_variance > cfg.dynamic_rms_variance {
            scores.add_all(DYNAMIC_GENRES, cfg.energy_bonus);
        }
    }

    fn score_harmony(&self, scores: &mut Scores, features: &AggregatedFeatures) {
        let cfg = &self.config;
        let complexity = harmonic_complexity(&features.chroma_mean);

        if complexity < cfg.simple_complexity {
            scores.add_all(SIMPLE_HARMONY_GENRES, cfg.harmonic_bonus);
        } else if complexity > cfg.complex_complexity {
            scores.add_all(COMPLEX_HARMONY_GENRES, cfg.harmonic_bonus);
        }

        let Some(intervals) = top_intervals(&features.chroma_mean) else {
            return;
        };
        if intervals.iter().all(|i| PENTATONIC_INTERVALS.contains(i)) {
            scores.add_all(PENTATONIC_GENRES, cfg.pattern_bonus);
        }
        if intervals.contains(&3) {
            scores.add_all(MINOR_GENRES, cfg.pattern_bonus);
        }
        if intervals.contains(&4) {
            scores.add_all(MAJOR_GENRES, cfg.pattern_bonus);
        }
        if intervals.contains(&10) || intervals.contains(&6) {
            scores.add_all(LATIN_GENRES, cfg.pattern_bonus);
        }
    }
}

impl GenreClassifier for HeuristicGenreClassifier {
    fn classify(&self, features: &AggregatedFeatures, tempo: Option<&TempoResult>) -> Result<GenreResult> {
        validate(features, tempo)?;

        let mut scores = Scores::new(self.config.base_score);
        if let Some(tempo) = tempo {
            self.score_tempo(&mut scores, tempo.bpm);
        }
        self.score_spectral(&mut scores, features);
        self.score_energy(&mut scores, features);
        self.score_harmony(&mut scores, features);

        let normalized = min_max_normalize(&scores.values);

        let mut ranked: Vec<(Genre, f64)> = Genre::VOCABULARY.iter().copied().zip(normalized).collect();
        // Stable sort keeps vocabulary order among ties
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (primary, confidence) = ranked[0];
        if confidence <= self.config.primary_threshold {
            return Err(AnalysisError::new(
                ErrorCode::NoGenresDetected,
                format!("Strongest genre score {:.3} is not above {}", confidence, self.config.primary_threshold),
            ));
        }

        let secondary: Vec<Genre> = ranked[1..]
            .iter()
            .filter(|(_, score)| *score > self.config.secondary_threshold)
            .take(self.config.max_secondary)
            .map(|(genre, _)| *genre)
            .collect();

        debug!(
            "Genre: {} ({:.3}), secondary {:?}",
            primary.label(),
            confidence,
            secondary.iter().map(|g| g.label()).collect::<Vec<_>>()
        );

        Ok(GenreResult {
            primary,
            confidence,
            secondary,
            scores: ranked.into_iter().collect::<BTreeMap<_, _>>(),
        })
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

fn validate(features: &AggregatedFeatures, tempo: Option<&TempoResult>) -> Result<()> {
    if !features.spectral_centroid_mean.is_finite() {
        return Err(AnalysisError::invalid_features("spectral centroid is not finite"));
    }
    if !features.rms_mean.is_finite() || features.rms_mean < 0.0 {
        return Err(AnalysisError::invalid_features(format!("RMS {} is invalid", features.rms_mean)));
    }
    if features.chroma_mean.iter().any(|c| !c.is_finite()) {
        return Err(AnalysisError::invalid_features("chroma contains non-finite values"));
    }
    let scalars = [
        features.spectral_rolloff_mean,
        features.spectral_bandwidth,
        features.zero_crossing_rate_mean,
        features.rms_variance,
    ];
    if scalars.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::invalid_features("spectral statistics contain non-finite values"));
    }
    if let Some(tempo) = tempo {
        if !(tempo.bpm > 0.0 && tempo.bpm <= 300.0) {
            return Err(AnalysisError::invalid_features(format!("tempo {} BPM is out of range", tempo.bpm))
                .with_detail("bpm", tempo.bpm));
        }
    }
    Ok(())
}

/// Shannon entropy of the normalized chroma divided by log2(12), in [0, 1]
pub fn harmonic_complexity(chroma: &[f32; 12]) -> f64 {
    let total: f64 = chroma.iter().map(|c| c.max(0.0) as f64).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let entropy: f64 = chroma
        .iter()
        .map(|c| c.max(0.0) as f64 / total)
        .filter(|p| *p > 0.0)
        .map(|p| -p * p.log2())
        .sum();
    entropy / 12f64.log2()
}

/// Intervals of the three strongest chroma bins above the strongest one
fn top_intervals(chroma: &[f32; 12]) -> Option<[usize; 3]> {
    let mut order: Vec<usize> = (0..12).collect();
    order.sort_by(|a, b| chroma[*b].total_cmp(&chroma[*a]));
    if chroma[order[0]] <= 0.0 {
        return None;
    }
    let tonic = order[0];
    Some([0, (order[1] + 12 - tonic) % 12, (order[2] + 12 - tonic) % 12])
}

/// Min-max normalize to [0, 1]; uniform 1/n when all scores are equal
fn min_max_normalize(values: &[f64; 15]) -> [f64; 15] {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range < 1e-12 {
        return [1.0 / values.len() as f64; 15];
    }
    (*values).map(|v| (v - min) / range)
}
