//! Genre scoring weights and thresholds

use crate::types::Genre;
use serde::{Deserialize, Serialize};

/// Characteristic BPM band for one genre
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoBand {
    pub genre: Genre,
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub weight: f64,
}

impl TempoBand {
    const fn new(genre: Genre, min_bpm: f64, max_bpm: f64, weight: f64) -> Self {
        Self {
            genre,
            min_bpm,
            max_bpm,
            weight,
        }
    }
}

/// Named weights for every rule group of the heuristic classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenreConfig {
    /// Starting score for every label
    pub base_score: f64,

    // Tempo
    pub tempo_bands: Vec<TempoBand>,
    /// How far outside a band a tempo may fall and still score
    pub near_miss_bpm: f64,
    /// Fraction of the band weight available to a near miss
    pub near_miss_factor: f64,

    // Spectral
    /// Centroid (Hz) above which a clip counts as bright
    pub bright_centroid: f32,
    /// Centroid (Hz) at or above which a clip counts as mid-range
    pub mid_centroid: f32,
    /// Rolloff (Hz) above which a clip counts as bright
    pub high_rolloff: f32,
    pub wide_bandwidth: f32,
    pub narrow_bandwidth: f32,
    pub spectral_bonus: f64,

    // Rhythmic / energy
    pub high_rms: f32,
    pub medium_rms: f32,
    pub percussive_zcr: f32,
    pub dynamic_rms_variance: f32,
    pub energy_bonus: f64,

    // Harmonic
    /// Normalized chroma entropy below which harmony counts as simple
    pub simple_complexity: f64,
    /// Normalized chroma entropy above which harmony counts as complex
    pub complex_complexity: f64,
    pub harmonic_bonus: f64,
    pub pattern_bonus: f64,

    // Decision
    pub primary_threshold: f64,
    pub secondary_threshold: f64,
    pub max_secondary: usize,
}

impl Default for GenreConfig {
    fn default() -> Self {
        use Genre::*;
        Self {
            base_score: 0.1,
            tempo_bands: vec![
                TempoBand::new(Afrobeat, 95.0, 125.0, 0.3),
                TempoBand::new(AfroHouse, 118.0, 128.0, 0.35),
                TempoBand::new(Pop, 95.0, 130.0, 0.25),
                TempoBand::new(HipHop, 80.0, 100.0, 0.3),
                TempoBand::new(Rock, 100.0, 150.0, 0.25),
                TempoBand::new(Country, 80.0, 130.0, 0.2),
                TempoBand::new(LatinUrban, 85.0, 100.0, 0.3),
                TempoBand::new(Reggaeton, 88.0, 100.0, 0.35),
                TempoBand::new(Reggae, 60.0, 90.0, 0.3),
                TempoBand::new(Dancehall, 90.0, 110.0, 0.3),
                TempoBand::new(Electronic, 120.0, 140.0, 0.35),
                TempoBand::new(Jazz, 70.0, 140.0, 0.15),
                TempoBand::new(RnB, 60.0, 90.0, 0.25),
                TempoBand::new(Classical, 40.0, 120.0, 0.1),
                TempoBand::new(Trap, 130.0, 170.0, 0.3),
            ],
            near_miss_bpm: 10.0,
            near_miss_factor: 0.3,
            bright_centroid: 3000.0,
            mid_centroid: 1500.0,
            high_rolloff: 6000.0,
            wide_bandwidth: 800.0,
            narrow_bandwidth: 300.0,
            spectral_bonus: 0.2,
            high_rms: 0.2,
            medium_rms: 0.08,
            percussive_zcr: 0.1,
            dynamic_rms_variance: 0.01,
            energy_bonus: 0.15,
            simple_complexity: 0.75,
            complex_complexity: 0.9,
            harmonic_bonus: 0.15,
            pattern_bonus: 0.1,
            primary_threshold: 0.1,
            secondary_threshold: 0.2,
            max_secondary: 3,
        }
    }
}

// Rule group memberships

pub const BRIGHT_GENRES: &[Genre] = &[Genre::Rock, Genre::Electronic, Genre::Pop];
pub const MID_GENRES: &[Genre] = &[Genre::HipHop, Genre::RnB, Genre::Afrobeat, Genre::Trap];
pub const DARK_GENRES: &[Genre] = &[Genre::Jazz, Genre::Classical, Genre::Country];
pub const WIDE_GENRES: &[Genre] = &[Genre::Jazz, Genre::Classical];
pub const NARROW_GENRES: &[Genre] = &[Genre::Electronic, Genre::Pop, Genre::AfroHouse];

pub const HIGH_ENERGY_GENRES: &[Genre] = &[
    Genre::Rock,
    Genre::Electronic,
    Genre::Trap,
    Genre::Dancehall,
    Genre::AfroHouse,
];
pub const MEDIUM_ENERGY_GENRES: &[Genre] = &[
    Genre::Pop,
    Genre::HipHop,
    Genre::Afrobeat,
    Genre::Reggaeton,
    Genre::LatinUrban,
    Genre::Country,
];
pub const LOW_ENERGY_GENRES: &[Genre] = &[Genre::Jazz, Genre::Classical, Genre::RnB, Genre::Reggae];
pub const PERCUSSIVE_GENRES: &[Genre] = &[
    Genre::Rock,
    Genre::Trap,
    Genre::HipHop,
    Genre::Dancehall,
    Genre::Reggaeton,
];
pub const DYNAMIC_GENRES: &[Genre] = &[Genre::Classical, Genre::Jazz, Genre::Rock];

pub const SIMPLE_HARMONY_GENRES: &[Genre] = &[Genre::Electronic, Genre::HipHop, Genre::Trap];
pub const COMPLEX_HARMONY_GENRES: &[Genre] = &[Genre::Jazz, Genre::Classical];

pub const PENTATONIC_GENRES: &[Genre] = &[Genre::Afrobeat, Genre::Reggae, Genre::Country];
pub const MINOR_GENRES: &[Genre] = &[Genre::HipHop, Genre::RnB, Genre::Trap];
pub const MAJOR_GENRES: &[Genre] = &[Genre::Pop, Genre::Country, Genre::Rock];
pub const LATIN_GENRES: &[Genre] = &[Genre::LatinUrban, Genre::Reggaeton, Genre::Dancehall];

/// Intervals (semitones above the strongest bin) of a major pentatonic scale
pub const PENTATONIC_INTERVALS: &[usize] = &[0, 2, 4, 7, 9];
