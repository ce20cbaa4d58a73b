//! Deterministic synthetic analysis used when a real analysis cannot be produced
//!
//! Values are seeded from the FNV-1a hash of the source identifier, never from
//! audio content, and the result is tagged `ResultOrigin::SyntheticFallback`.

use crate::types::{
    AnalysisResult, AudioFormat, EnergyLevel, Genre, GenreResult, IntensityLevel, KeyResult,
    Mood, MoodDimensions, MoodResult, PitchClass, ResultOrigin, Scale, TempoResult,
    ValenceLevel,
};
use hash32::{FnvHasher, Hasher as Hash32Hasher};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::hash::Hasher;

/// Tempo ranges and draw weights
const TEMPO_BUCKETS: [(f64, f64, f64); 4] = [
    (60.0, 90.0, 0.20),
    (90.0, 120.0, 0.35),
    (120.0, 140.0, 0.30),
    (140.0, 180.0, 0.15),
];

const DURATION_RANGE: (f64, f64) = (120.0, 300.0);

const SYNTHETIC_SAMPLE_RATE: u32 = 44_100;

/// FNV-1a 32-bit hash of the source identifier
pub fn source_seed(source_id: &str) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(source_id.as_bytes());
    hasher.finish32()
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn synthesize_tempo(rng: &mut StdRng) -> TempoResult {
    let (lo, hi) = match WeightedIndex::new(TEMPO_BUCKETS.iter().map(|b| b.2)) {
        Ok(dist) => {
            let bucket = TEMPO_BUCKETS[dist.sample(rng)];
            (bucket.0, bucket.1)
        }
        Err(_) => (TEMPO_BUCKETS[1].0, TEMPO_BUCKETS[1].1),
    };
    TempoResult {
        bpm: round_to(rng.gen_range(lo..hi), 2),
        confidence: round_to(rng.gen_range(0.5..0.9), 3),
        offset_seconds: 0.0,
        octave_corrected: false,
    }
}

fn synthesize_key(rng: &mut StdRng) -> KeyResult {
    let root = PitchClass::from_index(rng.gen_range(0..12));
    let scale = if rng.gen_bool(0.5) { Scale::Major } else { Scale::Minor };
    KeyResult::new(root, scale, round_to(rng.gen_range(0.5..0.9), 3))
}

fn synthesize_genre(rng: &mut StdRng) -> GenreResult {
    let mut order = Genre::VOCABULARY.to_vec();
    order.shuffle(rng);

    let confidence = round_to(rng.gen_range(0.5..0.9), 3);
    let mut result = GenreResult::unknown();
    result.primary = order[0];
    result.confidence = confidence;
    result.secondary = order[1..3].to_vec();

    // Strictly below the primary so it stays the argmax
    for (rank, genre) in order.iter().enumerate() {
        let score = if rank == 0 {
            confidence
        } else {
            round_to(confidence * rng.gen_range(0.1..0.9), 3)
        };
        result.scores.insert(*genre, score);
    }
    result
}

fn synthesize_mood(rng: &mut StdRng) -> MoodResult {
    let primary = Mood::VOCABULARY[rng.gen_range(0..Mood::VOCABULARY.len())];
    let confidence = round_to(rng.gen_range(0.5..0.9), 3);

    let dimensions = MoodDimensions {
        energy: round_to(rng.gen_range(0.0..1.0), 3),
        valence: round_to(rng.gen_range(0.0..1.0), 3),
        intensity: round_to(rng.gen_range(0.0..1.0), 3),
    };

    let mut result = MoodResult::unknown();
    result.primary = primary;
    result.confidence = confidence;
    result.tags = vec![primary];
    result.scores.insert(primary, confidence);
    result.dimensions = dimensions;
    result.energy = match dimensions.energy {
        e if e < 0.33 => EnergyLevel::Low,
        e if e < 0.67 => EnergyLevel::Medium,
        _ => EnergyLevel::High,
    };
    result.valence = match dimensions.valence {
        v if v < 0.33 => ValenceLevel::Sad,
        v if v < 0.67 => ValenceLevel::Neutral,
        _ => ValenceLevel::Happy,
    };
    result.intensity = Some(match dimensions.intensity {
        i if i < 0.33 => IntensityLevel::Calm,
        i if i < 0.67 => IntensityLevel::Moderate,
        _ => IntensityLevel::Aggressive,
    });
    result
}

/// Build a plausible, content-independent result for `source_id`
///
/// The same identifier always yields the same values apart from the
/// `analyzed_at` timestamp.
pub fn synthesize_analysis(source_id: &str, request_id: Option<&str>) -> AnalysisResult {
    let mut rng = StdRng::seed_from_u64(u64::from(source_seed(source_id)));

    let tempo = synthesize_tempo(&mut rng);
    let key = synthesize_key(&mut rng);
    let genre = synthesize_genre(&mut rng);
    let mood = synthesize_mood(&mut rng);
    let duration = round_to(rng.gen_range(DURATION_RANGE.0..DURATION_RANGE.1), 2);

    AnalysisResult {
        tempo,
        key,
        features: None,
        genre,
        mood,
        duration,
        sample_rate: SYNTHETIC_SAMPLE_RATE,
        format: AudioFormat::Unknown,
        stems: None,
        degraded_stages: Vec::new(),
        origin: ResultOrigin::SyntheticFallback,
        request_id: request_id.map(str::to_string),
        analyzed_at: chrono::Utc::now(),
    }
}
