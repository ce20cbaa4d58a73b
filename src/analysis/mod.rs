//! Audio analysis modules
//!
//! This module provides traits for analysis backends and concrete implementations.

pub mod features;
pub mod genre;
pub mod key;
pub mod mood;
pub mod stems;
pub mod tempo;
pub mod traits;

pub use traits::{
    BeatTracker, FeatureExtractor, FrameAnalyzer, GenreClassifier, KeyDetector, MoodDetector,
    RawTempo, StemSeparator, TempoDetector,
};

pub use features::{AggregatedFeatures, FrameFeatures, SpectralFeatureExtractor};
pub use genre::{GenreConfig, HeuristicGenreClassifier};
pub use key::ChromaKeyDetector;
pub use mood::{DimensionalMoodDetector, MoodConfig};
pub use stems::UnavailableStemSeparator;
pub use tempo::{AutocorrelationTracker, TempoEstimator};
