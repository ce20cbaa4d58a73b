//! Core data types for tunelens
//!
//! These types represent the domain model and flow through the pipeline.

use crate::analysis::features::AggregatedFeatures;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Musical primitives
// =============================================================================

/// The 12 pitch classes in Western music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Cs, // C#/Db
    D,
    Ds, // D#/Eb
    E,
    F,
    Fs, // F#/Gb
    G,
    Gs, // G#/Ab
    A,
    As, // A#/Bb
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    /// Convert from numeric index (0 = C, 1 = C#, ..., 11 = B), wrapping
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    /// Convert to numeric index (0 = C, 1 = C#, ..., 11 = B)
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Pitch class nearest to a frequency, relative to A4 = 440 Hz
    pub fn from_frequency(freq: f32) -> Option<Self> {
        if !freq.is_finite() || freq <= 0.0 {
            return None;
        }
        let midi = 12.0 * (freq / 440.0).log2() + 69.0;
        let index = (midi.round() as i64).rem_euclid(12) as usize;
        Some(Self::from_index(index))
    }

    /// Standard notation (e.g., "C", "F#")
    pub fn to_standard_notation(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }
}

/// Major or minor scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Major,
    Minor,
}

impl Scale {
    pub fn as_str(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
        }
    }
}

// =============================================================================
// Audio buffer types
// =============================================================================

/// Container formats recognised by signature sniffing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Ogg,
    Unknown,
}

impl AudioFormat {
    /// Extension hint handed to the codec probe
    pub fn extension(self) -> Option<&'static str> {
        match self {
            AudioFormat::Mp3 => Some("mp3"),
            AudioFormat::Wav => Some("wav"),
            AudioFormat::Flac => Some("flac"),
            AudioFormat::Ogg => Some("ogg"),
            AudioFormat::Unknown => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Wav => "WAV",
            AudioFormat::Flac => "FLAC",
            AudioFormat::Ogg => "OGG",
            AudioFormat::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Whether samples came from the codec or were synthesized from container metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeOrigin {
    Decoded,
    Synthesized,
}

/// Decoded audio samples ready for analysis
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// Mono samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Source sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
    /// Channel count before down-mixing
    pub channels_original: u16,
    pub format: AudioFormat,
    pub origin: DecodeOrigin,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        // Guard against division by zero - use 0 duration for invalid sample rate
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            samples,
            sample_rate,
            duration,
            channels_original: 1,
            format: AudioFormat::Unknown,
            origin: DecodeOrigin::Decoded,
        }
    }

    pub fn with_source(mut self, format: AudioFormat, channels_original: u16) -> Self {
        self.format = format;
        self.channels_original = channels_original;
        self
    }

    pub fn with_origin(mut self, origin: DecodeOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

// =============================================================================
// Analysis results
// =============================================================================

/// Tempo analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoResult {
    pub bpm: f64,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    /// Position of the first beat in seconds
    pub offset_seconds: f64,
    /// True when a factor-of-two correction was applied
    pub octave_corrected: bool,
}

/// Musical key analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyResult {
    /// Display form, e.g. "A minor"
    pub key: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    pub scale: Scale,
    pub root: PitchClass,
}

impl KeyResult {
    pub fn new(root: PitchClass, scale: Scale, confidence: f64) -> Self {
        Self {
            key: format!("{} {}", root.to_standard_notation(), scale.as_str()),
            confidence,
            scale,
            root,
        }
    }
}

/// Fixed genre vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Genre {
    Afrobeat,
    #[serde(rename = "Afro House")]
    AfroHouse,
    Pop,
    #[serde(rename = "Hip-Hop")]
    HipHop,
    Rock,
    Country,
    #[serde(rename = "Latin Urban")]
    LatinUrban,
    Reggaeton,
    Reggae,
    Dancehall,
    Electronic,
    Jazz,
    #[serde(rename = "R&B")]
    RnB,
    Classical,
    Trap,
    /// Placeholder used by degraded results, never scored
    Unknown,
}

impl Genre {
    pub const VOCABULARY: [Genre; 15] = [
        Genre::Afrobeat,
        Genre::AfroHouse,
        Genre::Pop,
        Genre::HipHop,
        Genre::Rock,
        Genre::Country,
        Genre::LatinUrban,
        Genre::Reggaeton,
        Genre::Reggae,
        Genre::Dancehall,
        Genre::Electronic,
        Genre::Jazz,
        Genre::RnB,
        Genre::Classical,
        Genre::Trap,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Genre::Afrobeat => "Afrobeat",
            Genre::AfroHouse => "Afro House",
            Genre::Pop => "Pop",
            Genre::HipHop => "Hip-Hop",
            Genre::Rock => "Rock",
            Genre::Country => "Country",
            Genre::LatinUrban => "Latin Urban",
            Genre::Reggaeton => "Reggaeton",
            Genre::Reggae => "Reggae",
            Genre::Dancehall => "Dancehall",
            Genre::Electronic => "Electronic",
            Genre::Jazz => "Jazz",
            Genre::RnB => "R&B",
            Genre::Classical => "Classical",
            Genre::Trap => "Trap",
            Genre::Unknown => "Unknown",
        }
    }
}

/// Genre classification result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreResult {
    pub primary: Genre,
    pub confidence: f64,
    /// Up to three runner-up genres, never including `primary`
    pub secondary: Vec<Genre>,
    /// Normalized score for every genre in the vocabulary
    pub scores: BTreeMap<Genre, f64>,
}

impl GenreResult {
    /// Default used when classification is degraded
    pub fn unknown() -> Self {
        Self {
            primary: Genre::Unknown,
            confidence: 0.0,
            secondary: Vec::new(),
            scores: Genre::VOCABULARY.iter().map(|g| (*g, 0.0)).collect(),
        }
    }
}

/// Fixed mood vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mood {
    Energetic,
    Melancholic,
    Uplifting,
    Aggressive,
    Chill,
    Dark,
    Bright,
    Tense,
    Relaxed,
    Party,
    /// Placeholder used by degraded results, never scored
    Unknown,
}

impl Mood {
    pub const VOCABULARY: [Mood; 10] = [
        Mood::Energetic,
        Mood::Melancholic,
        Mood::Uplifting,
        Mood::Aggressive,
        Mood::Chill,
        Mood::Dark,
        Mood::Bright,
        Mood::Tense,
        Mood::Relaxed,
        Mood::Party,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValenceLevel {
    Sad,
    Neutral,
    Happy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    Calm,
    Moderate,
    Aggressive,
}

/// Continuous mood dimensions before bucketing, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodDimensions {
    pub energy: f64,
    pub valence: f64,
    pub intensity: f64,
}

/// Mood detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodResult {
    pub primary: Mood,
    pub energy: EnergyLevel,
    pub valence: ValenceLevel,
    /// `None` when mood detection was degraded
    pub intensity: Option<IntensityLevel>,
    pub confidence: f64,
    /// Up to four labels, strongest first
    pub tags: Vec<Mood>,
    pub scores: BTreeMap<Mood, f64>,
    pub dimensions: MoodDimensions,
}

impl MoodResult {
    /// Default used when mood detection is degraded
    pub fn unknown() -> Self {
        Self {
            primary: Mood::Unknown,
            energy: EnergyLevel::Medium,
            valence: ValenceLevel::Neutral,
            intensity: None,
            confidence: 0.0,
            tags: Vec::new(),
            scores: Mood::VOCABULARY.iter().map(|m| (*m, 0.0)).collect(),
            dimensions: MoodDimensions::default(),
        }
    }
}

/// Opaque references returned by the stem separation collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StemRefs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drums: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocals: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
}

// =============================================================================
// Pipeline bookkeeping
// =============================================================================

/// Named pipeline stages, used for error context and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Decode,
    Validation,
    CoreAnalysis,
    Tempo,
    Key,
    Features,
    Classification,
    Genre,
    Mood,
    Stems,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Decode => "decode",
            Stage::Validation => "validation",
            Stage::CoreAnalysis => "core_analysis",
            Stage::Tempo => "tempo",
            Stage::Key => "key",
            Stage::Features => "features",
            Stage::Classification => "classification",
            Stage::Genre => "genre",
            Stage::Mood => "mood",
            Stage::Stems => "stems",
        }
    }
}

/// Where the values in an `AnalysisResult` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    /// Genuine analysis of decoded audio
    Analyzed,
    /// Analysis ran, but over a placeholder waveform synthesized from container metadata
    SyntheticDecode,
    /// Content-independent values seeded from the source identifier
    SyntheticFallback,
}

/// Complete analysis result for a single track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub tempo: TempoResult,
    pub key: KeyResult,
    /// Absent only for synthetic fallback results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<AggregatedFeatures>,
    pub genre: GenreResult,
    pub mood: MoodResult,
    /// Duration in seconds
    pub duration: f64,
    pub sample_rate: u32,
    pub format: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stems: Option<StemRefs>,
    /// Stages whose failure was absorbed and replaced with defaults
    pub degraded_stages: Vec<Stage>,
    pub origin: ResultOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Timestamp of analysis
    pub analyzed_at: chrono::DateTime<chrono::Utc>,
}

impl AnalysisResult {
    /// True when values were not derived from real decoded audio
    pub fn is_synthetic(&self) -> bool {
        self.origin != ResultOrigin::Analyzed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_from_frequency() {
        assert_eq!(PitchClass::from_frequency(440.0), Some(PitchClass::A));
        assert_eq!(PitchClass::from_frequency(220.0), Some(PitchClass::A));
        assert_eq!(PitchClass::from_frequency(261.63), Some(PitchClass::C));
        assert_eq!(PitchClass::from_frequency(0.0), None);
    }

    #[test]
    fn test_key_display() {
        let key = KeyResult::new(PitchClass::Fs, Scale::Minor, 0.7);
        assert_eq!(key.key, "F# minor");
    }

    #[test]
    fn test_pcm_duration() {
        let buffer = PcmBuffer::new(vec![0.0; 22050], 44100);
        assert!((buffer.duration - 0.5).abs() < 1e-9);
        let invalid = PcmBuffer::new(vec![0.0; 10], 0);
        assert_eq!(invalid.duration, 0.0);
    }

    #[test]
    fn test_unknown_defaults_keep_vocabulary() {
        let genre = GenreResult::unknown();
        assert_eq!(genre.scores.len(), 15);
        assert_eq!(genre.primary, Genre::Unknown);
        let mood = MoodResult::unknown();
        assert_eq!(mood.scores.len(), 10);
        assert!(mood.intensity.is_none());
    }

    #[test]
    fn test_genre_serializes_with_label() {
        let json = serde_json::to_string(&Genre::RnB).unwrap();
        assert_eq!(json, "\"R&B\"");
        assert_eq!(Genre::AfroHouse.label(), "Afro House");
    }
}
