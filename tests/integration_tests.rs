//! Integration tests for the tunelens pipeline
//!
//! These tests run WAV fixtures through decoding, the detectors and the
//! orchestrator, with fake collaborators standing in for the network,
//! memory probe and stalled stages.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tunelens::analysis::{
    AggregatedFeatures, ChromaKeyDetector, FeatureExtractor, GenreClassifier, KeyDetector,
    SpectralFeatureExtractor, StemSeparator, TempoDetector, TempoEstimator,
};
use tunelens::audio::{self, DecodeOptions};
use tunelens::cancel::CancellationFlag;
use tunelens::config::AnalysisSettings;
use tunelens::fetch::AudioFetcher;
use tunelens::pipeline::{AnalysisPipeline, MemoryProbe};
use tunelens::types::{
    Genre, GenreResult, KeyResult, PcmBuffer, PitchClass, ResultOrigin, Scale, Stage, StemRefs,
    TempoResult,
};
use tunelens::{AnalysisError, ErrorCode, Result};

/// Frames of the tempo tracker land on whole samples at this rate
/// (hop 512 -> 48 onset frames per second)
const GRID_RATE: u32 = 24_576;

// =============================================================================
// Fixtures
// =============================================================================

/// Generate a sine wave WAV file for testing
///
/// Creates a mono 16-bit WAV file at the specified path.
fn generate_sine_wav(path: &Path, frequency_hz: f32, duration_secs: f32, sample_rate: u32, amplitude: f32) {
    use std::f32::consts::PI;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");

    let num_samples = (duration_secs * sample_rate as f32) as usize;
    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let sample = (2.0 * PI * frequency_hz * t).sin() * amplitude;
        writer
            .write_sample((sample * 32767.0) as i16)
            .expect("Failed to write sample");
    }

    writer.finalize().expect("Failed to finalize WAV");
}

/// Generate a click track WAV file, optionally over a sustained tone
///
/// Clicks are short exponentially decaying bursts at every beat.
fn generate_click_track(path: &Path, bpm: f32, duration_secs: f32, sample_rate: u32, tone_hz: Option<f32>) {
    use std::f32::consts::PI;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");

    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let samples_per_beat = (60.0 / bpm * sample_rate as f32) as usize;
    // ~5ms click
    let impulse_samples = (0.005 * sample_rate as f32) as usize;

    for i in 0..num_samples {
        let position_in_beat = i % samples_per_beat;
        let click = if position_in_beat < impulse_samples {
            let decay = (-5.0 * position_in_beat as f32 / impulse_samples as f32).exp();
            0.6 * decay
        } else {
            0.0
        };
        let tone = tone_hz
            .map(|hz| 0.3 * (2.0 * PI * hz * i as f32 / sample_rate as f32).sin())
            .unwrap_or(0.0);
        writer
            .write_sample(((click + tone) * 32767.0) as i16)
            .expect("Failed to write sample");
    }

    writer.finalize().expect("Failed to finalize WAV");
}

fn generate_silence_wav(path: &Path, duration_secs: f32, sample_rate: u32) {
    generate_sine_wav(path, 440.0, duration_secs, sample_rate, 0.0);
}

fn decode_file(path: &Path) -> PcmBuffer {
    let bytes = std::fs::read(path).expect("Failed to read fixture");
    audio::decode(&bytes, &DecodeOptions::default()).expect("Failed to decode fixture")
}

fn musical_clip_bytes(dir: &TempDir) -> Vec<u8> {
    let path = dir.path().join("groove.wav");
    // Whole tone cycles per analysis window keep the energy envelope flat
    generate_click_track(&path, 120.0, 15.0, GRID_RATE, Some(216.0));
    std::fs::read(&path).expect("Failed to read fixture")
}

fn test_settings() -> AnalysisSettings {
    AnalysisSettings {
        analysis_threads: 2,
        retry_base_delay: Duration::from_millis(10),
        ..AnalysisSettings::default()
    }
}

// =============================================================================
// Fakes
// =============================================================================

struct FixedProbe(u64);

impl MemoryProbe for FixedProbe {
    fn resident_bytes(&self) -> Option<u64> {
        Some(self.0)
    }
}

/// Reports a low reading first, then readings far above any ceiling
struct GrowingProbe {
    calls: AtomicUsize,
}

impl MemoryProbe for GrowingProbe {
    fn resident_bytes(&self) -> Option<u64> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Some(1024)
        } else {
            Some(u64::MAX / 2)
        }
    }
}

struct FixedTempo;

impl TempoDetector for FixedTempo {
    fn detect(&self, _: &PcmBuffer, _: &CancellationFlag) -> Result<TempoResult> {
        Ok(TempoResult {
            bpm: 120.0,
            confidence: 0.9,
            offset_seconds: 0.0,
            octave_corrected: false,
        })
    }

    fn name(&self) -> &'static str {
        "fixed-tempo"
    }
}

struct FixedKey;

impl KeyDetector for FixedKey {
    fn detect(&self, _: &PcmBuffer, _: &CancellationFlag) -> Result<KeyResult> {
        Ok(KeyResult::new(PitchClass::A, Scale::Minor, 0.8))
    }

    fn name(&self) -> &'static str {
        "fixed-key"
    }
}

struct FailingExtractor;

impl FeatureExtractor for FailingExtractor {
    fn extract(&self, _: &PcmBuffer, _: &CancellationFlag) -> Result<AggregatedFeatures> {
        Err(AnalysisError::new(ErrorCode::FeatureExtractionFailed, "backend exploded"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Never finishes on its own; stops only when cancelled
struct StalledExtractor {
    stopped: Arc<AtomicBool>,
}

impl FeatureExtractor for StalledExtractor {
    fn extract(&self, _: &PcmBuffer, cancel: &CancellationFlag) -> Result<AggregatedFeatures> {
        loop {
            if let Err(e) = cancel.check(Stage::Features) {
                self.stopped.store(true, Ordering::SeqCst);
                return Err(e);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}

struct FailingGenre;

impl GenreClassifier for FailingGenre {
    fn classify(&self, _: &AggregatedFeatures, _: Option<&TempoResult>) -> Result<GenreResult> {
        Err(AnalysisError::new(ErrorCode::GenreClassificationFailed, "classifier offline"))
    }

    fn name(&self) -> &'static str {
        "failing-genre"
    }
}

/// Fails `failures` times with `code`, then serves `body`
struct ScriptedFetcher {
    calls: AtomicU32,
    failures: u32,
    code: ErrorCode,
    body: Vec<u8>,
}

impl ScriptedFetcher {
    fn new(failures: u32, code: ErrorCode, body: Vec<u8>) -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures,
            code,
            body,
        }
    }
}

#[async_trait]
impl AudioFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(AnalysisError::new(self.code, format!("scripted failure for {}", url)));
        }
        Ok(self.body.clone())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct FakeSeparator {
    fail: bool,
}

#[async_trait]
impl StemSeparator for FakeSeparator {
    async fn separate(&self, source: &str) -> Result<StemRefs> {
        if self.fail {
            return Err(AnalysisError::unknown("separation service down"));
        }
        Ok(StemRefs {
            drums: Some(format!("{}#drums", source)),
            vocals: Some(format!("{}#vocals", source)),
            ..StemRefs::default()
        })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Never finishes within any test's patience
struct SleepingSeparator;

#[async_trait]
impl StemSeparator for SleepingSeparator {
    async fn separate(&self, _: &str) -> Result<StemRefs> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(StemRefs::default())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "sleeping"
    }
}

// =============================================================================
// Detector scenarios
// =============================================================================

#[test]
fn test_sine_220hz_decodes_to_key_root_a() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a220.wav");
    generate_sine_wav(&path, 220.0, 12.0, 44100, 0.5);

    let buffer = decode_file(&path);
    assert_eq!(buffer.sample_rate, 44100);
    assert!((buffer.duration - 12.0).abs() < 0.01);

    let cancel = CancellationFlag::new();
    let features = SpectralFeatureExtractor::new().extract(&buffer, &cancel).unwrap();
    assert!(features.is_finite());
    assert!(features.frame_count > 0);
    assert_eq!(features.mfcc_mean.len(), 13);
    assert_eq!(features.chroma_mean.len(), 12);

    let key = ChromaKeyDetector::new().detect(&buffer, &cancel).unwrap();
    assert_eq!(key.root, PitchClass::A, "detected {}", key.key);
    assert!(matches!(key.scale, Scale::Major | Scale::Minor));
    assert!((0.0..=1.0).contains(&key.confidence));
    assert!(key.confidence > 0.0);
}

#[test]
fn test_silent_clip_fails_key_and_tempo_as_silent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("silence.wav");
    generate_silence_wav(&path, 15.0, 44100);

    let buffer = decode_file(&path);
    let cancel = CancellationFlag::new();

    let key_err = ChromaKeyDetector::new().detect(&buffer, &cancel).unwrap_err();
    assert_eq!(key_err.code, ErrorCode::SilentAudio);

    let tempo_err = TempoEstimator::default().detect(&buffer, &cancel).unwrap_err();
    assert_eq!(tempo_err.code, ErrorCode::SilentAudio);
}

#[test]
fn test_half_tempo_clicks_are_octave_corrected() {
    let dir = TempDir::new().unwrap();
    let slow_path = dir.path().join("45bpm.wav");
    let true_path = dir.path().join("90bpm.wav");
    generate_click_track(&slow_path, 45.0, 30.0, GRID_RATE, None);
    generate_click_track(&true_path, 90.0, 30.0, GRID_RATE, None);

    let detector = TempoEstimator::default();
    let cancel = CancellationFlag::new();
    let slow = detector.detect(&decode_file(&slow_path), &cancel).unwrap();
    let genuine = detector.detect(&decode_file(&true_path), &cancel).unwrap();

    assert!((slow.bpm - 90.0).abs() < 1.0, "45 BPM clicks reported as {}", slow.bpm);
    assert!(slow.octave_corrected);
    assert!((genuine.bpm - 90.0).abs() < 1.0, "90 BPM clicks reported as {}", genuine.bpm);
    assert!(!genuine.octave_corrected);
    assert!(slow.confidence < genuine.confidence);
}

#[test]
fn test_detectors_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("groove.wav");
    generate_click_track(&path, 120.0, 12.0, GRID_RATE, Some(216.0));
    let buffer = decode_file(&path);
    let cancel = CancellationFlag::new();

    let tempo = TempoEstimator::default();
    assert_eq!(tempo.detect(&buffer, &cancel).unwrap(), tempo.detect(&buffer, &cancel).unwrap());

    let key = ChromaKeyDetector::new();
    assert_eq!(key.detect(&buffer, &cancel).unwrap(), key.detect(&buffer, &cancel).unwrap());

    let extractor = SpectralFeatureExtractor::new();
    assert_eq!(
        extractor.extract(&buffer, &cancel).unwrap(),
        extractor.extract(&buffer, &cancel).unwrap()
    );
}

#[test]
fn test_stereo_wav_is_downmixed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stereo.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..22050 {
        writer.write_sample(16384i16).unwrap();
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();

    let buffer = decode_file(&path);
    assert_eq!(buffer.channels_original, 2);
    assert_eq!(buffer.len(), 22050);
    assert!((buffer.samples[100] - 0.25).abs() < 1e-3);
}

// =============================================================================
// Orchestrator
// =============================================================================

#[tokio::test]
async fn test_pipeline_analyzes_wav_bytes() {
    let dir = TempDir::new().unwrap();
    let pipeline = AnalysisPipeline::builder(test_settings())
        .memory_probe(Arc::new(FixedProbe(64 * 1024 * 1024)))
        .build()
        .unwrap();

    let result = pipeline
        .analyze_bytes(musical_clip_bytes(&dir), Some("req-42"))
        .await
        .unwrap();

    assert!((result.tempo.bpm - 120.0).abs() < 2.0, "tempo {}", result.tempo.bpm);
    assert!((0.0..=1.0).contains(&result.key.confidence));
    assert!(result.features.as_ref().is_some_and(|f| f.is_finite()));
    assert_eq!(result.genre.scores.len(), 15);
    assert!(result.genre.scores.values().all(|s| (0.0..=1.0).contains(s)));
    assert_eq!(result.mood.scores.len(), 10);
    assert!(result.mood.tags.len() <= 4);
    assert_eq!(result.origin, ResultOrigin::Analyzed);
    assert_eq!(result.sample_rate, GRID_RATE);
    assert_eq!(result.request_id.as_deref(), Some("req-42"));
    assert!(result.stems.is_none());
}

#[tokio::test]
async fn test_short_clip_is_insufficient_audio() {
    let pipeline = AnalysisPipeline::builder(test_settings())
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();

    let buffer = PcmBuffer::new(vec![0.1; 22050 * 5], 22050);
    let err = pipeline.analyze(buffer, None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientAudio);
    assert_eq!(err.stage, Some(Stage::Validation));
}

#[tokio::test]
async fn test_feature_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let pipeline = AnalysisPipeline::builder(test_settings())
        .tempo_detector(Arc::new(FixedTempo))
        .key_detector(Arc::new(FixedKey))
        .feature_extractor(Arc::new(FailingExtractor))
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();

    let err = pipeline
        .analyze_bytes(musical_clip_bytes(&dir), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::FeatureExtractionFailed);
    assert_eq!(err.stage, Some(Stage::Features));
    assert!(err.details.contains_key("elapsedMs"));
    assert!(err.details.contains_key("memoryBytes"));
    assert!(!err.warning);
}

#[tokio::test]
async fn test_genre_failure_degrades_to_unknown() {
    let dir = TempDir::new().unwrap();
    let pipeline = AnalysisPipeline::builder(test_settings())
        .tempo_detector(Arc::new(FixedTempo))
        .key_detector(Arc::new(FixedKey))
        .genre_classifier(Arc::new(FailingGenre))
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();

    let result = pipeline
        .analyze_bytes(musical_clip_bytes(&dir), None)
        .await
        .unwrap();
    assert_eq!(result.genre.primary, Genre::Unknown);
    assert_eq!(result.genre.confidence, 0.0);
    assert!(result.degraded_stages.contains(&Stage::Genre));
    assert_eq!(result.origin, ResultOrigin::Analyzed);
}

#[tokio::test]
async fn test_stalled_stage_times_out_and_is_cancelled() {
    let dir = TempDir::new().unwrap();
    let stopped = Arc::new(AtomicBool::new(false));
    let settings = AnalysisSettings {
        analysis_timeout: Duration::from_millis(300),
        ..test_settings()
    };
    let pipeline = AnalysisPipeline::builder(settings)
        .tempo_detector(Arc::new(FixedTempo))
        .key_detector(Arc::new(FixedKey))
        .feature_extractor(Arc::new(StalledExtractor {
            stopped: Arc::clone(&stopped),
        }))
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = pipeline
        .analyze_bytes(musical_clip_bytes(&dir), None)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.code, ErrorCode::AnalysisTimeout);
    assert!(err.retryable);
    // Decoding the fixture is part of the measured time
    assert!(elapsed < Duration::from_millis(300) + Duration::from_secs(3), "took {:?}", elapsed);

    // The stalled loop observes the cancellation flag shortly after
    let deadline = Instant::now() + Duration::from_secs(2);
    while !stopped.load(Ordering::SeqCst) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_memory_ceiling_before_stage() {
    let dir = TempDir::new().unwrap();
    let pipeline = AnalysisPipeline::builder(test_settings())
        .memory_probe(Arc::new(FixedProbe(2 * 1024 * 1024 * 1024)))
        .build()
        .unwrap();

    let err = pipeline
        .analyze_bytes(musical_clip_bytes(&dir), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::MemoryLimitExceeded);
    assert!(!err.retryable);
    assert!(err.is_critical());
}

#[tokio::test]
async fn test_memory_ceiling_during_stage() {
    let dir = TempDir::new().unwrap();
    let stopped = Arc::new(AtomicBool::new(false));
    let settings = AnalysisSettings {
        memory_poll_interval: Duration::from_millis(10),
        analysis_timeout: Duration::from_secs(20),
        ..test_settings()
    };
    let pipeline = AnalysisPipeline::builder(settings)
        .tempo_detector(Arc::new(FixedTempo))
        .key_detector(Arc::new(FixedKey))
        .feature_extractor(Arc::new(StalledExtractor {
            stopped: Arc::clone(&stopped),
        }))
        .memory_probe(Arc::new(GrowingProbe {
            calls: AtomicUsize::new(0),
        }))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = pipeline
        .analyze_bytes(musical_clip_bytes(&dir), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::MemoryLimitExceeded);
    assert!(started.elapsed() < Duration::from_secs(10));
}

// =============================================================================
// Source entry points
// =============================================================================

#[tokio::test]
async fn test_download_retries_transient_failures() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new(2, ErrorCode::DownloadFailed, musical_clip_bytes(&dir)));
    let pipeline = AnalysisPipeline::builder(test_settings())
        .fetcher(fetcher.clone())
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();

    let result = pipeline
        .analyze_from_source("https://cdn.example.com/groove.wav", None)
        .await
        .unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.origin, ResultOrigin::Analyzed);
}

#[tokio::test]
async fn test_download_gives_up_after_budget() {
    let fetcher = Arc::new(ScriptedFetcher::new(u32::MAX, ErrorCode::DownloadTimeout, Vec::new()));
    let pipeline = AnalysisPipeline::builder(test_settings())
        .fetcher(fetcher.clone())
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();

    let err = pipeline
        .analyze_from_source("https://cdn.example.com/slow.wav", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::DownloadTimeout);
    assert_eq!(err.stage, Some(Stage::Download));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_oversized_download_is_rejected() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new(0, ErrorCode::DownloadFailed, musical_clip_bytes(&dir)));
    let settings = AnalysisSettings {
        max_file_size: 4096,
        ..test_settings()
    };
    let pipeline = AnalysisPipeline::builder(settings)
        .fetcher(fetcher.clone())
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();

    let err = pipeline
        .analyze_from_source("https://cdn.example.com/big.wav", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::FileTooLarge);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fallback_synthesizes_deterministic_result() {
    let url = "https://cdn.example.com/unreachable.mp3";
    let build = || {
        AnalysisPipeline::builder(test_settings())
            .fetcher(Arc::new(ScriptedFetcher::new(u32::MAX, ErrorCode::DownloadFailed, Vec::new())))
            .memory_probe(Arc::new(FixedProbe(0)))
            .build()
            .unwrap()
    };

    let first = build().analyze_from_source_or_synthesize(url, Some("r1")).await.unwrap();
    let second = build().analyze_from_source_or_synthesize(url, Some("r2")).await.unwrap();

    assert_eq!(first.origin, ResultOrigin::SyntheticFallback);
    assert!(first.is_synthetic());
    assert_eq!(first.tempo, second.tempo);
    assert_eq!(first.key, second.key);
    assert_eq!(first.genre.primary, second.genre.primary);
    assert_eq!(first.duration, second.duration);
    assert!((60.0..180.0).contains(&first.tempo.bpm));
}

#[tokio::test]
async fn test_fallback_does_not_hide_format_errors() {
    let fetcher = Arc::new(ScriptedFetcher::new(0, ErrorCode::DownloadFailed, vec![b'x'; 4096]));
    let pipeline = AnalysisPipeline::builder(test_settings())
        .fetcher(fetcher)
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();

    let err = pipeline
        .analyze_from_source_or_synthesize("https://cdn.example.com/notes.txt", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsupportedFormat);
    assert_eq!(err.stage, Some(Stage::Decode));
}

#[tokio::test]
async fn test_stems_run_alongside_analysis() {
    let dir = TempDir::new().unwrap();
    let bytes = musical_clip_bytes(&dir);
    let url = "https://cdn.example.com/groove.wav";

    let with_stems = AnalysisPipeline::builder(test_settings())
        .fetcher(Arc::new(ScriptedFetcher::new(0, ErrorCode::DownloadFailed, bytes.clone())))
        .stem_separator(Arc::new(FakeSeparator { fail: false }))
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();
    let result = with_stems.analyze_from_source(url, None).await.unwrap();
    let stems = result.stems.expect("stems should be attached");
    assert_eq!(stems.drums.as_deref(), Some("https://cdn.example.com/groove.wav#drums"));
    assert!(stems.bass.is_none());

    let failing_stems = AnalysisPipeline::builder(test_settings())
        .fetcher(Arc::new(ScriptedFetcher::new(0, ErrorCode::DownloadFailed, bytes)))
        .stem_separator(Arc::new(FakeSeparator { fail: true }))
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();
    let result = failing_stems.analyze_from_source(url, None).await.unwrap();
    assert!(result.stems.is_none());
    assert_eq!(result.origin, ResultOrigin::Analyzed);
}

#[tokio::test]
async fn test_failed_analysis_does_not_wait_for_stems() {
    let settings = AnalysisSettings {
        download_timeout: Duration::from_secs(2),
        analysis_timeout: Duration::from_secs(2),
        ..test_settings()
    };
    let pipeline = AnalysisPipeline::builder(settings)
        .fetcher(Arc::new(ScriptedFetcher::new(0, ErrorCode::DownloadFailed, vec![b'x'; 4096])))
        .stem_separator(Arc::new(SleepingSeparator))
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = pipeline
        .analyze_from_source("https://cdn.example.com/notes.txt", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsupportedFormat);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "error held back for {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_result_round_trips_through_json_export() {
    let dir = TempDir::new().unwrap();
    let pipeline = AnalysisPipeline::builder(test_settings())
        .memory_probe(Arc::new(FixedProbe(0)))
        .build()
        .unwrap();
    let result = pipeline
        .analyze_bytes(musical_clip_bytes(&dir), None)
        .await
        .unwrap();

    let path = dir.path().join("result.json");
    tunelens::export::write_json(&result, &path).unwrap();
    let loaded = tunelens::export::read_json(&path).unwrap();
    assert_eq!(loaded.tempo, result.tempo);
    assert_eq!(loaded.key, result.key);
    assert_eq!(loaded.features, result.features);
    assert_eq!(loaded.genre.primary, result.genre.primary);
}
