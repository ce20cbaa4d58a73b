//! Pipeline orchestration
//!
//! Runs one analysis request through its stages:
//! validation, the core group (tempo, key, features) and the classification
//! group (genre, mood). Each group runs on the DSP pool under its own timeout
//! envelope and is raced against the memory monitor. Core failures are fatal;
//! classification failures degrade to `Unknown` results.

use crate::analysis::{
    AggregatedFeatures, ChromaKeyDetector, DimensionalMoodDetector, FeatureExtractor,
    GenreClassifier, HeuristicGenreClassifier, KeyDetector, MoodDetector,
    SpectralFeatureExtractor, StemSeparator, TempoDetector, TempoEstimator,
};
use crate::audio::{self, DecodeOptions};
use crate::cancel::CancellationFlag;
use crate::config::AnalysisSettings;
use crate::error::{AnalysisError, ErrorCode, ErrorContext, Result};
use crate::fetch::{AudioFetcher, HttpFetcher};
use crate::pipeline::fallback::synthesize_analysis;
use crate::pipeline::monitor::{MemoryMonitor, MemoryProbe, SysinfoProbe};
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::retry::{retry, RetryPolicy};
use crate::pipeline::worker::WorkerPool;
use crate::types::{
    AnalysisResult, DecodeOrigin, GenreResult, KeyResult, MoodResult, PcmBuffer,
    ResultOrigin, Stage, StemRefs, TempoResult,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Output of the core analysis group
struct CoreAnalysis {
    tempo: TempoResult,
    key: KeyResult,
    features: AggregatedFeatures,
}

/// Output of the classification group
struct Classification {
    genre: GenreResult,
    mood: MoodResult,
    degraded: Vec<Stage>,
}

/// Audio analysis pipeline with injectable stage backends and collaborators
pub struct AnalysisPipeline {
    settings: AnalysisSettings,
    pool: WorkerPool,
    tempo: Arc<dyn TempoDetector>,
    key: Arc<dyn KeyDetector>,
    features: Arc<dyn FeatureExtractor>,
    genre: Arc<dyn GenreClassifier>,
    mood: Arc<dyn MoodDetector>,
    fetcher: Arc<dyn AudioFetcher>,
    stems: Option<Arc<dyn StemSeparator>>,
    probe: Arc<dyn MemoryProbe>,
}

/// Builder for [`AnalysisPipeline`]; unset backends use the defaults
pub struct PipelineBuilder {
    settings: AnalysisSettings,
    tempo: Option<Arc<dyn TempoDetector>>,
    key: Option<Arc<dyn KeyDetector>>,
    features: Option<Arc<dyn FeatureExtractor>>,
    genre: Option<Arc<dyn GenreClassifier>>,
    mood: Option<Arc<dyn MoodDetector>>,
    fetcher: Option<Arc<dyn AudioFetcher>>,
    stems: Option<Arc<dyn StemSeparator>>,
    probe: Option<Arc<dyn MemoryProbe>>,
}

impl PipelineBuilder {
    pub fn tempo_detector(mut self, detector: Arc<dyn TempoDetector>) -> Self {
        self.tempo = Some(detector);
        self
    }

    pub fn key_detector(mut self, detector: Arc<dyn KeyDetector>) -> Self {
        self.key = Some(detector);
        self
    }

    pub fn feature_extractor(mut self, extractor: Arc<dyn FeatureExtractor>) -> Self {
        self.features = Some(extractor);
        self
    }

    pub fn genre_classifier(mut self, classifier: Arc<dyn GenreClassifier>) -> Self {
        self.genre = Some(classifier);
        self
    }

    pub fn mood_detector(mut self, detector: Arc<dyn MoodDetector>) -> Self {
        self.mood = Some(detector);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn AudioFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn stem_separator(mut self, separator: Arc<dyn StemSeparator>) -> Self {
        self.stems = Some(separator);
        self
    }

    pub fn memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> Result<AnalysisPipeline> {
        let settings = self.settings;
        let pool = WorkerPool::new(settings.analysis_threads)?;

        let fetcher: Arc<dyn AudioFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::from_settings(&settings)?),
        };

        let stems = self.stems.filter(|separator| {
            if separator.is_available() {
                info!("Stem separation enabled using {}", separator.name());
                true
            } else {
                debug!("Stem separator {} not available, skipping stems", separator.name());
                false
            }
        });

        let pipeline = AnalysisPipeline {
            tempo: self.tempo.unwrap_or_else(|| {
                Arc::new(
                    TempoEstimator::default()
                        .with_limits(settings.tempo_min_duration, settings.max_duration),
                )
            }),
            key: self.key.unwrap_or_else(|| {
                Arc::new(
                    ChromaKeyDetector::new()
                        .with_limits(settings.key_min_duration, settings.max_duration)
                        .with_uncertain_threshold(settings.key_uncertain_threshold),
                )
            }),
            features: self
                .features
                .unwrap_or_else(|| Arc::new(SpectralFeatureExtractor::new())),
            genre: self
                .genre
                .unwrap_or_else(|| Arc::new(HeuristicGenreClassifier::default())),
            mood: self
                .mood
                .unwrap_or_else(|| Arc::new(DimensionalMoodDetector::default())),
            probe: self.probe.unwrap_or_else(|| Arc::new(SysinfoProbe::new())),
            fetcher,
            stems,
            pool,
            settings,
        };

        debug!(
            tempo = pipeline.tempo.name(),
            key = pipeline.key.name(),
            features = pipeline.features.name(),
            genre = pipeline.genre.name(),
            mood = pipeline.mood.name(),
            fetcher = pipeline.fetcher.name(),
            threads = pipeline.pool.threads(),
            "Pipeline configured"
        );

        Ok(pipeline)
    }
}

impl AnalysisPipeline {
    pub fn builder(settings: AnalysisSettings) -> PipelineBuilder {
        PipelineBuilder {
            settings,
            tempo: None,
            key: None,
            features: None,
            genre: None,
            mood: None,
            fetcher: None,
            stems: None,
            probe: None,
        }
    }

    /// Pipeline with every default backend
    pub fn new(settings: AnalysisSettings) -> Result<Self> {
        Self::builder(settings).build()
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Analyze an already decoded buffer
    pub async fn analyze(&self, buffer: PcmBuffer, request_id: Option<&str>) -> Result<AnalysisResult> {
        let span = info_span!("analysis", request_id = request_id.unwrap_or("-"));
        self.run_analysis(buffer, request_id)
            .instrument(span)
            .await
            .inspect_err(log_failure)
    }

    /// Validate, decode and analyze raw container bytes
    pub async fn analyze_bytes(&self, bytes: Vec<u8>, request_id: Option<&str>) -> Result<AnalysisResult> {
        let span = info_span!("analysis", request_id = request_id.unwrap_or("-"));
        async {
            let buffer = self.decode_bytes(bytes).await?;
            self.run_analysis(buffer, request_id).await
        }
        .instrument(span)
        .await
        .inspect_err(log_failure)
    }

    /// Download, decode and analyze the audio behind `url`
    ///
    /// A configured stem separator runs alongside; its failure only leaves
    /// `stems` empty, and a failed analysis cancels it instead of waiting.
    pub async fn analyze_from_source(&self, url: &str, request_id: Option<&str>) -> Result<AnalysisResult> {
        let span = info_span!("analysis", request_id = request_id.unwrap_or("-"));
        async {
            let stems = self.stems.as_ref().map(|separator| {
                let limit = self.settings.download_timeout + self.settings.analysis_timeout;
                tokio::spawn(
                    separate_stems(Arc::clone(separator), url.to_string(), limit).in_current_span(),
                )
            });

            let analysis = async {
                let bytes = self.download(url).await?;
                let buffer = self.decode_bytes(bytes).await?;
                self.run_analysis(buffer, request_id).await
            }
            .await;

            let mut result = match analysis {
                Ok(result) => result,
                Err(e) => {
                    if let Some(handle) = stems {
                        handle.abort();
                    }
                    return Err(e);
                }
            };
            if let Some(handle) = stems {
                result.stems = handle.await.unwrap_or_else(|e| {
                    warn!("Stem separation task ended abnormally: {}", e);
                    None
                });
            }
            Ok(result)
        }
        .instrument(span)
        .await
        .inspect_err(log_failure)
    }

    /// Like [`analyze_from_source`](Self::analyze_from_source), but non-critical
    /// failures are replaced by a synthetic result seeded from `url`
    ///
    /// Format, size and resource errors still surface.
    pub async fn analyze_from_source_or_synthesize(
        &self,
        url: &str,
        request_id: Option<&str>,
    ) -> Result<AnalysisResult> {
        match self.analyze_from_source(url, request_id).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_critical() => Err(e),
            Err(e) => {
                warn!(
                    code = e.code.as_str(),
                    "Analysis of {} failed, returning synthetic fallback: {}",
                    url,
                    e.message
                );
                Ok(synthesize_analysis(url, request_id))
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let limit = self.settings.download_timeout;
        let policy = RetryPolicy::from_settings(&self.settings);

        let bytes = retry(policy, "download", |attempt| {
            let fetcher = Arc::clone(&self.fetcher);
            async move {
                debug!("Download attempt {} via {}", attempt, fetcher.name());
                match tokio::time::timeout(limit, fetcher.fetch(url)).await {
                    Ok(result) => result,
                    Err(_) => Err(AnalysisError::new(
                        ErrorCode::DownloadTimeout,
                        format!("Download did not finish within {:.1}s", limit.as_secs_f64()),
                    )
                    .with_detail("timeoutMs", limit.as_millis() as u64)),
                }
            }
        })
        .await
        .with_stage(Stage::Download, started.elapsed(), None)?;

        let size = bytes.len() as u64;
        if size > self.settings.max_file_size {
            return Err(AnalysisError::file_too_large(size, self.settings.max_file_size))
                .with_stage(Stage::Download, started.elapsed(), None);
        }

        info!(
            "Downloaded {:.1} MB in {:.2}s",
            size as f64 / (1024.0 * 1024.0),
            started.elapsed().as_secs_f64()
        );
        Ok(bytes)
    }

    async fn decode_bytes(&self, bytes: Vec<u8>) -> Result<PcmBuffer> {
        let started = Instant::now();
        let limit = self.settings.decode_timeout;
        let max_size = self.settings.max_file_size;
        let options = DecodeOptions {
            synthetic_fallback: self.settings.synthetic_decode_fallback,
            max_duration: self.settings.max_duration,
        };

        let job = self.pool.run(move || {
            audio::validate(&bytes, max_size)?;
            audio::decode(&bytes, &options)
        });

        let buffer = match tokio::time::timeout(limit, job).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::timeout(Stage::Decode, limit)),
        }
        .with_stage(Stage::Decode, started.elapsed(), None)?;

        debug!("Decode completed in {:.2}s", started.elapsed().as_secs_f64());
        Ok(buffer)
    }

    async fn run_analysis(&self, buffer: PcmBuffer, request_id: Option<&str>) -> Result<AnalysisResult> {
        let started = Instant::now();

        // Validating
        let min = self.settings.min_analysis_duration;
        if buffer.duration < min {
            return Err(AnalysisError::too_short(ErrorCode::InsufficientAudio, buffer.duration, min))
                .with_stage(Stage::Validation, started.elapsed(), None);
        }
        debug!(
            "Analyzing {:.2}s of audio @ {}Hz",
            buffer.duration, buffer.sample_rate
        );

        let monitor = MemoryMonitor::start(
            Arc::clone(&self.probe),
            self.settings.memory_limit,
            self.settings.memory_poll_interval,
        );

        let buffer = Arc::new(buffer);
        let core = self.run_core(&buffer, &monitor, started).await?;
        let classification = self.run_classification(&core, &monitor, started).await?;
        monitor.stop();

        let origin = match buffer.origin {
            DecodeOrigin::Decoded => ResultOrigin::Analyzed,
            DecodeOrigin::Synthesized => ResultOrigin::SyntheticDecode,
        };
        if origin != ResultOrigin::Analyzed {
            warn!("Result derived from a synthesized placeholder waveform");
        }

        info!(
            "Analysis complete in {:.2}s: BPM={:.1}, Key={}, Genre={}, Mood={:?}",
            started.elapsed().as_secs_f64(),
            core.tempo.bpm,
            core.key.key,
            classification.genre.primary.label(),
            classification.mood.primary
        );

        Ok(AnalysisResult {
            tempo: core.tempo,
            key: core.key,
            features: Some(core.features),
            genre: classification.genre,
            mood: classification.mood,
            duration: buffer.duration,
            sample_rate: buffer.sample_rate,
            format: buffer.format,
            stems: None,
            degraded_stages: classification.degraded,
            origin,
            request_id: request_id.map(str::to_string),
            analyzed_at: chrono::Utc::now(),
        })
    }

    /// Tempo, key and features concurrently; every failure is fatal
    async fn run_core(
        &self,
        buffer: &Arc<PcmBuffer>,
        monitor: &MemoryMonitor,
        started: Instant,
    ) -> Result<CoreAnalysis> {
        let stage_started = Instant::now();
        monitor
            .check()
            .map(|_| ())
            .with_stage(Stage::CoreAnalysis, started.elapsed(), monitor.snapshot().resident_bytes)?;

        let cancel = CancellationFlag::new();

        let tempo_job = {
            let detector = Arc::clone(&self.tempo);
            let buffer = Arc::clone(buffer);
            let cancel = cancel.clone();
            self.pool.run(move || detector.detect(&buffer, &cancel).map_err(|e| e.at_stage(Stage::Tempo)))
        };
        let key_job = {
            let detector = Arc::clone(&self.key);
            let buffer = Arc::clone(buffer);
            let cancel = cancel.clone();
            self.pool.run(move || detector.detect(&buffer, &cancel).map_err(|e| e.at_stage(Stage::Key)))
        };
        let features_job = {
            let extractor = Arc::clone(&self.features);
            let buffer = Arc::clone(buffer);
            let cancel = cancel.clone();
            self.pool.run(move || {
                extractor
                    .extract(&buffer, &cancel)
                    .map_err(|e| e.at_stage(Stage::Features))
            })
        };

        let group = async { futures::join!(tempo_job, key_job, features_job) };
        let (tempo, key, features) = race_group(
            group,
            Stage::CoreAnalysis,
            self.settings.analysis_timeout,
            monitor,
            &cancel,
        )
        .await
        .with_stage(Stage::CoreAnalysis, started.elapsed(), monitor.snapshot().resident_bytes)?;

        let memory = monitor.snapshot().resident_bytes;
        let tempo = StageOutcome::critical(tempo)
            .into_result()
            .with_stage(Stage::Tempo, started.elapsed(), memory)?;
        let key = StageOutcome::critical(key)
            .into_result()
            .with_stage(Stage::Key, started.elapsed(), memory)?;
        let features = StageOutcome::critical(features)
            .into_result()
            .with_stage(Stage::Features, started.elapsed(), memory)?;

        debug!(
            "Core analysis completed in {:.2}s",
            stage_started.elapsed().as_secs_f64()
        );
        Ok(CoreAnalysis { tempo, key, features })
    }

    /// Genre and mood concurrently; failures degrade to `Unknown` results
    async fn run_classification(
        &self,
        core: &CoreAnalysis,
        monitor: &MemoryMonitor,
        started: Instant,
    ) -> Result<Classification> {
        let stage_started = Instant::now();
        monitor
            .check()
            .map(|_| ())
            .with_stage(Stage::Classification, started.elapsed(), monitor.snapshot().resident_bytes)?;

        let features = Arc::new(core.features.clone());
        let tempo = core.tempo.clone();
        let cancel = CancellationFlag::new();

        let genre_job = {
            let classifier = Arc::clone(&self.genre);
            let features = Arc::clone(&features);
            let tempo = tempo.clone();
            self.pool.run(move || {
                classifier
                    .classify(&features, Some(&tempo))
                    .map_err(|e| e.at_stage(Stage::Genre))
            })
        };
        let mood_job = {
            let detector = Arc::clone(&self.mood);
            let features = Arc::clone(&features);
            self.pool.run(move || {
                detector
                    .detect(&features, Some(&tempo))
                    .map_err(|e| e.at_stage(Stage::Mood))
            })
        };

        let group = async { futures::join!(genre_job, mood_job) };
        let (genre, mood) = match race_group(
            group,
            Stage::Classification,
            self.settings.analysis_timeout,
            monitor,
            &cancel,
        )
        .await
        {
            Ok(results) => results,
            Err(e) if e.code == ErrorCode::AnalysisTimeout => {
                (Err(e.clone().at_stage(Stage::Genre)), Err(e.at_stage(Stage::Mood)))
            }
            Err(e) => {
                return Err(e).with_stage(
                    Stage::Classification,
                    started.elapsed(),
                    monitor.snapshot().resident_bytes,
                )
            }
        };

        let memory = monitor.snapshot().resident_bytes;
        let genre = StageOutcome::degradable(
            genre.with_stage(Stage::Genre, started.elapsed(), memory),
            GenreResult::unknown,
        );
        let mood = StageOutcome::degradable(
            mood.with_stage(Stage::Mood, started.elapsed(), memory),
            MoodResult::unknown,
        );

        let mut degraded = Vec::new();
        if genre.is_degraded() {
            degraded.push(Stage::Genre);
        }
        if mood.is_degraded() {
            degraded.push(Stage::Mood);
        }

        debug!(
            "Classification completed in {:.2}s ({} degraded)",
            stage_started.elapsed().as_secs_f64(),
            degraded.len()
        );
        Ok(Classification {
            genre: genre.into_result()?,
            mood: mood.into_result()?,
            degraded,
        })
    }
}

/// Race a stage group against its timeout envelope and the memory ceiling
///
/// Either losing condition raises `cancel` so DSP loops still running on the
/// pool stop at their next frame.
/// Run the stem separator under `limit`; any failure only leaves stems empty
async fn separate_stems(
    separator: Arc<dyn StemSeparator>,
    url: String,
    limit: Duration,
) -> Option<StemRefs> {
    match tokio::time::timeout(limit, separator.separate(&url)).await {
        Ok(Ok(stems)) => {
            info!("Stems created by {}", separator.name());
            Some(stems)
        }
        Ok(Err(e)) => {
            warn!(code = e.code.as_str(), "Stem separation failed: {}", e.message);
            None
        }
        Err(_) => {
            warn!("Stem separation did not finish within {:.0}s", limit.as_secs_f64());
            None
        }
    }
}

async fn race_group<T>(
    group: impl std::future::Future<Output = T>,
    stage: Stage,
    limit: Duration,
    monitor: &MemoryMonitor,
    cancel: &CancellationFlag,
) -> Result<T> {
    tokio::select! {
        finished = tokio::time::timeout(limit, group) => match finished {
            Ok(results) => Ok(results),
            Err(_) => {
                cancel.cancel();
                warn!("{} timed out after {:.1}s", stage.as_str(), limit.as_secs_f64());
                Err(AnalysisError::timeout(stage, limit))
            }
        },
        err = monitor.exceeded() => {
            cancel.cancel();
            Err(err)
        }
    }
}

fn log_failure(e: &AnalysisError) {
    error!(
        code = e.code.as_str(),
        stage = e.stage.map(|s| s.as_str()).unwrap_or("unknown"),
        "Analysis failed: {}",
        e.message
    );
}
