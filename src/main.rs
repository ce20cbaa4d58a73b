//! tunelens CLI entry point

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tunelens::config::{AnalysisSettings, Cli};
use tunelens::pipeline::AnalysisPipeline;
use tunelens::{export, AnalysisError, AnalysisResult, ErrorCode};

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Build settings from CLI
    let settings = AnalysisSettings::from_cli(&cli);

    // Validate inputs
    if let Err(e) = validate_inputs(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tunelens-io")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Fatal error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli, settings)) {
        Ok(result) => {
            print_summary(&result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code, e.user_message);
            if cli.verbose > 0 {
                eprintln!("  {}", e.message);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, settings: AnalysisSettings) -> Result<AnalysisResult, AnalysisError> {
    let pipeline = AnalysisPipeline::new(settings)?;
    let request_id = cli.request_id.as_deref();

    let result = if cli.is_remote() {
        if cli.fallback {
            pipeline
                .analyze_from_source_or_synthesize(&cli.input, request_id)
                .await?
        } else {
            pipeline.analyze_from_source(&cli.input, request_id).await?
        }
    } else {
        let bytes = std::fs::read(&cli.input).map_err(|e| {
            AnalysisError::new(
                ErrorCode::InvalidFile,
                format!("Failed to read {}: {}", cli.input, e),
            )
        })?;
        match pipeline.analyze_bytes(bytes, request_id).await {
            Ok(result) => result,
            Err(e) if cli.fallback && !e.is_critical() => {
                tracing::warn!("Falling back to synthetic result: {}", e.message);
                tunelens::pipeline::synthesize_analysis(&cli.input, request_id)
            }
            Err(e) => return Err(e),
        }
    };

    match &cli.output {
        Some(path) => export::write_json(&result, path)?,
        None => println!("{}", export::to_json_string(&result)?),
    }

    Ok(result)
}

fn print_summary(result: &AnalysisResult) {
    eprintln!();
    eprintln!(
        "Summary: {:.1} BPM ({:.0}%), {} ({:.0}%), {} / {:?}, {:.1}s",
        result.tempo.bpm,
        result.tempo.confidence * 100.0,
        result.key.key,
        result.key.confidence * 100.0,
        result.genre.primary.label(),
        result.mood.primary,
        result.duration
    );
    if !result.degraded_stages.is_empty() {
        eprintln!("Degraded stages: {:?}", result.degraded_stages);
    }
    if result.is_synthetic() {
        eprintln!("Warning: result is synthetic ({:?}), not derived from the audio content", result.origin);
    }
}

fn init_logging(cli: &Cli) {
    let filter = cli.log_level().to_string().to_lowercase();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn validate_inputs(cli: &Cli) -> Result<(), String> {
    // Check input exists
    if !cli.is_remote() && !Path::new(&cli.input).exists() {
        return Err(format!(
            "Input path does not exist: {}\n\n  Tip: Pass a local file or an http(s) URL.\n  Examples:\n    tunelens -i ./track.mp3\n    tunelens -i https://cdn.example.com/track.mp3 --fallback",
            cli.input
        ));
    }

    // Check output parent directory exists
    if let Some(parent) = cli.output.as_deref().and_then(Path::parent) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!(
                "Output parent directory does not exist: {}\n\n  Example: mkdir -p {}",
                parent.display(),
                parent.display()
            ));
        }
    }

    Ok(())
}
