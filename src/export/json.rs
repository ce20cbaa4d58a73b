//! JSON export for interoperability with other tools

use crate::error::{AnalysisError, ErrorCode, Result};
use crate::types::AnalysisResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Top-level JSON document
#[derive(Debug, Serialize, Deserialize)]
pub struct TunelensJson {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ExportMetadata,
    pub result: AnalysisResult,
}

/// Export metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// tunelens version that generated this file
    pub generator_version: String,
    /// Timestamp of export
    pub exported_at: String,
}

fn document(result: &AnalysisResult) -> TunelensJson {
    TunelensJson {
        version: SCHEMA_VERSION.to_string(),
        metadata: ExportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
        },
        result: result.clone(),
    }
}

fn output_error(path: &Path, reason: String) -> AnalysisError {
    AnalysisError::new(ErrorCode::TempStorageFailed, reason)
        .with_detail("path", path.to_string_lossy().to_string())
}

/// Pretty-printed JSON document for a result
pub fn to_json_string(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(&document(result))
        .map_err(|e| AnalysisError::unknown(format!("Failed to serialize result: {}", e)))
}

/// Write a result to a JSON file
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
/// This prevents data corruption if the write is interrupted.
pub fn write_json(result: &AnalysisResult, output_path: &Path) -> Result<()> {
    // Same directory keeps the rename on one filesystem
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path)
        .map_err(|e| output_error(output_path, format!("Failed to create temp file: {}", e)))?;

    serde_json::to_writer_pretty(BufWriter::new(file), &document(result)).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        output_error(output_path, e.to_string())
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        AnalysisError::new(
            ErrorCode::CleanupFailed,
            format!("Failed to finalize {}: {}", output_path.display(), e),
        )
    })?;

    info!("Wrote analysis to {}", output_path.display());

    Ok(())
}

/// Read a result previously written by [`write_json`]
pub fn read_json(path: &Path) -> Result<AnalysisResult> {
    let file = File::open(path)
        .map_err(|e| output_error(path, format!("Failed to open {}: {}", path.display(), e)))?;
    let doc: TunelensJson = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| output_error(path, format!("Failed to parse {}: {}", path.display(), e)))?;
    Ok(doc.result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::synthesize_analysis;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("result.json");
        let result = synthesize_analysis("track-1", Some("req-9"));

        write_json(&result, &path).unwrap();
        assert!(!dir.path().join("result.json.tmp").exists());

        let loaded = read_json(&path).unwrap();
        assert_eq!(loaded.tempo, result.tempo);
        assert_eq!(loaded.origin, result.origin);
        assert_eq!(loaded.request_id.as_deref(), Some("req-9"));
    }

    #[test]
    fn test_json_string_uses_vocabulary_labels() {
        let result = synthesize_analysis("track-2", None);
        let json = to_json_string(&result).unwrap();
        assert!(json.contains("\"version\": \"1.0\""));
        assert!(json.contains("\"origin\": \"synthetic_fallback\""));
        assert!(json.contains(result.genre.primary.label()));
        assert!(!json.contains("\"features\""));
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("result.json");
        let err = write_json(&synthesize_analysis("x", None), &path).unwrap_err();
        assert_eq!(err.code, ErrorCode::TempStorageFailed);
    }
}
