//! JSON report export
//!
//! Full analysis records, the sequenced order, the quality metrics, and the
//! per-file failures in one schema-versioned document, for inspection and
//! for other tools.

use crate::error::{AnalysisFailure, Result, SetforgeError};
use crate::sequence::QualityReport;
use crate::types::TrackRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Top-level JSON report
#[derive(Debug, Serialize, Deserialize)]
pub struct SetReport {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ReportMetadata,
    /// Tracks in playlist order
    pub playlist: Vec<TrackRecord>,
    pub quality: QualityReport,
    pub failures: Vec<AnalysisFailure>,
}

/// Report metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// setforge version that generated this file
    pub generator_version: String,
    /// Timestamp of export
    pub exported_at: String,
    pub strategy: String,
    pub track_count: usize,
}

/// Write the analysis report
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
pub fn write_report(
    playlist: &[TrackRecord],
    quality: &QualityReport,
    failures: &[AnalysisFailure],
    strategy_name: &str,
    output_path: &Path,
) -> Result<()> {
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| SetforgeError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let writer = BufWriter::new(file);

    let report = SetReport {
        version: SCHEMA_VERSION.to_string(),
        metadata: ReportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            strategy: strategy_name.to_string(),
            track_count: playlist.len(),
        },
        playlist: playlist.to_vec(),
        quality: quality.clone(),
        failures: failures.to_vec(),
    };

    serde_json::to_writer_pretty(writer, &report).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        SetforgeError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        SetforgeError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!(
        "Wrote report for {} tracks to {}",
        playlist.len(),
        output_path.display()
    );

    Ok(())
}
