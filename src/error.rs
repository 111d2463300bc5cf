//! Unified error types for setforge
//!
//! Error strategy:
//! - Per-file errors (unreadable, decode, feature extraction, timeout,
//!   worker crash): recoverable, recorded as a failure entry, batch continues
//! - System errors (output, configuration): fatal, abort the run
//!
//! Cache lock timeouts never surface as errors at all: a read behaves as a
//! miss, a write is discarded, and analysis proceeds.

use std::path::PathBuf;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, AIFF";

/// Top-level error type for setforge operations
#[derive(Debug, Error)]
pub enum SetforgeError {
    // =========================================================================
    // Recoverable errors - skip file, continue batch
    // =========================================================================
    #[error("Cannot read '{}': {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Failed to decode audio file '{}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}\n  Tip: If the file plays in other apps, it may be corrupted or use an unsupported codec", .path.display())]
    DecodeError { path: PathBuf, reason: String },

    #[error("Unsupported audio format for '{}': {format}\n  Supported formats: {SUPPORTED_FORMATS}", .path.display())]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("{stage} estimation failed for '{}': {reason}", .path.display())]
    FeatureFailure {
        path: PathBuf,
        stage: FeatureStage,
        reason: String,
    },

    #[error("Analysis of '{}' exceeded the {timeout_s}s deadline", .path.display())]
    Timeout { path: PathBuf, timeout_s: u64 },

    #[error("Worker crashed while analyzing '{}': {reason}", .path.display())]
    WorkerCrash { path: PathBuf, reason: String },

    #[error("File not found: '{}'\n  Tip: Check the path exists and is accessible", .0.display())]
    FileNotFound(PathBuf),

    // =========================================================================
    // Fatal errors - abort the run
    // =========================================================================
    #[error("Cannot write output to '{}': {reason}\n  Tip: Check write permissions for the output directory", .path.display())]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The analysis stage that could not produce a confident value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStage {
    Tempo,
    Key,
    Structure,
}

impl std::fmt::Display for FeatureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureStage::Tempo => write!(f, "Tempo"),
            FeatureStage::Key => write!(f, "Key"),
            FeatureStage::Structure => write!(f, "Structure"),
        }
    }
}

/// Result type alias for setforge operations
pub type Result<T> = std::result::Result<T, SetforgeError>;

impl SetforgeError {
    /// Returns true if this error is recoverable (skip file, continue batch)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SetforgeError::Unreadable { .. }
                | SetforgeError::DecodeError { .. }
                | SetforgeError::UnsupportedFormat { .. }
                | SetforgeError::FeatureFailure { .. }
                | SetforgeError::Timeout { .. }
                | SetforgeError::WorkerCrash { .. }
                | SetforgeError::FileNotFound(_)
        )
    }

    /// Create a decode error with context about the issue
    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SetforgeError::DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a feature-stage failure
    pub fn feature_failure(
        path: impl Into<PathBuf>,
        stage: FeatureStage,
        reason: impl Into<String>,
    ) -> Self {
        SetforgeError::FeatureFailure {
            path: path.into(),
            stage,
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!(
                    "Permission denied. Check that you have write access to {}",
                    path.display()
                )
            }
            std::io::ErrorKind::NotFound => {
                format!(
                    "Directory does not exist: {}",
                    path.parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                )
            }
            _ => err.to_string(),
        };
        SetforgeError::OutputError { path, reason }
    }
}

// =============================================================================
// Per-file failure records
// =============================================================================

/// Why a file produced no track record
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// File missing at analysis time or the decoder refused it
    Unreadable,
    /// PCM obtained but invalid (NaN/Inf samples, zero duration)
    Decode,
    /// Tempo or key could not be estimated with confidence
    Feature,
    /// The per-file wall-clock deadline elapsed
    Timeout,
    /// The worker running the job exited abnormally
    WorkerCrash,
}

/// A file that was skipped, with enough context to report it
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisFailure {
    pub path: PathBuf,
    pub reason: FailureReason,
    pub detail: String,
}

impl AnalysisFailure {
    pub fn from_error(path: PathBuf, err: &SetforgeError) -> Self {
        let reason = match err {
            SetforgeError::Unreadable { .. }
            | SetforgeError::UnsupportedFormat { .. }
            | SetforgeError::FileNotFound(_) => FailureReason::Unreadable,
            SetforgeError::DecodeError { .. } => FailureReason::Decode,
            SetforgeError::FeatureFailure { .. } => FailureReason::Feature,
            SetforgeError::Timeout { .. } => FailureReason::Timeout,
            SetforgeError::WorkerCrash { .. } => FailureReason::WorkerCrash,
            other => {
                debug_assert!(other.is_recoverable(), "fatal error in failure list");
                FailureReason::Unreadable
            }
        };
        Self {
            path,
            reason,
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_recoverability_split() {
        let skip = SetforgeError::Timeout {
            path: PathBuf::from("/a.mp3"),
            timeout_s: 60,
        };
        assert!(skip.is_recoverable());

        let fatal = SetforgeError::ConfigError("bad".into());
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn test_failure_reason_mapping() {
        let err = SetforgeError::feature_failure(Path::new("/x.wav"), FeatureStage::Tempo, "flat");
        let failure = AnalysisFailure::from_error(PathBuf::from("/x.wav"), &err);
        assert_eq!(failure.reason, FailureReason::Feature);
        assert!(failure.detail.contains("Tempo"));
    }
}
