//! Runtime configuration settings

use crate::sequence::{SequencerParams, Strategy};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-file analysis deadline in seconds
pub const DEFAULT_TIMEOUT_S: u64 = 60;

/// Analyzer configuration consumed by the parallel pipeline
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Worker cap; None applies the CPU-count policy unmodified
    pub max_workers: Option<usize>,
    /// Hard wall-clock deadline per file
    pub per_file_timeout: Duration,
    /// Lower-case extensions to analyze
    pub supported_extensions: HashSet<String>,
    /// Analysis sample rate in Hz
    pub sample_rate: u32,
    /// Cache directory; None disables caching
    pub cache_dir: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            per_file_timeout: Duration::from_secs(DEFAULT_TIMEOUT_S),
            supported_extensions: default_extensions(),
            sample_rate: crate::audio::TARGET_SAMPLE_RATE,
            cache_dir: None,
        }
    }
}

/// wav, aiff (aif), mp3, flac
pub fn default_extensions() -> HashSet<String> {
    ["wav", "aiff", "aif", "mp3", "flac"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Full runtime settings for a CLI invocation
#[derive(Debug, Clone)]
pub struct Settings {
    /// Input folder (or single file)
    pub input: PathBuf,
    /// Output directory
    pub output: PathBuf,
    pub analyzer: AnalyzerConfig,
    pub strategy: Strategy,
    pub sequencer: SequencerParams,
    /// Playlist name used in exports
    pub playlist_name: String,
    /// Show progress bars
    pub show_progress: bool,
    /// Drop the cache before analyzing
    pub clear_cache: bool,
    /// List files without analyzing
    pub dry_run: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &super::cli::Cli) -> Self {
        let cache_dir = if cli.no_cache {
            None
        } else {
            Some(
                cli.cache_dir
                    .clone()
                    .unwrap_or_else(|| cli.output.join("cache")),
            )
        };

        Self {
            input: cli.input.clone(),
            output: cli.output.clone(),
            analyzer: AnalyzerConfig {
                max_workers: cli.workers,
                per_file_timeout: Duration::from_secs(cli.timeout),
                supported_extensions: default_extensions(),
                sample_rate: crate::audio::TARGET_SAMPLE_RATE,
                cache_dir,
            },
            strategy: cli.strategy,
            sequencer: SequencerParams {
                bpm_tolerance: cli.bpm_tolerance,
                peak_position: cli.peak_position,
                harmonic_strictness: cli.strictness,
                genre_weight: cli.genre_weight,
                allow_experimental: cli.experimental,
            },
            playlist_name: cli.playlist_name.clone(),
            show_progress: !cli.quiet,
            clear_cache: cli.clear_cache,
            dry_run: cli.dry_run,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            output: PathBuf::from("./output"),
            analyzer: AnalyzerConfig::default(),
            strategy: Strategy::HarmonicFlow,
            sequencer: SequencerParams::default(),
            playlist_name: "setforge set".to_string(),
            show_progress: true,
            clear_cache: false,
            dry_run: false,
        }
    }
}
