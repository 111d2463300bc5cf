//! CLI argument parsing and configuration

use crate::sequence::Strategy;
use clap::Parser;
use std::path::PathBuf;

/// setforge - harmonic DJ-set analysis and sequencing
///
/// Analyzes a folder of audio files for BPM, musical key, energy, and mix
/// points, then sequences them into a playlist whose adjacent tracks mix
/// well. Exports M3U and Rekordbox-compatible XML.
#[derive(Parser, Debug)]
#[command(name = "setforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input path (file or directory, scanned recursively)
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output directory for playlist files
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Sequencing strategy
    #[arg(short, long, value_enum, default_value = "harmonic-flow")]
    pub strategy: Strategy,

    /// Hard BPM window half-width for strategy filters
    #[arg(long, value_name = "BPM", default_value = "3.0")]
    pub bpm_tolerance: f64,

    /// Harmonic strictness, 1 (loose) to 10 (strict)
    #[arg(long, value_name = "N", default_value = "5", value_parser = clap::value_parser!(u8).range(1..=10))]
    pub strictness: u8,

    /// Genre factor weight, 0 to 1
    #[arg(long, value_name = "W", default_value = "0.5")]
    pub genre_weight: f64,

    /// Give distant keys a small score instead of zero
    #[arg(long, default_value = "false")]
    pub experimental: bool,

    /// Peak position for peak-time sets, percent of playlist length
    #[arg(long, value_name = "PCT", default_value = "65")]
    pub peak_position: f64,

    /// Playlist name written into exports
    #[arg(long, value_name = "NAME", default_value = "setforge set")]
    pub playlist_name: String,

    /// Number of analysis workers (defaults to the CPU-count policy)
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Per-file analysis deadline in seconds
    #[arg(long, value_name = "SECS", default_value = "60")]
    pub timeout: u64,

    /// Cache directory (defaults to <output>/cache)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Disable the analysis cache
    #[arg(long, default_value = "false")]
    pub no_cache: bool,

    /// Drop all cached analyses before starting
    #[arg(long, default_value = "false")]
    pub clear_cache: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bars)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,

    /// Dry run - list files that would be analyzed without processing
    #[arg(long, default_value = "false")]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_args_parse() {
        let cli = Cli::try_parse_from(["setforge", "-i", "/music", "-o", "/out"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("/music"));
        assert_eq!(cli.strategy, Strategy::HarmonicFlow);
        assert_eq!(cli.timeout, 60);
        assert!(!cli.no_cache);
    }

    #[test]
    fn test_strategy_values_parse() {
        for (flag, expected) in [
            ("harmonic-flow-enhanced", Strategy::HarmonicFlowEnhanced),
            ("warm-up", Strategy::WarmUp),
            ("peak-time-enhanced", Strategy::PeakTimeEnhanced),
            ("smart-harmonic", Strategy::SmartHarmonic),
        ] {
            let cli =
                Cli::try_parse_from(["setforge", "-i", "/m", "-o", "/o", "-s", flag]).unwrap();
            assert_eq!(cli.strategy, expected);
        }
    }

    #[test]
    fn test_strictness_range_enforced() {
        assert!(
            Cli::try_parse_from(["setforge", "-i", "/m", "-o", "/o", "--strictness", "11"])
                .is_err()
        );
    }
}
