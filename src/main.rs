//! setforge CLI entry point

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use setforge::config::{Cli, Settings};
use setforge::pipeline::{self, NullProgress, ProgressSink};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Build settings from CLI
    let settings = Settings::from_cli(&cli);

    // Validate inputs
    if let Err(e) = validate_inputs(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    // Run the pipeline
    let result = if settings.show_progress {
        pipeline::run(&settings, &BarProgress::default())
    } else {
        pipeline::run(&settings, &NullProgress)
    };

    match result {
        Ok(summary) => {
            println!();
            println!(
                "Summary: {} analyzed ({} from cache), {} failed (of {} total)",
                summary.analyzed, summary.from_cache, summary.failed, summary.total_files
            );
            if summary.playlist_len > 0 {
                print_quality(&summary);
            }

            if summary.failed > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_quality(summary: &pipeline::RunSummary) {
    let q = &summary.quality;
    println!("Playlist: {} tracks", summary.playlist_len);
    match q.mean_compat {
        Some(mean) => println!(
            "  compatibility {:.1}/100, harmonic hit rate {:.0}%, mean BPM jump {:.1}",
            mean,
            q.harmonic_hit_rate * 100.0,
            q.bpm_jump_mean
        ),
        None => println!("  single track, pairwise metrics not applicable"),
    }
}

fn init_logging(cli: &Cli) {
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = if cli.quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn validate_inputs(cli: &Cli) -> Result<(), String> {
    // Check input exists
    if !cli.input.exists() {
        return Err(format!(
            "Input path does not exist: {}\n\n  Tip: Check the path is correct and accessible.\n  Examples:\n    setforge -i ~/Music/DJ -o ./set\n    setforge -i ./crate-digs -o ./set -s peak-time-enhanced",
            cli.input.display()
        ));
    }

    // Check output parent directory exists (we'll create the output dir itself)
    if let Some(parent) = cli.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!(
                "Output parent directory does not exist: {}\n\n  Tip: The output directory will be created automatically,\n  but its parent directory must exist.\n  Example: mkdir -p {}",
                parent.display(),
                parent.display()
            ));
        }
    }

    Ok(())
}

/// indicatif-backed progress sink, created lazily on the first update
#[derive(Default)]
struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressSink for BarProgress {
    fn update(&self, done: usize, total: usize, current_file: &Path, status: &str) {
        let mut guard = self.bar.lock().unwrap();
        let bar = guard.get_or_insert_with(|| {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            pb
        });

        bar.set_position(done as u64);
        bar.set_message(format!(
            "{} [{}]",
            current_file
                .file_name()
                .unwrap_or_default()
                .to_string_lossy(),
            status
        ));
        if done >= total {
            bar.finish_with_message("Analysis complete");
        }
    }
}
