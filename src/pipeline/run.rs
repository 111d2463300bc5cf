//! End-to-end run: analyze, sequence, export
//!
//! Coordinates the phases a CLI invocation goes through and reports phase
//! timings. Kept free of terminal concerns so it is callable from tests.

use crate::cache::TrackCache;
use crate::config::Settings;
use crate::discovery;
use crate::error::{Result, SetforgeError};
use crate::export;
use crate::pipeline::orchestrator::{analyze_folder, ProgressSink};
use crate::sequence::{self, QualityReport};
use std::time::Instant;
use tracing::{debug, info};

/// Summary of a completed run
#[derive(Debug)]
pub struct RunSummary {
    pub total_files: usize,
    pub analyzed: usize,
    pub from_cache: usize,
    pub failed: usize,
    pub playlist_len: usize,
    pub quality: QualityReport,
}

/// Run the full pipeline for one CLI invocation
pub fn run(settings: &Settings, progress: &dyn ProgressSink) -> Result<RunSummary> {
    let run_start = Instant::now();

    if settings.clear_cache {
        if let Some(dir) = &settings.analyzer.cache_dir {
            TrackCache::open(dir)?.clear()?;
            info!("Cleared analysis cache at {}", dir.display());
        }
    }

    if settings.dry_run {
        return dry_run(settings);
    }

    // Phase 1+2: discovery and parallel analysis
    let analysis_start = Instant::now();
    let batch = analyze_folder(&settings.input, &settings.analyzer, progress)?;
    let analyzed = batch.records.len();
    info!(
        "Analysis completed in {:.2}s ({} records, {} cached, {} failures)",
        analysis_start.elapsed().as_secs_f64(),
        analyzed,
        batch.from_cache,
        batch.failures.len()
    );

    // Phase 3: sequencing
    let sequence_start = Instant::now();
    let result = sequence::sequence(&batch.records, settings.strategy, &settings.sequencer);
    info!(
        "Sequenced {} tracks with {} in {:.2}s",
        result.playlist.len(),
        settings.strategy,
        sequence_start.elapsed().as_secs_f64()
    );
    if let Some(mean) = result.quality.mean_compat {
        debug!(
            mean_compat = mean,
            harmonic_hit_rate = result.quality.harmonic_hit_rate,
            bpm_jump_mean = result.quality.bpm_jump_mean,
            "playlist quality"
        );
    }

    // Phase 4: export
    if !result.playlist.is_empty() {
        let export_start = Instant::now();
        export_results(settings, &result, &batch.failures)?;
        info!(
            "Export completed in {:.2}s",
            export_start.elapsed().as_secs_f64()
        );
    }

    info!(
        "Total pipeline time: {:.2}s",
        run_start.elapsed().as_secs_f64()
    );

    Ok(RunSummary {
        total_files: analyzed + batch.failures.len(),
        analyzed,
        from_cache: batch.from_cache,
        failed: batch.failures.len(),
        playlist_len: result.playlist.len(),
        quality: result.quality,
    })
}

/// List the files that would be analyzed without touching them
fn dry_run(settings: &Settings) -> Result<RunSummary> {
    let files = discovery::scan(&settings.input, &settings.analyzer.supported_extensions)?;

    println!();
    println!("Would analyze {} files:", files.len());
    for file in &files {
        println!("  {}", file.path.display());
    }
    println!();
    println!("Would create:");
    println!("  {}/playlist.m3u8", settings.output.display());
    println!("  {}/rekordbox.xml", settings.output.display());
    println!("  {}/setforge.json", settings.output.display());

    Ok(RunSummary {
        total_files: files.len(),
        analyzed: 0,
        from_cache: 0,
        failed: 0,
        playlist_len: 0,
        quality: QualityReport::empty(),
    })
}

fn export_results(
    settings: &Settings,
    result: &sequence::SequenceResult,
    failures: &[crate::error::AnalysisFailure],
) -> Result<()> {
    std::fs::create_dir_all(&settings.output).map_err(|e| SetforgeError::OutputError {
        path: settings.output.clone(),
        reason: e.to_string(),
    })?;

    export::write_m3u(
        &result.playlist,
        &settings.output.join("playlist.m3u8"),
        &settings.playlist_name,
    )?;
    export::write_rekordbox_xml(
        &result.playlist,
        &settings.output.join("rekordbox.xml"),
        &settings.playlist_name,
    )?;
    export::write_report(
        &result.playlist,
        &result.quality,
        failures,
        settings.strategy.display_name(),
        &settings.output.join("setforge.json"),
    )?;

    Ok(())
}
