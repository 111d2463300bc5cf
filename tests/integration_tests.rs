//! Integration tests for the setforge pipeline
//!
//! These exercise the real decode + analysis + cache + sequencing path over
//! synthetic WAV fixtures.

use setforge::config::{AnalyzerConfig, Settings};
use setforge::export;
use setforge::pipeline::{self, analyze_folder, NullProgress};
use setforge::sequence::{self, SequencerParams, Strategy};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Analysis sample rate used for all fixtures (no resampling in tests)
const SR: u32 = 22050;

/// Write a mono 16-bit WAV from f32 samples
fn write_wav(path: &Path, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");
    for s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        writer
            .write_sample((clamped * 32767.0) as i16)
            .expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
}

/// Click track: short decaying impulses at regular beat intervals
fn generate_click_track(path: &Path, bpm: f32, duration_secs: f32) {
    let num_samples = (duration_secs * SR as f32) as usize;
    let samples_per_beat = (60.0 / bpm * SR as f32) as usize;
    let impulse_samples = (0.005 * SR as f32) as usize;

    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let position_in_beat = i % samples_per_beat;
            if position_in_beat < impulse_samples {
                let decay = (-5.0 * position_in_beat as f32 / impulse_samples as f32).exp();
                0.8 * decay
            } else {
                0.0
            }
        })
        .collect();

    write_wav(path, &samples);
}

/// Sum of sine tones at the given frequencies
fn generate_tone_mix(path: &Path, freqs: &[f32], duration_secs: f32) {
    use std::f32::consts::PI;
    let num_samples = (duration_secs * SR as f32) as usize;
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            freqs
                .iter()
                .map(|f| (2.0 * PI * f * i as f32 / SR as f32).sin())
                .sum::<f32>()
                / freqs.len() as f32
                * 0.6
        })
        .collect();
    write_wav(path, &samples);
}

fn generate_silence(path: &Path, duration_secs: f32) {
    let num_samples = (duration_secs * SR as f32) as usize;
    write_wav(path, &vec![0.0; num_samples]);
}

fn quick_config() -> AnalyzerConfig {
    AnalyzerConfig {
        max_workers: Some(2),
        ..Default::default()
    }
}

// =============================================================================
// Feature extraction scenarios
// =============================================================================

#[test]
fn test_click_track_bpm_detected() {
    let input = TempDir::new().unwrap();
    generate_click_track(&input.path().join("click128.wav"), 128.0, 10.0);

    let batch = analyze_folder(input.path(), &quick_config(), &NullProgress).unwrap();
    assert_eq!(batch.records.len(), 1, "failures: {:?}", batch.failures);

    let record = &batch.records[0];
    assert!(
        (127.5..=128.5).contains(&record.bpm),
        "detected {} BPM, expected ~128",
        record.bpm
    );
}

#[test]
fn test_a_minor_triad_maps_to_8a() {
    let input = TempDir::new().unwrap();
    // A3 + C4 + E4
    generate_tone_mix(
        &input.path().join("triad.wav"),
        &[220.0, 261.63, 329.63],
        4.0,
    );

    let batch = analyze_folder(input.path(), &quick_config(), &NullProgress).unwrap();
    assert_eq!(batch.records.len(), 1, "failures: {:?}", batch.failures);
    assert_eq!(batch.records[0].camelot, "8A");
}

#[test]
fn test_silence_takes_structure_fallback() {
    let input = TempDir::new().unwrap();
    generate_silence(&input.path().join("silence.wav"), 180.0);

    let batch = analyze_folder(input.path(), &quick_config(), &NullProgress).unwrap();
    assert_eq!(batch.records.len(), 1, "failures: {:?}", batch.failures);

    let record = &batch.records[0];
    assert!(record.structure_fallback);
    // Tempo detection falls back to 120 BPM: phrase = 32 s, so the
    // percentage fallback lands at 27 s and 153 s
    assert_eq!(record.bpm, 120.0);
    assert!(
        (record.mix_in_s - 27.0).abs() < 0.5,
        "mix_in {}",
        record.mix_in_s
    );
    assert!(
        (record.mix_out_s - 153.0).abs() < 0.5,
        "mix_out {}",
        record.mix_out_s
    );
}

#[test]
fn test_record_invariants_hold() {
    let input = TempDir::new().unwrap();
    generate_click_track(&input.path().join("a.wav"), 124.0, 12.0);
    generate_click_track(&input.path().join("b.wav"), 140.0, 12.0);

    let batch = analyze_folder(input.path(), &quick_config(), &NullProgress).unwrap();
    assert_eq!(batch.records.len(), 2);

    for record in &batch.records {
        assert!(record.mix_in_s >= 0.0);
        assert!(record.mix_in_s < record.mix_out_s);
        assert!(record.mix_out_s <= record.duration_s + 1e-9);
        assert!((40.0..=220.0).contains(&record.bpm));
        assert!((0.0..=1.0).contains(&record.energy));
        assert!((0.0..=1.0).contains(&record.bass_intensity));

        // Sections tile the track
        let sections = &record.sections;
        assert!(!sections.is_empty());
        assert_eq!(sections[0].start_s, 0.0);
        assert!((sections.last().unwrap().end_s - record.duration_s).abs() < 1e-6);
        for pair in sections.windows(2) {
            assert!((pair[0].end_s - pair[1].start_s).abs() < 1e-9);
        }
        assert_eq!(sections[0].label, setforge::SectionLabel::Intro);
        assert_eq!(
            sections.last().unwrap().label,
            setforge::SectionLabel::Outro
        );
    }
}

#[test]
fn test_empty_folder() {
    let input = TempDir::new().unwrap();
    let batch = analyze_folder(input.path(), &quick_config(), &NullProgress).unwrap();
    assert!(batch.records.is_empty());
    assert!(batch.failures.is_empty());

    // Sequencing the empty batch is well-defined
    let result = sequence::sequence(&batch.records, Strategy::HarmonicFlow, &SequencerParams::default());
    assert!(result.playlist.is_empty());
    assert_eq!(result.quality.mean_compat, None);
}

#[test]
fn test_invalid_file_reported_not_fatal() {
    let input = TempDir::new().unwrap();
    generate_click_track(&input.path().join("good.wav"), 128.0, 8.0);
    fs::write(input.path().join("bad.wav"), b"This is not a WAV file!!!").unwrap();

    let batch = analyze_folder(input.path(), &quick_config(), &NullProgress).unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.failures.len(), 1);
    assert!(batch.failures[0].path.ends_with("bad.wav"));
}

// =============================================================================
// Cache behavior
// =============================================================================

#[test]
fn test_second_pass_served_from_cache() {
    let input = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    generate_click_track(&input.path().join("a.wav"), 126.0, 8.0);
    generate_click_track(&input.path().join("b.wav"), 130.0, 8.0);

    let cfg = AnalyzerConfig {
        max_workers: Some(2),
        cache_dir: Some(cache_dir.path().to_path_buf()),
        ..Default::default()
    };

    let first = analyze_folder(input.path(), &cfg, &NullProgress).unwrap();
    assert_eq!(first.records.len(), 2);
    assert_eq!(first.from_cache, 0);

    // Untouched files: everything comes from the cache
    let second = analyze_folder(input.path(), &cfg, &NullProgress).unwrap();
    assert_eq!(second.records.len(), 2);
    assert_eq!(second.from_cache, 2);

    // Records identical across passes
    for (a, b) in first.records.iter().zip(second.records.iter()) {
        assert_eq!(a.path, b.path);
        assert_eq!(a.bpm, b.bpm);
        assert_eq!(a.camelot, b.camelot);
        assert_eq!(a.mix_in_s, b.mix_in_s);
    }
}

#[test]
fn test_touched_file_reanalyzed() {
    let input = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let file = input.path().join("a.wav");
    generate_click_track(&file, 126.0, 8.0);

    let cfg = AnalyzerConfig {
        max_workers: Some(1),
        cache_dir: Some(cache_dir.path().to_path_buf()),
        ..Default::default()
    };

    analyze_folder(input.path(), &cfg, &NullProgress).unwrap();

    // Rewrite with different content (size changes)
    generate_click_track(&file, 140.0, 9.0);

    let second = analyze_folder(input.path(), &cfg, &NullProgress).unwrap();
    assert_eq!(second.from_cache, 0, "stale entry must not be served");
    assert!((139.0..=141.0).contains(&second.records[0].bpm));
}

// =============================================================================
// Full pipeline runs
// =============================================================================

fn test_settings(input: &Path, output: &Path) -> Settings {
    Settings {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        analyzer: AnalyzerConfig {
            max_workers: Some(2),
            cache_dir: None,
            ..Default::default()
        },
        strategy: Strategy::HarmonicFlow,
        sequencer: SequencerParams::default(),
        playlist_name: "Test Set".to_string(),
        show_progress: false,
        clear_cache: false,
        dry_run: false,
    }
}

#[test]
fn test_run_produces_all_exports() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    generate_click_track(&input.path().join("one.wav"), 126.0, 8.0);
    generate_click_track(&input.path().join("two.wav"), 128.0, 8.0);

    let settings = test_settings(input.path(), output.path());
    let summary = pipeline::run(&settings, &NullProgress).unwrap();

    assert_eq!(summary.analyzed, 2);
    assert_eq!(summary.playlist_len, 2);
    assert_eq!(summary.failed, 0);

    let m3u = output.path().join("playlist.m3u8");
    let xml = output.path().join("rekordbox.xml");
    let json = output.path().join("setforge.json");
    assert!(m3u.exists());
    assert!(xml.exists());
    assert!(json.exists());

    // M3U round trip matches the records
    let entries = export::read_m3u(&m3u).unwrap();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert!(entry.path.exists());
        assert!(entry.mix_in_s < entry.mix_out_s);
    }

    // XML carries the mix-point cues
    let xml_text = fs::read_to_string(&xml).unwrap();
    assert!(xml_text.contains("<DJ_PLAYLISTS"));
    assert!(xml_text.contains("Name=\"MIX IN\""));
    assert!(xml_text.contains("Name=\"MIX OUT\""));
    assert!(xml_text.contains("Name=\"Test Set\""));

    // JSON parses and agrees on the track count
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report["metadata"]["track_count"], 2);
    assert_eq!(report["playlist"].as_array().unwrap().len(), 2);
}

#[test]
fn test_run_single_track_reports_null_mean_compat() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    generate_click_track(&input.path().join("solo.wav"), 128.0, 8.0);

    let settings = test_settings(input.path(), output.path());
    let summary = pipeline::run(&settings, &NullProgress).unwrap();

    assert_eq!(summary.playlist_len, 1);
    assert_eq!(summary.quality.mean_compat, None);

    let json = fs::read_to_string(output.path().join("setforge.json")).unwrap();
    assert!(json.contains("\"mean_compat\": null"));
    assert!(!json.contains("NaN"));
}

#[test]
fn test_run_on_empty_folder_writes_nothing() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let settings = test_settings(input.path(), output.path());
    let summary = pipeline::run(&settings, &NullProgress).unwrap();

    assert_eq!(summary.total_files, 0);
    assert_eq!(summary.playlist_len, 0);
    assert!(!output.path().join("playlist.m3u8").exists());
    assert!(!output.path().join("rekordbox.xml").exists());
}

#[test]
fn test_metadata_from_filename() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    generate_click_track(&input.path().join("Some Artist - Some Track.wav"), 128.0, 8.0);

    let settings = test_settings(input.path(), output.path());
    pipeline::run(&settings, &NullProgress).unwrap();

    let json = fs::read_to_string(output.path().join("setforge.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(report["playlist"][0]["artist"], "Some Artist");
    assert_eq!(report["playlist"][0]["title"], "Some Track");
}
