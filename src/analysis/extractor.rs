//! Per-file feature extraction
//!
//! `TrackAnalyzer` is the seam between the pipeline and the analysis
//! kernels; the pipeline only ever sees the trait, so tests can inject
//! counting or sleeping analyzers and the production path stays swappable.

use crate::analysis::{energy, key, metadata, structure, tempo};
use crate::analysis::stft::StftProcessor;
use crate::audio;
use crate::cache::file_fingerprint;
use crate::discovery;
use crate::error::{Result, SetforgeError};
use crate::types::{AudioBuffer, TrackRecord};
use std::path::Path;
use tracing::debug;

/// Minimum audio duration in seconds for reliable tempo/key estimation
const MIN_AUDIO_DURATION_S: f64 = 3.0;

/// Analysis backend invoked once per file by the pipeline workers
pub trait TrackAnalyzer: Send + Sync {
    /// Produce a full track record for the file
    fn analyze(&self, path: &Path) -> Result<TrackRecord>;

    /// Name of this analyzer (for logging)
    fn name(&self) -> &'static str;
}

/// Production analyzer: decode, then run the full feature stack
pub struct DefaultAnalyzer {
    sample_rate: u32,
}

impl DefaultAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Default for DefaultAnalyzer {
    fn default() -> Self {
        Self::new(audio::TARGET_SAMPLE_RATE)
    }
}

impl TrackAnalyzer for DefaultAnalyzer {
    fn analyze(&self, path: &Path) -> Result<TrackRecord> {
        let (size_bytes, mtime_ns) =
            file_fingerprint(path).map_err(|e| SetforgeError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let buffer = audio::decode(path, self.sample_rate)?;
        extract_record(path, &buffer, size_bytes, mtime_ns)
    }

    fn name(&self) -> &'static str {
        "setforge-dsp"
    }
}

/// Run the feature stack over decoded PCM and assemble the record
pub fn extract_record(
    path: &Path,
    buffer: &AudioBuffer,
    size_bytes: u64,
    mtime_ns: u128,
) -> Result<TrackRecord> {
    if buffer.is_empty() || buffer.duration <= 0.0 {
        return Err(SetforgeError::decode_error(path, "decoded to zero duration"));
    }
    if buffer.samples.iter().any(|s| !s.is_finite()) {
        return Err(SetforgeError::decode_error(path, "non-finite samples in PCM"));
    }
    if buffer.duration < MIN_AUDIO_DURATION_S {
        return Err(SetforgeError::decode_error(
            path,
            format!(
                "audio too short ({:.1}s); at least {:.0}s needed for tempo/key estimation",
                buffer.duration, MIN_AUDIO_DURATION_S
            ),
        ));
    }

    let mut stft = StftProcessor::new();
    let spectrogram = stft.magnitudes(&buffer.samples, buffer.sample_rate);

    let tempo = tempo::estimate_tempo(&spectrogram).map_err(|e| with_path(e, path))?;
    let key = key::estimate_key(&spectrogram).map_err(|e| with_path(e, path))?;

    let energy = energy::track_energy(&buffer.samples, buffer.sample_rate);
    let bass_intensity = energy::bass_intensity(&spectrogram);

    let structure = structure::analyze_structure(
        &buffer.samples,
        buffer.sample_rate,
        buffer.duration,
        tempo.bpm,
    );

    let (artist, title, genre) = metadata::resolve_metadata(path);

    debug!(
        "Analyzed {}: BPM={:.1}, Key={}, energy={:.2}, {} sections{}",
        path.file_name().unwrap_or_default().to_string_lossy(),
        tempo.bpm,
        key.camelot,
        energy,
        structure.sections.len(),
        if structure.fallback { " (fallback)" } else { "" },
    );

    Ok(TrackRecord {
        track_id: discovery::generate_track_id(path),
        path: path.to_path_buf(),
        size_bytes,
        mtime_ns,
        artist,
        title,
        genre,
        duration_s: buffer.duration,
        bpm: tempo.bpm,
        bpm_confidence: tempo.confidence,
        key_root: key.root,
        key_mode: key.mode,
        camelot: key.camelot,
        key_confidence: key.confidence,
        energy,
        bass_intensity,
        sections: structure.sections,
        mix_in_s: structure.mix_in_s,
        mix_out_s: structure.mix_out_s,
        structure_fallback: structure.fallback,
        analyzed_at: chrono::Utc::now(),
    })
}

/// Feature stages report failures with an empty path; fill in the real one
fn with_path(err: SetforgeError, path: &Path) -> SetforgeError {
    match err {
        SetforgeError::FeatureFailure { stage, reason, .. } => SetforgeError::FeatureFailure {
            path: path.to_path_buf(),
            stage,
            reason,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SectionLabel;

    fn buffer_from(samples: Vec<f32>, sr: u32) -> AudioBuffer {
        AudioBuffer::new(samples, sr)
    }

    fn click_track(bpm: f64, duration_s: f64, sr: u32) -> Vec<f32> {
        let num = (duration_s * sr as f64) as usize;
        let per_beat = (60.0 / bpm * sr as f64) as usize;
        let imp = (0.005 * sr as f64) as usize;
        (0..num)
            .map(|i| {
                let pos = i % per_beat;
                if pos < imp {
                    0.8 * (-5.0 * pos as f32 / imp as f32).exp()
                } else {
                    0.0
                }
            })
            .collect()
    }

    #[test]
    fn test_record_invariants_on_click_track() {
        let sr = 22050;
        let buf = buffer_from(click_track(128.0, 30.0, sr), sr);
        let record =
            extract_record(Path::new("/music/Test Artist - Clicks.wav"), &buf, 1234, 5678)
                .unwrap();

        assert!((127.5..=128.5).contains(&record.bpm), "bpm {}", record.bpm);
        assert!(record.mix_in_s >= 0.0);
        assert!(record.mix_in_s < record.mix_out_s);
        assert!(record.mix_out_s <= record.duration_s);
        assert_eq!(record.sections.first().unwrap().label, SectionLabel::Intro);
        assert_eq!(record.sections.last().unwrap().label, SectionLabel::Outro);
        assert_eq!(record.artist, "Test Artist");
        assert_eq!(record.title, "Clicks");
        assert_eq!(record.size_bytes, 1234);
        assert_eq!(record.mtime_ns, 5678);
    }

    #[test]
    fn test_silence_sets_fallback_flag() {
        let sr = 22050;
        let buf = buffer_from(vec![0.0; sr as usize * 180], sr);
        let record = extract_record(Path::new("/music/silence.wav"), &buf, 0, 0).unwrap();

        assert!(record.structure_fallback);
        assert_eq!(record.bpm, 120.0);
        assert!((record.mix_in_s - 27.0).abs() < 0.5);
        assert!((record.mix_out_s - 153.0).abs() < 0.5);
    }

    #[test]
    fn test_zero_duration_is_decode_error() {
        let buf = buffer_from(vec![], 22050);
        let err = extract_record(Path::new("/x.wav"), &buf, 0, 0).unwrap_err();
        assert!(matches!(err, SetforgeError::DecodeError { .. }));
    }

    #[test]
    fn test_nan_samples_are_decode_error() {
        let mut samples = vec![0.1f32; 22050 * 4];
        samples[100] = f32::NAN;
        let buf = buffer_from(samples, 22050);
        let err = extract_record(Path::new("/x.wav"), &buf, 0, 0).unwrap_err();
        assert!(matches!(err, SetforgeError::DecodeError { .. }));
    }

    #[test]
    fn test_too_short_rejected() {
        let buf = buffer_from(vec![0.1f32; 22050], 22050);
        let err = extract_record(Path::new("/x.wav"), &buf, 0, 0).unwrap_err();
        assert!(matches!(err, SetforgeError::DecodeError { .. }));
    }
}
