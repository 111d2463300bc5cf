//! Core data types for setforge
//!
//! These types represent the domain model and flow through the pipeline:
//! analysis produces a `TrackRecord` per file, the cache persists it, and
//! the sequencer consumes it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Musical primitives
// =============================================================================

/// The 12 pitch classes in Western music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Cs, // C#/Db
    D,
    Ds, // D#/Eb
    E,
    F,
    Fs, // F#/Gb
    G,
    Gs, // G#/Ab
    A,
    As, // A#/Bb
    B,
}

impl PitchClass {
    /// Convert from numeric index (0 = C, 1 = C#, ..., 11 = B)
    pub fn from_index(index: u8) -> Option<Self> {
        match index % 12 {
            0 => Some(PitchClass::C),
            1 => Some(PitchClass::Cs),
            2 => Some(PitchClass::D),
            3 => Some(PitchClass::Ds),
            4 => Some(PitchClass::E),
            5 => Some(PitchClass::F),
            6 => Some(PitchClass::Fs),
            7 => Some(PitchClass::G),
            8 => Some(PitchClass::Gs),
            9 => Some(PitchClass::A),
            10 => Some(PitchClass::As),
            11 => Some(PitchClass::B),
            _ => None,
        }
    }

    /// Convert to numeric index (0 = C, 1 = C#, ..., 11 = B)
    pub fn to_index(self) -> u8 {
        match self {
            PitchClass::C => 0,
            PitchClass::Cs => 1,
            PitchClass::D => 2,
            PitchClass::Ds => 3,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::Fs => 6,
            PitchClass::G => 7,
            PitchClass::Gs => 8,
            PitchClass::A => 9,
            PitchClass::As => 10,
            PitchClass::B => 11,
        }
    }

}

/// Major or Minor scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

// =============================================================================
// Track structure
// =============================================================================

/// Label for a structural section of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionLabel {
    Intro,
    Verse,
    Breakdown,
    Drop,
    Outro,
}

impl SectionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionLabel::Intro => "intro",
            SectionLabel::Verse => "verse",
            SectionLabel::Breakdown => "breakdown",
            SectionLabel::Drop => "drop",
            SectionLabel::Outro => "outro",
        }
    }
}

/// A labeled, bar-aligned section of a track
///
/// Sections are contiguous and non-overlapping: `sections[i].end_s ==
/// sections[i+1].start_s`, the first section starts at 0 and the last ends
/// at the track duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub label: SectionLabel,
    pub start_s: f64,
    pub end_s: f64,
    pub start_bar: u32,
    pub end_bar: u32,
    /// Mean RMS energy of the section, normalized to [0, 1]
    pub avg_energy: f64,
}

impl Section {
    pub fn duration(&self) -> f64 {
        self.end_s - self.start_s
    }
}

// =============================================================================
// Track record
// =============================================================================

/// Complete analysis result for a single track
///
/// Created once by the feature extractor, written to the cache under its
/// file fingerprint (path + size + mtime), and immutable thereafter. If the
/// file changes on disk the stored record is simply treated as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Deterministic ID derived from the path (used as XML TrackID)
    pub track_id: i32,
    /// Absolute file path; external identity of the record
    pub path: PathBuf,
    /// File size at analysis time (fingerprint component)
    pub size_bytes: u64,
    /// File mtime in nanoseconds at analysis time (fingerprint component)
    pub mtime_ns: u128,

    pub artist: String,
    pub title: String,
    pub genre: String,

    /// Duration in seconds (positive)
    pub duration_s: f64,
    /// Detected tempo in [40, 220], rounded to one decimal
    pub bpm: f64,
    /// Tempo detection confidence in [0, 1]
    pub bpm_confidence: f64,
    pub key_root: PitchClass,
    pub key_mode: Mode,
    /// Camelot wheel code derived from (key_root, key_mode), e.g. "8A"
    pub camelot: String,
    /// Key detection confidence in [0, 1]
    pub key_confidence: f64,

    /// Trimmed-mean RMS energy, normalized to [0, 1]
    pub energy: f64,
    /// Spectral magnitude ratio of [20, 200] Hz over the full band, in [0, 1]
    pub bass_intensity: f64,

    /// Structural sections covering [0, duration_s]
    pub sections: Vec<Section>,
    /// Phrase-aligned blend-in point: 0 <= mix_in_s < mix_out_s <= duration_s
    pub mix_in_s: f64,
    /// Phrase-aligned blend-out point
    pub mix_out_s: f64,
    /// True when section detection fell back to percentage-based mix points
    pub structure_fallback: bool,

    /// Timestamp of analysis
    pub analyzed_at: chrono::DateTime<chrono::Utc>,
}

impl TrackRecord {
    /// Display name in "Artist - Title" form
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

// =============================================================================
// Audio buffer
// =============================================================================

/// Decoded audio samples ready for analysis
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        // Guard against division by zero - use 0 duration for invalid sample rate
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_index_round_trip() {
        for idx in 0..12u8 {
            let pc = PitchClass::from_index(idx).unwrap();
            assert_eq!(pc.to_index(), idx);
        }
    }

    #[test]
    fn test_audio_buffer_duration() {
        let buf = AudioBuffer::new(vec![0.0; 22050], 22050);
        assert!((buf.duration - 1.0).abs() < 1e-9);
        let degenerate = AudioBuffer::new(vec![0.0; 100], 0);
        assert_eq!(degenerate.duration, 0.0);
    }

    #[test]
    fn test_section_duration() {
        let s = Section {
            label: SectionLabel::Verse,
            start_s: 30.0,
            end_s: 62.0,
            start_bar: 15,
            end_bar: 31,
            avg_energy: 0.6,
        };
        assert!((s.duration() - 32.0).abs() < 1e-9);
    }
}
