//! Musical key detection via chroma correlation
//!
//! A 12-dimensional chroma vector is accumulated from the magnitude
//! spectrogram over the middle 80% of the track (intros and outros often
//! carry unpitched material) and correlated against the 24
//! Krumhansl-Schmuckler key profiles - every rotation of the major and minor
//! templates. The best-correlating profile names the key.
//!
//! Silence and near-flat chroma (percussion, noise) carry no tonality to
//! name; both take the C major default with zero confidence so the record
//! can still be built. Content that does claim tonality but anti-correlates
//! with every profile is a key failure.

use crate::analysis::camelot;
use crate::analysis::stft::Spectrogram;
use crate::error::{FeatureStage, Result, SetforgeError};
use crate::types::{Mode, PitchClass};
use std::path::PathBuf;

/// Krumhansl-Schmuckler major profile, C through B
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Schmuckler minor profile, C through B
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// A chroma whose peak is below this multiple of its mean carries no
/// tonality worth naming (percussion, noise)
const MIN_TONAL_RATIO: f64 = 1.5;

/// Fraction of frames trimmed from each end before chroma accumulation
const EDGE_TRIM: f64 = 0.10;

/// Key detection result
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEstimate {
    pub root: PitchClass,
    pub mode: Mode,
    /// Camelot code derived from (root, mode)
    pub camelot: String,
    /// Best profile correlation clamped to [0, 1]; 0.0 means the default
    pub confidence: f64,
}

impl KeyEstimate {
    fn new(root: PitchClass, mode: Mode, confidence: f64) -> Self {
        Self {
            root,
            mode,
            camelot: camelot::to_camelot(root, mode).to_string(),
            confidence,
        }
    }
}

/// Detect the musical key of a track from its magnitude spectrogram
pub fn estimate_key(spec: &Spectrogram) -> Result<KeyEstimate> {
    let chroma = chroma_vector(spec);

    // No pitched energy at all: silence. Default key, zero confidence.
    let total: f64 = chroma.iter().sum();
    if total <= 1e-9 {
        return Ok(KeyEstimate::new(PitchClass::C, Mode::Major, 0.0));
    }

    // Near-flat chroma: percussive or noisy content with nothing tonal to
    // name. Same default as silence, no failure - only content that claims
    // tonality and still matches no profile fails below.
    let peak = chroma.iter().cloned().fold(0.0f64, f64::max);
    if peak < MIN_TONAL_RATIO * (total / 12.0) {
        return Ok(KeyEstimate::new(PitchClass::C, Mode::Major, 0.0));
    }

    let mut best_corr = f64::MIN;
    let mut best_root = 0u8;
    let mut best_mode = Mode::Major;

    for root in 0..12u8 {
        let major = profile_correlation(&chroma, &MAJOR_PROFILE, root);
        if major > best_corr {
            best_corr = major;
            best_root = root;
            best_mode = Mode::Major;
        }
        let minor = profile_correlation(&chroma, &MINOR_PROFILE, root);
        if minor > best_corr {
            best_corr = minor;
            best_root = root;
            best_mode = Mode::Minor;
        }
    }

    if !best_corr.is_finite() {
        // Flat chroma (all pitch classes equal) has zero variance
        return Ok(KeyEstimate::new(PitchClass::C, Mode::Major, 0.0));
    }

    // Anti-correlated with every profile in every rotation: the content
    // claims tonality but matches nothing we can name
    if best_corr <= 0.0 {
        return Err(SetforgeError::FeatureFailure {
            path: PathBuf::new(),
            stage: FeatureStage::Key,
            reason: format!("no profile correlates (best {:.2})", best_corr),
        });
    }

    let root = PitchClass::from_index(best_root).unwrap_or(PitchClass::C);
    Ok(KeyEstimate::new(root, best_mode, best_corr.clamp(0.0, 1.0)))
}

/// Accumulate spectrogram magnitudes into pitch classes over the middle 80%
fn chroma_vector(spec: &Spectrogram) -> [f64; 12] {
    let n = spec.num_frames();
    let skip = (n as f64 * EDGE_TRIM) as usize;
    let range = if n > 2 * skip + 1 {
        skip..n - skip
    } else {
        0..n
    };

    let mut chroma = [0.0f64; 12];
    for t in range {
        for (k, mag) in spec.frames[t].iter().enumerate() {
            let freq = spec.bin_frequency(k);
            // Sub-audible bins and the DC line carry no pitch
            if freq < 20.0 {
                continue;
            }
            let pc = pitch_class_of(freq);
            chroma[pc] += *mag as f64;
        }
    }
    chroma
}

/// Pitch class of a frequency (0 = C), via the MIDI note number
fn pitch_class_of(freq: f32) -> usize {
    let midi = 69.0 + 12.0 * (freq / 440.0).log2();
    let note = midi.round() as i64;
    (note.rem_euclid(12)) as usize
}

/// Pearson correlation of the chroma (rotated so `root` is position 0)
/// against a key profile
fn profile_correlation(chroma: &[f64; 12], profile: &[f64; 12], root: u8) -> f64 {
    let rotated: Vec<f64> = (0..12)
        .map(|j| chroma[(j + root as usize) % 12])
        .collect();
    pearson(&rotated, profile)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return f64::NAN;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}
