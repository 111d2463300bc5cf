//! Pairwise transition compatibility
//!
//! An ordered pair of tracks scores in [0, 100] as a weighted sum of
//! harmonic (Camelot wheel) distance, BPM proximity, energy direction, bass
//! continuity, and genre affinity. Harmonic strictness shifts weight from
//! the BPM factor onto the harmonic factor; weights always renormalize to 1.

use crate::analysis::camelot;
use crate::types::TrackRecord;
use serde::{Deserialize, Serialize};

/// Parameters steering the sequencer and the pair scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerParams {
    /// Hard BPM window half-width for strategy filters, in BPM
    pub bpm_tolerance: f64,
    /// Peak position for Peak-Time shaped sets, percent of playlist length
    pub peak_position: f64,
    /// Harmonic strictness, 1 (loose) to 10 (strict)
    pub harmonic_strictness: u8,
    /// Genre factor weight scale in [0, 1]
    pub genre_weight: f64,
    /// Give distant keys a small score instead of zero
    pub allow_experimental: bool,
}

impl Default for SequencerParams {
    fn default() -> Self {
        Self {
            bpm_tolerance: 3.0,
            peak_position: 65.0,
            harmonic_strictness: 5,
            genre_weight: 0.5,
            allow_experimental: false,
        }
    }
}

/// Intended energy movement between two adjacent tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyDirection {
    Up,
    Down,
    Maintain,
}

/// Energy deltas below this magnitude count as "equal"
const ENERGY_EPSILON: f64 = 0.01;

/// Compatibility of playing `b` after `a`, in [0, 100]
pub fn compatibility(
    a: &TrackRecord,
    b: &TrackRecord,
    params: &SequencerParams,
    direction: EnergyDirection,
) -> f64 {
    let strictness = f64::from(params.harmonic_strictness.clamp(1, 10));

    // Strictness grows the harmonic weight at the expense of the BPM weight
    let w_harmonic = 0.35 + 0.05 * strictness;
    let w_bpm = (0.30 - 0.05 * strictness).max(0.0);
    let w_energy = 0.15;
    let w_bass = 0.10;
    let w_genre = 0.10 * params.genre_weight.clamp(0.0, 1.0);

    let total = w_harmonic + w_bpm + w_energy + w_bass + w_genre;

    let score = w_harmonic * harmonic_score(&a.camelot, &b.camelot, params.allow_experimental)
        + w_bpm * bpm_score((a.bpm - b.bpm).abs(), params.bpm_tolerance)
        + w_energy * energy_direction_score(b.energy - a.energy, direction)
        + w_bass * bass_score(a.bass_intensity, b.bass_intensity)
        + w_genre * genre_score(&a.genre, &b.genre);

    (score / total).clamp(0.0, 100.0)
}

/// Harmonic sub-score from Camelot wheel positions
///
/// Same code 100; relative major/minor 95; one step on the wheel in the
/// same mode 90; two steps 70; three steps 40. Anything further is an
/// experimental blend: 20 when allowed, else 0.
pub fn harmonic_score(a: &str, b: &str, allow_experimental: bool) -> f64 {
    let experimental = if allow_experimental { 20.0 } else { 0.0 };

    let (Some((num_a, letter_a)), Some((num_b, letter_b))) =
        (camelot::parse_camelot(a), camelot::parse_camelot(b))
    else {
        return 0.0;
    };

    if num_a == num_b {
        return if letter_a == letter_b { 100.0 } else { 95.0 };
    }

    if letter_a == letter_b {
        match camelot::wheel_distance(num_a, num_b) {
            1 => 90.0,
            2 => 70.0,
            3 => 40.0,
            _ => experimental,
        }
    } else {
        experimental
    }
}

/// BPM sub-score: full marks inside half the tolerance, linear to zero at
/// twice the tolerance
pub fn bpm_score(delta: f64, tolerance: f64) -> f64 {
    let tolerance = tolerance.max(f64::EPSILON);
    if delta <= tolerance / 2.0 {
        100.0
    } else if delta >= 2.0 * tolerance {
        0.0
    } else {
        100.0 * (2.0 * tolerance - delta) / (1.5 * tolerance)
    }
}

/// Energy-direction sub-score: the sign of the energy change against the
/// intended direction at this playlist position
pub fn energy_direction_score(delta: f64, direction: EnergyDirection) -> f64 {
    match direction {
        EnergyDirection::Maintain => 100.0 - 100.0 * delta.abs().min(1.0),
        EnergyDirection::Up => {
            if delta > ENERGY_EPSILON {
                100.0
            } else if delta >= -ENERGY_EPSILON {
                50.0
            } else {
                0.0
            }
        }
        EnergyDirection::Down => {
            if delta < -ENERGY_EPSILON {
                100.0
            } else if delta <= ENERGY_EPSILON {
                50.0
            } else {
                0.0
            }
        }
    }
}

fn bass_score(a: f64, b: f64) -> f64 {
    100.0 - 100.0 * (a - b).abs().min(1.0)
}

// =============================================================================
// Genre affinity
// =============================================================================

/// Genres that blend acceptably even when not identical
const GENRE_FAMILIES: &[&[&str]] = &[
    &[
        "house",
        "deep house",
        "tech house",
        "progressive house",
        "electro house",
        "afro house",
    ],
    &[
        "techno",
        "melodic techno",
        "minimal",
        "hard techno",
        "detroit techno",
        "industrial techno",
    ],
    &[
        "trance",
        "psytrance",
        "progressive trance",
        "uplifting trance",
        "goa trance",
        "progressive",
    ],
    &[
        "drum & bass",
        "drum and bass",
        "dnb",
        "jungle",
        "breakbeat",
        "dubstep",
        "bass",
    ],
    &["hip hop", "hip-hop", "rap", "r&b", "rnb", "soul", "funk"],
    &["rock", "alternative", "indie", "punk", "metal"],
    &["pop", "synthpop", "electropop", "dance", "disco"],
];

/// Genre sub-score: equality 100, shared family 60, otherwise 0
pub fn genre_score(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        return 100.0;
    }
    match (family_of(&a), family_of(&b)) {
        (Some(fa), Some(fb)) if fa == fb => 60.0,
        _ => 0.0,
    }
}

fn family_of(genre: &str) -> Option<usize> {
    GENRE_FAMILIES
        .iter()
        .position(|family| family.contains(&genre))
}
