//! Camelot Wheel notation mapping
//!
//! The Camelot Wheel is a visual representation of musical keys that
//! makes harmonic mixing intuitive for DJs.
//!
//! - Numbers 1-12 represent positions on the wheel
//! - 'A' suffix = minor key, 'B' suffix = major key
//! - Adjacent numbers are harmonically compatible (perfect fifth)
//! - Same number, different letter = relative major/minor

use crate::types::{Mode, PitchClass};

/// Mapping from (PitchClass, Mode) to Camelot notation
pub fn to_camelot(pitch: PitchClass, mode: Mode) -> &'static str {
    match (pitch, mode) {
        // Minor keys (A)
        (PitchClass::A, Mode::Minor) => "8A",   // Am
        (PitchClass::As, Mode::Minor) => "3A",  // A#m / Bbm
        (PitchClass::B, Mode::Minor) => "10A",  // Bm
        (PitchClass::C, Mode::Minor) => "5A",   // Cm
        (PitchClass::Cs, Mode::Minor) => "12A", // C#m / Dbm
        (PitchClass::D, Mode::Minor) => "7A",   // Dm
        (PitchClass::Ds, Mode::Minor) => "2A",  // D#m / Ebm
        (PitchClass::E, Mode::Minor) => "9A",   // Em
        (PitchClass::F, Mode::Minor) => "4A",   // Fm
        (PitchClass::Fs, Mode::Minor) => "11A", // F#m / Gbm
        (PitchClass::G, Mode::Minor) => "6A",   // Gm
        (PitchClass::Gs, Mode::Minor) => "1A",  // G#m / Abm

        // Major keys (B)
        (PitchClass::A, Mode::Major) => "11B",  // A
        (PitchClass::As, Mode::Major) => "6B",  // A# / Bb
        (PitchClass::B, Mode::Major) => "1B",   // B
        (PitchClass::C, Mode::Major) => "8B",   // C
        (PitchClass::Cs, Mode::Major) => "3B",  // C# / Db
        (PitchClass::D, Mode::Major) => "10B",  // D
        (PitchClass::Ds, Mode::Major) => "5B",  // D# / Eb
        (PitchClass::E, Mode::Major) => "12B",  // E
        (PitchClass::F, Mode::Major) => "7B",   // F
        (PitchClass::Fs, Mode::Major) => "2B",  // F# / Gb
        (PitchClass::G, Mode::Major) => "9B",   // G
        (PitchClass::Gs, Mode::Major) => "4B",  // G# / Ab
    }
}

/// Reverse mapping: Camelot code to (PitchClass, Mode)
///
/// Inverse of [`to_camelot`]; returns None for malformed codes.
pub fn from_camelot(code: &str) -> Option<(PitchClass, Mode)> {
    let (num, letter) = parse_camelot(code)?;
    let mode = match letter {
        'A' => Mode::Minor,
        'B' => Mode::Major,
        _ => return None,
    };
    // Walk the wheel rather than duplicating the table
    for idx in 0..12u8 {
        let pitch = PitchClass::from_index(idx)?;
        let candidate = to_camelot(pitch, mode);
        if parse_camelot(candidate) == Some((num, letter)) {
            return Some((pitch, mode));
        }
    }
    None
}

/// Parse a Camelot code into (number, letter)
///
/// Valid codes are "1A".."12A" and "1B".."12B".
pub fn parse_camelot(code: &str) -> Option<(u8, char)> {
    if code.len() < 2 || code.len() > 3 {
        return None;
    }
    let letter = code.chars().last()?;
    if letter != 'A' && letter != 'B' {
        return None;
    }
    let num: u8 = code[..code.len() - 1].parse().ok()?;
    if (1..=12).contains(&num) {
        Some((num, letter))
    } else {
        None
    }
}

/// Circular distance between two wheel positions (0..=6)
pub fn wheel_distance(a: u8, b: u8) -> u8 {
    let d = (a as i16 - b as i16).rem_euclid(12) as u8;
    d.min(12 - d)
}

/// Musical-notation name for a Camelot code (e.g. "8A" -> "Am", "9B" -> "G")
///
/// This is the Tonality string DJ software expects in XML exports. The
/// spellings follow DJ-software convention: flat names for the flat keys
/// (2A is Ebm, never D#m), sharp names only where software uses them.
pub fn to_musical_notation(code: &str) -> Option<&'static str> {
    let name = match code {
        // Minor keys (A)
        "1A" => "Abm",
        "2A" => "Ebm",
        "3A" => "Bbm",
        "4A" => "Fm",
        "5A" => "Cm",
        "6A" => "Gm",
        "7A" => "Dm",
        "8A" => "Am",
        "9A" => "Em",
        "10A" => "Bm",
        "11A" => "Gbm",
        "12A" => "Dbm",

        // Major keys (B)
        "1B" => "B",
        "2B" => "Gb",
        "3B" => "Db",
        "4B" => "Ab",
        "5B" => "Eb",
        "6B" => "Bb",
        "7B" => "F",
        "8B" => "C",
        "9B" => "G",
        "10B" => "D",
        "11B" => "A",
        "12B" => "E",

        _ => return None,
    };
    Some(name)
}
