//! Metadata extraction from audio file tags
//!
//! Uses lofty to read ID3v2 (MP3), Vorbis comments (FLAC), and AIFF tags,
//! falling back to filename parsing when artist or title are missing. The
//! filename patterns are tried in a fixed order; the first match whose
//! artist and title are both non-empty and free of path separators wins.

use lofty::{Accessor, Probe, TaggedFileExt};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Placeholder for fields no source could provide
pub const UNKNOWN: &str = "Unknown";

/// Raw tag values read from the file
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub genre: Option<String>,
}

/// Resolved (artist, title, genre), never empty: tags first, then filename
/// patterns, then "Unknown"
pub fn resolve_metadata(path: &Path) -> (String, String, String) {
    let tags = extract_tags(path);

    let mut artist = tags.artist.filter(|s| !is_blank(s));
    let mut title = tags.title.filter(|s| !is_blank(s));
    let genre = tags
        .genre
        .filter(|s| !is_blank(s))
        .unwrap_or_else(|| UNKNOWN.to_string());

    if artist.is_none() || title.is_none() {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if let Some((parsed_artist, parsed_title)) = parse_filename(stem) {
            artist.get_or_insert(parsed_artist);
            title.get_or_insert(parsed_title);
        }
    }

    (
        artist.unwrap_or_else(|| UNKNOWN.to_string()),
        title.unwrap_or_else(|| UNKNOWN.to_string()),
        genre,
    )
}

/// Read whatever tags the file carries
///
/// On error (corrupt tags, missing file), returns empty tags.
pub fn extract_tags(path: &Path) -> TrackTags {
    match extract_tags_inner(path) {
        Ok(tags) => tags,
        Err(e) => {
            warn!("Failed to read tags from {}: {}", path.display(), e);
            TrackTags::default()
        }
    }
}

fn extract_tags_inner(path: &Path) -> Result<TrackTags, lofty::error::LoftyError> {
    let tagged_file = Probe::open(path)?.read()?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let tags = match tag {
        Some(tag) => TrackTags {
            artist: tag.artist().map(|s| s.to_string()),
            title: tag.title().map(|s| s.to_string()),
            genre: tag.genre().map(|s| s.to_string()),
        },
        None => {
            debug!("No tags found in {}", path.display());
            TrackTags::default()
        }
    };

    Ok(tags)
}

/// Parse "<artist>", "<title>" out of a filename stem
///
/// Patterns, in order:
/// 1. `Artist - Title` (a 1-3 digit artist is a track number, not an artist)
/// 2. `01 - Artist - Title`
/// 3. `Artist-Title`
/// 4. `Artist_Title`
pub fn parse_filename(stem: &str) -> Option<(String, String)> {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            Regex::new(r"^(.+?) - (.+)$").unwrap(),
            Regex::new(r"^\d{1,3} - (.+?) - (.+)$").unwrap(),
            Regex::new(r"^(.+?)-(.+)$").unwrap(),
            Regex::new(r"^(.+?)_(.+)$").unwrap(),
        ]
    });

    for (idx, pattern) in patterns.iter().enumerate() {
        let Some(caps) = pattern.captures(stem) else {
            continue;
        };
        let artist = caps.get(caps.len() - 2).map(|m| m.as_str().trim())?;
        let title = caps.get(caps.len() - 1).map(|m| m.as_str().trim())?;

        // The leading group of the plain "Artist - Title" form must not be a
        // bare track number; that is what the numbered pattern is for
        if idx == 0 && artist.len() <= 3 && artist.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        if artist.is_empty() || title.is_empty() {
            continue;
        }
        if has_path_separator(artist) || has_path_separator(title) {
            continue;
        }

        return Some((artist.to_string(), title.to_string()));
    }

    None
}

fn has_path_separator(s: &str) -> bool {
    s.contains('/') || s.contains('\\')
}

fn is_blank(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || t == UNKNOWN
}
