//! URI encoding for the Rekordbox Location attribute
//!
//! Rekordbox requires paths in a specific URI format:
//! - Protocol: file://localhost/
//! - Windows: C:\Music\Track.mp3 -> file://localhost/C:/Music/Track.mp3
//! - macOS/Linux: /Users/DJ/Music/Track.mp3 -> file://localhost/Users/DJ/Music/Track.mp3

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::Path;

/// Characters that must be percent-encoded in path segments
/// Based on RFC 3986, but more conservative for Rekordbox compatibility
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Convert a filesystem path to Rekordbox URI format
pub fn path_to_rekordbox_uri(path: &Path) -> String {
    // Get canonical path if possible, otherwise use as-is
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = path.to_string_lossy();

    // Normalize separators (Windows backslashes to forward slashes)
    let normalized = path_str.replace('\\', "/");

    // Handle Windows drive letters: C:/... -> /C:/...
    let normalized = if is_windows_path(&normalized) {
        format!("/{}", normalized)
    } else {
        normalized.to_string()
    };

    // Encode each path segment separately (preserve slashes)
    let encoded = normalized
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/");

    format!("file://localhost{}", encoded)
}

/// Check if a path string looks like a Windows path (has drive letter)
fn is_windows_path(path: &str) -> bool {
    let chars: Vec<char> = path.chars().take(3).collect();
    chars.len() >= 2 && chars[0].is_ascii_alphabetic() && chars[1] == ':'
}
