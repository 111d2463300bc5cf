//! File discovery and scanning
//!
//! Walks the root recursively, following symlinks. Cycles are broken by
//! remembering the (device, inode) identity of every visited directory on
//! Unix and the canonical path elsewhere. Files whose extension is in the
//! configured set are returned in a deterministic sorted order so batch
//! results and playlist seeds are reproducible.

use crate::error::{Result, SetforgeError};
use hash32::FnvHasher;
use std::collections::HashSet;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Discovered audio file with basic metadata
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Scan a path (file or directory) for audio files with a supported extension
pub fn scan(input: &Path, extensions: &HashSet<String>) -> Result<Vec<DiscoveredFile>> {
    if !input.exists() {
        return Err(SetforgeError::FileNotFound(input.to_path_buf()));
    }

    let mut files = Vec::new();

    if input.is_file() {
        // Single file mode
        if let Some(file) = try_discover_file(input, extensions) {
            files.push(file);
        } else {
            return Err(SetforgeError::UnsupportedFormat {
                path: input.to_path_buf(),
                format: input
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }
    } else if input.is_dir() {
        let mut visited_dirs = HashSet::new();

        for entry in WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                // Directory cycle detection for followed symlinks
                if e.file_type().is_dir() {
                    match dir_identity(e.path()) {
                        Some(id) => visited_dirs.insert(id),
                        None => true,
                    }
                } else {
                    true
                }
            })
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() {
                if let Some(file) = try_discover_file(path, extensions) {
                    debug!("Discovered: {}", file.path.display());
                    files.push(file);
                }
            }
        }
    }

    // Deterministic enumeration order
    files.sort_by(|a, b| a.path.cmp(&b.path));

    info!("Discovered {} audio files", files.len());

    if files.is_empty() {
        warn!("No supported audio files found in {}", input.display());
    }

    Ok(files)
}

/// Stable identity of a directory for cycle detection
#[cfg(unix)]
fn dir_identity(path: &Path) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn dir_identity(path: &Path) -> Option<(u64, u64)> {
    // Canonical-path hash stands in for dev/inode identity
    let canonical = std::fs::canonicalize(path).ok()?;
    let mut hasher = FnvHasher::default();
    hasher.write(canonical.to_string_lossy().as_bytes());
    use hash32::Hasher as Hash32Hasher;
    Some((hasher.finish32() as u64, 0))
}

/// Try to create a DiscoveredFile if the path has a supported extension
fn try_discover_file(path: &Path, extensions: &HashSet<String>) -> Option<DiscoveredFile> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if !extensions.contains(&ext) {
        return None;
    }

    let metadata = std::fs::metadata(path).ok()?;

    Some(DiscoveredFile {
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
    })
}

/// Generate a deterministic track ID from a file path
///
/// Uses FNV-1a hash, masked to positive i32 range for XML TrackID fields
pub fn generate_track_id(path: &Path) -> i32 {
    use hash32::Hasher as Hash32Hasher;

    // Normalize path for cross-platform consistency
    let normalized = normalize_path_for_hash(path);

    let mut hasher = FnvHasher::default();
    hasher.write(normalized.as_bytes());
    let hash = hasher.finish32();

    // Mask off sign bit to ensure positive value
    (hash & 0x7FFFFFFF) as i32
}

/// Normalize a path string for consistent hashing across platforms
fn normalize_path_for_hash(path: &Path) -> String {
    let path_str = path.to_string_lossy();

    // Convert backslashes to forward slashes
    let normalized = path_str.replace('\\', "/");

    // Lowercase for case-insensitive filesystems
    normalized.to_lowercase()
}
