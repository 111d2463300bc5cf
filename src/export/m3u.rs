//! Extended M3U playlist export
//!
//! The classic `#EXTM3U` layout with one extension: a `#MIXPOINT` line per
//! track carrying the phrase-aligned mix-in/mix-out offsets, so DJ tools
//! that ignore unknown directives still read the playlist while ours can
//! round-trip the blend windows.
//!
//! ```text
//! #EXTM3U
//! #EXTENC:UTF-8
//! #PLAYLIST:<name>
//!
//! #EXTINF:<duration>,<artist> - <title>
//! #MIXPOINT:<mix_in_s>,<mix_out_s>
//! <absolute path>
//! ```
//!
//! UTF-8, LF line endings, blank line between entries, atomic write.

use crate::error::{Result, SetforgeError};
use crate::types::TrackRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// One parsed playlist entry
#[derive(Debug, Clone, PartialEq)]
pub struct M3uEntry {
    pub path: PathBuf,
    pub duration_s: i64,
    pub artist: String,
    pub title: String,
    pub mix_in_s: f64,
    pub mix_out_s: f64,
}

/// Write a playlist in the extended M3U form
///
/// Writes to a temp file first and renames into place so an interrupted
/// export never leaves a truncated playlist.
pub fn write_m3u(playlist: &[TrackRecord], output_path: &Path, name: &str) -> Result<()> {
    let temp_path = output_path.with_extension("m3u8.tmp");

    let render = |file: File| -> std::io::Result<()> {
        let mut w = BufWriter::new(file);
        write!(w, "#EXTM3U\n#EXTENC:UTF-8\n#PLAYLIST:{}\n", name)?;

        for track in playlist {
            let duration = if track.duration_s.is_finite() && track.duration_s >= 0.0 {
                track.duration_s.round() as i64
            } else {
                0
            };
            write!(
                w,
                "\n#EXTINF:{},{} - {}\n#MIXPOINT:{:.3},{:.3}\n{}\n",
                duration,
                track.artist,
                track.title,
                track.mix_in_s,
                track.mix_out_s,
                track.path.display()
            )?;
        }
        w.flush()
    };

    let file = File::create(&temp_path).map_err(|e| SetforgeError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    if let Err(e) = render(file) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(SetforgeError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        });
    }

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        SetforgeError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!("Wrote {} tracks to {}", playlist.len(), output_path.display());
    Ok(())
}

/// Parse a playlist previously written by [`write_m3u`]
pub fn read_m3u(path: &Path) -> Result<Vec<M3uEntry>> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    let mut pending_info: Option<(i64, String, String)> = None;
    let mut pending_mix: Option<(f64, f64)> = None;

    for line in contents.lines() {
        let line = line.trim_end();
        if line.is_empty() || line == "#EXTM3U" {
            continue;
        }
        if line.starts_with("#EXTENC:") || line.starts_with("#PLAYLIST:") {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            pending_info = parse_extinf(rest);
        } else if let Some(rest) = line.strip_prefix("#MIXPOINT:") {
            pending_mix = parse_mixpoint(rest);
        } else if !line.starts_with('#') {
            // A path line closes the entry
            if let Some((duration_s, artist, title)) = pending_info.take() {
                let (mix_in_s, mix_out_s) = pending_mix.take().unwrap_or((0.0, 0.0));
                entries.push(M3uEntry {
                    path: PathBuf::from(line),
                    duration_s,
                    artist,
                    title,
                    mix_in_s,
                    mix_out_s,
                });
            }
            pending_mix = None;
        }
    }

    Ok(entries)
}

fn parse_extinf(rest: &str) -> Option<(i64, String, String)> {
    let (duration, display) = rest.split_once(',')?;
    let duration: i64 = duration.trim().parse().ok()?;
    let (artist, title) = match display.split_once(" - ") {
        Some((a, t)) => (a.to_string(), t.to_string()),
        None => (String::new(), display.to_string()),
    };
    Some((duration, artist, title))
}

fn parse_mixpoint(rest: &str) -> Option<(f64, f64)> {
    let (mix_in, mix_out) = rest.split_once(',')?;
    Some((mix_in.trim().parse().ok()?, mix_out.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::compat::tests::track;

    fn playlist() -> Vec<TrackRecord> {
        let mut a = track("/music/Artist One - Opener.wav", "8A", 126.0, 0.4);
        a.artist = "Artist One".into();
        a.title = "Opener".into();
        a.duration_s = 331.6;
        a.mix_in_s = 30.0;
        a.mix_out_s = 300.0;

        let mut b = track("/music/Artist Two - Peak.wav", "9A", 128.0, 0.8);
        b.artist = "Artist Two".into();
        b.title = "Peak".into();
        b.duration_s = 412.2;
        b.mix_in_s = 60.469;
        b.mix_out_s = 362.813;

        vec![a, b]
    }

    #[test]
    fn test_header_and_layout() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("set.m3u8");
        write_m3u(&playlist(), &out, "Friday Set").unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("#EXTM3U\n#EXTENC:UTF-8\n#PLAYLIST:Friday Set\n"));
        assert!(text.contains("#EXTINF:332,Artist One - Opener\n"));
        assert!(text.contains("#MIXPOINT:30.000,300.000\n"));
        assert!(text.contains("/music/Artist One - Opener.wav\n"));
        // LF only
        assert!(!text.contains('\r'));
        // Blank line between entries
        assert!(text.contains(".wav\n\n#EXTINF"));
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("set.m3u8");
        let tracks = playlist();
        write_m3u(&tracks, &out, "RT").unwrap();

        let entries = read_m3u(&out).unwrap();
        assert_eq!(entries.len(), tracks.len());
        for (entry, track) in entries.iter().zip(tracks.iter()) {
            assert_eq!(entry.path, track.path);
            assert_eq!(entry.duration_s, track.duration_s.round() as i64);
            assert_eq!(entry.artist, track.artist);
            assert_eq!(entry.title, track.title);
            assert!((entry.mix_in_s - track.mix_in_s).abs() < 1e-3);
            assert!((entry.mix_out_s - track.mix_out_s).abs() < 1e-3);
        }
    }

    #[test]
    fn test_empty_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.m3u8");
        write_m3u(&[], &out, "Empty").unwrap();
        assert!(read_m3u(&out).unwrap().is_empty());
    }

    #[test]
    fn test_parse_tolerates_title_without_artist() {
        assert_eq!(
            parse_extinf("42,Just A Title"),
            Some((42, String::new(), "Just A Title".to_string()))
        );
    }
}
