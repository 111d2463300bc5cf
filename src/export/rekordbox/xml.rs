//! Rekordbox XML writer
//!
//! Streams the collection with quick-xml so large libraries never sit in
//! memory. Every track carries the analyzed metadata plus two
//! `POSITION_MARK` memory cues ("MIX IN" / "MIX OUT") at the phrase-aligned
//! mix points, with microsecond Start precision.

use crate::analysis::camelot;
use crate::error::{Result, SetforgeError};
use crate::types::TrackRecord;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use super::schema::{self, attrs, cues, node_types};
use super::uri::path_to_rekordbox_uri;

/// Write a sequenced playlist to a Rekordbox XML file
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
/// This prevents data corruption if the write is interrupted.
pub fn write_rekordbox_xml(
    playlist: &[TrackRecord],
    output_path: &Path,
    playlist_name: &str,
) -> Result<()> {
    // Write to temp file in same directory (ensures same filesystem for atomic rename)
    let temp_path = output_path.with_extension("xml.tmp");

    let cleanup_and_error = |reason: String| -> SetforgeError {
        let _ = std::fs::remove_file(&temp_path);
        SetforgeError::OutputError {
            path: output_path.to_path_buf(),
            reason,
        }
    };

    let file = File::create(&temp_path).map_err(|e| SetforgeError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let writer = BufWriter::new(file);
    let mut xml = Writer::new_with_indent(writer, b' ', 2);

    // XML declaration
    xml.write_event(Event::Decl(BytesDecl::new(
        schema::XML_VERSION,
        Some(schema::XML_ENCODING),
        None,
    )))
    .map_err(|e| cleanup_and_error(format!("XML write error: {}", e)))?;

    // Root element: DJ_PLAYLISTS
    let mut root = BytesStart::new("DJ_PLAYLISTS");
    root.push_attribute(("Version", schema::PLAYLISTS_VERSION));
    xml.write_event(Event::Start(root))
        .map_err(|e| cleanup_and_error(format!("XML write error: {}", e)))?;

    // PRODUCT element
    let mut product = BytesStart::new("PRODUCT");
    product.push_attribute(("Name", schema::PRODUCT_NAME));
    product.push_attribute(("Version", schema::PRODUCT_VERSION));
    xml.write_event(Event::Empty(product))
        .map_err(|e| cleanup_and_error(format!("XML write error: {}", e)))?;

    // COLLECTION element
    let mut collection = BytesStart::new("COLLECTION");
    collection.push_attribute(("Entries", playlist.len().to_string().as_str()));
    xml.write_event(Event::Start(collection))
        .map_err(|e| cleanup_and_error(format!("XML write error: {}", e)))?;

    for track in playlist {
        write_track(&mut xml, track, &temp_path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            e
        })?;
    }

    xml.write_event(Event::End(BytesEnd::new("COLLECTION")))
        .map_err(|e| cleanup_and_error(format!("XML write error: {}", e)))?;

    // PLAYLISTS section referencing the tracks in set order
    write_playlists(&mut xml, playlist, playlist_name, &temp_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        e
    })?;

    xml.write_event(Event::End(BytesEnd::new("DJ_PLAYLISTS")))
        .map_err(|e| cleanup_and_error(format!("XML write error: {}", e)))?;

    // Flush and drop the writer before rename
    drop(xml);

    // Atomic rename: either succeeds completely or fails without modifying target
    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        SetforgeError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!(
        "Wrote {} tracks to {}",
        playlist.len(),
        output_path.display()
    );

    Ok(())
}

/// Write a single TRACK element with its mix-point cues
fn write_track<W: std::io::Write>(
    xml: &mut Writer<W>,
    track: &TrackRecord,
    output_path: &Path,
) -> Result<()> {
    let mut elem = BytesStart::new("TRACK");

    elem.push_attribute((attrs::TRACK_ID, track.track_id.to_string().as_str()));
    elem.push_attribute((attrs::NAME, track.title.as_str()));
    elem.push_attribute((attrs::ARTIST, track.artist.as_str()));
    elem.push_attribute((attrs::GENRE, track.genre.as_str()));

    // Location (URI encoded path)
    let location = path_to_rekordbox_uri(&track.path);
    elem.push_attribute((attrs::LOCATION, location.as_str()));

    // Duration - guard against NaN/Inf which would cause undefined behavior in cast
    let total_time = if track.duration_s.is_finite() && track.duration_s >= 0.0 {
        track.duration_s.round().min(i64::MAX as f64) as i64
    } else {
        0
    };
    elem.push_attribute((attrs::TOTAL_TIME, total_time.to_string().as_str()));

    // BPM (2 decimal places) - guard against NaN/Inf for valid XML
    let bpm = if track.bpm.is_finite() && track.bpm > 0.0 {
        format!("{:.2}", track.bpm.clamp(1.0, 999.99))
    } else {
        "120.00".to_string()
    };
    elem.push_attribute((attrs::AVERAGE_BPM, bpm.as_str()));

    // Key in musical notation (fixed 24-entry Camelot table)
    let tonality = camelot::to_musical_notation(&track.camelot)
        .map(str::to_string)
        .unwrap_or_else(|| track.camelot.clone());
    elem.push_attribute((attrs::TONALITY, tonality.as_str()));

    let date_added = track.analyzed_at.format("%Y-%m-%d").to_string();
    elem.push_attribute((attrs::DATE_ADDED, date_added.as_str()));

    xml.write_event(Event::Start(elem))
        .map_err(|e| write_error(output_path, e))?;

    write_position_mark(xml, cues::MIX_IN, track.mix_in_s, output_path)?;
    write_position_mark(xml, cues::MIX_OUT, track.mix_out_s, output_path)?;

    xml.write_event(Event::End(BytesEnd::new("TRACK")))
        .map_err(|e| write_error(output_path, e))?;

    Ok(())
}

/// Memory cue at a mix point, Start in seconds with microsecond precision
fn write_position_mark<W: std::io::Write>(
    xml: &mut Writer<W>,
    name: &str,
    start_s: f64,
    output_path: &Path,
) -> Result<()> {
    let mut mark = BytesStart::new("POSITION_MARK");
    mark.push_attribute((cues::NAME, name));
    mark.push_attribute((cues::TYPE, cues::TYPE_CUE));
    let start = if start_s.is_finite() && start_s >= 0.0 {
        start_s
    } else {
        0.0
    };
    mark.push_attribute((cues::START, format!("{:.6}", start).as_str()));
    mark.push_attribute((cues::NUM, cues::NUM_MEMORY));
    xml.write_event(Event::Empty(mark))
        .map_err(|e| write_error(output_path, e))
}

/// PLAYLISTS section with one playlist node in set order
fn write_playlists<W: std::io::Write>(
    xml: &mut Writer<W>,
    playlist: &[TrackRecord],
    playlist_name: &str,
    output_path: &Path,
) -> Result<()> {
    xml.write_event(Event::Start(BytesStart::new("PLAYLISTS")))
        .map_err(|e| write_error(output_path, e))?;

    let mut root_node = BytesStart::new("NODE");
    root_node.push_attribute(("Type", node_types::ROOT));
    root_node.push_attribute(("Name", "ROOT"));
    xml.write_event(Event::Start(root_node))
        .map_err(|e| write_error(output_path, e))?;

    let mut playlist_node = BytesStart::new("NODE");
    playlist_node.push_attribute(("Type", node_types::PLAYLIST));
    playlist_node.push_attribute(("Name", playlist_name));
    playlist_node.push_attribute(("KeyType", "0"));
    playlist_node.push_attribute(("Entries", playlist.len().to_string().as_str()));

    xml.write_event(Event::Start(playlist_node))
        .map_err(|e| write_error(output_path, e))?;

    for track in playlist {
        let mut track_ref = BytesStart::new("TRACK");
        track_ref.push_attribute(("Key", track.track_id.to_string().as_str()));
        xml.write_event(Event::Empty(track_ref))
            .map_err(|e| write_error(output_path, e))?;
    }

    xml.write_event(Event::End(BytesEnd::new("NODE")))
        .map_err(|e| write_error(output_path, e))?;
    xml.write_event(Event::End(BytesEnd::new("NODE")))
        .map_err(|e| write_error(output_path, e))?;
    xml.write_event(Event::End(BytesEnd::new("PLAYLISTS")))
        .map_err(|e| write_error(output_path, e))?;

    Ok(())
}

/// Convert quick-xml write errors during XML writing to SetforgeError
fn write_error(path: &Path, e: quick_xml::Error) -> SetforgeError {
    SetforgeError::OutputError {
        path: path.to_path_buf(),
        reason: format!("XML write error: {}", e),
    }
}
