//! Playlist exports: M3U, Rekordbox XML, and the JSON report

pub mod json;
pub mod m3u;
pub mod rekordbox;

pub use json::write_report;
pub use m3u::{read_m3u, write_m3u, M3uEntry};
pub use rekordbox::write_rekordbox_xml;
