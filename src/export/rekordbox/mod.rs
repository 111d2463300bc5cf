//! Rekordbox XML export

pub mod schema;
pub mod uri;
pub mod xml;

pub use xml::write_rekordbox_xml;
