//! Cross-process track-record cache

pub mod store;

pub use store::{file_fingerprint, Fingerprint, TrackCache, CACHE_SCHEMA_VERSION};
