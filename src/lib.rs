//! setforge - harmonic DJ-set analysis and sequencing
//!
//! Analyzes a folder of audio files for tempo, key, energy, and structure,
//! then sequences them into a playlist whose adjacent tracks mix
//! harmonically and rhythmically well.
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `discovery`: file scanning and track ID generation
//! - `audio`: audio decoding using symphonia
//! - `analysis`: tempo, key, energy, structure, and mix-point extraction
//! - `cache`: cross-process analysis cache with advisory file locks
//! - `pipeline`: parallel processing orchestration
//! - `sequence`: playlist strategies, compatibility scoring, quality metrics
//! - `export`: M3U, Rekordbox XML, and JSON report output
//!
//! # Example
//!
//! ```no_run
//! use setforge::config::Settings;
//! use setforge::pipeline::{self, NullProgress};
//!
//! let settings = Settings::default();
//! let summary = pipeline::run(&settings, &NullProgress).expect("run failed");
//! println!("Sequenced {} tracks", summary.playlist_len);
//! ```

pub mod analysis;
pub mod audio;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod sequence;
pub mod types;

// Re-export key types at crate root
pub use error::{AnalysisFailure, FailureReason, Result, SetforgeError};
pub use sequence::{SequencerParams, Strategy};
pub use types::{AudioBuffer, Section, SectionLabel, TrackRecord};
