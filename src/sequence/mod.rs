//! Playlist sequencing
//!
//! Compatibility scoring over the Camelot wheel, ten ordering strategies,
//! and quality metrics for the finished set.

pub mod compat;
pub mod quality;
pub mod sequencer;
pub mod strategy;

pub use compat::{compatibility, EnergyDirection, SequencerParams};
pub use quality::QualityReport;
pub use sequencer::{sequence, SequenceResult};
pub use strategy::Strategy;
