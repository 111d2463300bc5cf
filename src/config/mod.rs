//! CLI argument parsing and runtime settings

pub mod cli;
pub mod settings;

pub use cli::Cli;
pub use settings::{default_extensions, AnalyzerConfig, Settings};
