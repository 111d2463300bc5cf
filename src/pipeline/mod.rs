//! Parallel analysis pipeline

pub mod orchestrator;
pub mod run;

pub use orchestrator::{
    analyze_folder, analyze_folder_with, effective_worker_count, BatchResult, CancelToken,
    NullProgress, ProgressSink,
};
pub use run::{run, RunSummary};
