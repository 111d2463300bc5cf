//! Parallel analysis orchestration
//!
//! One dispatcher coordinates a pool of worker threads over crossbeam
//! channels. Each worker owns a private job channel so the dispatcher knows
//! exactly which file a worker is on and since when; results come back over
//! a shared channel. Only the dispatcher ever waits - on results, on
//! per-job deadlines, and on progress delivery - while workers run one
//! synchronous cache-get / analyze / cache-put kernel per job.
//!
//! Rust threads cannot be killed, so a job that blows its deadline is
//! recorded as a timeout, its worker is written off (any late result it
//! produces is discarded), and a replacement worker is spawned to keep the
//! pool at full width. Worker panics are caught and recorded; the batch
//! never aborts because of a single file.

use crate::analysis::{DefaultAnalyzer, TrackAnalyzer};
use crate::cache::TrackCache;
use crate::config::AnalyzerConfig;
use crate::discovery;
use crate::error::{AnalysisFailure, Result, SetforgeError};
use crate::types::TrackRecord;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

// =============================================================================
// Public surface
// =============================================================================

/// Receives batch progress updates, always from the dispatcher thread
pub trait ProgressSink: Send + Sync {
    fn update(&self, done: usize, total: usize, current_file: &Path, status: &str);
}

/// Sink that discards all updates
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _done: usize, _total: usize, _current_file: &Path, _status: &str) {}
}

/// Cooperative cancellation handle for a running batch
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a folder analysis
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Records in file-enumeration order
    pub records: Vec<TrackRecord>,
    pub failures: Vec<AnalysisFailure>,
    /// How many records were served from the cache
    pub from_cache: usize,
}

/// Analyze every supported file under `root` with the production analyzer
pub fn analyze_folder(
    root: &Path,
    cfg: &AnalyzerConfig,
    progress: &dyn ProgressSink,
) -> Result<BatchResult> {
    let analyzer: Arc<dyn TrackAnalyzer> = Arc::new(DefaultAnalyzer::new(cfg.sample_rate));
    let cache = match &cfg.cache_dir {
        Some(dir) => Some(TrackCache::open(dir)?),
        None => None,
    };
    analyze_folder_with(root, cfg, analyzer, cache, progress, None)
}

/// Worker-count policy: the better of "up to 6 cores" and "half the cores",
/// capped at the core count, then scaled down for small batches
///
/// An explicit request bypasses the file-count scaling entirely; it is only
/// bounded by the core count.
pub fn effective_worker_count(requested: Option<usize>, file_count: usize) -> usize {
    let cpus = num_cpus::get().max(1);

    if let Some(n) = requested {
        return n.clamp(1, cpus);
    }

    let computed = (6.min(cpus)).max(cpus / 2).min(cpus);

    let scaled = if file_count < 5 {
        1
    } else if file_count < 20 {
        2
    } else if file_count < 50 {
        4
    } else {
        computed
    };
    scaled.min(computed).max(1)
}

// =============================================================================
// Dispatcher
// =============================================================================

struct Job {
    index: usize,
    path: PathBuf,
}

struct JobOutcome {
    worker_id: usize,
    index: usize,
    path: PathBuf,
    result: std::result::Result<TrackRecord, SetforgeError>,
    from_cache: bool,
}

/// A worker the dispatcher can hand jobs to
struct WorkerHandle {
    jobs: Sender<Job>,
}

/// A job currently running on some worker
struct InFlight {
    path: PathBuf,
    deadline: Instant,
}

/// Analyze with an injected analyzer and cache (the seam the tests use)
pub fn analyze_folder_with(
    root: &Path,
    cfg: &AnalyzerConfig,
    analyzer: Arc<dyn TrackAnalyzer>,
    cache: Option<TrackCache>,
    progress: &dyn ProgressSink,
    cancel: Option<CancelToken>,
) -> Result<BatchResult> {
    let scan_start = Instant::now();
    let files = discovery::scan(root, &cfg.supported_extensions)?;
    let total = files.len();

    if total == 0 {
        return Ok(BatchResult::default());
    }
    info!(
        "Found {} audio files in {:.2}s",
        total,
        scan_start.elapsed().as_secs_f64()
    );

    let worker_count = effective_worker_count(cfg.max_workers, total);
    debug!("Analyzing {} files with {} workers", total, worker_count);

    let (results_tx, results_rx) = unbounded::<JobOutcome>();

    let mut next_worker_id = 0usize;
    let spawn_worker = |id: usize| -> WorkerHandle {
        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let analyzer = Arc::clone(&analyzer);
        let cache = cache.clone();
        let results = results_tx.clone();
        thread::Builder::new()
            .name(format!("setforge-worker-{}", id))
            .spawn(move || worker_loop(id, jobs_rx, results, analyzer, cache))
            .expect("failed to spawn worker thread");
        WorkerHandle { jobs: jobs_tx }
    };

    let mut workers: HashMap<usize, WorkerHandle> = HashMap::new();
    let mut idle: Vec<usize> = Vec::new();
    for _ in 0..worker_count {
        let id = next_worker_id;
        next_worker_id += 1;
        workers.insert(id, spawn_worker(id));
        idle.push(id);
    }

    let mut pending: std::collections::VecDeque<Job> = files
        .iter()
        .enumerate()
        .map(|(index, f)| Job {
            index,
            path: f.path.clone(),
        })
        .collect();

    let mut in_flight: HashMap<usize, InFlight> = HashMap::new();
    let mut written_off: std::collections::HashSet<usize> = std::collections::HashSet::new();
    let mut records: Vec<Option<TrackRecord>> = (0..total).map(|_| None).collect();
    let mut failures: Vec<AnalysisFailure> = Vec::new();
    let mut from_cache = 0usize;
    let mut done = 0usize;
    let mut cancelled_at: Option<Instant> = None;

    loop {
        // Latch cancellation: stop handing out jobs, keep draining in-flight
        if cancelled_at.is_none() && cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            warn!("batch cancelled; waiting for in-flight jobs");
            pending.clear();
            cancelled_at = Some(Instant::now());
        }

        // Hand out work
        while !pending.is_empty() {
            let Some(worker_id) = idle.pop() else {
                break;
            };
            let job = pending.pop_front().unwrap();
            in_flight.insert(
                worker_id,
                InFlight {
                    path: job.path.clone(),
                    deadline: Instant::now() + cfg.per_file_timeout,
                },
            );
            if workers[&worker_id].jobs.send(job).is_err() {
                // Worker channel already closed; nothing will come back
                in_flight.remove(&worker_id);
            }
        }

        if in_flight.is_empty() && pending.is_empty() {
            break;
        }

        // Expire deadlines
        let now = Instant::now();
        let expired: Vec<usize> = in_flight
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for worker_id in expired {
            let flight = in_flight.remove(&worker_id).unwrap();
            warn!(
                "job timed out after {:?}: {}",
                cfg.per_file_timeout,
                flight.path.display()
            );
            failures.push(AnalysisFailure::from_error(
                flight.path.clone(),
                &SetforgeError::Timeout {
                    path: flight.path.clone(),
                    timeout_s: cfg.per_file_timeout.as_secs(),
                },
            ));
            done += 1;
            progress.update(done, total, &flight.path, "timeout");

            // Write the stuck worker off and keep the pool at width
            workers.remove(&worker_id);
            written_off.insert(worker_id);
            if cancelled_at.is_none() {
                let id = next_worker_id;
                next_worker_id += 1;
                workers.insert(id, spawn_worker(id));
                idle.push(id);
            }
        }

        // On cancellation, give in-flight jobs at most one timeout period
        if let Some(at) = cancelled_at {
            if now >= at + cfg.per_file_timeout && !in_flight.is_empty() {
                for (worker_id, flight) in in_flight.drain() {
                    failures.push(AnalysisFailure::from_error(
                        flight.path.clone(),
                        &SetforgeError::Timeout {
                            path: flight.path,
                            timeout_s: cfg.per_file_timeout.as_secs(),
                        },
                    ));
                    written_off.insert(worker_id);
                }
                break;
            }
        }

        // Wait for the next result or the earliest deadline
        let wait = in_flight
            .values()
            .map(|f| f.deadline.saturating_duration_since(now))
            .min()
            .unwrap_or(Duration::from_millis(50))
            .min(Duration::from_millis(250));

        match results_rx.recv_timeout(wait) {
            Ok(outcome) if written_off.contains(&outcome.worker_id) => {
                // Late result from a worker we already gave up on
                debug!("discarding late result for {}", outcome.path.display());
            }
            Ok(outcome) => {
                in_flight.remove(&outcome.worker_id);
                idle.push(outcome.worker_id);
                done += 1;

                match outcome.result {
                    Ok(record) => {
                        let status = if outcome.from_cache {
                            from_cache += 1;
                            "cached"
                        } else {
                            "analyzed"
                        };
                        records[outcome.index] = Some(record);
                        progress.update(done, total, &outcome.path, status);
                    }
                    Err(e) => {
                        if e.is_recoverable() {
                            warn!("Skipping {}: {}", outcome.path.display(), e);
                        } else {
                            error!("Failed {}: {}", outcome.path.display(), e);
                        }
                        failures.push(AnalysisFailure::from_error(outcome.path.clone(), &e));
                        progress.update(done, total, &outcome.path, "failed");
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Dropping the handles closes every job channel; idle workers exit,
    // written-off workers die with the channel whenever they wake up
    drop(workers);

    let completed = records.into_iter().flatten().collect::<Vec<_>>();
    info!(
        "Batch complete: {} records ({} cached), {} failures",
        completed.len(),
        from_cache,
        failures.len()
    );

    Ok(BatchResult {
        records: completed,
        failures,
        from_cache,
    })
}

// =============================================================================
// Worker
// =============================================================================

fn worker_loop(
    id: usize,
    jobs: Receiver<Job>,
    results: Sender<JobOutcome>,
    analyzer: Arc<dyn TrackAnalyzer>,
    cache: Option<TrackCache>,
) {
    for job in jobs.iter() {
        let path = job.path.clone();
        let outcome = catch_unwind(AssertUnwindSafe(|| run_job(&path, &analyzer, &cache)));

        let (result, from_cache) = match outcome {
            Ok(pair) => pair,
            Err(panic_info) => {
                let reason = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                (
                    Err(SetforgeError::WorkerCrash {
                        path: path.clone(),
                        reason,
                    }),
                    false,
                )
            }
        };

        let send = results.send(JobOutcome {
            worker_id: id,
            index: job.index,
            path,
            result,
            from_cache,
        });
        if send.is_err() {
            // Dispatcher is gone, shut down
            break;
        }
    }
}

/// One job: cache get, analyze on miss, cache put
///
/// The cache lock is never held across the extraction; the critical
/// sections are the single get and the single put.
fn run_job(
    path: &Path,
    analyzer: &Arc<dyn TrackAnalyzer>,
    cache: &Option<TrackCache>,
) -> (std::result::Result<TrackRecord, SetforgeError>, bool) {
    if let Some(cache) = cache {
        if let Some(record) = cache.get(path) {
            debug!("cache hit: {}", path.display());
            return (Ok(record), true);
        }
    }

    match analyzer.analyze(path) {
        Ok(record) => {
            if let Some(cache) = cache {
                cache.put(path, &record);
            }
            (Ok(record), false)
        }
        Err(e) => (Err(e), false),
    }
}
