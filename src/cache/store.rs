//! Persistent track-record cache with cross-process locking
//!
//! The store is a single bincode file keyed by path, guarded by a separate
//! lock file. Advisory whole-file locks (shared for reads, exclusive for
//! writes) make concurrent access from multiple processes safe; every lock
//! acquisition has a bounded wait, and on timeout a read behaves as a miss
//! while a write is discarded, so analysis never blocks on the cache.
//!
//! A cached entry is valid only when the file's current (size, mtime)
//! matches the fingerprint stored with it and the store's schema version
//! matches this binary. Writes go to a temp file in the same directory and
//! are renamed into place, so a killed process can at worst leave a stale
//! temp file, never a torn store. Any unreadable store is treated as empty.

use crate::error::Result;
use crate::types::TrackRecord;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Schema version baked into the binary; any other version invalidates the
/// whole store. The lineage mixed v3 and v4 stores; this crate standardizes
/// on 4 and refuses older files.
pub const CACHE_SCHEMA_VERSION: u32 = 4;

/// Store file name (version-stamped so a downgrade never reads a new store)
const STORE_FILE: &str = "setforge_cache_v4.bin";

/// Companion lock file
const LOCK_FILE: &str = "setforge_cache.lock";

/// Bounded wait for either lock flavor
const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Retry interval while waiting for a lock
const LOCK_RETRY: Duration = Duration::from_millis(10);

/// (size_bytes, mtime_ns) pair identifying a file's on-disk state
pub type Fingerprint = (u64, u128);

/// Stat a file into its cache fingerprint
pub fn file_fingerprint(path: &Path) -> io::Result<Fingerprint> {
    let meta = std::fs::metadata(path)?;
    let mtime_ns = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    Ok((meta.len(), mtime_ns))
}

/// One cached record plus the fingerprint it was computed under
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    size_bytes: u64,
    mtime_ns: u128,
    record: TrackRecord,
}

/// On-disk store layout
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    schema_version: u32,
    entries: HashMap<String, CacheEntry>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// Handle to an on-disk track cache
///
/// Cheap to clone; every operation opens, locks, and releases on its own,
/// so handles can be shared freely across worker threads and processes.
#[derive(Debug, Clone)]
pub struct TrackCache {
    store_path: PathBuf,
    lock_path: PathBuf,
}

impl TrackCache {
    /// Open (or create) a cache in the given directory
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            store_path: dir.join(STORE_FILE),
            lock_path: dir.join(LOCK_FILE),
        })
    }

    /// Look up a record by path
    ///
    /// Returns None on: missing entry, fingerprint mismatch, schema
    /// mismatch, lock timeout, or unreadable store. After the lock is held
    /// the file is stat'ed and compared twice so a concurrent modification
    /// between stat and lookup cannot return a stale record.
    pub fn get(&self, path: &Path) -> Option<TrackRecord> {
        let _lock = match self.acquire(LockKind::Shared) {
            Some(lock) => lock,
            None => {
                warn!("cache read lock timed out, treating as miss");
                return None;
            }
        };

        let first = file_fingerprint(path).ok()?;
        let store = self.read_store()?;
        let entry = store.entries.get(&key_for(path))?;

        if (entry.size_bytes, entry.mtime_ns) != first {
            debug!("cache stale for {}", path.display());
            return None;
        }

        // Double-check: re-stat under the lock; only a stable fingerprint
        // may be served
        let second = file_fingerprint(path).ok()?;
        if second != first {
            debug!("cache fingerprint raced for {}", path.display());
            return None;
        }

        Some(entry.record.clone())
    }

    /// Insert or replace the record stored for a path
    ///
    /// The file is re-stat'ed under the lock; if it vanished the write is
    /// silently discarded, as it is on lock timeout.
    pub fn put(&self, path: &Path, record: &TrackRecord) {
        let _lock = match self.acquire(LockKind::Exclusive) {
            Some(lock) => lock,
            None => {
                warn!("cache write lock timed out, discarding put");
                return;
            }
        };

        let fingerprint = match file_fingerprint(path) {
            Ok(fp) => fp,
            Err(_) => {
                debug!("file vanished before cache put: {}", path.display());
                return;
            }
        };

        let mut store = self.read_store().unwrap_or_default();
        store.entries.insert(
            key_for(path),
            CacheEntry {
                size_bytes: fingerprint.0,
                mtime_ns: fingerprint.1,
                record: record.clone(),
            },
        );

        if let Err(e) = self.write_store(&store) {
            warn!("cache write failed: {}", e);
        }
    }

    /// Drop every entry
    pub fn clear(&self) -> Result<()> {
        let _lock = self.acquire(LockKind::Exclusive);
        match std::fs::remove_file(&self.store_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Migrate a store between schema versions
    ///
    /// Only 3 -> 4 is recognized; v3 payloads predate this record layout, so
    /// migration clears the store rather than converting entries.
    pub fn migrate_schema(&self, old: u32, new: u32) -> Result<()> {
        if old == 3 && new == CACHE_SCHEMA_VERSION {
            info!("migrating cache schema {} -> {}: clearing store", old, new);
            return self.clear();
        }
        Err(crate::error::SetforgeError::ConfigError(format!(
            "no migration path from cache schema {} to {}",
            old, new
        )))
    }

    /// Number of entries currently stored (test and diagnostics helper)
    pub fn len(&self) -> usize {
        let _lock = self.acquire(LockKind::Shared);
        self.read_store().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn acquire(&self, kind: LockKind) -> Option<LockGuard> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .ok()?;

        let deadline = Instant::now() + LOCK_TIMEOUT;
        loop {
            let acquired = match kind {
                LockKind::Shared => file.try_lock_shared().is_ok(),
                LockKind::Exclusive => file.try_lock_exclusive().is_ok(),
            };
            if acquired {
                return Some(LockGuard { file });
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(LOCK_RETRY);
        }
    }

    /// Read and validate the store; None on absence, corruption, or a
    /// schema mismatch (all of which behave as an empty store)
    fn read_store(&self) -> Option<CacheFile> {
        let bytes = std::fs::read(&self.store_path).ok()?;
        let store: CacheFile = match bincode::deserialize(&bytes) {
            Ok(s) => s,
            Err(e) => {
                warn!("corrupt cache store, ignoring: {}", e);
                return None;
            }
        };
        if store.schema_version != CACHE_SCHEMA_VERSION {
            warn!(
                "cache store schema {} does not match binary schema {}, ignoring",
                store.schema_version, CACHE_SCHEMA_VERSION
            );
            return None;
        }
        Some(store)
    }

    /// Atomic write: temp file in the same directory, then rename
    fn write_store(&self, store: &CacheFile) -> io::Result<()> {
        let tmp_path = self.store_path.with_extension("bin.tmp");
        let bytes = bincode::serialize(store)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(&tmp_path, bytes)?;
        match std::fs::rename(&tmp_path, &self.store_path) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }
}

enum LockKind {
    Shared,
    Exclusive,
}

/// Releases the advisory lock on drop
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn key_for(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mode, PitchClass, Section, SectionLabel};
    use std::io::Write;

    fn sample_record(path: &Path) -> TrackRecord {
        TrackRecord {
            track_id: 42,
            path: path.to_path_buf(),
            size_bytes: 0,
            mtime_ns: 0,
            artist: "Artist".into(),
            title: "Title".into(),
            genre: "Techno".into(),
            duration_s: 300.0,
            bpm: 128.0,
            bpm_confidence: 0.8,
            key_root: PitchClass::A,
            key_mode: Mode::Minor,
            camelot: "8A".into(),
            key_confidence: 0.7,
            energy: 0.6,
            bass_intensity: 0.4,
            sections: vec![
                Section {
                    label: SectionLabel::Intro,
                    start_s: 0.0,
                    end_s: 30.0,
                    start_bar: 0,
                    end_bar: 16,
                    avg_energy: 0.2,
                },
                Section {
                    label: SectionLabel::Outro,
                    start_s: 30.0,
                    end_s: 300.0,
                    start_bar: 16,
                    end_bar: 160,
                    avg_energy: 0.5,
                },
            ],
            mix_in_s: 30.0,
            mix_out_s: 270.0,
            structure_fallback: false,
            analyzed_at: chrono::Utc::now(),
        }
    }

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        f.sync_all().unwrap();
        path
    }

    #[test]
    fn test_put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_file(dir.path(), "a.wav", b"pcm bytes");
        let cache = TrackCache::open(dir.path()).unwrap();

        let record = sample_record(&audio);
        cache.put(&audio, &record);

        let got = cache.get(&audio).expect("expected a cache hit");
        assert_eq!(got.bpm, record.bpm);
        assert_eq!(got.camelot, record.camelot);
        assert_eq!(got.sections.len(), 2);
        assert_eq!(got.path, audio);
    }

    #[test]
    fn test_modified_file_misses() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_file(dir.path(), "a.wav", b"pcm bytes");
        let cache = TrackCache::open(dir.path()).unwrap();
        cache.put(&audio, &sample_record(&audio));

        // Change size (and content); fingerprint no longer matches
        write_file(dir.path(), "a.wav", b"different pcm bytes entirely");

        assert!(cache.get(&audio).is_none());
    }

    #[test]
    fn test_missing_file_misses() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_file(dir.path(), "a.wav", b"x");
        let cache = TrackCache::open(dir.path()).unwrap();
        cache.put(&audio, &sample_record(&audio));

        std::fs::remove_file(&audio).unwrap();
        assert!(cache.get(&audio).is_none());
    }

    #[test]
    fn test_put_on_vanished_file_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_file(dir.path(), "a.wav", b"x");
        let record = sample_record(&audio);
        let cache = TrackCache::open(dir.path()).unwrap();

        std::fs::remove_file(&audio).unwrap();
        cache.put(&audio, &record);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_store_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_file(dir.path(), "a.wav", b"x");
        let cache = TrackCache::open(dir.path()).unwrap();
        cache.put(&audio, &sample_record(&audio));

        // Stomp the store file
        write_file(dir.path(), STORE_FILE, b"not bincode at all");
        assert!(cache.get(&audio).is_none());

        // And the next put repairs it
        cache.put(&audio, &sample_record(&audio));
        assert!(cache.get(&audio).is_some());
    }

    #[test]
    fn test_clear_empties_store() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_file(dir.path(), "a.wav", b"x");
        let cache = TrackCache::open(dir.path()).unwrap();
        cache.put(&audio, &sample_record(&audio));
        assert_eq!(cache.len(), 1);

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_migrate_from_v3_clears() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TrackCache::open(dir.path()).unwrap();
        assert!(cache.migrate_schema(3, 4).is_ok());
        assert!(cache.migrate_schema(2, 4).is_err());
    }

    #[test]
    fn test_wrong_schema_version_refused() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_file(dir.path(), "a.wav", b"x");
        let cache = TrackCache::open(dir.path()).unwrap();

        // Hand-craft a store with a foreign schema version
        let foreign = CacheFile {
            schema_version: 3,
            entries: HashMap::new(),
        };
        std::fs::write(
            dir.path().join(STORE_FILE),
            bincode::serialize(&foreign).unwrap(),
        )
        .unwrap();

        assert!(cache.get(&audio).is_none());
    }

    #[test]
    fn test_concurrent_puts_leave_whole_entry() {
        // Two threads race puts on the same path; the surviving entry must
        // be one of the two writes in full, never a torn mixture
        let dir = tempfile::tempdir().unwrap();
        let audio = write_file(dir.path(), "a.wav", b"x");
        let cache = TrackCache::open(dir.path()).unwrap();

        let mut rec_a = sample_record(&audio);
        rec_a.bpm = 128.0;
        rec_a.camelot = "8A".into();
        let mut rec_b = sample_record(&audio);
        rec_b.bpm = 140.0;
        rec_b.camelot = "5B".into();

        let c1 = cache.clone();
        let c2 = cache.clone();
        let p1 = audio.clone();
        let p2 = audio.clone();
        let a = std::thread::spawn(move || {
            for _ in 0..25 {
                c1.put(&p1, &rec_a);
            }
        });
        let b = std::thread::spawn(move || {
            for _ in 0..25 {
                c2.put(&p2, &rec_b);
            }
        });
        a.join().unwrap();
        b.join().unwrap();

        let got = cache.get(&audio).expect("entry should survive the race");
        let whole_a = got.bpm == 128.0 && got.camelot == "8A";
        let whole_b = got.bpm == 140.0 && got.camelot == "5B";
        assert!(whole_a || whole_b, "torn write: bpm={} camelot={}", got.bpm, got.camelot);
    }
}
