//! Persistent content-addressed fingerprint cache.
//!
//! Keys are pure functions of content (normalized-content sha for files, the
//! sorted constituent tuple plus module id for modules), so entries are
//! immutable once written and no invalidation logic exists, only insertion
//! and lookup. The store is shared across runs and across projects.
//!
//! Within a run, `get_or_compute` guarantees at-most-one computation per
//! unique key: concurrent callers for the same key serialize on a per-key
//! lock, and every caller after the first observes the committed entry as a
//! hit. A corrupted or unreadable entry is a miss (recompute and
//! overwrite), never a fatal error; only a cache root that cannot be used
//! as a directory aborts.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use driftscan_types::CacheStatsSnapshot;

/// Errors from cache operations. Read-side corruption never surfaces here;
/// it degrades to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache root {0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to prepare cache directory {dir}: {source}")]
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to persist cache entry {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode cache entry {key}: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
}

/// Cached value for a file key. Path-free: the same content cached under
/// one path is reusable under any other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFile {
    pub sha256_normalized: String,
    pub simhash64: u64,
    pub normalized_byte_length: u64,
}

/// Cached value for a module key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedModule {
    pub aggregate_sha256: String,
    pub aggregate_simhash64: u64,
}

/// One keyed sub-store (file-level or module-level) with its own counters.
#[derive(Debug)]
struct Shard {
    dir: PathBuf,
    hits: AtomicU64,
    misses: AtomicU64,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Shard {
    fn open(dir: PathBuf) -> Result<Self, CacheError> {
        fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            dir: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = fs::read_to_string(self.entry_path(key)).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_key(&self, key: &str) {
        let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
    }

    fn get_or_compute<T, F>(&self, key: &str, compute: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        // A caller that waited on the lock finds the first caller's entry.
        if let Some(value) = self.load::<T>(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.release_key(key);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute();
        let result = persist_json(&self.entry_path(key), key, &value);
        self.release_key(key);
        result?;
        Ok(value)
    }
}

/// Write a JSON entry through a temp file so readers in other processes
/// never observe a torn entry. Concurrent writers of the same key converge
/// to the same value, so last-rename-wins is harmless.
fn persist_json<T: Serialize>(path: &Path, key: &str, value: &T) -> Result<(), CacheError> {
    let encoded = serde_json::to_vec(value).map_err(|source| CacheError::Encode {
        key: key.to_string(),
        source,
    })?;
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    let write = (|| {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(&encoded)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    })();
    write.map_err(|source| CacheError::Persist {
        path: path.to_path_buf(),
        source,
    })
}

/// The process-wide cache store: opened at run start, content-addressed and
/// idempotent throughout, so no cross-run locking is needed.
#[derive(Debug)]
pub struct CacheStore {
    files: Shard,
    modules: Shard,
    ids: Shard,
}

impl CacheStore {
    /// Open (creating if needed) a cache store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        if root.exists() && !root.is_dir() {
            return Err(CacheError::NotADirectory(root.to_path_buf()));
        }
        Ok(Self {
            files: Shard::open(root.join("file"))?,
            modules: Shard::open(root.join("module"))?,
            ids: Shard::open(root.join("id"))?,
        })
    }

    /// File-level lookup by normalized-content sha; `compute` runs at most
    /// once per key per run and derives the full fingerprint (the simhash
    /// derivation is exactly what a hit skips).
    pub fn file<F>(&self, sha256_normalized: &str, compute: F) -> Result<CachedFile, CacheError>
    where
        F: FnOnce() -> CachedFile,
    {
        self.files.get_or_compute(sha256_normalized, compute)
    }

    /// Module-level lookup; a hit lets an unchanged module skip aggregation
    /// even across runs.
    pub fn module<F>(&self, key: &str, compute: F) -> Result<CachedModule, CacheError>
    where
        F: FnOnce() -> CachedModule,
    {
        self.modules.get_or_compute(key, compute)
    }

    /// Shortcut lookup by a stable external content id (e.g. a VCS blob
    /// id). A hit skips normalization entirely and counts as a file cache
    /// hit; a miss records nothing, because the caller falls through to the
    /// normalized-key path which does the accounting.
    pub fn file_by_content_id(&self, content_id: &str) -> Option<CachedFile> {
        let value = self.ids.load::<CachedFile>(&id_key(content_id))?;
        self.files.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }

    /// Record the id alias for a freshly computed fingerprint. The alias is
    /// an index only; the primary store stays keyed by normalized content.
    pub fn record_content_id(&self, content_id: &str, value: &CachedFile) -> Result<(), CacheError> {
        let key = id_key(content_id);
        persist_json(&self.ids.entry_path(&key), &key, value)
    }

    /// Per-run hit/miss counters.
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            file_cache_hits: self.files.hits.load(Ordering::Relaxed),
            file_cache_misses: self.files.misses.load(Ordering::Relaxed),
            module_cache_hits: self.modules.hits.load(Ordering::Relaxed),
            module_cache_misses: self.modules.misses.load(Ordering::Relaxed),
        }
    }
}

/// Content ids are free-form, so their filename is a digest.
fn id_key(content_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content_id.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
