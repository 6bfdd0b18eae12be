//! Process-wide clip cache with best-effort background preloading
//!
//! Structure: IndexMap<AssetId, CacheEntry> (insertion order = load order)
//! - Exact-key lookups only, no partial matches
//! - Append-only: an asset id is written at most once, entries are never evicted
//! - Preloads run on the fetch worker pool; failures are logged and dropped
//!
//! Only the letter/digit alphabet is preloaded. Word clips are fetched on
//! demand by the player adapter and never stored here.

use indexmap::IndexMap;
use log::{debug, info, trace};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use super::resolver::{AssetId, alphabet_ids};
use super::workers::Workers;

/// Opaque handle to a fetched clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipHandle {
    /// Where the clip bytes live
    pub location: PathBuf,
    /// Clip size in bytes
    pub bytes: u64,
}

/// Why a clip could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No clip with this id in the store
    Missing(AssetId),
    /// Clip exists but could not be read
    Io(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Missing(id) => write!(f, "Clip not found: {}", id),
            LoadError::Io(e) => write!(f, "Clip read error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

/// Fetch capability of the external clip store
pub trait AssetLoader: Send + Sync {
    fn fetch(&self, id: &AssetId) -> Result<ClipHandle, LoadError>;
}

/// One cached clip
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub asset_id: AssetId,
    pub handle: ClipHandle,
    pub loaded_at: SystemTime,
}

/// Lookup statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    failed_preloads: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn failed_preloads(&self) -> u64 {
        self.failed_preloads.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

/// Serializable cache summary for the API
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub entries: Vec<String>,
    pub pending: usize,
    pub hits: u64,
    pub misses: u64,
    pub failed_preloads: u64,
    pub hit_rate: f64,
}

/// Shared clip cache.
pub struct AssetCache {
    entries: Arc<RwLock<IndexMap<AssetId, CacheEntry>>>,
    /// Ids with a preload in flight
    pending: Arc<Mutex<HashSet<AssetId>>>,
    loader: Arc<dyn AssetLoader>,
    workers: Arc<Workers>,
    stats: Arc<CacheStats>,
}

impl fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetCache")
            .field("entries", &self.len())
            .field("pending", &self.pending())
            .finish()
    }
}

impl AssetCache {
    pub fn new(loader: Arc<dyn AssetLoader>, workers: Arc<Workers>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(IndexMap::new())),
            pending: Arc::new(Mutex::new(HashSet::new())),
            loader,
            workers,
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Begin a background load of `id` unless it is cached or already loading.
    ///
    /// Never fails: fetch errors are logged at debug and counted.
    pub fn preload(&self, id: AssetId) {
        if self.contains(id.as_str()) {
            return;
        }
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if !pending.insert(id.clone()) {
                return;
            }
        }

        let entries = Arc::clone(&self.entries);
        let pending = Arc::clone(&self.pending);
        let loader = Arc::clone(&self.loader);
        let stats = Arc::clone(&self.stats);

        self.workers.execute(move || {
            match loader.fetch(&id) {
                Ok(handle) => {
                    let mut map = entries.write().unwrap_or_else(|e| e.into_inner());
                    map.entry(id.clone()).or_insert_with(|| CacheEntry {
                        asset_id: id.clone(),
                        handle,
                        loaded_at: SystemTime::now(),
                    });
                    trace!("Preloaded {}", id);
                }
                Err(e) => {
                    stats.failed_preloads.fetch_add(1, Ordering::Relaxed);
                    debug!("Preload of {} failed: {}", id, e);
                }
            }
            pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
        });
    }

    /// Preload the 26 letters and 10 digits
    pub fn preload_alphabet(&self) {
        let mut queued = 0;
        for id in alphabet_ids() {
            self.preload(id);
            queued += 1;
        }
        info!("Alphabet preload queued ({} clips)", queued);
    }

    /// Cached handle for exactly `id`
    pub fn get(&self, id: &str) -> Option<ClipHandle> {
        let found = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .map(|entry| entry.handle.clone());

        if found.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            trace!("Cache miss: {}", id);
        }
        found
    }

    /// Check presence without touching stats
    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    pub fn entry(&self, id: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of preloads still in flight
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Fetch capability shared with the player adapter
    pub fn loader(&self) -> Arc<dyn AssetLoader> {
        Arc::clone(&self.loader)
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .map(|id| id.to_string())
            .collect();
        CacheSnapshot {
            entries,
            pending: self.pending(),
            hits: self.stats.hits(),
            misses: self.stats.misses(),
            failed_preloads: self.stats.failed_preloads(),
            hit_rate: self.stats.hit_rate(),
        }
    }
}
