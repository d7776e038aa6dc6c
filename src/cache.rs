// Cache Store: key/value persistence with a per-entry timestamp.
// The store never evicts; freshness is decided by each resolver at read time.

use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::ComparisonType;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub write_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    // Age in fractional seconds, millisecond resolution
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.stored_at).num_milliseconds() as f64 / 1000.0
    }
}

// Cache keys are tagged by resolver kind so the key space is partitioned:
// an airport key can never equal a geocode or price key.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheKey {
    Airport {
        city: String,
    },
    Geocode {
        city: String,
    },
    Price {
        city: String,
        comparison: ComparisonType,
        start_lat: f64,
    },
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Airport { city } => write!(f, "airport:{}", city),
            CacheKey::Geocode { city } => write!(f, "geocode:{}", city),
            CacheKey::Price {
                city,
                comparison,
                start_lat,
            } => write!(f, "price:{}:{}:{}", city, comparison, start_lat),
        }
    }
}

pub trait CacheStore: Send + Sync + 'static {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    // Later writes under the same key replace the earlier entry
    fn put(&self, key: &CacheKey, payload: Bytes, stored_at: DateTime<Utc>);

    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    writes: AtomicUsize,
}

impl Counters {
    fn record_lookup(&self, key: &str, hit: bool) {
        if hit {
            debug!(key, "cache hit");
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            debug!(key, "cache miss");
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self, items_count: usize) -> CacheStats {
        CacheStats {
            items_count,
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            write_count: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// In-memory store. Entries live as long as the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    store: DashMap<String, CacheEntry>,
    counters: Counters,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_entries(entries: impl IntoIterator<Item = (String, CacheEntry)>) -> Self {
        Self {
            store: entries.into_iter().collect(),
            counters: Counters::default(),
        }
    }

    fn snapshot(&self) -> Vec<(String, CacheEntry)> {
        self.store
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let key = key.to_string();
        let entry = self.store.get(&key).map(|e| e.value().clone());
        self.counters.record_lookup(&key, entry.is_some());
        entry
    }

    fn put(&self, key: &CacheKey, payload: Bytes, stored_at: DateTime<Utc>) {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        self.store
            .insert(key.to_string(), CacheEntry { payload, stored_at });
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.store.len())
    }
}

// Durable store: a MemoryStore mirrored to a JSON file after every write.
// A missing or unreadable file starts an empty cache.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    memory: MemoryStore,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let memory = match fs::read(&path) {
            Ok(raw) => match serde_json::from_slice::<Vec<(String, CacheEntry)>>(&raw) {
                Ok(entries) => {
                    debug!(path = %path.display(), count = entries.len(), "loaded cache file");
                    MemoryStore::from_entries(entries)
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "ignoring malformed cache file");
                    MemoryStore::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read cache file");
                MemoryStore::new()
            }
        };

        Self {
            path,
            memory,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> std::io::Result<()> {
        let _guard = self.write_lock.lock();
        let raw = serde_json::to_vec(&self.memory.snapshot())?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)
    }
}

impl CacheStore for JsonFileStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.memory.get(key)
    }

    // Rewrites the whole file with blocking I/O on the calling thread, worker
    // threads included. Sized for a CLI cache of a few dozen cities.
    fn put(&self, key: &CacheKey, payload: Bytes, stored_at: DateTime<Utc>) {
        self.memory.put(key, payload, stored_at);
        if let Err(err) = self.persist() {
            warn!(path = %self.path.display(), error = %err, "failed to persist cache");
        }
    }

    fn stats(&self) -> CacheStats {
        self.memory.stats()
    }
}
