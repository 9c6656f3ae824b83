//! Classification cache keyed by `(issuer_id, ncm, cfop)`.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CacheError;
use crate::models::classification::ClassificationResult;
use crate::models::invoice::Invoice;

const SNAPSHOT_VERSION: u32 = 1;

/// Cache key. NCM and CFOP come from the first item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub issuer_id: String,
    pub ncm: Option<String>,
    pub cfop: Option<String>,
}

impl CacheKey {
    pub fn new(issuer_id: impl Into<String>, ncm: Option<&str>, cfop: Option<&str>) -> Self {
        Self {
            issuer_id: issuer_id.into(),
            ncm: ncm.map(str::to_string),
            cfop: cfop.map(str::to_string),
        }
    }

    /// Key for an invoice.
    pub fn for_invoice(invoice: &Invoice) -> Self {
        Self::new(&invoice.issuer_id, invoice.primary_ncm(), invoice.primary_cfop())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.issuer_id,
            self.ncm.as_deref().unwrap_or("-"),
            self.cfop.as_deref().unwrap_or("-")
        )
    }
}

/// A stored classification and its usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub result: ClassificationResult,
    pub hit_count: u64,
    pub last_used_at: DateTime<Utc>,
}

/// Counters reported by a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Key-value store for classification results.
///
/// Implementations must be safe for concurrent use. Concurrent writes to one
/// key are last-write-wins. Errors are treated as misses by the classifier.
pub trait ClassificationCache: Send + Sync {
    /// Look up a result, counting a hit on the entry when present.
    fn get(&self, key: &CacheKey) -> Result<Option<ClassificationResult>, CacheError>;

    /// Store a result.
    fn put(&self, key: CacheKey, result: ClassificationResult) -> Result<(), CacheError>;

    /// Current counters.
    fn stats(&self) -> CacheStats;
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<CacheEntry>,
}

/// In-process cache backed by a concurrent hash map.
///
/// Entries are never evicted. The contents can be persisted between runs as
/// a JSON snapshot.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<CacheKey, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`MemoryCache::save`].
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let content = fs::read_to_string(path)
            .map_err(|e| CacheError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .map_err(|e| CacheError::Corrupted(format!("{}: {}", path.display(), e)))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheError::Corrupted(format!(
                "{}: unsupported snapshot version {}",
                path.display(),
                snapshot.version
            )));
        }

        let cache = Self::new();
        for entry in snapshot.entries {
            cache.entries.insert(entry.key.clone(), entry);
        }

        info!("Loaded {} cached classifications from {}", cache.len(), path.display());
        Ok(cache)
    }

    /// Load a snapshot if the file exists, otherwise start empty.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No cache snapshot at {}, starting empty", path.display());
            Ok(Self::new())
        }
    }

    /// Write all entries as a JSON snapshot.
    ///
    /// The file is written next to the target and renamed into place.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries: self.entries(),
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CacheError::Corrupted(e.to_string()))?;

        let unavailable = |e: std::io::Error| CacheError::Unavailable(format!("{}: {}", path.display(), e));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(unavailable)?;
        fs::rename(&tmp, path).map_err(unavailable)?;

        debug!("Saved {} cached classifications to {}", snapshot.entries.len(), path.display());
        Ok(())
    }

    /// Copy of one entry, without counting a hit.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Copies of all entries ordered by key.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl ClassificationCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<ClassificationResult>, CacheError> {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.hit_count += 1;
                entry.last_used_at = Utc::now();
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.result.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn put(&self, key: CacheKey, result: ClassificationResult) -> Result<(), CacheError> {
        let now = Utc::now();
        self.entries
            .entry(key.clone())
            .and_modify(|entry| {
                entry.result = result.clone();
                entry.last_used_at = now;
            })
            .or_insert_with(|| CacheEntry {
                key,
                result,
                hit_count: 0,
                last_used_at: now,
            });
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
