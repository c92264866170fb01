//! In-memory record cache
//!
//! Whole-table snapshots keyed by table name, expired by TTL and dropped
//! all at once on every write. Volatile; cleared on restart.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::models::Record;
use super::schema::TableName;
use crate::connectivity::StoreMode;

/// Cached table snapshot
#[derive(Debug, Clone)]
struct CacheEntry {
    rows: Arc<Vec<Record>>,
    /// Store the rows were read from
    source: StoreMode,
    /// When this snapshot was fetched
    fetched_at: Instant,
    /// Wall-clock fetch time, for reporting
    fetched_at_utc: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_valid(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

/// A fresh snapshot returned by [`RecordCache::get_fresh`]
#[derive(Debug, Clone)]
pub struct CachedTable {
    pub rows: Arc<Vec<Record>>,
    pub source: StoreMode,
    pub fetched_at: DateTime<Utc>,
}

/// Read-through cache of full table snapshots
pub struct RecordCache {
    entries: RwLock<HashMap<TableName, CacheEntry>>,
    default_ttl: Duration,
}

impl RecordCache {
    /// Create new record cache
    ///
    /// # Arguments
    /// * `default_ttl` - Snapshot lifetime (default: 60 seconds)
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl: default_ttl.unwrap_or(Duration::from_secs(60)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the snapshot for `table` if it is younger than the TTL.
    pub async fn get_fresh(&self, table: TableName) -> Option<CachedTable> {
        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

        let entries = self.entries.read().await;
        match entries.get(&table) {
            Some(entry) if entry.is_valid() => {
                tracing::debug!(table = %table, "Record cache hit");
                CACHE_HITS_TOTAL.with_label_values(&[table.as_str()]).inc();
                Some(CachedTable {
                    rows: entry.rows.clone(),
                    source: entry.source,
                    fetched_at: entry.fetched_at_utc,
                })
            }
            Some(_) => {
                tracing::debug!(table = %table, "Record cache expired");
                CACHE_MISSES_TOTAL.with_label_values(&[table.as_str()]).inc();
                None
            }
            None => {
                tracing::debug!(table = %table, "Record cache miss");
                CACHE_MISSES_TOTAL.with_label_values(&[table.as_str()]).inc();
                None
            }
        }
    }

    /// Store a freshly fetched snapshot, replacing any previous one.
    ///
    /// Expired snapshots of other tables are pruned on the way in.
    pub async fn insert(&self, table: TableName, rows: Arc<Vec<Record>>, source: StoreMode) {
        let mut entries = self.entries.write().await;
        prune_expired(&mut entries);
        entries.insert(
            table,
            CacheEntry {
                rows,
                source,
                fetched_at: Instant::now(),
                fetched_at_utc: Utc::now(),
                ttl: self.default_ttl,
            },
        );

        crate::metrics::CACHE_SIZE.set(entries.len() as i64);
    }

    /// Drop every snapshot
    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        crate::metrics::CACHE_SIZE.set(0);
        tracing::debug!(dropped, "Invalidated record cache");
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let total = entries.len();
        let valid = entries.values().filter(|v| v.is_valid()).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
        }
    }
}

fn prune_expired(entries: &mut HashMap<TableName, CacheEntry>) {
    let before = entries.len();
    entries.retain(|_, v| v.is_valid());
    let removed = before - entries.len();
    if removed > 0 {
        tracing::debug!(removed, "Pruned expired record cache entries");
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Number of valid (non-expired) entries
    pub valid_entries: usize,
    /// Number of expired entries
    pub expired_entries: usize,
}
