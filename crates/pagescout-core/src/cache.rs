//! Two-tier resolution cache.
//!
//! Tier one is an in-process [`DashMap`]; tier two is an optional SQLite
//! database so resolutions survive restarts. Both tiers store the same
//! thing: the outcome of a full resolution, keyed by the normalized
//! query. Not-found outcomes are cached too, with a much shorter TTL,
//! so a paper that appears online later is not shadowed for a month.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use rusqlite::{Connection, OptionalExtension, params};

use crate::orchestrator::Resolution;
use crate::matching::normalize_query;

/// TTL for resolved entries: 30 days.
pub const DEFAULT_POSITIVE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// TTL for not-found markers: 24 hours.
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const READ_POOL_SIZE: usize = 2;

#[derive(Clone)]
struct L1Entry {
    resolution: Resolution,
    inserted_epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: Option<u64>,
    pub hits: u64,
    pub misses: u64,
}

/// Round-robin pool of read-only SQLite connections. Reads never contend
/// with the single writer under WAL.
struct ReadPool {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    fn open(path: &Path) -> rusqlite::Result<Self> {
        let mut connections = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            let conn = Connection::open(path)?;
            conn.pragma_update(None, "busy_timeout", 5_000)?;
            connections.push(Mutex::new(conn));
        }
        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> rusqlite::Result<T> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        let conn = self.connections[idx].lock().unwrap_or_else(|e| e.into_inner());
        f(&conn)
    }
}

struct Persistence {
    writer: Mutex<Connection>,
    readers: ReadPool,
    path: PathBuf,
}

impl Persistence {
    fn open(path: &Path) -> rusqlite::Result<Self> {
        let writer = Connection::open(path)?;
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "synchronous", "NORMAL")?;
        writer.pragma_update(None, "busy_timeout", 5_000)?;
        writer.execute_batch(
            "CREATE TABLE IF NOT EXISTS resolutions (
                query       TEXT PRIMARY KEY,
                found       INTEGER NOT NULL,
                paper_json  TEXT,
                inserted_at INTEGER NOT NULL
            );",
        )?;
        let readers = ReadPool::open(path)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            path: path.to_path_buf(),
        })
    }

    fn load(&self, key: &str) -> rusqlite::Result<Option<(bool, Option<String>, u64)>> {
        self.readers.with(|conn| {
            conn.query_row(
                "SELECT found, paper_json, inserted_at FROM resolutions WHERE query = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)? != 0,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?.max(0) as u64,
                    ))
                },
            )
            .optional()
        })
    }

    fn store(&self, key: &str, found: bool, paper_json: Option<&str>, epoch: u64) -> rusqlite::Result<()> {
        let conn = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR REPLACE INTO resolutions (query, found, paper_json, inserted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, found as i64, paper_json, epoch as i64],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> rusqlite::Result<()> {
        let conn = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute("DELETE FROM resolutions WHERE query = ?1", params![key])?;
        Ok(())
    }

    fn clear(&self) -> rusqlite::Result<usize> {
        let conn = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute("DELETE FROM resolutions", [])
    }

    fn count(&self) -> rusqlite::Result<u64> {
        self.readers.with(|conn| {
            conn.query_row("SELECT COUNT(*) FROM resolutions", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as u64)
        })
    }
}

pub struct ResolutionCache {
    l1: DashMap<String, L1Entry>,
    persist: Option<Persistence>,
    positive_ttl: Duration,
    negative_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("memory_entries", &self.l1.len())
            .field("path", &self.persist.as_ref().map(|p| &p.path))
            .field("positive_ttl", &self.positive_ttl)
            .field("negative_ttl", &self.negative_ttl)
            .finish()
    }
}

impl ResolutionCache {
    /// In-memory-only cache.
    pub fn new(positive_ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            l1: DashMap::new(),
            persist: None,
            positive_ttl,
            negative_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache backed by a SQLite database at `path`.
    pub fn open(path: &Path, positive_ttl: Duration, negative_ttl: Duration) -> rusqlite::Result<Self> {
        let persist = Persistence::open(path)?;
        Ok(Self {
            l1: DashMap::new(),
            persist: Some(persist),
            positive_ttl,
            negative_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn has_persistence(&self) -> bool {
        self.persist.is_some()
    }

    pub fn positive_ttl(&self) -> Duration {
        self.positive_ttl
    }

    pub fn negative_ttl(&self) -> Duration {
        self.negative_ttl
    }

    fn ttl_for(&self, resolution: &Resolution) -> Duration {
        match resolution {
            Resolution::Resolved(_) => self.positive_ttl,
            Resolution::NotFound => self.negative_ttl,
        }
    }

    fn expired(&self, resolution: &Resolution, inserted_epoch: u64) -> bool {
        let age = now_epoch().saturating_sub(inserted_epoch);
        age >= self.ttl_for(resolution).as_secs()
    }

    /// Look up a previous resolution for `query`. Returns `None` on miss
    /// or when the stored entry has expired (expired entries are evicted).
    pub fn get(&self, query: &str) -> Option<Resolution> {
        let key = normalize_query(query);
        if key.is_empty() {
            return None;
        }

        let l1_entry = self.l1.get(&key).map(|guard| L1Entry::clone(&guard));
        if let Some(entry) = l1_entry {
            if self.expired(&entry.resolution, entry.inserted_epoch) {
                self.evict(&key);
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.resolution);
            }
        } else if let Some(persist) = &self.persist {
            match persist.load(&key) {
                Ok(Some((found, paper_json, inserted_epoch))) => {
                    if let Some(resolution) = decode_row(found, paper_json.as_deref()) {
                        if self.expired(&resolution, inserted_epoch) {
                            self.evict(&key);
                        } else {
                            // Promote to L1 for subsequent lookups.
                            self.l1.insert(
                                key,
                                L1Entry {
                                    resolution: resolution.clone(),
                                    inserted_epoch,
                                },
                            );
                            self.hits.fetch_add(1, Ordering::Relaxed);
                            return Some(resolution);
                        }
                    } else {
                        self.evict(&key);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "cache read failed");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Record the outcome of a resolution, replacing any prior entry.
    pub fn put(&self, query: &str, resolution: &Resolution) {
        let key = normalize_query(query);
        if key.is_empty() {
            return;
        }
        let epoch = now_epoch();
        self.l1.insert(
            key.clone(),
            L1Entry {
                resolution: resolution.clone(),
                inserted_epoch: epoch,
            },
        );
        if let Some(persist) = &self.persist {
            let (found, paper_json) = match resolution {
                Resolution::Resolved(paper) => match serde_json::to_string(paper) {
                    Ok(json) => (true, Some(json)),
                    Err(e) => {
                        tracing::warn!(error = %e, "cache serialization failed");
                        return;
                    }
                },
                Resolution::NotFound => (false, None),
            };
            if let Err(e) = persist.store(&key, found, paper_json.as_deref(), epoch) {
                tracing::warn!(error = %e, "cache write failed");
            }
        }
    }

    fn evict(&self, key: &str) {
        self.l1.remove(key);
        if let Some(persist) = &self.persist {
            if let Err(e) = persist.delete(key) {
                tracing::warn!(error = %e, "cache eviction failed");
            }
        }
    }

    /// Drop every entry from both tiers. Returns the number of entries
    /// removed from the larger tier.
    pub fn clear(&self) -> usize {
        let memory = self.l1.len();
        self.l1.clear();
        let disk = if let Some(persist) = &self.persist {
            match persist.clear() {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "cache clear failed");
                    0
                }
            }
        } else {
            0
        };
        memory.max(disk)
    }

    pub fn stats(&self) -> CacheStats {
        let disk_entries = self.persist.as_ref().and_then(|p| match p.count() {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(error = %e, "cache count failed");
                None
            }
        });
        CacheStats {
            memory_entries: self.l1.len(),
            disk_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.l1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l1.is_empty()
    }
}

fn decode_row(found: bool, paper_json: Option<&str>) -> Option<Resolution> {
    if !found {
        return Some(Resolution::NotFound);
    }
    let json = paper_json?;
    match serde_json::from_str(json) {
        Ok(paper) => Some(Resolution::Resolved(paper)),
        Err(e) => {
            // Schema drift between versions; treat as absent.
            tracing::debug!(error = %e, "discarding undecodable cache row");
            None
        }
    }
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
