use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Label attached to cache entries so mutations can drop everything that
/// depends on what they touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    TaskList,
    Task(i64),
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskList => f.write_str("task-list"),
            Self::Task(id) => write!(f, "task:{id}"),
        }
    }
}

/// Whether a read was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    tags: HashSet<CacheTag>,
}

impl<V> Entry<V> {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// Keyed values that stay valid for a fixed window after they are stored.
///
/// There is no eviction and no capacity bound. A stale entry stays in place
/// until the next read of its key replaces it, or an invalidation drops it.
/// Two concurrent misses on one key both fetch; the later store wins.
/// A fetch that overlaps an invalidation is returned but not stored.
#[derive(Debug)]
pub struct DataCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    /// Bumped by every `invalidate`, under the entries write lock.
    generation: AtomicU64,
}

impl<V: Clone> DataCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// The value under `key`, if it is still inside its window.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.value.clone())
    }

    pub async fn insert(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
        tags: HashSet<CacheTag>,
    ) {
        let entry = Entry {
            value,
            stored_at: Instant::now(),
            ttl,
            tags,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    /// Serve `key` from the cache, or run `fetch`, store its value for `ttl`
    /// under the tags `tag` derives from it, and return it.
    ///
    /// A failed fetch stores nothing.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        tag: impl FnOnce(&V) -> HashSet<CacheTag>,
        fetch: F,
    ) -> Result<(V, CacheLookup), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            tracing::debug!(key, "data cache hit");
            return Ok((value, CacheLookup::Hit));
        }
        tracing::debug!(key, "data cache miss");
        let seen = self.generation.load(Ordering::Acquire);
        let value = fetch().await?;
        let entry = Entry {
            value: value.clone(),
            stored_at: Instant::now(),
            ttl,
            tags: tag(&value),
        };
        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::Acquire) == seen {
            entries.insert(key.to_string(), entry);
        } else {
            tracing::debug!(key, "invalidated during fetch, not storing");
        }
        Ok((value, CacheLookup::Miss))
    }

    /// Drop every entry carrying any of `tags`. Returns how many went.
    pub async fn invalidate(&self, tags: &[CacheTag]) -> usize {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        let before = entries.len();
        entries.retain(|_, entry| !tags.iter().any(|tag| entry.tags.contains(tag)));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V: Clone> Default for DataCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
