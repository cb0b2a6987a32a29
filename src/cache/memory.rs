//! In-process cache backend.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use metrics::counter;
use time::OffsetDateTime;

use crate::util::clock::Clock;

use super::lock::{rw_read, rw_write};
use super::store::{CacheError, CacheStore, glob_match};

const SOURCE: &str = "cache::memory";

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct Counter {
    count: i64,
    expires_at: Option<OffsetDateTime>,
}

/// Cache backend on process memory: a key/value map under a single
/// reader/writer lock (many concurrent readers, exclusive writers) plus a
/// tag index and sharded counters. Expired entries are evicted
/// opportunistically on read: the expiry check happens under the read
/// lock, the eviction under a write lock taken afterwards.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    tags: RwLock<HashMap<String, HashSet<String>>>,
    counters: DashMap<String, Counter>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
            counters: DashMap::new(),
            clock,
        }
    }

    fn expiry_for(&self, ttl: Duration) -> Option<OffsetDateTime> {
        if ttl.is_zero() {
            None
        } else {
            Some(self.clock.now_utc() + ttl)
        }
    }

    fn is_expired(&self, expires_at: Option<OffsetDateTime>) -> bool {
        expires_at.is_some_and(|at| at <= self.clock.now_utc())
    }

    fn evict(&self, key: &str) {
        let mut entries = rw_write(&self.entries, SOURCE, "evict");
        if let Some(entry) = entries.get(key) {
            if self.is_expired(entry.expires_at) {
                entries.remove(key);
            }
        }
    }

    fn tag_key(&self, key: &str, tags: &[&str]) {
        let mut tag_index = rw_write(&self.tags, SOURCE, "tag_key");
        for tag in tags {
            tag_index
                .entry((*tag).to_string())
                .or_default()
                .insert(key.to_string());
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let hit = {
            let entries = rw_read(&self.entries, SOURCE, "get");
            match entries.get(key) {
                Some(entry) if !self.is_expired(entry.expires_at) => Some(entry.value.clone()),
                Some(_) => None,
                None => {
                    counter!("tasknest_cache_miss_total").increment(1);
                    return Ok(None);
                }
            }
        };

        match hit {
            Some(value) => {
                counter!("tasknest_cache_hit_total").increment(1);
                Ok(Some(value))
            }
            None => {
                self.evict(key);
                counter!("tasknest_cache_miss_total").increment(1);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: self.expiry_for(ttl),
        };
        rw_write(&self.entries, SOURCE, "set").insert(key.to_string(), entry);
        Ok(())
    }

    async fn set_with_tags(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
        tags: &[&str],
    ) -> Result<(), CacheError> {
        self.set(key, value, ttl).await?;
        self.tag_key(key, tags);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "delete").remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "delete_pattern")
            .retain(|key, _| !glob_match(pattern, key));
        Ok(())
    }

    async fn invalidate_by_tags(&self, tags: &[&str]) -> Result<(), CacheError> {
        let tagged: Vec<String> = {
            let mut tag_index = rw_write(&self.tags, SOURCE, "invalidate_by_tags");
            tags.iter()
                .filter_map(|tag| tag_index.remove(*tag))
                .flatten()
                .collect()
        };
        if !tagged.is_empty() {
            let mut entries = rw_write(&self.entries, SOURCE, "invalidate_by_tags.keys");
            for key in &tagged {
                entries.remove(key);
            }
        }
        counter!("tasknest_cache_invalidation_total").increment(1);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let expired = {
            let entries = rw_read(&self.entries, SOURCE, "exists");
            match entries.get(key) {
                Some(entry) => self.is_expired(entry.expires_at),
                None => return Ok(false),
            }
        };
        if expired {
            self.evict(key);
            return Ok(false);
        }
        Ok(true)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "clear").clear();
        rw_write(&self.tags, SOURCE, "clear.tags").clear();
        self.counters.clear();
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let now = self.clock.now_utc();
        let mut counter = self.counters.entry(key.to_string()).or_default();
        if counter.expires_at.is_some_and(|at| at <= now) {
            counter.count = 0;
            counter.expires_at = None;
        }
        counter.count += 1;
        Ok(counter.count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        match self.counters.get_mut(key) {
            Some(mut counter) => {
                counter.expires_at = self.expiry_for(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::util::clock::{ManualClock, SystemClock};

    fn store_with_manual_clock() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
        let store = MemoryStore::new(clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn get_distinguishes_miss_from_value() {
        let store = MemoryStore::new(Arc::new(SystemClock));
        assert!(store.get("absent").await.expect("miss is ok").is_none());

        store
            .set("present", Bytes::from_static(b"1"), Duration::ZERO)
            .await
            .expect("set");
        assert_eq!(
            store.get("present").await.expect("hit"),
            Some(Bytes::from_static(b"1"))
        );
    }

    #[tokio::test]
    async fn ttl_zero_never_expires() {
        let (store, clock) = store_with_manual_clock();
        store
            .set("pinned", Bytes::from_static(b"v"), Duration::ZERO)
            .await
            .expect("set");
        clock.advance(Duration::from_secs(86_400));
        assert!(store.get("pinned").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_on_read() {
        let (store, clock) = store_with_manual_clock();
        store
            .set("short", Bytes::from_static(b"v"), Duration::from_secs(30))
            .await
            .expect("set");
        assert!(store.exists("short").await.expect("exists"));

        clock.advance(Duration::from_secs(31));
        assert!(store.get("short").await.expect("get").is_none());
        assert!(!store.exists("short").await.expect("exists after expiry"));
    }

    #[tokio::test]
    async fn delete_pattern_removes_matching_keys_only() {
        let store = MemoryStore::new(Arc::new(SystemClock));
        for key in ["tasks_page_1_limit_10_order_desc", "tasks_page_2_limit_10_order_desc", "tasks_id_7"] {
            store
                .set(key, Bytes::from_static(b"v"), Duration::ZERO)
                .await
                .expect("set");
        }

        store.delete_pattern("tasks_page_*").await.expect("delete");

        assert!(!store.exists("tasks_page_1_limit_10_order_desc").await.expect("exists"));
        assert!(!store.exists("tasks_page_2_limit_10_order_desc").await.expect("exists"));
        assert!(store.exists("tasks_id_7").await.expect("exists"));
    }

    #[tokio::test]
    async fn invalidating_a_tag_removes_every_tagged_key() {
        let store = MemoryStore::new(Arc::new(SystemClock));
        store
            .set_with_tags("a", Bytes::from_static(b"1"), Duration::ZERO, &["tasks:list"])
            .await
            .expect("set a");
        store
            .set_with_tags("b", Bytes::from_static(b"2"), Duration::ZERO, &["tasks:list"])
            .await
            .expect("set b");
        store
            .set("c", Bytes::from_static(b"3"), Duration::ZERO)
            .await
            .expect("set c");

        store
            .invalidate_by_tags(&["tasks:list"])
            .await
            .expect("invalidate");

        assert!(!store.exists("a").await.expect("a gone"));
        assert!(!store.exists("b").await.expect("b gone"));
        assert!(store.exists("c").await.expect("c untouched"));

        // The tag itself is gone; re-invalidating is a no-op.
        store
            .invalidate_by_tags(&["tasks:list"])
            .await
            .expect("second invalidate");
    }

    #[tokio::test]
    async fn incr_creates_at_one_and_counts_up() {
        let store = MemoryStore::new(Arc::new(SystemClock));
        assert_eq!(store.incr("k").await.expect("incr"), 1);
        assert_eq!(store.incr("k").await.expect("incr"), 2);
        assert_eq!(store.incr("other").await.expect("incr"), 1);
    }

    #[tokio::test]
    async fn expired_counter_restarts_at_one() {
        let (store, clock) = store_with_manual_clock();
        assert_eq!(store.incr("k").await.expect("incr"), 1);
        assert!(store.expire("k", Duration::from_secs(60)).await.expect("expire"));
        assert_eq!(store.incr("k").await.expect("incr"), 2);

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.incr("k").await.expect("incr after window"), 1);
    }

    #[tokio::test]
    async fn expire_on_missing_counter_reports_false() {
        let store = MemoryStore::new(Arc::new(SystemClock));
        assert!(!store.expire("absent", Duration::from_secs(1)).await.expect("expire"));
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let store = MemoryStore::new(Arc::new(SystemClock));
        store
            .set_with_tags("a", Bytes::from_static(b"1"), Duration::ZERO, &["t"])
            .await
            .expect("set");
        store.incr("k").await.expect("incr");

        store.clear().await.expect("clear");

        assert!(!store.exists("a").await.expect("exists"));
        assert_eq!(store.incr("k").await.expect("incr"), 1);
    }
}
