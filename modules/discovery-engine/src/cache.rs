//! Verification cache (HEAD results, short TTL) and discovery cache (whole
//! lookup results, long TTL, globally toggleable), both over a pluggable
//! [`KeyValueStore`].
//!
//! Every store call is bounded by a timeout. A store that errors or stalls
//! degrades to a cache miss on read and a skipped write on write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use discovery_common::{BusinessQuery, DiscoveryResult, PlatformKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Store boundary
// ---------------------------------------------------------------------------

/// String key/value store with per-entry expiry. The in-process
/// [`MemoryStore`] is the default; a shared external store can be injected.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    /// Number of unexpired entries.
    async fn count(&self) -> Result<usize>;
}

/// Source of the process-wide "discovery caching enabled" flag.
#[async_trait]
pub trait CacheSettings: Send + Sync {
    async fn discovery_cache_enabled(&self) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Sharded in-memory store. Expired entries are evicted lazily on read.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }
        // Shard guard is released above; a concurrent refresh is kept.
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let now = Instant::now();
        Ok(self.entries.iter().filter(|e| e.expires_at > now).count())
    }
}

// ---------------------------------------------------------------------------
// CacheToggle
// ---------------------------------------------------------------------------

/// In-process toggle for discovery caching. Enabled unless switched off.
pub struct CacheToggle {
    enabled: AtomicBool,
}

impl CacheToggle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl Default for CacheToggle {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl CacheSettings for CacheToggle {
    async fn discovery_cache_enabled(&self) -> Result<bool> {
        Ok(self.is_enabled())
    }
}

// ---------------------------------------------------------------------------
// Timed JSON access
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct TimedStore {
    store: Arc<dyn KeyValueStore>,
    op_timeout: Duration,
    name: &'static str,
}

impl TimedStore {
    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match tokio::time::timeout(self.op_timeout, self.store.get(key)).await {
            Ok(Ok(raw)) => raw?,
            Ok(Err(e)) => {
                warn!(cache = self.name, error = %e, "Cache read failed, treating as miss");
                return None;
            }
            Err(_) => {
                warn!(cache = self.name, "Cache read timed out, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(cache = self.name, error = %e, "Corrupt cache entry, treating as miss");
                None
            }
        }
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(cache = self.name, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        match tokio::time::timeout(self.op_timeout, self.store.set(key, raw, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(cache = self.name, error = %e, "Cache write failed, skipping"),
            Err(_) => warn!(cache = self.name, "Cache write timed out, skipping"),
        }
    }

    async fn clear(&self) {
        match tokio::time::timeout(self.op_timeout, self.store.clear()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(cache = self.name, error = %e, "Cache clear failed"),
            Err(_) => warn!(cache = self.name, "Cache clear timed out"),
        }
    }

    async fn count(&self) -> usize {
        match tokio::time::timeout(self.op_timeout, self.store.count()).await {
            Ok(Ok(n)) => n,
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// VerificationCache
// ---------------------------------------------------------------------------

/// Outcome of a HEAD check on a guessed profile URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEntry {
    pub verified: bool,
    pub url: Option<String>,
    pub checked_at: DateTime<Utc>,
}

pub struct VerificationCache {
    inner: TimedStore,
    ttl: Duration,
}

impl VerificationCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration, op_timeout: Duration) -> Self {
        Self {
            inner: TimedStore {
                store,
                op_timeout,
                name: "verification",
            },
            ttl,
        }
    }

    fn key(platform: PlatformKey, query: &BusinessQuery) -> String {
        format!(
            "verify:{}:{}:{}",
            platform,
            query.normalized_name(),
            query.normalized_address()
        )
    }

    pub async fn get(&self, platform: PlatformKey, query: &BusinessQuery) -> Option<VerificationEntry> {
        let entry = self.inner.get_json(&Self::key(platform, query)).await;
        if entry.is_some() {
            debug!(%platform, business = %query.name, "Verification cache hit");
        }
        entry
    }

    pub async fn put(&self, platform: PlatformKey, query: &BusinessQuery, verified: bool, url: Option<String>) {
        let entry = VerificationEntry {
            verified,
            url,
            checked_at: Utc::now(),
        };
        self.inner
            .set_json(&Self::key(platform, query), &entry, self.ttl)
            .await;
    }

    pub async fn clear(&self) {
        self.inner.clear().await;
    }

    pub async fn len(&self) -> usize {
        self.inner.count().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ---------------------------------------------------------------------------
// DiscoveryCache
// ---------------------------------------------------------------------------

pub struct DiscoveryCache {
    inner: TimedStore,
    settings: Arc<dyn CacheSettings>,
    ttl: Duration,
}

impl DiscoveryCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        settings: Arc<dyn CacheSettings>,
        ttl: Duration,
        op_timeout: Duration,
    ) -> Self {
        Self {
            inner: TimedStore {
                store,
                op_timeout,
                name: "discovery",
            },
            settings,
            ttl,
        }
    }

    /// Identity plus which hints were supplied, so a name-only result is
    /// never served to a lookup that brings a website or place id.
    fn key(query: &BusinessQuery, website_only: bool) -> String {
        let mut key = format!("discovery:{}", query.identity_key());
        if query.website_str().is_some() {
            key.push_str(":site");
        }
        if query.place_id_str().is_some() {
            key.push_str(":place");
        }
        if website_only {
            key.push_str(":website_only");
        }
        key
    }

    /// Read at call time, never memoized. Settings failures count as disabled.
    pub async fn is_enabled(&self) -> bool {
        match tokio::time::timeout(self.inner.op_timeout, self.settings.discovery_cache_enabled()).await {
            Ok(Ok(enabled)) => enabled,
            Ok(Err(e)) => {
                warn!(error = %e, "Cache settings lookup failed, bypassing discovery cache");
                false
            }
            Err(_) => {
                warn!("Cache settings lookup timed out, bypassing discovery cache");
                false
            }
        }
    }

    pub async fn get(&self, query: &BusinessQuery, website_only: bool) -> Option<DiscoveryResult> {
        if !self.is_enabled().await {
            return None;
        }
        let hit: Option<DiscoveryResult> = self.inner.get_json(&Self::key(query, website_only)).await;
        if hit.is_some() {
            debug!(business = %query.name, website_only, "Discovery cache hit");
        }
        hit
    }

    pub async fn put(&self, query: &BusinessQuery, website_only: bool, result: &DiscoveryResult) {
        if !self.is_enabled().await {
            debug!(business = %query.name, "Discovery caching disabled, skipping write");
            return;
        }
        self.inner
            .set_json(&Self::key(query, website_only), result, self.ttl)
            .await;
    }

    pub async fn clear(&self) {
        self.inner.clear().await;
    }

    pub async fn len(&self) -> usize {
        self.inner.count().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub verification_entries: usize,
    pub discovery_entries: usize,
    pub discovery_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingStore, StalledStore};
    use std::collections::BTreeMap;

    fn query() -> BusinessQuery {
        BusinessQuery::new("Acme Cafe").with_address("London")
    }

    fn result() -> DiscoveryResult {
        DiscoveryResult::new("Acme Cafe", BTreeMap::new())
    }

    // --- MemoryStore ---

    #[tokio::test(start_paused = true)]
    async fn memory_store_expires_entries() {
        let store = MemoryStore::new();
        store.set("k", "v".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.count().await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn memory_store_overwrites_whole_entry() {
        let store = MemoryStore::new();
        store.set("k", "a".into(), Duration::from_secs(60)).await.unwrap();
        store.set("k", "b".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    // --- VerificationCache ---

    #[tokio::test(start_paused = true)]
    async fn verification_entries_expire_after_ttl() {
        let cache = VerificationCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(3600),
            Duration::from_millis(500),
        );
        cache
            .put(PlatformKey::Instagram, &query(), true, Some("https://www.instagram.com/acmecafe".into()))
            .await;
        let hit = cache.get(PlatformKey::Instagram, &query()).await.unwrap();
        assert!(hit.verified);
        assert!(cache.get(PlatformKey::Facebook, &query()).await.is_none());

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert!(cache.get(PlatformKey::Instagram, &query()).await.is_none());
    }

    #[tokio::test]
    async fn verification_key_uses_normalized_identity() {
        let cache = VerificationCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(3600),
            Duration::from_millis(500),
        );
        cache.put(PlatformKey::Tiktok, &query(), false, None).await;
        let same = BusinessQuery::new("  ACME   cafe").with_address("london ");
        assert_eq!(cache.get(PlatformKey::Tiktok, &same).await.map(|e| e.verified), Some(false));
    }

    // --- DiscoveryCache ---

    #[tokio::test]
    async fn discovery_cache_respects_toggle_at_read_and_write() {
        let toggle = Arc::new(CacheToggle::default());
        let cache = DiscoveryCache::new(
            Arc::new(MemoryStore::new()),
            toggle.clone(),
            Duration::from_secs(30 * 24 * 3600),
            Duration::from_millis(500),
        );

        cache.put(&query(), false, &result()).await;
        assert!(cache.get(&query(), false).await.is_some());

        toggle.set_enabled(false);
        assert!(cache.get(&query(), false).await.is_none());
        cache.put(&BusinessQuery::new("Other"), false, &result()).await;

        toggle.set_enabled(true);
        // Existing entry untouched, disabled write skipped.
        assert!(cache.get(&query(), false).await.is_some());
        assert!(cache.get(&BusinessQuery::new("Other"), false).await.is_none());
    }

    #[tokio::test]
    async fn website_only_results_use_separate_key() {
        let cache = DiscoveryCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(CacheToggle::default()),
            Duration::from_secs(60),
            Duration::from_millis(500),
        );
        cache.put(&query(), true, &result()).await;
        assert!(cache.get(&query(), true).await.is_some());
        assert!(cache.get(&query(), false).await.is_none());
    }

    #[tokio::test]
    async fn hinted_lookups_do_not_reuse_name_only_results() {
        let cache = DiscoveryCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(CacheToggle::default()),
            Duration::from_secs(60),
            Duration::from_millis(500),
        );
        cache.put(&query(), false, &result()).await;

        assert!(cache.get(&query().with_website("https://acme.example"), false).await.is_none());
        assert!(cache.get(&query().with_place_id("ChIJ123"), false).await.is_none());
        assert!(cache.get(&query(), false).await.is_some());
    }

    #[tokio::test]
    async fn broken_store_degrades_to_miss() {
        let cache = DiscoveryCache::new(
            Arc::new(FailingStore),
            Arc::new(CacheToggle::default()),
            Duration::from_secs(60),
            Duration::from_millis(500),
        );
        cache.put(&query(), false, &result()).await;
        assert!(cache.get(&query(), false).await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_times_out_to_miss() {
        let cache = VerificationCache::new(
            Arc::new(StalledStore),
            Duration::from_secs(60),
            Duration::from_millis(500),
        );
        cache.put(PlatformKey::Instagram, &query(), true, None).await;
        assert!(cache.get(PlatformKey::Instagram, &query()).await.is_none());
    }
}
