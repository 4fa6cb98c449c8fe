//! Result cache
//!
//! Memoizes `(normalized query, filters, page) -> ResultPage`. Entries expire
//! a fixed TTL after the page was fetched and the cache is capacity bounded
//! with LRU eviction. Pages are stored behind `Arc` so readers share one
//! immutable copy.

use crate::query::Query;
use crate::results::ResultPage;
use crate::search::Filters;
use chrono::Utc;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Key of one cached page
///
/// Equality and hashing only look at the normalized query, the filters and
/// the page number. `text` keeps the query as typed for prefix invalidation.
#[derive(Debug, Clone)]
pub struct CacheKey {
    /// Canonical text of the normalized query
    pub query: String,
    pub filters: Filters,
    pub page: u32,
    /// Lower-cased query in input term order
    pub text: String,
}

impl CacheKey {
    pub fn new(query: &Query, filters: &Filters, page: u32) -> Self {
        Self {
            query: query.normalize().raw_text,
            filters: filters.clone(),
            page,
            text: typed_form(query),
        }
    }

    /// Short stable digest for log lines
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.query.as_bytes());
        hasher.update(self.filters.summary().as_bytes());
        hasher.update(self.page.to_string().as_bytes());

        let hex = format!("{:x}", hasher.finalize());
        hex[..12].to_string()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query && self.filters == other.filters && self.page == other.page
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query.hash(state);
        self.filters.hash(state);
        self.page.hash(state);
    }
}

fn typed_form(query: &Query) -> String {
    query.to_query_string().to_lowercase()
}

#[derive(Clone)]
struct CacheEntry {
    page: Arc<ResultPage>,
    ttl: Duration,
    /// Time left until expiry when the entry was written
    remaining: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        let age = (Utc::now() - self.page.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age >= self.ttl
    }
}

struct PageExpiry;

impl Expiry<CacheKey, CacheEntry> for PageExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.remaining)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.remaining)
    }
}

/// Cache for search result pages
pub struct ResultCache {
    cache: Cache<CacheKey, CacheEntry>,
}

impl ResultCache {
    /// Create a new result cache holding at most `max_entries` pages
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(PageExpiry)
            .build();

        Self { cache }
    }

    /// Get a cached page. Expired entries count as a miss and are dropped.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<ResultPage>> {
        let entry = self.cache.get(key).await?;
        if entry.is_expired() {
            debug!("Cache entry {} expired", key.digest());
            self.cache.invalidate(key).await;
            return None;
        }
        Some(entry.page)
    }

    /// Store a page. `ttl` is measured from the page's `fetched_at`; a page
    /// that is already older than `ttl` is not stored.
    pub async fn put(&self, key: CacheKey, page: Arc<ResultPage>, ttl: Duration) {
        let age = (Utc::now() - page.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let Some(remaining) = ttl.checked_sub(age).filter(|r| !r.is_zero()) else {
            debug!("Not caching stale page {}", key.digest());
            return;
        };

        self.cache
            .insert(
                key,
                CacheEntry {
                    page,
                    ttl,
                    remaining,
                },
            )
            .await;
    }

    /// Drop every page whose query, as typed and case-folded, starts with
    /// `query_prefix`. Returns the number of pages dropped.
    pub async fn invalidate(&self, query_prefix: &str) -> usize {
        let prefix = typed_form(&Query::parse(query_prefix));
        self.drop_where(|key| key.text.starts_with(&prefix)).await
    }

    /// Drop every cached page of `query`, across all pages and filters.
    /// Other queries are left alone, even when they share a prefix.
    pub async fn invalidate_query(&self, query: &Query) -> usize {
        let canonical = query.normalize().raw_text;
        self.drop_where(|key| key.query == canonical).await
    }

    async fn drop_where(&self, matches: impl Fn(&CacheKey) -> bool) -> usize {
        let keys: Vec<Arc<CacheKey>> = self
            .cache
            .iter()
            .filter(|(key, _)| matches(key.as_ref()))
            .map(|(key, _)| key)
            .collect();

        for key in &keys {
            self.cache.invalidate(key.as_ref()).await;
        }
        debug!("Invalidated {} cached pages", keys.len());
        keys.len()
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of cached pages
    pub fn size(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending evictions; used before reading `size`
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(256)
    }
}
