//! Response cache for upstream GET requests.
//!
//! The Jira client is handed a [`ResponseCache`] at construction. Entries are
//! raw response bodies keyed by request URL, each with its own TTL.

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Arc<str>>;
    async fn set(&self, key: String, body: Arc<str>, ttl: Duration);
}

#[derive(Clone)]
struct CachedBody {
    body: Arc<str>,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, CachedBody> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedBody,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedBody,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory [`ResponseCache`] backed by moka.
#[derive(Clone)]
pub struct MokaResponseCache {
    cache: Cache<String, CachedBody>,
}

impl MokaResponseCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache }
    }
}

#[async_trait]
impl ResponseCache for MokaResponseCache {
    async fn get(&self, key: &str) -> Option<Arc<str>> {
        self.cache.get(key).await.map(|entry| entry.body)
    }

    async fn set(&self, key: String, body: Arc<str>, ttl: Duration) {
        self.cache.insert(key, CachedBody { body, ttl }).await;
    }
}
