use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::SchemaResolver;
use crate::models::schema::{Schema, SchemaId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CacheKey {
    Id(SchemaId),
    Public,
}

/// Entry stored in the local DashMap with an expiry timestamp.
#[derive(Clone)]
struct CacheEntry {
    schema: Schema,
    expires_at: Instant,
}

/// In-memory TTL cache in front of another resolver.
///
/// Only hits are cached: a missing schema is looked up again on the next
/// call, and resolver failures pass straight through. Expired entries are
/// evicted lazily on read; `evict_expired()` sweeps the rest.
#[derive(Clone)]
pub struct CachedResolver<R> {
    inner: R,
    local: Arc<DashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl<R: SchemaResolver> CachedResolver<R> {
    /// A zero `ttl` disables caching.
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            local: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn get(&self, key: CacheKey) -> Option<Schema> {
        if let Some(entry) = self.local.get(&key) {
            if Instant::now() < entry.expires_at {
                return Some(entry.schema.clone());
            }
            // expired — drop the ref before removing
            drop(entry);
            self.local.remove(&key);
        }
        None
    }

    fn put(&self, key: CacheKey, schema: &Schema) {
        if self.ttl.is_zero() {
            return;
        }
        self.local.insert(
            key,
            CacheEntry {
                schema: schema.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop a cached schema, e.g. after its scope was edited.
    pub fn invalidate(&self, id: SchemaId) {
        self.local.remove(&CacheKey::Id(id));
    }

    pub fn invalidate_public(&self) {
        self.local.remove(&CacheKey::Public);
    }

    /// Remove all expired entries. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.local.len();
        self.local.retain(|_, entry| entry.expires_at > now);
        // other tasks may insert between the two reads
        before.saturating_sub(self.local.len())
    }

    /// Current number of cached schemas (for debugging).
    pub fn local_len(&self) -> usize {
        self.local.len()
    }
}

#[async_trait]
impl<R: SchemaResolver> SchemaResolver for CachedResolver<R> {
    async fn schema_by_id(&self, id: SchemaId) -> anyhow::Result<Option<Schema>> {
        if let Some(schema) = self.get(CacheKey::Id(id)) {
            return Ok(Some(schema));
        }

        let schema = self.inner.schema_by_id(id).await?;
        if let Some(ref s) = schema {
            self.put(CacheKey::Id(id), s);
        }
        Ok(schema)
    }

    async fn public_schema(&self) -> anyhow::Result<Schema> {
        if let Some(schema) = self.get(CacheKey::Public) {
            return Ok(schema);
        }

        let schema = self.inner.public_schema().await?;
        self.put(CacheKey::Public, &schema);
        Ok(schema)
    }
}
