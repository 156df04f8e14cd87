pub mod cached;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::schema::{Schema, SchemaId};

/// Looks up schemas for token resolution.
/// Implementations: MemoryStore, PgStore, CachedResolver (wrapper).
#[async_trait]
pub trait SchemaResolver: Send + Sync {
    /// `Ok(None)` when no schema has this id. `Err` only when the backing
    /// source could not be queried.
    async fn schema_by_id(&self, id: SchemaId) -> anyhow::Result<Option<Schema>>;

    /// The schema used for the public token.
    async fn public_schema(&self) -> anyhow::Result<Schema>;
}

#[async_trait]
impl<T: SchemaResolver + ?Sized> SchemaResolver for Arc<T> {
    async fn schema_by_id(&self, id: SchemaId) -> anyhow::Result<Option<Schema>> {
        (**self).schema_by_id(id).await
    }

    async fn public_schema(&self) -> anyhow::Result<Schema> {
        (**self).public_schema().await
    }
}
