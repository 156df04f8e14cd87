pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::token::{Token, TokenRecord};
use crate::models::validation::{TokenField, UniquenessValidator};
use crate::resolver::SchemaResolver;

/// Persistence for tokens. Owns `id`, `uid`, `date_created` and `last_used`.
/// Implementations: MemoryStore (DashMap), PgStore (Postgres).
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn token_by_access_token(&self, access_token: &str)
        -> anyhow::Result<Option<TokenRecord>>;

    async fn token_by_id(&self, id: i64) -> anyhow::Result<Option<TokenRecord>>;

    /// All tokens, oldest first.
    async fn list_tokens(&self) -> anyhow::Result<Vec<TokenRecord>>;

    /// Insert when `token.id` is `None`, update otherwise. Temporary tokens
    /// are rejected.
    async fn save_token(&self, token: &Token) -> anyhow::Result<TokenRecord>;

    async fn touch_token(&self, id: i64, used_at: DateTime<Utc>) -> anyhow::Result<()>;

    async fn delete_token(&self, id: i64) -> anyhow::Result<bool>;
}

#[async_trait]
impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    async fn token_by_access_token(
        &self,
        access_token: &str,
    ) -> anyhow::Result<Option<TokenRecord>> {
        (**self).token_by_access_token(access_token).await
    }

    async fn token_by_id(&self, id: i64) -> anyhow::Result<Option<TokenRecord>> {
        (**self).token_by_id(id).await
    }

    async fn list_tokens(&self) -> anyhow::Result<Vec<TokenRecord>> {
        (**self).list_tokens().await
    }

    async fn save_token(&self, token: &Token) -> anyhow::Result<TokenRecord> {
        (**self).save_token(token).await
    }

    async fn touch_token(&self, id: i64, used_at: DateTime<Utc>) -> anyhow::Result<()> {
        (**self).touch_token(id, used_at).await
    }

    async fn delete_token(&self, id: i64) -> anyhow::Result<bool> {
        (**self).delete_token(id).await
    }
}

#[async_trait]
impl<T: UniquenessValidator + ?Sized> UniquenessValidator for Arc<T> {
    async fn is_unique(
        &self,
        field: TokenField,
        value: &str,
        excluding: Option<i64>,
    ) -> anyhow::Result<bool> {
        (**self).is_unique(field, value, excluding).await
    }
}

/// A store that can back every collaborator token resolution needs.
pub trait Backend: TokenStore + SchemaResolver + UniquenessValidator {}

impl<T: TokenStore + SchemaResolver + UniquenessValidator> Backend for T {}
