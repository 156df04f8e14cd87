//! In-process store for tests, demos and single-node setups without a database.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use subtle::ConstantTimeEq;

use super::TokenStore;
use crate::models::schema::{Schema, SchemaId};
use crate::models::token::{Token, TokenRecord};
use crate::models::validation::{TokenField, UniquenessValidator};
use crate::resolver::SchemaResolver;

#[derive(Clone)]
pub struct MemoryStore {
    tokens: Arc<DashMap<i64, TokenRecord>>,
    schemas: Arc<DashMap<SchemaId, Schema>>,
    next_token_id: Arc<AtomicI64>,
    next_schema_id: Arc<AtomicI64>,
    public_schema_id: SchemaId,
}

impl MemoryStore {
    /// Creates the store with an empty public schema named `public_schema_name`.
    pub fn new(public_schema_name: &str) -> Self {
        let store = Self {
            tokens: Arc::new(DashMap::new()),
            schemas: Arc::new(DashMap::new()),
            next_token_id: Arc::new(AtomicI64::new(1)),
            next_schema_id: Arc::new(AtomicI64::new(1)),
            public_schema_id: 0,
        };
        let public = store.insert_schema(Schema::public(public_schema_name));
        Self {
            public_schema_id: public.id.unwrap_or_default(),
            ..store
        }
    }

    /// Store `schema` under a fresh id and return the stored copy.
    pub fn insert_schema(&self, mut schema: Schema) -> Schema {
        let id = self.next_schema_id.fetch_add(1, Ordering::SeqCst);
        schema.id = Some(id);
        self.schemas.insert(id, schema.clone());
        schema
    }

    /// Replace a schema's scope. Returns false if the schema does not exist.
    pub fn update_scope(&self, id: SchemaId, scope: Vec<String>) -> bool {
        match self.schemas.get_mut(&id) {
            Some(mut schema) => {
                schema.scope = scope;
                true
            }
            None => false,
        }
    }

    pub fn remove_schema(&self, id: SchemaId) -> Option<Schema> {
        self.schemas.remove(&id).map(|(_, schema)| schema)
    }
}

fn field_value(record: &TokenRecord, field: TokenField) -> &str {
    match field {
        TokenField::Name => &record.name,
        TokenField::AccessToken => &record.access_token,
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn token_by_access_token(
        &self,
        access_token: &str,
    ) -> anyhow::Result<Option<TokenRecord>> {
        // compare against every entry; stopping at the match would leak its position
        let mut found = None;
        for entry in self.tokens.iter() {
            if bool::from(entry.access_token.as_bytes().ct_eq(access_token.as_bytes())) {
                found.get_or_insert_with(|| entry.value().clone());
            }
        }
        Ok(found)
    }

    async fn token_by_id(&self, id: i64) -> anyhow::Result<Option<TokenRecord>> {
        Ok(self.tokens.get(&id).map(|r| r.value().clone()))
    }

    async fn list_tokens(&self) -> anyhow::Result<Vec<TokenRecord>> {
        let mut records: Vec<TokenRecord> =
            self.tokens.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| (r.date_created, r.id));
        Ok(records)
    }

    async fn save_token(&self, token: &Token) -> anyhow::Result<TokenRecord> {
        anyhow::ensure!(!token.is_temporary, "temporary tokens cannot be persisted");

        let existing = match token.id {
            Some(id) => Some(
                self.tokens
                    .get(&id)
                    .map(|r| r.value().clone())
                    .ok_or_else(|| anyhow::anyhow!("token {} does not exist", id))?,
            ),
            None => None,
        };

        let (id, date_created) = match existing {
            Some(ref record) => (record.id, record.date_created),
            None => (
                self.next_token_id.fetch_add(1, Ordering::SeqCst),
                token.date_created.unwrap_or_else(Utc::now),
            ),
        };

        let record = TokenRecord {
            id,
            name: token.name.clone(),
            uid: token.uid,
            access_token: token.access_token.clone(),
            enabled: token.enabled,
            expiry_date: token.expiry_date,
            last_used: token.last_used,
            date_created,
            schema_id: token.schema_id(),
        };
        self.tokens.insert(id, record.clone());
        Ok(record)
    }

    async fn touch_token(&self, id: i64, used_at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(mut record) = self.tokens.get_mut(&id) {
            record.last_used = Some(used_at);
        }
        Ok(())
    }

    async fn delete_token(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.tokens.remove(&id).is_some())
    }
}

#[async_trait]
impl SchemaResolver for MemoryStore {
    async fn schema_by_id(&self, id: SchemaId) -> anyhow::Result<Option<Schema>> {
        Ok(self.schemas.get(&id).map(|s| s.value().clone()))
    }

    async fn public_schema(&self) -> anyhow::Result<Schema> {
        self.schemas
            .get(&self.public_schema_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| anyhow::anyhow!("public schema was removed"))
    }
}

#[async_trait]
impl UniquenessValidator for MemoryStore {
    async fn is_unique(
        &self,
        field: TokenField,
        value: &str,
        excluding: Option<i64>,
    ) -> anyhow::Result<bool> {
        let taken = self
            .tokens
            .iter()
            .any(|r| Some(r.id) != excluding && field_value(r.value(), field) == value);
        Ok(!taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_public_schema_exists_from_start() {
        let store = MemoryStore::new("Public Schema");
        let public = store.public_schema().await.unwrap();
        assert!(public.is_public);
        assert!(public.scope.is_empty());
        assert_eq!(store.schema_by_id(public.id.unwrap()).await.unwrap(), Some(public));
    }

    #[tokio::test]
    async fn test_access_token_lookup_among_many() {
        let store = MemoryStore::new("Public Schema");
        for i in 0..50 {
            let token = Token::builder(format!("Token {}", i), format!("access-{}", i)).build();
            store.save_token(&token).await.unwrap();
        }

        let found = store.token_by_access_token("access-17").await.unwrap().unwrap();
        assert_eq!(found.name, "Token 17");
        assert!(store.token_by_access_token("access-1").await.unwrap().is_some());
        assert!(store.token_by_access_token("access-").await.unwrap().is_none());
        assert!(store.token_by_access_token("access-170").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_schema_is_none() {
        let store = MemoryStore::new("Public Schema");
        assert!(store.schema_by_id(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_assigns_id_then_updates_in_place() {
        let store = MemoryStore::new("Public Schema");
        let mut token = Token::builder("Frontend", "abc123").schema_id(1).build();

        let saved = store.save_token(&token).await.unwrap();
        assert_eq!(saved.schema_id, Some(1));

        token.id = Some(saved.id);
        token.name = "Frontend v2".into();
        let updated = store.save_token(&token).await.unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.date_created, saved.date_created);
        assert_eq!(store.list_tokens().await.unwrap().len(), 1);
        assert_eq!(
            store.token_by_id(saved.id).await.unwrap().unwrap().name,
            "Frontend v2"
        );
    }

    #[tokio::test]
    async fn test_save_rejects_temporary_tokens() {
        let store = MemoryStore::new("Public Schema");
        let token = Token::builder("Preview", "tmp").temporary(true).build();
        assert!(store.save_token(&token).await.is_err());
        assert!(store.list_tokens().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_by_access_token() {
        let store = MemoryStore::new("Public Schema");
        store
            .save_token(&Token::builder("Frontend", "abc123").build())
            .await
            .unwrap();
        assert!(store.token_by_access_token("abc123").await.unwrap().is_some());
        assert!(store.token_by_access_token("abc12").await.unwrap().is_none());
        assert!(store.token_by_access_token("abc1234").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_is_unique_excludes_self() {
        let store = MemoryStore::new("Public Schema");
        let saved = store
            .save_token(&Token::builder("Frontend", "abc123").build())
            .await
            .unwrap();
        assert!(!store.is_unique(TokenField::Name, "Frontend", None).await.unwrap());
        assert!(store
            .is_unique(TokenField::Name, "Frontend", Some(saved.id))
            .await
            .unwrap());
        assert!(store.is_unique(TokenField::AccessToken, "other", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_touch_and_delete() {
        let store = MemoryStore::new("Public Schema");
        let saved = store
            .save_token(&Token::builder("Frontend", "abc123").build())
            .await
            .unwrap();
        let now = Utc::now();
        store.touch_token(saved.id, now).await.unwrap();
        assert_eq!(
            store.token_by_id(saved.id).await.unwrap().unwrap().last_used,
            Some(now)
        );
        assert!(store.delete_token(saved.id).await.unwrap());
        assert!(!store.delete_token(saved.id).await.unwrap());
    }
}
