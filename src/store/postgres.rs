//! Postgres-backed store over the existing `gqltokens` / `gqlschemas` tables.
//!
//! Table layout is owned elsewhere; this module only reads and writes rows.
//! Timestamps are stored as UTC `timestamp without time zone`, uids as text.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::TokenStore;
use crate::errors::AppError;
use crate::models::schema::{Schema, SchemaId};
use crate::models::token::{Token, TokenRecord};
use crate::models::validation::{TokenField, UniquenessValidator};
use crate::resolver::SchemaResolver;

const TOKEN_COLUMNS: &str = r#"id::BIGINT AS id, name, uid, "accessToken" AS access_token, enabled,
    "expiryDate" AS expiry_date, "lastUsed" AS last_used,
    "dateCreated" AS date_created, "schemaId"::BIGINT AS schema_id"#;

const SCHEMA_COLUMNS: &str = r#"id::BIGINT AS id, uid, name, scope, "isPublic" AS is_public"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    public_schema_name: String,
}

impl PgStore {
    pub async fn connect(database_url: &str, public_schema_name: &str) -> Result<Self, AppError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::with_pool(pool, public_schema_name))
    }

    pub fn with_pool(pool: PgPool, public_schema_name: &str) -> Self {
        Self {
            pool,
            public_schema_name: public_schema_name.to_string(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn create_public_schema(&self) -> anyhow::Result<Schema> {
        let schema = Schema::public(self.public_schema_name.as_str());
        let now = Utc::now().naive_utc();
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO gqlschemas (name, scope, "isPublic", "dateCreated", "dateUpdated", uid)
               VALUES ($1, $2, true, $3, $3, $4)
               RETURNING id::BIGINT"#,
        )
        .bind(&schema.name)
        .bind(Json(&schema.scope))
        .bind(now)
        .bind(schema.uid.to_string())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(schema_id = id, name = %schema.name, "created public schema");
        Ok(schema.with_id(id))
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    name: String,
    uid: String,
    access_token: String,
    enabled: bool,
    expiry_date: Option<NaiveDateTime>,
    last_used: Option<NaiveDateTime>,
    date_created: NaiveDateTime,
    schema_id: Option<i64>,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = anyhow::Error;

    fn try_from(row: TokenRow) -> anyhow::Result<Self> {
        Ok(TokenRecord {
            id: row.id,
            name: row.name,
            uid: Uuid::parse_str(&row.uid)?,
            access_token: row.access_token,
            enabled: row.enabled,
            expiry_date: row.expiry_date.map(|d| d.and_utc()),
            last_used: row.last_used.map(|d| d.and_utc()),
            date_created: row.date_created.and_utc(),
            schema_id: row.schema_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SchemaRow {
    id: i64,
    uid: String,
    name: String,
    scope: Option<Json<Vec<String>>>,
    is_public: bool,
}

impl TryFrom<SchemaRow> for Schema {
    type Error = anyhow::Error;

    fn try_from(row: SchemaRow) -> anyhow::Result<Self> {
        Ok(Schema {
            id: Some(row.id),
            uid: Uuid::parse_str(&row.uid)?,
            name: row.name,
            scope: row.scope.map(|Json(scope)| scope).unwrap_or_default(),
            is_public: row.is_public,
        })
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn token_by_access_token(
        &self,
        access_token: &str,
    ) -> anyhow::Result<Option<TokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            r#"SELECT {TOKEN_COLUMNS} FROM gqltokens WHERE "accessToken" = $1"#
        ))
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TokenRecord::try_from).transpose()
    }

    async fn token_by_id(&self, id: i64) -> anyhow::Result<Option<TokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM gqltokens WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TokenRecord::try_from).transpose()
    }

    async fn list_tokens(&self) -> anyhow::Result<Vec<TokenRecord>> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            r#"SELECT {TOKEN_COLUMNS} FROM gqltokens ORDER BY "dateCreated" ASC, id ASC"#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TokenRecord::try_from).collect()
    }

    async fn save_token(&self, token: &Token) -> anyhow::Result<TokenRecord> {
        anyhow::ensure!(!token.is_temporary, "temporary tokens cannot be persisted");

        let now = Utc::now().naive_utc();
        let row = match token.id {
            Some(id) => sqlx::query_as::<_, TokenRow>(&format!(
                r#"UPDATE gqltokens
                   SET name = $2, "accessToken" = $3, enabled = $4, "expiryDate" = $5,
                       "lastUsed" = $6, "schemaId" = $7, "dateUpdated" = $8
                   WHERE id = $1
                   RETURNING {TOKEN_COLUMNS}"#
            ))
            .bind(id)
            .bind(&token.name)
            .bind(&token.access_token)
            .bind(token.enabled)
            .bind(token.expiry_date.map(|d| d.naive_utc()))
            .bind(token.last_used.map(|d| d.naive_utc()))
            .bind(token.schema_id())
            .bind(now)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| anyhow::anyhow!("token {} does not exist", id))?,
            None => sqlx::query_as::<_, TokenRow>(&format!(
                r#"INSERT INTO gqltokens
                   (name, "accessToken", enabled, "expiryDate", "lastUsed", "schemaId",
                    "dateCreated", "dateUpdated", uid)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
                   RETURNING {TOKEN_COLUMNS}"#
            ))
            .bind(&token.name)
            .bind(&token.access_token)
            .bind(token.enabled)
            .bind(token.expiry_date.map(|d| d.naive_utc()))
            .bind(token.last_used.map(|d| d.naive_utc()))
            .bind(token.schema_id())
            .bind(token.date_created.map(|d| d.naive_utc()).unwrap_or(now))
            .bind(token.uid.to_string())
            .fetch_one(&self.pool)
            .await?,
        };

        TokenRecord::try_from(row)
    }

    async fn touch_token(&self, id: i64, used_at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE gqltokens SET "lastUsed" = $2 WHERE id = $1"#)
            .bind(id)
            .bind(used_at.naive_utc())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_token(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM gqltokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SchemaResolver for PgStore {
    async fn schema_by_id(&self, id: SchemaId) -> anyhow::Result<Option<Schema>> {
        let row = sqlx::query_as::<_, SchemaRow>(&format!(
            "SELECT {SCHEMA_COLUMNS} FROM gqlschemas WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Schema::try_from).transpose()
    }

    /// Returns the public schema, creating an empty one the first time.
    async fn public_schema(&self) -> anyhow::Result<Schema> {
        let row = sqlx::query_as::<_, SchemaRow>(&format!(
            r#"SELECT {SCHEMA_COLUMNS} FROM gqlschemas WHERE "isPublic" = true ORDER BY id LIMIT 1"#
        ))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Schema::try_from(row),
            None => self.create_public_schema().await,
        }
    }
}

#[async_trait]
impl UniquenessValidator for PgStore {
    async fn is_unique(
        &self,
        field: TokenField,
        value: &str,
        excluding: Option<i64>,
    ) -> anyhow::Result<bool> {
        let column = match field {
            TokenField::Name => "name",
            TokenField::AccessToken => r#""accessToken""#,
        };
        let taken = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM gqltokens WHERE {column} = $1 AND ($2::BIGINT IS NULL OR id <> $2))"
        ))
        .bind(value)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await?;

        Ok(!taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_database_url_is_a_database_error() {
        let err = PgStore::connect("not-a-url", "Public Schema")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(err.code(), "internal_server_error");
    }
}
