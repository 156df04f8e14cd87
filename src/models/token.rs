//! GraphQL access token and its lazily-resolved schema scope.
//!
//! A token reaches its schema one of three ways (see [`SchemaSource`]).
//! Whatever the route, the lookup happens at most once per `Token`
//! instance and the scope is memoized alongside it. Callers that need
//! fresh schema data build a new `Token`.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::schema::{Schema, SchemaId};
use crate::models::validation::{TokenField, UniquenessValidator, ValidationErrors};
use crate::resolver::SchemaResolver;

/// Access token value reserved for the public token. Issued to clients as-is.
pub const PUBLIC_TOKEN: &str = "__PUBLIC__";

/// Name given to freshly built public tokens.
pub const PUBLIC_TOKEN_NAME: &str = "Public Token";

/// Where a token gets its schema from.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
    /// Attached at construction. Never looked up.
    Direct(Schema),
    /// Looked up through a [`SchemaResolver`] on first use.
    Deferred(SchemaId),
    /// No schema; the token has no scope.
    Detached,
}

/// Loosely-typed token fields, as they arrive from config or an API body.
///
/// If `schema` is set it takes over and `schema_id` is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenConfig {
    pub id: Option<i64>,
    pub name: String,
    pub uid: Option<Uuid>,
    pub access_token: String,
    pub enabled: Option<bool>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub date_created: Option<DateTime<Utc>>,
    pub schema_id: Option<SchemaId>,
    pub schema: Option<Schema>,
    pub is_temporary: bool,
}

/// A persisted token row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub id: i64,
    pub name: String,
    pub uid: Uuid,
    pub access_token: String,
    pub enabled: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub date_created: DateTime<Utc>,
    pub schema_id: Option<SchemaId>,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub id: Option<i64>,
    pub name: String,
    pub uid: Uuid,
    pub access_token: String,
    pub enabled: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub date_created: Option<DateTime<Utc>>,
    /// Temporary tokens are never written to a store.
    pub is_temporary: bool,
    source: SchemaSource,
    /// Outcome of the deferred lookup, once performed.
    resolved: Option<Option<Schema>>,
    /// Memoized scope. `Some(None)` means "resolved, no schema".
    scope: Option<Option<Vec<String>>>,
}

impl Token {
    pub fn builder(name: impl Into<String>, access_token: impl Into<String>) -> TokenBuilder {
        TokenBuilder::new(name.into(), access_token.into())
    }

    pub fn from_config(config: TokenConfig) -> Self {
        let source = match (config.schema, config.schema_id) {
            (Some(schema), _) => SchemaSource::Direct(schema),
            (None, Some(id)) => SchemaSource::Deferred(id),
            (None, None) => SchemaSource::Detached,
        };

        Self {
            id: config.id,
            name: config.name,
            uid: config.uid.unwrap_or_else(Uuid::new_v4),
            access_token: config.access_token,
            enabled: config.enabled.unwrap_or(true),
            expiry_date: config.expiry_date,
            last_used: config.last_used,
            date_created: config.date_created,
            is_temporary: config.is_temporary,
            source,
            resolved: None,
            scope: None,
        }
    }

    /// A temporary public token running under `schema`.
    pub fn public(schema: Schema) -> Self {
        Self::builder(PUBLIC_TOKEN_NAME, PUBLIC_TOKEN)
            .schema(schema)
            .temporary(true)
            .build()
    }

    pub fn is_public(&self) -> bool {
        self.access_token == PUBLIC_TOKEN
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    /// Schema id to persist: the attached schema's id, or the deferred one.
    pub fn schema_id(&self) -> Option<SchemaId> {
        match &self.source {
            SchemaSource::Direct(schema) => schema.id,
            SchemaSource::Deferred(id) => Some(*id),
            SchemaSource::Detached => None,
        }
    }

    /// Resolve this token's schema, looking it up at most once.
    ///
    /// A missing schema is `Ok(None)` and is memoized like a hit. A resolver
    /// failure is returned as `ResolverUnavailable` and not memoized.
    pub async fn schema<R>(&mut self, resolver: &R) -> Result<Option<&Schema>, AppError>
    where
        R: SchemaResolver + ?Sized,
    {
        if let SchemaSource::Deferred(id) = self.source {
            if self.resolved.is_none() {
                tracing::debug!(schema_id = id, token = %self.name, "resolving token schema");
                let schema = resolver
                    .schema_by_id(id)
                    .await
                    .map_err(AppError::ResolverUnavailable)?;
                if schema.is_none() {
                    tracing::debug!(schema_id = id, token = %self.name, "token schema not found");
                }
                self.resolved = Some(schema);
            }
        }

        Ok(self.current_schema())
    }

    fn current_schema(&self) -> Option<&Schema> {
        match &self.source {
            SchemaSource::Direct(schema) => Some(schema),
            SchemaSource::Deferred(_) => self.resolved.as_ref().and_then(Option::as_ref),
            SchemaSource::Detached => None,
        }
    }

    /// The permissions this token grants, or `None` if it has no schema.
    /// Computed once; empty scopes are memoized too.
    pub async fn scope<R>(&mut self, resolver: &R) -> Result<Option<&[String]>, AppError>
    where
        R: SchemaResolver + ?Sized,
    {
        if self.scope.is_none() {
            let scope = self.schema(resolver).await?.map(|s| s.scope.clone());
            self.scope = Some(scope);
        }

        Ok(self.scope.as_ref().and_then(|s| s.as_deref()))
    }

    /// Check required fields, then ask `validator` whether name and access
    /// token are free. All failures are collected before returning.
    pub async fn validate<V>(&self, validator: &V) -> Result<(), AppError>
    where
        V: UniquenessValidator + ?Sized,
    {
        let mut errors = ValidationErrors::default();

        for (field, value) in [
            (TokenField::Name, self.name.as_str()),
            (TokenField::AccessToken, self.access_token.as_str()),
        ] {
            if value.trim().is_empty() {
                errors.add(field, field.required_message());
                continue;
            }
            if !validator.is_unique(field, value, self.id).await? {
                errors.add(field, field.taken_message(value));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    /// Expired once `now` reaches the expiry date.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= now)
    }

    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.enabled {
            return Err(AppError::TokenDisabled);
        }
        if self.is_expired(now) {
            return Err(AppError::TokenExpired);
        }
        Ok(())
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.last_used = Some(now);
    }
}

impl From<TokenRecord> for TokenConfig {
    fn from(record: TokenRecord) -> Self {
        TokenConfig {
            id: Some(record.id),
            name: record.name,
            uid: Some(record.uid),
            access_token: record.access_token,
            enabled: Some(record.enabled),
            expiry_date: record.expiry_date,
            last_used: record.last_used,
            date_created: Some(record.date_created),
            schema_id: record.schema_id,
            schema: None,
            is_temporary: false,
        }
    }
}

impl From<TokenRecord> for Token {
    fn from(record: TokenRecord) -> Self {
        Token::from_config(record.into())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Typed alternative to [`TokenConfig`].
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    config: TokenConfig,
    source: SchemaSource,
}

impl TokenBuilder {
    fn new(name: String, access_token: String) -> Self {
        Self {
            config: TokenConfig {
                name,
                access_token,
                ..Default::default()
            },
            source: SchemaSource::Detached,
        }
    }

    pub fn id(mut self, id: i64) -> Self {
        self.config.id = Some(id);
        self
    }

    pub fn uid(mut self, uid: Uuid) -> Self {
        self.config.uid = Some(uid);
        self
    }

    /// Attach a schema directly. Replaces any schema id.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.source = SchemaSource::Direct(schema);
        self
    }

    /// Defer to a resolver lookup. Ignored once a schema is attached.
    pub fn schema_id(mut self, id: SchemaId) -> Self {
        if !matches!(self.source, SchemaSource::Direct(_)) {
            self.source = SchemaSource::Deferred(id);
        }
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = Some(enabled);
        self
    }

    pub fn expiry_date(mut self, expiry: DateTime<Utc>) -> Self {
        self.config.expiry_date = Some(expiry);
        self
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.config.is_temporary = temporary;
        self
    }

    pub fn build(self) -> Token {
        let mut config = self.config;
        match self.source {
            SchemaSource::Direct(schema) => config.schema = Some(schema),
            SchemaSource::Deferred(id) => config.schema_id = Some(id),
            SchemaSource::Detached => {}
        }
        Token::from_config(config)
    }
}

/// Random alphanumeric access token of `len` characters.
pub fn generate_access_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn blog_schema() -> Schema {
        Schema::new("Blog", vec!["sections.blog:read".into()]).with_id(3)
    }

    #[test]
    fn test_config_schema_discards_schema_id() {
        let token = Token::from_config(TokenConfig {
            name: "Frontend".into(),
            access_token: "abc123".into(),
            schema: Some(blog_schema()),
            schema_id: Some(99),
            ..Default::default()
        });
        assert_eq!(token.source(), &SchemaSource::Direct(blog_schema()));
        assert_eq!(token.schema_id(), Some(3));
    }

    #[test]
    fn test_config_without_schema_keeps_schema_id() {
        let token = Token::from_config(TokenConfig {
            name: "Frontend".into(),
            access_token: "abc123".into(),
            schema_id: Some(7),
            ..Default::default()
        });
        assert_eq!(token.source(), &SchemaSource::Deferred(7));
        assert!(token.enabled);
    }

    #[test]
    fn test_config_deserializes_camel_case() {
        let config: TokenConfig = serde_json::from_value(serde_json::json!({
            "name": "Frontend",
            "accessToken": "abc123",
            "schemaId": 7,
            "enabled": false,
        }))
        .unwrap();
        let token = Token::from_config(config);
        assert_eq!(token.access_token, "abc123");
        assert_eq!(token.schema_id(), Some(7));
        assert!(!token.enabled);
    }

    #[test]
    fn test_builder_schema_wins_regardless_of_order() {
        let before = Token::builder("a", "t1").schema_id(9).schema(blog_schema()).build();
        let after = Token::builder("a", "t1").schema(blog_schema()).schema_id(9).build();
        assert!(matches!(before.source(), SchemaSource::Direct(_)));
        assert!(matches!(after.source(), SchemaSource::Direct(_)));
    }

    #[test]
    fn test_is_public_only_checks_access_token() {
        assert!(Token::builder("x", PUBLIC_TOKEN).build().is_public());
        assert!(Token::builder("x", PUBLIC_TOKEN).schema_id(4).build().is_public());
        assert!(!Token::builder("x", "__public__").build().is_public());
        assert!(!Token::builder("x", "abc123").schema(Schema::public("P")).build().is_public());
    }

    #[test]
    fn test_public_token_is_temporary() {
        let token = Token::public(Schema::public("Public Schema"));
        assert!(token.is_public());
        assert!(token.is_temporary);
        assert_eq!(token.name, PUBLIC_TOKEN_NAME);
    }

    #[test]
    fn test_config_bag_accepts_inline_schema_without_uid() {
        let config: TokenConfig = serde_json::from_value(serde_json::json!({
            "name": "Frontend",
            "accessToken": "abc123",
            "schemaId": 9,
            "schema": { "id": 3, "name": "Blog", "scope": ["sections.blog:read"] }
        }))
        .unwrap();

        let token = Token::from_config(config);
        match token.source() {
            SchemaSource::Direct(schema) => {
                assert_eq!(schema.id, Some(3));
                assert_eq!(schema.scope, vec!["sections.blog:read".to_string()]);
                assert!(!schema.uid.is_nil());
            }
            other => panic!("expected a direct schema, got {:?}", other),
        }
        assert_eq!(token.schema_id(), Some(3));
    }

    #[test]
    fn test_display_is_name() {
        let token = Token::builder("Mobile app", "abc123").build();
        assert_eq!(token.to_string(), "Mobile app");
    }

    #[test]
    fn test_record_hydrates_deferred_source() {
        let now = Utc::now();
        let token = Token::from(TokenRecord {
            id: 12,
            name: "Frontend".into(),
            uid: Uuid::new_v4(),
            access_token: "abc123".into(),
            enabled: true,
            expiry_date: None,
            last_used: None,
            date_created: now,
            schema_id: Some(5),
        });
        assert_eq!(token.id, Some(12));
        assert_eq!(token.source(), &SchemaSource::Deferred(5));
        assert!(!token.is_temporary);
    }

    #[test]
    fn test_expiry_and_enabled_checks() {
        let now = Utc::now();
        let live = Token::builder("a", "t").expiry_date(now + Duration::hours(1)).build();
        assert!(live.check_usable(now).is_ok());

        let expired = Token::builder("a", "t").expiry_date(now).build();
        assert!(expired.is_expired(now));
        assert!(matches!(expired.check_usable(now), Err(AppError::TokenExpired)));

        let disabled = Token::builder("a", "t").enabled(false).build();
        assert!(matches!(disabled.check_usable(now), Err(AppError::TokenDisabled)));
    }

    #[test]
    fn test_generate_access_token() {
        let a = generate_access_token(32);
        let b = generate_access_token(32);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
