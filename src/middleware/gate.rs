//! Resolves an incoming access token to the scope it may use.
//!
//! Flow: look up the token (or build the public one), reject disabled or
//! expired tokens, resolve the schema scope, then record usage.

use chrono::Utc;

use super::scope::ScopeContext;
use crate::errors::AppError;
use crate::models::token::{Token, TokenConfig, PUBLIC_TOKEN};
use crate::models::validation::UniquenessValidator;
use crate::resolver::SchemaResolver;
use crate::store::TokenStore;

pub struct TokenGate<R, S> {
    resolver: R,
    store: S,
}

impl<R, S> TokenGate<R, S>
where
    R: SchemaResolver,
    S: TokenStore + UniquenessValidator,
{
    pub fn new(resolver: R, store: S) -> Self {
        Self { resolver, store }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The public token, always running under the public schema. Falls back
    /// to a temporary token when none has been stored.
    pub async fn public_token(&self) -> Result<Token, AppError> {
        let schema = self
            .resolver
            .public_schema()
            .await
            .map_err(AppError::ResolverUnavailable)?;

        match self.store.token_by_access_token(PUBLIC_TOKEN).await? {
            Some(record) => {
                let mut config = TokenConfig::from(record);
                config.schema = Some(schema);
                Ok(Token::from_config(config))
            }
            None => {
                tracing::debug!("no stored public token, using a temporary one");
                Ok(Token::public(schema))
            }
        }
    }

    /// Load the token for `access_token`. Does not check whether it is usable.
    pub async fn token(&self, access_token: &str) -> Result<Token, AppError> {
        if access_token == PUBLIC_TOKEN {
            return self.public_token().await;
        }

        let record = self
            .store
            .token_by_access_token(access_token)
            .await?
            .ok_or(AppError::TokenNotFound)?;
        Ok(Token::from(record))
    }

    pub async fn authorize(&self, access_token: &str) -> Result<ScopeContext, AppError> {
        let mut token = self.token(access_token).await?;
        let now = Utc::now();

        if let Err(e) = token.check_usable(now) {
            tracing::warn!(token = %token, uid = %token.uid, code = e.code(), "token rejected");
            return Err(e);
        }

        let scope = token.scope(&self.resolver).await?.map(<[String]>::to_vec);

        // usage is only recorded once the scope resolved; a failed touch is
        // logged, not returned
        match token.id {
            Some(id) if !token.is_temporary => match self.store.touch_token(id, now).await {
                Ok(()) => token.mark_used(now),
                Err(e) => tracing::error!(token_id = id, "failed to record token usage: {}", e),
            },
            _ => {}
        }

        let ctx = ScopeContext::new(&token, scope.as_deref());
        tracing::debug!(
            token = %ctx.token_name,
            public = ctx.is_public,
            permissions = ctx.scope.len(),
            "token authorized"
        );
        Ok(ctx)
    }

    /// Authorize `access_token` and require `required_scope` in one step.
    pub async fn require(
        &self,
        access_token: &str,
        required_scope: &str,
    ) -> Result<ScopeContext, AppError> {
        let ctx = self.authorize(access_token).await?;
        ctx.require(required_scope)?;
        Ok(ctx)
    }

    /// Validate and persist. Temporary tokens are left untouched.
    pub async fn save(&self, token: &mut Token) -> Result<(), AppError> {
        if token.is_temporary {
            tracing::debug!(token = %token, "skipping save of temporary token");
            return Ok(());
        }

        token.validate(&self.store).await?;
        let record = self.store.save_token(token).await?;
        token.id = Some(record.id);
        token.date_created = Some(record.date_created);
        tracing::info!(token_id = record.id, name = %record.name, "token saved");
        Ok(())
    }
}
