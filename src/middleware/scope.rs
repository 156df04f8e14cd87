use uuid::Uuid;

use crate::errors::AppError;
use crate::models::token::Token;

/// Scope-based access control.
/// Format: "resource:action" (e.g., "sections.news:read", "usergroups.everyone:read")
pub fn check_scope(scopes: &[String], required_scope: &str) -> bool {
    // Wildcard scope grants all access
    if scopes.iter().any(|s| s == "*") {
        return true;
    }

    // Direct match
    if scopes.iter().any(|s| s == required_scope) {
        return true;
    }

    // Resource wildcard (e.g., "sections.news:*" matches "sections.news:read")
    if let Some((resource, _)) = required_scope.rsplit_once(':') {
        let resource_wildcard = format!("{}:*", resource);
        if scopes.iter().any(|s| s == &resource_wildcard) {
            return true;
        }
    }

    false
}

/// What an authorized token may do. Built once per request.
#[derive(Debug, Clone)]
pub struct ScopeContext {
    pub token_name: String,
    pub token_uid: Uuid,
    pub is_public: bool,
    /// Empty when the token has no schema.
    pub scope: Vec<String>,
}

impl ScopeContext {
    pub fn new(token: &Token, scope: Option<&[String]>) -> Self {
        Self {
            token_name: token.name.clone(),
            token_uid: token.uid,
            is_public: token.is_public(),
            scope: scope.map(<[String]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn has_scope(&self, required_scope: &str) -> bool {
        check_scope(&self.scope, required_scope)
    }

    /// Returns `ScopeDenied` if the scope is missing.
    pub fn require(&self, required_scope: &str) -> Result<(), AppError> {
        if self.has_scope(required_scope) {
            return Ok(());
        }

        tracing::warn!(
            token = %self.token_name,
            token_uid = %self.token_uid,
            public = self.is_public,
            scope = required_scope,
            "scope denied"
        );
        Err(AppError::ScopeDenied {
            scope: required_scope.to_string(),
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────
