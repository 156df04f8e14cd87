use serde_json::json;
use thiserror::Error;

use crate::models::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("token not found")]
    TokenNotFound,

    #[error("token disabled")]
    TokenDisabled,

    #[error("token expired")]
    TokenExpired,

    #[error("scope denied: {scope}")]
    ScopeDenied { scope: String },

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The resolver could not be reached. Distinct from a schema that does
    /// not exist, which resolves to `None`.
    #[error("schema resolver unavailable: {0}")]
    ResolverUnavailable(anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::TokenNotFound => "token_not_found",
            AppError::TokenDisabled => "token_disabled",
            AppError::TokenExpired => "token_expired",
            AppError::ScopeDenied { .. } => "scope_denied",
            AppError::Validation(_) => "validation_failed",
            AppError::ResolverUnavailable(_) => "resolver_unavailable",
            AppError::Database(_) | AppError::Internal(_) => "internal_server_error",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::TokenNotFound | AppError::TokenDisabled | AppError::TokenExpired => {
                "authentication_error"
            }
            AppError::ScopeDenied { .. } => "permission_error",
            AppError::Validation(_) => "invalid_request_error",
            AppError::ResolverUnavailable(_) | AppError::Database(_) | AppError::Internal(_) => {
                "internal_error"
            }
        }
    }

    /// JSON envelope a hosting layer can hand back to the client.
    /// Internal failures are logged here and never leak their detail.
    pub fn error_body(&self) -> serde_json::Value {
        let msg = match self {
            AppError::TokenNotFound => "invalid or missing token".to_string(),
            AppError::TokenDisabled => "token is disabled".to_string(),
            AppError::TokenExpired => "token has expired".to_string(),
            AppError::ScopeDenied { scope } => {
                format!("token is not allowed to access '{}'", scope)
            }
            AppError::Validation(errors) => errors.to_string(),
            AppError::ResolverUnavailable(e) => {
                tracing::error!("Schema resolver error: {}", e);
                "internal server error".to_string()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "internal server error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                "internal server error".to_string()
            }
        };

        let mut body = json!({
            "error": {
                "message": msg,
                "type": self.error_type(),
                "code": self.code(),
            }
        });

        if let AppError::Validation(errors) = self {
            body["error"]["fields"] = json!(errors.fields());
        }

        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validation::TokenField;

    #[test]
    fn test_resolver_unavailable_is_distinct_from_not_found() {
        let err = AppError::ResolverUnavailable(anyhow::anyhow!("connection refused"));
        assert_eq!(err.code(), "resolver_unavailable");
        assert_ne!(err.code(), AppError::TokenNotFound.code());
    }

    #[test]
    fn test_internal_errors_do_not_leak_detail() {
        let err = AppError::Internal(anyhow::anyhow!("password=hunter2"));
        let body = err.error_body();
        assert_eq!(body["error"]["message"], "internal server error");
        assert_eq!(body["error"]["type"], "internal_error");
    }

    #[test]
    fn test_database_errors_are_masked() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        let body = err.error_body();
        assert_eq!(body["error"]["code"], "internal_server_error");
        assert_eq!(body["error"]["message"], "internal server error");
    }

    #[test]
    fn test_validation_body_lists_fields() {
        let mut errors = ValidationErrors::default();
        errors.add(TokenField::Name, "Name cannot be blank.");
        let body = AppError::Validation(errors).error_body();
        assert_eq!(body["error"]["code"], "validation_failed");
        assert_eq!(body["error"]["fields"]["name"][0], "Name cannot be blank.");
    }

    #[test]
    fn test_scope_denied_message_names_scope() {
        let err = AppError::ScopeDenied {
            scope: "sections.news:read".into(),
        };
        let body = err.error_body();
        assert_eq!(body["error"]["type"], "permission_error");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("sections.news:read"));
    }
}
