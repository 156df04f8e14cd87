//! Field-level validation results and the uniqueness collaborator.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token fields that carry validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenField {
    Name,
    AccessToken,
}

impl TokenField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenField::Name => "name",
            TokenField::AccessToken => "accessToken",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TokenField::Name => "Name",
            TokenField::AccessToken => "Access Token",
        }
    }

    pub(crate) fn required_message(&self) -> String {
        format!("{} cannot be blank.", self.label())
    }

    pub(crate) fn taken_message(&self, value: &str) -> String {
        format!("{} \"{}\" has already been taken.", self.label(), value)
    }
}

impl fmt::Display for TokenField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures keyed by field, in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<TokenField, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: TokenField, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: TokenField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn get(&self, field: TokenField) -> &[String] {
        self.0.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Field name → messages, for error envelopes.
    pub fn fields(&self) -> BTreeMap<&'static str, &[String]> {
        self.0
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for messages in self.0.values() {
            for message in messages {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Checks a field value against all persisted tokens.
#[async_trait]
pub trait UniquenessValidator: Send + Sync {
    /// `excluding` is the id of the token being validated, so a token does
    /// not collide with its own stored row.
    async fn is_unique(
        &self,
        field: TokenField,
        value: &str,
        excluding: Option<i64>,
    ) -> anyhow::Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_accumulate_per_field() {
        let mut errors = ValidationErrors::default();
        assert!(errors.is_empty());

        errors.add(TokenField::Name, TokenField::Name.required_message());
        errors.add(TokenField::Name, "second");
        assert!(errors.has(TokenField::Name));
        assert!(!errors.has(TokenField::AccessToken));
        assert_eq!(errors.get(TokenField::Name).len(), 2);
        assert!(errors.get(TokenField::AccessToken).is_empty());
    }

    #[test]
    fn test_display_joins_messages() {
        let mut errors = ValidationErrors::default();
        errors.add(TokenField::AccessToken, TokenField::AccessToken.taken_message("abc"));
        errors.add(TokenField::Name, TokenField::Name.required_message());
        assert_eq!(
            errors.to_string(),
            "Name cannot be blank. Access Token \"abc\" has already been taken."
        );
    }
}
