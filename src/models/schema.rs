use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier the resolver looks schemas up by.
pub type SchemaId = i64;

/// A named permission set. Only the fields token resolution reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: Option<SchemaId>,
    #[serde(default = "Uuid::new_v4")]
    pub uid: Uuid,
    pub name: String,
    /// Ordered permission strings, e.g. `sections.news:read`.
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl Schema {
    pub fn new(name: impl Into<String>, scope: Vec<String>) -> Self {
        Self {
            id: None,
            uid: Uuid::new_v4(),
            name: name.into(),
            scope,
            is_public: false,
        }
    }

    /// The schema anonymous requests run under. Starts with no permissions.
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            is_public: true,
            ..Self::new(name, Vec::new())
        }
    }

    pub fn with_id(mut self, id: SchemaId) -> Self {
        self.id = Some(id);
        self
    }
}
