use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::descriptor::SchemaDescriptor;
use super::registry::SchemaRegistry;
use crate::core::{DbError, Result};

/// Current version of the schema document format.
pub const SCHEMA_DOCUMENT_VERSION: u32 = 1;

/// Versioned JSON representation of a set of entity schemas.
///
/// ```json
/// {
///   "version": 1,
///   "entities": [
///     {"entity_type": "post", "fields": [
///       {"name": "id", "kind": "identifier"},
///       {"name": "title", "kind": "text"}
///     ]}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub version: u32,
    pub entities: Vec<SchemaDescriptor>,
}

impl SchemaDocument {
    pub fn new(entities: Vec<SchemaDescriptor>) -> Self {
        Self {
            version: SCHEMA_DOCUMENT_VERSION,
            entities,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let document: Self = serde_json::from_str(text)
            .map_err(|e| DbError::Schema(format!("Invalid schema document: {}", e)))?;
        if document.version != SCHEMA_DOCUMENT_VERSION {
            return Err(DbError::Schema(format!(
                "Unsupported schema document version {} (expected {})",
                document.version, SCHEMA_DOCUMENT_VERSION
            )));
        }
        Ok(document)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DbError::Schema(format!("Cannot read '{}': {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DbError::Schema(format!("Cannot serialize schema document: {}", e)))
    }

    /// Register every entity and check the references between them.
    pub fn into_registry(self) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        for descriptor in self.entities {
            registry.register(descriptor)?;
        }
        registry.validate()?;
        Ok(registry)
    }
}
