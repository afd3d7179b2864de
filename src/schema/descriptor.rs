use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::field::{FieldDescriptor, FieldKind};
use crate::core::{DbError, Result};

lazy_static! {
    static ref NAME_PATTERN: Regex = Regex::new(r"^[a-z][a-z0-9_]*$").unwrap();
}

/// One named field in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    #[serde(flatten)]
    pub descriptor: FieldDescriptor,
}

/// Immutable metadata of one entity type.
///
/// Built through [`SchemaDescriptor::builder`] or deserialized from a
/// [`SchemaDocument`](super::SchemaDocument); both paths run the same
/// validation, so every descriptor in a registry has exactly one identifier
/// field and only derives tokens from fields it declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    entity_type: String,
    #[serde(default)]
    table: String,
    fields: Vec<FieldEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    linked_entities: Vec<String>,
}

impl SchemaDescriptor {
    pub fn builder(entity_type: &str) -> SchemaBuilder {
        SchemaBuilder {
            entity_type: entity_type.to_string(),
            table: None,
            fields: Vec::new(),
            linked_entities: Vec::new(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|entry| (entry.name.as_str(), &entry.descriptor))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|entry| entry.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.descriptor)
    }

    /// Field declaration, failing with a schema error when absent.
    pub fn require_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field(name).ok_or_else(|| {
            DbError::Schema(format!(
                "Field '{}' does not exist on entity '{}'",
                name, self.entity_type
            ))
        })
    }

    pub fn identifier_field(&self) -> Result<&str> {
        self.fields
            .iter()
            .find(|entry| entry.descriptor.kind == FieldKind::Identifier)
            .map(|entry| entry.name.as_str())
            .ok_or_else(|| {
                DbError::Schema(format!(
                    "Entity '{}' has no field of kind identifier",
                    self.entity_type
                ))
            })
    }

    /// Fields holding identifiers of other entities, in declaration order.
    pub fn foreign_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|entry| {
            entry
                .descriptor
                .foreign_entity
                .as_deref()
                .map(|target| (entry.name.as_str(), target))
        })
    }

    /// Entity types this one has many-to-many relations with.
    pub fn linked_entities(&self) -> &[String] {
        &self.linked_entities
    }

    pub fn links_with(&self, entity_type: &str) -> bool {
        self.linked_entities.iter().any(|e| e == entity_type)
    }

    /// Check the invariants that need nothing but this descriptor.
    pub(crate) fn validate(&mut self) -> Result<()> {
        if !NAME_PATTERN.is_match(&self.entity_type) {
            return Err(DbError::Schema(format!(
                "Invalid entity type name '{}'",
                self.entity_type
            )));
        }

        if self.table.is_empty() {
            self.table = self.entity_type.clone();
        }

        if self.fields.is_empty() {
            return Err(DbError::Schema(format!(
                "Entity '{}' declares no fields",
                self.entity_type
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.fields {
            if !NAME_PATTERN.is_match(&entry.name) {
                return Err(DbError::Schema(format!(
                    "Invalid field name '{}' on entity '{}'",
                    entry.name, self.entity_type
                )));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(DbError::Schema(format!(
                    "Field '{}' declared twice on entity '{}'",
                    entry.name, self.entity_type
                )));
            }
        }

        let identifiers = self
            .fields
            .iter()
            .filter(|entry| entry.descriptor.kind == FieldKind::Identifier)
            .count();
        if identifiers != 1 {
            return Err(DbError::Schema(format!(
                "Entity '{}' must declare exactly one identifier field, found {}",
                self.entity_type, identifiers
            )));
        }

        for entry in &self.fields {
            let field = &entry.descriptor;
            match field.kind {
                FieldKind::DerivedToken => {
                    let source = field.derived_from.as_deref().ok_or_else(|| {
                        DbError::Schema(format!(
                            "Token field '{}' must name the field it derives from",
                            entry.name
                        ))
                    })?;
                    if source == entry.name || !seen.contains(source) {
                        return Err(DbError::Schema(format!(
                            "Token field '{}' derives from unknown field '{}'",
                            entry.name, source
                        )));
                    }
                }
                FieldKind::Enum if field.enum_domain.is_empty() => {
                    return Err(DbError::Schema(format!(
                        "Enum field '{}' has no domain values",
                        entry.name
                    )));
                }
                _ => {}
            }

            if field.foreign_entity.is_some() && field.kind != FieldKind::Integer {
                return Err(DbError::Schema(format!(
                    "Linked field '{}' must be of kind integer",
                    entry.name
                )));
            }
        }

        if self.linked_entities.iter().any(|e| *e == self.entity_type) {
            return Err(DbError::Schema(format!(
                "Entity '{}' cannot have a many-to-many relation with itself",
                self.entity_type
            )));
        }

        Ok(())
    }
}

/// Builder for [`SchemaDescriptor`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    entity_type: String,
    table: Option<String>,
    fields: Vec<FieldEntry>,
    linked_entities: Vec<String>,
}

impl SchemaBuilder {
    /// Storage table; defaults to the entity type name.
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn field(mut self, name: &str, descriptor: FieldDescriptor) -> Self {
        self.fields.push(FieldEntry {
            name: name.to_string(),
            descriptor,
        });
        self
    }

    /// Declare a many-to-many relation with another entity type.
    pub fn links_with(mut self, entity_type: &str) -> Self {
        if !self.linked_entities.iter().any(|e| e == entity_type) {
            self.linked_entities.push(entity_type.to_string());
        }
        self
    }

    pub fn build(self) -> Result<SchemaDescriptor> {
        let mut descriptor = SchemaDescriptor {
            table: self.table.unwrap_or_default(),
            entity_type: self.entity_type,
            fields: self.fields,
            linked_entities: self.linked_entities,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> SchemaBuilder {
        SchemaDescriptor::builder("post")
            .field("id", FieldDescriptor::identifier())
            .field("title", FieldDescriptor::text())
            .field("token", FieldDescriptor::derived_token("title"))
    }

    #[test]
    fn test_build_defaults_table_to_entity_type() {
        let descriptor = post().build().unwrap();
        assert_eq!(descriptor.table(), "post");
        assert_eq!(descriptor.identifier_field().unwrap(), "id");
        assert_eq!(descriptor.field_names().collect::<Vec<_>>(), ["id", "title", "token"]);
    }

    #[test]
    fn test_missing_identifier_fails() {
        let result = SchemaDescriptor::builder("tag")
            .field("name", FieldDescriptor::text())
            .build();
        assert!(matches!(result, Err(DbError::Schema(_))));
    }

    #[test]
    fn test_two_identifiers_fail() {
        let result = post().field("other_id", FieldDescriptor::identifier()).build();
        assert!(matches!(result, Err(DbError::Schema(_))));
    }

    #[test]
    fn test_token_must_derive_from_existing_field() {
        let result = SchemaDescriptor::builder("post")
            .field("id", FieldDescriptor::identifier())
            .field("token", FieldDescriptor::derived_token("headline"))
            .build();
        assert!(matches!(result, Err(DbError::Schema(_))));
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        assert!(post().field("title", FieldDescriptor::text()).build().is_err());
        assert!(post().field("Bad Name", FieldDescriptor::text()).build().is_err());
        assert!(SchemaDescriptor::builder("Post").field("id", FieldDescriptor::identifier()).build().is_err());
    }

    #[test]
    fn test_self_link_is_rejected() {
        assert!(post().links_with("post").build().is_err());
    }

    #[test]
    fn test_foreign_fields_in_order() {
        let descriptor = post()
            .field("author", FieldDescriptor::foreign("user"))
            .field("category", FieldDescriptor::foreign("category").nullable())
            .build()
            .unwrap();
        let foreign: Vec<_> = descriptor.foreign_fields().collect();
        assert_eq!(foreign, [("author", "user"), ("category", "category")]);
    }
}
