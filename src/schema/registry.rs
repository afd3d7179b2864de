use std::collections::BTreeMap;
use std::sync::Arc;

use super::descriptor::SchemaDescriptor;
use super::field::FieldDescriptor;
use crate::core::{DbError, Result};
use crate::record::RecordInstance;

/// Builds a fresh, unsaved record for an entity type.
pub type RecordConstructor = fn(Arc<SchemaDescriptor>) -> RecordInstance;

struct Registration {
    descriptor: Arc<SchemaDescriptor>,
    constructor: RecordConstructor,
}

/// Entity types known to a store, keyed by name.
///
/// Registration checks each descriptor on its own; references between
/// entities are checked by [`validate`](Self::validate) once everything is
/// registered, which is what lets two entity types point at each other.
#[derive(Default)]
pub struct SchemaRegistry {
    entries: BTreeMap<String, Registration>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type with the default record constructor.
    pub fn register(&mut self, descriptor: SchemaDescriptor) -> Result<()> {
        self.register_with(descriptor, RecordInstance::new)
    }

    /// Register an entity type from an ordered field list.
    pub fn register_fields<'a, I>(&mut self, entity_type: &str, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, FieldDescriptor)>,
    {
        let descriptor = fields
            .into_iter()
            .fold(SchemaDescriptor::builder(entity_type), |builder, (name, field)| {
                builder.field(name, field)
            })
            .build()?;
        self.register(descriptor)
    }

    /// Register an entity type whose new records come from `constructor`.
    pub fn register_with(
        &mut self,
        mut descriptor: SchemaDescriptor,
        constructor: RecordConstructor,
    ) -> Result<()> {
        descriptor.validate()?;

        let entity_type = descriptor.entity_type().to_string();
        if self.entries.contains_key(&entity_type) {
            return Err(DbError::Schema(format!(
                "Entity type '{}' is already registered",
                entity_type
            )));
        }

        tracing::debug!(entity = %entity_type, table = descriptor.table(), "registered entity type");
        self.entries.insert(
            entity_type,
            Registration {
                descriptor: Arc::new(descriptor),
                constructor,
            },
        );
        Ok(())
    }

    pub fn describe(&self, entity_type: &str) -> Result<&Arc<SchemaDescriptor>> {
        self.entries
            .get(entity_type)
            .map(|entry| &entry.descriptor)
            .ok_or_else(|| DbError::UnknownEntity(entity_type.to_string()))
    }

    pub fn identifier_field(&self, entity_type: &str) -> Result<&str> {
        self.describe(entity_type)?.identifier_field()
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.entries.contains_key(entity_type)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Construct an empty record of the given type.
    pub fn new_record(&self, entity_type: &str) -> Result<RecordInstance> {
        let entry = self
            .entries
            .get(entity_type)
            .ok_or_else(|| DbError::UnknownEntity(entity_type.to_string()))?;
        Ok((entry.constructor)(Arc::clone(&entry.descriptor)))
    }

    /// Check references between registered entity types.
    pub fn validate(&self) -> Result<()> {
        for entry in self.entries.values() {
            let descriptor = &entry.descriptor;

            for (field, target) in descriptor.foreign_fields() {
                if !self.contains(target) {
                    return Err(DbError::UnknownEntity(format!(
                        "{} (linked from {}.{})",
                        target,
                        descriptor.entity_type(),
                        field
                    )));
                }
            }

            for other in descriptor.linked_entities() {
                if !self.contains(other) {
                    return Err(DbError::UnknownEntity(format!(
                        "{} (many-to-many with {})",
                        other,
                        descriptor.entity_type()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("entity_types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn user() -> SchemaDescriptor {
        SchemaDescriptor::builder("user")
            .field("id", FieldDescriptor::identifier())
            .field("name", FieldDescriptor::text())
            .field("group", FieldDescriptor::foreign("group").nullable())
            .build()
            .unwrap()
    }

    #[test]
    fn test_describe_unknown_entity() {
        let registry = SchemaRegistry::new();
        assert!(matches!(registry.describe("user"), Err(DbError::UnknownEntity(_))));
        assert!(matches!(registry.new_record("user"), Err(DbError::UnknownEntity(_))));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = SchemaRegistry::new();
        registry.register(user()).unwrap();
        assert!(matches!(registry.register(user()), Err(DbError::Schema(_))));
    }

    #[test]
    fn test_validate_requires_foreign_targets() {
        let mut registry = SchemaRegistry::new();
        registry.register(user()).unwrap();
        assert!(matches!(registry.validate(), Err(DbError::UnknownEntity(_))));

        registry
            .register_fields(
                "group",
                [
                    ("id", FieldDescriptor::identifier()),
                    ("owner", FieldDescriptor::foreign("user")),
                ],
            )
            .unwrap();
        assert!(registry.validate().is_ok());
        assert_eq!(registry.identifier_field("group").unwrap(), "id");
    }

    #[test]
    fn test_custom_constructor() {
        fn with_default_name(descriptor: Arc<SchemaDescriptor>) -> RecordInstance {
            let mut record = RecordInstance::new(descriptor);
            record.set("name", "anonymous").unwrap();
            record
        }

        let mut registry = SchemaRegistry::new();
        registry.register_with(user(), with_default_name).unwrap();
        let record = registry.new_record("user").unwrap();
        assert_eq!(record.get("name"), Some(&Value::Text("anonymous".into())));
        assert_eq!(record.id(), None);
    }
}
