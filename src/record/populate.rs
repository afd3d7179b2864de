use std::collections::HashMap;

use super::instance::RecordInstance;
use super::transform::from_storage;
use crate::core::{Result, Value};
use crate::query::{column_alias, link_segment};
use crate::schema::{FieldKind, SchemaRegistry};

/// Turn one flat result row into a record, nesting linked records.
///
/// Columns are looked up as `alias.field`, the naming the join planner
/// writes. A linked record is built only while `depth` allows it and only
/// when its columns were selected; a joined row whose identifier is NULL
/// caches an empty link.
pub fn populate(
    registry: &SchemaRegistry,
    entity_type: &str,
    alias: &str,
    row: &HashMap<String, Value>,
    depth: usize,
) -> Result<RecordInstance> {
    let descriptor = registry.describe(entity_type)?;
    let mut record = registry.new_record(entity_type)?;

    for (name, field) in descriptor.fields() {
        let raw = row
            .get(&column_alias(alias, name))
            .cloned()
            .unwrap_or(Value::Null);

        if field.kind == FieldKind::Identifier {
            if let Some(id) = raw.as_i64() {
                record.assign_id(id)?;
            }
            continue;
        }
        record.load(name, from_storage(field, raw));
    }

    if depth == 0 {
        return Ok(record);
    }

    for (field, target) in descriptor.foreign_fields() {
        let child_alias = format!("{}.{}", alias, link_segment(descriptor, field, target));
        let child_id_column = column_alias(&child_alias, registry.identifier_field(target)?);

        match row.get(&child_id_column) {
            None => {}
            Some(Value::Null) => record.cache_linked(field, None),
            Some(_) => {
                let child = populate(registry, target, &child_alias, row, depth - 1)?;
                record.cache_linked(field, Some(child));
            }
        }
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register_fields(
                "post",
                [
                    ("id", FieldDescriptor::identifier()),
                    ("visible", FieldDescriptor::boolean()),
                    ("author", FieldDescriptor::foreign("user").nullable()),
                ],
            )
            .unwrap();
        registry
            .register_fields(
                "user",
                [
                    ("id", FieldDescriptor::identifier()),
                    ("name", FieldDescriptor::text()),
                ],
            )
            .unwrap();
        registry
    }

    fn row(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_nested_record_is_built() {
        let registry = registry();
        let row = row(&[
            ("post.id", Value::Integer(1)),
            ("post.visible", Value::Integer(1)),
            ("post.author", Value::Integer(7)),
            ("post.user.id", Value::Integer(7)),
            ("post.user.name", Value::from("ada")),
        ]);

        let post = populate(&registry, "post", "post", &row, 1).unwrap();
        assert_eq!(post.id(), Some(1));
        assert_eq!(post.get("visible"), Some(&Value::Boolean(true)));
        let author = post.linked("author").flatten().unwrap();
        assert_eq!(author.id(), Some(7));
        assert_eq!(author.get("name"), Some(&Value::from("ada")));
    }

    #[test]
    fn test_null_join_caches_empty_link() {
        let registry = registry();
        let row = row(&[
            ("post.id", Value::Integer(1)),
            ("post.author", Value::Null),
            ("post.user.id", Value::Null),
        ]);
        let post = populate(&registry, "post", "post", &row, 1).unwrap();
        assert_eq!(post.linked("author"), Some(None));
    }

    #[test]
    fn test_depth_zero_leaves_links_unresolved() {
        let registry = registry();
        let row = row(&[("post.id", Value::Integer(1)), ("post.user.id", Value::Integer(7))]);
        let post = populate(&registry, "post", "post", &row, 0).unwrap();
        assert_eq!(post.linked("author"), None);
    }
}
