use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::instance::RecordInstance;
use crate::core::{DbError, Result, Value, parse_datetime};
use crate::schema::{EditMode, FieldKind};

/// Submitted form data for the edit flow.
///
/// `fields` maps field names to their raw text; a `None` value is an
/// explicit empty submission. `links` maps a related entity type to the
/// identifiers the record should be linked with afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditInput {
    #[serde(default)]
    pub fields: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub links: BTreeMap<String, Vec<i64>>,
}

impl EditInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), Some(value.into()));
        self
    }

    pub fn empty_field(mut self, name: &str) -> Self {
        self.fields.insert(name.to_string(), None);
        self
    }

    pub fn links<I: IntoIterator<Item = i64>>(mut self, entity_type: &str, ids: I) -> Self {
        self.links.insert(entity_type.to_string(), ids.into_iter().collect());
        self
    }
}

/// Apply submitted input to a record's fields.
///
/// Fields missing from the input keep their current value unless they are
/// must-be-explicit; nullable fields that are missing or empty become NULL.
/// Booleans follow presence in the input. Store-maintained kinds and custom
/// fields are left alone.
pub fn apply_input(record: &mut RecordInstance, input: &EditInput) -> Result<()> {
    let schema = record.schema().clone();

    for (name, field) in schema.fields() {
        if field.edit_mode == EditMode::Custom {
            continue;
        }
        if matches!(
            field.kind,
            FieldKind::Identifier | FieldKind::CreatedTimestamp | FieldKind::UpdatedTimestamp | FieldKind::DerivedToken
        ) {
            continue;
        }

        let submitted = input.fields.get(name);
        let has_value = record.get(name).is_some_and(|v| !v.is_null());

        if field.kind == FieldKind::Boolean {
            record.set(name, submitted.is_some())?;
            continue;
        }

        if field.edit_mode != EditMode::MustBeExplicit && submitted.is_none() && has_value {
            continue;
        }

        let text = match submitted {
            Some(Some(text)) => text,
            _ if field.nullable => {
                record.set(name, Value::Null)?;
                continue;
            }
            _ => {
                return Err(DbError::Validation(format!(
                    "Field '{}' of '{}' requires a value",
                    name,
                    record.entity_type()
                )));
            }
        };

        let value = match field.kind {
            FieldKind::Date => parse_datetime(text)
                .map(Value::Timestamp)
                .ok_or_else(|| DbError::Validation(format!("'{}' needs to be a valid date", name)))?,
            FieldKind::Text | FieldKind::LongText => Value::Text(text.clone()),
            FieldKind::Enum => {
                if !field.allows_enum_value(text) {
                    return Err(DbError::Validation(format!(
                        "Value '{}' is not allowed for '{}'",
                        text, name
                    )));
                }
                Value::Text(text.clone())
            }
            FieldKind::Integer => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| DbError::Validation(format!("'{}' needs to be a valid number", name)))?,
            FieldKind::Real => text
                .trim()
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| DbError::Validation(format!("'{}' needs to be a valid number", name)))?,
            FieldKind::Binary => Value::Blob(text.as_bytes().to_vec()),
            FieldKind::Boolean
            | FieldKind::Identifier
            | FieldKind::CreatedTimestamp
            | FieldKind::UpdatedTimestamp
            | FieldKind::DerivedToken => continue,
        };
        record.set(name, value)?;
    }

    Ok(())
}
