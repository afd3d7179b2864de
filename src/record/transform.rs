//! Per-kind conversion between record values and stored column values.

use crate::connection::Dialect;
use crate::core::{DATETIME_FORMAT, DbError, Result, Value, parse_datetime};
use crate::schema::{FieldDescriptor, FieldKind};

/// Encode a value for binding into an INSERT or UPDATE.
pub fn to_storage(name: &str, field: &FieldDescriptor, value: &Value, dialect: Dialect) -> Result<Value> {
    if value.is_null() {
        return if field.nullable {
            Ok(Value::Null)
        } else {
            Err(DbError::Validation(format!("Field '{}' cannot be null", name)))
        };
    }

    let invalid = || {
        DbError::Validation(format!(
            "Field '{}' of kind {:?} cannot hold {} value '{}'",
            name,
            field.kind,
            value.type_name(),
            value
        ))
    };

    match field.kind {
        FieldKind::Identifier | FieldKind::Integer => value.as_i64().map(Value::Integer).ok_or_else(invalid),
        FieldKind::Real => value.as_f64().map(Value::Real).ok_or_else(invalid),
        FieldKind::Boolean => Ok(dialect.bool_value(value.as_bool())),
        FieldKind::Text | FieldKind::LongText | FieldKind::DerivedToken => match value {
            Value::Blob(_) => Err(invalid()),
            Value::Timestamp(ts) => Ok(Value::Text(ts.format(DATETIME_FORMAT).to_string())),
            other => Ok(Value::Text(other.to_string())),
        },
        FieldKind::Enum => {
            let text = value.as_str().ok_or_else(invalid)?;
            if field.allows_enum_value(text) {
                Ok(Value::Text(text.to_string()))
            } else {
                Err(DbError::Validation(format!(
                    "Value '{}' is not in the domain of enum field '{}' ({})",
                    text,
                    name,
                    field.enum_domain.join(", ")
                )))
            }
        }
        FieldKind::Date | FieldKind::CreatedTimestamp | FieldKind::UpdatedTimestamp => value
            .as_timestamp()
            .map(|ts| Value::Text(ts.format(DATETIME_FORMAT).to_string()))
            .ok_or_else(invalid),
        FieldKind::Binary => match value {
            Value::Blob(bytes) => Ok(Value::Blob(bytes.clone())),
            Value::Text(text) => Ok(Value::Blob(text.as_bytes().to_vec())),
            _ => Err(invalid()),
        },
    }
}

/// Value bound for a field the caller left unset on insert.
///
/// Falls back to the declared default, then NULL for nullable fields, then
/// `false` for booleans. Anything else, enums included, must be supplied.
pub fn missing_on_insert(name: &str, field: &FieldDescriptor, dialect: Dialect) -> Result<Value> {
    if let Some(default) = &field.default {
        return to_storage(name, field, default, dialect);
    }
    if field.nullable {
        return Ok(Value::Null);
    }
    match field.kind {
        FieldKind::Boolean => Ok(dialect.bool_value(false)),
        FieldKind::Enum => Err(DbError::Validation(format!(
            "Enum field '{}' requires one of: {}",
            name,
            field.enum_domain.join(", ")
        ))),
        _ => Err(DbError::Validation(format!("Field '{}' requires a value", name))),
    }
}

/// Decode a stored column value into the field's record representation.
pub fn from_storage(field: &FieldDescriptor, raw: Value) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    match field.kind {
        FieldKind::Boolean => Value::Boolean(raw.as_bool()),
        FieldKind::Identifier | FieldKind::Integer => raw.as_i64().map(Value::Integer).unwrap_or(raw),
        FieldKind::Real => raw.as_f64().map(Value::Real).unwrap_or(raw),
        FieldKind::Date | FieldKind::CreatedTimestamp | FieldKind::UpdatedTimestamp => match &raw {
            Value::Text(text) => parse_datetime(text).map(Value::Timestamp).unwrap_or(Value::Null),
            _ => raw,
        },
        FieldKind::Binary => match raw {
            Value::Text(text) => Value::Blob(text.into_bytes()),
            other => other,
        },
        FieldKind::Text | FieldKind::LongText | FieldKind::DerivedToken | FieldKind::Enum => match raw {
            Value::Blob(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
            other => other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_domain_is_enforced() {
        let status = FieldDescriptor::enumeration(["draft", "published"]);
        assert_eq!(
            to_storage("status", &status, &Value::from("draft"), Dialect::Sqlite).unwrap(),
            Value::from("draft")
        );
        assert!(matches!(
            to_storage("status", &status, &Value::from("gone"), Dialect::Sqlite),
            Err(DbError::Validation(_))
        ));
        assert!(to_storage("status", &status, &Value::Null, Dialect::Sqlite).is_err());
        assert_eq!(
            to_storage("status", &status.clone().nullable(), &Value::Null, Dialect::Sqlite).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_missing_enum_needs_value_or_default() {
        let status = FieldDescriptor::enumeration(["draft", "published"]);
        assert!(matches!(
            missing_on_insert("status", &status, Dialect::Sqlite),
            Err(DbError::Validation(_))
        ));
        assert_eq!(
            missing_on_insert("status", &status.clone().default_value("published"), Dialect::Sqlite).unwrap(),
            Value::from("published")
        );
        assert_eq!(
            missing_on_insert("status", &status.nullable(), Dialect::Sqlite).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_dates_are_formatted() {
        let date = FieldDescriptor::date();
        assert_eq!(
            to_storage("published", &date, &Value::from("2024-03-01"), Dialect::MySql).unwrap(),
            Value::from("2024-03-01 00:00:00")
        );
        assert!(to_storage("published", &date, &Value::from("yesterday"), Dialect::MySql).is_err());
    }

    #[test]
    fn test_integer_text_must_parse() {
        let count = FieldDescriptor::integer();
        assert_eq!(
            to_storage("count", &count, &Value::from(" 12 "), Dialect::Sqlite).unwrap(),
            Value::Integer(12)
        );
        assert!(to_storage("count", &count, &Value::from("twelve"), Dialect::Sqlite).is_err());
    }

    #[test]
    fn test_missing_values_on_insert() {
        let flag = FieldDescriptor::boolean();
        assert_eq!(missing_on_insert("flag", &flag, Dialect::MySql).unwrap(), Value::from("false"));
        let note = FieldDescriptor::text().nullable();
        assert_eq!(missing_on_insert("note", &note, Dialect::Sqlite).unwrap(), Value::Null);
        let rank = FieldDescriptor::integer().default_value(5);
        assert_eq!(missing_on_insert("rank", &rank, Dialect::Sqlite).unwrap(), Value::Integer(5));
        assert!(matches!(
            missing_on_insert("title", &FieldDescriptor::text(), Dialect::Sqlite),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn test_decoding() {
        assert_eq!(from_storage(&FieldDescriptor::boolean(), Value::from("true")), Value::Boolean(true));
        assert_eq!(from_storage(&FieldDescriptor::boolean(), Value::Integer(0)), Value::Boolean(false));
        assert_eq!(
            from_storage(&FieldDescriptor::date(), Value::from("0000-00-00 00:00:00")),
            Value::Null
        );
        assert!(matches!(
            from_storage(&FieldDescriptor::created_timestamp(), Value::from("2024-01-02 03:04:05")),
            Value::Timestamp(_)
        ));
    }
}
