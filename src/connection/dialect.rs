use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{DbError, Result, Value};
use crate::schema::{FieldDescriptor, FieldKind};

/// SQL flavour a backend speaks.
///
/// Everything that differs between databases while rendering SQL lives
/// here; the query builder and the storage lifecycle never branch on the
/// database kind themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    MySql,
    Postgres,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Sqlite => 0,
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }

    pub fn quote_ident(self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Sqlite | Self::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// `database.table`, both parts quoted.
    pub fn qualified_table(self, database: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(database), self.quote_ident(table))
    }

    /// `alias.column`, both parts quoted.
    pub fn column_ref(self, alias: &str, column: &str) -> String {
        format!("{}.{}", self.quote_ident(alias), self.quote_ident(column))
    }

    /// SQL expression evaluating to the current timestamp on the server.
    pub fn now_expression(self) -> &'static str {
        match self {
            Self::Sqlite => "datetime('now', 'localtime')",
            Self::MySql => "NOW()",
            Self::Postgres => "LOCALTIMESTAMP(0)",
        }
    }

    /// Boolean encoding used when binding a boolean field.
    pub fn bool_value(self, flag: bool) -> Value {
        match self {
            Self::Sqlite => Value::Integer(i64::from(flag)),
            Self::MySql => Value::Text(if flag { "true" } else { "false" }.to_string()),
            Self::Postgres => Value::Boolean(flag),
        }
    }

    /// Rewrite `?` markers into the dialect's placeholder syntax.
    ///
    /// Markers inside string literals and quoted identifiers are left alone.
    pub fn number_placeholders(self, sql: &str) -> String {
        if self != Self::Postgres {
            return sql.to_string();
        }

        let mut out = String::with_capacity(sql.len() + 8);
        let mut index = 0;
        let mut quote: Option<char> = None;
        for c in sql.chars() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                    out.push(c);
                }
                None => match c {
                    '\'' | '"' => {
                        quote = Some(c);
                        out.push(c);
                    }
                    '?' => {
                        index += 1;
                        out.push('$');
                        out.push_str(&index.to_string());
                    }
                    _ => out.push(c),
                },
            }
        }
        out
    }

    /// Render a literal for DDL defaults, where binding is not available.
    pub fn literal(self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(r) => r.to_string(),
            Value::Boolean(b) => match self.bool_value(*b) {
                Value::Text(text) => format!("'{}'", text),
                Value::Integer(i) => i.to_string(),
                _ => if *b { "TRUE" } else { "FALSE" }.to_string(),
            },
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Timestamp(ts) => format!("'{}'", ts.format(crate::core::DATETIME_FORMAT)),
            Value::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                match self {
                    Self::Postgres => format!("'\\x{}'", hex),
                    Self::Sqlite | Self::MySql => format!("X'{}'", hex),
                }
            }
        }
    }

    /// Column definition for CREATE TABLE.
    pub fn column_definition(self, name: &str, field: &FieldDescriptor) -> Result<String> {
        let column = self.quote_ident(name);

        if field.kind == FieldKind::Identifier {
            return Ok(match self {
                Self::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", column),
                Self::MySql => format!("{} INT NOT NULL AUTO_INCREMENT PRIMARY KEY", column),
                Self::Postgres => format!("{} BIGSERIAL PRIMARY KEY", column),
            });
        }

        let length = field.length.unwrap_or(255);
        let sql_type = match field.kind {
            FieldKind::Text | FieldKind::DerivedToken => match self {
                Self::Sqlite => "TEXT".to_string(),
                Self::MySql | Self::Postgres => format!("VARCHAR({})", length),
            },
            FieldKind::LongText => "TEXT".to_string(),
            FieldKind::Identifier | FieldKind::Integer => match self {
                Self::Sqlite => "INTEGER".to_string(),
                Self::MySql => format!("INT({})", field.length.unwrap_or(11)),
                Self::Postgres => "BIGINT".to_string(),
            },
            FieldKind::Real => match self {
                Self::Sqlite => "REAL".to_string(),
                Self::MySql => "DOUBLE".to_string(),
                Self::Postgres => "DOUBLE PRECISION".to_string(),
            },
            FieldKind::Boolean => match self {
                Self::Sqlite => "INTEGER".to_string(),
                Self::MySql => "ENUM('true','false')".to_string(),
                Self::Postgres => "BOOLEAN".to_string(),
            },
            FieldKind::Enum => {
                if field.enum_domain.is_empty() {
                    return Err(DbError::Schema(format!(
                        "Enum field '{}' has no domain values",
                        name
                    )));
                }
                let domain = field
                    .enum_domain
                    .iter()
                    .map(|v| self.literal(&Value::Text(v.clone())))
                    .collect::<Vec<_>>()
                    .join(",");
                match self {
                    Self::MySql => format!("ENUM({})", domain),
                    Self::Sqlite => format!("TEXT CHECK ({} IN ({}))", column, domain),
                    Self::Postgres => format!("VARCHAR({}) CHECK ({} IN ({}))", length, column, domain),
                }
            }
            FieldKind::Date | FieldKind::CreatedTimestamp | FieldKind::UpdatedTimestamp => match self {
                Self::Sqlite | Self::MySql => "DATETIME".to_string(),
                Self::Postgres => "TIMESTAMP".to_string(),
            },
            FieldKind::Binary => match self {
                Self::Sqlite | Self::MySql => "BLOB".to_string(),
                Self::Postgres => "BYTEA".to_string(),
            },
        };

        let mut definition = format!("{} {}", column, sql_type);
        definition.push_str(if field.nullable { " NULL" } else { " NOT NULL" });

        let default = match (&field.default, field.kind) {
            (Some(value), _) => Some(value.clone()),
            (None, FieldKind::Boolean) => Some(Value::Boolean(false)),
            (None, FieldKind::Enum) if !field.nullable => {
                field.enum_domain.first().map(|v| Value::Text(v.clone()))
            }
            _ => None,
        };
        if let Some(default) = default {
            definition.push_str(" DEFAULT ");
            definition.push_str(&self.literal(&default));
        }

        Ok(definition)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DbError::Config(format!("Unknown dialect '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting_per_dialect() {
        assert_eq!(Dialect::MySql.qualified_table("app", "post"), "`app`.`post`");
        assert_eq!(Dialect::Sqlite.qualified_table("app", "post"), "\"app\".\"post\"");
        assert_eq!(Dialect::Postgres.quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_postgres_placeholders_skip_literals() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = '?' AND \"c?\" = ?";
        assert_eq!(
            Dialect::Postgres.number_placeholders(sql),
            "SELECT * FROM t WHERE a = $1 AND b = '?' AND \"c?\" = $2"
        );
        assert_eq!(Dialect::Sqlite.number_placeholders(sql), sql);
    }

    #[test]
    fn test_bool_encoding() {
        assert_eq!(Dialect::Sqlite.bool_value(true), Value::Integer(1));
        assert_eq!(Dialect::MySql.bool_value(false), Value::Text("false".into()));
        assert_eq!(Dialect::Postgres.bool_value(true), Value::Boolean(true));
    }

    #[test]
    fn test_literal_escapes_quotes() {
        assert_eq!(Dialect::Sqlite.literal(&Value::Text("it's".into())), "'it''s'");
        assert_eq!(Dialect::Sqlite.literal(&Value::Blob(vec![0xAB, 0x01])), "X'AB01'");
    }

    #[test]
    fn test_column_definitions() {
        let id = FieldDescriptor::identifier();
        assert_eq!(
            Dialect::Sqlite.column_definition("id", &id).unwrap(),
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"
        );

        let status = FieldDescriptor::enumeration(["draft", "published"]);
        assert_eq!(
            Dialect::MySql.column_definition("status", &status).unwrap(),
            "`status` ENUM('draft','published') NOT NULL DEFAULT 'draft'"
        );

        let flag = FieldDescriptor::boolean();
        assert_eq!(
            Dialect::MySql.column_definition("visible", &flag).unwrap(),
            "`visible` ENUM('true','false') NOT NULL DEFAULT 'false'"
        );

        let note = FieldDescriptor::long_text().nullable();
        assert_eq!(
            Dialect::Postgres.column_definition("note", &note).unwrap(),
            "\"note\" TEXT NULL"
        );
    }

    #[test]
    fn test_enum_without_domain_is_rejected() {
        let broken = FieldDescriptor::enumeration(Vec::<String>::new());
        assert!(matches!(
            Dialect::Sqlite.column_definition("status", &broken),
            Err(DbError::Schema(_))
        ));
    }

    #[test]
    fn test_parse_dialect() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
