//! Many-to-many junction tables.

use crate::connection::{Dialect, StoreConfig};
use crate::core::{DbError, Result, Value};
use crate::query::{Assignment, CreateTableStatement, DeleteStatement, Fragment, InsertStatement};
use crate::schema::{FieldDescriptor, SchemaDescriptor};

/// Junction table name for two entity tables, independent of argument order.
pub fn link_table_name(prefix: &str, separator: &str, a_table: &str, b_table: &str) -> String {
    let (first, second) = if a_table <= b_table {
        (a_table, b_table)
    } else {
        (b_table, a_table)
    };
    format!("{prefix}{separator}{first}{separator}{second}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSide {
    pub entity_type: String,
    pub table: String,
    /// Junction column holding this side's identifier.
    pub column: String,
}

/// One row of a junction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub table: String,
    pub first_id: i64,
    pub second_id: i64,
}

/// Junction between two entity types; sides are ordered by table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTable {
    name: String,
    first: LinkSide,
    second: LinkSide,
}

impl LinkTable {
    pub fn new(config: &StoreConfig, a: &SchemaDescriptor, b: &SchemaDescriptor) -> Result<Self> {
        if a.entity_type() == b.entity_type() {
            return Err(DbError::Schema(format!(
                "Entity '{}' cannot be linked with itself",
                a.entity_type()
            )));
        }

        let side = |descriptor: &SchemaDescriptor| -> Result<LinkSide> {
            Ok(LinkSide {
                entity_type: descriptor.entity_type().to_string(),
                table: descriptor.table().to_string(),
                column: format!("{}_{}", descriptor.table(), descriptor.identifier_field()?),
            })
        };

        let (first, second) = if a.table() <= b.table() { (a, b) } else { (b, a) };
        Ok(Self {
            name: link_table_name(
                &config.link_table_prefix,
                &config.link_table_separator,
                first.table(),
                second.table(),
            ),
            first: side(first)?,
            second: side(second)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sides(&self) -> (&LinkSide, &LinkSide) {
        (&self.first, &self.second)
    }

    pub fn side(&self, entity_type: &str) -> Result<&LinkSide> {
        if self.first.entity_type == entity_type {
            Ok(&self.first)
        } else if self.second.entity_type == entity_type {
            Ok(&self.second)
        } else {
            Err(self.not_a_side(entity_type))
        }
    }

    /// The side opposite `entity_type`.
    pub fn other_side(&self, entity_type: &str) -> Result<&LinkSide> {
        if self.first.entity_type == entity_type {
            Ok(&self.second)
        } else if self.second.entity_type == entity_type {
            Ok(&self.first)
        } else {
            Err(self.not_a_side(entity_type))
        }
    }

    /// Junction row joining `a_id` of `a_type` with `b_id` of the other side.
    pub fn record(&self, a_type: &str, a_id: i64, b_id: i64) -> Result<LinkRecord> {
        let (first_id, second_id) = if self.side(a_type)? == &self.first {
            (a_id, b_id)
        } else {
            (b_id, a_id)
        };
        Ok(LinkRecord {
            table: self.name.clone(),
            first_id,
            second_id,
        })
    }

    pub fn create_statement(&self, database: &str) -> CreateTableStatement {
        CreateTableStatement {
            database: database.to_string(),
            table: self.name.clone(),
            columns: vec![
                ("id".to_string(), FieldDescriptor::identifier()),
                (self.first.column.clone(), FieldDescriptor::integer()),
                (self.second.column.clone(), FieldDescriptor::integer()),
            ],
        }
    }

    pub fn insert_statement(&self, database: &str, record: &LinkRecord) -> InsertStatement {
        InsertStatement {
            database: database.to_string(),
            table: self.name.clone(),
            values: vec![
                (self.first.column.clone(), Assignment::Bind(Value::Integer(record.first_id))),
                (self.second.column.clone(), Assignment::Bind(Value::Integer(record.second_id))),
            ],
            returning: Some("id".to_string()),
        }
    }

    /// Delete junction rows matching every given `(entity_type, id)` pair.
    pub fn delete_statement(
        &self,
        dialect: Dialect,
        database: &str,
        filters: &[(&str, i64)],
    ) -> Result<DeleteStatement> {
        let conditions = filters
            .iter()
            .map(|(entity_type, id)| {
                let side = self.side(entity_type)?;
                Ok(Fragment::with_params(
                    format!("{} = ?", dialect.quote_ident(&side.column)),
                    [*id],
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DeleteStatement {
            database: database.to_string(),
            table: self.name.clone(),
            conditions,
        })
    }

    fn not_a_side(&self, entity_type: &str) -> DbError {
        DbError::Schema(format!(
            "Entity '{}' is not part of link table '{}'",
            entity_type, self.name
        ))
    }
}
