use super::components::Fragment;
use crate::core::Value;
use crate::schema::FieldDescriptor;

/// Value written to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// Bound as a statement parameter.
    Bind(Value),
    /// Server-side expression such as the dialect's "now".
    Expression(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub database: String,
    pub table: String,
    pub values: Vec<(String, Assignment)>,
    /// Column to hand back on dialects that report generated keys via RETURNING.
    pub returning: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub database: String,
    pub table: String,
    pub values: Vec<(String, Assignment)>,
    /// AND-joined, written against unaliased column names.
    pub conditions: Vec<Fragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub database: String,
    pub table: String,
    /// AND-joined; empty deletes every row.
    pub conditions: Vec<Fragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub database: String,
    pub table: String,
    pub columns: Vec<(String, FieldDescriptor)>,
}
