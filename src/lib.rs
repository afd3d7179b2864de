// ============================================================================
// modeldb Library
// ============================================================================

pub mod core;
pub mod connection;
pub mod result;
pub mod schema;
pub mod query;
pub mod record;
pub mod link;
pub mod token;
pub mod facade;

// Re-export main types for convenience
pub use facade::{FixtureDocument, FixtureRecord, Store};
pub use core::{DbError, Result, Value};
pub use result::{PagedResultSet, ResultCursor};

// Re-export connection API
pub use connection::{BackendRegistry, Dialect, RelationalBackend, SqliteBackend, StoreConfig};

// Re-export schema and query building blocks
pub use schema::{
    EditMode, FieldDescriptor, FieldKind, SchemaDescriptor, SchemaDocument, SchemaRegistry,
};
pub use query::{BuiltQuery, Criteria, Fragment, QueryBuilder, QueryComponents};
pub use record::{EditInput, RecordInstance};
pub use link::{LinkTable, link_table_name};
pub use token::{TokenGenerator, slugify};
