pub mod config;
pub mod dialect;
pub mod sqlite;

use std::collections::BTreeMap;

use crate::core::{DbError, Result};
use crate::query::BuiltQuery;
use crate::result::ResultCursor;

pub use config::StoreConfig;
pub use dialect::Dialect;
pub use sqlite::SqliteBackend;

/// Database connection handle
///
/// One implementation per database kind. Backends wrap every native failure
/// in [`DbError`], classifying it so the store can react without knowing
/// the driver. Methods take `&self`; a backend owns its connection and is
/// used by one store on one thread.
pub trait RelationalBackend {
    fn dialect(&self) -> Dialect;

    /// Execute one statement with its bound parameters.
    fn execute(&self, query: &BuiltQuery) -> Result<ResultCursor>;

    /// Make `name` the database statements are resolved against.
    fn select_database(&self, name: &str) -> Result<()>;

    fn database_exists(&self, name: &str) -> Result<bool>;

    fn create_database(&self, name: &str) -> Result<()>;

    fn table_exists(&self, database: &str, table: &str) -> Result<bool>;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    /// Native message of the most recent failure, if any.
    fn last_error_message(&self) -> Option<String>;

    /// Statements executed so far.
    fn query_count(&self) -> u64;
}

/// Builds a backend from configuration.
pub type BackendConstructor = fn(&StoreConfig) -> Result<Box<dyn RelationalBackend>>;

/// Backend constructors keyed by dialect name.
pub struct BackendRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// Registry without any backend.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, dialect: &str, constructor: BackendConstructor) {
        self.constructors.insert(dialect.to_ascii_lowercase(), constructor);
    }

    pub fn contains(&self, dialect: &str) -> bool {
        self.constructors.contains_key(&dialect.to_ascii_lowercase())
    }

    pub fn dialects(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Construct the backend for `config.dialect`.
    pub fn connect(&self, config: &StoreConfig) -> Result<Box<dyn RelationalBackend>> {
        let constructor = self.constructors.get(config.dialect.name()).ok_or_else(|| {
            DbError::Connection(format!(
                "No backend registered for dialect '{}'",
                config.dialect
            ))
        })?;
        tracing::debug!(dialect = %config.dialect, database = %config.database, "constructing backend");
        constructor(config)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Dialect::Sqlite.name(), SqliteBackend::boxed);
        registry
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("dialects", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
