use std::cell::{Cell, RefCell};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::connection::{BackendRegistry, Dialect, RelationalBackend, StoreConfig};
use crate::core::{DbError, Result};
use crate::query::{BuiltQuery, JoinPlanner, QueryBuilder, QueryComponents};
use crate::record::RecordInstance;
use crate::result::ResultCursor;
use crate::schema::{SchemaDescriptor, SchemaRegistry};
use crate::token::TokenGenerator;

type RecordKey = (String, i64);

/// Entry point for everything the engine does.
///
/// A store owns one backend connection, the entity registry and the
/// configuration. It is meant to live for one request or one process on a
/// single thread; callers needing parallelism create one store per
/// connection.
pub struct Store {
    pub(crate) backend: Box<dyn RelationalBackend>,
    pub(crate) registry: SchemaRegistry,
    pub(crate) config: StoreConfig,
    pub(crate) builder: QueryBuilder,
    pub(crate) tokens: TokenGenerator,
    transaction_depth: Cell<u32>,
    database_selected: Cell<bool>,
    cache: Option<RefCell<LruCache<RecordKey, RecordInstance>>>,
}

impl Store {
    /// Create a store over an existing backend.
    ///
    /// Validates the configuration and the references between registered
    /// entity types.
    pub fn new(
        backend: Box<dyn RelationalBackend>,
        registry: SchemaRegistry,
        config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        registry.validate()?;

        if backend.dialect() != config.dialect {
            return Err(DbError::Config(format!(
                "Backend speaks {} but the configuration asks for {}",
                backend.dialect(),
                config.dialect
            )));
        }

        let cache = NonZeroUsize::new(config.record_cache_size)
            .map(|size| RefCell::new(LruCache::new(size)));

        tracing::debug!(
            database = %config.database,
            dialect = %config.dialect,
            entities = registry.len(),
            "store created"
        );

        Ok(Self {
            builder: QueryBuilder::new(config.dialect),
            tokens: TokenGenerator::from_config(&config),
            backend,
            registry,
            config,
            transaction_depth: Cell::new(0),
            database_selected: Cell::new(false),
            cache,
        })
    }

    /// Create a store with a backend from the default [`BackendRegistry`].
    pub fn connect(config: StoreConfig, registry: SchemaRegistry) -> Result<Self> {
        Self::connect_with(&BackendRegistry::default(), config, registry)
    }

    pub fn connect_with(
        backends: &BackendRegistry,
        config: StoreConfig,
        registry: SchemaRegistry,
    ) -> Result<Self> {
        let backend = backends.connect(&config)?;
        Self::new(backend, registry, config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    pub fn backend(&self) -> &dyn RelationalBackend {
        self.backend.as_ref()
    }

    pub fn describe(&self, entity_type: &str) -> Result<&Arc<SchemaDescriptor>> {
        self.registry.describe(entity_type)
    }

    /// Fresh, unsaved record of the given type.
    pub fn new_record(&self, entity_type: &str) -> Result<RecordInstance> {
        self.registry.new_record(entity_type)
    }

    /// Statements the backend has executed so far.
    pub fn query_count(&self) -> u64 {
        self.backend.query_count()
    }

    pub fn last_error_message(&self) -> Option<String> {
        self.backend.last_error_message()
    }

    /// Execute a statement.
    ///
    /// When the backend reports that the configured database is not
    /// selected, the database is selected and the statement retried once;
    /// any other failure, or a second failure, is returned as is.
    pub fn query(&self, query: &BuiltQuery) -> Result<ResultCursor> {
        self.retrying(|backend| backend.execute(query))
    }

    /// Build and execute a SELECT.
    pub fn select(&self, components: &QueryComponents) -> Result<ResultCursor> {
        let built = self.builder.select(components)?;
        self.query(&built)
    }

    pub(crate) fn retrying<T>(&self, op: impl Fn(&dyn RelationalBackend) -> Result<T>) -> Result<T> {
        match op(self.backend.as_ref()) {
            Err(err) if err.is_unknown_database() => {
                tracing::warn!(
                    database = %self.config.database,
                    error = %err,
                    "database not selected, selecting it and retrying once"
                );
                self.select_database()?;
                op(self.backend.as_ref())
            }
            other => other,
        }
    }

    /// Select the configured database on the backend.
    pub fn select_database(&self) -> Result<()> {
        self.backend.select_database(&self.config.database)?;
        self.database_selected.set(true);
        Ok(())
    }

    /// Run `f` inside a transaction.
    ///
    /// Nested calls join the outermost transaction; only the outermost call
    /// begins and commits, and any error rolls the whole thing back.
    pub fn transaction<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let depth = self.transaction_depth.get();
        if depth == 0 {
            // Some backends cannot switch databases inside a transaction.
            if !self.database_selected.get() {
                self.select_database()?;
            }
            self.backend.begin()?;
        }

        self.transaction_depth.set(depth + 1);
        let result = f();
        self.transaction_depth.set(depth);

        if depth > 0 {
            return result;
        }

        match result {
            Ok(value) => match self.backend.commit() {
                Ok(()) => Ok(value),
                Err(err) => {
                    if let Err(rollback) = self.backend.rollback() {
                        tracing::error!(error = %rollback, "rollback after failed commit failed");
                    }
                    Err(err)
                }
            },
            Err(err) => {
                tracing::debug!(error = %err, "rolling back transaction");
                if let Err(rollback) = self.backend.rollback() {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_depth.get() > 0
    }

    pub(crate) fn planner(&self) -> JoinPlanner<'_> {
        JoinPlanner::new(
            &self.registry,
            self.config.dialect,
            &self.config.database,
            self.config.max_linking_depth,
        )
    }

    pub(crate) fn cached(&self, entity_type: &str, id: i64) -> Option<RecordInstance> {
        let cache = self.cache.as_ref()?;
        cache.borrow_mut().get(&(entity_type.to_string(), id)).cloned()
    }

    pub(crate) fn cache_put(&self, record: &RecordInstance) {
        if let (Some(cache), Some(id)) = (&self.cache, record.id()) {
            cache
                .borrow_mut()
                .put((record.entity_type().to_string(), id), record.clone());
        }
    }

    pub(crate) fn evict(&self, entity_type: &str, id: i64) {
        if let Some(cache) = &self.cache {
            cache.borrow_mut().pop(&(entity_type.to_string(), id));
        }
    }

    pub(crate) fn evict_all(&self) {
        if let Some(cache) = &self.cache {
            cache.borrow_mut().clear();
        }
    }

    /// Records currently held in the linked-record cache.
    pub fn cached_records(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.borrow().len())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("transaction_depth", &self.transaction_depth.get())
            .finish()
    }
}
