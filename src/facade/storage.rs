use std::collections::BTreeSet;

use super::store::Store;
use crate::core::Result;
use crate::query::CreateTableStatement;

impl Store {
    /// Create the database if the backend does not have it yet, then select it.
    pub fn ensure_database(&self) -> Result<bool> {
        let database = &self.config.database;
        let created = if self.backend.database_exists(database)? {
            false
        } else {
            self.backend.create_database(database)?;
            tracing::info!(database = %database, "created database");
            true
        };
        self.select_database()?;
        Ok(created)
    }

    pub fn storage_exists(&self, entity_type: &str) -> Result<bool> {
        let table = self.registry.describe(entity_type)?.table().to_string();
        self.table_exists(&table)
    }

    /// Create the entity's table unless it already exists.
    ///
    /// Returns whether a table was created.
    pub fn create_storage(&self, entity_type: &str) -> Result<bool> {
        let schema = self.registry.describe(entity_type)?;
        if self.table_exists(schema.table())? {
            return Ok(false);
        }

        let statement = CreateTableStatement {
            database: self.config.database.clone(),
            table: schema.table().to_string(),
            columns: schema
                .fields()
                .map(|(name, field)| (name.to_string(), field.clone()))
                .collect(),
        };
        self.query(&self.builder.create_table(&statement)?)?;
        tracing::info!(entity = entity_type, table = schema.table(), "created storage");
        Ok(true)
    }

    /// Create the junction table of a relation unless it already exists.
    pub fn create_link_storage(&self, a_type: &str, b_type: &str) -> Result<bool> {
        let link = self.link_table(a_type, b_type)?;
        if self.table_exists(link.name())? {
            return Ok(false);
        }
        self.query(&self.builder.create_table(&link.create_statement(&self.config.database))?)?;
        tracing::info!(table = link.name(), "created link storage");
        Ok(true)
    }

    /// Create every entity table and junction table that is missing.
    ///
    /// Returns the number of tables created.
    pub fn create_all_storage(&self) -> Result<usize> {
        let entity_types: Vec<String> = self.registry.entity_types().map(str::to_string).collect();
        let mut created = 0;

        for entity_type in &entity_types {
            if self.create_storage(entity_type)? {
                created += 1;
            }
        }

        let mut seen = BTreeSet::new();
        for entity_type in &entity_types {
            for other in self.relations_of(entity_type)? {
                let name = self.link_table(entity_type, &other)?.name().to_string();
                if seen.insert(name) && self.create_link_storage(entity_type, &other)? {
                    created += 1;
                }
            }
        }

        Ok(created)
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let database = self.config.database.clone();
        self.retrying(|backend| backend.table_exists(&database, table))
    }
}
