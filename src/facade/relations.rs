use super::store::Store;
use crate::core::{DbError, Result, Value};
use crate::link::LinkTable;
use crate::query::{Criteria, Fragment, QueryComponents};
use crate::record::RecordInstance;
use crate::result::PagedResultSet;

impl Store {
    /// Junction between two entity types with a declared relation.
    pub fn link_table(&self, a_type: &str, b_type: &str) -> Result<LinkTable> {
        if !self.relation_declared(a_type, b_type)? {
            return Err(DbError::Schema(format!(
                "No many-to-many relation declared between '{}' and '{}'",
                a_type, b_type
            )));
        }
        LinkTable::new(
            &self.config,
            self.registry.describe(a_type)?,
            self.registry.describe(b_type)?,
        )
    }

    pub(crate) fn relation_declared(&self, a_type: &str, b_type: &str) -> Result<bool> {
        let a = self.registry.describe(a_type)?;
        let b = self.registry.describe(b_type)?;
        Ok(a_type != b_type && (a.links_with(b_type) || b.links_with(a_type)))
    }

    /// Entity types `entity_type` has a many-to-many relation with, declared
    /// on either side.
    pub fn relations_of(&self, entity_type: &str) -> Result<Vec<String>> {
        let mut relations = self.registry.describe(entity_type)?.linked_entities().to_vec();
        for other in self.registry.entity_types() {
            if other != entity_type
                && self.registry.describe(other)?.links_with(entity_type)
                && !relations.iter().any(|r| r == other)
            {
                relations.push(other.to_string());
            }
        }
        Ok(relations)
    }

    /// Add a junction row between two stored records.
    pub fn link(&self, a: &RecordInstance, b: &RecordInstance) -> Result<()> {
        self.link_ids(a.entity_type(), a.require_id()?, b.entity_type(), b.require_id()?)
    }

    pub fn link_ids(&self, a_type: &str, a_id: i64, b_type: &str, b_id: i64) -> Result<()> {
        let link = self.link_table(a_type, b_type)?;
        let row = link.record(a_type, a_id, b_id)?;
        let statement = link.insert_statement(&self.config.database, &row);
        self.query(&self.builder.insert(&statement)?)?;
        Ok(())
    }

    /// Remove every link between `record` and records of `other_type`.
    pub fn unlink(&self, record: &RecordInstance, other_type: &str) -> Result<usize> {
        let id = record.require_id()?;
        let link = self.link_table(record.entity_type(), other_type)?;
        let statement = link.delete_statement(
            self.dialect(),
            &self.config.database,
            &[(record.entity_type(), id)],
        )?;
        Ok(self.query(&self.builder.delete(&statement)?)?.row_count())
    }

    /// Remove the link between two specific records.
    pub fn unlink_pair(&self, a: &RecordInstance, b: &RecordInstance) -> Result<usize> {
        let link = self.link_table(a.entity_type(), b.entity_type())?;
        let statement = link.delete_statement(
            self.dialect(),
            &self.config.database,
            &[(a.entity_type(), a.require_id()?), (b.entity_type(), b.require_id()?)],
        )?;
        Ok(self.query(&self.builder.delete(&statement)?)?.row_count())
    }

    /// Remove the record's links across every relation of its type.
    pub fn unlink_all(&self, record: &RecordInstance) -> Result<usize> {
        let mut removed = 0;
        for other in self.relations_of(record.entity_type())? {
            removed += self.unlink(record, &other)?;
        }
        Ok(removed)
    }

    /// Replace the record's links to `other_type` with links to `ids`.
    pub fn relink(&self, record: &RecordInstance, other_type: &str, ids: &[i64]) -> Result<()> {
        let id = record.require_id()?;
        self.transaction(|| {
            self.unlink(record, other_type)?;
            for other_id in ids {
                self.link_ids(record.entity_type(), id, other_type, *other_id)?;
            }
            Ok(())
        })
    }

    /// Record a foreign field points at.
    ///
    /// Uses the record's own cache first, then the store's record cache,
    /// then loads it. The result is cached on the record.
    pub fn linked_record(&self, record: &mut RecordInstance, field: &str) -> Result<Option<RecordInstance>> {
        let schema = record.schema().clone();
        let target = schema
            .require_field(field)?
            .foreign_entity
            .as_deref()
            .ok_or_else(|| {
                DbError::Schema(format!(
                    "Field '{}' of '{}' does not link to another entity",
                    field,
                    schema.entity_type()
                ))
            })?;

        if let Some(cached) = record.linked(field) {
            return Ok(cached.cloned());
        }

        let linked = match record.get(field).and_then(Value::as_i64) {
            None => None,
            Some(id) => match self.cached(target, id) {
                Some(hit) => Some(hit),
                None => {
                    let found = self.find_by_id(target, id)?;
                    if let Some(found) = &found {
                        self.cache_put(found);
                    }
                    found
                }
            },
        };

        record.cache_linked(field, linked.clone());
        Ok(linked)
    }

    /// Records of `other_type` linked with `record` through their junction.
    pub fn linked_records(
        &self,
        record: &RecordInstance,
        other_type: &str,
        criteria: &Criteria,
    ) -> Result<Vec<RecordInstance>> {
        let components = self.linked_components(record, other_type, criteria)?;
        self.fetch_records(other_type, &components)
    }

    pub fn linked_records_page(
        &self,
        record: &RecordInstance,
        other_type: &str,
        criteria: &Criteria,
        page: u64,
    ) -> Result<PagedResultSet> {
        let components = self.linked_components(record, other_type, criteria)?;
        self.page_of(other_type, components, page)
    }

    fn linked_components(
        &self,
        record: &RecordInstance,
        other_type: &str,
        criteria: &Criteria,
    ) -> Result<QueryComponents> {
        let id = record.require_id()?;
        let link = self.link_table(record.entity_type(), other_type)?;
        let other = self.registry.describe(other_type)?;
        let dialect = self.dialect();

        let mut components = self.planner().plan(other_type)?;
        components.joins.push(Fragment::with_params(
            format!(
                "JOIN {} AS {} ON {} = {} AND {} = ?",
                dialect.qualified_table(&self.config.database, link.name()),
                dialect.quote_ident(link.name()),
                dialect.column_ref(link.name(), &link.side(other_type)?.column),
                dialect.column_ref(other_type, other.identifier_field()?),
                dialect.column_ref(link.name(), &link.side(record.entity_type())?.column),
            ),
            [id],
        ));
        criteria.apply(&mut components, other, dialect, other_type)?;
        Ok(components)
    }
}
