use super::store::Store;
use crate::core::{DbError, Result, Value};
use crate::query::criteria::{paged_custom, require_limit, without_limit};
use crate::query::{
    Assignment, Criteria, DeleteStatement, Fragment, InsertStatement, QueryComponents,
    UpdateStatement,
};
use crate::record::transform::{missing_on_insert, to_storage};
use crate::record::{EditInput, RecordInstance, apply_input, populate};
use crate::result::{PagedResultSet, offset_for};
use crate::schema::{FieldKind, SchemaDescriptor};

#[derive(Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Update,
}

impl Store {
    /// Insert a new record and assign its generated identifier.
    pub fn insert(&self, record: &mut RecordInstance) -> Result<i64> {
        let _span = tracing::debug_span!("insert", entity = record.entity_type()).entered();

        if let Some(id) = record.id() {
            return Err(DbError::State(format!(
                "Record of type '{}' is already stored with identifier {}",
                record.entity_type(),
                id
            )));
        }

        let schema = self.registry.describe(record.entity_type())?.clone();
        let values = self.write_values(record, &schema, WriteMode::Insert)?;
        let statement = InsertStatement {
            database: self.config.database.clone(),
            table: schema.table().to_string(),
            values,
            returning: Some(schema.identifier_field()?.to_string()),
        };

        let mut cursor = self.query(&self.builder.insert(&statement)?)?;
        let id = cursor
            .last_inserted_identifier()
            .or_else(|| cursor.fetch_scalar().and_then(|v| v.as_i64()))
            .ok_or_else(|| {
                DbError::State(format!(
                    "Backend returned no identifier for new '{}'",
                    record.entity_type()
                ))
            })?;

        record.assign_id(id)?;
        tracing::debug!(id, "record inserted");
        Ok(id)
    }

    /// Write a stored record's fields back; the identifier never changes.
    pub fn update(&self, record: &mut RecordInstance) -> Result<()> {
        let _span = tracing::debug_span!("update", entity = record.entity_type()).entered();

        let id = record.require_id()?;
        let schema = self.registry.describe(record.entity_type())?.clone();
        let values = self.write_values(record, &schema, WriteMode::Update)?;
        let statement = UpdateStatement {
            database: self.config.database.clone(),
            table: schema.table().to_string(),
            values,
            conditions: vec![self.id_condition(&schema, id)?],
        };

        self.query(&self.builder.update(&statement)?)?;
        self.evict(record.entity_type(), id);
        Ok(())
    }

    /// Delete a stored record and every junction row that references it.
    pub fn delete(&self, record: &RecordInstance) -> Result<()> {
        let _span = tracing::debug_span!("delete", entity = record.entity_type()).entered();

        let id = record.require_id()?;
        let schema = self.registry.describe(record.entity_type())?.clone();
        let statement = DeleteStatement {
            database: self.config.database.clone(),
            table: schema.table().to_string(),
            conditions: vec![self.id_condition(&schema, id)?],
        };

        self.transaction(|| {
            self.query(&self.builder.delete(&statement)?)?;
            let links = self.unlink_all(record)?;
            tracing::debug!(id, links, "record deleted");
            Ok(())
        })?;
        self.evict(record.entity_type(), id);
        Ok(())
    }

    /// Delete every row matching `criteria`; junction rows are left alone.
    pub fn delete_all(&self, entity_type: &str, criteria: &Criteria) -> Result<usize> {
        let schema = self.registry.describe(entity_type)?;
        if criteria.custom.is_some() {
            return Err(DbError::QueryBuild(
                "Custom fragments cannot be used in a bulk delete".into(),
            ));
        }

        let statement = DeleteStatement {
            database: self.config.database.clone(),
            table: schema.table().to_string(),
            conditions: criteria.conditions(schema, self.dialect(), None)?,
        };
        let cursor = self.query(&self.builder.delete(&statement)?)?;
        self.evict_all();
        Ok(cursor.row_count())
    }

    /// SELECT components for `entity_type` with linked records joined and
    /// `criteria` applied.
    pub fn find_components(&self, entity_type: &str, criteria: &Criteria) -> Result<QueryComponents> {
        let schema = self.registry.describe(entity_type)?;
        let mut components = self.planner().plan(entity_type)?;
        criteria.apply(&mut components, schema, self.dialect(), schema.entity_type())?;
        Ok(components)
    }

    pub fn find_all(&self, entity_type: &str, criteria: &Criteria) -> Result<Vec<RecordInstance>> {
        let components = self.find_components(entity_type, criteria)?;
        self.fetch_records(entity_type, &components)
    }

    /// One page of records; the limit is the page size.
    pub fn find_page(&self, entity_type: &str, criteria: &Criteria, page: u64) -> Result<PagedResultSet> {
        let components = self.find_components(entity_type, criteria)?;
        self.page_of(entity_type, components, page)
    }

    pub fn find_by_id(&self, entity_type: &str, id: i64) -> Result<Option<RecordInstance>> {
        let id_field = self.registry.identifier_field(entity_type)?;
        let criteria = Criteria::new().eq(id_field, id).limit(1);
        Ok(self.find_all(entity_type, &criteria)?.into_iter().next())
    }

    /// Rows matching `criteria`, ignoring its order and limit.
    pub fn count(&self, entity_type: &str, criteria: &Criteria) -> Result<u64> {
        let components = self.find_components(entity_type, criteria)?;
        self.count_components(entity_type, &components)
    }

    /// Apply submitted input, save the record and replace its links.
    ///
    /// Saving and relinking happen in one transaction; afterwards the record
    /// is reloaded so store-maintained fields are current.
    pub fn edit(&self, record: &mut RecordInstance, input: &EditInput) -> Result<()> {
        let _span = tracing::info_span!("edit", entity = record.entity_type(), id = ?record.id()).entered();

        for other in input.links.keys() {
            if !self.relation_declared(record.entity_type(), other)? {
                return Err(DbError::Schema(format!(
                    "Entity '{}' has no many-to-many relation with '{}'",
                    record.entity_type(),
                    other
                )));
            }
        }

        apply_input(record, input)?;

        self.transaction(|| {
            if record.is_new() {
                self.insert(record)?;
            } else {
                self.update(record)?;
            }
            for (other, ids) in &input.links {
                self.relink(record, other, ids)?;
            }
            Ok(())
        })?;

        let id = record.require_id()?;
        let entity_type = record.entity_type().to_string();
        *record = self.find_by_id(&entity_type, id)?.ok_or_else(|| {
            DbError::State(format!("Record '{}' {} vanished after saving", entity_type, id))
        })?;
        Ok(())
    }

    pub(crate) fn fetch_records(
        &self,
        entity_type: &str,
        components: &QueryComponents,
    ) -> Result<Vec<RecordInstance>> {
        let mut cursor = self.select(components)?;
        let mut records = Vec::with_capacity(cursor.row_count());
        while let Some(row) = cursor.fetch_associative() {
            records.push(populate(
                &self.registry,
                entity_type,
                entity_type,
                &row,
                self.config.max_linking_depth,
            )?);
        }
        Ok(records)
    }

    pub(crate) fn page_of(
        &self,
        entity_type: &str,
        mut components: QueryComponents,
        page: u64,
    ) -> Result<PagedResultSet> {
        let _span = tracing::debug_span!("page", entity = entity_type, page).entered();

        let page_size = require_limit(components.limit, components.custom.as_ref())?;
        let page_number = page.max(1);
        let offset = offset_for(page_size, page_number);
        let total_count = self.count_components(entity_type, &components)?;

        match components.custom.take() {
            Some(custom) => components.custom = Some(paged_custom(&custom, page_size, offset)),
            None => {
                components.limit = Some(page_size);
                components.offset = Some(offset);
            }
        }

        let items = self.fetch_records(entity_type, &components)?;
        Ok(PagedResultSet {
            items,
            page_number,
            page_size,
            total_count,
        })
    }

    /// COUNT over the same tables, joins and conditions as `components`.
    pub(crate) fn count_components(&self, entity_type: &str, components: &QueryComponents) -> Result<u64> {
        let id_field = self.registry.identifier_field(entity_type)?;
        let dialect = self.dialect();

        let mut count = components.clone();
        count.columns = vec![format!(
            "COUNT(DISTINCT {}) AS {}",
            dialect.column_ref(entity_type, id_field),
            dialect.quote_ident("modelcount")
        )];
        count.distinct = false;
        count.order.clear();
        count.limit = None;
        count.offset = None;
        count.custom = count.custom.as_ref().map(without_limit);

        let mut cursor = self.select(&count)?;
        Ok(cursor
            .fetch_scalar()
            .and_then(|v| v.as_i64())
            .map_or(0, |n| n.max(0) as u64))
    }

    pub(crate) fn id_condition(&self, schema: &SchemaDescriptor, id: i64) -> Result<Fragment> {
        Ok(Fragment::with_params(
            format!("{} = ?", self.dialect().quote_ident(schema.identifier_field()?)),
            [id],
        ))
    }

    fn write_values(
        &self,
        record: &mut RecordInstance,
        schema: &SchemaDescriptor,
        mode: WriteMode,
    ) -> Result<Vec<(String, Assignment)>> {
        let dialect = self.dialect();
        let mut values = Vec::new();

        for (name, field) in schema.fields() {
            let assignment = match field.kind {
                FieldKind::Identifier => continue,
                FieldKind::CreatedTimestamp if mode == WriteMode::Update => continue,
                FieldKind::CreatedTimestamp | FieldKind::UpdatedTimestamp => {
                    Assignment::Expression(dialect.now_expression().to_string())
                }
                FieldKind::DerivedToken => {
                    let token = self.generate_token(record, schema, name)?;
                    record.load(name, Value::Text(token.clone()));
                    Assignment::Bind(Value::Text(token))
                }
                _ => match record.get(name) {
                    Some(value) => Assignment::Bind(to_storage(name, field, value, dialect)?),
                    None if mode == WriteMode::Insert => {
                        Assignment::Bind(missing_on_insert(name, field, dialect)?)
                    }
                    None => continue,
                },
            };
            values.push((name.to_string(), assignment));
        }

        Ok(values)
    }

    fn generate_token(&self, record: &RecordInstance, schema: &SchemaDescriptor, field: &str) -> Result<String> {
        let source_field = schema
            .require_field(field)?
            .derived_from
            .as_deref()
            .ok_or_else(|| DbError::Schema(format!("Token field '{}' has no source field", field)))?;
        let source = match record.value(source_field) {
            Value::Null => String::new(),
            other => other.to_string(),
        };

        let table = self.dialect().qualified_table(&self.config.database, schema.table());
        let token_column = self.dialect().quote_ident(field);
        let id_column = self.dialect().quote_ident(schema.identifier_field()?);
        let exclude = record.id();

        self.tokens.generate(&source, schema.entity_type(), field, |candidate| {
            let mut lookup = QueryComponents::new()
                .column("COUNT(*)")
                .table(table.clone())
                .condition(Fragment::with_params(format!("{} = ?", token_column), [candidate]));
            if let Some(id) = exclude {
                lookup = lookup.condition(Fragment::with_params(format!("{} != ?", id_column), [id]));
            }
            let mut cursor = self.select(&lookup)?;
            Ok(cursor.fetch_scalar().and_then(|v| v.as_i64()).unwrap_or(0) > 0)
        })
    }
}
