use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::core::{DbError, Result, Value};
use crate::schema::{FieldKind, SchemaDescriptor};

/// In-memory snapshot of one row of an entity type.
///
/// The identifier is `None` until the record is first inserted and can be
/// assigned exactly once. Linked records resolved through foreign fields
/// are cached per field; `Some(None)` means the link was resolved and is
/// empty, a missing entry means it was never resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInstance {
    schema: Arc<SchemaDescriptor>,
    id: Option<i64>,
    values: BTreeMap<String, Value>,
    linked: HashMap<String, Option<Box<RecordInstance>>>,
}

impl RecordInstance {
    pub fn new(schema: Arc<SchemaDescriptor>) -> Self {
        Self {
            schema,
            id: None,
            values: BTreeMap::new(),
            linked: HashMap::new(),
        }
    }

    pub fn entity_type(&self) -> &str {
        self.schema.entity_type()
    }

    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Identifier, failing with a state error on unsaved records.
    pub fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| {
            DbError::State(format!(
                "Record of type '{}' has no identifier",
                self.entity_type()
            ))
        })
    }

    pub(crate) fn assign_id(&mut self, id: i64) -> Result<()> {
        if let Some(existing) = self.id {
            return Err(DbError::State(format!(
                "Record of type '{}' already has identifier {}",
                self.entity_type(),
                existing
            )));
        }
        let field = self.schema.identifier_field()?.to_string();
        self.id = Some(id);
        self.values.insert(field, Value::Integer(id));
        Ok(())
    }

    /// Set a field value.
    ///
    /// The identifier cannot be set by hand. Changing a foreign field drops
    /// the cached linked record.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let descriptor = self.schema.require_field(field)?;
        if descriptor.kind == FieldKind::Identifier {
            return Err(DbError::State(format!(
                "Identifier field '{}' of '{}' is assigned by the store",
                field,
                self.entity_type()
            )));
        }
        if descriptor.is_linked() {
            self.linked.remove(field);
        }
        self.values.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Point a foreign field at another record and cache it.
    pub fn set_link(&mut self, field: &str, target: RecordInstance) -> Result<()> {
        let id = target.require_id()?;
        self.set(field, id)?;
        self.linked.insert(field.to_string(), Some(Box::new(target)));
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Value of a field, `Null` when unset.
    pub fn value(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }

    pub fn unset(&mut self, field: &str) -> Option<Value> {
        self.linked.remove(field);
        self.values.remove(field)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Cached linked record; `None` when the link was never resolved.
    pub fn linked(&self, field: &str) -> Option<Option<&RecordInstance>> {
        self.linked.get(field).map(|cached| cached.as_deref())
    }

    pub(crate) fn cache_linked(&mut self, field: &str, record: Option<RecordInstance>) {
        self.linked.insert(field.to_string(), record.map(Box::new));
    }

    /// Fill a field straight from storage, bypassing identifier checks.
    pub(crate) fn load(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_string(), value);
    }

    pub(crate) fn clear_linked(&mut self) {
        self.linked.clear();
    }

    /// Field values as a JSON object, linked records nested under their field.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (name, value) in &self.values {
            let json = match self.linked.get(name) {
                Some(Some(linked)) => linked.to_json(),
                _ => match value {
                    Value::Timestamp(ts) => {
                        serde_json::Value::String(ts.format(crate::core::DATETIME_FORMAT).to_string())
                    }
                    other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
                },
            };
            object.insert(name.clone(), json);
        }
        serde_json::Value::Object(object)
    }
}
