use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::store::Store;
use crate::core::{DbError, Result, Value};

lazy_static! {
    static ref LAST_ID: Regex = Regex::new(r"^%lastid(\d*)%(\d*)$").unwrap();
    static ref VARIABLE: Regex = Regex::new(r"%([A-Za-z_][A-Za-z0-9_]*)%").unwrap();
}

/// A fixture file: records to insert, each optionally with dependents.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDocument {
    pub records: Vec<FixtureRecord>,
}

/// One record of a fixture file.
///
/// String values may reference the identifier of an enclosing record with
/// `%lastid%` (the direct parent), `%lastid2%` or `%lastid%2` (two levels
/// up), and so on, or a caller-supplied variable with `%name%`.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRecord {
    pub entity: String,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Many-to-many links to already stored records, by entity type.
    #[serde(default)]
    pub links: BTreeMap<String, Vec<i64>>,
    #[serde(default)]
    pub dependents: Vec<FixtureRecord>,
}

impl Store {
    /// Insert every record of a JSON fixture document in one transaction.
    ///
    /// Returns `(entity type, identifier)` of each inserted record in
    /// insertion order.
    pub fn load_fixtures(&self, json: &str, vars: &BTreeMap<String, String>) -> Result<Vec<(String, i64)>> {
        let document: FixtureDocument = serde_json::from_str(json)
            .map_err(|err| DbError::Validation(format!("Invalid fixture document: {}", err)))?;

        let _span = tracing::info_span!("load_fixtures", records = document.records.len()).entered();
        let mut inserted = Vec::new();
        self.transaction(|| {
            let mut stack = Vec::new();
            for record in &document.records {
                self.load_fixture(record, vars, &mut stack, &mut inserted)?;
            }
            Ok(())
        })?;
        tracing::info!(inserted = inserted.len(), "fixtures loaded");
        Ok(inserted)
    }

    fn load_fixture(
        &self,
        fixture: &FixtureRecord,
        vars: &BTreeMap<String, String>,
        stack: &mut Vec<i64>,
        inserted: &mut Vec<(String, i64)>,
    ) -> Result<()> {
        let mut record = self.new_record(&fixture.entity)?;
        for (name, json) in &fixture.fields {
            record.set(name, resolve(json, vars, stack)?)?;
        }

        let id = self.insert(&mut record)?;
        for (other, ids) in &fixture.links {
            for other_id in ids {
                self.link_ids(&fixture.entity, id, other, *other_id)?;
            }
        }
        inserted.push((fixture.entity.clone(), id));

        stack.push(id);
        let result = fixture
            .dependents
            .iter()
            .try_for_each(|dependent| self.load_fixture(dependent, vars, stack, inserted));
        stack.pop();
        result
    }
}

fn resolve(json: &serde_json::Value, vars: &BTreeMap<String, String>, stack: &[i64]) -> Result<Value> {
    let text = match json {
        serde_json::Value::String(text) => text,
        other => {
            return Value::from_json(other).ok_or_else(|| {
                DbError::Validation(format!("Fixture values must be scalars, got {}", other))
            });
        }
    };

    if let Some(caps) = LAST_ID.captures(text) {
        let level = [caps.get(1), caps.get(2)]
            .into_iter()
            .flatten()
            .find_map(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);
        return stack
            .len()
            .checked_sub(level)
            .and_then(|i| stack.get(i))
            .map(|id| Value::Integer(*id))
            .ok_or_else(|| {
                DbError::Validation(format!("Identifier stack does not go back {} level(s)", level))
            });
    }

    let mut missing = None;
    let substituted = VARIABLE.replace_all(text, |caps: &regex::Captures| match vars.get(&caps[1]) {
        Some(value) => value.clone(),
        None => {
            missing.get_or_insert_with(|| caps[0].to_string());
            String::new()
        }
    });
    match missing {
        Some(name) => Err(DbError::Validation(format!("Missing variable declaration for {}", name))),
        None => Ok(Value::Text(substituted.into_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> BTreeMap<String, String> {
        BTreeMap::from([("admin".to_string(), "ada".to_string())])
    }

    #[test]
    fn test_last_id_levels() {
        let stack = [10, 20, 30];
        let json = |s: &str| serde_json::Value::String(s.to_string());
        assert_eq!(resolve(&json("%lastid%"), &vars(), &stack).unwrap(), Value::Integer(30));
        assert_eq!(resolve(&json("%lastid2%"), &vars(), &stack).unwrap(), Value::Integer(20));
        assert_eq!(resolve(&json("%lastid%3"), &vars(), &stack).unwrap(), Value::Integer(10));
        assert!(resolve(&json("%lastid4%"), &vars(), &stack).is_err());
        assert!(resolve(&json("%lastid%"), &vars(), &[]).is_err());
    }

    #[test]
    fn test_variables_are_substituted() {
        let json = serde_json::Value::String("hello %admin%".to_string());
        assert_eq!(resolve(&json, &vars(), &[]).unwrap(), Value::from("hello ada"));

        let missing = serde_json::Value::String("%nobody%".to_string());
        assert!(matches!(resolve(&missing, &vars(), &[]), Err(DbError::Validation(_))));
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(resolve(&serde_json::json!(5), &vars(), &[]).unwrap(), Value::Integer(5));
        assert_eq!(resolve(&serde_json::json!(true), &vars(), &[]).unwrap(), Value::Boolean(true));
        assert!(resolve(&serde_json::json!([1]), &vars(), &[]).is_err());
    }
}
