//! In-memory data source
//!
//! Holds records per schema behind a `parking_lot::RwLock` and evaluates
//! predicates directly. Used by the HTTP service (seeded from a JSON fixtures
//! file) and as the reference data source in tests.

mod evaluate;
mod fixtures;

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use self::evaluate::Evaluator;
use super::error::DataError;
use super::predicate::{AnnotationMap, Predicate};
use super::schema::{FieldKind, Schema, SchemaRegistry};
use super::traits::{DataSource, Record};
use super::value::Value;

pub use fixtures::FixtureFile;

pub struct MemoryStore {
    schemas: Arc<SchemaRegistry>,
    tables: RwLock<FxHashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self {
            schemas,
            tables: RwLock::new(FxHashMap::default()),
        }
    }

    /// Build schemas and records from a fixtures file
    pub fn from_fixture_file(path: &Path) -> Result<Self, DataError> {
        tracing::debug!(path = %path.display(), "Loading fixtures");
        let content = std::fs::read_to_string(path)?;
        Self::from_fixture_str(&content)
    }

    pub fn from_fixture_str(json: &str) -> Result<Self, DataError> {
        let file: FixtureFile = serde_json::from_str(json)?;
        let schemas = file.build_schemas()?;
        let store = Self::new(Arc::new(schemas));
        for (schema_name, row) in file.rows() {
            store.insert_json(schema_name, row.clone())?;
        }
        tracing::debug!(
            schemas = store.schemas.len(),
            records = store.total_records(),
            "Fixtures loaded"
        );
        Ok(store)
    }

    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    /// Insert a JSON object, coercing values to the schema's field kinds
    pub fn insert_json(&self, schema_name: &str, row: serde_json::Value) -> Result<Value, DataError> {
        let schema = self.schema(schema_name)?;
        let record = fixtures::coerce_record(&schema, row)?;
        self.insert_record(&schema, record)
    }

    /// Insert a record, assigning the next integer identifier when it has none.
    /// Returns the record's identifier.
    pub fn insert(&self, schema_name: &str, record: Record) -> Result<Value, DataError> {
        let schema = self.schema(schema_name)?;
        self.insert_record(&schema, record)
    }

    fn insert_record(&self, schema: &Schema, mut record: Record) -> Result<Value, DataError> {
        for key in record.keys() {
            if schema.field(key).is_none() {
                return Err(DataError::invalid_record(
                    schema.name(),
                    format!("unknown field '{}'", key),
                ));
            }
        }

        let mut tables = self.tables.write();
        let rows = tables.entry(schema.name().to_string()).or_default();
        let id_field = schema.id_field();

        let id = match record.get(id_field) {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                let is_integer = schema
                    .field(id_field)
                    .is_some_and(|f| f.kind == FieldKind::Integer);
                if !is_integer {
                    return Err(DataError::invalid_record(
                        schema.name(),
                        format!("missing identifier '{}'", id_field),
                    ));
                }
                let next = rows
                    .iter()
                    .filter_map(|r| match r.get(id_field) {
                        Some(Value::Int(i)) => Some(*i),
                        _ => None,
                    })
                    .max()
                    .unwrap_or(0)
                    + 1;
                Value::Int(next)
            }
        };

        if rows
            .iter()
            .any(|r| r.get(id_field).is_some_and(|v| v.loose_eq(&id)))
        {
            return Err(DataError::invalid_record(
                schema.name(),
                format!("duplicate identifier {}", id),
            ));
        }

        record.insert(id_field.to_string(), id.clone());
        rows.push(record);
        Ok(id)
    }

    /// Number of records stored for a schema
    pub fn count(&self, schema_name: &str) -> usize {
        self.tables.read().get(schema_name).map_or(0, Vec::len)
    }

    pub fn total_records(&self) -> usize {
        self.tables.read().values().map(Vec::len).sum()
    }

    fn schema(&self, name: &str) -> Result<Arc<Schema>, DataError> {
        self.schemas
            .get(name)
            .ok_or_else(|| DataError::UnknownSchema(name.to_string()))
    }
}

impl DataSource for MemoryStore {
    fn filter(
        &self,
        schema: &Schema,
        predicate: Option<&Predicate>,
        annotations: &AnnotationMap,
    ) -> Result<Vec<Record>, DataError> {
        if self.schemas.get(schema.name()).is_none() {
            return Err(DataError::UnknownSchema(schema.name().to_string()));
        }
        let tables = self.tables.read();
        let rows = Evaluator::new(&tables, &self.schemas, annotations).filter(schema, predicate)?;
        tracing::trace!(schema = schema.name(), matched = rows.len(), "Filtered records");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::predicate::{Expression, Lookup};
    use serde_json::json;

    const FIXTURES: &str = r#"{
        "schemas": [
            {"name": "Parent", "fields": [
                {"name": "label", "kind": "text"},
                {"name": "child", "kind": "relation", "target": "Child"}
            ]},
            {"name": "Child", "fields": [
                {"name": "name", "kind": "text"},
                {"name": "born", "kind": "date"}
            ]}
        ],
        "records": {
            "Child": [
                {"id": 1, "name": "X", "born": "2020-01-01"},
                {"id": 2, "name": "Y", "born": "2021-06-30"}
            ],
            "Parent": [
                {"label": "p1", "child": 1},
                {"label": "p2", "child": 2},
                {"label": "p3", "child": null}
            ]
        }
    }"#;

    fn store() -> MemoryStore {
        MemoryStore::from_fixture_str(FIXTURES).unwrap()
    }

    fn labels(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| r["label"].to_string())
            .collect()
    }

    #[test]
    fn loads_fixtures_with_generated_ids() {
        let store = store();
        assert_eq!(store.count("Parent"), 3);
        assert_eq!(store.count("Child"), 2);
        assert_eq!(store.total_records(), 5);

        let parent = store.schemas().get("Parent").unwrap();
        let ids = store
            .matching_ids(&parent, None, &AnnotationMap::new())
            .unwrap();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn coerces_dates() {
        let store = store();
        let child = store.schemas().get("Child").unwrap();
        let p = Predicate::condition("born", Lookup::Gt, "2020-06-01");
        let rows = store.filter(&child, Some(&p), &AnnotationMap::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("Y"));
    }

    #[test]
    fn filters_through_relation() {
        let store = store();
        let parent = store.schemas().get("Parent").unwrap();
        let p = Predicate::exact("child__name", "X");
        let rows = store.filter(&parent, Some(&p), &AnnotationMap::new()).unwrap();
        assert_eq!(labels(&rows), vec!["p1"]);
    }

    #[test]
    fn null_relation_resolves_to_null() {
        let store = store();
        let parent = store.schemas().get("Parent").unwrap();
        let p = Predicate::is_null("child__name", true);
        let rows = store.filter(&parent, Some(&p), &AnnotationMap::new()).unwrap();
        assert_eq!(labels(&rows), vec!["p3"]);
    }

    #[test]
    fn annotations_are_attached_and_filterable() {
        let store = store();
        let parent = store.schemas().get("Parent").unwrap();
        let mut annotations = AnnotationMap::new();
        annotations.insert(
            "summary".to_string(),
            Expression::Concat(vec![
                Expression::field("label"),
                Expression::literal("/"),
                Expression::field("child__name"),
            ]),
        );
        let p = Predicate::condition("summary", Lookup::IContains, "p2/y");
        let rows = store.filter(&parent, Some(&p), &annotations).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["summary"], Value::from("p2/Y"));
    }

    #[test]
    fn rejects_unknown_fields_and_duplicate_ids() {
        let store = store();
        let err = store
            .insert_json("Child", json!({"nickname": "z"}))
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidRecord { .. }));

        let err = store.insert_json("Child", json!({"id": 1, "name": "dup"})).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn unknown_schema_is_an_error() {
        let store = store();
        let stray = Schema::new("Stray");
        assert!(matches!(
            store.filter(&stray, None, &AnnotationMap::new()),
            Err(DataError::UnknownSchema(_))
        ));
    }
}
