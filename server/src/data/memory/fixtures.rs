//! JSON fixtures: schema definitions plus seed records
//!
//! ```json
//! {
//!   "schemas": [
//!     {"name": "Author", "fields": [{"name": "first", "kind": "text"}],
//!      "lookup": {"kind": "concat", "fields": ["first", "last"]}}
//!   ],
//!   "records": {"Author": [{"first": "Ada"}]}
//! }
//! ```

use std::sync::Arc;

use serde::Deserialize;

use crate::data::error::DataError;
use crate::data::schema::{FieldDef, FieldKind, Schema, SchemaRegistry};
use crate::data::traits::Record;
use crate::data::value::{Value, parse_date, parse_datetime};
use crate::domain::filter::{ConcatLookup, LookupResolver, MultiFieldLookup};

#[derive(Debug, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub schemas: Vec<SchemaDef>,
    #[serde(default)]
    pub records: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct SchemaDef {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    /// Identifier field; must also be listed in `fields` unless it is the default `id`
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub lookup: Option<LookupSpec>,
}

/// Declarative related-field resolvers
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupSpec {
    MultiField {
        fields: Vec<String>,
    },
    Concat {
        fields: Vec<String>,
        #[serde(default)]
        separator: Option<String>,
    },
}

impl LookupSpec {
    fn into_resolver(self) -> Arc<dyn LookupResolver> {
        match self {
            Self::MultiField { fields } => Arc::new(MultiFieldLookup::new(fields)),
            Self::Concat { fields, separator } => {
                let mut resolver = ConcatLookup::new(fields);
                if let Some(separator) = separator {
                    resolver = resolver.with_separator(separator);
                }
                Arc::new(resolver)
            }
        }
    }
}

impl FixtureFile {
    pub fn build_schemas(&self) -> Result<SchemaRegistry, DataError> {
        let mut registry = SchemaRegistry::new();
        for def in &self.schemas {
            registry.register(def.build()?);
        }
        Ok(registry)
    }

    /// Record rows per schema name, in file order
    pub fn rows(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.records.iter().flat_map(|(name, rows)| {
            rows.as_array()
                .into_iter()
                .flatten()
                .map(move |row| (name.as_str(), row))
        })
    }
}

impl SchemaDef {
    fn build(&self) -> Result<Schema, DataError> {
        let mut schema = Schema::new(&self.name);
        if let Some(table) = &self.table {
            schema = schema.with_table(table);
        }
        if let Some(id_field) = &self.id_field {
            let def = self
                .fields
                .iter()
                .find(|f| &f.name == id_field)
                .ok_or_else(|| {
                    DataError::invalid_record(
                        &self.name,
                        format!("id_field '{}' is not declared in fields", id_field),
                    )
                })?;
            schema = schema.with_id_field(id_field, def.kind.clone());
        }
        for field in &self.fields {
            if Some(&field.name) != self.id_field.as_ref() {
                schema = schema.with_field_def(field.clone());
            }
        }
        if let Some(spec) = &self.lookup {
            schema = schema.with_lookup(spec.clone().into_resolver());
        }
        Ok(schema)
    }
}

/// Convert a JSON object into a record typed by the schema's field kinds
pub fn coerce_record(schema: &Schema, row: serde_json::Value) -> Result<Record, DataError> {
    let serde_json::Value::Object(map) = row else {
        return Err(DataError::invalid_record(schema.name(), "record must be an object"));
    };

    let mut record = Record::new();
    for (key, json) in map {
        let field = schema.field(&key).ok_or_else(|| {
            DataError::invalid_record(schema.name(), format!("unknown field '{}'", key))
        })?;
        let value = coerce_value(&field.kind, json).ok_or_else(|| {
            DataError::invalid_record(
                schema.name(),
                format!("invalid value for field '{}'", key),
            )
        })?;
        record.insert(key, value);
    }
    Ok(record)
}

fn coerce_value(kind: &FieldKind, json: serde_json::Value) -> Option<Value> {
    if json.is_null() {
        return Some(Value::Null);
    }
    let value = match kind {
        FieldKind::Text => Value::Text(json.as_str()?.to_string()),
        FieldKind::Integer => Value::Int(json.as_i64()?),
        FieldKind::Float => Value::Float(json.as_f64()?),
        FieldKind::Boolean => Value::Bool(json.as_bool()?),
        FieldKind::Date => Value::Date(parse_date(json.as_str()?)?),
        FieldKind::DateTime => Value::DateTime(parse_datetime(json.as_str()?)?),
        FieldKind::Relation { .. } => Value::from(json),
    };
    Some(value)
}
