//! Predicate evaluation over in-memory records

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use crate::data::error::DataError;
use crate::data::predicate::{AnnotationMap, Expression, Lookup, PATH_DELIMITER, Predicate};
use crate::data::schema::{FieldKind, PathError, Schema, SchemaRegistry};
use crate::data::traits::Record;
use crate::data::value::Value;

/// Evaluates predicates against the records of one snapshot of the store
pub(super) struct Evaluator<'a> {
    tables: &'a FxHashMap<String, Vec<Record>>,
    schemas: &'a SchemaRegistry,
    annotations: &'a AnnotationMap,
}

impl<'a> Evaluator<'a> {
    pub(super) fn new(
        tables: &'a FxHashMap<String, Vec<Record>>,
        schemas: &'a SchemaRegistry,
        annotations: &'a AnnotationMap,
    ) -> Self {
        Self {
            tables,
            schemas,
            annotations,
        }
    }

    /// Annotate and filter every record of `schema`
    pub(super) fn filter(
        &self,
        schema: &Schema,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Record>, DataError> {
        let Some(rows) = self.tables.get(schema.name()) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for row in rows {
            let record = self.annotate(schema, row)?;
            let keep = match predicate {
                Some(p) => self.matches(schema, &record, p)?,
                None => true,
            };
            if keep {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn annotate(&self, schema: &Schema, row: &Record) -> Result<Record, DataError> {
        if self.annotations.is_empty() {
            return Ok(row.clone());
        }
        let mut record = row.clone();
        for (name, expression) in self.annotations {
            let value = self.evaluate_expression(schema, row, expression)?;
            record.insert(name.clone(), value);
        }
        Ok(record)
    }

    fn matches(&self, schema: &Schema, record: &Record, predicate: &Predicate) -> Result<bool, DataError> {
        match predicate {
            Predicate::Condition {
                path,
                lookup,
                value,
            } => {
                let field = if self.annotations.contains_key(path) {
                    record.get(path).cloned().unwrap_or(Value::Null)
                } else {
                    self.resolve_field(schema, record, path)?
                };
                Ok(test_lookup(*lookup, &field, value))
            }
            Predicate::And(items) => {
                for item in items {
                    if !self.matches(schema, record, item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(items) => {
                for item in items {
                    if self.matches(schema, record, item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(inner) => Ok(!self.matches(schema, record, inner)?),
        }
    }

    /// Follow a `__` path through relations. A null or dangling relation yields null.
    fn resolve_field(&self, schema: &Schema, record: &Record, path: &str) -> Result<Value, DataError> {
        let (head, rest) = match path.split_once(PATH_DELIMITER) {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let field = schema.field(head).ok_or_else(|| {
            DataError::path(
                path,
                PathError::UnknownField {
                    schema: schema.name().to_string(),
                    field: head.to_string(),
                },
            )
        })?;
        let value = record.get(head).cloned().unwrap_or(Value::Null);

        let Some(rest) = rest else {
            return Ok(value);
        };

        let FieldKind::Relation { .. } = &field.kind else {
            return Err(DataError::path(
                path,
                PathError::NotARelation {
                    schema: schema.name().to_string(),
                    field: head.to_string(),
                },
            ));
        };
        let target = self
            .schemas
            .relation_target(schema, field)
            .map_err(|e| DataError::path(path, e))?;

        if value.is_null() {
            return Ok(Value::Null);
        }
        match self.find_by_id(&target, &value) {
            Some(related) => self.resolve_field(&target, related, rest),
            None => Ok(Value::Null),
        }
    }

    fn find_by_id(&self, schema: &Schema, id: &Value) -> Option<&'a Record> {
        let id_field = schema.id_field();
        self.tables
            .get(schema.name())?
            .iter()
            .find(|r| r.get(id_field).is_some_and(|v| v.loose_eq(id)))
    }

    fn evaluate_expression(
        &self,
        schema: &Schema,
        record: &Record,
        expression: &Expression,
    ) -> Result<Value, DataError> {
        match expression {
            Expression::Field(path) => self.resolve_field(schema, record, path),
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    if let Some(text) = self.evaluate_expression(schema, record, part)?.as_text() {
                        out.push_str(&text);
                    }
                }
                Ok(Value::Text(out))
            }
            Expression::Lower(inner) => Ok(self
                .evaluate_expression(schema, record, inner)?
                .as_text()
                .map(|s| Value::Text(s.to_lowercase()))
                .unwrap_or(Value::Null)),
            Expression::Coalesce(parts) => {
                for part in parts {
                    let value = self.evaluate_expression(schema, record, part)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(Value::Null)
            }
        }
    }
}

/// Apply one lookup to a resolved field value
pub(super) fn test_lookup(lookup: Lookup, field: &Value, value: &Value) -> bool {
    match lookup {
        Lookup::Exact if value.is_null() => field.is_null(),
        Lookup::Exact => field.loose_eq(value),
        Lookup::Gt => field.compare(value) == Some(Ordering::Greater),
        Lookup::Gte => matches!(
            field.compare(value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Lookup::Lt => field.compare(value) == Some(Ordering::Less),
        Lookup::Lte => matches!(
            field.compare(value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Lookup::In => match value {
            Value::List(items) => items.iter().any(|item| field.loose_eq(item)),
            other => field.loose_eq(other),
        },
        Lookup::IsNull => field.is_null() == value.is_truthy(),
        pattern => test_pattern(pattern, field, value),
    }
}

fn test_pattern(lookup: Lookup, field: &Value, value: &Value) -> bool {
    let (Some(mut haystack), Some(mut needle)) = (field.as_text(), value.as_text()) else {
        return false;
    };
    if lookup.is_case_insensitive() {
        haystack = haystack.to_lowercase();
        needle = needle.to_lowercase();
    }
    match lookup {
        Lookup::IExact => haystack == needle,
        Lookup::Contains | Lookup::IContains => haystack.contains(&needle),
        Lookup::StartsWith | Lookup::IStartsWith => haystack.starts_with(&needle),
        Lookup::EndsWith | Lookup::IEndsWith => haystack.ends_with(&needle),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_null_means_is_null() {
        assert!(test_lookup(Lookup::Exact, &Value::Null, &Value::Null));
        assert!(!test_lookup(Lookup::Exact, &Value::Int(1), &Value::Null));
    }

    #[test]
    fn icontains_on_numbers_uses_text_form() {
        assert!(test_lookup(Lookup::IContains, &Value::Int(2), &Value::Int(2)));
        assert!(!test_lookup(Lookup::IContains, &Value::Int(3), &Value::Int(2)));
        assert!(test_lookup(Lookup::IContains, &Value::from("GROUP1"), &Value::from("p1")));
    }

    #[test]
    fn ordering_with_null_is_false() {
        for lookup in [Lookup::Gt, Lookup::Gte, Lookup::Lt, Lookup::Lte] {
            assert!(!test_lookup(lookup, &Value::Null, &Value::Int(1)));
        }
    }

    #[test]
    fn in_accepts_scalar() {
        assert!(test_lookup(Lookup::In, &Value::Int(1), &Value::Int(1)));
        assert!(test_lookup(
            Lookup::In,
            &Value::from("a"),
            &Value::from(vec!["b", "a"])
        ));
        assert!(!test_lookup(Lookup::In, &Value::Null, &Value::from(vec!["a"])));
    }

    #[test]
    fn is_null_flag() {
        assert!(test_lookup(Lookup::IsNull, &Value::Null, &Value::Bool(true)));
        assert!(test_lookup(Lookup::IsNull, &Value::Int(1), &Value::Bool(false)));
    }

    #[test]
    fn prefix_and_suffix() {
        let field = Value::from("Hello World");
        assert!(test_lookup(Lookup::StartsWith, &field, &Value::from("Hello")));
        assert!(!test_lookup(Lookup::StartsWith, &field, &Value::from("hello")));
        assert!(test_lookup(Lookup::IStartsWith, &field, &Value::from("hello")));
        assert!(test_lookup(Lookup::IEndsWith, &field, &Value::from("WORLD")));
        assert!(test_lookup(Lookup::IExact, &field, &Value::from("hello world")));
    }
}
