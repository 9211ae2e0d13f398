//! Data-access traits
//!
//! The filter compiler only builds predicates. Applying them is the job of a
//! [`DataSource`], which is also used by the related-subquery rewrite to fetch
//! the identifiers of matching related rows.

use std::collections::BTreeMap;

use super::error::DataError;
use super::predicate::{AnnotationMap, Predicate};
use super::schema::Schema;
use super::value::Value;

/// A stored row: field name -> value. Relation fields hold the target identifier.
pub type Record = BTreeMap<String, Value>;

/// Applies compiled predicates to stored collections
pub trait DataSource: Send + Sync {
    /// Return every record of `schema` matching `predicate`, with annotations
    /// attached as extra fields. `None` means no filtering.
    fn filter(
        &self,
        schema: &Schema,
        predicate: Option<&Predicate>,
        annotations: &AnnotationMap,
    ) -> Result<Vec<Record>, DataError>;

    /// Identifiers of the matching records
    fn matching_ids(
        &self,
        schema: &Schema,
        predicate: Option<&Predicate>,
        annotations: &AnnotationMap,
    ) -> Result<Vec<Value>, DataError> {
        let id_field = schema.id_field();
        Ok(self
            .filter(schema, predicate, annotations)?
            .into_iter()
            .map(|mut record| record.remove(id_field).unwrap_or(Value::Null))
            .collect())
    }
}
