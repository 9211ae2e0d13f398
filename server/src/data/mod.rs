//! Data layer
//!
//! Everything the filter compiler needs from the storage side:
//! - `value` - Typed literals with date/number coercion
//! - `predicate` - Composable predicates, annotations and compiled filters
//! - `schema` - Schema introspection (fields, relations, identifier field)
//! - `traits` - The `DataSource` trait that applies predicates
//! - `memory` - In-memory data source loadable from JSON fixtures
//! - `sql` - Parameterized SQL rendering for SQLite and PostgreSQL
//! - `error` - Unified error type for the data layer

pub mod error;
pub mod memory;
pub mod predicate;
pub mod schema;
pub mod sql;
pub mod traits;
pub mod value;

pub use error::DataError;
pub use memory::MemoryStore;
pub use predicate::{AnnotationMap, CompiledFilter, Expression, Lookup, PATH_DELIMITER, Predicate};
pub use schema::{FieldDef, FieldKind, PathError, PathTarget, Schema, SchemaRegistry};
pub use traits::{DataSource, Record};
pub use value::Value;
