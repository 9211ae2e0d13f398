//! JSON filter tree compiler
//!
//! Translates a JSON boolean expression tree into a [`CompiledFilter`]
//! (predicate plus annotations) for a target schema:
//!
//! ```no_run
//! use complex_filter_server::data::MemoryStore;
//! use complex_filter_server::domain::filter::{ComplexFilter, FilterRegistries, RequestContext};
//!
//! # fn run(store: &MemoryStore, registries: &FilterRegistries) -> Result<(), Box<dyn std::error::Error>> {
//! let schema = store.schemas().get("Book").ok_or("no schema")?;
//! let compiler = ComplexFilter::new(registries, store.schemas(), store);
//! let json = r#"{"type": "operator", "data": {"attribute": "title", "operator": "*", "value": "rust"}}"#;
//! let records = compiler.filter_records(Some(json), &RequestContext::anonymous(), &schema)?;
//! # Ok(())
//! # }
//! ```

mod compiler;
mod context;
mod error;
mod lookup;
mod node;
mod registry;


pub use compiler::{ComplexFilter, MAX_FILTER_JSON_SIZE, SUBQUERY_MARKER};
pub use context::{Actor, FunctionContext, OperatorContext, RequestContext};
pub use error::FilterError;
pub use lookup::{CompareFn, ConcatLookup, LookupResolver, MultiFieldLookup, RelatedLookup};
pub use node::{Condition, FilterNode, FilterValue, FunctionCall};
pub use registry::{FilterRegistries, RegistryError, SharedRegistries};
