//! Value function registry
//!
//! A filter value may be a function call instead of a literal:
//! `{"func": "date", "kwargs": {"year": 2020, "month": 10, "day": 31}}`.
//! Functions are evaluated once at compile time with the request context.

mod date;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::data::Value;
use crate::domain::filter::{FilterError, FunctionContext};

pub use date::DateFunctions;

/// Keyword arguments of a function call
pub type Kwargs = serde_json::Map<String, serde_json::Value>;

pub type ValueFunction =
    Arc<dyn Fn(&FunctionContext<'_>, &Kwargs) -> Result<Value, FilterError> + Send + Sync>;

/// Named group of value functions that can be activated together
pub trait FunctionSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn register(&self, registry: &mut FunctionRegistry);
}

/// Function name -> value function
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, ValueFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from sources in order; later sources override earlier ones
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a dyn FunctionSource>) -> Self {
        let mut registry = Self::new();
        for source in sources {
            source.register(&mut registry);
            tracing::trace!(source = source.name(), "Registered function source");
        }
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&FunctionContext<'_>, &Kwargs) -> Result<Value, FilterError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(func));
    }

    pub fn lookup(&self, name: &str) -> Option<&ValueFunction> {
        self.functions.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Built-in function source by name
pub fn source_by_name(name: &str) -> Option<&'static dyn FunctionSource> {
    match name {
        "date" => Some(&DateFunctions),
        _ => None,
    }
}
