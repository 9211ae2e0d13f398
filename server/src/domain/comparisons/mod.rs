//! Operator registry
//!
//! A comparison turns `(attribute path, resolved value)` into a compiled
//! filter. Comparisons are grouped into named sources (`common`, `dynamic`)
//! that are activated from configuration; when two active sources define the
//! same operator, the later source wins.

mod common;
mod dynamic;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::data::{CompiledFilter, Lookup, Predicate, Value};
use crate::domain::filter::{FilterError, OperatorContext};

pub use common::CommonComparison;
pub use dynamic::DynamicComparison;

/// Name of the built-in default comparison
pub const NATIVE_LOOKUP: &str = "native_lookup";

pub type ComparisonFn = Arc<
    dyn Fn(&str, &Value, &OperatorContext<'_>) -> Result<CompiledFilter, FilterError> + Send + Sync,
>;

/// Fallback invoked for operators no source defines: `(path, operator, value, ctx)`
pub type DefaultComparisonFn = Arc<
    dyn Fn(&str, &str, &Value, &OperatorContext<'_>) -> Result<CompiledFilter, FilterError>
        + Send
        + Sync,
>;

/// A registered comparison function
#[derive(Clone)]
pub struct Comparison {
    func: ComparisonFn,
    resolves_related: bool,
}

impl Comparison {
    /// Comparison that, applied to a bare relation, is redirected to the
    /// related schema's lookup field(s)
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str, &Value, &OperatorContext<'_>) -> Result<CompiledFilter, FilterError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            func: Arc::new(func),
            resolves_related: true,
        }
    }

    /// Comparison applied to relation keys as-is
    pub fn direct<F>(func: F) -> Self
    where
        F: Fn(&str, &Value, &OperatorContext<'_>) -> Result<CompiledFilter, FilterError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            func: Arc::new(func),
            resolves_related: false,
        }
    }

    pub fn call(
        &self,
        path: &str,
        value: &Value,
        ctx: &OperatorContext<'_>,
    ) -> Result<CompiledFilter, FilterError> {
        (self.func)(path, value, ctx)
    }

    pub fn resolves_related(&self) -> bool {
        self.resolves_related
    }
}

impl std::fmt::Debug for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comparison")
            .field("resolves_related", &self.resolves_related)
            .finish_non_exhaustive()
    }
}

/// Named group of comparisons that can be activated together
pub trait ComparisonSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn register(&self, registry: &mut ComparisonRegistry);
}

/// Operator name -> comparison
#[derive(Debug, Clone, Default)]
pub struct ComparisonRegistry {
    operators: FxHashMap<String, Comparison>,
}

impl ComparisonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from sources in order; later sources override earlier ones
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a dyn ComparisonSource>) -> Self {
        let mut registry = Self::new();
        for source in sources {
            source.register(&mut registry);
            tracing::trace!(source = source.name(), "Registered comparison source");
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, comparison: Comparison) {
        self.operators.insert(name.into(), comparison);
    }

    pub fn lookup(&self, name: &str) -> Option<&Comparison> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Built-in comparison source by name
pub fn source_by_name(name: &str) -> Option<&'static dyn ComparisonSource> {
    match name {
        "common" => Some(&CommonComparison),
        "dynamic" => Some(&DynamicComparison),
        _ => None,
    }
}

/// Built-in default comparison by name
pub fn default_comparison_by_name(name: &str) -> Option<DefaultComparisonFn> {
    match name {
        NATIVE_LOOKUP => {
            let func: DefaultComparisonFn = Arc::new(native_lookup);
            Some(func)
        }
        _ => None,
    }
}

/// Interpret the operator as a native lookup name (`iexact`, `startswith`, ...)
pub fn native_lookup(
    path: &str,
    operator: &str,
    value: &Value,
    _ctx: &OperatorContext<'_>,
) -> Result<CompiledFilter, FilterError> {
    let lookup =
        Lookup::from_name(operator).ok_or_else(|| FilterError::UnknownOperator(operator.to_string()))?;
    let predicate = match lookup {
        Lookup::IsNull => Predicate::is_null(path, value.is_truthy()),
        Lookup::In => Predicate::condition(path, Lookup::In, Value::List(value.clone().into_list())),
        other => Predicate::condition(path, other, value.clone()),
    };
    Ok(predicate.into())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::RequestContext;

    struct Shadow;

    impl ComparisonSource for Shadow {
        fn name(&self) -> &'static str {
            "shadow"
        }

        fn register(&self, registry: &mut ComparisonRegistry) {
            registry.register(
                "=",
                Comparison::direct(|path, _, _| Ok(Predicate::is_null(path, true).into())),
            );
        }
    }

    fn call(registry: &ComparisonRegistry, op: &str, path: &str, value: Value) -> CompiledFilter {
        let schemas = test_support::schemas();
        let schema = schemas.get("Item").unwrap();
        let request = RequestContext::anonymous();
        let ctx = OperatorContext {
            request: &request,
            schema: &schema,
            schemas: &schemas,
        };
        registry.lookup(op).unwrap().call(path, &value, &ctx).unwrap()
    }

    #[test]
    fn builtin_sources_register_operators() {
        let registry = ComparisonRegistry::from_sources([
            source_by_name("common").unwrap(),
            source_by_name("dynamic").unwrap(),
        ]);
        for op in ["=", "!=", "*", "!", ">", ">=", "<", "<=", "in", "not_in", "me", "not_me"] {
            assert!(registry.contains(op), "missing {}", op);
        }
        assert_eq!(registry.len(), 12);
        assert!(registry.lookup("~").is_none());
        assert!(registry.lookup("=").unwrap().resolves_related());
        assert!(!registry.lookup("me").unwrap().resolves_related());
    }

    #[test]
    fn later_sources_override() {
        let registry = ComparisonRegistry::from_sources([&CommonComparison as &dyn ComparisonSource, &Shadow]);
        let result = call(&registry, "=", "name", Value::from("x"));
        assert_eq!(result.predicate, Some(Predicate::is_null("name", true)));

        let registry = ComparisonRegistry::from_sources([&Shadow as &dyn ComparisonSource, &CommonComparison]);
        let result = call(&registry, "=", "name", Value::from("x"));
        assert_eq!(result.predicate, Some(Predicate::exact("name", "x")));
    }

    #[test]
    fn unknown_source_names() {
        assert!(source_by_name("geo").is_none());
        assert!(default_comparison_by_name("fuzzy").is_none());
        assert!(default_comparison_by_name(NATIVE_LOOKUP).is_some());
    }

    #[test]
    fn native_lookup_maps_names() {
        let schemas = test_support::schemas();
        let schema = schemas.get("Item").unwrap();
        let request = RequestContext::anonymous();
        let ctx = OperatorContext {
            request: &request,
            schema: &schema,
            schemas: &schemas,
        };

        let result = native_lookup("name", "istartswith", &Value::from("ab"), &ctx).unwrap();
        assert_eq!(
            result.predicate,
            Some(Predicate::condition("name", Lookup::IStartsWith, "ab"))
        );

        let result = native_lookup("name", "isnull", &Value::Bool(false), &ctx).unwrap();
        assert_eq!(result.predicate, Some(Predicate::is_null("name", false)));

        let result = native_lookup("count", "in", &Value::Int(3), &ctx).unwrap();
        assert_eq!(
            result.predicate,
            Some(Predicate::condition("count", Lookup::In, vec![3]))
        );

        let err = native_lookup("name", "regex", &Value::Null, &ctx).unwrap_err();
        assert!(matches!(err, FilterError::UnknownOperator(op) if op == "regex"));
    }
}
