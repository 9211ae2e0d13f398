//! Active comparisons and value functions
//!
//! Built once from configuration and shared read-only by every compile.
//! [`SharedRegistries`] allows swapping the whole set atomically.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::core::config::FilterConfig;
use crate::domain::comparisons::{self, Comparison, ComparisonRegistry, DefaultComparisonFn};
use crate::domain::functions::{self, FunctionRegistry, ValueFunction};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown comparison source: {0}")]
    UnknownComparisonSource(String),

    #[error("Unknown value function source: {0}")]
    UnknownFunctionSource(String),

    #[error("Unknown default comparison: {0}")]
    UnknownDefaultComparison(String),
}

/// Comparisons, value functions and fallbacks used by the compiler
#[derive(Clone, Default)]
pub struct FilterRegistries {
    comparisons: ComparisonRegistry,
    functions: FunctionRegistry,
    default_comparison: Option<DefaultComparisonFn>,
    default_lookup_field: Option<String>,
}

impl FilterRegistries {
    pub fn new(comparisons: ComparisonRegistry, functions: FunctionRegistry) -> Self {
        Self {
            comparisons,
            functions,
            default_comparison: None,
            default_lookup_field: None,
        }
    }

    /// Resolve the configured source names, in order
    pub fn from_config(config: &FilterConfig) -> Result<Self, RegistryError> {
        let mut comparison_sources = Vec::with_capacity(config.comparison_sources.len());
        for name in &config.comparison_sources {
            let source = comparisons::source_by_name(name)
                .ok_or_else(|| RegistryError::UnknownComparisonSource(name.clone()))?;
            comparison_sources.push(source);
        }

        let mut function_sources = Vec::with_capacity(config.value_function_sources.len());
        for name in &config.value_function_sources {
            let source = functions::source_by_name(name)
                .ok_or_else(|| RegistryError::UnknownFunctionSource(name.clone()))?;
            function_sources.push(source);
        }

        let mut registries = Self::new(
            ComparisonRegistry::from_sources(comparison_sources),
            FunctionRegistry::from_sources(function_sources),
        );

        if let Some(name) = &config.default_comparison {
            let func = comparisons::default_comparison_by_name(name)
                .ok_or_else(|| RegistryError::UnknownDefaultComparison(name.clone()))?;
            registries = registries.with_default_comparison(func);
        }
        if let Some(field) = &config.default_lookup_field {
            registries = registries.with_default_lookup_field(field.as_str());
        }

        tracing::debug!(
            comparisons = ?registries.comparisons.names(),
            functions = ?registries.functions.names(),
            default_comparison = ?config.default_comparison,
            default_lookup_field = ?registries.default_lookup_field,
            "Filter registries built"
        );
        Ok(registries)
    }

    pub fn with_default_comparison(mut self, func: DefaultComparisonFn) -> Self {
        self.default_comparison = Some(func);
        self
    }

    pub fn with_default_lookup_field(mut self, field: impl Into<String>) -> Self {
        self.default_lookup_field = Some(field.into());
        self
    }

    pub fn comparisons(&self) -> &ComparisonRegistry {
        &self.comparisons
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn comparison(&self, operator: &str) -> Option<&Comparison> {
        self.comparisons.lookup(operator)
    }

    pub fn function(&self, name: &str) -> Option<&ValueFunction> {
        self.functions.lookup(name)
    }

    pub fn default_comparison(&self) -> Option<&DefaultComparisonFn> {
        self.default_comparison.as_ref()
    }

    pub fn default_lookup_field(&self) -> Option<&str> {
        self.default_lookup_field.as_deref()
    }
}

impl std::fmt::Debug for FilterRegistries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistries")
            .field("comparisons", &self.comparisons.names())
            .field("functions", &self.functions.names())
            .field("default_comparison", &self.default_comparison.is_some())
            .field("default_lookup_field", &self.default_lookup_field)
            .finish()
    }
}

/// Process-wide registries; readers take a snapshot, writers replace the whole set
#[derive(Debug, Default)]
pub struct SharedRegistries {
    inner: RwLock<Arc<FilterRegistries>>,
}

impl SharedRegistries {
    pub fn new(registries: FilterRegistries) -> Self {
        Self {
            inner: RwLock::new(Arc::new(registries)),
        }
    }

    pub fn snapshot(&self) -> Arc<FilterRegistries> {
        Arc::clone(&self.inner.read())
    }

    /// Swap in a new registry set, returning the previous one
    pub fn replace(&self, registries: FilterRegistries) -> Arc<FilterRegistries> {
        std::mem::replace(&mut *self.inner.write(), Arc::new(registries))
    }
}
