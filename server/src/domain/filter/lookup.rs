//! Related-field lookup resolvers
//!
//! When a comparison targets a relation itself (`"attribute": "author"`), the
//! related schema decides which of its fields the value is compared against.
//! A schema registers a [`LookupResolver`] for that; schemas without one fall
//! back to the configured default lookup field.

use crate::data::{CompiledFilter, Expression, PATH_DELIMITER, Schema, Value};

use super::context::OperatorContext;
use super::error::FilterError;

/// Comparison callback handed to resolvers: `(path, value) -> filter`, using the
/// operator of the original condition
pub type CompareFn<'a> = dyn Fn(&str, &Value) -> Result<CompiledFilter, FilterError> + 'a;

/// Condition that ended at a relation
#[derive(Debug)]
pub struct RelatedLookup<'a> {
    /// Path from the filtered schema to the relation field
    pub prefix: &'a str,
    pub operator: &'a str,
    pub value: &'a Value,
    pub context: &'a OperatorContext<'a>,
    /// The related schema
    pub target: &'a Schema,
}

impl RelatedLookup<'_> {
    /// Path to `field` on the related schema
    pub fn path(&self, field: &str) -> String {
        format!("{}{}{}", self.prefix, PATH_DELIMITER, field)
    }
}

/// Decides how a bare relation is compared
pub trait LookupResolver: Send + Sync {
    fn resolve(
        &self,
        lookup: &RelatedLookup<'_>,
        compare: &CompareFn<'_>,
    ) -> Result<CompiledFilter, FilterError>;
}

/// Compares against several fields of the related schema.
///
/// A single search term is compared against every field: the condition holds
/// when it holds for any field, or for every field when the operator is a
/// negation (`!`, `!=`, `not_in`). Several whitespace-separated terms are
/// paired with the fields in order and must all match.
#[derive(Debug, Clone)]
pub struct MultiFieldLookup {
    fields: Vec<String>,
}

impl MultiFieldLookup {
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl LookupResolver for MultiFieldLookup {
    fn resolve(
        &self,
        lookup: &RelatedLookup<'_>,
        compare: &CompareFn<'_>,
    ) -> Result<CompiledFilter, FilterError> {
        if self.fields.is_empty() {
            return Ok(CompiledFilter::empty());
        }

        let negated = is_negation(lookup.operator);
        let text = lookup.value.as_text().unwrap_or_default();
        let terms: Vec<&str> = text.split_whitespace().collect();

        let mut result = CompiledFilter::empty();
        if terms.len() <= 1 {
            for field in &self.fields {
                let part = compare(&lookup.path(field), lookup.value)?;
                if negated {
                    result.merge_and(part);
                } else {
                    result.merge_or(part);
                }
            }
            return Ok(result);
        }

        for (field, term) in self.fields.iter().zip(terms) {
            let part = compare(&lookup.path(field), &Value::from(term))?;
            if negated {
                result.merge_or(part);
            } else {
                result.merge_and(part);
            }
        }
        Ok(result)
    }
}

fn is_negation(operator: &str) -> bool {
    matches!(operator, "!" | "!=" | "not_in")
}

/// Compares against a concatenation of several related fields, attached as an
/// annotation named `<prefix>_concat`
#[derive(Debug, Clone)]
pub struct ConcatLookup {
    fields: Vec<String>,
    separator: String,
}

impl ConcatLookup {
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            separator: " ".to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl LookupResolver for ConcatLookup {
    fn resolve(
        &self,
        lookup: &RelatedLookup<'_>,
        compare: &CompareFn<'_>,
    ) -> Result<CompiledFilter, FilterError> {
        if self.fields.is_empty() {
            return Ok(CompiledFilter::empty());
        }

        let name = format!("{}_concat", lookup.prefix.replace(PATH_DELIMITER, "_"));
        let mut parts = Vec::with_capacity(self.fields.len() * 2);
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                parts.push(Expression::literal(self.separator.as_str()));
            }
            parts.push(Expression::field(lookup.path(field)));
        }

        Ok(compare(&name, lookup.value)?.with_annotation(name, Expression::Concat(parts)))
    }
}
