//! Recursive filter tree compiler
//!
//! Turns a [`FilterNode`] tree into a [`CompiledFilter`]: an optional predicate
//! plus the annotations it references. Operator nodes are dispatched to the
//! comparison registry; `and`/`or` nodes combine their children.
//!
//! ## Attribute paths
//!
//! - `.` and `__` both cross a relation: `user.username`, `user__username`
//! - `___` compiles the remainder against the related schema as a separate
//!   query and filters by the matching identifiers:
//!   `author___name` becomes `author__id in [ids of authors matching name]`

use serde_json::error::Category;

use crate::data::{
    CompiledFilter, DataSource, PATH_DELIMITER, PathTarget, Record, Schema, SchemaRegistry, Value,
};

use super::context::{FunctionContext, OperatorContext, RequestContext};
use super::error::FilterError;
use super::lookup::{CompareFn, RelatedLookup};
use super::node::{Condition, FilterNode, FilterValue, MAX_FILTER_DEPTH};
use super::registry::FilterRegistries;

/// Maximum size of filter JSON in bytes (64KB)
pub const MAX_FILTER_JSON_SIZE: usize = 64 * 1024;

/// Splits an attribute path into the relation part and the part compiled
/// against the related schema
pub const SUBQUERY_MARKER: &str = "___";

const RELATION_SEPARATOR: char = '.';

/// Compiles filter trees against one set of registries, schemas and data source
pub struct ComplexFilter<'a> {
    registries: &'a FilterRegistries,
    schemas: &'a SchemaRegistry,
    source: &'a dyn DataSource,
}

impl<'a> ComplexFilter<'a> {
    pub fn new(
        registries: &'a FilterRegistries,
        schemas: &'a SchemaRegistry,
        source: &'a dyn DataSource,
    ) -> Self {
        Self {
            registries,
            schemas,
            source,
        }
    }

    /// Compile filter text. Empty, `null` or malformed input compiles to an
    /// empty filter; oversized or overly nested input is an error.
    pub fn compile_str(
        &self,
        input: &str,
        request: &RequestContext,
        schema: &Schema,
    ) -> Result<CompiledFilter, FilterError> {
        if input.len() > MAX_FILTER_JSON_SIZE {
            return Err(FilterError::TooLarge {
                max: MAX_FILTER_JSON_SIZE,
            });
        }
        let input = input.trim();
        if input.is_empty() {
            return Ok(CompiledFilter::empty());
        }

        match serde_json::from_str::<serde_json::Value>(input) {
            Ok(json) => self.compile_json(&json, request, schema),
            Err(e) if is_recursion_limit(&e) => Err(FilterError::TooDeep {
                max: MAX_FILTER_DEPTH,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed filter JSON");
                Ok(CompiledFilter::empty())
            }
        }
    }

    /// Compile an already-parsed JSON tree. Invalid nodes are skipped without
    /// affecting their siblings.
    pub fn compile_json(
        &self,
        json: &serde_json::Value,
        request: &RequestContext,
        schema: &Schema,
    ) -> Result<CompiledFilter, FilterError> {
        if json.is_null() {
            return Ok(CompiledFilter::empty());
        }
        match FilterNode::parse(json)? {
            Some(node) => self.compile(&node, request, schema),
            None => {
                tracing::debug!("Ignoring structurally invalid filter");
                Ok(CompiledFilter::empty())
            }
        }
    }

    pub fn compile(
        &self,
        node: &FilterNode,
        request: &RequestContext,
        schema: &Schema,
    ) -> Result<CompiledFilter, FilterError> {
        match node {
            FilterNode::Operator(condition) => self.compile_condition(condition, request, schema),
            FilterNode::And(children) => {
                let mut result = CompiledFilter::empty();
                for child in children {
                    result.merge_and(self.compile(child, request, schema)?);
                }
                Ok(result)
            }
            FilterNode::Or(children) => {
                let mut result = CompiledFilter::empty();
                for child in children {
                    result.merge_or(self.compile(child, request, schema)?);
                }
                Ok(result)
            }
        }
    }

    /// Compile `input` (if any) and apply it to the records of `schema`
    pub fn filter_records(
        &self,
        input: Option<&str>,
        request: &RequestContext,
        schema: &Schema,
    ) -> Result<Vec<Record>, FilterError> {
        let compiled = match input {
            Some(input) => self.compile_str(input, request, schema)?,
            None => CompiledFilter::empty(),
        };
        let records = self
            .source
            .filter(schema, compiled.predicate.as_ref(), &compiled.annotations)?;
        Ok(records)
    }

    fn compile_condition(
        &self,
        condition: &Condition,
        request: &RequestContext,
        schema: &Schema,
    ) -> Result<CompiledFilter, FilterError> {
        let attribute = normalize_path(&condition.attribute);

        if let Some((main_path, sub_path)) = attribute.split_once(SUBQUERY_MARKER) {
            return self.compile_subquery(main_path, sub_path, condition, request, schema);
        }

        let value = self.resolve_value(condition.value.as_ref(), request, schema)?;
        tracing::trace!(
            schema = schema.name(),
            attribute = %attribute,
            operator = %condition.operator,
            value = %value,
            "Compiling condition"
        );
        self.dispatch(&attribute, &condition.operator, &value, request, schema)
    }

    /// `main___sub`: compile `sub` against the related schema, then filter the
    /// relation by the identifiers it matches
    fn compile_subquery(
        &self,
        main_path: &str,
        sub_path: &str,
        condition: &Condition,
        request: &RequestContext,
        schema: &Schema,
    ) -> Result<CompiledFilter, FilterError> {
        let segment = main_path.rsplit(PATH_DELIMITER).next().unwrap_or(main_path);
        let related = match self.schemas.walk(schema, main_path) {
            Ok(PathTarget::Relation { target, .. }) => target,
            _ => self
                .schemas
                .find_ignore_case(segment)
                .ok_or_else(|| FilterError::UnknownSchema(segment.to_string()))?,
        };

        let sub_condition = Condition {
            attribute: sub_path.to_string(),
            operator: condition.operator.clone(),
            value: condition.value.clone(),
        };
        let sub_filter = self.compile_condition(&sub_condition, request, &related)?;
        let ids = self.source.matching_ids(
            &related,
            sub_filter.predicate.as_ref(),
            &sub_filter.annotations,
        )?;

        let attribute = rewrite_relation_path(main_path, segment, related.id_field());
        tracing::debug!(
            related = related.name(),
            attribute = %attribute,
            matched = ids.len(),
            "Rewrote related subquery"
        );
        self.dispatch(&attribute, "in", &Value::List(ids), request, schema)
    }

    fn resolve_value(
        &self,
        value: Option<&FilterValue>,
        request: &RequestContext,
        schema: &Schema,
    ) -> Result<Value, FilterError> {
        match value {
            None => Ok(Value::Null),
            Some(FilterValue::Literal(json)) => Ok(Value::from(json.clone())),
            Some(FilterValue::Call(call)) => match self.registries.function(&call.func) {
                Some(func) => func(&FunctionContext { request, schema }, &call.kwargs),
                None => {
                    tracing::debug!(function = %call.func, "Unknown value function, using null");
                    Ok(Value::Null)
                }
            },
        }
    }

    fn dispatch(
        &self,
        attribute: &str,
        operator: &str,
        value: &Value,
        request: &RequestContext,
        schema: &Schema,
    ) -> Result<CompiledFilter, FilterError> {
        let comparison = self.registries.comparison(operator);
        let default = self.registries.default_comparison();
        if comparison.is_none() && default.is_none() {
            return Err(FilterError::UnknownOperator(operator.to_string()));
        }

        let target =
            self.schemas
                .walk(schema, attribute)
                .map_err(|source| FilterError::UnknownField {
                    path: attribute.to_string(),
                    source,
                })?;
        let ctx = OperatorContext {
            request,
            schema,
            schemas: self.schemas,
        };

        if let Some(comparison) = comparison {
            if comparison.resolves_related()
                && let PathTarget::Relation { target, .. } = &target
            {
                let compare = |path: &str, value: &Value| comparison.call(path, value, &ctx);
                return self.resolve_related(attribute, operator, value, target, &ctx, &compare);
            }
            return comparison.call(attribute, value, &ctx);
        }

        let Some(default) = default else {
            return Err(FilterError::UnknownOperator(operator.to_string()));
        };
        if let PathTarget::Relation { target, .. } = &target {
            let compare = |path: &str, value: &Value| default(path, operator, value, &ctx);
            return self.resolve_related(attribute, operator, value, target, &ctx, &compare);
        }
        default(attribute, operator, value, &ctx)
    }

    /// Comparison against a bare relation: the related schema's resolver
    /// decides, otherwise the default lookup field, otherwise no filter
    fn resolve_related(
        &self,
        attribute: &str,
        operator: &str,
        value: &Value,
        target: &Schema,
        ctx: &OperatorContext<'_>,
        compare: &CompareFn<'_>,
    ) -> Result<CompiledFilter, FilterError> {
        if let Some(resolver) = target.lookup_resolver() {
            let lookup = RelatedLookup {
                prefix: attribute,
                operator,
                value,
                context: ctx,
                target,
            };
            return resolver.resolve(&lookup, compare);
        }

        if let Some(field) = self.registries.default_lookup_field()
            && target.field(field).is_some()
        {
            let path = format!("{}{}{}", attribute, PATH_DELIMITER, field);
            return compare(&path, value);
        }

        tracing::debug!(
            attribute,
            related = target.name(),
            "No lookup field for relation, condition ignored"
        );
        Ok(CompiledFilter::empty())
    }
}

/// `user.profile.name` -> `user__profile__name`
fn normalize_path(attribute: &str) -> String {
    attribute.replace(RELATION_SEPARATOR, PATH_DELIMITER)
}

/// serde_json refuses input nested deeper than its recursion limit
fn is_recursion_limit(e: &serde_json::Error) -> bool {
    e.classify() == Category::Syntax && e.to_string().starts_with("recursion limit exceeded")
}

/// Replace the final occurrence of `segment` in `path` with `segment__id_field`
fn rewrite_relation_path(path: &str, segment: &str, id_field: &str) -> String {
    match path.rfind(segment) {
        Some(index) => format!(
            "{}{}{}{}{}",
            &path[..index],
            segment,
            PATH_DELIMITER,
            id_field,
            &path[index + segment.len()..]
        ),
        None => format!("{}{}{}", path, PATH_DELIMITER, id_field),
    }
}
