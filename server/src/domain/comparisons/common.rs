//! Common comparison operators
//!
//! | Operator | Meaning                              |
//! |----------|--------------------------------------|
//! | `=`      | equal (`""` on text: empty or null)  |
//! | `!=`     | complement of `=`                    |
//! | `*`      | case-insensitive substring           |
//! | `!`      | complement of `*`                    |
//! | `>` `>=` `<` `<=` | ordering                    |
//! | `in`     | member of a list                     |
//! | `not_in` | complement of `in`                   |

use crate::data::{CompiledFilter, Lookup, Predicate, Value};
use crate::domain::filter::{FilterError, OperatorContext};

use super::{Comparison, ComparisonRegistry, ComparisonSource};

pub struct CommonComparison;

impl ComparisonSource for CommonComparison {
    fn name(&self) -> &'static str {
        "common"
    }

    fn register(&self, registry: &mut ComparisonRegistry) {
        registry.register("=", Comparison::new(|path, value, ctx| Ok(equals(path, value, ctx).into())));
        registry.register(
            "!=",
            Comparison::new(|path, value, ctx| Ok((!equals(path, value, ctx)).into())),
        );
        registry.register(
            "*",
            Comparison::new(|path, value, _| Ok(contains(path, value).into())),
        );
        registry.register(
            "!",
            Comparison::new(|path, value, _| Ok((!contains(path, value)).into())),
        );
        registry.register(">", ordering(Lookup::Gt));
        registry.register(">=", ordering(Lookup::Gte));
        registry.register("<", ordering(Lookup::Lt));
        registry.register("<=", ordering(Lookup::Lte));
        registry.register(
            "in",
            Comparison::new(|path, value, _| Ok(member(path, value).into())),
        );
        registry.register(
            "not_in",
            Comparison::new(|path, value, _| Ok((!member(path, value)).into())),
        );
    }
}

/// Equality; an empty string on a text field also matches null
fn equals(path: &str, value: &Value, ctx: &OperatorContext<'_>) -> Predicate {
    let is_text = ctx
        .schemas
        .field_kind(ctx.schema, path)
        .is_some_and(|kind| kind.is_text());
    match value {
        Value::Text(s) if s.is_empty() && is_text => {
            Predicate::exact(path, "") | Predicate::is_null(path, true)
        }
        _ => Predicate::exact(path, value.clone()),
    }
}

fn contains(path: &str, value: &Value) -> Predicate {
    Predicate::condition(path, Lookup::IContains, value.clone())
}

fn member(path: &str, value: &Value) -> Predicate {
    Predicate::condition(path, Lookup::In, Value::List(value.clone().into_list()))
}

fn ordering(lookup: Lookup) -> Comparison {
    Comparison::new(move |path, value, _| -> Result<CompiledFilter, FilterError> {
        Ok(Predicate::condition(path, lookup, value.clone()).into())
    })
}
