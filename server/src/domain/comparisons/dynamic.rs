//! Context-aware operators
//!
//! `me` matches records owned by the current actor, `not_me` everything else.
//! Without an actor `me` matches unowned records. The condition value is
//! ignored.

use crate::data::Predicate;
use crate::domain::filter::OperatorContext;

use super::{Comparison, ComparisonRegistry, ComparisonSource};

pub struct DynamicComparison;

impl ComparisonSource for DynamicComparison {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn register(&self, registry: &mut ComparisonRegistry) {
        registry.register("me", Comparison::direct(|path, _, ctx| Ok(owned_by_actor(path, ctx).into())));
        registry.register(
            "not_me",
            Comparison::direct(|path, _, ctx| Ok((!owned_by_actor(path, ctx)).into())),
        );
    }
}

fn owned_by_actor(path: &str, ctx: &OperatorContext<'_>) -> Predicate {
    match ctx.request.actor() {
        Some(actor) => Predicate::exact(path, actor.id.clone()),
        None => Predicate::is_null(path, true),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;
    use crate::data::Value;
    use crate::domain::filter::RequestContext;

    fn compile(op: &str, request: &RequestContext) -> Option<Predicate> {
        let mut registry = ComparisonRegistry::new();
        DynamicComparison.register(&mut registry);
        let schemas = test_support::schemas();
        let schema = schemas.get("Item").unwrap();
        let ctx = OperatorContext {
            request,
            schema: &schema,
            schemas: &schemas,
        };
        registry
            .lookup(op)
            .unwrap()
            .call("owner", &Value::from("ignored"), &ctx)
            .unwrap()
            .predicate
    }

    #[test]
    fn me_with_actor() {
        let request = RequestContext::with_actor(7);
        assert_eq!(compile("me", &request), Some(Predicate::exact("owner", 7)));
        assert_eq!(compile("not_me", &request), Some(!Predicate::exact("owner", 7)));
    }

    #[test]
    fn me_without_actor() {
        let request = RequestContext::anonymous();
        assert_eq!(compile("me", &request), Some(Predicate::is_null("owner", true)));
        assert_eq!(
            compile("not_me", &request),
            Some(!Predicate::is_null("owner", true))
        );
    }
}
