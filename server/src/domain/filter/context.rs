//! Per-request compile context

use crate::data::{Schema, SchemaRegistry, Value};

/// Identity of the caller, used by context-aware operators
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: Value,
}

/// Everything about the incoming request the compiler may consult
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub actor: Option<Actor>,
}

impl RequestContext {
    /// Context without an authenticated caller
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_actor(id: impl Into<Value>) -> Self {
        Self {
            actor: Some(Actor { id: id.into() }),
        }
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }
}

/// Passed to every comparison function
#[derive(Debug, Clone, Copy)]
pub struct OperatorContext<'a> {
    pub request: &'a RequestContext,
    /// Schema the attribute path is relative to
    pub schema: &'a Schema,
    pub schemas: &'a SchemaRegistry,
}

/// Passed to every value function
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext<'a> {
    pub request: &'a RequestContext,
    pub schema: &'a Schema,
}
