//! Request extractors for the filter endpoints
//!
//! Both extractors read their names from [`AppState`] so the query parameter
//! and actor header follow configuration.
//!
//! The actor header is taken from the client as-is, so any caller can claim
//! any identity. It is suitable for demos only: put real authentication in
//! front of this service (or derive the actor from a verified token) before
//! relying on `me`/`not_me` for access control.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;

use super::AppState;
use super::types::ApiError;
use crate::data::Value;
use crate::domain::RequestContext;

/// Filter JSON from the configured query parameter, if present
#[derive(Debug, Clone, Default)]
pub struct FilterQuery(pub Option<String>);

impl FromRequestParts<AppState> for FilterQuery {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Query(mut params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request("INVALID_QUERY", e.body_text()))?;
        Ok(Self(params.remove(&*state.query_parameter)))
    }
}

/// Request context built from the configured actor header.
///
/// Numeric header values become integer identifiers so they compare equal to
/// integer relation keys; anything else is kept as text. A missing or blank
/// header means an anonymous request.
#[derive(Debug, Clone, Default)]
pub struct ActorContext(pub RequestContext);

impl FromRequestParts<AppState> for ActorContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(&*state.actor_header) else {
            return Ok(Self(RequestContext::anonymous()));
        };
        let raw = header.to_str().map_err(|_| {
            ApiError::bad_request(
                "INVALID_ACTOR",
                format!("Header {} must be valid ASCII", state.actor_header),
            )
        })?;
        Ok(Self(actor_context(raw)))
    }
}

/// Parse an actor identifier as given on the command line or in a header
pub fn actor_context(raw: &str) -> RequestContext {
    let raw = raw.trim();
    if raw.is_empty() {
        return RequestContext::anonymous();
    }
    let id = match raw.parse::<i64>() {
        Ok(id) => Value::Int(id),
        Err(_) => Value::from(raw),
    };
    RequestContext::with_actor(id)
}
