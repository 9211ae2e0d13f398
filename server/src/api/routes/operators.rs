//! Registered operators and value functions

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct OperatorsResponse {
    pub comparisons: Vec<String>,
    pub functions: Vec<String>,
    pub default_comparison: bool,
    pub default_lookup_field: Option<String>,
}

/// Operators and value functions currently accepted by the compiler
pub async fn list_operators(State(state): State<AppState>) -> Json<OperatorsResponse> {
    let registries = state.registries.snapshot();
    let sorted = |mut names: Vec<&str>| {
        names.sort_unstable();
        names.into_iter().map(str::to_string).collect::<Vec<_>>()
    };

    Json(OperatorsResponse {
        comparisons: sorted(registries.comparisons().names()),
        functions: sorted(registries.functions().names()),
        default_comparison: registries.default_comparison().is_some(),
        default_lookup_field: registries.default_lookup_field().map(str::to_string),
    })
}
