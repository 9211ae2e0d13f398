//! Schema endpoints: filtered records and rendered SQL

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::extractors::{ActorContext, FilterQuery};
use crate::api::AppState;
use crate::api::types::{ApiError, RecordsResponse};
use crate::data::sql::{Backend, SqlQuery, render_select};
use crate::data::{FieldDef, MemoryStore, Schema};
use crate::domain::{ComplexFilter, FilterError};

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SchemaSummary {
    pub name: String,
    pub table: String,
    pub id_field: String,
    pub fields: Vec<FieldDef>,
    pub lookup: bool,
}

impl From<&Schema> for SchemaSummary {
    fn from(schema: &Schema) -> Self {
        Self {
            name: schema.name().to_string(),
            table: schema.table().to_string(),
            id_field: schema.id_field().to_string(),
            fields: schema.fields().to_vec(),
            lookup: schema.lookup_resolver().is_some(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SqlParams {
    pub dialect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SqlResponse {
    pub dialect: &'static str,
    #[serde(flatten)]
    pub query: SqlQuery,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_schemas))
        .route("/{schema}/records", get(list_records))
        .route("/{schema}/sql", get(render_sql))
}

/// List registered schemas and their fields
pub async fn list_schemas(State(state): State<AppState>) -> Json<Vec<SchemaSummary>> {
    let schemas = state.store.schemas();
    let mut names = schemas.names();
    names.sort_unstable();
    let summaries = names
        .into_iter()
        .filter_map(|name| schemas.get(name))
        .map(|schema| SchemaSummary::from(schema.as_ref()))
        .collect();
    Json(summaries)
}

/// Records of `schema` matching the filter in the query string
pub async fn list_records(
    State(state): State<AppState>,
    Path(schema_name): Path<String>,
    FilterQuery(filter): FilterQuery,
    ActorContext(request): ActorContext,
) -> Result<Json<RecordsResponse>, ApiError> {
    let schema = state.schema(&schema_name)?;
    let records = run_blocking(&state, move |compiler, _| {
        compiler.filter_records(filter.as_deref(), &request, &schema)
    })
    .await?;

    tracing::debug!(schema = %schema_name, matched = records.len(), "Filtered records");
    Ok(Json(records.into()))
}

/// Parameterized SQL equivalent of the filter in the query string
pub async fn render_sql(
    State(state): State<AppState>,
    Path(schema_name): Path<String>,
    Query(params): Query<SqlParams>,
    FilterQuery(filter): FilterQuery,
    ActorContext(request): ActorContext,
) -> Result<Json<SqlResponse>, ApiError> {
    let backend = match params.dialect.as_deref() {
        None => Backend::default(),
        Some(name) => Backend::parse(name).ok_or_else(|| {
            ApiError::bad_request(
                "INVALID_DIALECT",
                format!("Unknown SQL dialect '{}'. Valid options: sqlite, postgres", name),
            )
        })?,
    };
    let schema = state.schema(&schema_name)?;

    let query = run_blocking(&state, move |compiler, store| {
        let compiled = match filter.as_deref() {
            Some(input) => compiler.compile_str(input, &request, &schema)?,
            None => Default::default(),
        };
        let query = render_select(
            backend.dialect(),
            store.schemas(),
            &schema,
            compiled.predicate.as_ref(),
            &compiled.annotations,
        )?;
        Ok(query)
    })
    .await?;

    Ok(Json(SqlResponse {
        dialect: backend.name(),
        query,
    }))
}

/// Compile on the blocking pool; related subqueries evaluate against the store
async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ComplexFilter<'_>, &MemoryStore) -> Result<T, FilterError> + Send + 'static,
{
    let registries = state.registries.snapshot();
    let store: Arc<MemoryStore> = Arc::clone(&state.store);

    tokio::task::spawn_blocking(move || {
        let compiler = ComplexFilter::new(&registries, store.schemas(), store.as_ref());
        f(&compiler, &store)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Filter task failed");
        ApiError::internal("Filter task failed")
    })?
    .map_err(ApiError::from_filter)
}
