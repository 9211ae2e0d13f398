//! API server initialization

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::middleware;
use super::routes::{health, operators, schemas};
use super::types::ApiError;
use crate::core::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::data::{MemoryStore, Schema};
use crate::domain::SharedRegistries;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub registries: Arc<SharedRegistries>,
    pub store: Arc<MemoryStore>,
    /// Query parameter carrying the filter JSON
    pub query_parameter: Arc<str>,
    /// Header identifying the actor (lowercase)
    pub actor_header: Arc<str>,
}

impl AppState {
    pub fn new(
        registries: Arc<SharedRegistries>,
        store: Arc<MemoryStore>,
        query_parameter: &str,
        actor_header: &str,
    ) -> Self {
        Self {
            registries,
            store,
            query_parameter: Arc::from(query_parameter),
            actor_header: Arc::from(actor_header.to_lowercase()),
        }
    }

    pub fn from_app(app: &CoreApp) -> Self {
        Self::new(
            Arc::clone(&app.registries),
            Arc::clone(&app.store),
            &app.config.filter.query_parameter,
            &app.config.data.actor_header,
        )
    }

    /// Schema by exact name, 404 otherwise
    pub fn schema(&self, name: &str) -> Result<Arc<Schema>, ApiError> {
        self.store.schemas().get(name).ok_or_else(|| {
            ApiError::not_found("SCHEMA_NOT_FOUND", format!("Unknown schema: {}", name))
        })
    }
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    let cors = middleware::cors(&state.actor_header);

    Router::new()
        .route("/api/v1/health", get(health::health))
        .route("/api/v1/operators", get(operators::list_operators))
        .nest("/api/v1/schemas", schemas::routes())
        .fallback(middleware::handle_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
}

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Serve until the shutdown signal, then allow in-flight requests the
    /// grace period to finish
    pub async fn start(self) -> Result<()> {
        let app = self.app;
        let shutdown = app.shutdown.clone();
        let state = AppState::from_app(&app);

        let host = app.config.server.host.as_str();
        let port = app.config.server.port;
        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", host, port))?;
        tracing::info!(address = %listener.local_addr()?, "Server listening");

        let server = axum::serve(listener, router(state)).with_graceful_shutdown(shutdown.wait());

        tokio::select! {
            result = server.into_future() => result?,
            _ = shutdown.deadline() => {
                tracing::warn!("Graceful shutdown timed out, dropping open connections");
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::app::DEMO_FIXTURES;
    use crate::core::config::FilterConfig;
    use crate::domain::FilterRegistries;

    fn state_with(config: FilterConfig) -> AppState {
        let store = MemoryStore::from_fixture_str(DEMO_FIXTURES).unwrap();
        let registries = FilterRegistries::from_config(&config).unwrap();
        AppState::new(
            Arc::new(SharedRegistries::new(registries)),
            Arc::new(store),
            &config.query_parameter,
            "X-Actor-Id",
        )
    }

    fn state() -> AppState {
        state_with(FilterConfig::default())
    }

    fn encode(input: &str) -> String {
        input
            .bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    (b as char).to_string()
                }
                _ => format!("%{:02X}", b),
            })
            .collect()
    }

    fn op(attribute: &str, operator: &str, value: Value) -> Value {
        json!({"type": "operator", "data": {"attribute": attribute, "operator": operator, "value": value}})
    }

    fn filtered(path: &str, filter: &Value) -> String {
        format!("{}?filters={}", path, encode(&filter.to_string()))
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        send(state, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    fn titles(body: &Value) -> Vec<&str> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["title"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(state(), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_records_without_filter() {
        let (status, body) = get(state(), "/api/v1/schemas/Task/records").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 6);
        assert_eq!(body["data"][0]["due"], "2020-11-02");
    }

    #[tokio::test]
    async fn test_records_with_filter() {
        let filter = json!({"type": "and", "data": [
            op("team", "=", json!("GROUP3")),
            op("done", "=", json!(false)),
        ]});
        let uri = filtered("/api/v1/schemas/Task/records", &filter);
        let (status, body) = get(state(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(titles(&body), vec!["Ship release", "Draft docs"]);
    }

    #[tokio::test]
    async fn test_malformed_filter_returns_everything() {
        let (status, body) = get(state(), "/api/v1/schemas/Task/records?filters=%7Bnope").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 6);
    }

    #[tokio::test]
    async fn test_me_uses_actor_header() {
        let uri = filtered("/api/v1/schemas/Task/records", &op("owner", "me", Value::Null));
        let request = Request::get(&uri)
            .header("x-actor-id", "1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(titles(&body), vec!["Write parser", "Review schema"]);

        // Anonymous requests match unowned records
        let (_, body) = get(state(), &uri).await;
        assert_eq!(titles(&body), vec!["Ship release", "Draft docs"]);
    }

    #[tokio::test]
    async fn test_related_lookups() {
        let uri = filtered(
            "/api/v1/schemas/Task/records",
            &op("author", "*", json!("grace hop")),
        );
        let (_, body) = get(state(), &uri).await;
        assert_eq!(titles(&body), vec!["Write parser", "Ship release"]);

        let uri = filtered(
            "/api/v1/schemas/Task/records",
            &op("author___last", "=", json!("Dijkstra")),
        );
        let (_, body) = get(state(), &uri).await;
        assert_eq!(titles(&body), vec!["Fix login", "Tune queries"]);

        let uri = filtered(
            "/api/v1/schemas/Task/records",
            &op("owner", "*", json!("alan@")),
        );
        let (_, body) = get(state(), &uri).await;
        assert_eq!(titles(&body), vec!["Fix login", "Tune queries"]);
    }

    #[tokio::test]
    async fn test_unknown_operator_is_bad_request() {
        let uri = filtered("/api/v1/schemas/Task/records", &op("team", "~", json!("x")));
        let (status, body) = get(state(), &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert_eq!(body["code"], "UNKNOWN_OPERATOR");
    }

    #[tokio::test]
    async fn test_unknown_field_is_bad_request() {
        let uri = filtered("/api/v1/schemas/Task/records", &op("colour", "=", json!("x")));
        let (status, body) = get(state(), &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "UNKNOWN_FIELD");
    }

    #[tokio::test]
    async fn test_overly_nested_filter_is_bad_request() {
        let condition = op("priority", "=", json!(2)).to_string();
        let filter = format!(
            "{}{}{}",
            r#"{"type": "and", "data": ["#.repeat(130),
            condition,
            "]}".repeat(130)
        );
        let uri = format!("/api/v1/schemas/Task/records?filters={}", encode(&filter));
        let (status, body) = get(state(), &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "FILTER_TOO_DEEP");
    }

    #[tokio::test]
    async fn test_unknown_schema_is_not_found() {
        let (status, body) = get(state(), "/api/v1/schemas/Nope/records").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "SCHEMA_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_custom_query_parameter() {
        let state = state_with(FilterConfig {
            query_parameter: "q".to_string(),
            ..Default::default()
        });
        let filter = encode(&op("priority", ">=", json!(4)).to_string());
        let (_, body) = get(state.clone(), &format!("/api/v1/schemas/Task/records?q={}", filter)).await;
        assert_eq!(body["count"], 2);

        // The default name is ignored once reconfigured
        let (_, body) = get(state, &format!("/api/v1/schemas/Task/records?filters={}", filter)).await;
        assert_eq!(body["count"], 6);
    }

    #[tokio::test]
    async fn test_sql_endpoint() {
        let uri = format!(
            "{}&dialect=postgres",
            filtered("/api/v1/schemas/Task/sql", &op("team", "*", json!("p3")))
        );
        let (status, body) = get(state(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dialect"], "postgres");
        assert_eq!(
            body["sql"],
            "SELECT t0.* FROM tasks AS t0 WHERE t0.team ILIKE $1 ESCAPE '\\'"
        );
        assert_eq!(body["params"], json!(["%p3%"]));
    }

    #[tokio::test]
    async fn test_sql_endpoint_rejects_unknown_dialect() {
        let (status, body) = get(state(), "/api/v1/schemas/Task/sql?dialect=oracle").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_DIALECT");
    }

    #[tokio::test]
    async fn test_list_schemas_and_operators() {
        let (status, body) = get(state(), "/api/v1/schemas").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Author", "Category", "Task", "User"]);

        let (status, body) = get(state(), "/api/v1/operators").await;
        assert_eq!(status, StatusCode::OK);
        let comparisons = body["comparisons"].as_array().unwrap();
        assert!(comparisons.contains(&json!("me")));
        assert!(comparisons.contains(&json!("not_in")));
        assert_eq!(body["functions"], json!(["date", "now"]));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, body) = get(state(), "/api/v2/nothing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
