//! HTTP middleware (CORS, 404 handler)

use axum::extract::Request;
use axum::http::{HeaderName, Method, header};
use axum::response::IntoResponse;
use tower_http::cors::{Any, CorsLayer};

use super::types::ApiError;

/// Create CORS layer; the service is read-only so any origin may query it
pub fn cors(actor_header: &str) -> CorsLayer {
    let mut headers = vec![header::CONTENT_TYPE, header::ACCEPT, header::CACHE_CONTROL];
    match HeaderName::try_from(actor_header) {
        Ok(name) => headers.push(name),
        Err(e) => tracing::warn!(header = actor_header, error = %e, "Invalid actor header name"),
    }

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(headers)
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!(method = %req.method(), uri = %req.uri(), "[404] No route");
    ApiError::not_found("NOT_FOUND", format!("No route for {}", req.uri().path()))
}
