//! Shared API types
//!
//! Error responses and the response bodies shared by the schema endpoints.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::data::{DataError, Record};
use crate::domain::FilterError;

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Filter errors caused by the request map to 400 with the error's code
    pub fn from_filter(e: FilterError) -> Self {
        if e.is_client_error() {
            tracing::debug!(error = %e, code = e.code(), "Rejected filter");
            return Self::bad_request(e.code(), e.to_string());
        }
        tracing::error!(error = %e, "Filter evaluation failed");
        Self::internal("Filter evaluation failed")
    }

    pub fn from_data(e: DataError) -> Self {
        tracing::error!(error = %e, "Data error");
        Self::internal("Data operation failed")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

/// Matching records of one schema
#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub data: Vec<Record>,
    pub count: usize,
}

impl From<Vec<Record>> for RecordsResponse {
    fn from(data: Vec<Record>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PathError;

    #[test]
    fn test_filter_errors_map_to_bad_request() {
        let err = ApiError::from_filter(FilterError::UnknownOperator("~".into()));
        match err {
            ApiError::BadRequest { code, message } => {
                assert_eq!(code, "UNKNOWN_OPERATOR");
                assert!(message.contains('~'));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = ApiError::from_filter(FilterError::UnknownField {
            path: "nope".into(),
            source: PathError::UnknownField {
                schema: "Task".into(),
                field: "nope".into(),
            },
        });
        assert!(matches!(err, ApiError::BadRequest { ref code, .. } if code == "UNKNOWN_FIELD"));
    }

    #[test]
    fn test_data_errors_map_to_internal() {
        let err = ApiError::from_filter(FilterError::Data(DataError::UnknownSchema("Task".into())));
        assert!(matches!(err, ApiError::Internal { .. }));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::bad_request("X", "x").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("X", "x").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::internal("x").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
