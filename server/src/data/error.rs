//! Unified error type for the data layer

use thiserror::Error;

use super::schema::PathError;

/// Errors raised by data sources, fixtures and the SQL renderer
#[derive(Error, Debug)]
pub enum DataError {
    /// Schema is not registered with the data source
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    /// Attribute path could not be resolved against a schema
    #[error("Invalid path '{path}': {source}")]
    Path {
        path: String,
        #[source]
        source: PathError,
    },

    /// Name cannot be interpolated into SQL
    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    /// Fixture record does not match its schema
    #[error("Invalid record for {schema}: {message}")]
    InvalidRecord { schema: String, message: String },

    /// Fixture file could not be parsed
    #[error("Fixture parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    pub fn path(path: impl Into<String>, source: PathError) -> Self {
        Self::Path {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_record(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            schema: schema.into(),
            message: message.into(),
        }
    }
}
