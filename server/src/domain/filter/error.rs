//! Filter compilation errors

use thiserror::Error;

use crate::data::{DataError, PathError};

/// Fatal compile errors. Malformed filter text is not an error; it compiles
/// to an empty filter.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Operator has no registered comparison and no default comparison applies
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Related-subquery target could not be resolved
    #[error("Unknown related schema: {0}")]
    UnknownSchema(String),

    /// Attribute path does not resolve against the target schema
    #[error("Invalid attribute '{path}': {source}")]
    UnknownField {
        path: String,
        #[source]
        source: PathError,
    },

    #[error("Filter exceeds maximum size of {max} bytes")]
    TooLarge { max: usize },

    /// Nesting too deep to parse; never treated as malformed input, which
    /// would drop the whole filter
    #[error("Filter exceeds maximum nesting depth of {max}")]
    TooDeep { max: usize },

    /// Value function called with missing or invalid keyword arguments
    #[error("Invalid arguments for {function}(): {message}")]
    FunctionArguments { function: String, message: String },

    /// Data source failure while fetching related identifiers
    #[error(transparent)]
    Data(#[from] DataError),
}

impl FilterError {
    pub fn function_arguments(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FunctionArguments {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownOperator(_) => "UNKNOWN_OPERATOR",
            Self::UnknownSchema(_) => "UNKNOWN_SCHEMA",
            Self::UnknownField { .. } => "UNKNOWN_FIELD",
            Self::TooLarge { .. } => "FILTER_TOO_LARGE",
            Self::TooDeep { .. } => "FILTER_TOO_DEEP",
            Self::FunctionArguments { .. } => "INVALID_FUNCTION_ARGUMENTS",
            Self::Data(_) => "DATA_ERROR",
        }
    }

    /// Whether the error was caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Data(_))
    }
}
