// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "complex-filter";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "complex-filter.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "COMPLEX_FILTER_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "COMPLEX_FILTER_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "COMPLEX_FILTER_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "COMPLEX_FILTER_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

// =============================================================================
// Environment Variables - Filter
// =============================================================================

/// Environment variable for the comparison sources (comma separated)
pub const ENV_COMPARISON_SOURCES: &str = "COMPLEX_FILTER_COMPARISON_SOURCES";

/// Environment variable for the value function sources (comma separated)
pub const ENV_VALUE_FUNCTION_SOURCES: &str = "COMPLEX_FILTER_VALUE_FUNCTION_SOURCES";

/// Environment variable for the filter query parameter name
pub const ENV_QUERY_PARAMETER: &str = "COMPLEX_FILTER_QUERY_PARAMETER";

/// Environment variable for the default related lookup field
pub const ENV_DEFAULT_LOOKUP_FIELD: &str = "COMPLEX_FILTER_DEFAULT_LOOKUP_FIELD";

/// Environment variable for the default comparison
pub const ENV_DEFAULT_COMPARISON: &str = "COMPLEX_FILTER_DEFAULT_COMPARISON";

// =============================================================================
// Filter Defaults
// =============================================================================

/// Comparison sources loaded when none are configured
pub const DEFAULT_COMPARISON_SOURCES: &[&str] = &["common", "dynamic"];

/// Value function sources loaded when none are configured
pub const DEFAULT_VALUE_FUNCTION_SOURCES: &[&str] = &["date"];

/// Query parameter carrying the filter JSON
pub const DEFAULT_QUERY_PARAMETER: &str = "filters";

// =============================================================================
// Environment Variables - Data
// =============================================================================

/// Environment variable for the fixtures file
pub const ENV_FIXTURES: &str = "COMPLEX_FILTER_FIXTURES";

/// Environment variable for the actor header name
pub const ENV_ACTOR_HEADER: &str = "COMPLEX_FILTER_ACTOR_HEADER";

/// Header identifying the requesting actor
pub const DEFAULT_ACTOR_HEADER: &str = "x-actor-id";

// =============================================================================
// Request Limits
// =============================================================================

/// Default body limit for API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Shutdown
// =============================================================================

/// Time allowed for in-flight requests to finish after a shutdown signal
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
