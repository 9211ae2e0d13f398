use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::FilterRegistries;
use crate::utils::path::expand_path;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_ACTOR_HEADER, DEFAULT_COMPARISON_SOURCES, DEFAULT_HOST,
    DEFAULT_PORT, DEFAULT_QUERY_PARAMETER, DEFAULT_VALUE_FUNCTION_SOURCES,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Filter compiler configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FilterFileConfig {
    pub comparison_sources: Option<Vec<String>>,
    pub value_function_sources: Option<Vec<String>>,
    pub query_parameter: Option<String>,
    pub default_lookup_field: Option<String>,
    pub default_comparison: Option<String>,
}

/// Data configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DataFileConfig {
    pub fixtures: Option<String>,
    pub actor_header: Option<String>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub filter: Option<FilterFileConfig>,
    pub data: Option<DataFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        if let Some(filter) = other.filter {
            let current = self.filter.get_or_insert_with(FilterFileConfig::default);
            if filter.comparison_sources.is_some() {
                tracing::trace!(sources = ?filter.comparison_sources, "Merging filter.comparison_sources");
                current.comparison_sources = filter.comparison_sources;
            }
            if filter.value_function_sources.is_some() {
                tracing::trace!(sources = ?filter.value_function_sources, "Merging filter.value_function_sources");
                current.value_function_sources = filter.value_function_sources;
            }
            if filter.query_parameter.is_some() {
                tracing::trace!(name = ?filter.query_parameter, "Merging filter.query_parameter");
                current.query_parameter = filter.query_parameter;
            }
            if filter.default_lookup_field.is_some() {
                tracing::trace!(field = ?filter.default_lookup_field, "Merging filter.default_lookup_field");
                current.default_lookup_field = filter.default_lookup_field;
            }
            if filter.default_comparison.is_some() {
                tracing::trace!(name = ?filter.default_comparison, "Merging filter.default_comparison");
                current.default_comparison = filter.default_comparison;
            }
        }

        if let Some(data) = other.data {
            let current = self.data.get_or_insert_with(DataFileConfig::default);
            if data.fixtures.is_some() {
                tracing::trace!(fixtures = ?data.fixtures, "Merging data.fixtures");
                current.fixtures = data.fixtures;
            }
            if data.actor_header.is_some() {
                tracing::trace!(header = ?data.actor_header, "Merging data.actor_header");
                current.actor_header = data.actor_header;
            }
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Filter compiler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// Comparison sources, registered in order (later sources override)
    pub comparison_sources: Vec<String>,
    /// Value function sources, registered in order
    pub value_function_sources: Vec<String>,
    /// Query parameter carrying the filter JSON
    pub query_parameter: String,
    /// Field compared when a condition targets a relation without its own resolver
    pub default_lookup_field: Option<String>,
    /// Comparison used for operators missing from the registry
    pub default_comparison: Option<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            comparison_sources: to_strings(DEFAULT_COMPARISON_SOURCES),
            value_function_sources: to_strings(DEFAULT_VALUE_FUNCTION_SOURCES),
            query_parameter: DEFAULT_QUERY_PARAMETER.to_string(),
            default_lookup_field: None,
            default_comparison: None,
        }
    }
}

/// Data configuration
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Fixtures file seeding the in-memory store
    pub fixtures: Option<PathBuf>,
    /// Header identifying the requesting actor
    pub actor_header: String,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub filter: FilterConfig,
    pub data: DataConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();

        // 1. Load from CLI-specified path OR local directory
        let config_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = &config_path {
            let loaded = FileConfig::load_from_file(path)?;
            loaded.warn_unknown_fields();
            file_config.merge(loaded);
        }
        tracing::debug!(config = ?config_path, "Config file resolved");

        // 2. Extract file config values with defaults
        let file_server = file_config.server.unwrap_or_default();
        let file_filter = file_config.filter.unwrap_or_default();
        let file_data = file_config.data.unwrap_or_default();
        let defaults = FilterConfig::default();

        // 3. Layer configs: defaults -> file config -> CLI/env overrides
        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let filter = FilterConfig {
            comparison_sources: cli
                .comparison_sources
                .clone()
                .or(file_filter.comparison_sources)
                .unwrap_or(defaults.comparison_sources),
            value_function_sources: cli
                .value_function_sources
                .clone()
                .or(file_filter.value_function_sources)
                .unwrap_or(defaults.value_function_sources),
            query_parameter: cli
                .query_parameter
                .clone()
                .or(file_filter.query_parameter)
                .unwrap_or(defaults.query_parameter),
            default_lookup_field: cli
                .default_lookup_field
                .clone()
                .or(file_filter.default_lookup_field),
            default_comparison: cli
                .default_comparison
                .clone()
                .or(file_filter.default_comparison),
        };

        // Fixture paths from CLI are used as given; file paths are expanded
        let data = DataConfig {
            fixtures: cli
                .fixtures
                .clone()
                .or_else(|| file_data.fixtures.as_deref().map(expand_path)),
            actor_header: cli
                .actor_header
                .clone()
                .or(file_data.actor_header)
                .unwrap_or_else(|| DEFAULT_ACTOR_HEADER.to_string())
                .to_lowercase(),
        };

        let config = Self {
            server,
            filter,
            data,
        };
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            comparison_sources = ?config.filter.comparison_sources,
            value_function_sources = ?config.filter.value_function_sources,
            fixtures = ?config.data.fixtures,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port 0 would bind a random port
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.filter.query_parameter.trim().is_empty() {
            anyhow::bail!("Configuration error: filter.query_parameter must not be empty");
        }

        if self.data.actor_header.trim().is_empty() {
            anyhow::bail!("Configuration error: data.actor_header must not be empty");
        }

        // Unknown source names fail here rather than at first request
        FilterRegistries::from_config(&self.filter)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

        Ok(())
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
