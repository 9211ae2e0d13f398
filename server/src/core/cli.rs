use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_ACTOR_HEADER, ENV_COMPARISON_SOURCES, ENV_CONFIG, ENV_DEFAULT_COMPARISON,
    ENV_DEFAULT_LOOKUP_FIELD, ENV_FIXTURES, ENV_HOST, ENV_PORT, ENV_QUERY_PARAMETER,
    ENV_VALUE_FUNCTION_SOURCES,
};
use crate::data::sql::Backend;

#[derive(Parser)]
#[command(name = "complex-filter")]
#[command(version, about = "JSON filter tree compiler and query service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// JSON fixtures file with schemas and records
    #[arg(long, short = 'f', global = true, env = ENV_FIXTURES)]
    pub fixtures: Option<PathBuf>,

    /// Comparison sources to register, in order (e.g. common,dynamic)
    #[arg(long, global = true, env = ENV_COMPARISON_SOURCES, value_delimiter = ',')]
    pub comparison_sources: Option<Vec<String>>,

    /// Value function sources to register, in order (e.g. date)
    #[arg(long, global = true, env = ENV_VALUE_FUNCTION_SOURCES, value_delimiter = ',')]
    pub value_function_sources: Option<Vec<String>>,

    /// Query parameter carrying the filter JSON
    #[arg(long, global = true, env = ENV_QUERY_PARAMETER)]
    pub query_parameter: Option<String>,

    /// Field compared when a condition targets a relation itself
    #[arg(long, global = true, env = ENV_DEFAULT_LOOKUP_FIELD)]
    pub default_lookup_field: Option<String>,

    /// Comparison used for operators missing from the registry (native_lookup)
    #[arg(long, global = true, env = ENV_DEFAULT_COMPARISON)]
    pub default_comparison: Option<String>,

    /// Request header identifying the actor
    #[arg(long, global = true, env = ENV_ACTOR_HEADER)]
    pub actor_header: Option<String>,
}

/// Parse SQL backend from CLI string
fn parse_backend(s: &str) -> Result<Backend, String> {
    Backend::parse(s).ok_or_else(|| {
        format!(
            "Invalid SQL backend '{}'. Valid options: sqlite, postgres",
            s
        )
    })
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Compile a filter and print the matching fixture records
    Query {
        /// Schema to filter
        schema: String,
        /// Filter JSON
        filter: Option<String>,
        /// Actor identifier for dynamic operators
        #[arg(long)]
        actor: Option<String>,
    },
    /// Compile a filter and print the rendered SQL
    Sql {
        /// Schema to filter
        schema: String,
        /// Filter JSON
        filter: Option<String>,
        /// SQL backend (sqlite or postgres)
        #[arg(long, short, default_value = "sqlite", value_parser = parse_backend)]
        dialect: Backend,
        /// Actor identifier for dynamic operators
        #[arg(long)]
        actor: Option<String>,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub fixtures: Option<PathBuf>,
    pub comparison_sources: Option<Vec<String>>,
    pub value_function_sources: Option<Vec<String>>,
    pub query_parameter: Option<String>,
    pub default_lookup_field: Option<String>,
    pub default_comparison: Option<String>,
    pub actor_header: Option<String>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        fixtures: cli.fixtures,
        comparison_sources: cli.comparison_sources,
        value_function_sources: cli.value_function_sources,
        query_parameter: cli.query_parameter,
        default_lookup_field: cli.default_lookup_field,
        default_comparison: cli.default_comparison,
        actor_header: cli.actor_header,
    };
    (config, cli.command)
}
