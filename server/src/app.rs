//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::api::extractors::actor_context;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::sql::{Backend, render_select};
use crate::data::{MemoryStore, Schema};
use crate::domain::{ComplexFilter, FilterRegistries, RequestContext, SharedRegistries};

/// Fixtures served when no fixtures file is configured
pub const DEMO_FIXTURES: &str = include_str!("../fixtures/demo.json");

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub registries: Arc<SharedRegistries>,
    pub store: Arc<MemoryStore>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config)?;

        match command {
            Some(Commands::Query {
                schema,
                filter,
                actor,
            }) => app.print_records(&schema, filter.as_deref(), actor.as_deref()),
            Some(Commands::Sql {
                schema,
                filter,
                dialect,
                actor,
            }) => app.print_sql(&schema, filter.as_deref(), dialect, actor.as_deref()),
            Some(Commands::Start) | None => Self::start_server(app).await,
        }
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let registries = FilterRegistries::from_config(&config.filter)
            .map_err(|e| anyhow::anyhow!("Failed to initialize filter registries: {}", e))?;

        let store = match &config.data.fixtures {
            Some(path) => MemoryStore::from_fixture_file(path)
                .with_context(|| format!("Failed to load fixtures: {}", path.display()))?,
            None => MemoryStore::from_fixture_str(DEMO_FIXTURES)
                .context("Failed to load demo fixtures")?,
        };

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            registries: Arc::new(SharedRegistries::new(registries)),
            store: Arc::new(store),
        })
    }

    fn print_records(&self, schema: &str, filter: Option<&str>, actor: Option<&str>) -> Result<()> {
        let schema = self.schema(schema)?;
        let registries = self.registries.snapshot();
        let compiler = ComplexFilter::new(&registries, self.store.schemas(), self.store.as_ref());

        let records = compiler.filter_records(filter, &Self::request(actor), &schema)?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        Ok(())
    }

    fn print_sql(
        &self,
        schema: &str,
        filter: Option<&str>,
        backend: Backend,
        actor: Option<&str>,
    ) -> Result<()> {
        let schema = self.schema(schema)?;
        let registries = self.registries.snapshot();
        let compiler = ComplexFilter::new(&registries, self.store.schemas(), self.store.as_ref());

        let compiled = match filter {
            Some(input) => compiler.compile_str(input, &Self::request(actor), &schema)?,
            None => Default::default(),
        };
        let query = render_select(
            backend.dialect(),
            self.store.schemas(),
            &schema,
            compiled.predicate.as_ref(),
            &compiled.annotations,
        )?;

        println!("{}", query.sql);
        println!("{}", serde_json::to_string_pretty(&query.params)?);
        Ok(())
    }

    fn schema(&self, name: &str) -> Result<Arc<Schema>> {
        self.store.schemas().get(name).ok_or_else(|| {
            let mut known = self.store.schemas().names();
            known.sort_unstable();
            anyhow::anyhow!("Unknown schema: {}. Known schemas: {}", name, known.join(", "))
        })
    }

    fn request(actor: Option<&str>) -> RequestContext {
        actor.map(actor_context).unwrap_or_else(RequestContext::anonymous)
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        // Logs go to stderr so query/sql output stays pipeable
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        tracing::info!(
            host = %app.config.server.host,
            port = app.config.server.port,
            query_parameter = %app.config.filter.query_parameter,
            "Starting {}",
            APP_NAME_LOWER
        );

        ApiServer::new(app).start().await
    }
}
