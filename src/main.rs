//! Calliope - asynchronous content generation and semantic highlighting pipeline
//!
//! This is the main entry point for the Calliope content server, which drafts
//! content with an agent, annotates it with semantic highlight markup in the
//! background, and streams lifecycle events to connected editors.

use clap::{Parser, Subcommand};

use calliope_core::{
    api::{ApiServer, ApiServerConfig, EventBroadcaster},
    config::CalliopeConfig,
    error::Result,
    highlight::AnnotationCache,
    pipeline::GenerationOrchestrator,
    services::{AgentClient, AgentConfig, AnnotatorService, CompletionBackend},
    storage::{ContentStore, MemoryStore},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "calliope")]
#[command(about = "Content generation and semantic highlighting pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the content API server
    Serve {
        /// Server address (overrides the config file)
        #[arg(long)]
        addr: Option<String>,

        /// Event channel capacity (overrides the config file)
        #[arg(long)]
        capacity: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Use the specified level for calliope, but WARN for noisy external crates.
    // Suppress tokio broadcast channel "recv error" spam from SSE disconnections
    let filter = EnvFilter::new(format!(
        "calliope={},tower_http=warn,hyper=warn,tokio::sync::broadcast=error,tokio_stream=error",
        level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();

    debug!("Calliope v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match cli.config.as_deref() {
        Some(path) => CalliopeConfig::from_file(path)?,
        None => CalliopeConfig::default(),
    };

    match cli.command {
        Some(Commands::Serve { addr, capacity }) => serve(config, addr, capacity).await,
        // No subcommand starts the server with config-file settings
        None => serve(config, None, None).await,
    }
}

async fn serve(
    config: CalliopeConfig,
    addr_override: Option<String>,
    capacity_override: Option<usize>,
) -> Result<()> {
    let addr: SocketAddr = match addr_override {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", raw, e))?,
        None => config.server.socket_addr()?,
    };
    let event_capacity = capacity_override.unwrap_or(config.server.event_capacity);

    // Agent client reads ANTHROPIC_API_KEY from the environment
    let agent = AgentClient::new(AgentConfig {
        model: config.agent.model.clone(),
        max_tokens: config.agent.max_tokens,
        temperature: config.agent.temperature,
        ..AgentConfig::default()
    })?;
    let backend: Arc<dyn CompletionBackend> = Arc::new(agent);

    let cache = AnnotationCache::new(
        config.highlight.cache_capacity,
        config.highlight.cache_ttl_seconds,
    );
    let annotator = Arc::new(AnnotatorService::with_cache(backend.clone(), cache));

    let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::new());
    let events = EventBroadcaster::new(event_capacity);
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        store.clone(),
        backend,
        annotator,
        events.clone(),
    ));

    println!();
    println!("🌐 Calliope Content API");
    println!("   Draft generation and semantic highlighting");
    println!();
    println!("   Address: http://{}", addr);
    println!("   Model: {}", config.agent.model);
    println!("   Event capacity: {}", event_capacity);
    println!();
    println!("   Endpoints:");
    println!("   • POST /content/generate - Draft a new content item");
    println!("   • GET  /content - List content items");
    println!("   • GET  /content/:id - Fetch one item with display spans");
    println!("   • PUT  /content/:id - Save a user edit");
    println!("   • POST /content/:id/refine - Refine an existing draft");
    println!("   • POST /content/:id/annotate - Re-run highlighting");
    println!("   • POST /content/:id/approve - Approve for delivery");
    println!("   • GET  /events - Server-Sent Events stream");
    println!("   • GET  /health - Health check");
    println!();

    let server = ApiServer::new(
        ApiServerConfig {
            addr,
            event_capacity,
            highlights_enabled: config.highlight.enabled,
        },
        store,
        orchestrator,
        events,
    );

    // Run the server with graceful shutdown on signals
    tokio::select! {
        result = server.serve() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping API server gracefully...");
        }
    }

    info!("API server shut down complete");
    Ok(())
}
