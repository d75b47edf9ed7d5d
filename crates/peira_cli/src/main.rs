use anyhow::Context;
use clap::Parser;
use peira_core::{Embedder, KnowledgeBase, LanguageModel, PeiraConfig, SearchApi};
use peira_engine::{ChatEngine, DuckDuckGo, GroqClient, HashedBowEmbedder, SqliteKnowledge};
use peira_gateway::GatewayServer;
use peira_memory::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "peira.db")]
    db: String,

    /// Path to the TOML config file
    #[arg(short, long, default_value = "peira.toml")]
    config: String,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,

    /// Seed the knowledge base from a newline-delimited text file
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Run one training pass before serving
    #[arg(long)]
    train_now: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = PeiraConfig::load_or_default(&args.config);
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("Initializing Peira...");

    // 1. Storage
    info!("Connecting to storage at {}...", args.db);
    let store = Arc::new(SqliteStore::new(&args.db).await?);

    // 2. Collaborators
    let llm: Arc<dyn LanguageModel> = Arc::new(GroqClient::new(&config.llm));
    let embedder: Arc<dyn Embedder> = Arc::new(HashedBowEmbedder::default());
    let search: Arc<dyn SearchApi> = Arc::new(DuckDuckGo::new(&config.search.base_url));

    let knowledge_store = SqliteKnowledge::new(store.clone());
    if let Some(path) = &args.seed {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
        let mut seeded = 0usize;
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            knowledge_store.add_document(line, embedder.as_ref()).await?;
            seeded += 1;
        }
        info!("Seeded {} knowledge passages", seeded);
    }
    let knowledge: Arc<dyn KnowledgeBase> = Arc::new(knowledge_store);

    // 3. Engine
    let engine = Arc::new(
        ChatEngine::new(config.clone(), store, llm, embedder, knowledge, search).await,
    );

    if args.train_now {
        match engine.train_now().await {
            Ok(report) => info!(
                "Initial training pass: {} steps over {} samples",
                report.steps, report.samples
            ),
            Err(e) => tracing::error!("Initial training pass failed: {}", e),
        }
    }

    // 4. Background training + session sweeps
    let (stop_tx, stop_rx) = watch::channel(false);
    let background = engine.clone().spawn_background(stop_rx);

    // 5. HTTP gateway
    let server = GatewayServer::new(engine, &config.server.host, config.server.port);
    let server_handle = server.start();

    info!(
        "Peira online at {}:{}. Ctrl-C to stop.",
        config.server.host, config.server.port
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, stopping background work...");

    // The stop signal interrupts a training pass between episodes.
    let _ = stop_tx.send(true);
    if let Err(e) = background.await {
        tracing::warn!("Background task ended abnormally: {}", e);
    }
    server_handle.abort();

    info!("Goodbye.");
    Ok(())
}
