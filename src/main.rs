mod config;
mod db;
mod fabric;
mod handlers;
mod models;
mod router;
mod utils;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, StoreBackend};
use db::GraphClient;

/// Application state shared across handlers
pub struct AppState {
    pub client: GraphClient,
    pub config: Config,
    /// Held for the duration of a generation or seed run
    pub generation: tokio::sync::Mutex<()>,
}

impl AppState {
    pub fn new(client: GraphClient, config: Config) -> Self {
        Self {
            client,
            config,
            generation: tokio::sync::Mutex::new(()),
        }
    }
}

#[derive(Parser)]
#[command(name = "forge-fabric", version, about = "Fabric cabling and addressing synthesis")]
struct Cli {
    /// Use the in-memory store (seeded on startup)
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Load the demo inventory
    Seed,
    /// Generate devices, cabling and underlay sessions
    Generate {
        #[arg(long)]
        topology: Option<String>,
    },
    /// Compare topologies with their generated devices
    Check {
        #[arg(long)]
        topology: Option<String>,
    },
    /// Run the HTTP API (default)
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge_fabric=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut cfg = Config::load();
    if cli.memory {
        cfg.store_backend = StoreBackend::Memory;
    }
    tracing::info!("Starting ForgeFabric");
    match cfg.store_backend {
        StoreBackend::Sqlite => tracing::info!("Database: {}", cfg.db_path),
        StoreBackend::Memory => tracing::info!("Database: in-memory"),
    }

    let store = db::open(&cfg).await?;
    let client = GraphClient::new(store, cfg.batch_concurrency);

    let command = cli.command.unwrap_or(Command::Serve);
    // A fresh memory store has nothing to generate from
    if cfg.store_backend == StoreBackend::Memory && !matches!(command, Command::Seed) {
        db::seeds::seed(&client, &cfg.generator).await?;
    }

    match command {
        Command::Seed => db::seeds::seed(&client, &cfg.generator).await,
        Command::Generate { topology } => {
            let reports = fabric::generate_all(&client, &cfg.generator, topology.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        }
        Command::Check { topology } => {
            let results = fabric::check_all_topologies(&client, topology.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
        Command::Serve => serve(client, cfg).await,
    }
}

async fn serve(client: GraphClient, cfg: Config) -> anyhow::Result<()> {
    tracing::info!("Listen: {}", cfg.listen_addr);
    let listen_addr = cfg.listen_addr.clone();
    let state = Arc::new(AppState::new(client, cfg));

    // Build router
    let app = router::build(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!("ForgeFabric listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("ForgeFabric shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
