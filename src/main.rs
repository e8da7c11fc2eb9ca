mod api;
mod config;
mod db;
mod extract;
mod fetch;
mod model;
mod resolver;
mod text;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::db::RouteStore;
use crate::extract::ContentExtractor;
use crate::fetch::HttpFetcher;
use crate::resolver::Resolver;

#[derive(Parser)]
#[command(name = "alpine_routes", about = "Mountaineering route lookup API backed by mountain.kz")]
struct Cli {
    /// Route database (overrides ALPINE_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve {
        /// Listen host (overrides ALPINE_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides ALPINE_PORT / PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print every stored route as JSON
    List,
    /// Resolve one query and print the result as JSON
    Lookup {
        /// Route name fragment or numeric id
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });
    if let Commands::Serve { host, port } = &command {
        if let Some(h) = host {
            settings.host = h.clone();
        }
        if let Some(p) = port {
            settings.port = *p;
        }
    }

    // Refuse to start without a usable store.
    let store = Arc::new(RouteStore::open(&settings.db_path)?);
    let result = run(command, &settings, store.clone()).await;
    let closed = store.close();
    result?;
    closed
}

async fn run(command: Commands, settings: &Settings, store: Arc<RouteStore>) -> Result<()> {
    let resolver = Resolver::new(
        store,
        Arc::new(HttpFetcher::new(settings.fetch_timeout())?),
        ContentExtractor::new(settings.site_base.clone()),
        settings.fetch_concurrency,
    );

    match command {
        Commands::Serve { .. } => serve(settings, resolver).await,
        Commands::List => print_json(&resolver.list_all().await?),
        Commands::Lookup { query } => {
            let envelope = resolver.resolve(&query).await?;
            info!(query = %query, routes = envelope.data().map_or(0, Vec::len), "Lookup finished");
            print_json(&envelope)
        }
    }
}

async fn serve(settings: &Settings, resolver: Resolver) -> Result<()> {
    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, api::router(Arc::new(resolver)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutting down...");
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
