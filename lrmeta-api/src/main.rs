//! lrmeta-api - metadata REST service
//!
//! Serves the normalized resource metadata from an in-process cache and runs
//! cache renewals on a background worker.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lrmeta_api::{build_router, renewal_queue, AppState, MetadataCache, Notifier, RenewalRequest};
use lrmeta_common::config::ConfigLoader;
use lrmeta_ingest::OutputLayout;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lrmeta-api
#[derive(Parser, Debug)]
#[command(name = "lrmeta-api")]
#[command(about = "REST API for language resource metadata")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/lrmeta/config.toml, /etc/lrmeta/config.toml)
    #[arg(short, long, env = "LRMETA_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "LRMETA_PORT")]
    port: Option<u16>,

    /// Metadata checkout root
    #[arg(long, env = "LRMETA_METADATA_DIR")]
    metadata_dir: Option<PathBuf>,

    /// Directory of the normalized JSON output
    #[arg(long, env = "LRMETA_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Read the JSON output from disk on every request
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loader = ConfigLoader::new(args.config.clone());
    let mut config = loader.load().context("Failed to load configuration")?;

    let default_filter = format!(
        "lrmeta_api={level},lrmeta_ingest={level},tower_http=info",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting lrmeta-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("LRMETA_GIT_REVISION"),
        env!("LRMETA_BUILT_AT"),
        env!("LRMETA_BUILD_PROFILE")
    );
    match loader.locate() {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.metadata_dir {
        config.metadata_dir = dir;
    }
    if let Some(dir) = args.static_dir {
        config.static_dir = dir;
    }
    if args.no_cache {
        config.no_cache = true;
    }

    info!("Metadata store: {}", config.yaml_root().display());
    info!("Static output: {}", config.static_dir.display());
    let config = Arc::new(config);

    let layout = OutputLayout::new(&config.static_dir);
    let cache = Arc::new(MetadataCache::new(layout.clone(), config.no_cache));
    if config.no_cache {
        info!("Cache disabled, serving from disk");
    } else {
        match cache.reload_all().await {
            Ok(keys) => info!("Cache warmed with {} keys", keys),
            Err(e) => warn!("Failed to warm cache, continuing with read-through: {}", e),
        }
    }

    let notifier = Notifier::new(&config.slack_webhook);
    if !notifier.is_enabled() {
        info!("No chat webhook configured, renewal notifications disabled");
    }

    let (runner, worker) = renewal_queue(config.max_pending);
    worker.spawn(Arc::clone(&config), Arc::clone(&cache), notifier.clone());

    if !layout.ids().exists() {
        warn!("No normalized output found, queueing a full renewal");
        if let Err(e) = runner.submit(RenewalRequest::default()).await {
            warn!("Failed to queue initial renewal: {}", e);
        }
    }

    let host: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid host address: {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);

    let state = AppState::new(Arc::clone(&config), cache, runner, notifier);
    let app = build_router(state);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
