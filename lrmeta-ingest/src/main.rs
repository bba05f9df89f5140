//! lrmeta-ingest - run the metadata normalizer from the command line
//!
//! Without paths the whole store is re-read; with `type/id` paths only those
//! records are re-parsed on top of the previous run's snapshot.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lrmeta_common::config::ConfigLoader;
use lrmeta_common::ResourcePath;
use lrmeta_ingest::{NormalizeOptions, Normalizer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lrmeta-ingest
#[derive(Parser, Debug)]
#[command(name = "lrmeta-ingest")]
#[command(about = "Read YAML metadata files and write the JSON documents served by the API")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/lrmeta/config.toml, /etc/lrmeta/config.toml)
    #[arg(short, long, env = "LRMETA_CONFIG")]
    config: Option<PathBuf>,

    /// Metadata checkout root
    #[arg(long, env = "LRMETA_METADATA_DIR")]
    metadata_dir: Option<PathBuf>,

    /// Output directory
    #[arg(long, env = "LRMETA_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Print debug info for every record
    #[arg(long)]
    debug: bool,

    /// Skip getting file info for downloadables
    #[arg(long)]
    offline: bool,

    /// Validate records against the metadata schema
    #[arg(long)]
    validate: bool,

    /// Records to re-read, as <type>/<id>
    paths: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "lrmeta_ingest=debug"
    } else {
        "lrmeta_ingest=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ConfigLoader::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;
    if let Some(dir) = args.metadata_dir {
        config.metadata_dir = dir;
    }
    if let Some(dir) = args.static_dir {
        config.static_dir = dir;
    }

    let scope = args
        .paths
        .iter()
        .map(|p| p.parse::<ResourcePath>())
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid resource path")?;

    info!(
        "Normalizing {} into {}",
        config.yaml_root().display(),
        config.static_dir.display()
    );

    let options = NormalizeOptions {
        debug: args.debug,
        offline: args.offline,
        validate: args.validate,
    };
    let normalizer = Normalizer::new(config, options);
    let scope = (!scope.is_empty()).then_some(scope);
    let report = normalizer
        .run(scope.as_deref())
        .await
        .context("Normalizer run failed")?;

    if report.has_warnings() {
        warn!("Finished with {} warnings", report.warnings.len());
    }
    info!(
        "Processed {} records, skipped {}, {} documents changed, {} removed",
        report.processed,
        report.skipped,
        report.changed.len(),
        report.removed.len()
    );
    Ok(())
}
