//! kindred API server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the dedupe API over HTTP.
//!
//! Every setting can also come from the environment with a `KINDRED_`
//! prefix, e.g. `KINDRED_STORE_PATH=/var/lib/kindred/graph.db`.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use kindred_api::ServerConfig;
use kindred_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "kindred dedupe API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("KINDRED"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open SQLite store.
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {}", server_cfg.store_path.display())
    })?;

  let app = kindred_api::api_router(Arc::new(store))
    .layer(TraceLayer::new_for_http());

  let listener =
    TcpListener::bind((server_cfg.host.as_str(), server_cfg.port))
      .await
      .context("failed to bind listen address")?;
  tracing::info!("listening on {}", listener.local_addr()?);

  axum::serve(listener, app).await?;
  Ok(())
}
