//! Proeve API server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, optionally seeds the reference catalogs from a
//! JSON file, and serves the JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use proeve_core::catalogus::{
  ActorRegistratie, BehaaldeKwalificatie, Cursus, Kerntaakonderdeel,
};
use proeve_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Proeve workflow API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  store_path: PathBuf,
  #[serde(default = "default_host")]
  host:       String,
  #[serde(default = "default_port")]
  port:       u16,
  /// Optional JSON file with reference-catalog rows to load at startup.
  seed_path:  Option<PathBuf>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }

/// Shape of the optional seed file. Every section may be omitted.
#[derive(Debug, Default, Deserialize)]
struct SeedFile {
  #[serde(default)]
  actoren:                Vec<ActorRegistratie>,
  #[serde(default)]
  cursussen:              Vec<Cursus>,
  #[serde(default)]
  kerntaakonderdelen:     Vec<Kerntaakonderdeel>,
  #[serde(default)]
  behaalde_kwalificaties: Vec<BehaaldeKwalificatie>,
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
    .add_source(config::Environment::with_prefix("PROEVE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(seed_path) = &server_cfg.seed_path {
    seed_catalogs(&store, seed_path).await?;
  }

  let app = proeve_api::api_router(Arc::new(store))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Load the reference catalogs from a JSON seed file. Re-running against an
/// existing store is harmless for actors and qualifications; duplicate
/// cursus or kerntaakonderdeel rows are reported as errors.
async fn seed_catalogs(
  store: &SqliteStore,
  seed_path: &Path,
) -> anyhow::Result<()> {
  let raw = std::fs::read_to_string(seed_path)
    .with_context(|| format!("failed to read seed file {seed_path:?}"))?;
  let seed: SeedFile = serde_json::from_str(&raw)
    .with_context(|| format!("failed to parse seed file {seed_path:?}"))?;

  for cursus in seed.cursussen {
    store.voeg_cursus_toe(cursus).await?;
  }
  for kto in seed.kerntaakonderdelen {
    store.voeg_kerntaakonderdeel_toe(kto).await?;
  }
  for actor in seed.actoren {
    store.registreer_actor(actor).await?;
  }
  for kwalificatie in seed.behaalde_kwalificaties {
    store.registreer_kwalificatie(kwalificatie).await?;
  }

  tracing::info!(path = %seed_path.display(), "reference catalogs seeded");
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
