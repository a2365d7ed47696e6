//! `stockpile` keeps per-security market data stores up to date.
//!
//! # Usage
//!
//! ```text
//! stockpile sync 601318 000001
//! stockpile sync --all --mode full --json
//! stockpile show 601318 daily_price --limit 5
//! stockpile serve
//! ```
//!
//! Settings come from `stockpile.toml` (or `--config`), overridden by
//! `STOCKPILE_*` environment variables.

mod config;
mod labels;
mod output;
mod provider;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use axum::Router;
use clap::{Args, Parser, Subcommand};
use stockpile_core::{
  security::{EntityKind, Symbol, SyncMode},
  store::{EntityStore as _, StoreRouter as _},
};
use stockpile_store_sqlite::StoreDirectory;
use stockpile_sync::{Orchestrator, run_batch};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{config::AppConfig, provider::HttpProvider};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "stockpile", author, version, about = "Incremental market data sync")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "stockpile.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Fetch and merge fresh data for one or more securities.
  Sync(SyncArgs),
  /// Serve the read-only JSON API.
  Serve,
  /// Print the newest stored rows of one collection.
  Show {
    symbol: String,
    /// basic_info, daily_price, financial_metric, insider_trade, news_item
    /// or valuation_snapshot.
    kind:   String,
    #[arg(short, long, default_value_t = 20)]
    limit:  usize,
  },
}

#[derive(Args)]
struct SyncArgs {
  /// `incremental` honours the freshness gate; `full` refetches everything.
  #[arg(long, default_value = "incremental")]
  mode:    SyncMode,
  /// Also sync every security that already has a store.
  #[arg(long)]
  all:     bool,
  /// Print the batch report as JSON.
  #[arg(long)]
  json:    bool,
  symbols: Vec<String>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = AppConfig::load(&cli.config)?;

  match cli.command {
    Command::Sync(args) => sync(config, args).await,
    Command::Serve => serve(config).await,
    Command::Show { symbol, kind, limit } => show(config, &symbol, &kind, limit).await,
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn sync(config: AppConfig, args: SyncArgs) -> anyhow::Result<()> {
  let directory = StoreDirectory::new(&config.data_dir);

  let mut symbols = args
    .symbols
    .iter()
    .map(Symbol::parse)
    .collect::<Result<Vec<_>, _>>()?;
  if args.all {
    let known = directory
      .symbols()
      .with_context(|| format!("failed to list stores in {}", config.data_dir.display()))?;
    for symbol in known {
      if !symbols.contains(&symbol) {
        symbols.push(symbol);
      }
    }
  }
  if symbols.is_empty() {
    bail!("nothing to sync: pass one or more symbols, or --all");
  }

  let provider = HttpProvider::new(&config.provider)?;
  let orchestrator = Orchestrator::new(Arc::new(provider), &config.sync)
    .context("invalid [sync] configuration")?;

  let cancel = CancellationToken::new();
  tokio::spawn({
    let cancel = cancel.clone();
    async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupted; stopping after the current entity steps");
        cancel.cancel();
      }
    }
  });

  let report = run_batch(
    &directory,
    &orchestrator,
    symbols,
    args.mode,
    config.sync.concurrency,
    &cancel,
  )
  .await;

  if args.json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print!("{}", output::render_batch(&report));
  }
  Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
  let directory = Arc::new(StoreDirectory::new(&config.data_dir));
  let app = Router::new()
    .nest("/api", stockpile_api::api_router(directory))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", config.server.host, config.server.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn show(config: AppConfig, symbol: &str, kind: &str, limit: usize) -> anyhow::Result<()> {
  let symbol = Symbol::parse(symbol)?;
  let kind = EntityKind::parse(kind)?;
  let directory = StoreDirectory::new(&config.data_dir);
  if !directory.contains(&symbol) {
    bail!("no store for {symbol} in {}", config.data_dir.display());
  }

  let store = directory
    .open(&symbol)
    .await
    .with_context(|| format!("failed to open store for {symbol}"))?;
  let rows = store.recent(kind, limit).await?;
  print!("{}", output::render_rows(&rows)?);
  Ok(())
}
