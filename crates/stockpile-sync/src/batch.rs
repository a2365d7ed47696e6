//! Batch entry: sync many securities with bounded concurrency.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt as _};
use serde::Serialize;
use stockpile_core::{
  fetch::FetchAdapter,
  report::{RunReport, RunStatus},
  security::{Symbol, SyncMode},
  store::StoreRouter,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Orchestrator;

/// What happened to one security of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SecurityOutcome {
  Synced(RunReport),
  /// The store could not be opened; nothing was fetched.
  OpenFailed { symbol: Symbol, message: String },
}

impl SecurityOutcome {
  pub fn symbol(&self) -> &Symbol {
    match self {
      Self::Synced(report) => &report.symbol,
      Self::OpenFailed { symbol, .. } => symbol,
    }
  }

  /// Whether anything about this security went wrong.
  pub fn has_failures(&self) -> bool {
    match self {
      Self::Synced(report) => report.failed().next().is_some(),
      Self::OpenFailed { .. } => true,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
  pub mode:        SyncMode,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  /// One outcome per distinct requested symbol, in request order.
  pub securities:  Vec<SecurityOutcome>,
}

impl BatchReport {
  pub fn failures(&self) -> impl Iterator<Item = &SecurityOutcome> {
    self.securities.iter().filter(|s| s.has_failures())
  }

  pub fn skipped_fresh(&self) -> usize {
    self
      .securities
      .iter()
      .filter(|s| matches!(s, SecurityOutcome::Synced(r) if r.status == RunStatus::SkippedFresh))
      .count()
  }
}

/// Sync every symbol, at most `concurrency` at a time. Each security gets its
/// own store handle and its own sequential flow; one security failing never
/// affects another. Repeated symbols are synced once, at their first
/// position.
pub async fn run_batch<R, F>(
  router: &R,
  orchestrator: &Orchestrator<F>,
  symbols: Vec<Symbol>,
  mode: SyncMode,
  concurrency: usize,
  cancel: &CancellationToken,
) -> BatchReport
where
  R: StoreRouter,
  F: FetchAdapter,
{
  let started_at = Utc::now();
  let mut seen = HashSet::new();
  let symbols: Vec<Symbol> = symbols.into_iter().filter(|s| seen.insert(s.clone())).collect();
  let total = symbols.len();
  let semaphore = Semaphore::new(concurrency.max(1));
  info!(total, %mode, concurrency, "starting batch sync");

  let mut tasks = FuturesUnordered::new();
  for (idx, symbol) in symbols.into_iter().enumerate() {
    let semaphore = &semaphore;
    tasks.push(async move {
      let _permit = semaphore.acquire().await.ok();
      let outcome = match router.open(&symbol).await {
        Ok(store) => SecurityOutcome::Synced(orchestrator.sync(&store, mode, cancel).await),
        Err(e) => {
          warn!(%symbol, error = %e, "failed to open store");
          SecurityOutcome::OpenFailed { symbol, message: e.to_string() }
        }
      };
      (idx, outcome)
    });
  }

  let mut results = Vec::with_capacity(total);
  while let Some(result) = tasks.next().await {
    results.push(result);
  }
  results.sort_by_key(|(idx, _)| *idx);

  let report = BatchReport {
    mode,
    started_at,
    finished_at: Utc::now(),
    securities: results.into_iter().map(|(_, outcome)| outcome).collect(),
  };
  info!(
    total,
    failed = report.failures().count(),
    skipped_fresh = report.skipped_fresh(),
    "batch sync finished"
  );
  report
}
