//! The sync orchestrator: one sequential flow per security.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use stockpile_core::{
  clock::{Clock, SystemClock},
  fetch::FetchAdapter,
  report::{ApplyResult, EntityReport, RunReport, RunStatus, StepError, StepState},
  security::{EntityKind, SyncMode},
  store::EntityStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{FreshnessGate, MergeEngine, Pacer, Result, SyncConfig};

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Drives the fetch → merge cycle for every entity kind of a security.
pub struct Orchestrator<F> {
  adapter:     Arc<F>,
  clock:       Arc<dyn Clock>,
  gate:        FreshnessGate,
  engine:      MergeEngine,
  fetch_delay: Duration,
}

impl<F: FetchAdapter> Orchestrator<F> {
  pub fn new(adapter: Arc<F>, config: &SyncConfig) -> Result<Self> {
    let offset = config.calendar_offset()?;
    Ok(Self {
      adapter,
      clock: Arc::new(SystemClock),
      gate: FreshnessGate::new(offset),
      engine: MergeEngine::new(config.retention()?, offset).with_wipe_on_full(config.wipe_on_full),
      fetch_delay: config.fetch_delay(),
    })
  }

  /// Replace the wall clock, e.g. with a
  /// [`FixedClock`](stockpile_core::clock::FixedClock) in tests.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn adapter(&self) -> &F { &self.adapter }

  /// Bring the store of one security up to date.
  ///
  /// Every kind is processed in [`EntityKind::SYNC_ORDER`]. A failing step is
  /// recorded in the report and the run moves on. `cancel` is checked
  /// between steps; steps not yet started are reported as cancelled.
  #[tracing::instrument(skip_all, fields(symbol = %store.symbol(), %mode))]
  pub async fn sync<S: EntityStore>(
    &self,
    store: &S,
    mode: SyncMode,
    cancel: &CancellationToken,
  ) -> RunReport {
    let run_id = Uuid::new_v4();
    let started_at = self.clock.now();
    let mut pacer = Pacer::new(self.fetch_delay);

    let mut report = RunReport {
      run_id,
      symbol: store.symbol().clone(),
      mode,
      status: RunStatus::Completed,
      started_at,
      finished_at: started_at,
      entities: Vec::with_capacity(EntityKind::SYNC_ORDER.len()),
    };

    if cancel.is_cancelled() {
      report.entities = EntityKind::SYNC_ORDER
        .iter()
        .map(|&kind| settled(kind, StepState::Cancelled))
        .collect();
      report.status = RunStatus::Cancelled;
      report.finished_at = self.clock.now();
      info!("sync cancelled before start");
      return report;
    }

    let plan = self.plan(store, mode, started_at, &mut pacer).await;
    if plan.iter().all(|(_, due)| !due) {
      report.entities = plan
        .iter()
        .map(|&(kind, _)| settled(kind, StepState::UpToDate))
        .collect();
      report.status = RunStatus::SkippedFresh;
      report.finished_at = self.clock.now();
      info!("security already fresh");
      return report;
    }

    for (kind, due) in plan {
      if cancel.is_cancelled() {
        report.status = RunStatus::Cancelled;
        report.entities.push(settled(kind, StepState::Cancelled));
        continue;
      }
      if !due {
        debug!(%kind, "up to date");
        report.entities.push(settled(kind, StepState::UpToDate));
        continue;
      }
      let entity = self.step(store, kind, mode, &mut pacer).await;
      report.entities.push(entity);
    }

    report.finished_at = self.clock.now();
    let failed = report.failed().count();
    let totals = report.totals();
    info!(
      status = ?report.status,
      failed,
      written = totals.written,
      pruned = totals.pruned,
      "sync finished"
    );
    report
  }

  /// Decide up-front which kinds are due. Gate failures count as due so the
  /// step itself surfaces the problem.
  async fn plan<S: EntityStore>(
    &self,
    store: &S,
    mode: SyncMode,
    now: DateTime<Utc>,
    pacer: &mut Pacer,
  ) -> Vec<(EntityKind, bool)> {
    let mut plan = Vec::with_capacity(EntityKind::SYNC_ORDER.len());
    for kind in EntityKind::SYNC_ORDER {
      let mut due = match self.gate.needs_refresh(store, kind, mode, now).await {
        Ok(due) => due,
        Err(e) => {
          warn!(%kind, error = %e, "freshness check failed");
          true
        }
      };
      if !due && kind == EntityKind::FinancialMetric {
        due = self.report_period_due(store, pacer).await;
      }
      plan.push((kind, due));
    }
    plan
  }

  async fn report_period_due<S: EntityStore>(&self, store: &S, pacer: &mut Pacer) -> bool {
    pacer.wait().await;
    let provider_latest = match self.adapter.latest_report_period(store.symbol()).await {
      Ok(period) => period,
      Err(e) => {
        warn!(error = %e, "report period probe failed");
        return true;
      }
    };
    match self.gate.report_period_advanced(store, provider_latest).await {
      Ok(advanced) => {
        if advanced {
          info!(?provider_latest, "new report period published");
        }
        advanced
      }
      Err(e) => {
        warn!(error = %e, "report period comparison failed");
        true
      }
    }
  }

  // ─── Entity step ─────────────────────────────────────────────────────────

  async fn step<S: EntityStore>(
    &self,
    store: &S,
    kind: EntityKind,
    mode: SyncMode,
    pacer: &mut Pacer,
  ) -> EntityReport {
    let mut step = Step::new(kind);
    let now = self.clock.now();

    step.advance(StepState::Fetching);
    let since = match self.since(store, kind, mode, now).await {
      Ok(since) => since,
      Err(e) => return step.fail(StepError::store(&e)),
    };
    pacer.wait().await;
    let batch = match self.adapter.fetch(kind, store.symbol(), mode, since).await {
      Ok(batch) => batch,
      Err(e) => return step.fail(e.into()),
    };
    if batch.is_empty() {
      info!(%kind, dropped = batch.dropped, "no rows fetched");
    }

    step.advance(StepState::Merging);
    match self.engine.apply(store, kind, batch, mode, now).await {
      Ok(result) => {
        info!(
          %kind,
          written = result.written,
          skipped = result.skipped,
          pruned = result.pruned,
          wiped = result.wiped,
          defaulted = result.defaulted,
          dropped = result.dropped,
          "entity synced"
        );
        step.advance(StepState::Done);
        step.finish(Some(result), None)
      }
      Err(e) => step.fail(StepError::store(&e)),
    }
  }

  /// The `since` hint passed to the adapter. Full mode never narrows.
  async fn since<S: EntityStore>(
    &self,
    store: &S,
    kind: EntityKind,
    mode: SyncMode,
    now: DateTime<Utc>,
  ) -> Result<Option<NaiveDate>, S::Error> {
    if mode.is_full() {
      return Ok(None);
    }
    match kind {
      EntityKind::DailyPrice | EntityKind::FinancialMetric | EntityKind::InsiderTrade => {
        Ok(store.latest(kind).await?.and_then(|row| row.cursor(self.gate.offset())))
      }
      EntityKind::NewsItem => Ok(Some(self.gate.calendar_date(now - self.engine.retention()))),
      EntityKind::BasicInfo | EntityKind::ValuationSnapshot => Ok(None),
    }
  }
}

fn settled(kind: EntityKind, state: StepState) -> EntityReport {
  EntityReport { kind, state, result: None, error: None }
}

// ─── Step state machine ──────────────────────────────────────────────────────

struct Step {
  kind:  EntityKind,
  state: StepState,
}

impl Step {
  fn new(kind: EntityKind) -> Self { Self { kind, state: StepState::Pending } }

  fn advance(&mut self, next: StepState) {
    debug_assert!(self.state.can_advance_to(next), "{:?} -> {next:?}", self.state);
    debug!(kind = %self.kind, from = ?self.state, to = ?next, "step transition");
    self.state = next;
  }

  fn fail(mut self, error: StepError) -> EntityReport {
    warn!(kind = %self.kind, stage = ?self.state, %error, "entity step failed");
    self.advance(StepState::Failed);
    self.finish(None, Some(error))
  }

  fn finish(self, result: Option<ApplyResult>, error: Option<StepError>) -> EntityReport {
    EntityReport { kind: self.kind, state: self.state, result, error }
  }
}
