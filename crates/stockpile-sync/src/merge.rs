//! The merge/retention engine: turns fetched records into stored rows.

use chrono::{DateTime, FixedOffset, Utc};
use stockpile_core::{
  fetch::FetchBatch,
  normalize::MapContext,
  report::ApplyResult,
  row::Row,
  security::{EntityKind, SyncMode},
  store::{EntityStore, StepWrite},
};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct MergeEngine {
  retention:    chrono::Duration,
  offset:       FixedOffset,
  wipe_on_full: bool,
}

impl MergeEngine {
  pub fn new(retention: chrono::Duration, offset: FixedOffset) -> Self {
    Self { retention, offset, wipe_on_full: false }
  }

  /// Let full-mode runs wipe and reload collections that are not
  /// append-only.
  pub fn with_wipe_on_full(mut self, wipe_on_full: bool) -> Self {
    self.wipe_on_full = wipe_on_full;
    self
  }

  pub fn retention(&self) -> chrono::Duration { self.retention }

  /// Apply one fetched batch of `kind` to `store`.
  ///
  /// Records that fail to map, and monotonic rows no newer than the stored
  /// cursor, are counted as skipped. The write, the optional wipe, the
  /// retention prune and the refresh stamp are committed in one store
  /// transaction. Only store failures are errors; when one happens nothing of
  /// the batch has been written.
  pub async fn apply<S: EntityStore>(
    &self,
    store: &S,
    kind: EntityKind,
    batch: FetchBatch,
    mode: SyncMode,
    now: DateTime<Utc>,
  ) -> Result<ApplyResult, S::Error> {
    let mut result = ApplyResult { dropped: batch.dropped, ..Default::default() };
    let ctx = MapContext { symbol: store.symbol(), now, offset: self.offset };

    let mut rows = Vec::with_capacity(batch.records.len());
    for record in &batch.records {
      match Row::from_record(kind, record, &ctx) {
        Ok(mapped) => {
          result.defaulted += mapped.defaulted;
          rows.push(mapped.row);
        }
        Err(e) => {
          debug!(%kind, error = %e, "skipping unmappable record");
          result.skipped += 1;
        }
      }
    }

    if kind.is_monotonic() && !mode.is_full() {
      let stored = store.latest(kind).await?.and_then(|row| row.cursor(self.offset));
      if let Some(stored) = stored {
        let before = rows.len();
        rows.retain(|row| row.cursor(self.offset).is_some_and(|cursor| cursor > stored));
        result.skipped += before - rows.len();
      }
    }

    let write = StepWrite {
      kind,
      rows,
      wipe: mode.is_full() && self.wipe_on_full && kind.is_wipeable(),
      prune_before: kind.is_rolling().then(|| now - self.retention),
      synced_at: now,
    };
    let counts = store.commit_step(write).await?;
    result.wiped = counts.wiped;
    result.written = counts.written;
    result.pruned = counts.pruned;

    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone as _};
  use serde_json::json;

  use super::*;
  use crate::testing::{date, file_store, metric_row, record, refuse_deletes, store};

  fn utc() -> FixedOffset { FixedOffset::east_opt(0).unwrap() }

  fn engine() -> MergeEngine { MergeEngine::new(Duration::days(30), utc()) }

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap() }

  #[tokio::test]
  async fn monotonic_kinds_only_accept_newer_rows() {
    let s = store().await;
    s.merge(metric_row(date(2024, 3, 31))).await.unwrap();

    let batch = FetchBatch::new(vec![
      record(json!({ "report_date": "2024-03-31", "roe": 9.0 })),
      record(json!({ "report_date": "2024-06-30", "roe": 10.5 })),
    ]);
    let result = engine()
      .apply(&s, EntityKind::FinancialMetric, batch, SyncMode::Incremental, now())
      .await
      .unwrap();

    assert_eq!(result.written, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(s.count(EntityKind::FinancialMetric).await.unwrap(), 2);
    let latest = s.latest(EntityKind::FinancialMetric).await.unwrap().unwrap();
    assert_eq!(latest.cursor(utc()), Some(date(2024, 6, 30)));
  }

  #[tokio::test]
  async fn full_mode_rewrites_older_monotonic_rows() {
    let s = store().await;
    s.merge(metric_row(date(2024, 3, 31))).await.unwrap();

    let batch = FetchBatch::new(vec![record(json!({ "report_date": "2024-03-31", "roe": 9.0 }))]);
    let result = engine()
      .apply(&s, EntityKind::FinancialMetric, batch, SyncMode::Full, now())
      .await
      .unwrap();

    assert_eq!((result.written, result.skipped, result.wiped), (1, 0, 0));
    let Some(Row::FinancialMetric(m)) = s.latest(EntityKind::FinancialMetric).await.unwrap() else {
      panic!("expected a metric");
    };
    assert_eq!(m.roe, 9.0);
    assert_eq!(m.updated_at, now());
  }

  #[tokio::test]
  async fn news_outside_the_window_is_pruned() {
    let s = store().await;
    let old = (now() - Duration::days(31)).to_rfc3339();
    let fresh = (now() - Duration::days(29)).to_rfc3339();

    let batch = FetchBatch::new(vec![
      record(json!({ "title": "old", "published_at": old })),
      record(json!({ "title": "fresh", "published_at": fresh })),
    ]);
    let result = engine()
      .apply(&s, EntityKind::NewsItem, batch, SyncMode::Incremental, now())
      .await
      .unwrap();

    assert_eq!((result.written, result.pruned), (2, 1));
    let rows = s.recent(EntityKind::NewsItem, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    let Row::NewsItem(n) = &rows[0] else { panic!("expected news") };
    assert_eq!(n.title, "fresh");
  }

  #[tokio::test]
  async fn unmappable_records_are_skipped_and_defaults_counted() {
    let s = store().await;
    let batch = FetchBatch {
      records: vec![
        record(json!({ "trade_date": "2024-06-28", "close": "1,234.5" })),
        record(json!({ "close": 10.0 })),
        record(json!({ "trade_date": "not a date" })),
      ],
      dropped: 2,
    };
    let result = engine()
      .apply(&s, EntityKind::DailyPrice, batch, SyncMode::Incremental, now())
      .await
      .unwrap();

    assert_eq!(result.written, 1);
    assert_eq!(result.skipped, 2);
    assert_eq!(result.dropped, 2);
    // open, high, low, volume and amount were absent.
    assert_eq!(result.defaulted, 5);
    let Some(Row::DailyPrice(p)) = s.latest(EntityKind::DailyPrice).await.unwrap() else {
      panic!("expected a price");
    };
    assert_eq!(p.close, 1234.5);
  }

  #[tokio::test]
  async fn empty_batch_is_a_successful_no_op() {
    let s = store().await;
    let result = engine()
      .apply(&s, EntityKind::InsiderTrade, FetchBatch::default(), SyncMode::Incremental, now())
      .await
      .unwrap();
    assert_eq!(result, ApplyResult::default());
    assert_eq!(s.last_synced(EntityKind::InsiderTrade).await.unwrap(), Some(now()));
  }

  #[tokio::test]
  async fn failed_prune_leaves_nothing_of_the_step_behind() {
    let (s, dir) = file_store().await;
    let stale = now() - Duration::days(45);
    let batch =
      FetchBatch::new(vec![record(json!({ "title": "stale", "published_at": stale.to_rfc3339() }))]);
    engine()
      .apply(&s, EntityKind::NewsItem, batch, SyncMode::Incremental, stale)
      .await
      .unwrap();
    refuse_deletes(&dir, "news_item");

    let fresh = (now() - Duration::days(1)).to_rfc3339();
    let batch = FetchBatch::new(vec![record(json!({ "title": "fresh", "published_at": fresh }))]);
    let result = engine()
      .apply(&s, EntityKind::NewsItem, batch, SyncMode::Incremental, now())
      .await;

    assert!(result.is_err());
    let rows = s.recent(EntityKind::NewsItem, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(matches!(&rows[0], Row::NewsItem(n) if n.title == "stale"));
    assert_eq!(s.last_synced(EntityKind::NewsItem).await.unwrap(), Some(stale));

    std::fs::remove_dir_all(dir.root()).ok();
  }

  #[tokio::test]
  async fn wipe_on_full_reloads_wipeable_collections_only() {
    let s = store().await;
    s.merge(metric_row(date(2023, 12, 31))).await.unwrap();
    s.merge(metric_row(date(2024, 3, 31))).await.unwrap();
    let engine = engine().with_wipe_on_full(true);

    let batch = FetchBatch::new(vec![record(json!({ "report_date": "2024-06-30" }))]);
    let result = engine
      .apply(&s, EntityKind::FinancialMetric, batch, SyncMode::Full, now())
      .await
      .unwrap();
    assert_eq!((result.wiped, result.written), (2, 1));
    assert_eq!(s.count(EntityKind::FinancialMetric).await.unwrap(), 1);

    s.merge(crate::testing::price_row(date(2024, 6, 27), now())).await.unwrap();
    let batch = FetchBatch::new(vec![record(json!({ "trade_date": "2024-06-28" }))]);
    let result = engine
      .apply(&s, EntityKind::DailyPrice, batch, SyncMode::Full, now())
      .await
      .unwrap();
    assert_eq!(result.wiped, 0);
    assert_eq!(s.count(EntityKind::DailyPrice).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn valuation_snapshot_is_dated_today_and_replaced_within_the_day() {
    let s = store().await;
    let engine = engine();
    for pe in [7.0, 7.5] {
      let batch = FetchBatch::new(vec![record(json!({ "pe_ratio": pe }))]);
      engine
        .apply(&s, EntityKind::ValuationSnapshot, batch, SyncMode::Incremental, now())
        .await
        .unwrap();
    }

    assert_eq!(s.count(EntityKind::ValuationSnapshot).await.unwrap(), 1);
    let Some(Row::ValuationSnapshot(v)) = s.latest(EntityKind::ValuationSnapshot).await.unwrap()
    else {
      panic!("expected a snapshot");
    };
    assert_eq!(v.snapshot_date, date(2024, 7, 1));
    assert_eq!(v.pe_ratio, 7.5);
  }
}
