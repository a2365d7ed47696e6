//! The freshness gate: decides whether an entity kind needs a refresh.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use stockpile_core::{
  security::{EntityKind, SyncMode},
  store::EntityStore,
};

/// Daily write gate evaluated on a market calendar with a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessGate {
  offset: FixedOffset,
}

impl FreshnessGate {
  pub fn new(offset: FixedOffset) -> Self { Self { offset } }

  pub fn offset(&self) -> FixedOffset { self.offset }

  /// The calendar date of `at` on the market calendar.
  pub fn calendar_date(&self, at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&self.offset).date_naive()
  }

  /// Full mode always refreshes. Incremental mode refreshes unless the
  /// collection was last refreshed on the same calendar date as `now`.
  ///
  /// The last refresh is the later of the store's sync stamp and its newest
  /// `updated_at`, so a step that fetched nothing still counts.
  pub async fn needs_refresh<S: EntityStore>(
    &self,
    store: &S,
    kind: EntityKind,
    mode: SyncMode,
    now: DateTime<Utc>,
  ) -> Result<bool, S::Error> {
    if mode.is_full() {
      return Ok(true);
    }
    let last = store.last_synced(kind).await?.max(store.last_written(kind).await?);
    Ok(last.is_none_or(|at| self.calendar_date(at) != self.calendar_date(now)))
  }

  /// Whether the provider has published a report period newer than the
  /// newest stored financial metric. An unknown provider period never
  /// counts as an advance.
  pub async fn report_period_advanced<S: EntityStore>(
    &self,
    store: &S,
    provider_latest: Option<NaiveDate>,
  ) -> Result<bool, S::Error> {
    let Some(provider_latest) = provider_latest else {
      return Ok(false);
    };
    let stored = store
      .latest(EntityKind::FinancialMetric)
      .await?
      .and_then(|row| row.cursor(self.offset));
    Ok(stored.is_none_or(|stored| provider_latest > stored))
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone as _};
  use stockpile_core::{row::Row, store::StepWrite};

  use super::*;
  use crate::testing::{date, metric_row, price_row, store};

  fn utc_gate() -> FreshnessGate { FreshnessGate::new(FixedOffset::east_opt(0).unwrap()) }

  #[tokio::test]
  async fn empty_collection_needs_refresh() {
    let s = store().await;
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
    assert!(
      utc_gate()
        .needs_refresh(&s, EntityKind::DailyPrice, SyncMode::Incremental, now)
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn same_day_write_suppresses_incremental_refresh() {
    let s = store().await;
    let gate = utc_gate();
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();

    assert!(gate.needs_refresh(&s, EntityKind::DailyPrice, SyncMode::Incremental, now).await.unwrap());
    s.merge(price_row(date(2024, 6, 28), now)).await.unwrap();
    assert!(!gate.needs_refresh(&s, EntityKind::DailyPrice, SyncMode::Incremental, now).await.unwrap());

    let tomorrow = now + Duration::days(1);
    assert!(
      gate
        .needs_refresh(&s, EntityKind::DailyPrice, SyncMode::Incremental, tomorrow)
        .await
        .unwrap()
    );
  }

  #[tokio::test]
  async fn refresh_that_stored_nothing_still_counts_for_the_day() {
    let s = store().await;
    let gate = utc_gate();
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
    let empty = StepWrite {
      kind: EntityKind::InsiderTrade,
      rows: Vec::new(),
      wipe: false,
      prune_before: None,
      synced_at: now,
    };
    s.commit_step(empty).await.unwrap();

    let kind = EntityKind::InsiderTrade;
    let later = now + Duration::hours(1);
    assert!(!gate.needs_refresh(&s, kind, SyncMode::Incremental, later).await.unwrap());
    let tomorrow = now + Duration::days(1);
    assert!(gate.needs_refresh(&s, kind, SyncMode::Incremental, tomorrow).await.unwrap());
  }

  #[tokio::test]
  async fn full_mode_bypasses_the_gate() {
    let s = store().await;
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
    s.merge(price_row(date(2024, 6, 28), now)).await.unwrap();

    assert!(utc_gate().needs_refresh(&s, EntityKind::DailyPrice, SyncMode::Full, now).await.unwrap());
  }

  #[tokio::test]
  async fn calendar_day_follows_the_configured_offset() {
    let s = store().await;
    let written = Utc.with_ymd_and_hms(2024, 7, 1, 15, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 7, 1, 17, 0, 0).unwrap();
    s.merge(price_row(date(2024, 6, 28), written)).await.unwrap();

    // 15:00Z and 17:00Z are the same UTC day but straddle midnight at UTC+8.
    let shanghai = FreshnessGate::new(FixedOffset::east_opt(8 * 3600).unwrap());
    assert!(!utc_gate().needs_refresh(&s, EntityKind::DailyPrice, SyncMode::Incremental, now).await.unwrap());
    assert!(shanghai.needs_refresh(&s, EntityKind::DailyPrice, SyncMode::Incremental, now).await.unwrap());
  }

  #[tokio::test]
  async fn report_period_advance_compares_against_latest_stored() {
    let s = store().await;
    let gate = utc_gate();

    assert!(gate.report_period_advanced(&s, Some(date(2024, 3, 31))).await.unwrap());
    assert!(!gate.report_period_advanced(&s, None).await.unwrap());

    s.merge(metric_row(date(2024, 3, 31))).await.unwrap();
    assert!(!gate.report_period_advanced(&s, Some(date(2024, 3, 31))).await.unwrap());
    assert!(!gate.report_period_advanced(&s, Some(date(2023, 12, 31))).await.unwrap());
    assert!(gate.report_period_advanced(&s, Some(date(2024, 6, 30))).await.unwrap());

    let latest = s.latest(EntityKind::FinancialMetric).await.unwrap();
    assert!(matches!(latest, Some(Row::FinancialMetric(_))));
  }
}
