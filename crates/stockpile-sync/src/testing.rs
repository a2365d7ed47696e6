//! Shared fixtures for the engine's tests: in-memory and scratch-file stores
//! and a scriptable fetch adapter.

use std::{collections::HashMap, sync::Mutex};

use chrono::{DateTime, NaiveDate, TimeZone as _, Utc};
use serde_json::Value;
use stockpile_core::{
  fetch::{FetchAdapter, FetchBatch, FetchError},
  normalize::Record,
  row::{DailyPrice, FinancialMetric, Row},
  security::{EntityKind, Symbol, SyncMode},
  store::StoreRouter as _,
};
use stockpile_store_sqlite::{SqliteStore, StoreDirectory};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub fn symbol() -> Symbol { Symbol::parse("601318").unwrap() }

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

pub fn written_at() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap() }

pub async fn store() -> SqliteStore {
  SqliteStore::open_in_memory(symbol())
    .await
    .expect("in-memory store")
}

/// A store in a scratch directory, for tests that need a second connection
/// to the same file. Callers remove the directory when done.
pub async fn file_store() -> (SqliteStore, StoreDirectory) {
  let dir =
    StoreDirectory::new(std::env::temp_dir().join(format!("stockpile-sync-{}", Uuid::new_v4())));
  let store = dir.open(&symbol()).await.expect("file store");
  (store, dir)
}

/// Make every `DELETE` on `table` abort, via a separate connection.
pub fn refuse_deletes(dir: &StoreDirectory, table: &str) {
  rusqlite::Connection::open(dir.path_for(&symbol()))
    .expect("second connection")
    .execute_batch(&format!(
      "CREATE TRIGGER refuse_{table}_delete BEFORE DELETE ON {table}
       BEGIN SELECT RAISE(ABORT, 'delete refused'); END;"
    ))
    .expect("install trigger");
}

pub fn record(value: Value) -> Record {
  match value {
    Value::Object(map) => map,
    other => panic!("not an object: {other}"),
  }
}

pub fn price_row(trade_date: NaiveDate, updated_at: DateTime<Utc>) -> Row {
  Row::DailyPrice(DailyPrice {
    symbol: symbol(),
    trade_date,
    open: 10.0,
    high: 11.0,
    low: 9.5,
    close: 10.5,
    volume: 1_000.0,
    amount: 10_500.0,
    updated_at,
  })
}

pub fn metric_row(report_date: NaiveDate) -> Row {
  Row::FinancialMetric(FinancialMetric {
    symbol: symbol(),
    report_date,
    roe: 12.0,
    net_margin: 20.0,
    gross_margin: 35.0,
    eps: 1.1,
    net_profit: 1.0e9,
    revenue: 5.0e9,
    updated_at: written_at(),
  })
}

// ─── Fake adapter ────────────────────────────────────────────────────────────

/// One recorded `fetch` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCall {
  pub kind:  EntityKind,
  pub mode:  SyncMode,
  pub since: Option<NaiveDate>,
}

/// A [`FetchAdapter`] serving canned responses. Kinds without a scripted
/// response return an empty batch.
#[derive(Default)]
pub struct FakeAdapter {
  responses:     HashMap<EntityKind, Result<FetchBatch, FetchError>>,
  report_period: Option<Result<Option<NaiveDate>, FetchError>>,
  failing:       Vec<Symbol>,
  cancel_after:  Option<(EntityKind, CancellationToken)>,
  pub calls:     Mutex<Vec<FetchCall>>,
  pub probes:    Mutex<usize>,
  pub instants:  Mutex<Vec<Instant>>,
}

impl FakeAdapter {
  pub fn new() -> Self { Self::default() }

  pub fn respond(mut self, kind: EntityKind, records: Vec<Value>) -> Self {
    let batch = FetchBatch::new(records.into_iter().map(record).collect());
    self.responses.insert(kind, Ok(batch));
    self
  }

  pub fn fail(mut self, kind: EntityKind, error: FetchError) -> Self {
    self.responses.insert(kind, Err(error));
    self
  }

  /// Every fetch for `symbol` fails permanently.
  pub fn fail_symbol(mut self, symbol: Symbol) -> Self {
    self.failing.push(symbol);
    self
  }

  pub fn report_period(mut self, period: Result<Option<NaiveDate>, FetchError>) -> Self {
    self.report_period = Some(period);
    self
  }

  /// Cancel `token` right after serving a fetch of `kind`.
  pub fn cancel_after(mut self, kind: EntityKind, token: CancellationToken) -> Self {
    self.cancel_after = Some((kind, token));
    self
  }

  pub fn fetched_kinds(&self) -> Vec<EntityKind> {
    self.calls.lock().unwrap().iter().map(|c| c.kind).collect()
  }

  pub fn probe_count(&self) -> usize { *self.probes.lock().unwrap() }
}

impl FetchAdapter for FakeAdapter {
  async fn fetch(
    &self,
    kind: EntityKind,
    symbol: &Symbol,
    mode: SyncMode,
    since: Option<NaiveDate>,
  ) -> Result<FetchBatch, FetchError> {
    self.instants.lock().unwrap().push(Instant::now());
    self.calls.lock().unwrap().push(FetchCall { kind, mode, since });
    if let Some((after, token)) = &self.cancel_after
      && *after == kind
    {
      token.cancel();
    }
    if self.failing.contains(symbol) {
      return Err(FetchError::permanent(format!("unknown symbol {symbol}")));
    }
    self.responses.get(&kind).cloned().unwrap_or_else(|| Ok(FetchBatch::default()))
  }

  async fn latest_report_period(&self, _symbol: &Symbol) -> Result<Option<NaiveDate>, FetchError> {
    self.instants.lock().unwrap().push(Instant::now());
    *self.probes.lock().unwrap() += 1;
    self.report_period.clone().unwrap_or(Ok(None))
  }
}
