//! The upstream fetch boundary.
//!
//! The sync engine never talks to a data provider directly; it asks a
//! [`FetchAdapter`] for [`Record`]s already keyed by attribute names. How the
//! adapter obtains them (HTTP, files, a vendor SDK) is its own business.

use std::future::Future;

use chrono::NaiveDate;
use thiserror::Error;

use crate::{
  normalize::Record,
  security::{EntityKind, Symbol, SyncMode},
};

/// Records returned by one fetch call.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
  pub records: Vec<Record>,
  /// Provider rows the adapter could not turn into records at all.
  pub dropped: usize,
}

impl FetchBatch {
  pub fn new(records: Vec<Record>) -> Self { Self { records, dropped: 0 } }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

/// A failed fetch call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Network trouble, timeouts, throttling or upstream 5xx. A later run may
  /// succeed.
  #[error("transient fetch failure: {0}")]
  Transient(String),

  /// The request can never succeed as issued (unknown symbol, rejected
  /// request, undecodable payload).
  #[error("permanent fetch failure: {0}")]
  Permanent(String),
}

impl FetchError {
  pub fn transient(message: impl Into<String>) -> Self { Self::Transient(message.into()) }

  pub fn permanent(message: impl Into<String>) -> Self { Self::Permanent(message.into()) }

  pub fn is_retryable(&self) -> bool { matches!(self, Self::Transient(_)) }
}

/// Source of provider data for the sync engine.
pub trait FetchAdapter: Send + Sync {
  /// Fetch records of `kind` for `symbol`.
  ///
  /// `since` is the newest date the caller already holds (or the start of a
  /// retention window); adapters may use it to narrow the request but are not
  /// required to. It is always `None` in full mode.
  fn fetch<'a>(
    &'a self,
    kind: EntityKind,
    symbol: &'a Symbol,
    mode: SyncMode,
    since: Option<NaiveDate>,
  ) -> impl Future<Output = Result<FetchBatch, FetchError>> + Send + 'a;

  /// The most recent report period the provider has published for `symbol`,
  /// if any.
  fn latest_report_period<'a>(
    &'a self,
    symbol: &'a Symbol,
  ) -> impl Future<Output = Result<Option<NaiveDate>, FetchError>> + Send + 'a;
}
