//! The `EntityStore` trait and the `StoreRouter` that hands out stores.
//!
//! A store holds the six collections of exactly one security. Cross-security
//! access is not supported; callers route by symbol through a
//! [`StoreRouter`]. Storage backends (e.g. `stockpile-store-sqlite`) implement
//! both traits; the sync engine and the query API depend only on them.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  row::Row,
  security::{EntityKind, Symbol},
};

// ─── Step writes ─────────────────────────────────────────────────────────────

/// Everything one successful sync step writes to a collection.
///
/// Committed as a unit by [`EntityStore::commit_step`]: the rows, the
/// optional wipe and prune, and the refresh stamp land together or not at
/// all.
#[derive(Debug, Clone, PartialEq)]
pub struct StepWrite {
  pub kind:         EntityKind,
  pub rows:         Vec<Row>,
  /// Empty the collection before writing.
  pub wipe:         bool,
  /// Remove rows older than this after writing. Ignored for kinds without a
  /// rolling window.
  pub prune_before: Option<DateTime<Utc>>,
  /// Recorded as the collection's last refresh.
  pub synced_at:    DateTime<Utc>,
}

/// Row counts produced by [`EntityStore::commit_step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCounts {
  pub wiped:   usize,
  pub written: usize,
  pub pruned:  usize,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Durable keyed storage for one security.
///
/// All methods return `Send` futures so stores can be driven from
/// multi-threaded runtimes.
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The security this store belongs to.
  fn symbol(&self) -> &Symbol;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert `row`, or overwrite the row sharing its composite key.
  /// Atomic for the single row. Rejects rows of another symbol.
  fn merge(&self, row: Row) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Merge every row of one collection inside a single transaction: either
  /// all rows are written or none are. Returns the number written.
  fn merge_batch(
    &self,
    kind: EntityKind,
    rows: Vec<Row>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Wipe the collection and write `rows` in one transaction.
  /// Returns `(removed, written)`.
  fn reload(
    &self,
    kind: EntityKind,
    rows: Vec<Row>,
  ) -> impl Future<Output = Result<(usize, usize), Self::Error>> + Send + '_;

  /// Remove rows whose retention timestamp is strictly older than `cutoff`.
  /// Only rolling-window collections are affected; others return 0.
  fn delete_before(
    &self,
    kind: EntityKind,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Apply one sync step in a single transaction and stamp the collection as
  /// refreshed at `write.synced_at`. The stamp is written even when there
  /// are no rows. On error nothing of the step is kept.
  fn commit_step(
    &self,
    write: StepWrite,
  ) -> impl Future<Output = Result<StepCounts, Self::Error>> + Send + '_;

  /// Remove every row of the collection. Returns the count removed.
  fn clear(&self, kind: EntityKind)
  -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The row with the greatest ordering cursor, or `None` if empty.
  fn latest(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<Option<Row>, Self::Error>> + Send + '_;

  /// The most recent `updated_at` in the collection.
  fn last_written(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;

  /// When the collection was last refreshed by [`commit_step`], whether or
  /// not that refresh produced rows.
  ///
  /// [`commit_step`]: EntityStore::commit_step
  fn last_synced(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;

  /// Up to `limit` rows, newest cursor first.
  fn recent(
    &self,
    kind: EntityKind,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + '_;

  fn count(&self, kind: EntityKind)
  -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Maps symbols to their stores.
pub trait StoreRouter: Send + Sync {
  type Store: EntityStore;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Open the store for `symbol`, creating it if needed. Opening an existing
  /// store is idempotent.
  fn open<'a>(
    &'a self,
    symbol: &'a Symbol,
  ) -> impl Future<Output = Result<Self::Store, Self::Error>> + Send + 'a;

  /// Whether a store for `symbol` already exists.
  fn contains(&self, symbol: &Symbol) -> bool;

  /// Symbols of every existing store, sorted.
  fn symbols(&self) -> Result<Vec<Symbol>, Self::Error>;
}
