//! Run accounting: per-entity outcomes and the per-security run report.

use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  fetch::FetchError,
  security::{EntityKind, Symbol, SyncMode},
};

// ─── Apply counts ────────────────────────────────────────────────────────────

/// Counts produced by applying one fetched batch to a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
  /// Rows merged into the store.
  pub written:   usize,
  /// Records not written: mapping failures and rows filtered out as already
  /// known.
  pub skipped:   usize,
  /// Rows removed by the retention prune.
  pub pruned:    usize,
  /// Rows removed by a full-mode wipe-and-reload.
  pub wiped:     usize,
  /// Numeric attributes that fell back to zero.
  pub defaulted: usize,
  /// Provider rows the fetch adapter dropped before mapping.
  pub dropped:   usize,
}

impl AddAssign for ApplyResult {
  fn add_assign(&mut self, rhs: Self) {
    self.written += rhs.written;
    self.skipped += rhs.skipped;
    self.pruned += rhs.pruned;
    self.wiped += rhs.wiped;
    self.defaulted += rhs.defaulted;
    self.dropped += rhs.dropped;
  }
}

// ─── Step state ──────────────────────────────────────────────────────────────

/// Where an entity step is in its lifecycle.
///
/// `Pending → Fetching → Merging → Done`; `Failed` is reachable from
/// `Fetching` and `Merging`. `UpToDate` and `Cancelled` are reached from
/// `Pending` when the step never starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
  Pending,
  Fetching,
  Merging,
  Done,
  Failed,
  UpToDate,
  Cancelled,
}

impl StepState {
  pub fn can_advance_to(self, next: StepState) -> bool {
    use StepState::*;
    matches!(
      (self, next),
      (Pending, Fetching | UpToDate | Cancelled)
        | (Fetching, Merging | Failed)
        | (Merging, Done | Failed)
    )
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Done | Self::Failed | Self::UpToDate | Self::Cancelled)
  }
}

/// Why an entity step failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum StepError {
  Fetch { retryable: bool, message: String },
  Store { message: String },
}

impl StepError {
  pub fn store(err: &dyn std::error::Error) -> Self {
    Self::Store { message: err.to_string() }
  }
}

impl From<FetchError> for StepError {
  fn from(err: FetchError) -> Self {
    Self::Fetch { retryable: err.is_retryable(), message: err.to_string() }
  }
}

impl std::fmt::Display for StepError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Fetch { message, .. } | Self::Store { message } => f.write_str(message),
    }
  }
}

/// Final outcome of one entity step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReport {
  pub kind:   EntityKind,
  pub state:  StepState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<ApplyResult>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:  Option<StepError>,
}

// ─── Run report ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  /// Every entity step reached a terminal state.
  Completed,
  /// The whole security was already fresh; nothing was fetched.
  SkippedFresh,
  /// The run was cancelled between entity steps.
  Cancelled,
}

/// The outcome of one `sync` call for one security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
  pub run_id:      Uuid,
  pub symbol:      Symbol,
  pub mode:        SyncMode,
  pub status:      RunStatus,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub entities:    Vec<EntityReport>,
}

impl RunReport {
  pub fn entity(&self, kind: EntityKind) -> Option<&EntityReport> {
    self.entities.iter().find(|e| e.kind == kind)
  }

  pub fn failed(&self) -> impl Iterator<Item = &EntityReport> {
    self.entities.iter().filter(|e| e.state == StepState::Failed)
  }

  /// Sum of every successful step's counts.
  pub fn totals(&self) -> ApplyResult {
    let mut totals = ApplyResult::default();
    for result in self.entities.iter().filter_map(|e| e.result) {
      totals += result;
    }
    totals
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn step_transitions_follow_the_state_machine() {
    use StepState::*;
    assert!(Pending.can_advance_to(Fetching));
    assert!(Fetching.can_advance_to(Merging));
    assert!(Merging.can_advance_to(Done));
    assert!(Fetching.can_advance_to(Failed));
    assert!(Merging.can_advance_to(Failed));

    assert!(!Pending.can_advance_to(Done));
    assert!(!Pending.can_advance_to(Failed));
    assert!(!Done.can_advance_to(Fetching));
    assert!(!Failed.can_advance_to(Merging));
  }

  #[test]
  fn fetch_errors_keep_retryability() {
    let err: StepError = FetchError::transient("timeout").into();
    assert!(matches!(err, StepError::Fetch { retryable: true, .. }));
    let err: StepError = FetchError::permanent("unknown symbol").into();
    assert!(matches!(err, StepError::Fetch { retryable: false, .. }));
  }
}
