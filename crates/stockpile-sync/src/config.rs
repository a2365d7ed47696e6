//! Tunables of the sync engine, deserialised from the `[sync]` section of the
//! application config.

use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Minimum spacing between consecutive provider calls within one flow.
  pub fetch_delay_ms:           u64,
  /// Length of the rolling window kept for news and valuation snapshots.
  pub retention_days:           u32,
  /// Securities synced at the same time by a batch.
  pub concurrency:              usize,
  /// Whether full mode wipes non-append-only collections before reloading.
  pub wipe_on_full:             bool,
  /// Offset of the market calendar used by the daily freshness gate.
  pub calendar_utc_offset_secs: i32,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      fetch_delay_ms:           1_000,
      retention_days:           30,
      concurrency:              4,
      wipe_on_full:             false,
      calendar_utc_offset_secs: 0,
    }
  }
}

impl SyncConfig {
  pub fn fetch_delay(&self) -> Duration { Duration::from_millis(self.fetch_delay_ms) }

  pub fn retention(&self) -> Result<chrono::Duration> {
    chrono::Duration::try_days(i64::from(self.retention_days))
      .ok_or(Error::InvalidRetention(self.retention_days))
  }

  pub fn calendar_offset(&self) -> Result<FixedOffset> {
    FixedOffset::east_opt(self.calendar_utc_offset_secs)
      .ok_or(Error::InvalidCalendarOffset(self.calendar_utc_offset_secs))
  }
}
