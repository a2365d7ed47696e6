//! Securities, entity kinds and sync modes.
//!
//! A security owns one store holding one collection per [`EntityKind`]. The
//! symbol doubles as part of the store's file name, so it is validated on
//! construction.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

// ─── Symbol ──────────────────────────────────────────────────────────────────

/// A ticker symbol, e.g. `601318`.
///
/// Only ASCII alphanumerics, `.`, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
  pub fn parse(raw: impl Into<String>) -> Result<Self> {
    let raw = raw.into();
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
      && trimmed.len() <= 32
      && trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if !valid {
      return Err(Error::InvalidSymbol(raw));
    }
    Ok(Self(trimmed.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The listing exchange, inferred from the code prefix.
  pub fn exchange(&self) -> Exchange {
    match self.0.as_bytes().first() {
      Some(b'6') => Exchange::Shanghai,
      Some(b'0' | b'3') => Exchange::Shenzhen,
      _ => Exchange::Other,
    }
  }

  /// The symbol with its exchange suffix (`601318` → `601318.SH`).
  ///
  /// Symbols that already carry a suffix, or whose exchange is unknown, are
  /// returned unchanged.
  pub fn qualified(&self) -> String {
    match self.exchange().suffix() {
      Some(suffix) if !self.0.contains('.') => format!("{}.{suffix}", self.0),
      _ => self.0.clone(),
    }
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for Symbol {
  fn as_ref(&self) -> &str { &self.0 }
}

impl FromStr for Symbol {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for Symbol {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(value) }
}

impl From<Symbol> for String {
  fn from(value: Symbol) -> Self { value.0 }
}

// ─── Exchange ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
  Shanghai,
  Shenzhen,
  Other,
}

impl Exchange {
  pub fn suffix(self) -> Option<&'static str> {
    match self {
      Self::Shanghai => Some("SH"),
      Self::Shenzhen => Some("SZ"),
      Self::Other => None,
    }
  }

  /// Market name used when the provider omits one.
  pub fn market_name(self) -> &'static str {
    match self {
      Self::Shanghai => "Shanghai",
      Self::Shenzhen => "Shenzhen",
      Self::Other => "",
    }
  }
}

// ─── Entity kinds ────────────────────────────────────────────────────────────

/// One of the six data categories stored per security.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  BasicInfo,
  DailyPrice,
  FinancialMetric,
  InsiderTrade,
  NewsItem,
  ValuationSnapshot,
}

impl EntityKind {
  /// All kinds in the order a sync run processes them.
  pub const SYNC_ORDER: [EntityKind; 6] = [
    Self::BasicInfo,
    Self::DailyPrice,
    Self::FinancialMetric,
    Self::InsiderTrade,
    Self::NewsItem,
    Self::ValuationSnapshot,
  ];

  pub fn parse(raw: &str) -> Result<Self> {
    raw
      .parse()
      .map_err(|_| Error::UnknownEntityKind(raw.to_owned()))
  }

  /// Incremental runs only accept rows newer than the stored latest cursor.
  pub fn is_monotonic(self) -> bool {
    matches!(self, Self::FinancialMetric | Self::InsiderTrade)
  }

  /// Rows older than the retention window are pruned after every apply.
  pub fn is_rolling(self) -> bool {
    matches!(self, Self::NewsItem | Self::ValuationSnapshot)
  }

  /// Whether a full-mode run may wipe the collection before reloading it.
  /// Basic info and daily prices are append-forever.
  pub fn is_wipeable(self) -> bool {
    !matches!(self, Self::BasicInfo | Self::DailyPrice)
  }
}

// ─── Sync mode ───────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncMode {
  /// Complete refetch/backfill; ignores freshness gating.
  Full,
  /// Refresh only what is stale or newly available.
  #[default]
  Incremental,
}

impl SyncMode {
  pub fn parse(raw: &str) -> Result<Self> {
    raw
      .parse()
      .map_err(|_| Error::UnknownSyncMode(raw.to_owned()))
  }

  pub fn is_full(self) -> bool { matches!(self, Self::Full) }
}
