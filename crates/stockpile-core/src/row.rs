//! Typed rows, one struct per entity collection.
//!
//! Every row carries the symbol it belongs to and an `updated_at` timestamp
//! recording the wall-clock time of the write that produced it. Business dates
//! (`trade_date`, `report_date`, …) are separate fields.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::security::{EntityKind, Symbol};

// ─── Collections ─────────────────────────────────────────────────────────────

/// Company profile. One row per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
  pub symbol:       Symbol,
  pub name:         String,
  pub industry:     String,
  pub area:         String,
  pub market:       String,
  /// Listing date exactly as the provider reports it.
  pub listing_date: String,
  pub updated_at:   DateTime<Utc>,
}

/// One daily OHLCV bar. Keyed by `(symbol, trade_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrice {
  pub symbol:     Symbol,
  pub trade_date: NaiveDate,
  pub open:       f64,
  pub high:       f64,
  pub low:        f64,
  pub close:      f64,
  pub volume:     f64,
  pub amount:     f64,
  pub updated_at: DateTime<Utc>,
}

/// Fundamentals for one report period. Keyed by `(symbol, report_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetric {
  pub symbol:       Symbol,
  pub report_date:  NaiveDate,
  pub roe:          f64,
  pub net_margin:   f64,
  pub gross_margin: f64,
  pub eps:          f64,
  pub net_profit:   f64,
  pub revenue:      f64,
  pub updated_at:   DateTime<Utc>,
}

/// A shareholding change by an insider. Keyed by
/// `(symbol, holder_name, change_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderTrade {
  pub symbol:         Symbol,
  pub holder_name:    String,
  pub change_date:    NaiveDate,
  pub change_type:    String,
  pub shares_changed: f64,
  pub price:          f64,
  pub updated_at:     DateTime<Utc>,
}

/// A news headline. Keyed by `(symbol, title, published_at)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
  pub symbol:       Symbol,
  pub title:        String,
  pub published_at: DateTime<Utc>,
  pub source:       String,
  pub url:          String,
  pub updated_at:   DateTime<Utc>,
}

/// Valuation figures captured on one calendar day. Keyed by
/// `(symbol, snapshot_date)`; the newest snapshot is the current valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
  pub symbol:             Symbol,
  pub snapshot_date:      NaiveDate,
  pub market_cap:         f64,
  pub total_shares:       f64,
  pub outstanding_shares: f64,
  pub pe_ratio:           f64,
  pub pb_ratio:           f64,
  pub updated_at:         DateTime<Utc>,
}

// ─── Row ─────────────────────────────────────────────────────────────────────

/// A row of any collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Row {
  BasicInfo(BasicInfo),
  DailyPrice(DailyPrice),
  FinancialMetric(FinancialMetric),
  InsiderTrade(InsiderTrade),
  NewsItem(NewsItem),
  ValuationSnapshot(ValuationSnapshot),
}

impl Row {
  pub fn kind(&self) -> EntityKind {
    match self {
      Self::BasicInfo(_) => EntityKind::BasicInfo,
      Self::DailyPrice(_) => EntityKind::DailyPrice,
      Self::FinancialMetric(_) => EntityKind::FinancialMetric,
      Self::InsiderTrade(_) => EntityKind::InsiderTrade,
      Self::NewsItem(_) => EntityKind::NewsItem,
      Self::ValuationSnapshot(_) => EntityKind::ValuationSnapshot,
    }
  }

  pub fn symbol(&self) -> &Symbol {
    match self {
      Self::BasicInfo(r) => &r.symbol,
      Self::DailyPrice(r) => &r.symbol,
      Self::FinancialMetric(r) => &r.symbol,
      Self::InsiderTrade(r) => &r.symbol,
      Self::NewsItem(r) => &r.symbol,
      Self::ValuationSnapshot(r) => &r.symbol,
    }
  }

  pub fn updated_at(&self) -> DateTime<Utc> {
    match self {
      Self::BasicInfo(r) => r.updated_at,
      Self::DailyPrice(r) => r.updated_at,
      Self::FinancialMetric(r) => r.updated_at,
      Self::InsiderTrade(r) => r.updated_at,
      Self::NewsItem(r) => r.updated_at,
      Self::ValuationSnapshot(r) => r.updated_at,
    }
  }

  /// The ordering date used by `latest` and by monotonic filtering.
  /// `None` for basic info, which has a single row per symbol.
  ///
  /// News is dated by its publication instant on the market calendar at
  /// `offset`; every other kind carries a calendar date already.
  pub fn cursor(&self, offset: FixedOffset) -> Option<NaiveDate> {
    match self {
      Self::BasicInfo(_) => None,
      Self::DailyPrice(r) => Some(r.trade_date),
      Self::FinancialMetric(r) => Some(r.report_date),
      Self::InsiderTrade(r) => Some(r.change_date),
      Self::NewsItem(r) => Some(r.published_at.with_timezone(&offset).date_naive()),
      Self::ValuationSnapshot(r) => Some(r.snapshot_date),
    }
  }

  /// The timestamp compared against the retention cutoff.
  pub fn retention_instant(&self) -> DateTime<Utc> {
    match self {
      Self::NewsItem(r) => r.published_at,
      other => other.updated_at(),
    }
  }
}
