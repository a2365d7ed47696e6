//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings
//! (`2024-06-30T08:00:00.000000Z`) so that string comparison in SQL matches
//! chronological order. Calendar dates are stored as `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use stockpile_core::{
  row::{
    BasicInfo, DailyPrice, FinancialMetric, InsiderTrade, NewsItem, Row,
    ValuationSnapshot,
  },
  security::{EntityKind, Symbol},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Per-collection SQL ──────────────────────────────────────────────────────

pub fn table(kind: EntityKind) -> &'static str {
  match kind {
    EntityKind::BasicInfo => "basic_info",
    EntityKind::DailyPrice => "daily_price",
    EntityKind::FinancialMetric => "financial_metric",
    EntityKind::InsiderTrade => "insider_trade",
    EntityKind::NewsItem => "news_item",
    EntityKind::ValuationSnapshot => "valuation_snapshot",
  }
}

/// Column list in the order [`read_row`] expects.
pub fn columns(kind: EntityKind) -> &'static str {
  match kind {
    EntityKind::BasicInfo => "name, industry, area, market, listing_date, updated_at",
    EntityKind::DailyPrice => {
      "trade_date, open, high, low, close, volume, amount, updated_at"
    }
    EntityKind::FinancialMetric => {
      "report_date, roe, net_margin, gross_margin, eps, net_profit, revenue, updated_at"
    }
    EntityKind::InsiderTrade => {
      "holder_name, change_date, change_type, shares_changed, price, updated_at"
    }
    EntityKind::NewsItem => "title, published_at, source, url, updated_at",
    EntityKind::ValuationSnapshot => {
      "snapshot_date, market_cap, total_shares, outstanding_shares, pe_ratio, pb_ratio, \
       updated_at"
    }
  }
}

/// `ORDER BY` clause putting the newest cursor first.
pub fn newest_first(kind: EntityKind) -> &'static str {
  match kind {
    EntityKind::BasicInfo => "updated_at DESC",
    EntityKind::DailyPrice => "trade_date DESC",
    EntityKind::FinancialMetric => "report_date DESC",
    EntityKind::InsiderTrade => "change_date DESC, holder_name ASC",
    EntityKind::NewsItem => "published_at DESC, title ASC",
    EntityKind::ValuationSnapshot => "snapshot_date DESC",
  }
}

/// The column compared against the retention cutoff, for rolling kinds only.
pub fn retention_column(kind: EntityKind) -> Option<&'static str> {
  match kind {
    EntityKind::NewsItem => Some("published_at"),
    EntityKind::ValuationSnapshot => Some("updated_at"),
    _ => None,
  }
}

/// `INSERT OR REPLACE` a row; the primary key makes this a merge.
pub fn insert_row(conn: &rusqlite::Connection, row: &Row) -> rusqlite::Result<()> {
  match row {
    Row::BasicInfo(r) => conn.execute(
      "INSERT OR REPLACE INTO basic_info
         (symbol, name, industry, area, market, listing_date, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        r.symbol.as_str(),
        r.name,
        r.industry,
        r.area,
        r.market,
        r.listing_date,
        encode_dt(r.updated_at),
      ],
    ),
    Row::DailyPrice(r) => conn.execute(
      "INSERT OR REPLACE INTO daily_price
         (symbol, trade_date, open, high, low, close, volume, amount, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
      rusqlite::params![
        r.symbol.as_str(),
        encode_date(r.trade_date),
        r.open,
        r.high,
        r.low,
        r.close,
        r.volume,
        r.amount,
        encode_dt(r.updated_at),
      ],
    ),
    Row::FinancialMetric(r) => conn.execute(
      "INSERT OR REPLACE INTO financial_metric
         (symbol, report_date, roe, net_margin, gross_margin, eps, net_profit, revenue,
          updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
      rusqlite::params![
        r.symbol.as_str(),
        encode_date(r.report_date),
        r.roe,
        r.net_margin,
        r.gross_margin,
        r.eps,
        r.net_profit,
        r.revenue,
        encode_dt(r.updated_at),
      ],
    ),
    Row::InsiderTrade(r) => conn.execute(
      "INSERT OR REPLACE INTO insider_trade
         (symbol, holder_name, change_date, change_type, shares_changed, price, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        r.symbol.as_str(),
        r.holder_name,
        encode_date(r.change_date),
        r.change_type,
        r.shares_changed,
        r.price,
        encode_dt(r.updated_at),
      ],
    ),
    Row::NewsItem(r) => conn.execute(
      "INSERT OR REPLACE INTO news_item
         (symbol, title, published_at, source, url, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      rusqlite::params![
        r.symbol.as_str(),
        r.title,
        encode_dt(r.published_at),
        r.source,
        r.url,
        encode_dt(r.updated_at),
      ],
    ),
    Row::ValuationSnapshot(r) => conn.execute(
      "INSERT OR REPLACE INTO valuation_snapshot
         (symbol, snapshot_date, market_cap, total_shares, outstanding_shares, pe_ratio,
          pb_ratio, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      rusqlite::params![
        r.symbol.as_str(),
        encode_date(r.snapshot_date),
        r.market_cap,
        r.total_shares,
        r.outstanding_shares,
        r.pe_ratio,
        r.pb_ratio,
        encode_dt(r.updated_at),
      ],
    ),
  }
  .map(|_| ())
}

// ─── Row decoding ────────────────────────────────────────────────────────────

/// Decode one result row selected with [`columns`].
///
/// Date decoding failures surface as `FromSqlConversionFailure` so they travel
/// through `tokio_rusqlite` like any other column error.
pub fn read_row(
  kind: EntityKind,
  symbol: &Symbol,
  r: &rusqlite::Row<'_>,
) -> rusqlite::Result<Row> {
  let symbol = symbol.clone();
  let row = match kind {
    EntityKind::BasicInfo => Row::BasicInfo(BasicInfo {
      symbol,
      name:         r.get(0)?,
      industry:     r.get(1)?,
      area:         r.get(2)?,
      market:       r.get(3)?,
      listing_date: r.get(4)?,
      updated_at:   dt_column(r, 5)?,
    }),
    EntityKind::DailyPrice => Row::DailyPrice(DailyPrice {
      symbol,
      trade_date: date_column(r, 0)?,
      open:       r.get(1)?,
      high:       r.get(2)?,
      low:        r.get(3)?,
      close:      r.get(4)?,
      volume:     r.get(5)?,
      amount:     r.get(6)?,
      updated_at: dt_column(r, 7)?,
    }),
    EntityKind::FinancialMetric => Row::FinancialMetric(FinancialMetric {
      symbol,
      report_date:  date_column(r, 0)?,
      roe:          r.get(1)?,
      net_margin:   r.get(2)?,
      gross_margin: r.get(3)?,
      eps:          r.get(4)?,
      net_profit:   r.get(5)?,
      revenue:      r.get(6)?,
      updated_at:   dt_column(r, 7)?,
    }),
    EntityKind::InsiderTrade => Row::InsiderTrade(InsiderTrade {
      symbol,
      holder_name:    r.get(0)?,
      change_date:    date_column(r, 1)?,
      change_type:    r.get(2)?,
      shares_changed: r.get(3)?,
      price:          r.get(4)?,
      updated_at:     dt_column(r, 5)?,
    }),
    EntityKind::NewsItem => Row::NewsItem(NewsItem {
      symbol,
      title:        r.get(0)?,
      published_at: dt_column(r, 1)?,
      source:       r.get(2)?,
      url:          r.get(3)?,
      updated_at:   dt_column(r, 4)?,
    }),
    EntityKind::ValuationSnapshot => Row::ValuationSnapshot(ValuationSnapshot {
      symbol,
      snapshot_date:      date_column(r, 0)?,
      market_cap:         r.get(1)?,
      total_shares:       r.get(2)?,
      outstanding_shares: r.get(3)?,
      pe_ratio:           r.get(4)?,
      pb_ratio:           r.get(5)?,
      updated_at:         dt_column(r, 6)?,
    }),
  };
  Ok(row)
}

fn dt_column(r: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
  let raw: String = r.get(idx)?;
  decode_dt(&raw).map_err(|e| conversion_failure(idx, e))
}

fn date_column(r: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
  let raw: String = r.get(idx)?;
  decode_date(&raw).map_err(|e| conversion_failure(idx, e))
}

fn conversion_failure(idx: usize, err: Error) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}
