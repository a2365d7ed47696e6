//! The normalized-row contract between fetch adapters and the merge engine.
//!
//! Adapters hand over [`Record`]s: JSON objects whose keys are already the
//! collection's attribute names (`trade_date`, `roe`, `holder_name`, …).
//! [`Row::from_record`] turns one record into a typed [`Row`].
//!
//! Numeric policy: an absent or non-numeric attribute becomes `0.0` and is
//! counted in [`Mapped::defaulted`]. Missing key attributes are a
//! [`RowMappingError`]; the caller counts the record as skipped.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone as _, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::{
  row::{
    BasicInfo, DailyPrice, FinancialMetric, InsiderTrade, NewsItem, Row,
    ValuationSnapshot,
  },
  security::{EntityKind, Symbol},
};

/// A provider row keyed by attribute names.
pub type Record = serde_json::Map<String, Value>;

/// Holder name used when the provider omits one.
pub const UNKNOWN_HOLDER: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowMappingError {
  #[error("{kind} record is empty")]
  Empty { kind: EntityKind },

  #[error("{kind} record is missing required attribute {field:?}")]
  MissingField {
    kind:  EntityKind,
    field: &'static str,
  },

  #[error("{kind} attribute {field:?} is not a valid date: {value:?}")]
  InvalidDate {
    kind:  EntityKind,
    field: &'static str,
    value: String,
  },
}

/// Everything a mapping needs besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct MapContext<'a> {
  pub symbol: &'a Symbol,
  /// Becomes the row's `updated_at`.
  pub now:    DateTime<Utc>,
  /// Offset of the market calendar; naive provider timestamps are read in it.
  pub offset: FixedOffset,
}

impl MapContext<'_> {
  /// The calendar date of `now` in the market's offset.
  pub fn today(&self) -> NaiveDate { self.now.with_timezone(&self.offset).date_naive() }
}

/// A mapped row plus the number of numeric attributes that fell back to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapped {
  pub row:       Row,
  pub defaulted: usize,
}

impl Row {
  /// Map a provider record into a typed row of `kind`.
  pub fn from_record(
    kind: EntityKind,
    record: &Record,
    ctx: &MapContext<'_>,
  ) -> Result<Mapped, RowMappingError> {
    if record.is_empty() {
      return Err(RowMappingError::Empty { kind });
    }

    let mut f = Fields { kind, record, offset: ctx.offset, defaulted: 0 };
    let symbol = ctx.symbol.clone();
    let updated_at = ctx.now;

    let row = match kind {
      EntityKind::BasicInfo => Row::BasicInfo(BasicInfo {
        symbol,
        name: f.text("name"),
        industry: f.text("industry"),
        area: f.text("area"),
        market: f
          .opt_text("market")
          .unwrap_or_else(|| ctx.symbol.exchange().market_name().to_owned()),
        listing_date: f.text("listing_date"),
        updated_at,
      }),
      EntityKind::DailyPrice => Row::DailyPrice(DailyPrice {
        symbol,
        trade_date: f.date("trade_date")?,
        open: f.number("open"),
        high: f.number("high"),
        low: f.number("low"),
        close: f.number("close"),
        volume: f.number("volume"),
        amount: f.number("amount"),
        updated_at,
      }),
      EntityKind::FinancialMetric => Row::FinancialMetric(FinancialMetric {
        symbol,
        report_date: f.date("report_date")?,
        roe: f.number("roe"),
        net_margin: f.number("net_margin"),
        gross_margin: f.number("gross_margin"),
        eps: f.number("eps"),
        net_profit: f.number("net_profit"),
        revenue: f.number("revenue"),
        updated_at,
      }),
      EntityKind::InsiderTrade => Row::InsiderTrade(InsiderTrade {
        symbol,
        holder_name: f
          .opt_text("holder_name")
          .unwrap_or_else(|| UNKNOWN_HOLDER.to_owned()),
        change_date: f.date("change_date")?,
        change_type: f.text("change_type"),
        shares_changed: f.number("shares_changed"),
        price: f.number("price"),
        updated_at,
      }),
      EntityKind::NewsItem => Row::NewsItem(NewsItem {
        symbol,
        title: f.required_text("title")?,
        published_at: f.datetime("published_at")?,
        source: f.text("source"),
        url: f.text("url"),
        updated_at,
      }),
      EntityKind::ValuationSnapshot => Row::ValuationSnapshot(ValuationSnapshot {
        symbol,
        snapshot_date: ctx.today(),
        market_cap: f.number("market_cap"),
        total_shares: f.number("total_shares"),
        outstanding_shares: f.number("outstanding_shares"),
        pe_ratio: f.number("pe_ratio"),
        pb_ratio: f.number("pb_ratio"),
        updated_at,
      }),
    };

    Ok(Mapped { row, defaulted: f.defaulted })
  }
}

// ─── Attribute access ────────────────────────────────────────────────────────

struct Fields<'a> {
  kind:      EntityKind,
  record:    &'a Record,
  offset:    FixedOffset,
  defaulted: usize,
}

impl Fields<'_> {
  fn number(&mut self, field: &'static str) -> f64 {
    match self.record.get(field).and_then(parse_number) {
      Some(n) => n,
      None => {
        self.defaulted += 1;
        0.0
      }
    }
  }

  fn opt_text(&self, field: &'static str) -> Option<String> {
    match self.record.get(field)? {
      Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    }
  }

  fn text(&self, field: &'static str) -> String { self.opt_text(field).unwrap_or_default() }

  fn required_text(&self, field: &'static str) -> Result<String, RowMappingError> {
    self
      .opt_text(field)
      .ok_or(RowMappingError::MissingField { kind: self.kind, field })
  }

  fn date(&self, field: &'static str) -> Result<NaiveDate, RowMappingError> {
    let raw = self.required_text(field)?;
    parse_date(&raw).ok_or(RowMappingError::InvalidDate {
      kind: self.kind,
      field,
      value: raw,
    })
  }

  fn datetime(&self, field: &'static str) -> Result<DateTime<Utc>, RowMappingError> {
    let raw = self.required_text(field)?;
    parse_datetime(&raw, self.offset).ok_or(RowMappingError::InvalidDate {
      kind: self.kind,
      field,
      value: raw,
    })
  }
}

/// Numbers, or numeric strings with optional thousands separators.
pub fn parse_number(value: &Value) -> Option<f64> {
  let n = match value {
    Value::Number(n) => n.as_f64()?,
    Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
    _ => return None,
  };
  n.is_finite().then_some(n)
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

const DATETIME_FORMATS: [&str; 3] =
  ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Parse a calendar date. Timestamps are accepted and truncated to their date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
  let raw = raw.trim();
  DATE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
    .or_else(|| {
      DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
    })
}

/// A date held as text, or as a bare number such as `20240331`.
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
  match value {
    Value::String(s) => parse_date(s),
    Value::Number(n) => parse_date(&n.to_string()),
    _ => None,
  }
}

/// Parse an instant. Naive timestamps and bare dates are read in `offset`.
pub fn parse_datetime(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }
  let naive = DATETIME_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .or_else(|| {
      DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    })?;
  offset
    .from_local_datetime(&naive)
    .single()
    .map(|dt| dt.with_timezone(&Utc))
}
