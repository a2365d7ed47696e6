//! Provider label tables.
//!
//! The upstream provider reports columns under its own (mostly Chinese)
//! labels. Each entity kind has a table mapping those labels to the
//! attribute names the sync engine expects. Labels not listed are kept
//! unchanged, so a provider that already speaks attribute names passes
//! straight through.

use stockpile_core::{normalize::Record, security::EntityKind};

/// `(provider label, attribute)`. When several labels map to the same
/// attribute, the first one present wins.
type LabelTable = &'static [(&'static str, &'static str)];

const BASIC_INFO: LabelTable = &[
  ("股票简称", "name"),
  ("行业", "industry"),
  ("地区", "area"),
  ("上市时间", "listing_date"),
];

const DAILY_PRICE: LabelTable = &[
  ("日期", "trade_date"),
  ("开盘", "open"),
  ("最高", "high"),
  ("最低", "low"),
  ("收盘", "close"),
  ("成交量", "volume"),
  ("成交额", "amount"),
];

const FINANCIAL_METRIC: LabelTable = &[
  ("报告期", "report_date"),
  ("报告日期", "report_date"),
  ("发布日期", "report_date"),
  ("净资产收益率", "roe"),
  ("净利率", "net_margin"),
  ("毛利率", "gross_margin"),
  ("每股收益", "eps"),
  ("净利润", "net_profit"),
  ("主营业务收入", "revenue"),
];

const INSIDER_TRADE: LabelTable = &[
  ("董监高姓名", "holder_name"),
  ("股份变动人姓名", "holder_name"),
  ("变动日期", "change_date"),
  ("变动原因", "change_type"),
  ("变动股份数量", "shares_changed"),
  ("成交均价", "price"),
];

const NEWS_ITEM: LabelTable = &[
  ("标题", "title"),
  ("时间", "published_at"),
  ("日期", "published_at"),
  ("发布时间", "published_at"),
  ("文章来源", "source"),
  ("链接", "url"),
];

const VALUATION_SNAPSHOT: LabelTable = &[
  ("总市值", "market_cap"),
  ("总股本", "total_shares"),
  ("流通股", "outstanding_shares"),
  ("流通股本", "outstanding_shares"),
  ("市盈率(动)", "pe_ratio"),
  ("市盈率-动态", "pe_ratio"),
  ("市净率", "pb_ratio"),
];

pub fn table(kind: EntityKind) -> LabelTable {
  match kind {
    EntityKind::BasicInfo => BASIC_INFO,
    EntityKind::DailyPrice => DAILY_PRICE,
    EntityKind::FinancialMetric => FINANCIAL_METRIC,
    EntityKind::InsiderTrade => INSIDER_TRADE,
    EntityKind::NewsItem => NEWS_ITEM,
    EntityKind::ValuationSnapshot => VALUATION_SNAPSHOT,
  }
}

/// Rename the provider labels of one raw row to attribute names.
///
/// Null values never claim an attribute, so a later alias can still fill it.
pub fn relabel(kind: EntityKind, raw: Record) -> Record {
  let table = table(kind);
  let mut out = Record::new();

  for (label, attr) in table {
    if out.contains_key(*attr) {
      continue;
    }
    if let Some(value) = raw.get(*label)
      && !value.is_null()
    {
      out.insert((*attr).to_string(), value.clone());
    }
  }

  for (key, value) in raw {
    if table.iter().any(|(label, _)| *label == key) {
      continue;
    }
    out.entry(key).or_insert(value);
  }
  out
}
