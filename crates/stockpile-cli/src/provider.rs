//! [`HttpProvider`]: the shipped [`FetchAdapter`], reading JSON rows from an
//! HTTP data service.
//!
//! `GET {base_url}/{kind}/{symbol}?mode=<mode>[&since=YYYY-MM-DD]` must answer
//! with a JSON array of objects keyed by provider labels.

use anyhow::Context as _;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use stockpile_core::{
  fetch::{FetchAdapter, FetchBatch, FetchError},
  normalize::{Record, parse_date_value},
  security::{EntityKind, Symbol, SyncMode},
};
use tracing::debug;

use crate::{config::ProviderConfig, labels::relabel};

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpProvider {
  client:   Client,
  base_url: String,
}

impl HttpProvider {
  pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout())
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
  }

  fn url(&self, kind: EntityKind, symbol: &Symbol) -> String {
    format!("{}/{kind}/{symbol}", self.base_url)
  }

  /// `GET /{kind}/{symbol}` and relabel every object in the response.
  async fn get_rows(
    &self,
    kind: EntityKind,
    symbol: &Symbol,
    mode: SyncMode,
    since: Option<NaiveDate>,
  ) -> Result<FetchBatch, FetchError> {
    let mut query = vec![("mode", mode.to_string())];
    if let Some(since) = since {
      query.push(("since", since.format("%Y-%m-%d").to_string()));
    }

    let url = self.url(kind, symbol);
    let resp = self
      .client
      .get(&url)
      .query(&query)
      .send()
      .await
      .map_err(|e| request_error(&url, e))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(status_error(&url, status));
    }

    let body: Vec<Value> = resp
      .json()
      .await
      .map_err(|e| FetchError::permanent(format!("GET {url}: undecodable body: {e}")))?;

    let mut batch = FetchBatch::default();
    for value in body {
      match value {
        Value::Object(raw) => batch.records.push(relabel(kind, raw)),
        _ => batch.dropped += 1,
      }
    }
    debug!(%kind, %symbol, records = batch.records.len(), dropped = batch.dropped, "fetched");
    Ok(batch)
  }
}

impl FetchAdapter for HttpProvider {
  async fn fetch(
    &self,
    kind: EntityKind,
    symbol: &Symbol,
    mode: SyncMode,
    since: Option<NaiveDate>,
  ) -> Result<FetchBatch, FetchError> {
    self.get_rows(kind, symbol, mode, since).await
  }

  /// The newest `report_date` among the provider's financial metrics.
  async fn latest_report_period(&self, symbol: &Symbol) -> Result<Option<NaiveDate>, FetchError> {
    let batch = self
      .get_rows(EntityKind::FinancialMetric, symbol, SyncMode::Incremental, None)
      .await?;
    Ok(latest_report_date(&batch.records))
  }
}

fn latest_report_date(records: &[Record]) -> Option<NaiveDate> {
  records
    .iter()
    .filter_map(|r| r.get("report_date").and_then(parse_date_value))
    .max()
}

/// Throttling and server-side failures may clear up; any other rejection
/// will not.
fn status_error(url: &str, status: StatusCode) -> FetchError {
  let message = format!("GET {url} -> {status}");
  if status == StatusCode::TOO_MANY_REQUESTS
    || status == StatusCode::REQUEST_TIMEOUT
    || status.is_server_error()
  {
    FetchError::transient(message)
  } else {
    FetchError::permanent(message)
  }
}

fn request_error(url: &str, err: reqwest::Error) -> FetchError {
  let message = format!("GET {url}: {err}");
  if err.is_builder() {
    FetchError::permanent(message)
  } else {
    FetchError::transient(message)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use axum::{Json, Router, extract::Query, http::StatusCode as HttpStatus, routing::get};
  use serde_json::json;
  use tokio::net::TcpListener;

  use super::*;

  /// Serve `router` on an ephemeral port and return its base URL.
  async fn upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
  }

  fn provider(base_url: String) -> HttpProvider {
    HttpProvider::new(&ProviderConfig { base_url, timeout_secs: 5 }).unwrap()
  }

  fn symbol() -> Symbol { Symbol::parse("601318").unwrap() }

  #[tokio::test]
  async fn relabels_rows_and_counts_non_objects() {
    let router = Router::new().route(
      "/daily_price/{symbol}",
      get(|| async {
        Json(json!([
          { "日期": "2024-06-28", "收盘": 45.1 },
          "garbage",
          { "日期": "2024-06-27", "收盘": 44.8 },
        ]))
      }),
    );
    let p = provider(upstream(router).await);

    let batch = p
      .fetch(EntityKind::DailyPrice, &symbol(), SyncMode::Full, None)
      .await
      .unwrap();

    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.dropped, 1);
    assert_eq!(batch.records[0]["trade_date"], "2024-06-28");
    assert_eq!(batch.records[0]["close"], 45.1);
  }

  #[tokio::test]
  async fn passes_mode_and_since() {
    let router = Router::new().route(
      "/news_item/{symbol}",
      get(|Query(q): Query<HashMap<String, String>>| async move { Json(json!([q])) }),
    );
    let p = provider(upstream(router).await);

    let since = NaiveDate::from_ymd_opt(2024, 6, 1);
    let batch = p
      .fetch(EntityKind::NewsItem, &symbol(), SyncMode::Incremental, since)
      .await
      .unwrap();

    assert_eq!(batch.records[0]["mode"], "incremental");
    assert_eq!(batch.records[0]["since"], "2024-06-01");
  }

  #[tokio::test]
  async fn classifies_failures() {
    let router = Router::new()
      .route("/news_item/{symbol}", get(|| async { HttpStatus::SERVICE_UNAVAILABLE }))
      .route("/basic_info/{symbol}", get(|| async { "not json" }));
    let p = provider(upstream(router).await);

    let err = p
      .fetch(EntityKind::NewsItem, &symbol(), SyncMode::Full, None)
      .await
      .unwrap_err();
    assert!(err.is_retryable(), "{err}");

    let err = p
      .fetch(EntityKind::InsiderTrade, &symbol(), SyncMode::Full, None)
      .await
      .unwrap_err();
    assert!(!err.is_retryable(), "{err}");

    let err = p
      .fetch(EntityKind::BasicInfo, &symbol(), SyncMode::Full, None)
      .await
      .unwrap_err();
    assert!(!err.is_retryable(), "{err}");
  }

  #[tokio::test]
  async fn unreachable_upstream_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let p = provider(format!("http://{addr}"));

    let err = p
      .fetch(EntityKind::DailyPrice, &symbol(), SyncMode::Full, None)
      .await
      .unwrap_err();
    assert!(err.is_retryable(), "{err}");
  }

  #[tokio::test]
  async fn latest_report_period_is_the_newest_report_date() {
    let router = Router::new().route(
      "/financial_metric/{symbol}",
      get(|| async {
        Json(json!([
          { "报告期": "2023-12-31", "净资产收益率": 10.2 },
          { "报告期": "2024-03-31", "净资产收益率": 3.1 },
          { "净资产收益率": 1.0 },
        ]))
      }),
    );
    let p = provider(upstream(router).await);

    let period = p.latest_report_period(&symbol()).await.unwrap();
    assert_eq!(period, NaiveDate::from_ymd_opt(2024, 3, 31));
  }

  #[test]
  fn numeric_report_dates_count() {
    let records: Vec<Record> = [
      json!({ "report_date": "2023-12-31" }),
      json!({ "report_date": 20240331 }),
      json!({ "report_date": "n/a" }),
    ]
    .into_iter()
    .filter_map(|v| v.as_object().cloned())
    .collect();

    assert_eq!(latest_report_date(&records), NaiveDate::from_ymd_opt(2024, 3, 31));
  }

  #[test]
  fn status_classification() {
    assert!(status_error("u", StatusCode::TOO_MANY_REQUESTS).is_retryable());
    assert!(status_error("u", StatusCode::BAD_GATEWAY).is_retryable());
    assert!(!status_error("u", StatusCode::NOT_FOUND).is_retryable());
    assert!(!status_error("u", StatusCode::BAD_REQUEST).is_retryable());
  }
}
