//! Read-only JSON API over the per-security stores.
//!
//! Exposes an axum [`Router`] backed by any
//! [`stockpile_core::store::StoreRouter`]. Writes only ever happen through a
//! sync run; this surface never creates a store.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", stockpile_api::api_router(directory.clone()))
//! ```

pub mod error;
pub mod rows;
pub mod securities;

use std::sync::Arc;

use axum::{Router, routing::get};
use stockpile_core::store::StoreRouter;

pub use error::ApiError;

/// Build a fully-materialised API router over `stores`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<R>(stores: Arc<R>) -> Router<()>
where
  R: StoreRouter + 'static,
{
  Router::new()
    .route("/securities", get(securities::list::<R>))
    .route("/securities/{symbol}", get(securities::overview::<R>))
    .route("/securities/{symbol}/{kind}", get(rows::recent::<R>))
    .with_state(stores)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chrono::{DateTime, NaiveDate, TimeZone as _, Utc};
  use serde_json::Value;
  use stockpile_core::{
    row::{DailyPrice, Row},
    security::Symbol,
    store::{EntityStore as _, StoreRouter as _},
  };
  use stockpile_store_sqlite::StoreDirectory;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  struct Fixture {
    dir: Arc<StoreDirectory>,
  }

  impl Drop for Fixture {
    fn drop(&mut self) { std::fs::remove_dir_all(self.dir.root()).ok(); }
  }

  fn at() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap() }

  async fn fixture() -> Fixture {
    let root = std::env::temp_dir().join(format!("stockpile-api-{}", Uuid::new_v4()));
    let dir = Arc::new(StoreDirectory::new(root));

    let symbol = Symbol::parse("601318").unwrap();
    let store = dir.open(&symbol).await.unwrap();
    for day in 24..=28 {
      store
        .merge(Row::DailyPrice(DailyPrice {
          symbol:     symbol.clone(),
          trade_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
          open:       45.0,
          high:       46.0,
          low:        44.5,
          close:      45.0 + f64::from(day) / 10.0,
          volume:     1.0e6,
          amount:     4.5e7,
          updated_at: at(),
        }))
        .await
        .unwrap();
    }
    Fixture { dir }
  }

  async fn get(fixture: &Fixture, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = api_router(fixture.dir.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn lists_known_securities() {
    let f = fixture().await;
    let (status, body) = get(&f, "/securities").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(["601318"]));
  }

  #[tokio::test]
  async fn overview_summarises_every_collection() {
    let f = fixture().await;
    let (status, body) = get(&f, "/securities/601318").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "601318");
    assert_eq!(body["exchange"], "shanghai");

    let collections = body["collections"].as_array().unwrap();
    assert_eq!(collections.len(), 6);
    let prices = collections
      .iter()
      .find(|c| c["kind"] == "daily_price")
      .unwrap();
    assert_eq!(prices["count"], 5);
    assert_eq!(prices["latest"]["trade_date"], "2024-06-28");
    assert_eq!(prices["last_written"], "2024-07-01T10:00:00Z");

    let news = collections.iter().find(|c| c["kind"] == "news_item").unwrap();
    assert_eq!(news["count"], 0);
    assert!(news["latest"].is_null());
  }

  #[tokio::test]
  async fn unknown_security_is_404_and_not_created() {
    let f = fixture().await;
    let (status, body) = get(&f, "/securities/000001").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("000001"));
    assert!(!f.dir.contains(&Symbol::parse("000001").unwrap()));
  }

  #[tokio::test]
  async fn rows_are_newest_first_and_limited() {
    let f = fixture().await;
    let (status, body) = get(&f, "/securities/601318/daily_price?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["trade_date"], "2024-06-28");
    assert_eq!(rows[1]["trade_date"], "2024-06-27");
  }

  #[tokio::test]
  async fn bad_kind_and_bad_symbol_are_400() {
    let f = fixture().await;
    let (status, _) = get(&f, "/securities/601318/quotes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(&f, "/securities/60%2A18").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }
}
