//! Handlers for `/securities` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/securities` | Symbols with a store, sorted |
//! | `GET`  | `/securities/{symbol}` | Per-collection count, last write and latest row; 404 if unknown |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use stockpile_core::{
  row::Row,
  security::{EntityKind, Exchange, Symbol},
  store::{EntityStore, StoreRouter},
};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /securities`
pub async fn list<R>(State(stores): State<Arc<R>>) -> Result<Json<Vec<Symbol>>, ApiError>
where
  R: StoreRouter,
{
  let symbols = stores.symbols().map_err(ApiError::store)?;
  Ok(Json(symbols))
}

// ─── Overview ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CollectionSummary {
  pub kind:         EntityKind,
  pub count:        usize,
  pub last_written: Option<DateTime<Utc>>,
  pub latest:       Option<Row>,
}

#[derive(Debug, Serialize)]
pub struct SecurityOverview {
  pub symbol:      Symbol,
  pub exchange:    Exchange,
  pub collections: Vec<CollectionSummary>,
}

/// `GET /securities/{symbol}`
pub async fn overview<R>(
  State(stores): State<Arc<R>>,
  Path(symbol): Path<String>,
) -> Result<Json<SecurityOverview>, ApiError>
where
  R: StoreRouter,
{
  let store = open_existing(&*stores, &symbol).await?;

  let mut collections = Vec::with_capacity(EntityKind::SYNC_ORDER.len());
  for kind in EntityKind::SYNC_ORDER {
    collections.push(CollectionSummary {
      kind,
      count: store.count(kind).await.map_err(ApiError::store)?,
      last_written: store.last_written(kind).await.map_err(ApiError::store)?,
      latest: store.latest(kind).await.map_err(ApiError::store)?,
    });
  }

  let symbol = store.symbol().clone();
  Ok(Json(SecurityOverview { exchange: symbol.exchange(), symbol, collections }))
}

/// Parse `raw` and open its store, refusing to create one that does not
/// exist yet.
pub(crate) async fn open_existing<R>(stores: &R, raw: &str) -> Result<R::Store, ApiError>
where
  R: StoreRouter,
{
  let symbol = Symbol::parse(raw)?;
  if !stores.contains(&symbol) {
    return Err(ApiError::NotFound(format!("security {symbol} not found")));
  }
  stores.open(&symbol).await.map_err(ApiError::store)
}
