//! Handler for `/securities/{symbol}/{kind}`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/securities/{symbol}/{kind}` | Optional `?limit=N` (default 20, at most 500) |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use stockpile_core::{
  row::Row,
  security::EntityKind,
  store::{EntityStore, StoreRouter},
};

use crate::{error::ApiError, securities::open_existing};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct RecentParams {
  pub limit: Option<usize>,
}

/// `GET /securities/{symbol}/{kind}[?limit=N]`, newest rows first.
pub async fn recent<R>(
  State(stores): State<Arc<R>>,
  Path((symbol, kind)): Path<(String, String)>,
  Query(params): Query<RecentParams>,
) -> Result<Json<Vec<Row>>, ApiError>
where
  R: StoreRouter,
{
  let kind = EntityKind::parse(&kind)?;
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
  let store = open_existing(&*stores, &symbol).await?;

  let rows = store.recent(kind, limit).await.map_err(ApiError::store)?;
  Ok(Json(rows))
}
