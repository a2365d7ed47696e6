//! [`SqliteStore`], the SQLite implementation of [`EntityStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use stockpile_core::{
  row::Row,
  security::{EntityKind, Symbol},
  store::{EntityStore, StepCounts, StepWrite},
};

use crate::{
  encode::{
    columns, decode_dt, encode_dt, insert_row, newest_first, read_row, retention_column,
    table,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The store of one security, backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  symbol: Symbol,
}

impl SqliteStore {
  /// Open (or create) the store for `symbol` at `path` and run schema
  /// initialisation.
  pub async fn open(path: impl AsRef<Path>, symbol: Symbol) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, symbol };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory(symbol: Symbol) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, symbol };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every row must belong to this store's symbol and, for batches, to
  /// `kind`.
  fn check_rows(&self, kind: Option<EntityKind>, rows: &[Row]) -> Result<()> {
    for row in rows {
      if row.symbol() != &self.symbol {
        return Err(Error::SymbolMismatch {
          expected: self.symbol.clone(),
          found:    row.symbol().clone(),
        });
      }
      if let Some(expected) = kind
        && row.kind() != expected
      {
        return Err(Error::KindMismatch { expected, found: row.kind() });
      }
    }
    Ok(())
  }

  async fn select_rows(&self, kind: EntityKind, limit: usize) -> Result<Vec<Row>> {
    let symbol = self.symbol.clone();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let sql = format!(
      "SELECT {} FROM {} WHERE symbol = ?1 ORDER BY {} LIMIT ?2",
      columns(kind),
      table(kind),
      newest_first(kind),
    );

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![symbol.as_str(), limit], |r| {
            read_row(kind, &symbol, r)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(rows)
  }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = Error;

  fn symbol(&self) -> &Symbol { &self.symbol }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn merge(&self, row: Row) -> Result<()> {
    self.check_rows(None, std::slice::from_ref(&row))?;

    self
      .conn
      .call(move |conn| {
        insert_row(conn, &row)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn merge_batch(&self, kind: EntityKind, rows: Vec<Row>) -> Result<usize> {
    self.check_rows(Some(kind), &rows)?;
    if rows.is_empty() {
      return Ok(0);
    }

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for row in &rows {
          insert_row(&tx, row)?;
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await?;

    Ok(written)
  }

  async fn reload(&self, kind: EntityKind, rows: Vec<Row>) -> Result<(usize, usize)> {
    self.check_rows(Some(kind), &rows)?;
    let symbol = self.symbol.clone();
    let delete = format!("DELETE FROM {} WHERE symbol = ?1", table(kind));

    let counts = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let removed = tx.execute(&delete, rusqlite::params![symbol.as_str()])?;
        for row in &rows {
          insert_row(&tx, row)?;
        }
        tx.commit()?;
        Ok((removed, rows.len()))
      })
      .await?;

    Ok(counts)
  }

  async fn delete_before(&self, kind: EntityKind, cutoff: DateTime<Utc>) -> Result<usize> {
    let Some(column) = retention_column(kind) else {
      return Ok(0);
    };
    let symbol = self.symbol.clone();
    let cutoff_str = encode_dt(cutoff);
    let sql = format!("DELETE FROM {} WHERE symbol = ?1 AND {column} < ?2", table(kind));

    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![symbol.as_str(), cutoff_str])?))
      .await?;

    Ok(removed)
  }

  async fn commit_step(&self, write: StepWrite) -> Result<StepCounts> {
    let StepWrite { kind, rows, wipe, prune_before, synced_at } = write;
    self.check_rows(Some(kind), &rows)?;
    let symbol = self.symbol.clone();
    let table = table(kind);
    let prune = prune_before.zip(retention_column(kind)).map(|(cutoff, column)| {
      (
        format!("DELETE FROM {table} WHERE symbol = ?1 AND {column} < ?2"),
        encode_dt(cutoff),
      )
    });
    let stamp = encode_dt(synced_at);
    let kind_key = kind.to_string();

    let counts = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut counts = StepCounts::default();
        if wipe {
          counts.wiped = tx.execute(
            &format!("DELETE FROM {table} WHERE symbol = ?1"),
            rusqlite::params![symbol.as_str()],
          )?;
        }
        for row in &rows {
          insert_row(&tx, row)?;
        }
        counts.written = rows.len();
        if let Some((sql, cutoff)) = &prune {
          counts.pruned = tx.execute(sql, rusqlite::params![symbol.as_str(), cutoff])?;
        }
        tx.execute(
          "INSERT OR REPLACE INTO sync_state (symbol, kind, synced_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![symbol.as_str(), kind_key, stamp],
        )?;
        tx.commit()?;
        Ok(counts)
      })
      .await?;

    Ok(counts)
  }

  async fn clear(&self, kind: EntityKind) -> Result<usize> {
    let symbol = self.symbol.clone();
    let sql = format!("DELETE FROM {} WHERE symbol = ?1", table(kind));

    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![symbol.as_str()])?))
      .await?;

    Ok(removed)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn latest(&self, kind: EntityKind) -> Result<Option<Row>> {
    Ok(self.select_rows(kind, 1).await?.into_iter().next())
  }

  async fn last_written(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>> {
    let symbol = self.symbol.clone();
    let sql = format!("SELECT MAX(updated_at) FROM {} WHERE symbol = ?1", table(kind));

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![symbol.as_str()], |r| {
              r.get::<_, Option<String>>(0)
            })
            .optional()?
            .flatten(),
        )
      })
      .await?;

    raw.as_deref().map(decode_dt).transpose()
  }

  async fn last_synced(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>> {
    let symbol = self.symbol.clone();
    let kind_key = kind.to_string();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT synced_at FROM sync_state WHERE symbol = ?1 AND kind = ?2",
              rusqlite::params![symbol.as_str(), kind_key],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(decode_dt).transpose()
  }

  async fn recent(&self, kind: EntityKind, limit: usize) -> Result<Vec<Row>> {
    self.select_rows(kind, limit).await
  }

  async fn count(&self, kind: EntityKind) -> Result<usize> {
    let symbol = self.symbol.clone();
    let sql = format!("SELECT COUNT(*) FROM {} WHERE symbol = ?1", table(kind));

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params![symbol.as_str()], |r| r.get(0))?)
      })
      .await?;

    Ok(usize::try_from(n).unwrap_or_default())
  }
}
