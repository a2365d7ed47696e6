//! Error type for `stockpile-store-sqlite`.

use stockpile_core::security::{EntityKind, Symbol};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A row for another security was handed to this store.
  #[error("store for {expected} cannot hold rows of {found}")]
  SymbolMismatch { expected: Symbol, found: Symbol },

  /// A batch for one collection contained a row of another.
  #[error("{expected} batch contains a {found} row")]
  KindMismatch {
    expected: EntityKind,
    found:    EntityKind,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
