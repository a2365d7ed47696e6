//! Error types for `stockpile-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid symbol: {0:?}")]
  InvalidSymbol(String),

  #[error("unknown entity kind: {0:?}")]
  UnknownEntityKind(String),

  #[error("unknown sync mode: {0:?}")]
  UnknownSyncMode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
