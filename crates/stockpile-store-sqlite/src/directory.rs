//! [`StoreDirectory`]: one SQLite file per security under a data directory.

use std::path::{Path, PathBuf};

use stockpile_core::{security::Symbol, store::StoreRouter};

use crate::{Error, Result, SqliteStore};

const FILE_PREFIX: &str = "stock_";
const FILE_SUFFIX: &str = ".db";

/// Routes each symbol to `<root>/stock_<symbol>.db`.
#[derive(Debug, Clone)]
pub struct StoreDirectory {
  root: PathBuf,
}

impl StoreDirectory {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  pub fn path_for(&self, symbol: &Symbol) -> PathBuf {
    self.root.join(format!("{FILE_PREFIX}{symbol}{FILE_SUFFIX}"))
  }
}

impl StoreRouter for StoreDirectory {
  type Store = SqliteStore;
  type Error = Error;

  async fn open(&self, symbol: &Symbol) -> Result<SqliteStore> {
    tokio::fs::create_dir_all(&self.root).await?;
    SqliteStore::open(self.path_for(symbol), symbol.clone()).await
  }

  fn contains(&self, symbol: &Symbol) -> bool { self.path_for(symbol).is_file() }

  fn symbols(&self) -> Result<Vec<Symbol>> {
    let entries = match std::fs::read_dir(&self.root) {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(Error::Io(e)),
    };

    let mut symbols = Vec::new();
    for entry in entries {
      let name = entry?.file_name();
      let Some(name) = name.to_str() else { continue };
      let Some(code) = name
        .strip_prefix(FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
      else {
        continue;
      };
      if let Ok(symbol) = Symbol::parse(code) {
        symbols.push(symbol);
      }
    }
    symbols.sort();
    Ok(symbols)
  }
}
