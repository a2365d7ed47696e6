//! Application configuration: an optional TOML file layered under
//! `STOCKPILE_*` environment variables.
//!
//! Nested keys use a double underscore, e.g. `STOCKPILE_SYNC__CONCURRENCY=8`
//! or `STOCKPILE_PROVIDER__BASE_URL=http://quotes.internal`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;
use stockpile_sync::SyncConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Directory holding one `stock_<symbol>.db` file per security.
  pub data_dir: PathBuf,
  pub provider: ProviderConfig,
  pub sync:     SyncConfig,
  pub server:   ServerConfig,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      data_dir: PathBuf::from("data/db"),
      provider: ProviderConfig::default(),
      sync:     SyncConfig::default(),
      server:   ServerConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
  pub base_url:     String,
  pub timeout_secs: u64,
}

impl Default for ProviderConfig {
  fn default() -> Self {
    Self { base_url: "http://localhost:8080".to_string(), timeout_secs: 30 }
  }
}

impl ProviderConfig {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self { Self { host: "127.0.0.1".to_string(), port: 5240 } }
}

impl AppConfig {
  /// Load `path` (if it exists) and apply environment overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("STOCKPILE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?;

    settings
      .try_deserialize()
      .context("failed to deserialise configuration")
  }
}
