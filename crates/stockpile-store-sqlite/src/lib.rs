//! SQLite backend for the stockpile market-data store.
//!
//! Each security lives in its own SQLite file. Wraps [`tokio_rusqlite`] so
//! all database access runs on a dedicated thread without blocking the async
//! runtime.

mod directory;
mod encode;
mod schema;
mod store;

pub mod error;

pub use directory::StoreDirectory;
pub use error::{Error, Result};
pub use store::SqliteStore;
