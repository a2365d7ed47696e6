//! Core types and trait definitions for the stockpile market-data store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; storage backends and provider adapters
//! plug in through the [`store::EntityStore`] and [`fetch::FetchAdapter`]
//! traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod report;
pub mod row;
pub mod security;
pub mod store;

pub use error::{Error, Result};
