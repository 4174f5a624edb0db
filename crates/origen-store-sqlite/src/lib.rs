//! SQLite backend for the Origen loan-origination core.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every multi-step mutation (status
//! change, document activation, supersession, trust upsert) runs inside an
//! explicit transaction within a single connection call, so partial
//! application is never observable.

mod application;
mod document;
mod encode;
mod schema;
mod store;
mod trust;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
