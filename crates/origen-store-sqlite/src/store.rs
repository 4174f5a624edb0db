//! [`SqliteStore`] — the SQLite implementation of the three core store
//! traits ([`origen_core::store::ApplicationStore`],
//! [`origen_core::store::TrustStore`],
//! [`origen_core::store::DocumentStore`]).
//!
//! The trait implementations live in the sibling modules `application`,
//! `trust`, and `document`; this module owns the connection and schema
//! bootstrap.

use std::path::Path;

use crate::{Error, Result, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Origen store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All access
/// goes through one connection worker, which also serialises the
/// read-modify-write sections of the trust registry.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
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
}

/// Wrap one of our own errors so it can cross a `conn.call` boundary; the
/// receiving side unwraps it in [`Error::from_db`].
pub(crate) fn domain(e: Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}
