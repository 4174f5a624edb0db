//! Error type for `origen-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain-rule failures (invalid transition, not found, chain integrity,
  /// unknown kind). All of them originate in `origen-core`.
  #[error("core error: {0}")]
  Core(#[from] origen_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored column held text this version of the code cannot decode.
  #[error("column decode error: {0}")]
  Decode(String),

  /// Row-lock or unique-constraint conflict — two writers raced on the same
  /// key. Recoverable by retry at the caller's discretion.
  #[error("concurrent modification: {0}")]
  ConcurrentModification(String),
}

impl Error {
  /// Classify a database failure: our own errors smuggled through
  /// [`tokio_rusqlite::Error::Other`] are unwrapped, busy/locked/constraint
  /// conflicts become [`Error::ConcurrentModification`], everything else
  /// stays [`Error::Database`].
  pub(crate) fn from_db(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Other(inner) = e {
      return match inner.downcast::<Error>() {
        Ok(own) => *own,
        Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
      };
    }
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      code,
      _,
    )) = &e
      && matches!(
        code.code,
        rusqlite::ErrorCode::DatabaseBusy
          | rusqlite::ErrorCode::DatabaseLocked
          | rusqlite::ErrorCode::ConstraintViolation
      )
    {
      return Error::ConcurrentModification(e.to_string());
    }
    Error::Database(e)
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    Error::from_db(e)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
