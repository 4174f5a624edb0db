//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store error by walking its source chain for a domain error.
  ///
  /// The API is generic over the store, so the concrete error type is opaque
  /// here; domain errors surface wherever the backend put them in the chain.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);

    let mut current: Option<&(dyn std::error::Error + 'static)> =
      Some(boxed.as_ref());
    while let Some(err) = current {
      if let Some(core) = err.downcast_ref::<origen_core::Error>() {
        use origen_core::Error::*;
        return match core {
          InvalidTransition { .. } | NoCounterOffer(_)
          | AlreadySuperseded(_) => ApiError::Conflict(core.to_string()),
          ApplicationNotFound(_) | RecordNotFound { .. }
          | RevisionNotFound(_) => ApiError::NotFound(core.to_string()),
          UnknownDocumentableKind(_) => ApiError::BadRequest(core.to_string()),
          ChainIntegrityViolation { .. } | Serialization(_) => {
            ApiError::Store(Box::new(StoreMessage(core.to_string())))
          }
        };
      }
      current = err.source();
    }

    ApiError::Store(boxed)
  }
}

/// Opaque carrier for a store-side error message once classification has
/// consumed the original.
#[derive(Debug, Error)]
#[error("{0}")]
struct StoreMessage(String);

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
