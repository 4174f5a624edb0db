//! Handlers for `/documents` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/documents` | `?kind&id` required; optional `doc_type`, `active=true` |
//! | `POST` | `/documents` | Body: [`NewRevisionBody`]; returns 201, pending + inactive |
//! | `GET`  | `/documents/:id` | Single revision |
//! | `POST` | `/documents/:id/activate` | Displaces the active sibling |
//! | `POST` | `/documents/:id/deactivate` | Closes the validity window |
//! | `POST` | `/documents/:id/supersede` | Body: replacement + reason |
//! | `GET`  | `/documents/:id/chain` | Forward, oldest to newest |
//! | `GET`  | `/documents/:id/chain/reverse` | From the oldest ancestor |
//! | `GET`  | `/documents/:id/valid-at` | `?at=<rfc3339>`, defaults to now |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use origen_core::{
  document::{
    DocumentRevision, Documentable, DocumentableKind, NewDocumentRevision,
  },
  store::DocumentStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Create ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /documents` and as the replacement in
/// `POST /documents/:id/supersede`.
#[derive(Debug, Deserialize)]
pub struct NewRevisionBody {
  pub kind:       DocumentableKind,
  pub id:         Uuid,
  pub doc_type:   String,
  pub category:   Option<String>,
  pub file_path:  String,
  pub valid_from: Option<DateTime<Utc>>,
}

impl From<NewRevisionBody> for NewDocumentRevision {
  fn from(b: NewRevisionBody) -> Self {
    NewDocumentRevision {
      documentable: Documentable { kind: b.kind, id: b.id },
      doc_type:     b.doc_type,
      category:     b.category,
      file_path:    b.file_path,
      valid_from:   b.valid_from,
    }
  }
}

/// `POST /documents` — returns 201 + the stored revision (pending, inactive).
pub async fn create<S: DocumentStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewRevisionBody>,
) -> Result<impl IntoResponse, ApiError> {
  let revision = store
    .create_revision(NewDocumentRevision::from(body))
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(revision)))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /documents/:id`
pub async fn get_one<S: DocumentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<DocumentRevision>, ApiError> {
  let revision = store
    .get_revision(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("revision {id} not found")))?;
  Ok(Json(revision))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub kind:     DocumentableKind,
  pub id:       Uuid,
  /// Restrict to one document type. Required when `active=true`.
  pub doc_type: Option<String>,
  /// If `true`, return only the single active revision for
  /// (kind, id, doc_type).
  #[serde(default)]
  pub active:   bool,
}

/// `GET /documents?kind=<kind>&id=<id>[&doc_type=...][&active=true]`
pub async fn list<S: DocumentStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<DocumentRevision>>, ApiError> {
  let documentable = Documentable { kind: params.kind, id: params.id };

  if params.active {
    let doc_type = params.doc_type.ok_or_else(|| {
      ApiError::BadRequest("active=true requires doc_type".into())
    })?;
    let active = store
      .active_revision(documentable, doc_type)
      .await
      .map_err(ApiError::from_store)?;
    return Ok(Json(active.into_iter().collect()));
  }

  let mut revisions = store
    .revisions_for(documentable)
    .await
    .map_err(ApiError::from_store)?;
  if let Some(dt) = &params.doc_type {
    revisions.retain(|r| r.doc_type == *dt);
  }
  Ok(Json(revisions))
}

// ─── Activation ──────────────────────────────────────────────────────────────

/// `POST /documents/:id/activate`
pub async fn activate<S: DocumentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<DocumentRevision>, ApiError> {
  let revision = store
    .activate(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(revision))
}

/// `POST /documents/:id/deactivate`
pub async fn deactivate<S: DocumentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<DocumentRevision>, ApiError> {
  let revision = store
    .deactivate(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(revision))
}

// ─── Supersession ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SupersedeBody {
  pub replacement: NewRevisionBody,
  pub reason:      Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SupersedeResponse {
  pub old: DocumentRevision,
  pub new: DocumentRevision,
}

/// `POST /documents/:id/supersede` — one atomic replace-and-activate.
pub async fn supersede<S: DocumentStore>(
  State(store): State<Arc<S>>,
  Path(old_id): Path<Uuid>,
  Json(body): Json<SupersedeBody>,
) -> Result<Json<SupersedeResponse>, ApiError> {
  let (old, new) = store
    .supersede_with(
      old_id,
      NewDocumentRevision::from(body.replacement),
      body.reason,
    )
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(SupersedeResponse { old, new }))
}

/// `GET /documents/:id/chain`
pub async fn chain<S: DocumentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentRevision>>, ApiError> {
  let revisions = store
    .supersession_chain(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(revisions))
}

/// `GET /documents/:id/chain/reverse`
pub async fn reverse_chain<S: DocumentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentRevision>>, ApiError> {
  let revisions = store
    .reverse_supersession_chain(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(revisions))
}

// ─── Validity ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ValidAtParams {
  /// Defaults to now.
  pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ValidAtResponse {
  pub valid: bool,
  pub at:    DateTime<Utc>,
}

/// `GET /documents/:id/valid-at[?at=<rfc3339>]`
pub async fn valid_at<S: DocumentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ValidAtParams>,
) -> Result<Json<ValidAtResponse>, ApiError> {
  let at = params.at.unwrap_or_else(Utc::now);
  let valid = store
    .is_valid_at(id, at)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(ValidAtResponse { valid, at }))
}
