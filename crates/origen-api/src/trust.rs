//! Handlers for `/applicants/:id` trust-registry endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/applicants/:id/verifications` | Body: [`VerificationBody`] |
//! | `POST` | `/applicants/:id/verifications/batch` | Body: `{"entries":[...]}` |
//! | `GET`  | `/applicants/:id/fields/:field` | Current record |
//! | `POST` | `/applicants/:id/fields/:field/reject` | Value stays visible |
//! | `POST` | `/applicants/:id/fields/:field/correct` | Appends to history |
//! | `GET`  | `/applicants/:id/verified-fields` | Snapshot for scoring |

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
};
use origen_core::{
  application::Actor,
  store::TrustStore,
  trust::{
    NewVerification, TrustRecord, VerificationMethod, VerificationOutcome,
    VerifiedField,
  },
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Record verification ─────────────────────────────────────────────────────

/// JSON body accepted by `POST /applicants/:id/verifications`.
#[derive(Debug, Deserialize)]
pub struct VerificationBody {
  pub field_name:  String,
  pub field_value: String,
  pub method:      VerificationMethod,
  pub verified:    bool,
  pub metadata:    Option<serde_json::Value>,
  pub notes:       Option<String>,
}

impl From<VerificationBody> for NewVerification {
  fn from(b: VerificationBody) -> Self {
    NewVerification {
      field_name:  b.field_name,
      field_value: b.field_value,
      method:      b.method,
      verified:    b.verified,
      metadata:    b.metadata,
      notes:       b.notes,
    }
  }
}

/// `POST /applicants/:id/verifications`
///
/// A write blocked by a trust lock is a 200 with `"applied": false`, not an
/// error.
pub async fn record<S: TrustStore>(
  State(store): State<Arc<S>>,
  Path(applicant_id): Path<Uuid>,
  Json(body): Json<VerificationBody>,
) -> Result<Json<VerificationOutcome>, ApiError> {
  let outcome = store
    .record_verification(applicant_id, NewVerification::from(body))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
  pub entries: Vec<VerificationBody>,
}

/// `POST /applicants/:id/verifications/batch` — applied in order, one outcome
/// per entry.
pub async fn record_batch<S: TrustStore>(
  State(store): State<Arc<S>>,
  Path(applicant_id): Path<Uuid>,
  Json(body): Json<BatchBody>,
) -> Result<Json<Vec<VerificationOutcome>>, ApiError> {
  let entries = body
    .entries
    .into_iter()
    .map(NewVerification::from)
    .collect();
  let outcomes = store
    .record_batch_verifications(applicant_id, entries)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(outcomes))
}

// ─── Review actions ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RejectFieldBody {
  pub reason: String,
  pub actor:  Option<Actor>,
}

/// `POST /applicants/:id/fields/:field/reject`
pub async fn reject_field<S: TrustStore>(
  State(store): State<Arc<S>>,
  Path((applicant_id, field_name)): Path<(Uuid, String)>,
  Json(body): Json<RejectFieldBody>,
) -> Result<Json<TrustRecord>, ApiError> {
  let record = store
    .reject_field(
      applicant_id,
      field_name,
      body.reason,
      body.actor.unwrap_or_else(Actor::system),
    )
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct CorrectBody {
  pub new_value: String,
  pub reason:    Option<String>,
  pub actor:     Option<Actor>,
}

/// `POST /applicants/:id/fields/:field/correct`
pub async fn mark_corrected<S: TrustStore>(
  State(store): State<Arc<S>>,
  Path((applicant_id, field_name)): Path<(Uuid, String)>,
  Json(body): Json<CorrectBody>,
) -> Result<Json<TrustRecord>, ApiError> {
  let record = store
    .mark_corrected(
      applicant_id,
      field_name,
      body.new_value,
      body.actor.unwrap_or_else(Actor::system),
      body.reason,
    )
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(record))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /applicants/:id/fields/:field`
pub async fn get_record<S: TrustStore>(
  State(store): State<Arc<S>>,
  Path((applicant_id, field_name)): Path<(Uuid, String)>,
) -> Result<Json<TrustRecord>, ApiError> {
  let record = store
    .get_record(applicant_id, field_name.clone())
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no trust record for applicant {applicant_id}, field {field_name:?}"
      ))
    })?;
  Ok(Json(record))
}

/// `GET /applicants/:id/fields/:field/verified` — bare boolean body.
pub async fn is_verified<S: TrustStore>(
  State(store): State<Arc<S>>,
  Path((applicant_id, field_name)): Path<(Uuid, String)>,
) -> Result<Json<bool>, ApiError> {
  let verified = store
    .is_field_verified(applicant_id, field_name)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(verified))
}

/// `GET /applicants/:id/verified-fields`
pub async fn verified_fields<S: TrustStore>(
  State(store): State<Arc<S>>,
  Path(applicant_id): Path<Uuid>,
) -> Result<Json<BTreeMap<String, VerifiedField>>, ApiError> {
  let fields = store
    .get_verified_fields(applicant_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(fields))
}
