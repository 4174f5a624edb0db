//! Handlers for `/applications` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/applications` | Optional `?tenant_id`, `?status` filters |
//! | `POST`   | `/applications` | Body: [`NewApplicationBody`]; returns 201 |
//! | `GET`    | `/applications/:id` | Single application |
//! | `DELETE` | `/applications/:id` | Soft removal |
//! | `GET`    | `/applications/:id/history` | Status ledger, oldest first |
//! | `POST`   | `/applications/:id/submit` | `Draft -> Submitted` |
//! | `POST`   | `/applications/:id/status` | Arbitrary validated transition |
//! | `POST`   | `/applications/:id/approve` | Terms default to requested |
//! | `POST`   | `/applications/:id/reject` | Body carries the reason |
//! | `POST`   | `/applications/:id/counter-offer` | Store an offer |
//! | `POST`   | `/applications/:id/counter-offer/response` | Accept/decline |
//! | `POST`   | `/applications/:id/assign` | Set the assignee |
//! | `POST`   | `/applications/:id/cancel` | Terminal cancellation |
//! | `POST`   | `/applications/:id/sync` | Record ledger ref, `-> Synced` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use origen_core::{
  application::{
    Actor, ApplicantRef, Application, ApplicationStatus, ApproveTerms,
    LoanTerms, NewApplication,
  },
  history::StatusHistoryEntry,
  store::ApplicationStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

fn actor_or_system(actor: Option<Actor>) -> Actor {
  actor.unwrap_or_else(Actor::system)
}

// ─── List / get ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub tenant_id: Option<Uuid>,
  pub status:    Option<ApplicationStatus>,
}

/// `GET /applications[?tenant_id=...][&status=...]`
pub async fn list<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Application>>, ApiError> {
  let apps = store
    .list(params.tenant_id, params.status)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(apps))
}

/// `GET /applications/:id`
pub async fn get_one<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .get(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))?;
  Ok(Json(app))
}

/// `GET /applications/:id/history`
pub async fn history<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusHistoryEntry>>, ApiError> {
  let entries = store
    .get_history(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(entries))
}

// ─── Create / remove ─────────────────────────────────────────────────────────

/// JSON body accepted by `POST /applications`.
#[derive(Debug, Deserialize)]
pub struct NewApplicationBody {
  pub tenant_id:  Uuid,
  pub applicant:  ApplicantRef,
  pub product_id: Uuid,
  pub requested:  LoanTerms,
  pub actor:      Option<Actor>,
}

/// `POST /applications` — returns 201 + the stored application in `Draft`.
pub async fn create<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewApplicationBody>,
) -> Result<impl IntoResponse, ApiError> {
  let actor = actor_or_system(body.actor);
  let app = store
    .create(
      NewApplication {
        tenant_id:  body.tenant_id,
        applicant:  body.applicant,
        product_id: body.product_id,
        requested:  body.requested,
      },
      actor,
    )
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(app)))
}

#[derive(Debug, Deserialize)]
pub struct RemoveBody {
  pub actor: Option<Actor>,
}

/// `DELETE /applications/:id` — soft removal; the record stays for audit.
pub async fn remove<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  body: Option<Json<RemoveBody>>,
) -> Result<StatusCode, ApiError> {
  let actor = actor_or_system(body.and_then(|Json(b)| b.actor));
  store
    .remove(id, actor)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Lifecycle actions ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActorBody {
  pub actor: Option<Actor>,
}

/// `POST /applications/:id/submit`
pub async fn submit<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActorBody>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .submit(id, actor_or_system(body.actor))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(app))
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusBody {
  pub status: ApplicationStatus,
  pub actor:  Option<Actor>,
  pub note:   Option<String>,
}

/// `POST /applications/:id/status` — any transition the table allows.
pub async fn change_status<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ChangeStatusBody>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .change_status(id, body.status, actor_or_system(body.actor), body.note)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(app))
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
  #[serde(default)]
  pub terms: ApproveTerms,
  pub notes: Option<String>,
  pub actor: Option<Actor>,
}

/// `POST /applications/:id/approve` — unset term fields default to the
/// requested values.
pub async fn approve<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ApproveBody>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .approve(id, actor_or_system(body.actor), body.terms, body.notes)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(app))
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
  pub reason: String,
  pub actor:  Option<Actor>,
}

/// `POST /applications/:id/reject`
pub async fn reject<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RejectBody>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .reject(id, actor_or_system(body.actor), body.reason)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(app))
}

#[derive(Debug, Deserialize)]
pub struct CounterOfferBody {
  pub terms: LoanTerms,
  pub actor: Option<Actor>,
}

/// `POST /applications/:id/counter-offer` — stores the offer; no transition.
pub async fn send_counter_offer<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CounterOfferBody>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .send_counter_offer(id, actor_or_system(body.actor), body.terms)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(app))
}

#[derive(Debug, Deserialize)]
pub struct CounterResponseBody {
  pub accepted: bool,
  pub actor:    Option<Actor>,
}

/// `POST /applications/:id/counter-offer/response`
pub async fn respond_to_counter_offer<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CounterResponseBody>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .respond_to_counter_offer(id, body.accepted, actor_or_system(body.actor))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(app))
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub staff_id: Uuid,
  pub actor:    Option<Actor>,
}

/// `POST /applications/:id/assign`
pub async fn assign<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AssignBody>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .assign_to(id, body.staff_id, actor_or_system(body.actor))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(app))
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
  pub note:  Option<String>,
  pub actor: Option<Actor>,
}

/// `POST /applications/:id/cancel`
pub async fn cancel<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CancelBody>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .cancel(id, actor_or_system(body.actor), body.note)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(app))
}

#[derive(Debug, Deserialize)]
pub struct SyncBody {
  pub sync_ref: String,
  pub actor:    Option<Actor>,
}

/// `POST /applications/:id/sync` — records the external ledger reference.
pub async fn mark_synced<S: ApplicationStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<SyncBody>,
) -> Result<Json<Application>, ApiError> {
  let app = store
    .mark_synced(id, actor_or_system(body.actor), body.sync_ref)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(app))
}
