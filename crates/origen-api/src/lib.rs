//! JSON REST API for Origen.
//!
//! Exposes an axum [`Router`] backed by any store implementing the three
//! `origen_core` store traits. Auth, TLS, and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", origen_api::api_router(store.clone()))
//! ```

pub mod applications;
pub mod documents;
pub mod error;
pub mod trust;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use origen_core::store::{ApplicationStore, DocumentStore, TrustStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ApplicationStore + TrustStore + DocumentStore + 'static,
{
  Router::new()
    // Applications
    .route(
      "/applications",
      get(applications::list::<S>).post(applications::create::<S>),
    )
    .route(
      "/applications/{id}",
      get(applications::get_one::<S>).delete(applications::remove::<S>),
    )
    .route("/applications/{id}/history", get(applications::history::<S>))
    .route("/applications/{id}/submit", post(applications::submit::<S>))
    .route(
      "/applications/{id}/status",
      post(applications::change_status::<S>),
    )
    .route("/applications/{id}/approve", post(applications::approve::<S>))
    .route("/applications/{id}/reject", post(applications::reject::<S>))
    .route(
      "/applications/{id}/counter-offer",
      post(applications::send_counter_offer::<S>),
    )
    .route(
      "/applications/{id}/counter-offer/response",
      post(applications::respond_to_counter_offer::<S>),
    )
    .route("/applications/{id}/assign", post(applications::assign::<S>))
    .route("/applications/{id}/cancel", post(applications::cancel::<S>))
    .route("/applications/{id}/sync", post(applications::mark_synced::<S>))
    // Trust registry
    .route(
      "/applicants/{id}/verifications",
      post(trust::record::<S>),
    )
    .route(
      "/applicants/{id}/verifications/batch",
      post(trust::record_batch::<S>),
    )
    .route(
      "/applicants/{id}/fields/{field}",
      get(trust::get_record::<S>),
    )
    .route(
      "/applicants/{id}/fields/{field}/reject",
      post(trust::reject_field::<S>),
    )
    .route(
      "/applicants/{id}/fields/{field}/correct",
      post(trust::mark_corrected::<S>),
    )
    .route(
      "/applicants/{id}/fields/{field}/verified",
      get(trust::is_verified::<S>),
    )
    .route(
      "/applicants/{id}/verified-fields",
      get(trust::verified_fields::<S>),
    )
    // Documents
    .route(
      "/documents",
      get(documents::list::<S>).post(documents::create::<S>),
    )
    .route("/documents/{id}", get(documents::get_one::<S>))
    .route("/documents/{id}/activate", post(documents::activate::<S>))
    .route("/documents/{id}/deactivate", post(documents::deactivate::<S>))
    .route("/documents/{id}/supersede", post(documents::supersede::<S>))
    .route("/documents/{id}/chain", get(documents::chain::<S>))
    .route(
      "/documents/{id}/chain/reverse",
      get(documents::reverse_chain::<S>),
    )
    .route("/documents/{id}/valid-at", get(documents::valid_at::<S>))
    .with_state(store)
}
