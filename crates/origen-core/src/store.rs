//! Store traits for the three core subsystems.
//!
//! Implemented by storage backends (e.g. `origen-store-sqlite`). Higher
//! layers (`origen-api`, the orchestrating service) depend on these
//! abstractions, not on any concrete backend.
//!
//! The three subsystems are independently consistent by design: each
//! mutation here is a single atomic unit, and there is no multi-entity
//! transaction across subsystems. Composition is the caller's problem.

use std::{collections::BTreeMap, future::Future};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  application::{
    Actor, Application, ApplicationStatus, ApproveTerms, LoanTerms,
    NewApplication,
  },
  document::{DocumentRevision, Documentable, NewDocumentRevision},
  history::StatusHistoryEntry,
  trust::{
    NewVerification, TrustRecord, VerificationOutcome, VerifiedField,
  },
};

// ─── Application state machine ───────────────────────────────────────────────

/// Owns application records and the status-history ledger.
///
/// `change_status` is the only sanctioned path to mutate `status`; every
/// other lifecycle method is a thin wrapper that sets auxiliary fields and
/// then goes through it. Each method executes as one atomic unit.
pub trait ApplicationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create an application in `Draft` and write the creation history entry
  /// (`from = None`).
  fn create(
    &self,
    input: NewApplication,
    actor: Actor,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Retrieve an application by id. Returns `None` if not found or
  /// soft-removed.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Application>, Self::Error>> + Send + '_;

  /// List applications, optionally filtered by tenant and/or status.
  /// Soft-removed applications are excluded.
  fn list(
    &self,
    tenant_id: Option<Uuid>,
    status: Option<ApplicationStatus>,
  ) -> impl Future<Output = Result<Vec<Application>, Self::Error>> + Send + '_;

  /// Validate `new_status` against the transition table and apply it,
  /// stamping `status_changed_at/by` and appending a history entry — all
  /// atomically. Fails with `InvalidTransition` otherwise.
  fn change_status(
    &self,
    id: Uuid,
    new_status: ApplicationStatus,
    actor: Actor,
    note: Option<String>,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// `Draft -> Submitted`.
  fn submit(
    &self,
    id: Uuid,
    actor: Actor,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Record an `Approved` decision and transition to `Approved`. Unset
  /// fields of `terms` default to the originally requested values.
  fn approve(
    &self,
    id: Uuid,
    actor: Actor,
    terms: ApproveTerms,
    notes: Option<String>,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Record a `Rejected` decision with `reason` and transition to
  /// `Rejected`.
  fn reject(
    &self,
    id: Uuid,
    actor: Actor,
    reason: String,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Store a counter-offer and record a `CounterOffer` decision. No status
  /// transition: the application stays in its current review state until
  /// the applicant responds.
  fn send_counter_offer(
    &self,
    id: Uuid,
    actor: Actor,
    terms: LoanTerms,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Record the applicant's response to the stored counter-offer.
  ///
  /// Accepted: the offer's terms become the approved terms and the
  /// application transitions to `Approved`. Declined: only the response is
  /// recorded — the caller decides whether to cancel.
  fn respond_to_counter_offer(
    &self,
    id: Uuid,
    accepted: bool,
    actor: Actor,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Assign the application to a staff member. Side-effect field only; no
  /// status transition.
  fn assign_to(
    &self,
    id: Uuid,
    staff_id: Uuid,
    actor: Actor,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Transition to the terminal `Cancelled` status.
  fn cancel(
    &self,
    id: Uuid,
    actor: Actor,
    note: Option<String>,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Record the external ledger reference and transition to the terminal
  /// `Synced` status. Irreversible; financial terms are frozen after this.
  fn mark_synced(
    &self,
    id: Uuid,
    actor: Actor,
    sync_ref: String,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Soft-remove an application. The row is retained for audit; reads and
  /// lists no longer return it.
  fn remove(
    &self,
    id: Uuid,
    actor: Actor,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The full status history for an application, oldest first.
  fn get_history(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<StatusHistoryEntry>, Self::Error>> + Send + '_;
}

// ─── Trust registry ──────────────────────────────────────────────────────────

/// Stores one current record per (applicant, field) pair.
///
/// The lock-check-then-write in `record_verification` is a read-modify-write
/// against a single key; implementations must serialise concurrent attempts
/// for the same field (row-level locking or equivalent).
pub trait TrustStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Upsert the record for (applicant, field) per the trust-locking rules.
  ///
  /// A locked record and a non-official method yield a no-op with
  /// `applied = false` and the record unchanged — never an error.
  fn record_verification(
    &self,
    applicant_id: Uuid,
    input: NewVerification,
  ) -> impl Future<Output = Result<VerificationOutcome, Self::Error>> + Send + '_;

  /// Apply `record_verification` semantics to each entry in order.
  fn record_batch_verifications(
    &self,
    applicant_id: Uuid,
    entries: Vec<NewVerification>,
  ) -> impl Future<Output = Result<Vec<VerificationOutcome>, Self::Error>> + Send + '_;

  /// Mark a field `Rejected` with a reason. The stored value is untouched —
  /// it remains visible pending correction.
  fn reject_field(
    &self,
    applicant_id: Uuid,
    field_name: String,
    reason: String,
    actor: Actor,
  ) -> impl Future<Output = Result<TrustRecord, Self::Error>> + Send + '_;

  /// Capture an applicant-submitted fix: push a correction-history entry,
  /// update the value, set status `Corrected`.
  fn mark_corrected(
    &self,
    applicant_id: Uuid,
    field_name: String,
    new_value: String,
    actor: Actor,
    reason: Option<String>,
  ) -> impl Future<Output = Result<TrustRecord, Self::Error>> + Send + '_;

  /// Retrieve the current record for (applicant, field), if any.
  fn get_record(
    &self,
    applicant_id: Uuid,
    field_name: String,
  ) -> impl Future<Output = Result<Option<TrustRecord>, Self::Error>> + Send + '_;

  /// Snapshot of all verified fields for an applicant — the single source
  /// of truth for downstream scoring and decision logic.
  fn get_verified_fields(
    &self,
    applicant_id: Uuid,
  ) -> impl Future<Output = Result<BTreeMap<String, VerifiedField>, Self::Error>>
  + Send
  + '_;

  fn is_field_verified(
    &self,
    applicant_id: Uuid,
    field_name: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Document chain ──────────────────────────────────────────────────────────

/// Stores revision records per (subject, document type) and maintains the
/// single-active and chain-acyclicity invariants.
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new revision — `Pending`, inactive.
  fn create_revision(
    &self,
    input: NewDocumentRevision,
  ) -> impl Future<Output = Result<DocumentRevision, Self::Error>> + Send + '_;

  fn get_revision(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<DocumentRevision>, Self::Error>> + Send + '_;

  /// Atomically deactivate any active sibling of the same
  /// (documentable, doc_type) — stamping its `valid_to = now` — and activate
  /// the target with `valid_from = valid_from ?? now`, `valid_to = NULL`.
  fn activate(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<DocumentRevision, Self::Error>> + Send + '_;

  /// Clear the active flag and stamp `valid_to = now`.
  fn deactivate(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<DocumentRevision, Self::Error>> + Send + '_;

  /// In one transaction: mark `old` superseded (inactive, `valid_to = now`,
  /// `superseded_by` linked), create `replacement`, and activate it. A crash
  /// between the steps must not be observable.
  ///
  /// Returns `(old, new)` as persisted.
  fn supersede_with(
    &self,
    old_id: Uuid,
    replacement: NewDocumentRevision,
    reason: Option<String>,
  ) -> impl Future<
    Output = Result<(DocumentRevision, DocumentRevision), Self::Error>,
  > + Send
  + '_;

  /// The chain from `start` forward to the newest revision, following
  /// `superseded_by`. Single bulk traversal; errors with
  /// `ChainIntegrityViolation` past the depth cap.
  fn supersession_chain(
    &self,
    start: Uuid,
  ) -> impl Future<Output = Result<Vec<DocumentRevision>, Self::Error>> + Send + '_;

  /// The chain from the oldest ancestor forward to `start`, following the
  /// inverse of `superseded_by`.
  fn reverse_supersession_chain(
    &self,
    start: Uuid,
  ) -> impl Future<Output = Result<Vec<DocumentRevision>, Self::Error>> + Send + '_;

  /// The single active revision for (documentable, doc_type), if any.
  fn active_revision(
    &self,
    documentable: Documentable,
    doc_type: String,
  ) -> impl Future<Output = Result<Option<DocumentRevision>, Self::Error>> + Send + '_;

  /// All revisions attached to a documentable, newest upload first.
  fn revisions_for(
    &self,
    documentable: Documentable,
  ) -> impl Future<Output = Result<Vec<DocumentRevision>, Self::Error>> + Send + '_;

  /// Whether `revision` was the valid one at `instant`
  /// (`valid_from <= instant` and `valid_to` unset or `>= instant`).
  fn is_valid_at(
    &self,
    id: Uuid,
    instant: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
