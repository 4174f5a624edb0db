//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use origen_core::{
  application::{
    Actor, ApplicantRef, ApplicationStatus, ApproveTerms, Decision, LoanTerms,
    NewApplication,
  },
  document::{
    DocumentStatus, Documentable, DocumentableKind, NewDocumentRevision,
  },
  store::{ApplicationStore, DocumentStore, TrustStore},
  trust::{NewVerification, TrustStatus, VerificationMethod},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn requested_terms() -> LoanTerms {
  LoanTerms { amount_cents: 50_000_00, term_months: 24, rate_bps: 3600 }
}

fn new_application() -> NewApplication {
  NewApplication {
    tenant_id:  Uuid::new_v4(),
    applicant:  ApplicantRef::Person(Uuid::new_v4()),
    product_id: Uuid::new_v4(),
    requested:  requested_terms(),
  }
}

async fn draft(s: &SqliteStore) -> origen_core::application::Application {
  s.create(new_application(), Actor::system()).await.unwrap()
}

/// Drive an application from `Draft` into `InReview`.
async fn in_review(s: &SqliteStore) -> origen_core::application::Application {
  let app = draft(s).await;
  let actor = Actor::staff(Uuid::new_v4());
  s.submit(app.application_id, Actor::applicant(app.applicant.id()))
    .await
    .unwrap();
  s.change_status(app.application_id, ApplicationStatus::InReview, actor, None)
    .await
    .unwrap()
}

// ─── Application lifecycle ───────────────────────────────────────────────────

#[tokio::test]
async fn create_starts_in_draft_with_creation_history() {
  let s = store().await;
  let app = draft(&s).await;

  assert_eq!(app.status, ApplicationStatus::Draft);
  assert!(app.approved.is_none());
  assert!(app.decision.is_none());

  let history = s.get_history(app.application_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert!(history[0].from_status.is_none());
  assert_eq!(history[0].to_status, ApplicationStatus::Draft);
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn submit_moves_draft_to_submitted() {
  let s = store().await;
  let app = draft(&s).await;

  let submitted = s
    .submit(app.application_id, Actor::applicant(app.applicant.id()))
    .await
    .unwrap();
  assert_eq!(submitted.status, ApplicationStatus::Submitted);
  assert!(submitted.status_changed_at >= app.status_changed_at);
}

#[tokio::test]
async fn invalid_transition_is_rejected_and_leaves_application_unchanged() {
  let s = store().await;
  let app = draft(&s).await;

  // Draft -> Approved is not in the table.
  let err = s
    .change_status(
      app.application_id,
      ApplicationStatus::Approved,
      Actor::staff(Uuid::new_v4()),
      None,
    )
    .await
    .unwrap_err();
  match err {
    crate::Error::Core(origen_core::Error::InvalidTransition {
      from,
      to,
      allowed,
    }) => {
      assert_eq!(from, ApplicationStatus::Draft);
      assert_eq!(to, ApplicationStatus::Approved);
      assert!(allowed.contains(&ApplicationStatus::Submitted));
    }
    other => panic!("expected InvalidTransition, got {other:?}"),
  }

  let unchanged = s.get(app.application_id).await.unwrap().unwrap();
  assert_eq!(unchanged.status, ApplicationStatus::Draft);
  // No history entry was written for the failed attempt.
  assert_eq!(s.get_history(app.application_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn terminal_states_admit_no_further_transitions() {
  let s = store().await;
  let app = in_review(&s).await;
  let actor = Actor::staff(Uuid::new_v4());

  s.cancel(app.application_id, actor, None).await.unwrap();

  let err = s
    .change_status(app.application_id, ApplicationStatus::InReview, actor, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(origen_core::Error::InvalidTransition { .. })
  ));
}

#[tokio::test]
async fn history_is_appended_per_transition_oldest_first() {
  let s = store().await;
  let app = draft(&s).await;
  let staff = Actor::staff(Uuid::new_v4());

  s.submit(app.application_id, Actor::applicant(app.applicant.id()))
    .await
    .unwrap();
  s.change_status(app.application_id, ApplicationStatus::InReview, staff, None)
    .await
    .unwrap();
  s.change_status(
    app.application_id,
    ApplicationStatus::DocsPending,
    staff,
    Some("missing proof of address".into()),
  )
  .await
  .unwrap();

  let history = s.get_history(app.application_id).await.unwrap();
  let statuses: Vec<_> = history.iter().map(|h| h.to_status).collect();
  assert_eq!(statuses, vec![
    ApplicationStatus::Draft,
    ApplicationStatus::Submitted,
    ApplicationStatus::InReview,
    ApplicationStatus::DocsPending,
  ]);
  assert_eq!(history[3].from_status, Some(ApplicationStatus::InReview));
  assert_eq!(
    history[3].note.as_deref(),
    Some("missing proof of address")
  );
}

#[tokio::test]
async fn approve_defaults_unset_terms_to_requested() {
  let s = store().await;
  let app = in_review(&s).await;

  let approved = s
    .approve(
      app.application_id,
      Actor::staff(Uuid::new_v4()),
      ApproveTerms { amount_cents: Some(40_000_00), ..Default::default() },
      Some("reduced exposure".into()),
    )
    .await
    .unwrap();

  assert_eq!(approved.status, ApplicationStatus::Approved);
  assert_eq!(approved.decision, Some(Decision::Approved));
  let terms = approved.approved.unwrap();
  assert_eq!(terms.amount_cents, 40_000_00);
  assert_eq!(terms.term_months, requested_terms().term_months);
  assert_eq!(terms.rate_bps, requested_terms().rate_bps);
  assert_eq!(
    approved.monthly_payment_cents,
    Some(terms.monthly_payment_cents())
  );
  assert_eq!(approved.total_cost_cents, Some(terms.total_cost_cents()));
}

#[tokio::test]
async fn reject_records_reason_and_transitions() {
  let s = store().await;
  let app = in_review(&s).await;

  let rejected = s
    .reject(
      app.application_id,
      Actor::staff(Uuid::new_v4()),
      "insufficient income".into(),
    )
    .await
    .unwrap();

  assert_eq!(rejected.status, ApplicationStatus::Rejected);
  assert_eq!(rejected.decision, Some(Decision::Rejected));
  assert_eq!(
    rejected.rejection_reason.as_deref(),
    Some("insufficient income")
  );

  let history = s.get_history(app.application_id).await.unwrap();
  assert_eq!(
    history.last().unwrap().note.as_deref(),
    Some("insufficient income")
  );
}

#[tokio::test]
async fn counter_offer_is_stored_without_a_transition() {
  let s = store().await;
  let app = in_review(&s).await;
  let offer = LoanTerms { amount_cents: 30_000_00, term_months: 36, rate_bps: 4200 };

  let updated = s
    .send_counter_offer(app.application_id, Actor::staff(Uuid::new_v4()), offer)
    .await
    .unwrap();

  assert_eq!(updated.status, ApplicationStatus::InReview);
  assert_eq!(updated.decision, Some(Decision::CounterOffer));
  let stored = updated.counter_offer.unwrap();
  assert_eq!(stored.terms, offer);
  assert!(!stored.responded);
}

#[tokio::test]
async fn accepting_counter_offer_approves_with_offer_terms() {
  let s = store().await;
  let app = in_review(&s).await;
  let offer = LoanTerms { amount_cents: 30_000_00, term_months: 36, rate_bps: 4200 };
  let applicant = Actor::applicant(app.applicant.id());

  s.send_counter_offer(app.application_id, Actor::staff(Uuid::new_v4()), offer)
    .await
    .unwrap();
  let accepted = s
    .respond_to_counter_offer(app.application_id, true, applicant)
    .await
    .unwrap();

  assert_eq!(accepted.status, ApplicationStatus::Approved);
  assert_eq!(accepted.approved, Some(offer));
  assert_eq!(
    accepted.monthly_payment_cents,
    Some(offer.monthly_payment_cents())
  );
  let stored = accepted.counter_offer.unwrap();
  assert!(stored.responded);
  assert!(stored.accepted);
}

#[tokio::test]
async fn declining_counter_offer_records_response_only() {
  let s = store().await;
  let app = in_review(&s).await;
  let offer = LoanTerms { amount_cents: 30_000_00, term_months: 36, rate_bps: 4200 };

  s.send_counter_offer(app.application_id, Actor::staff(Uuid::new_v4()), offer)
    .await
    .unwrap();
  let declined = s
    .respond_to_counter_offer(
      app.application_id,
      false,
      Actor::applicant(app.applicant.id()),
    )
    .await
    .unwrap();

  // Still in review; the caller decides what happens next.
  assert_eq!(declined.status, ApplicationStatus::InReview);
  assert!(declined.approved.is_none());
  let stored = declined.counter_offer.unwrap();
  assert!(stored.responded);
  assert!(!stored.accepted);
}

#[tokio::test]
async fn responding_without_an_offer_is_an_error() {
  let s = store().await;
  let app = in_review(&s).await;

  let err = s
    .respond_to_counter_offer(
      app.application_id,
      true,
      Actor::applicant(app.applicant.id()),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(origen_core::Error::NoCounterOffer(_))
  ));
}

#[tokio::test]
async fn mark_synced_records_ledger_ref_and_is_terminal() {
  let s = store().await;
  let app = in_review(&s).await;
  let staff = Actor::staff(Uuid::new_v4());

  s.approve(app.application_id, staff, ApproveTerms::default(), None)
    .await
    .unwrap();
  let synced = s
    .mark_synced(app.application_id, Actor::system(), "LED-2024-0042".into())
    .await
    .unwrap();

  assert_eq!(synced.status, ApplicationStatus::Synced);
  assert_eq!(synced.sync_ref.as_deref(), Some("LED-2024-0042"));
  assert!(synced.status.is_terminal());
}

#[tokio::test]
async fn assign_to_sets_assignee_without_transition() {
  let s = store().await;
  let app = in_review(&s).await;
  let analyst = Uuid::new_v4();

  let assigned = s
    .assign_to(app.application_id, analyst, Actor::staff(Uuid::new_v4()))
    .await
    .unwrap();
  assert_eq!(assigned.assigned_to, Some(analyst));
  assert_eq!(assigned.status, ApplicationStatus::InReview);
}

#[tokio::test]
async fn remove_is_soft_and_hides_the_application() {
  let s = store().await;
  let app = draft(&s).await;

  s.remove(app.application_id, Actor::staff(Uuid::new_v4()))
    .await
    .unwrap();

  assert!(s.get(app.application_id).await.unwrap().is_none());
  let listed = s.list(Some(app.tenant_id), None).await.unwrap();
  assert!(listed.is_empty());

  // Removing again reports not-found, not success.
  let err = s
    .remove(app.application_id, Actor::staff(Uuid::new_v4()))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(origen_core::Error::ApplicationNotFound(_))
  ));
}

#[tokio::test]
async fn list_filters_by_tenant_and_status() {
  let s = store().await;
  let app_a = draft(&s).await;
  let app_b = draft(&s).await;
  s.submit(app_b.application_id, Actor::applicant(app_b.applicant.id()))
    .await
    .unwrap();

  let tenant_a = s.list(Some(app_a.tenant_id), None).await.unwrap();
  assert_eq!(tenant_a.len(), 1);
  assert_eq!(tenant_a[0].application_id, app_a.application_id);

  let submitted = s
    .list(None, Some(ApplicationStatus::Submitted))
    .await
    .unwrap();
  assert_eq!(submitted.len(), 1);
  assert_eq!(submitted[0].application_id, app_b.application_id);
}

// ─── Trust registry ──────────────────────────────────────────────────────────

#[tokio::test]
async fn manual_verification_never_locks() {
  let s = store().await;
  let applicant = Uuid::new_v4();

  let out = s
    .record_verification(
      applicant,
      NewVerification::new(
        "curp",
        "GOMC900101HDFRRL09",
        VerificationMethod::ManualEntry,
        true,
      ),
    )
    .await
    .unwrap();

  assert!(out.applied);
  assert!(out.record.is_verified);
  assert!(!out.record.is_locked);
  assert_eq!(out.record.status, TrustStatus::Verified);
}

#[tokio::test]
async fn automated_verification_locks_the_field() {
  let s = store().await;
  let applicant = Uuid::new_v4();

  let out = s
    .record_verification(
      applicant,
      NewVerification::new(
        "curp",
        "GOMC900101HDFRRL09",
        VerificationMethod::DocumentOcr,
        true,
      ),
    )
    .await
    .unwrap();

  assert!(out.applied);
  assert!(out.record.is_locked);
  assert!(out.record.verified_at.is_some());
}

#[tokio::test]
async fn failed_automated_verification_does_not_lock() {
  let s = store().await;
  let applicant = Uuid::new_v4();

  let out = s
    .record_verification(
      applicant,
      NewVerification::new(
        "curp",
        "GOMC900101HDFRRL09",
        VerificationMethod::DocumentOcr,
        false,
      ),
    )
    .await
    .unwrap();

  assert!(out.applied);
  assert!(!out.record.is_verified);
  assert!(!out.record.is_locked);
  assert_eq!(out.record.status, TrustStatus::Pending);
}

#[tokio::test]
async fn locked_field_silently_ignores_non_official_writes() {
  let s = store().await;
  let applicant = Uuid::new_v4();

  let locked = s
    .record_verification(
      applicant,
      NewVerification::new(
        "curp",
        "GOMC900101HDFRRL09",
        VerificationMethod::DocumentOcr,
        true,
      ),
    )
    .await
    .unwrap();

  // A later manual edit must not take: no error, applied = false, record
  // returned unchanged.
  let blocked = s
    .record_verification(
      applicant,
      NewVerification::new(
        "curp",
        "TYPO0001",
        VerificationMethod::ManualEntry,
        true,
      ),
    )
    .await
    .unwrap();

  assert!(!blocked.applied);
  assert_eq!(blocked.record, locked.record);
  assert_eq!(blocked.record.field_value, "GOMC900101HDFRRL09");
}

#[tokio::test]
async fn official_source_overrides_a_lock() {
  let s = store().await;
  let applicant = Uuid::new_v4();

  s.record_verification(
    applicant,
    NewVerification::new(
      "curp",
      "GOMC900101HDFRRL09",
      VerificationMethod::DocumentOcr,
      true,
    ),
  )
  .await
  .unwrap();

  let out = s
    .record_verification(
      applicant,
      NewVerification::new(
        "curp",
        "GOMC900101HDFRRL08",
        VerificationMethod::NationalIdRegistry,
        true,
      ),
    )
    .await
    .unwrap();

  assert!(out.applied);
  assert_eq!(out.record.field_value, "GOMC900101HDFRRL08");
  assert_eq!(out.record.method, VerificationMethod::NationalIdRegistry);
  assert!(out.record.is_locked);
}

#[tokio::test]
async fn reject_field_keeps_the_stored_value() {
  let s = store().await;
  let applicant = Uuid::new_v4();

  s.record_verification(
    applicant,
    NewVerification::new(
      "monthly_income",
      "2500000",
      VerificationMethod::ManualEntry,
      false,
    ),
  )
  .await
  .unwrap();

  let rejected = s
    .reject_field(
      applicant,
      "monthly_income".into(),
      "does not match payslips".into(),
      Actor::staff(Uuid::new_v4()),
    )
    .await
    .unwrap();

  assert_eq!(rejected.status, TrustStatus::Rejected);
  assert!(!rejected.is_verified);
  // The value stays visible pending correction.
  assert_eq!(rejected.field_value, "2500000");
  assert_eq!(
    rejected.rejection_reason.as_deref(),
    Some("does not match payslips")
  );
}

#[tokio::test]
async fn mark_corrected_appends_to_correction_history() {
  let s = store().await;
  let applicant = Uuid::new_v4();
  let actor = Actor::applicant(applicant);

  s.record_verification(
    applicant,
    NewVerification::new(
      "monthly_income",
      "2500000",
      VerificationMethod::ManualEntry,
      false,
    ),
  )
  .await
  .unwrap();
  s.reject_field(
    applicant,
    "monthly_income".into(),
    "does not match payslips".into(),
    Actor::staff(Uuid::new_v4()),
  )
  .await
  .unwrap();

  let corrected = s
    .mark_corrected(
      applicant,
      "monthly_income".into(),
      "2350000".into(),
      actor,
      Some("updated payslip provided".into()),
    )
    .await
    .unwrap();

  assert_eq!(corrected.status, TrustStatus::Corrected);
  assert_eq!(corrected.field_value, "2350000");
  assert_eq!(corrected.correction_history.len(), 1);
  let entry = &corrected.correction_history[0];
  assert_eq!(entry.old_value, "2500000");
  assert_eq!(entry.new_value, "2350000");
  assert_eq!(entry.actor, actor);

  // A fresh read round-trips the whole record, correction history included.
  let fetched = s
    .get_record(applicant, "monthly_income".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched, corrected);
}

#[tokio::test]
async fn corrections_for_missing_record_fail_with_not_found() {
  let s = store().await;
  let err = s
    .mark_corrected(
      Uuid::new_v4(),
      "curp".into(),
      "X".into(),
      Actor::system(),
      None,
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(origen_core::Error::RecordNotFound { .. })
  ));
}

#[tokio::test]
async fn verified_fields_snapshot_excludes_unverified() {
  let s = store().await;
  let applicant = Uuid::new_v4();

  s.record_batch_verifications(applicant, vec![
    NewVerification::new(
      "curp",
      "GOMC900101HDFRRL09",
      VerificationMethod::NationalIdRegistry,
      true,
    ),
    NewVerification::new(
      "phone",
      "+525512345678",
      VerificationMethod::SmsOtp,
      true,
    ),
    NewVerification::new(
      "monthly_income",
      "2500000",
      VerificationMethod::ManualEntry,
      false,
    ),
  ])
  .await
  .unwrap();

  let fields = s.get_verified_fields(applicant).await.unwrap();
  assert_eq!(fields.len(), 2);
  assert!(fields.contains_key("curp"));
  assert!(fields.contains_key("phone"));
  assert!(!fields.contains_key("monthly_income"));
  assert!(fields["curp"].is_locked);

  assert!(s.is_field_verified(applicant, "phone".into()).await.unwrap());
  assert!(
    !s.is_field_verified(applicant, "monthly_income".into())
      .await
      .unwrap()
  );
  assert!(!s.is_field_verified(applicant, "rfc".into()).await.unwrap());
}

// ─── Document chain ──────────────────────────────────────────────────────────

fn person_doc(person_id: Uuid, doc_type: &str) -> NewDocumentRevision {
  NewDocumentRevision {
    documentable: Documentable { kind: DocumentableKind::Person, id: person_id },
    doc_type:     doc_type.into(),
    category:     Some("identity".into()),
    file_path:    format!("blobs/{}", Uuid::new_v4()),
    valid_from:   None,
  }
}

#[tokio::test]
async fn new_revision_starts_pending_and_inactive() {
  let s = store().await;
  let rev = s
    .create_revision(person_doc(Uuid::new_v4(), "ine_front"))
    .await
    .unwrap();

  assert_eq!(rev.status, DocumentStatus::Pending);
  assert!(!rev.is_active);
  assert!(rev.valid_from.is_none());
  assert!(rev.superseded_by.is_none());
}

#[tokio::test]
async fn activate_stamps_valid_from_and_displaces_the_sibling() {
  let s = store().await;
  let person = Uuid::new_v4();

  let first = s
    .create_revision(person_doc(person, "ine_front"))
    .await
    .unwrap();
  let first = s.activate(first.revision_id).await.unwrap();
  assert!(first.is_active);
  assert!(first.valid_from.is_some());
  assert!(first.valid_to.is_none());

  let second = s
    .create_revision(person_doc(person, "ine_front"))
    .await
    .unwrap();
  let second = s.activate(second.revision_id).await.unwrap();
  assert!(second.is_active);

  // Exactly one active revision per (subject, type).
  let displaced = s.get_revision(first.revision_id).await.unwrap().unwrap();
  assert!(!displaced.is_active);
  assert!(displaced.valid_to.is_some());

  let active = s
    .active_revision(first.documentable, "ine_front".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(active.revision_id, second.revision_id);
}

#[tokio::test]
async fn activation_does_not_cross_document_types() {
  let s = store().await;
  let person = Uuid::new_v4();

  let front = s
    .create_revision(person_doc(person, "ine_front"))
    .await
    .unwrap();
  let back = s
    .create_revision(person_doc(person, "ine_back"))
    .await
    .unwrap();
  s.activate(front.revision_id).await.unwrap();
  s.activate(back.revision_id).await.unwrap();

  let front = s.get_revision(front.revision_id).await.unwrap().unwrap();
  assert!(front.is_active);
}

#[tokio::test]
async fn supersede_links_old_to_new_and_swaps_activity() {
  let s = store().await;
  let person = Uuid::new_v4();

  let old = s
    .create_revision(person_doc(person, "proof_of_address"))
    .await
    .unwrap();
  s.activate(old.revision_id).await.unwrap();

  let (old, new) = s
    .supersede_with(
      old.revision_id,
      person_doc(person, "proof_of_address"),
      Some("expired utility bill".into()),
    )
    .await
    .unwrap();

  assert_eq!(old.status, DocumentStatus::Superseded);
  assert!(!old.is_active);
  assert!(old.valid_to.is_some());
  assert_eq!(old.superseded_by, Some(new.revision_id));
  assert_eq!(old.superseded_reason.as_deref(), Some("expired utility bill"));

  assert!(new.is_active);
  assert!(new.valid_from.is_some());
  assert!(new.valid_to.is_none());
}

#[tokio::test]
async fn superseding_twice_is_an_error() {
  let s = store().await;
  let person = Uuid::new_v4();

  let old = s
    .create_revision(person_doc(person, "proof_of_address"))
    .await
    .unwrap();
  s.activate(old.revision_id).await.unwrap();
  s.supersede_with(
    old.revision_id,
    person_doc(person, "proof_of_address"),
    None,
  )
  .await
  .unwrap();

  let err = s
    .supersede_with(
      old.revision_id,
      person_doc(person, "proof_of_address"),
      None,
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(origen_core::Error::AlreadySuperseded(_))
  ));
}

#[tokio::test]
async fn chains_traverse_in_both_directions() {
  let s = store().await;
  let person = Uuid::new_v4();

  let first = s
    .create_revision(person_doc(person, "ine_front"))
    .await
    .unwrap();
  s.activate(first.revision_id).await.unwrap();
  let (_, second) = s
    .supersede_with(first.revision_id, person_doc(person, "ine_front"), None)
    .await
    .unwrap();
  let (_, third) = s
    .supersede_with(second.revision_id, person_doc(person, "ine_front"), None)
    .await
    .unwrap();

  // Forward from the head: oldest to newest.
  let forward = s.supersession_chain(first.revision_id).await.unwrap();
  let ids: Vec<_> = forward.iter().map(|r| r.revision_id).collect();
  assert_eq!(ids, vec![
    first.revision_id,
    second.revision_id,
    third.revision_id,
  ]);

  // Backward from the tail recovers the same order.
  let backward = s
    .reverse_supersession_chain(third.revision_id)
    .await
    .unwrap();
  let ids: Vec<_> = backward.iter().map(|r| r.revision_id).collect();
  assert_eq!(ids, vec![
    first.revision_id,
    second.revision_id,
    third.revision_id,
  ]);

  // From the middle, each direction sees its own half.
  let from_middle = s.supersession_chain(second.revision_id).await.unwrap();
  assert_eq!(from_middle.len(), 2);
  let to_middle = s
    .reverse_supersession_chain(second.revision_id)
    .await
    .unwrap();
  assert_eq!(to_middle.len(), 2);
}

#[tokio::test]
async fn future_dated_revision_can_still_be_displaced() {
  let s = store().await;
  let person = Uuid::new_v4();

  let future = Utc::now() + Duration::days(30);
  let first = s
    .create_revision(NewDocumentRevision {
      valid_from: Some(future),
      ..person_doc(person, "ine_front")
    })
    .await
    .unwrap();
  let first = s.activate(first.revision_id).await.unwrap();
  assert_eq!(first.valid_from, Some(future));

  // Displacing a window that has not opened yet clamps its close to
  // valid_from instead of failing the window constraint.
  let second = s
    .create_revision(person_doc(person, "ine_front"))
    .await
    .unwrap();
  s.activate(second.revision_id).await.unwrap();

  let displaced = s.get_revision(first.revision_id).await.unwrap().unwrap();
  assert!(!displaced.is_active);
  assert_eq!(displaced.valid_to, displaced.valid_from);

  // Same clamp on the supersession path.
  let third = s
    .create_revision(NewDocumentRevision {
      valid_from: Some(future),
      ..person_doc(person, "ine_front")
    })
    .await
    .unwrap();
  s.activate(third.revision_id).await.unwrap();
  let (old, _) = s
    .supersede_with(third.revision_id, person_doc(person, "ine_front"), None)
    .await
    .unwrap();
  assert_eq!(old.valid_to, old.valid_from);
}

#[tokio::test]
async fn cyclic_chain_surfaces_an_integrity_violation() {
  let s = store().await;
  let person = Uuid::new_v4();

  let first = s
    .create_revision(person_doc(person, "ine_front"))
    .await
    .unwrap();
  s.activate(first.revision_id).await.unwrap();
  let (_, second) = s
    .supersede_with(first.revision_id, person_doc(person, "ine_front"), None)
    .await
    .unwrap();

  // Corrupt the link column directly: second points back at first.
  let first_id = first.revision_id.hyphenated().to_string();
  let second_id = second.revision_id.hyphenated().to_string();
  s.conn
    .call(move |conn| {
      conn.execute(
        "UPDATE document_revisions SET superseded_by = ?2
         WHERE revision_id = ?1",
        rusqlite::params![second_id, first_id],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let err = s
    .supersession_chain(first.revision_id)
    .await
    .unwrap_err();
  match err {
    crate::Error::Core(origen_core::Error::ChainIntegrityViolation {
      start,
      depth,
    }) => {
      assert_eq!(start, first.revision_id);
      assert!(depth > 2);
    }
    other => panic!("expected ChainIntegrityViolation, got {other:?}"),
  }

  // The reverse traversal refuses the cycle too.
  let err = s
    .reverse_supersession_chain(second.revision_id)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(origen_core::Error::ChainIntegrityViolation { .. })
  ));
}

#[tokio::test]
async fn chain_for_missing_revision_is_not_found() {
  let s = store().await;
  let err = s.supersession_chain(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(origen_core::Error::RevisionNotFound(_))
  ));
}

#[tokio::test]
async fn deactivate_closes_the_validity_window() {
  let s = store().await;
  let rev = s
    .create_revision(person_doc(Uuid::new_v4(), "ine_front"))
    .await
    .unwrap();
  s.activate(rev.revision_id).await.unwrap();

  let deactivated = s.deactivate(rev.revision_id).await.unwrap();
  assert!(!deactivated.is_active);
  assert!(deactivated.valid_to.is_some());
}

#[tokio::test]
async fn validity_windows_answer_point_in_time_queries() {
  let s = store().await;
  let person = Uuid::new_v4();

  let rev = s
    .create_revision(person_doc(person, "ine_front"))
    .await
    .unwrap();
  // Never activated: no validity window at all.
  assert!(!s.is_valid_at(rev.revision_id, Utc::now()).await.unwrap());

  s.activate(rev.revision_id).await.unwrap();
  assert!(s.is_valid_at(rev.revision_id, Utc::now()).await.unwrap());
  assert!(
    !s.is_valid_at(rev.revision_id, Utc::now() - Duration::days(1))
      .await
      .unwrap()
  );

  let (old, _) = s
    .supersede_with(rev.revision_id, person_doc(person, "ine_front"), None)
    .await
    .unwrap();
  // The superseded revision stays answerable for instants inside its
  // closed window.
  let inside = old.valid_from.unwrap();
  assert!(s.is_valid_at(old.revision_id, inside).await.unwrap());
  assert!(
    !s.is_valid_at(old.revision_id, Utc::now() + Duration::days(1))
      .await
      .unwrap()
  );
}

#[tokio::test]
async fn revisions_for_lists_every_upload_for_the_subject() {
  let s = store().await;
  let person = Uuid::new_v4();
  let subject =
    Documentable { kind: DocumentableKind::Person, id: person };

  let first = s
    .create_revision(person_doc(person, "ine_front"))
    .await
    .unwrap();
  s.activate(first.revision_id).await.unwrap();
  s.supersede_with(first.revision_id, person_doc(person, "ine_front"), None)
    .await
    .unwrap();
  s.create_revision(person_doc(person, "proof_of_address"))
    .await
    .unwrap();

  let all = s.revisions_for(subject).await.unwrap();
  assert_eq!(all.len(), 3);
}
