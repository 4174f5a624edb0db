//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields (actor,
//! counter-offer, correction history, metadata) are stored as compact JSON.
//! UUIDs are stored as hyphenated lowercase strings. Enum columns hold the
//! serde snake_case tags.

use chrono::{DateTime, Utc};
use origen_core::{
  application::{
    Actor, ApplicantRef, Application, ApplicationStatus, CounterOffer,
    Decision, LoanTerms,
  },
  document::{DocumentRevision, DocumentStatus, Documentable, DocumentableKind},
  history::StatusHistoryEntry,
  trust::{CorrectionEntry, TrustRecord, TrustStatus, VerificationMethod},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String {
  id.hyphenated().to_string()
}

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Ok(Uuid::parse_str(s)?)
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── ApplicationStatus ───────────────────────────────────────────────────────

pub fn encode_application_status(s: ApplicationStatus) -> &'static str {
  match s {
    ApplicationStatus::Draft => "draft",
    ApplicationStatus::Submitted => "submitted",
    ApplicationStatus::InReview => "in_review",
    ApplicationStatus::DocsPending => "docs_pending",
    ApplicationStatus::AnalystReview => "analyst_review",
    ApplicationStatus::SupervisorReview => "supervisor_review",
    ApplicationStatus::Approved => "approved",
    ApplicationStatus::Rejected => "rejected",
    ApplicationStatus::Cancelled => "cancelled",
    ApplicationStatus::Synced => "synced",
  }
}

pub fn decode_application_status(s: &str) -> Result<ApplicationStatus> {
  match s {
    "draft" => Ok(ApplicationStatus::Draft),
    "submitted" => Ok(ApplicationStatus::Submitted),
    "in_review" => Ok(ApplicationStatus::InReview),
    "docs_pending" => Ok(ApplicationStatus::DocsPending),
    "analyst_review" => Ok(ApplicationStatus::AnalystReview),
    "supervisor_review" => Ok(ApplicationStatus::SupervisorReview),
    "approved" => Ok(ApplicationStatus::Approved),
    "rejected" => Ok(ApplicationStatus::Rejected),
    "cancelled" => Ok(ApplicationStatus::Cancelled),
    "synced" => Ok(ApplicationStatus::Synced),
    other => Err(Error::Decode(format!("unknown application status: {other:?}"))),
  }
}

// ─── Decision ────────────────────────────────────────────────────────────────

pub fn encode_decision(d: Decision) -> &'static str {
  match d {
    Decision::Approved => "approved",
    Decision::Rejected => "rejected",
    Decision::CounterOffer => "counter_offer",
  }
}

pub fn decode_decision(s: &str) -> Result<Decision> {
  match s {
    "approved" => Ok(Decision::Approved),
    "rejected" => Ok(Decision::Rejected),
    "counter_offer" => Ok(Decision::CounterOffer),
    other => Err(Error::Decode(format!("unknown decision: {other:?}"))),
  }
}

// ─── ApplicantRef ────────────────────────────────────────────────────────────

pub fn encode_applicant_kind(a: ApplicantRef) -> &'static str {
  match a {
    ApplicantRef::Person(_) => "person",
    ApplicantRef::Company(_) => "company",
  }
}

pub fn decode_applicant_ref(kind: &str, id: &str) -> Result<ApplicantRef> {
  let id = decode_uuid(id)?;
  match kind {
    "person" => Ok(ApplicantRef::Person(id)),
    "company" => Ok(ApplicantRef::Company(id)),
    other => Err(Error::Decode(format!("unknown applicant kind: {other:?}"))),
  }
}

// ─── Actor / CounterOffer (JSON columns) ─────────────────────────────────────

pub fn encode_actor(a: &Actor) -> Result<String> {
  Ok(serde_json::to_string(a)?)
}

pub fn decode_actor(s: &str) -> Result<Actor> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_counter_offer(c: &CounterOffer) -> Result<String> {
  Ok(serde_json::to_string(c)?)
}

pub fn decode_counter_offer(s: &str) -> Result<CounterOffer> {
  Ok(serde_json::from_str(s)?)
}

// ─── VerificationMethod / TrustStatus ────────────────────────────────────────

pub fn encode_method(m: VerificationMethod) -> &'static str {
  match m {
    VerificationMethod::ManualEntry => "manual_entry",
    VerificationMethod::DocumentOcr => "document_ocr",
    VerificationMethod::BiometricKyc => "biometric_kyc",
    VerificationMethod::SmsOtp => "sms_otp",
    VerificationMethod::CreditBureau => "credit_bureau",
    VerificationMethod::NationalIdRegistry => "national_id_registry",
    VerificationMethod::TaxAuthorityRegistry => "tax_authority_registry",
  }
}

pub fn decode_method(s: &str) -> Result<VerificationMethod> {
  match s {
    "manual_entry" => Ok(VerificationMethod::ManualEntry),
    "document_ocr" => Ok(VerificationMethod::DocumentOcr),
    "biometric_kyc" => Ok(VerificationMethod::BiometricKyc),
    "sms_otp" => Ok(VerificationMethod::SmsOtp),
    "credit_bureau" => Ok(VerificationMethod::CreditBureau),
    "national_id_registry" => Ok(VerificationMethod::NationalIdRegistry),
    "tax_authority_registry" => Ok(VerificationMethod::TaxAuthorityRegistry),
    other => {
      Err(Error::Decode(format!("unknown verification method: {other:?}")))
    }
  }
}

pub fn encode_trust_status(s: TrustStatus) -> &'static str {
  match s {
    TrustStatus::Pending => "pending",
    TrustStatus::Verified => "verified",
    TrustStatus::Rejected => "rejected",
    TrustStatus::Corrected => "corrected",
  }
}

pub fn decode_trust_status(s: &str) -> Result<TrustStatus> {
  match s {
    "pending" => Ok(TrustStatus::Pending),
    "verified" => Ok(TrustStatus::Verified),
    "rejected" => Ok(TrustStatus::Rejected),
    "corrected" => Ok(TrustStatus::Corrected),
    other => Err(Error::Decode(format!("unknown trust status: {other:?}"))),
  }
}

// ─── Document enums ──────────────────────────────────────────────────────────

pub fn encode_documentable_kind(k: DocumentableKind) -> &'static str {
  match k {
    DocumentableKind::Person => "person",
    DocumentableKind::Company => "company",
    DocumentableKind::Application => "application",
  }
}

pub fn decode_documentable_kind(s: &str) -> Result<DocumentableKind> {
  match s {
    "person" => Ok(DocumentableKind::Person),
    "company" => Ok(DocumentableKind::Company),
    "application" => Ok(DocumentableKind::Application),
    other => Err(Error::Core(
      origen_core::Error::UnknownDocumentableKind(other.to_owned()),
    )),
  }
}

pub fn encode_document_status(s: DocumentStatus) -> &'static str {
  match s {
    DocumentStatus::Pending => "pending",
    DocumentStatus::Approved => "approved",
    DocumentStatus::Rejected => "rejected",
    DocumentStatus::Expired => "expired",
    DocumentStatus::Superseded => "superseded",
  }
}

pub fn decode_document_status(s: &str) -> Result<DocumentStatus> {
  match s {
    "pending" => Ok(DocumentStatus::Pending),
    "approved" => Ok(DocumentStatus::Approved),
    "rejected" => Ok(DocumentStatus::Rejected),
    "expired" => Ok(DocumentStatus::Expired),
    "superseded" => Ok(DocumentStatus::Superseded),
    other => Err(Error::Decode(format!("unknown document status: {other:?}"))),
  }
}

// ─── Correction history ──────────────────────────────────────────────────────

pub fn encode_corrections(entries: &[CorrectionEntry]) -> Result<String> {
  Ok(serde_json::to_string(entries)?)
}

pub fn decode_corrections(s: &str) -> Result<Vec<CorrectionEntry>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `applications` row.
pub struct RawApplication {
  pub application_id:         String,
  pub tenant_id:              String,
  pub applicant_kind:         String,
  pub applicant_id:           String,
  pub product_id:             String,
  pub requested_amount_cents: i64,
  pub requested_term_months:  i64,
  pub requested_rate_bps:     i64,
  pub approved_amount_cents:  Option<i64>,
  pub approved_term_months:   Option<i64>,
  pub approved_rate_bps:      Option<i64>,
  pub monthly_payment_cents:  Option<i64>,
  pub total_cost_cents:       Option<i64>,
  pub status:                 String,
  pub decision:               Option<String>,
  pub decision_notes:         Option<String>,
  pub rejection_reason:       Option<String>,
  pub counter_offer:          Option<String>,
  pub assigned_to:            Option<String>,
  pub sync_ref:               Option<String>,
  pub created_at:             String,
  pub status_changed_at:      String,
  pub status_changed_by:      String,
  pub deleted_at:             Option<String>,
}

impl RawApplication {
  /// Column list matching the field order of [`RawApplication::from_row`].
  pub const COLUMNS: &'static str = "application_id, tenant_id, \
     applicant_kind, applicant_id, product_id, requested_amount_cents, \
     requested_term_months, requested_rate_bps, approved_amount_cents, \
     approved_term_months, approved_rate_bps, monthly_payment_cents, \
     total_cost_cents, status, decision, decision_notes, rejection_reason, \
     counter_offer, assigned_to, sync_ref, created_at, status_changed_at, \
     status_changed_by, deleted_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      application_id:         row.get(0)?,
      tenant_id:              row.get(1)?,
      applicant_kind:         row.get(2)?,
      applicant_id:           row.get(3)?,
      product_id:             row.get(4)?,
      requested_amount_cents: row.get(5)?,
      requested_term_months:  row.get(6)?,
      requested_rate_bps:     row.get(7)?,
      approved_amount_cents:  row.get(8)?,
      approved_term_months:   row.get(9)?,
      approved_rate_bps:      row.get(10)?,
      monthly_payment_cents:  row.get(11)?,
      total_cost_cents:       row.get(12)?,
      status:                 row.get(13)?,
      decision:               row.get(14)?,
      decision_notes:         row.get(15)?,
      rejection_reason:       row.get(16)?,
      counter_offer:          row.get(17)?,
      assigned_to:            row.get(18)?,
      sync_ref:               row.get(19)?,
      created_at:             row.get(20)?,
      status_changed_at:      row.get(21)?,
      status_changed_by:      row.get(22)?,
      deleted_at:             row.get(23)?,
    })
  }

  pub fn into_application(self) -> Result<Application> {
    let approved = match (
      self.approved_amount_cents,
      self.approved_term_months,
      self.approved_rate_bps,
    ) {
      (Some(amount), Some(term), Some(rate)) => Some(LoanTerms {
        amount_cents: amount,
        term_months:  term as u32,
        rate_bps:     rate as u32,
      }),
      _ => None,
    };

    Ok(Application {
      application_id:    decode_uuid(&self.application_id)?,
      tenant_id:         decode_uuid(&self.tenant_id)?,
      applicant:         decode_applicant_ref(
        &self.applicant_kind,
        &self.applicant_id,
      )?,
      product_id:        decode_uuid(&self.product_id)?,
      requested:         LoanTerms {
        amount_cents: self.requested_amount_cents,
        term_months:  self.requested_term_months as u32,
        rate_bps:     self.requested_rate_bps as u32,
      },
      approved,
      monthly_payment_cents: self.monthly_payment_cents,
      total_cost_cents:  self.total_cost_cents,
      status:            decode_application_status(&self.status)?,
      decision:          self
        .decision
        .as_deref()
        .map(decode_decision)
        .transpose()?,
      decision_notes:    self.decision_notes,
      rejection_reason:  self.rejection_reason,
      counter_offer:     self
        .counter_offer
        .as_deref()
        .map(decode_counter_offer)
        .transpose()?,
      assigned_to:       self
        .assigned_to
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      sync_ref:          self.sync_ref,
      created_at:        decode_dt(&self.created_at)?,
      status_changed_at: decode_dt(&self.status_changed_at)?,
      status_changed_by: decode_actor(&self.status_changed_by)?,
      deleted_at:        self
        .deleted_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
    })
  }
}

/// Raw values read from an `application_status_history` row.
pub struct RawHistoryEntry {
  pub history_id:     String,
  pub application_id: String,
  pub from_status:    Option<String>,
  pub to_status:      String,
  pub actor:          String,
  pub note:           Option<String>,
  pub recorded_at:    String,
}

impl RawHistoryEntry {
  pub fn into_entry(self) -> Result<StatusHistoryEntry> {
    Ok(StatusHistoryEntry {
      history_id:     decode_uuid(&self.history_id)?,
      application_id: decode_uuid(&self.application_id)?,
      from_status:    self
        .from_status
        .as_deref()
        .map(decode_application_status)
        .transpose()?,
      to_status:      decode_application_status(&self.to_status)?,
      actor:          decode_actor(&self.actor)?,
      note:           self.note,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw values read from a `trust_records` row.
pub struct RawTrustRecord {
  pub record_id:          String,
  pub applicant_id:       String,
  pub field_name:         String,
  pub field_value:        String,
  pub method:             String,
  pub is_verified:        bool,
  pub is_locked:          bool,
  pub status:             String,
  pub rejection_reason:   Option<String>,
  pub correction_history: String,
  pub metadata:           Option<String>,
  pub notes:              Option<String>,
  pub verified_at:        Option<String>,
  pub updated_at:         String,
}

impl RawTrustRecord {
  pub const COLUMNS: &'static str = "record_id, applicant_id, field_name, \
     field_value, method, is_verified, is_locked, status, rejection_reason, \
     correction_history, metadata, notes, verified_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:          row.get(0)?,
      applicant_id:       row.get(1)?,
      field_name:         row.get(2)?,
      field_value:        row.get(3)?,
      method:             row.get(4)?,
      is_verified:        row.get(5)?,
      is_locked:          row.get(6)?,
      status:             row.get(7)?,
      rejection_reason:   row.get(8)?,
      correction_history: row.get(9)?,
      metadata:           row.get(10)?,
      notes:              row.get(11)?,
      verified_at:        row.get(12)?,
      updated_at:         row.get(13)?,
    })
  }

  pub fn into_record(self) -> Result<TrustRecord> {
    Ok(TrustRecord {
      record_id:          decode_uuid(&self.record_id)?,
      applicant_id:       decode_uuid(&self.applicant_id)?,
      field_name:         self.field_name,
      field_value:        self.field_value,
      method:             decode_method(&self.method)?,
      is_verified:        self.is_verified,
      is_locked:          self.is_locked,
      status:             decode_trust_status(&self.status)?,
      rejection_reason:   self.rejection_reason,
      correction_history: decode_corrections(&self.correction_history)?,
      metadata:           self
        .metadata
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?,
      notes:              self.notes,
      verified_at:        self
        .verified_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `document_revisions` row.
pub struct RawDocumentRevision {
  pub revision_id:       String,
  pub documentable_kind: String,
  pub documentable_id:   String,
  pub doc_type:          String,
  pub category:          Option<String>,
  pub file_path:         String,
  pub status:            String,
  pub is_active:         bool,
  pub valid_from:        Option<String>,
  pub valid_to:          Option<String>,
  pub superseded_by:     Option<String>,
  pub superseded_reason: Option<String>,
  pub uploaded_at:       String,
}

impl RawDocumentRevision {
  pub const COLUMNS: &'static str = "revision_id, documentable_kind, \
     documentable_id, doc_type, category, file_path, status, is_active, \
     valid_from, valid_to, superseded_by, superseded_reason, uploaded_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      revision_id:       row.get(0)?,
      documentable_kind: row.get(1)?,
      documentable_id:   row.get(2)?,
      doc_type:          row.get(3)?,
      category:          row.get(4)?,
      file_path:         row.get(5)?,
      status:            row.get(6)?,
      is_active:         row.get(7)?,
      valid_from:        row.get(8)?,
      valid_to:          row.get(9)?,
      superseded_by:     row.get(10)?,
      superseded_reason: row.get(11)?,
      uploaded_at:       row.get(12)?,
    })
  }

  pub fn into_revision(self) -> Result<DocumentRevision> {
    Ok(DocumentRevision {
      revision_id:       decode_uuid(&self.revision_id)?,
      documentable:      Documentable {
        kind: decode_documentable_kind(&self.documentable_kind)?,
        id:   decode_uuid(&self.documentable_id)?,
      },
      doc_type:          self.doc_type,
      category:          self.category,
      file_path:         self.file_path,
      status:            decode_document_status(&self.status)?,
      is_active:         self.is_active,
      valid_from:        self
        .valid_from
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      valid_to:          self
        .valid_to
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      superseded_by:     self
        .superseded_by
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      superseded_reason: self.superseded_reason,
      uploaded_at:       decode_dt(&self.uploaded_at)?,
    })
  }
}
