//! Field verification and trust-locking types.
//!
//! The trust registry keeps one current record per (applicant, field) pair —
//! deliberately not a bitemporal ledger. Corrections are preserved in a
//! side-channel history on the record itself, so downstream consumers always
//! see exactly one current value per field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::Actor;

// ─── Verification method ─────────────────────────────────────────────────────

/// The channel through which a field value was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
  /// Typed in by a human; never locks a field.
  ManualEntry,
  /// Extracted from an uploaded document by OCR.
  DocumentOcr,
  /// Facial/liveness match against an identity document.
  BiometricKyc,
  /// Phone ownership proven via one-time code.
  SmsOtp,
  /// Credit-bureau pull.
  CreditBureau,
  /// Government national-ID registry lookup (official source).
  NationalIdRegistry,
  /// Tax-authority registry lookup (official source).
  TaxAuthorityRegistry,
}

impl VerificationMethod {
  /// Automated channels lock a field on successful verification;
  /// manual entry never does.
  pub fn is_automated(self) -> bool {
    !matches!(self, Self::ManualEntry)
  }

  /// Official sources are government registries, granted override authority
  /// over locked fields. They outrank every automated document channel.
  pub fn is_official_source(self) -> bool {
    matches!(self, Self::NationalIdRegistry | Self::TaxAuthorityRegistry)
  }
}

// ─── Record status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustStatus {
  Pending,
  Verified,
  Rejected,
  Corrected,
}

// ─── Correction history ──────────────────────────────────────────────────────

/// One applicant- or analyst-submitted fix, appended by `mark_corrected`.
/// Ordinary re-verification does not produce entries here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEntry {
  pub old_value:   String,
  pub new_value:   String,
  pub reason:      Option<String>,
  pub actor:       Actor,
  pub recorded_at: DateTime<Utc>,
}

// ─── TrustRecord ─────────────────────────────────────────────────────────────

/// The single "best known" value for one data field of one applicant.
///
/// If `is_locked` is set, the record may only be overwritten by a
/// re-verification whose method is an official source; any other incoming
/// write is a no-op that returns the record unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustRecord {
  pub record_id:          Uuid,
  pub applicant_id:       Uuid,
  pub field_name:         String,
  /// String-encoded; structured values are JSON-serialised.
  pub field_value:        String,
  pub method:             VerificationMethod,
  pub is_verified:        bool,
  pub is_locked:          bool,
  pub status:             TrustStatus,
  pub rejection_reason:   Option<String>,
  pub correction_history: Vec<CorrectionEntry>,
  /// Raw provider payload, kept verbatim for dispute resolution.
  pub metadata:           Option<serde_json::Value>,
  pub notes:              Option<String>,
  pub verified_at:        Option<DateTime<Utc>>,
  pub updated_at:         DateTime<Utc>,
}

// ─── Inputs / outputs ────────────────────────────────────────────────────────

/// Input to [`crate::store::TrustStore::record_verification`].
#[derive(Debug, Clone)]
pub struct NewVerification {
  pub field_name:  String,
  pub field_value: String,
  pub method:      VerificationMethod,
  pub verified:    bool,
  pub metadata:    Option<serde_json::Value>,
  pub notes:       Option<String>,
}

impl NewVerification {
  pub fn new(
    field_name: impl Into<String>,
    field_value: impl Into<String>,
    method: VerificationMethod,
    verified: bool,
  ) -> Self {
    Self {
      field_name: field_name.into(),
      field_value: field_value.into(),
      method,
      verified,
      metadata: None,
      notes: None,
    }
  }
}

/// The result of a verification write.
///
/// When the write was blocked by a lock, `applied` is `false` and `record`
/// is the pre-existing row, unchanged. A blocked write is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
  pub record:  TrustRecord,
  pub applied: bool,
}

/// One entry of the verified-fields snapshot returned by
/// [`crate::store::TrustStore::get_verified_fields`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedField {
  pub value:       String,
  pub method:      VerificationMethod,
  pub verified_at: Option<DateTime<Utc>>,
  pub is_locked:   bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL: [VerificationMethod; 7] = [
    VerificationMethod::ManualEntry,
    VerificationMethod::DocumentOcr,
    VerificationMethod::BiometricKyc,
    VerificationMethod::SmsOtp,
    VerificationMethod::CreditBureau,
    VerificationMethod::NationalIdRegistry,
    VerificationMethod::TaxAuthorityRegistry,
  ];

  #[test]
  fn only_manual_entry_is_not_automated() {
    for method in ALL {
      assert_eq!(
        method.is_automated(),
        method != VerificationMethod::ManualEntry,
        "{method:?}"
      );
    }
  }

  #[test]
  fn official_sources_are_the_government_registries() {
    let official: Vec<_> =
      ALL.into_iter().filter(|m| m.is_official_source()).collect();
    assert_eq!(official, vec![
      VerificationMethod::NationalIdRegistry,
      VerificationMethod::TaxAuthorityRegistry,
    ]);
  }

  #[test]
  fn official_sources_are_automated() {
    for method in ALL.into_iter().filter(|m| m.is_official_source()) {
      assert!(method.is_automated(), "{method:?}");
    }
  }
}
