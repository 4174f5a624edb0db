//! Document revisions and the supersession chain.
//!
//! Each uploaded document belongs to an append-only chain of revisions linked
//! by `superseded_by` pointers. At most one revision per (subject, type) is
//! active at any instant, and the chain is reconstructable in either temporal
//! direction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Traversal guard for supersession chains. A chain this deep indicates data
/// corruption (most likely a cycle) and is surfaced as
/// [`crate::Error::ChainIntegrityViolation`] rather than a partial result.
pub const MAX_CHAIN_DEPTH: usize = 64;

// ─── Documentable ────────────────────────────────────────────────────────────

/// The allow-list of entity kinds a document may attach to. Unknown kinds are
/// rejected at the boundary before any write is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentableKind {
  Person,
  Company,
  Application,
}

/// A tagged reference to the entity a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentable {
  pub kind: DocumentableKind,
  pub id:   Uuid,
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
  Pending,
  Approved,
  Rejected,
  Expired,
  Superseded,
}

// ─── DocumentRevision ────────────────────────────────────────────────────────

/// One revision in a document's supersession chain.
///
/// Invariants: at most one active revision per (documentable, doc_type);
/// following `superseded_by` always terminates; an active revision has
/// `valid_to = None`, and `valid_to >= valid_from` whenever set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRevision {
  pub revision_id:   Uuid,
  pub documentable:  Documentable,
  /// Document type within the subject, e.g. `"ine_front"` or
  /// `"proof_of_address"`. Uniqueness of the active revision is scoped to
  /// (documentable, doc_type).
  pub doc_type:      String,
  pub category:      Option<String>,
  /// Opaque blob-store key; storage mechanics live elsewhere.
  pub file_path:     String,
  pub status:        DocumentStatus,
  pub is_active:     bool,
  /// Unset until first activation, which stamps it with the provided value
  /// or the activation time.
  pub valid_from:    Option<DateTime<Utc>>,
  /// `None` = open-ended. Always `None` while active.
  pub valid_to:      Option<DateTime<Utc>>,
  /// The revision that replaced this one, if any.
  pub superseded_by: Option<Uuid>,
  /// Free-text reason recorded at supersession time.
  pub superseded_reason: Option<String>,
  pub uploaded_at:   DateTime<Utc>,
}

impl DocumentRevision {
  /// Whether this revision was the valid one at `instant`. A revision that
  /// has never been activated has no validity window.
  pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
    self.valid_from.is_some_and(|from| from <= instant)
      && self.valid_to.is_none_or(|until| until >= instant)
  }
}

// ─── NewDocumentRevision ─────────────────────────────────────────────────────

/// Input to [`crate::store::DocumentStore::create_revision`]. Revisions start
/// [`DocumentStatus::Pending`] and inactive.
#[derive(Debug, Clone)]
pub struct NewDocumentRevision {
  pub documentable: Documentable,
  pub doc_type:     String,
  pub category:     Option<String>,
  pub file_path:    String,
  /// If unset, activation stamps `valid_from = now`.
  pub valid_from:   Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  fn revision(
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
  ) -> DocumentRevision {
    DocumentRevision {
      revision_id: Uuid::new_v4(),
      documentable: Documentable {
        kind: DocumentableKind::Person,
        id:   Uuid::new_v4(),
      },
      doc_type: "ine_front".into(),
      category: None,
      file_path: "blobs/x".into(),
      status: DocumentStatus::Pending,
      is_active: valid_to.is_none() && valid_from.is_some(),
      valid_from,
      valid_to,
      superseded_by: None,
      superseded_reason: None,
      uploaded_at: Utc::now(),
    }
  }

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
  }

  #[test]
  fn open_window_covers_everything_after_valid_from() {
    let rev = revision(Some(at(2024, 1, 1)), None);
    assert!(rev.is_valid_at(at(2024, 1, 1)));
    assert!(rev.is_valid_at(at(2030, 6, 1)));
    assert!(!rev.is_valid_at(at(2023, 12, 31)));
  }

  #[test]
  fn closed_window_is_inclusive_on_both_ends() {
    let rev = revision(Some(at(2024, 1, 1)), Some(at(2024, 6, 1)));
    assert!(rev.is_valid_at(at(2024, 1, 1)));
    assert!(rev.is_valid_at(at(2024, 6, 1)));
    assert!(!rev.is_valid_at(at(2024, 6, 2)));
  }

  #[test]
  fn never_activated_revision_is_valid_nowhere() {
    let rev = revision(None, None);
    assert!(!rev.is_valid_at(at(2024, 1, 1)));
    assert!(!rev.is_valid_at(Utc::now()));
  }
}
