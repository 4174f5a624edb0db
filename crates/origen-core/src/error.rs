//! Error types for `origen-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::application::ApplicationStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// The requested status change is not permitted from the current state.
  /// Never silently coerced — the caller always sees the current status and
  /// the allowed set.
  #[error("invalid transition {from:?} -> {to:?} (allowed from {from:?}: {allowed:?})")]
  InvalidTransition {
    from:    ApplicationStatus,
    to:      ApplicationStatus,
    allowed: &'static [ApplicationStatus],
  },

  #[error("application not found: {0}")]
  ApplicationNotFound(Uuid),

  #[error("application {0} has no counter-offer to respond to")]
  NoCounterOffer(Uuid),

  #[error("trust record not found for applicant {applicant_id}, field {field_name:?}")]
  RecordNotFound {
    applicant_id: Uuid,
    field_name:   String,
  },

  #[error("document revision not found: {0}")]
  RevisionNotFound(Uuid),

  #[error("revision {0} is already superseded")]
  AlreadySuperseded(Uuid),

  #[error("unknown documentable kind: {0:?}")]
  UnknownDocumentableKind(String),

  /// Supersession traversal exceeded the depth cap or detected a cycle.
  /// Fatal: surfaced instead of returning a partial chain.
  #[error("supersession chain from {start} violated integrity at depth {depth}")]
  ChainIntegrityViolation { start: Uuid, depth: usize },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
