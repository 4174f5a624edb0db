//! The status-history ledger.
//!
//! Every transition appends exactly one entry; entries are never updated or
//! deleted. The ledger is the audit source of truth for how an application
//! reached its current status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{Actor, ApplicationStatus};

/// An immutable record of one status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
  pub history_id:     Uuid,
  pub application_id: Uuid,
  /// `None` for the implicit entry written at creation.
  pub from_status:    Option<ApplicationStatus>,
  pub to_status:      ApplicationStatus,
  pub actor:          Actor,
  pub note:           Option<String>,
  pub recorded_at:    DateTime<Utc>,
}
