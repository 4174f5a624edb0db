//! Application types and the status transition table.
//!
//! An application's `status` only ever changes through
//! [`crate::store::ApplicationStore::change_status`], which consults the
//! static transition table below. Every higher-level action (submit, approve,
//! reject, counter-offer, cancel, sync) is a thin wrapper that sets auxiliary
//! fields and then goes through that single path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// The finite set of states an application can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
  Draft,
  Submitted,
  InReview,
  DocsPending,
  AnalystReview,
  SupervisorReview,
  Approved,
  Rejected,
  Cancelled,
  Synced,
}

impl ApplicationStatus {
  /// The legal next states from `self`. Terminal states map to an empty
  /// slice. This table is the single authority on status transitions; no
  /// runtime mutability is needed or provided.
  pub const fn allowed_transitions(self) -> &'static [ApplicationStatus] {
    use ApplicationStatus::*;
    match self {
      Draft => &[Submitted, Cancelled],
      Submitted => &[InReview, DocsPending, Cancelled],
      InReview => &[DocsPending, AnalystReview, Approved, Rejected, Cancelled],
      DocsPending => &[InReview, Cancelled],
      AnalystReview => {
        &[SupervisorReview, DocsPending, Approved, Rejected, Cancelled]
      }
      SupervisorReview => &[Approved, Rejected, Cancelled],
      Approved => &[Synced, Cancelled],
      Rejected | Cancelled | Synced => &[],
    }
  }

  /// A terminal status has no outgoing transitions.
  pub const fn is_terminal(self) -> bool {
    self.allowed_transitions().is_empty()
  }

  pub fn can_transition(self, to: ApplicationStatus) -> bool {
    self.allowed_transitions().contains(&to)
  }
}

// ─── Actor ───────────────────────────────────────────────────────────────────

/// Who performed an action, for audit attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
  Staff,
  Applicant,
  System,
}

/// An attributed identity stamped on every transition and correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub actor_id: Uuid,
  pub kind:     ActorKind,
}

impl Actor {
  pub fn staff(actor_id: Uuid) -> Self {
    Self { actor_id, kind: ActorKind::Staff }
  }

  pub fn applicant(actor_id: Uuid) -> Self {
    Self { actor_id, kind: ActorKind::Applicant }
  }

  /// The implicit actor for automated transitions.
  pub fn system() -> Self {
    Self { actor_id: Uuid::nil(), kind: ActorKind::System }
  }
}

// ─── Applicant reference ─────────────────────────────────────────────────────

/// The party under evaluation — an individual or a company, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ApplicantRef {
  Person(Uuid),
  Company(Uuid),
}

impl ApplicantRef {
  pub fn id(&self) -> Uuid {
    match self {
      Self::Person(id) | Self::Company(id) => *id,
    }
  }
}

// ─── Financial terms ─────────────────────────────────────────────────────────

/// A set of loan terms. Amounts are integer minor currency units (cents),
/// rates are annual basis points, terms are whole months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
  pub amount_cents: i64,
  pub term_months:  u32,
  pub rate_bps:     u32,
}

impl LoanTerms {
  /// Standard amortised monthly payment, rounded to the nearest cent.
  pub fn monthly_payment_cents(&self) -> i64 {
    if self.term_months == 0 {
      return self.amount_cents;
    }
    let principal = self.amount_cents as f64;
    let monthly_rate = self.rate_bps as f64 / 10_000.0 / 12.0;
    let n = self.term_months as f64;
    if monthly_rate == 0.0 {
      return (principal / n).round() as i64;
    }
    let factor = (1.0 + monthly_rate).powf(n);
    (principal * monthly_rate * factor / (factor - 1.0)).round() as i64
  }

  /// Total amount repaid over the life of the loan.
  pub fn total_cost_cents(&self) -> i64 {
    self.monthly_payment_cents() * i64::from(self.term_months.max(1))
  }
}

/// Per-field overrides accepted by `approve`. Unset fields default to the
/// originally requested values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ApproveTerms {
  pub amount_cents: Option<i64>,
  pub term_months:  Option<u32>,
  pub rate_bps:     Option<u32>,
}

impl ApproveTerms {
  pub fn resolve(self, requested: LoanTerms) -> LoanTerms {
    LoanTerms {
      amount_cents: self.amount_cents.unwrap_or(requested.amount_cents),
      term_months:  self.term_months.unwrap_or(requested.term_months),
      rate_bps:     self.rate_bps.unwrap_or(requested.rate_bps),
    }
  }
}

// ─── Decision / counter-offer ────────────────────────────────────────────────

/// The recorded outcome of review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
  Approved,
  Rejected,
  CounterOffer,
}

/// A structured offer made in place of the requested terms, plus the
/// applicant's response once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOffer {
  pub terms:     LoanTerms,
  /// `true` once the applicant has responded either way.
  pub responded: bool,
  pub accepted:  bool,
}

// ─── Application ─────────────────────────────────────────────────────────────

/// A credit application. Created in [`ApplicationStatus::Draft`]; mutated only
/// through validated transitions; never physically deleted (`deleted_at` is a
/// soft-removal stamp retained for audit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
  pub application_id:    Uuid,
  pub tenant_id:         Uuid,
  pub applicant:         ApplicantRef,
  pub product_id:        Uuid,

  pub requested:         LoanTerms,
  /// Set on approval (or counter-offer acceptance); `None` before.
  pub approved:          Option<LoanTerms>,
  pub monthly_payment_cents: Option<i64>,
  pub total_cost_cents:  Option<i64>,

  pub status:            ApplicationStatus,
  pub decision:          Option<Decision>,
  pub decision_notes:    Option<String>,
  pub rejection_reason:  Option<String>,
  pub counter_offer:     Option<CounterOffer>,
  pub assigned_to:       Option<Uuid>,
  /// External ledger identifier recorded by `mark_synced`.
  pub sync_ref:          Option<String>,

  pub created_at:        DateTime<Utc>,
  pub status_changed_at: DateTime<Utc>,
  pub status_changed_by: Actor,
  pub deleted_at:        Option<DateTime<Utc>>,
}

// ─── NewApplication ──────────────────────────────────────────────────────────

/// Input to [`crate::store::ApplicationStore::create`].
/// Identifiers and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewApplication {
  pub tenant_id:  Uuid,
  pub applicant:  ApplicantRef,
  pub product_id: Uuid,
  pub requested:  LoanTerms,
}
