//! [`ApplicationStore`] implementation: the application state machine and its
//! status-history ledger.
//!
//! `change_status` is the single mutation path for `status`. Each operation
//! runs inside one transaction: the current status is read, validated against
//! the transition table, and updated together with the history append — a
//! concurrent writer can never observe a half-applied transition.

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use origen_core::{
  application::{
    Actor, Application, ApplicationStatus, ApproveTerms, CounterOffer,
    Decision, LoanTerms, NewApplication,
  },
  history::StatusHistoryEntry,
  store::ApplicationStore,
};

use crate::{
  Error, Result,
  encode::{
    RawApplication, RawHistoryEntry, decode_application_status,
    encode_actor, encode_application_status, encode_applicant_kind,
    encode_counter_offer, encode_decision, encode_dt, encode_uuid,
  },
  store::{SqliteStore, domain},
};

// ─── In-transaction helpers ──────────────────────────────────────────────────

/// Outcome of a status-mutating transaction. Domain failures roll the
/// transaction back by returning before `commit`.
pub(crate) enum StatusTx {
  NotFound,
  Invalid { from: ApplicationStatus },
  NoCounterOffer,
  Applied(Box<RawApplication>),
}

fn fetch_raw(
  conn: &rusqlite::Connection,
  id_str: &str,
) -> tokio_rusqlite::Result<Option<RawApplication>> {
  let sql = format!(
    "SELECT {} FROM applications
     WHERE application_id = ?1 AND deleted_at IS NULL",
    RawApplication::COLUMNS
  );
  Ok(
    conn
      .query_row(&sql, rusqlite::params![id_str], RawApplication::from_row)
      .optional()?,
  )
}

fn insert_history(
  conn: &rusqlite::Connection,
  application_id: &str,
  from_status: Option<&str>,
  to_status: &str,
  actor_json: &str,
  note: Option<&str>,
  now_str: &str,
) -> tokio_rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO application_status_history
       (history_id, application_id, from_status, to_status, actor, note, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      application_id,
      from_status,
      to_status,
      actor_json,
      note,
      now_str,
    ],
  )?;
  Ok(())
}

/// Update `status` + stamps and append the history entry. Callers must have
/// validated the transition already.
fn apply_status_change(
  conn: &rusqlite::Connection,
  id_str: &str,
  from: ApplicationStatus,
  to: ApplicationStatus,
  actor_json: &str,
  note: Option<&str>,
  now_str: &str,
) -> tokio_rusqlite::Result<()> {
  conn.execute(
    "UPDATE applications
     SET status = ?2, status_changed_at = ?3, status_changed_by = ?4
     WHERE application_id = ?1",
    rusqlite::params![
      id_str,
      encode_application_status(to),
      now_str,
      actor_json,
    ],
  )?;
  insert_history(
    conn,
    id_str,
    Some(encode_application_status(from)),
    encode_application_status(to),
    actor_json,
    note,
    now_str,
  )
}

fn finish(
  id: Uuid,
  to: ApplicationStatus,
  out: StatusTx,
) -> Result<Application> {
  match out {
    StatusTx::Applied(raw) => raw.into_application(),
    StatusTx::NotFound => {
      Err(origen_core::Error::ApplicationNotFound(id).into())
    }
    StatusTx::Invalid { from } => Err(
      origen_core::Error::InvalidTransition {
        from,
        to,
        allowed: from.allowed_transitions(),
      }
      .into(),
    ),
    StatusTx::NoCounterOffer => {
      Err(origen_core::Error::NoCounterOffer(id).into())
    }
  }
}

// ─── ApplicationStore impl ───────────────────────────────────────────────────

impl ApplicationStore for SqliteStore {
  type Error = Error;

  async fn create(
    &self,
    input: NewApplication,
    actor: Actor,
  ) -> Result<Application> {
    let now = Utc::now();
    let app = Application {
      application_id:    Uuid::new_v4(),
      tenant_id:         input.tenant_id,
      applicant:         input.applicant,
      product_id:        input.product_id,
      requested:         input.requested,
      approved:          None,
      monthly_payment_cents: None,
      total_cost_cents:  None,
      status:            ApplicationStatus::Draft,
      decision:          None,
      decision_notes:    None,
      rejection_reason:  None,
      counter_offer:     None,
      assigned_to:       None,
      sync_ref:          None,
      created_at:        now,
      status_changed_at: now,
      status_changed_by: actor,
      deleted_at:        None,
    };

    let id_str      = encode_uuid(app.application_id);
    let tenant_str  = encode_uuid(app.tenant_id);
    let kind_str    = encode_applicant_kind(app.applicant).to_owned();
    let applicant_str = encode_uuid(app.applicant.id());
    let product_str = encode_uuid(app.product_id);
    let requested   = app.requested;
    let actor_json  = encode_actor(&actor)?;
    let now_str     = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO applications
             (application_id, tenant_id, applicant_kind, applicant_id,
              product_id, requested_amount_cents, requested_term_months,
              requested_rate_bps, status, created_at, status_changed_at,
              status_changed_by)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            id_str,
            tenant_str,
            kind_str,
            applicant_str,
            product_str,
            requested.amount_cents,
            requested.term_months,
            requested.rate_bps,
            encode_application_status(ApplicationStatus::Draft),
            now_str,
            now_str,
            actor_json,
          ],
        )?;
        insert_history(
          &tx,
          &id_str,
          None,
          encode_application_status(ApplicationStatus::Draft),
          &actor_json,
          None,
          &now_str,
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(app)
  }

  async fn get(&self, id: Uuid) -> Result<Option<Application>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| fetch_raw(conn, &id_str)).await?;
    raw.map(RawApplication::into_application).transpose()
  }

  async fn list(
    &self,
    tenant_id: Option<Uuid>,
    status: Option<ApplicationStatus>,
  ) -> Result<Vec<Application>> {
    let tenant_str = tenant_id.map(encode_uuid);
    let status_str = status.map(encode_application_status);

    let raws: Vec<RawApplication> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM applications
           WHERE deleted_at IS NULL
             AND (?1 IS NULL OR tenant_id = ?1)
             AND (?2 IS NULL OR status = ?2)
           ORDER BY created_at",
          RawApplication::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![tenant_str.as_deref(), status_str],
            RawApplication::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawApplication::into_application)
      .collect()
  }

  async fn change_status(
    &self,
    id: Uuid,
    new_status: ApplicationStatus,
    actor: Actor,
    note: Option<String>,
  ) -> Result<Application> {
    let id_str = encode_uuid(id);
    let actor_json = encode_actor(&actor)?;

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        let from =
          decode_application_status(&raw.status).map_err(domain)?;
        if !from.can_transition(new_status) {
          return Ok(StatusTx::Invalid { from });
        }
        apply_status_change(
          &tx,
          &id_str,
          from,
          new_status,
          &actor_json,
          note.as_deref(),
          &now_str,
        )?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        tx.commit()?;
        tracing::debug!(
          application = %id_str,
          from = ?from,
          to = ?new_status,
          "status changed"
        );
        Ok(StatusTx::Applied(Box::new(raw)))
      })
      .await?;

    finish(id, new_status, out)
  }

  async fn submit(&self, id: Uuid, actor: Actor) -> Result<Application> {
    self
      .change_status(id, ApplicationStatus::Submitted, actor, None)
      .await
  }

  async fn approve(
    &self,
    id: Uuid,
    actor: Actor,
    terms: ApproveTerms,
    notes: Option<String>,
  ) -> Result<Application> {
    let id_str = encode_uuid(id);
    let actor_json = encode_actor(&actor)?;

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        let from =
          decode_application_status(&raw.status).map_err(domain)?;
        if !from.can_transition(ApplicationStatus::Approved) {
          return Ok(StatusTx::Invalid { from });
        }

        let requested = LoanTerms {
          amount_cents: raw.requested_amount_cents,
          term_months:  raw.requested_term_months as u32,
          rate_bps:     raw.requested_rate_bps as u32,
        };
        let approved = terms.resolve(requested);

        tx.execute(
          "UPDATE applications
           SET approved_amount_cents = ?2, approved_term_months = ?3,
               approved_rate_bps = ?4, monthly_payment_cents = ?5,
               total_cost_cents = ?6, decision = ?7,
               decision_notes = COALESCE(?8, decision_notes)
           WHERE application_id = ?1",
          rusqlite::params![
            id_str,
            approved.amount_cents,
            approved.term_months,
            approved.rate_bps,
            approved.monthly_payment_cents(),
            approved.total_cost_cents(),
            encode_decision(Decision::Approved),
            notes,
          ],
        )?;
        apply_status_change(
          &tx,
          &id_str,
          from,
          ApplicationStatus::Approved,
          &actor_json,
          None,
          &now_str,
        )?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        tx.commit()?;
        Ok(StatusTx::Applied(Box::new(raw)))
      })
      .await?;

    finish(id, ApplicationStatus::Approved, out)
  }

  async fn reject(
    &self,
    id: Uuid,
    actor: Actor,
    reason: String,
  ) -> Result<Application> {
    let id_str = encode_uuid(id);
    let actor_json = encode_actor(&actor)?;

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        let from =
          decode_application_status(&raw.status).map_err(domain)?;
        if !from.can_transition(ApplicationStatus::Rejected) {
          return Ok(StatusTx::Invalid { from });
        }
        tx.execute(
          "UPDATE applications
           SET rejection_reason = ?2, decision = ?3
           WHERE application_id = ?1",
          rusqlite::params![
            id_str,
            reason,
            encode_decision(Decision::Rejected),
          ],
        )?;
        apply_status_change(
          &tx,
          &id_str,
          from,
          ApplicationStatus::Rejected,
          &actor_json,
          Some(&reason),
          &now_str,
        )?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        tx.commit()?;
        Ok(StatusTx::Applied(Box::new(raw)))
      })
      .await?;

    finish(id, ApplicationStatus::Rejected, out)
  }

  async fn send_counter_offer(
    &self,
    id: Uuid,
    actor: Actor,
    terms: LoanTerms,
  ) -> Result<Application> {
    let id_str = encode_uuid(id);
    let offer = CounterOffer { terms, responded: false, accepted: false };
    let offer_json = encode_counter_offer(&offer)?;

    let out = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE applications
           SET counter_offer = ?2, decision = ?3
           WHERE application_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![
            id_str,
            offer_json,
            encode_decision(Decision::CounterOffer),
          ],
        )?;
        if changed == 0 {
          return Ok(StatusTx::NotFound);
        }
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        tx.commit()?;
        Ok(StatusTx::Applied(Box::new(raw)))
      })
      .await?;

    // No status transition: the application stays in its review state until
    // the applicant responds.
    match out {
      StatusTx::Applied(raw) => {
        tracing::debug!(
          application = %id,
          actor = ?actor,
          "counter-offer stored"
        );
        raw.into_application()
      }
      _ => Err(origen_core::Error::ApplicationNotFound(id).into()),
    }
  }

  async fn respond_to_counter_offer(
    &self,
    id: Uuid,
    accepted: bool,
    actor: Actor,
  ) -> Result<Application> {
    let id_str = encode_uuid(id);
    let actor_json = encode_actor(&actor)?;

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        let Some(offer_json) = raw.counter_offer.as_deref() else {
          return Ok(StatusTx::NoCounterOffer);
        };
        let mut offer = crate::encode::decode_counter_offer(offer_json)
          .map_err(domain)?;
        offer.responded = true;
        offer.accepted = accepted;
        let offer_json = encode_counter_offer(&offer).map_err(domain)?;

        if accepted {
          let from =
            decode_application_status(&raw.status).map_err(domain)?;
          if !from.can_transition(ApplicationStatus::Approved) {
            return Ok(StatusTx::Invalid { from });
          }
          let terms = offer.terms;
          tx.execute(
            "UPDATE applications
             SET counter_offer = ?2, approved_amount_cents = ?3,
                 approved_term_months = ?4, approved_rate_bps = ?5,
                 monthly_payment_cents = ?6, total_cost_cents = ?7
             WHERE application_id = ?1",
            rusqlite::params![
              id_str,
              offer_json,
              terms.amount_cents,
              terms.term_months,
              terms.rate_bps,
              terms.monthly_payment_cents(),
              terms.total_cost_cents(),
            ],
          )?;
          apply_status_change(
            &tx,
            &id_str,
            from,
            ApplicationStatus::Approved,
            &actor_json,
            Some("counter-offer accepted"),
            &now_str,
          )?;
        } else {
          // Decline records the response only; the caller decides whether
          // to cancel.
          tx.execute(
            "UPDATE applications SET counter_offer = ?2
             WHERE application_id = ?1",
            rusqlite::params![id_str, offer_json],
          )?;
        }

        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        tx.commit()?;
        Ok(StatusTx::Applied(Box::new(raw)))
      })
      .await?;

    finish(id, ApplicationStatus::Approved, out)
  }

  async fn assign_to(
    &self,
    id: Uuid,
    staff_id: Uuid,
    actor: Actor,
  ) -> Result<Application> {
    let id_str = encode_uuid(id);
    let staff_str = encode_uuid(staff_id);

    let out = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE applications SET assigned_to = ?2
           WHERE application_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, staff_str],
        )?;
        if changed == 0 {
          return Ok(StatusTx::NotFound);
        }
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        tx.commit()?;
        Ok(StatusTx::Applied(Box::new(raw)))
      })
      .await?;

    match out {
      StatusTx::Applied(raw) => {
        tracing::debug!(
          application = %id,
          staff = %staff_id,
          actor = ?actor,
          "application assigned"
        );
        raw.into_application()
      }
      _ => Err(origen_core::Error::ApplicationNotFound(id).into()),
    }
  }

  async fn cancel(
    &self,
    id: Uuid,
    actor: Actor,
    note: Option<String>,
  ) -> Result<Application> {
    self
      .change_status(id, ApplicationStatus::Cancelled, actor, note)
      .await
  }

  async fn mark_synced(
    &self,
    id: Uuid,
    actor: Actor,
    sync_ref: String,
  ) -> Result<Application> {
    let id_str = encode_uuid(id);
    let actor_json = encode_actor(&actor)?;

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        let from =
          decode_application_status(&raw.status).map_err(domain)?;
        if !from.can_transition(ApplicationStatus::Synced) {
          return Ok(StatusTx::Invalid { from });
        }
        tx.execute(
          "UPDATE applications SET sync_ref = ?2 WHERE application_id = ?1",
          rusqlite::params![id_str, sync_ref],
        )?;
        apply_status_change(
          &tx,
          &id_str,
          from,
          ApplicationStatus::Synced,
          &actor_json,
          None,
          &now_str,
        )?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(StatusTx::NotFound);
        };
        tx.commit()?;
        Ok(StatusTx::Applied(Box::new(raw)))
      })
      .await?;

    finish(id, ApplicationStatus::Synced, out)
  }

  async fn remove(&self, id: Uuid, actor: Actor) -> Result<()> {
    let id_str = encode_uuid(id);
    let actor_json = encode_actor(&actor)?;

    let removed = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let changed = conn.execute(
          "UPDATE applications SET deleted_at = ?2
           WHERE application_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, now_str],
        )?;
        if changed > 0 {
          tracing::debug!(
            application = %id_str,
            actor = %actor_json,
            "application soft-removed"
          );
        }
        Ok(changed > 0)
      })
      .await?;

    if removed {
      Ok(())
    } else {
      Err(origen_core::Error::ApplicationNotFound(id).into())
    }
  }

  async fn get_history(&self, id: Uuid) -> Result<Vec<StatusHistoryEntry>> {
    let id_str = encode_uuid(id);

    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT history_id, application_id, from_status, to_status,
                  actor, note, recorded_at
           FROM application_status_history
           WHERE application_id = ?1
           ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawHistoryEntry {
              history_id:     row.get(0)?,
              application_id: row.get(1)?,
              from_status:    row.get(2)?,
              to_status:      row.get(3)?,
              actor:          row.get(4)?,
              note:           row.get(5)?,
              recorded_at:    row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }
}
