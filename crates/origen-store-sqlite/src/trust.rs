//! [`TrustStore`] implementation: the field verification and trust-locking
//! registry.
//!
//! One row per (applicant, field), enforced by a UNIQUE constraint. The
//! lock-check-then-write in `record_verification` is a compare-and-set: the
//! row is read and conditionally upserted inside a single transaction on the
//! store's one connection worker, so two concurrent writers can never both
//! observe the field unlocked.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use origen_core::{
  application::Actor,
  store::TrustStore,
  trust::{
    CorrectionEntry, NewVerification, TrustRecord, VerificationOutcome,
    VerifiedField,
  },
};

use crate::{
  Error, Result,
  encode::{
    RawTrustRecord, decode_corrections, decode_dt, decode_method,
    encode_corrections, encode_dt, encode_method, encode_trust_status,
    encode_uuid,
  },
  store::{SqliteStore, domain},
};

// ─── In-transaction helpers ──────────────────────────────────────────────────

enum TrustTx {
  NotFound,
  /// The field is locked and the incoming method lacks override privilege.
  /// The write was a no-op; the payload is the pre-existing row, unchanged.
  Blocked(Box<RawTrustRecord>),
  Applied(Box<RawTrustRecord>),
}

fn fetch_raw(
  conn: &rusqlite::Connection,
  applicant_str: &str,
  field_name: &str,
) -> tokio_rusqlite::Result<Option<RawTrustRecord>> {
  let sql = format!(
    "SELECT {} FROM trust_records
     WHERE applicant_id = ?1 AND field_name = ?2",
    RawTrustRecord::COLUMNS
  );
  Ok(
    conn
      .query_row(
        &sql,
        rusqlite::params![applicant_str, field_name],
        RawTrustRecord::from_row,
      )
      .optional()?,
  )
}

// ─── TrustStore impl ─────────────────────────────────────────────────────────

impl TrustStore for SqliteStore {
  type Error = Error;

  async fn record_verification(
    &self,
    applicant_id: Uuid,
    input: NewVerification,
  ) -> Result<VerificationOutcome> {
    let applicant_str = encode_uuid(applicant_id);
    let field_for_err = input.field_name.clone();
    let method = input.method;
    let verified = input.verified;
    let metadata_json = input
      .metadata
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        let existing = fetch_raw(&tx, &applicant_str, &input.field_name)?;

        // Override-protection rule: a locked field only yields to an
        // official source.
        if let Some(raw) = existing {
          if raw.is_locked && !method.is_official_source() {
            tracing::debug!(
              applicant = %applicant_str,
              field = %input.field_name,
              method = encode_method(method),
              "verification blocked by field lock"
            );
            return Ok(TrustTx::Blocked(Box::new(raw)));
          }

          let should_lock = method.is_automated() && verified;
          tx.execute(
            "UPDATE trust_records
             SET field_value = ?3, method = ?4, is_verified = ?5,
                 is_locked = ?6, status = ?7, rejection_reason = NULL,
                 metadata = ?8, notes = ?9, verified_at = ?10,
                 updated_at = ?11
             WHERE applicant_id = ?1 AND field_name = ?2",
            rusqlite::params![
              applicant_str,
              input.field_name,
              input.field_value,
              encode_method(method),
              verified,
              should_lock,
              encode_trust_status(if verified {
                origen_core::trust::TrustStatus::Verified
              } else {
                origen_core::trust::TrustStatus::Pending
              }),
              metadata_json,
              input.notes,
              verified.then(|| now_str.clone()),
              now_str,
            ],
          )?;
        } else {
          let should_lock = method.is_automated() && verified;
          tx.execute(
            "INSERT INTO trust_records
               (record_id, applicant_id, field_name, field_value, method,
                is_verified, is_locked, status, correction_history,
                metadata, notes, verified_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '[]', ?9, ?10, ?11, ?12)",
            rusqlite::params![
              encode_uuid(Uuid::new_v4()),
              applicant_str,
              input.field_name,
              input.field_value,
              encode_method(method),
              verified,
              should_lock,
              encode_trust_status(if verified {
                origen_core::trust::TrustStatus::Verified
              } else {
                origen_core::trust::TrustStatus::Pending
              }),
              metadata_json,
              input.notes,
              verified.then(|| now_str.clone()),
              now_str,
            ],
          )?;
        }

        let Some(raw) = fetch_raw(&tx, &applicant_str, &input.field_name)?
        else {
          return Ok(TrustTx::NotFound);
        };
        tx.commit()?;
        Ok(TrustTx::Applied(Box::new(raw)))
      })
      .await?;

    match out {
      TrustTx::Applied(raw) => Ok(VerificationOutcome {
        record:  raw.into_record()?,
        applied: true,
      }),
      TrustTx::Blocked(raw) => Ok(VerificationOutcome {
        record:  raw.into_record()?,
        applied: false,
      }),
      TrustTx::NotFound => Err(
        origen_core::Error::RecordNotFound {
          applicant_id,
          field_name: field_for_err,
        }
        .into(),
      ),
    }
  }

  async fn record_batch_verifications(
    &self,
    applicant_id: Uuid,
    entries: Vec<NewVerification>,
  ) -> Result<Vec<VerificationOutcome>> {
    let mut outcomes = Vec::with_capacity(entries.len());
    for entry in entries {
      outcomes.push(self.record_verification(applicant_id, entry).await?);
    }
    Ok(outcomes)
  }

  async fn reject_field(
    &self,
    applicant_id: Uuid,
    field_name: String,
    reason: String,
    actor: Actor,
  ) -> Result<TrustRecord> {
    let applicant_str = encode_uuid(applicant_id);
    let field_for_err = field_name.clone();
    let actor_json = serde_json::to_string(&actor)?;

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        if fetch_raw(&tx, &applicant_str, &field_name)?.is_none() {
          return Ok(TrustTx::NotFound);
        }
        // The stored value stays visible pending correction.
        tx.execute(
          "UPDATE trust_records
           SET status = ?3, rejection_reason = ?4, is_verified = 0,
               updated_at = ?5
           WHERE applicant_id = ?1 AND field_name = ?2",
          rusqlite::params![
            applicant_str,
            field_name,
            encode_trust_status(origen_core::trust::TrustStatus::Rejected),
            reason,
            now_str,
          ],
        )?;
        let Some(raw) = fetch_raw(&tx, &applicant_str, &field_name)? else {
          return Ok(TrustTx::NotFound);
        };
        tx.commit()?;
        tracing::debug!(
          applicant = %applicant_str,
          actor = %actor_json,
          "trust field rejected"
        );
        Ok(TrustTx::Applied(Box::new(raw)))
      })
      .await?;

    match out {
      TrustTx::Applied(raw) | TrustTx::Blocked(raw) => raw.into_record(),
      TrustTx::NotFound => Err(
        origen_core::Error::RecordNotFound {
          applicant_id,
          field_name: field_for_err,
        }
        .into(),
      ),
    }
  }

  async fn mark_corrected(
    &self,
    applicant_id: Uuid,
    field_name: String,
    new_value: String,
    actor: Actor,
    reason: Option<String>,
  ) -> Result<TrustRecord> {
    let applicant_str = encode_uuid(applicant_id);
    let field_for_err = field_name.clone();

    let out = self
      .conn
      .call(move |conn| {
        let now = Utc::now();
        let now_str = encode_dt(now);
        let tx = conn.transaction()?;
        let Some(raw) = fetch_raw(&tx, &applicant_str, &field_name)? else {
          return Ok(TrustTx::NotFound);
        };

        let mut history =
          decode_corrections(&raw.correction_history).map_err(domain)?;
        history.push(CorrectionEntry {
          old_value: raw.field_value.clone(),
          new_value: new_value.clone(),
          reason,
          actor,
          recorded_at: now,
        });
        let history_json = encode_corrections(&history).map_err(domain)?;

        tx.execute(
          "UPDATE trust_records
           SET field_value = ?3, status = ?4, correction_history = ?5,
               updated_at = ?6
           WHERE applicant_id = ?1 AND field_name = ?2",
          rusqlite::params![
            applicant_str,
            field_name,
            new_value,
            encode_trust_status(origen_core::trust::TrustStatus::Corrected),
            history_json,
            now_str,
          ],
        )?;
        let Some(raw) = fetch_raw(&tx, &applicant_str, &field_name)? else {
          return Ok(TrustTx::NotFound);
        };
        tx.commit()?;
        Ok(TrustTx::Applied(Box::new(raw)))
      })
      .await?;

    match out {
      TrustTx::Applied(raw) | TrustTx::Blocked(raw) => raw.into_record(),
      TrustTx::NotFound => Err(
        origen_core::Error::RecordNotFound {
          applicant_id,
          field_name: field_for_err,
        }
        .into(),
      ),
    }
  }

  async fn get_record(
    &self,
    applicant_id: Uuid,
    field_name: String,
  ) -> Result<Option<TrustRecord>> {
    let applicant_str = encode_uuid(applicant_id);
    let raw = self
      .conn
      .call(move |conn| fetch_raw(conn, &applicant_str, &field_name))
      .await?;
    raw.map(RawTrustRecord::into_record).transpose()
  }

  async fn get_verified_fields(
    &self,
    applicant_id: Uuid,
  ) -> Result<BTreeMap<String, VerifiedField>> {
    let applicant_str = encode_uuid(applicant_id);

    let rows: Vec<(String, String, String, Option<String>, bool)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT field_name, field_value, method, verified_at, is_locked
           FROM trust_records
           WHERE applicant_id = ?1 AND is_verified = 1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![applicant_str], |row| {
            Ok((
              row.get(0)?,
              row.get(1)?,
              row.get(2)?,
              row.get(3)?,
              row.get(4)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut fields = BTreeMap::new();
    for (name, value, method, verified_at, is_locked) in rows {
      fields.insert(name, VerifiedField {
        value,
        method: decode_method(&method)?,
        verified_at: verified_at.as_deref().map(decode_dt).transpose()?,
        is_locked,
      });
    }
    Ok(fields)
  }

  async fn is_field_verified(
    &self,
    applicant_id: Uuid,
    field_name: String,
  ) -> Result<bool> {
    let applicant_str = encode_uuid(applicant_id);
    let verified: Option<bool> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT is_verified FROM trust_records
               WHERE applicant_id = ?1 AND field_name = ?2",
              rusqlite::params![applicant_str, field_name],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(verified.unwrap_or(false))
  }
}
