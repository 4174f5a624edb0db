//! [`DocumentStore`] implementation: revision records and the supersession
//! chain.
//!
//! Activation and supersession run inside single transactions so the
//! single-active invariant — also enforced by a partial unique index — holds
//! at every observation point. Chain traversal is one recursive CTE per
//! call: never a round trip per hop.

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use origen_core::{
  document::{
    DocumentRevision, DocumentStatus, Documentable, MAX_CHAIN_DEPTH,
    NewDocumentRevision,
  },
  store::DocumentStore,
};

use crate::{
  Error, Result,
  encode::{
    RawDocumentRevision, encode_document_status, encode_documentable_kind,
    encode_dt, encode_uuid,
  },
  store::SqliteStore,
};

// ─── In-transaction helpers ──────────────────────────────────────────────────

enum DocTx {
  NotFound,
  AlreadySuperseded,
  Applied(Box<RawDocumentRevision>),
  Superseded {
    old: Box<RawDocumentRevision>,
    new: Box<RawDocumentRevision>,
  },
}

fn fetch_raw(
  conn: &rusqlite::Connection,
  id_str: &str,
) -> tokio_rusqlite::Result<Option<RawDocumentRevision>> {
  let sql = format!(
    "SELECT {} FROM document_revisions WHERE revision_id = ?1",
    RawDocumentRevision::COLUMNS
  );
  Ok(
    conn
      .query_row(
        &sql,
        rusqlite::params![id_str],
        RawDocumentRevision::from_row,
      )
      .optional()?,
  )
}

/// Deactivate every active sibling of (kind, id, type) except `keep_id`,
/// closing their validity window at `now_str`.
///
/// The closing stamp is clamped to the sibling's own `valid_from` so a
/// future-dated revision keeps a degenerate (single-instant) window instead
/// of tripping the `valid_to >= valid_from` CHECK. RFC 3339 strings with a
/// fixed `+00:00` offset order lexicographically, so SQL `MAX` is safe here.
fn deactivate_siblings(
  conn: &rusqlite::Connection,
  kind: &str,
  documentable_id: &str,
  doc_type: &str,
  keep_id: &str,
  now_str: &str,
) -> tokio_rusqlite::Result<()> {
  conn.execute(
    "UPDATE document_revisions
     SET is_active = 0, valid_to = MAX(?5, valid_from)
     WHERE documentable_kind = ?1 AND documentable_id = ?2
       AND doc_type = ?3 AND is_active = 1 AND revision_id != ?4",
    rusqlite::params![kind, documentable_id, doc_type, keep_id, now_str],
  )?;
  Ok(())
}

/// Flip `keep_id` active: `valid_from = valid_from ?? now`, window open.
fn mark_active(
  conn: &rusqlite::Connection,
  id_str: &str,
  now_str: &str,
) -> tokio_rusqlite::Result<()> {
  conn.execute(
    "UPDATE document_revisions
     SET is_active = 1, valid_from = COALESCE(valid_from, ?2),
         valid_to = NULL
     WHERE revision_id = ?1",
    rusqlite::params![id_str, now_str],
  )?;
  Ok(())
}

fn insert_revision(
  conn: &rusqlite::Connection,
  id_str: &str,
  input: &NewDocumentRevision,
  now_str: &str,
) -> tokio_rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO document_revisions
       (revision_id, documentable_kind, documentable_id, doc_type,
        category, file_path, status, is_active, valid_from, uploaded_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9)",
    rusqlite::params![
      id_str,
      encode_documentable_kind(input.documentable.kind),
      encode_uuid(input.documentable.id),
      input.doc_type,
      input.category,
      input.file_path,
      encode_document_status(DocumentStatus::Pending),
      input.valid_from.map(encode_dt),
      now_str,
    ],
  )?;
  Ok(())
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn create_revision(
    &self,
    input: NewDocumentRevision,
  ) -> Result<DocumentRevision> {
    let id = Uuid::new_v4();
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        insert_revision(conn, &id_str, &input, &now_str)?;
        Ok(fetch_raw(conn, &id_str)?)
      })
      .await?;

    match raw {
      Some(raw) => raw.into_revision(),
      None => Err(origen_core::Error::RevisionNotFound(id).into()),
    }
  }

  async fn get_revision(&self, id: Uuid) -> Result<Option<DocumentRevision>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| fetch_raw(conn, &id_str)).await?;
    raw.map(RawDocumentRevision::into_revision).transpose()
  }

  async fn activate(&self, id: Uuid) -> Result<DocumentRevision> {
    let id_str = encode_uuid(id);

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(DocTx::NotFound);
        };
        deactivate_siblings(
          &tx,
          &raw.documentable_kind,
          &raw.documentable_id,
          &raw.doc_type,
          &id_str,
          &now_str,
        )?;
        mark_active(&tx, &id_str, &now_str)?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(DocTx::NotFound);
        };
        tx.commit()?;
        tracing::debug!(revision = %id_str, "document revision activated");
        Ok(DocTx::Applied(Box::new(raw)))
      })
      .await?;

    match out {
      DocTx::Applied(raw) => raw.into_revision(),
      _ => Err(origen_core::Error::RevisionNotFound(id).into()),
    }
  }

  async fn deactivate(&self, id: Uuid) -> Result<DocumentRevision> {
    let id_str = encode_uuid(id);

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(DocTx::NotFound);
        };
        if raw.is_active {
          tx.execute(
            "UPDATE document_revisions
             SET is_active = 0, valid_to = MAX(?2, valid_from)
             WHERE revision_id = ?1",
            rusqlite::params![id_str, now_str],
          )?;
        }
        let Some(raw) = fetch_raw(&tx, &id_str)? else {
          return Ok(DocTx::NotFound);
        };
        tx.commit()?;
        Ok(DocTx::Applied(Box::new(raw)))
      })
      .await?;

    match out {
      DocTx::Applied(raw) => raw.into_revision(),
      _ => Err(origen_core::Error::RevisionNotFound(id).into()),
    }
  }

  async fn supersede_with(
    &self,
    old_id: Uuid,
    replacement: NewDocumentRevision,
    reason: Option<String>,
  ) -> Result<(DocumentRevision, DocumentRevision)> {
    let old_str = encode_uuid(old_id);
    let new_id = Uuid::new_v4();
    let new_str = encode_uuid(new_id);

    let out = self
      .conn
      .call(move |conn| {
        let now_str = encode_dt(Utc::now());
        let tx = conn.transaction()?;
        let Some(old_raw) = fetch_raw(&tx, &old_str)? else {
          return Ok(DocTx::NotFound);
        };
        if old_raw.superseded_by.is_some() {
          return Ok(DocTx::AlreadySuperseded);
        }

        // The replacement starts inactive so the partial unique index never
        // sees two active rows, even transiently.
        insert_revision(&tx, &new_str, &replacement, &now_str)?;

        tx.execute(
          "UPDATE document_revisions
           SET status = ?2, superseded_by = ?3, superseded_reason = ?4,
               is_active = 0, valid_to = MAX(?5, COALESCE(valid_from, ?5))
           WHERE revision_id = ?1",
          rusqlite::params![
            old_str,
            encode_document_status(DocumentStatus::Superseded),
            new_str,
            reason,
            now_str,
          ],
        )?;

        deactivate_siblings(
          &tx,
          &encode_documentable_kind(replacement.documentable.kind),
          &encode_uuid(replacement.documentable.id),
          &replacement.doc_type,
          &new_str,
          &now_str,
        )?;
        mark_active(&tx, &new_str, &now_str)?;

        let (Some(old_raw), Some(new_raw)) =
          (fetch_raw(&tx, &old_str)?, fetch_raw(&tx, &new_str)?)
        else {
          return Ok(DocTx::NotFound);
        };
        tx.commit()?;
        tracing::debug!(
          old = %old_str,
          new = %new_str,
          "document revision superseded"
        );
        Ok(DocTx::Superseded {
          old: Box::new(old_raw),
          new: Box::new(new_raw),
        })
      })
      .await?;

    match out {
      DocTx::Superseded { old, new } => {
        Ok((old.into_revision()?, new.into_revision()?))
      }
      DocTx::AlreadySuperseded => {
        Err(origen_core::Error::AlreadySuperseded(old_id).into())
      }
      _ => Err(origen_core::Error::RevisionNotFound(old_id).into()),
    }
  }

  async fn supersession_chain(
    &self,
    start: Uuid,
  ) -> Result<Vec<DocumentRevision>> {
    self.chain(start, Direction::Forward).await
  }

  async fn reverse_supersession_chain(
    &self,
    start: Uuid,
  ) -> Result<Vec<DocumentRevision>> {
    self.chain(start, Direction::Backward).await
  }

  async fn active_revision(
    &self,
    documentable: Documentable,
    doc_type: String,
  ) -> Result<Option<DocumentRevision>> {
    let kind_str = encode_documentable_kind(documentable.kind);
    let id_str = encode_uuid(documentable.id);

    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM document_revisions
           WHERE documentable_kind = ?1 AND documentable_id = ?2
             AND doc_type = ?3 AND is_active = 1",
          RawDocumentRevision::COLUMNS
        );
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params![kind_str, id_str, doc_type],
              RawDocumentRevision::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDocumentRevision::into_revision).transpose()
  }

  async fn revisions_for(
    &self,
    documentable: Documentable,
  ) -> Result<Vec<DocumentRevision>> {
    let kind_str = encode_documentable_kind(documentable.kind);
    let id_str = encode_uuid(documentable.id);

    let raws: Vec<RawDocumentRevision> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM document_revisions
           WHERE documentable_kind = ?1 AND documentable_id = ?2
           ORDER BY uploaded_at DESC, rowid DESC",
          RawDocumentRevision::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![kind_str, id_str],
            RawDocumentRevision::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawDocumentRevision::into_revision)
      .collect()
  }

  async fn is_valid_at(
    &self,
    id: Uuid,
    instant: DateTime<Utc>,
  ) -> Result<bool> {
    let revision = self
      .get_revision(id)
      .await?
      .ok_or(origen_core::Error::RevisionNotFound(id))?;
    Ok(revision.is_valid_at(instant))
  }
}

// ─── Chain traversal ─────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Direction {
  /// start → newest, following `superseded_by`.
  Forward,
  /// oldest → start, following the inverse of `superseded_by`.
  Backward,
}

impl SqliteStore {
  async fn chain(
    &self,
    start: Uuid,
    direction: Direction,
  ) -> Result<Vec<DocumentRevision>> {
    let start_str = encode_uuid(start);

    // One bulk recursive fetch; the depth guard bounds runaway recursion
    // from corrupt (cyclic) data. One extra level is requested so the cap
    // overflow is detectable.
    let join = match direction {
      Direction::Forward => "d.revision_id = c.superseded_by",
      Direction::Backward => "d.superseded_by = c.revision_id",
    };
    let order = match direction {
      Direction::Forward => "c.depth",
      Direction::Backward => "c.depth DESC",
    };
    let sql = format!(
      "WITH RECURSIVE chain(revision_id, superseded_by, depth) AS (
         SELECT revision_id, superseded_by, 0
         FROM document_revisions WHERE revision_id = ?1
         UNION ALL
         SELECT d.revision_id, d.superseded_by, c.depth + 1
         FROM document_revisions d JOIN chain c ON {join}
         WHERE c.depth < ?2
       )
       SELECT {}, c.depth FROM chain c
       JOIN document_revisions d ON d.revision_id = c.revision_id
       ORDER BY {order}",
      RawDocumentRevision::COLUMNS
        .split(", ")
        .map(|col| format!("d.{col}"))
        .collect::<Vec<_>>()
        .join(", "),
    );

    let raws: Vec<RawDocumentRevision> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![start_str, MAX_CHAIN_DEPTH as i64],
            RawDocumentRevision::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    if raws.is_empty() {
      return Err(origen_core::Error::RevisionNotFound(start).into());
    }
    if raws.len() > MAX_CHAIN_DEPTH {
      return Err(
        origen_core::Error::ChainIntegrityViolation {
          start,
          depth: raws.len(),
        }
        .into(),
      );
    }

    raws
      .into_iter()
      .map(RawDocumentRevision::into_revision)
      .collect()
  }
}
