//! SQL schema for the Origen SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Applications are soft-removed only (deleted_at); no DELETE is ever issued.
CREATE TABLE IF NOT EXISTS applications (
    application_id         TEXT PRIMARY KEY,
    tenant_id              TEXT NOT NULL,
    applicant_kind         TEXT NOT NULL,   -- 'person' | 'company'
    applicant_id           TEXT NOT NULL,
    product_id             TEXT NOT NULL,
    requested_amount_cents INTEGER NOT NULL,
    requested_term_months  INTEGER NOT NULL,
    requested_rate_bps     INTEGER NOT NULL,
    approved_amount_cents  INTEGER,
    approved_term_months   INTEGER,
    approved_rate_bps      INTEGER,
    monthly_payment_cents  INTEGER,
    total_cost_cents       INTEGER,
    status                 TEXT NOT NULL,
    decision               TEXT,
    decision_notes         TEXT,
    rejection_reason       TEXT,
    counter_offer          TEXT,            -- JSON CounterOffer or NULL
    assigned_to            TEXT,
    sync_ref               TEXT,
    created_at             TEXT NOT NULL,
    status_changed_at      TEXT NOT NULL,
    status_changed_by      TEXT NOT NULL,   -- JSON Actor
    deleted_at             TEXT
);

-- Strictly append-only; one row per transition plus the creation row.
CREATE TABLE IF NOT EXISTS application_status_history (
    history_id     TEXT PRIMARY KEY,
    application_id TEXT NOT NULL REFERENCES applications(application_id),
    from_status    TEXT,            -- NULL for the creation entry
    to_status      TEXT NOT NULL,
    actor          TEXT NOT NULL,   -- JSON Actor
    note           TEXT,
    recorded_at    TEXT NOT NULL
);

-- One current row per (applicant, field); corrections append to the
-- correction_history JSON column, never to new rows.
CREATE TABLE IF NOT EXISTS trust_records (
    record_id          TEXT PRIMARY KEY,
    applicant_id       TEXT NOT NULL,
    field_name         TEXT NOT NULL,
    field_value        TEXT NOT NULL,
    method             TEXT NOT NULL,
    is_verified        INTEGER NOT NULL DEFAULT 0,
    is_locked          INTEGER NOT NULL DEFAULT 0,
    status             TEXT NOT NULL,
    rejection_reason   TEXT,
    correction_history TEXT NOT NULL DEFAULT '[]',
    metadata           TEXT,
    notes              TEXT,
    verified_at        TEXT,
    updated_at         TEXT NOT NULL,
    UNIQUE (applicant_id, field_name)
);

CREATE TABLE IF NOT EXISTS document_revisions (
    revision_id       TEXT PRIMARY KEY,
    documentable_kind TEXT NOT NULL,  -- 'person' | 'company' | 'application'
    documentable_id   TEXT NOT NULL,
    doc_type          TEXT NOT NULL,
    category          TEXT,
    file_path         TEXT NOT NULL,
    status            TEXT NOT NULL,
    is_active         INTEGER NOT NULL DEFAULT 0,
    valid_from        TEXT,            -- NULL until first activation
    valid_to          TEXT,
    superseded_by     TEXT REFERENCES document_revisions(revision_id),
    superseded_reason TEXT,
    uploaded_at       TEXT NOT NULL,
    CHECK (valid_to IS NULL OR valid_from IS NULL OR valid_to >= valid_from),
    CHECK (is_active = 0 OR (valid_to IS NULL AND valid_from IS NOT NULL))
);

-- Invariant A: at most one active revision per (subject, type).
CREATE UNIQUE INDEX IF NOT EXISTS document_revisions_active_idx
    ON document_revisions(documentable_kind, documentable_id, doc_type)
    WHERE is_active = 1;

CREATE INDEX IF NOT EXISTS applications_tenant_idx
    ON applications(tenant_id);
CREATE INDEX IF NOT EXISTS applications_status_idx
    ON applications(status);
CREATE INDEX IF NOT EXISTS history_application_idx
    ON application_status_history(application_id);
CREATE INDEX IF NOT EXISTS trust_applicant_idx
    ON trust_records(applicant_id);
CREATE INDEX IF NOT EXISTS document_revisions_subject_idx
    ON document_revisions(documentable_kind, documentable_id, doc_type);
CREATE INDEX IF NOT EXISTS document_revisions_superseded_idx
    ON document_revisions(superseded_by);

PRAGMA user_version = 1;
";
