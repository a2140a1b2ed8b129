//! SQL schema for the kindred SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! The tables below `-- Dependent relations` are owned by other subsystems
//! (ingestion, extraction, scheduling); they live here because the merge
//! executor must rewrite their entity references inside one transaction.
//! Referential cleanup is performed by the executor itself, not by ON DELETE
//! cascade rules — some of it requires conditional deletion, not
//! unconditional cascade.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS entities (
    entity_id   TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,   -- 'person' | 'organization' | 'other'
    photo_path  TEXT,
    created_at  TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    deleted_at  TEXT             -- set when merged away; rows are never dropped
);

-- One current identifier per kind per entity; conflicts during a merge are
-- resolved by deletion, never by a second row.
CREATE TABLE IF NOT EXISTS identifiers (
    identifier_id TEXT PRIMARY KEY,
    entity_id     TEXT NOT NULL REFERENCES entities(entity_id),
    kind          TEXT NOT NULL,   -- 'telegram_id' | 'telegram_username' | 'phone' | 'email'
    value         TEXT NOT NULL,
    recorded_at   TEXT NOT NULL,
    UNIQUE (entity_id, kind)
);

-- Facts are historicized, never deleted: valid_until IS NULL means current.
CREATE TABLE IF NOT EXISTS facts (
    fact_id     TEXT PRIMARY KEY,
    entity_id   TEXT NOT NULL REFERENCES entities(entity_id),
    kind        TEXT NOT NULL,
    value       TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    valid_until TEXT
);

-- The suggestion ledger: (primary, dismissed) pairs never to suggest again.
-- The UNIQUE constraint doubles as the idempotence signal for concurrent
-- duplicate dismissals.
CREATE TABLE IF NOT EXISTS merge_dismissals (
    dismissal_id        TEXT PRIMARY KEY,
    primary_entity_id   TEXT NOT NULL,
    dismissed_entity_id TEXT NOT NULL,
    dismissed_by        TEXT NOT NULL,
    recorded_at         TEXT NOT NULL,
    UNIQUE (primary_entity_id, dismissed_entity_id)
);

-- Dependent relations ---------------------------------------------------------

CREATE TABLE IF NOT EXISTS messages (
    message_id          TEXT PRIMARY KEY,
    sender_entity_id    TEXT NOT NULL,
    recipient_entity_id TEXT NOT NULL,
    body                TEXT NOT NULL DEFAULT '',
    sent_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS interaction_participants (
    interaction_id TEXT NOT NULL,
    entity_id      TEXT NOT NULL,
    UNIQUE (interaction_id, entity_id)
);

CREATE TABLE IF NOT EXISTS relation_members (
    relation_id TEXT NOT NULL,
    role        TEXT NOT NULL,
    entity_id   TEXT NOT NULL,
    UNIQUE (relation_id, role, entity_id)
);

CREATE TABLE IF NOT EXISTS activities (
    activity_id      TEXT PRIMARY KEY,
    owner_entity_id  TEXT NOT NULL,
    client_entity_id TEXT NOT NULL,
    summary          TEXT NOT NULL DEFAULT '',
    recorded_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS commitments (
    commitment_id  TEXT PRIMARY KEY,
    from_entity_id TEXT NOT NULL,
    to_entity_id   TEXT NOT NULL,
    summary        TEXT NOT NULL DEFAULT '',
    recorded_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entity_events (
    event_id          TEXT PRIMARY KEY,
    subject_entity_id TEXT NOT NULL,
    related_entity_id TEXT,
    kind              TEXT NOT NULL,
    recorded_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transcript_speakers (
    transcript_id TEXT NOT NULL,
    entity_id     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id  TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    UNIQUE (group_id, entity_id)
);

CREATE TABLE IF NOT EXISTS pending_entity_resolutions (
    resolution_id TEXT PRIMARY KEY,
    entity_id     TEXT NOT NULL,
    raw_name      TEXT NOT NULL DEFAULT '',
    recorded_at   TEXT NOT NULL
);

-- Derived cache, recomputed lazily; a merge simply drops the source's row.
CREATE TABLE IF NOT EXISTS relationship_profiles (
    entity_id    TEXT PRIMARY KEY,
    profile_json TEXT NOT NULL,
    computed_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS identifiers_kind_value_idx ON identifiers(kind, value);
CREATE INDEX IF NOT EXISTS facts_entity_idx           ON facts(entity_id);
CREATE INDEX IF NOT EXISTS messages_sender_idx        ON messages(sender_entity_id);
CREATE INDEX IF NOT EXISTS messages_recipient_idx     ON messages(recipient_entity_id);
CREATE INDEX IF NOT EXISTS dismissals_pair_idx        ON merge_dismissals(primary_entity_id, dismissed_entity_id);

PRAGMA user_version = 1;
";
