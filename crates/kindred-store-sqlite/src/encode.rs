//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Enumerated kinds are stored as their
//! snake_case discriminants.

use chrono::{DateTime, Utc};
use kindred_core::{
  entity::{Entity, EntityKind},
  fact::Fact,
  identifier::{Identifier, IdentifierKind},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── EntityKind ───────────────────────────────────────────────────────────────

pub fn encode_entity_kind(k: EntityKind) -> &'static str {
  match k {
    EntityKind::Person => "person",
    EntityKind::Organization => "organization",
    EntityKind::Other => "other",
  }
}

pub fn decode_entity_kind(s: &str) -> Result<EntityKind> {
  match s {
    "person" => Ok(EntityKind::Person),
    "organization" => Ok(EntityKind::Organization),
    "other" => Ok(EntityKind::Other),
    other => Err(Error::DateParse(format!("unknown entity kind: {other:?}"))),
  }
}

// ─── IdentifierKind ───────────────────────────────────────────────────────────

pub fn encode_identifier_kind(k: IdentifierKind) -> &'static str { k.as_str() }

pub fn decode_identifier_kind(s: &str) -> Result<IdentifierKind> {
  match s {
    "telegram_id" => Ok(IdentifierKind::TelegramId),
    "telegram_username" => Ok(IdentifierKind::TelegramUsername),
    "phone" => Ok(IdentifierKind::Phone),
    "email" => Ok(IdentifierKind::Email),
    other => {
      Err(Error::DateParse(format!("unknown identifier kind: {other:?}")))
    }
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `entities` row.
pub struct RawEntity {
  pub entity_id:  String,
  pub name:       String,
  pub kind:       String,
  pub photo_path: Option<String>,
  pub created_at: String,
  pub deleted_at: Option<String>,
}

impl RawEntity {
  pub const COLUMNS: &'static str =
    "entity_id, name, kind, photo_path, created_at, deleted_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:  row.get(0)?,
      name:       row.get(1)?,
      kind:       row.get(2)?,
      photo_path: row.get(3)?,
      created_at: row.get(4)?,
      deleted_at: row.get(5)?,
    })
  }

  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      entity_id:  decode_uuid(&self.entity_id)?,
      name:       self.name,
      kind:       decode_entity_kind(&self.kind)?,
      photo_path: self.photo_path,
      created_at: decode_dt(&self.created_at)?,
      deleted_at: self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw strings read directly from an `identifiers` row.
pub struct RawIdentifier {
  pub identifier_id: String,
  pub entity_id:     String,
  pub kind:          String,
  pub value:         String,
  pub recorded_at:   String,
}

impl RawIdentifier {
  pub const COLUMNS: &'static str =
    "identifier_id, entity_id, kind, value, recorded_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identifier_id: row.get(0)?,
      entity_id:     row.get(1)?,
      kind:          row.get(2)?,
      value:         row.get(3)?,
      recorded_at:   row.get(4)?,
    })
  }

  pub fn into_identifier(self) -> Result<Identifier> {
    Ok(Identifier {
      identifier_id: decode_uuid(&self.identifier_id)?,
      entity_id:     decode_uuid(&self.entity_id)?,
      kind:          decode_identifier_kind(&self.kind)?,
      value:         self.value,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from a `facts` row.
pub struct RawFact {
  pub fact_id:     String,
  pub entity_id:   String,
  pub kind:        String,
  pub value:       String,
  pub recorded_at: String,
  pub valid_until: Option<String>,
}

impl RawFact {
  pub const COLUMNS: &'static str =
    "fact_id, entity_id, kind, value, recorded_at, valid_until";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      fact_id:     row.get(0)?,
      entity_id:   row.get(1)?,
      kind:        row.get(2)?,
      value:       row.get(3)?,
      recorded_at: row.get(4)?,
      valid_until: row.get(5)?,
    })
  }

  pub fn into_fact(self) -> Result<Fact> {
    Ok(Fact {
      fact_id:     decode_uuid(&self.fact_id)?,
      entity_id:   decode_uuid(&self.entity_id)?,
      kind:        self.kind,
      value:       self.value,
      recorded_at: decode_dt(&self.recorded_at)?,
      valid_until: self.valid_until.as_deref().map(decode_dt).transpose()?,
    })
  }
}
