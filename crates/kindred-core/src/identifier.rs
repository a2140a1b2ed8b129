//! Identifiers — typed external handles bound to entities.
//!
//! An identifier is the strongest duplicate signal the detector has: two
//! records claiming the same Telegram user id are the same person.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The external system an identifier value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
  TelegramId,
  TelegramUsername,
  Phone,
  Email,
}

impl IdentifierKind {
  /// The discriminant string stored in the `kind` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::TelegramId => "telegram_id",
      Self::TelegramUsername => "telegram_username",
      Self::Phone => "phone",
      Self::Email => "email",
    }
  }
}

/// A typed external handle bound to exactly one entity.
///
/// Invariant: at most one identifier of a given kind per entity. The store
/// enforces this with a UNIQUE constraint; the merge executor preserves it by
/// resolving identifier conflicts with deletion, never duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
  pub identifier_id: Uuid,
  pub entity_id:     Uuid,
  pub kind:          IdentifierKind,
  pub value:         String,
  pub recorded_at:   DateTime<Utc>,
}

/// Input to [`crate::store::GraphStore::bind_identifier`].
#[derive(Debug, Clone)]
pub struct NewIdentifier {
  pub entity_id: Uuid,
  pub kind:      IdentifierKind,
  pub value:     String,
}

impl NewIdentifier {
  pub fn new(entity_id: Uuid, kind: IdentifierKind, value: impl Into<String>) -> Self {
    Self { entity_id, kind, value: value.into() }
  }
}
