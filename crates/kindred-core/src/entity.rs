//! Entity — a node of the knowledge graph.
//!
//! An entity represents one real-world person or organisation. Entities are
//! created opportunistically by the ingestion pipeline (first contact,
//! mention, import), so the same person can end up as several records; the
//! dedupe engine in [`crate::dedupe`] exists to fold those back together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of real-world thing an entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  Person,
  Organization,
  Other,
}

/// A node in the knowledge graph.
///
/// Entities are never hard-deleted: the terminal step of a merge sets
/// `deleted_at`, so historical references stay resolvable for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
  pub entity_id:  Uuid,
  pub name:       String,
  pub kind:       EntityKind,
  /// Path to a profile photo on disk, if one has been captured.
  pub photo_path: Option<String>,
  pub created_at: DateTime<Utc>,
  /// Set when the entity was consolidated into another by a merge.
  pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity {
  /// Whether this entity is still part of the live graph.
  pub fn is_live(&self) -> bool { self.deleted_at.is_none() }
}

/// Input to [`crate::store::GraphStore::add_entity`].
/// `entity_id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewEntity {
  pub name:       String,
  pub kind:       EntityKind,
  pub photo_path: Option<String>,
}

impl NewEntity {
  pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
    Self { name: name.into(), kind, photo_path: None }
  }
}
