//! Facts — typed, time-versioned attributes of an entity.
//!
//! A fact is never deleted when it stops being true; its `valid_until` is set
//! instead, so the old value stays queryable as history. Only facts with no
//! `valid_until` ("current" facts) participate in conflict detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A typed attribute value attached to an entity.
///
/// The kind is an open vocabulary (`"company"`, `"city"`, `"role"`, …): the
/// extraction pipeline that produces facts mints kinds freely, so no enum
/// could keep up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
  pub fact_id:     Uuid,
  pub entity_id:   Uuid,
  pub kind:        String,
  pub value:       String,
  pub recorded_at: DateTime<Utc>,
  /// `None` means the fact is current; a timestamp marks it historical.
  pub valid_until: Option<DateTime<Utc>>,
}

impl Fact {
  pub fn is_current(&self) -> bool { self.valid_until.is_none() }
}

/// Input to [`crate::store::GraphStore::record_fact`].
/// `fact_id` and `recorded_at` are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewFact {
  pub entity_id: Uuid,
  pub kind:      String,
  pub value:     String,
}

impl NewFact {
  pub fn new(entity_id: Uuid, kind: impl Into<String>, value: impl Into<String>) -> Self {
    Self { entity_id, kind: kind.into(), value: value.into() }
  }
}
