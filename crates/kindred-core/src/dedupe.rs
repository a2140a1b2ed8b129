//! Deduplication types — candidate detection, merge preview, merge execution.
//!
//! The heavy lifting (SQL, transactions) lives in the storage backend; this
//! module defines the shapes those operations exchange, plus the pure helpers
//! both detection strategies and the previewer share.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{entity::Entity, fact::Fact, identifier::Identifier};

// ─── Detection ───────────────────────────────────────────────────────────────

/// Display-name prefix the ingestion pipeline assigns to contacts it knows
/// only by numeric Telegram id.
pub const ORPHAN_NAME_PREFIX: &str = "Telegram ";

/// Minimum normalized-name length for the shared-identifier strategy.
/// Shorter names collide with usernames far too easily ("anna", "max").
pub const MIN_SHARED_NAME_LEN: usize = 5;

/// Which heuristic nominated a candidate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
  /// Candidate's display name carries a raw Telegram id that another entity
  /// already owns as an identifier.
  OrphanedTelegramId,
  /// Candidate's display name matches a username identifier owned by another
  /// entity.
  SharedIdentifier,
}

impl MatchReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::OrphanedTelegramId => "orphaned_telegram_id",
      Self::SharedIdentifier => "shared_identifier",
    }
  }
}

/// A probable duplicate of the primary entity in its group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCandidate {
  pub entity_id:     Uuid,
  pub name:          String,
  /// The identifier value the candidate matched on.
  pub matched_value: String,
  pub created_at:    DateTime<Utc>,
  pub message_count: i64,
}

/// The already-resolved entity a group's candidates would merge into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimarySummary {
  pub entity:        Entity,
  pub identifiers:   Vec<Identifier>,
  pub message_count: i64,
}

/// One primary entity with every candidate either strategy nominated for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateGroup {
  pub primary:    PrimarySummary,
  pub candidates: Vec<DuplicateCandidate>,
  pub reason:     MatchReason,
}

/// A page of detection results.
///
/// `total` counts distinct primary entities across the whole store, not rows
/// on this page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
  pub groups: Vec<CandidateGroup>,
  pub total:  usize,
}

// ─── Preview ─────────────────────────────────────────────────────────────────

/// Everything about one side of a prospective merge that a reviewer compares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMergeData {
  pub entity:         Entity,
  pub identifiers:    Vec<Identifier>,
  pub current_facts:  Vec<Fact>,
  pub message_count:  i64,
  pub relation_count: i64,
}

/// Which side of the record a conflict lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictField {
  Identifier,
  Fact,
}

/// A field where source and target both hold a current, differing value.
///
/// Emitted exactly when both entities have a value of the same kind and the
/// values differ byte-for-byte; never when only one side has the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConflict {
  pub field:        ConflictField,
  pub kind:         String,
  pub source_value: String,
  pub target_value: String,
}

/// Result of [`crate::store::GraphStore::preview_merge`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePreview {
  pub source:    EntityMergeData,
  pub target:    EntityMergeData,
  pub conflicts: Vec<MergeConflict>,
}

// ─── Execution ───────────────────────────────────────────────────────────────

/// How a single conflicting field is resolved during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
  /// The target keeps its value; the source value is not carried over.
  KeepTarget,
  /// The source value wins. For facts the target's value is historicized;
  /// for identifiers the target's value is deleted.
  KeepSource,
  /// Keep both values. Representable for facts only (the old value becomes
  /// history); for identifiers the uniqueness invariant forbids it and it is
  /// executed as [`Resolution::KeepTarget`].
  KeepBoth,
}

/// A caller decision for one conflicting `(field, kind)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldResolution {
  pub field:      ConflictField,
  pub kind:       String,
  pub resolution: Resolution,
}

/// Input to [`crate::store::GraphStore::merge_entities`].
#[derive(Debug, Clone)]
pub struct MergeRequest {
  pub source_id:      Uuid,
  pub target_id:      Uuid,
  /// Source identifiers to carry over to the target.
  pub identifier_ids: Vec<Uuid>,
  /// Source facts to carry over to the target.
  pub fact_ids:       Vec<Uuid>,
  pub resolutions:    Vec<FieldResolution>,
}

impl MergeRequest {
  /// Look up the caller's decision for a conflicting field.
  ///
  /// A conflict with no supplied resolution defaults to `KeepTarget`: the
  /// target keeps what it has and nothing is destroyed.
  pub fn resolution_for(&self, field: ConflictField, kind: &str) -> Resolution {
    self
      .resolutions
      .iter()
      .find(|r| r.field == field && r.kind == kind)
      .map(|r| r.resolution)
      .unwrap_or(Resolution::KeepTarget)
  }
}

/// What a completed merge actually did.
///
/// The moved counts exclude anything skipped by a `keep_target` resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
  pub merged_entity_id:  Uuid,
  pub identifiers_moved: u32,
  pub facts_moved:       u32,
}

// ─── Pure helpers ────────────────────────────────────────────────────────────

/// Normalize a display name or username for comparison: lowercase, keep only
/// alphanumeric characters. Drops `@`, punctuation, and whitespace, so
/// `"@Jane_Doe"` and `"Jane Doe"` both normalize to `"janedoe"`.
pub fn normalize_name(raw: &str) -> String {
  raw
    .chars()
    .filter(|c| c.is_alphanumeric())
    .flat_map(char::to_lowercase)
    .collect()
}

/// If `name` is an orphan placeholder (`"Telegram <digits>"`), return the
/// digit suffix; otherwise `None`.
pub fn orphan_name_suffix(name: &str) -> Option<&str> {
  let suffix = name.strip_prefix(ORPHAN_NAME_PREFIX)?;
  if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
    Some(suffix)
  } else {
    None
  }
}

/// Compute the field-level conflicts between two entities' merge data.
///
/// Identifiers conflict per kind; facts conflict per kind over the most
/// recently recorded current fact on each side.
pub fn conflicts_between(
  source: &EntityMergeData,
  target: &EntityMergeData,
) -> Vec<MergeConflict> {
  let mut conflicts = Vec::new();

  for src_id in &source.identifiers {
    let Some(tgt_id) = target.identifiers.iter().find(|i| i.kind == src_id.kind)
    else {
      continue;
    };
    if src_id.value != tgt_id.value {
      conflicts.push(MergeConflict {
        field:        ConflictField::Identifier,
        kind:         src_id.kind.as_str().to_owned(),
        source_value: src_id.value.clone(),
        target_value: tgt_id.value.clone(),
      });
    }
  }

  for src_fact in latest_per_kind(&source.current_facts) {
    let Some(tgt_fact) = latest_per_kind(&target.current_facts)
      .into_iter()
      .find(|f| f.kind == src_fact.kind)
    else {
      continue;
    };
    if src_fact.value != tgt_fact.value {
      conflicts.push(MergeConflict {
        field:        ConflictField::Fact,
        kind:         src_fact.kind.clone(),
        source_value: src_fact.value.clone(),
        target_value: tgt_fact.value.clone(),
      });
    }
  }

  conflicts
}

/// The most recently recorded fact of each kind.
fn latest_per_kind(facts: &[Fact]) -> Vec<&Fact> {
  let mut latest: Vec<&Fact> = Vec::new();
  for fact in facts {
    match latest.iter_mut().find(|f| f.kind == fact.kind) {
      Some(slot) if slot.recorded_at < fact.recorded_at => *slot = fact,
      Some(_) => {}
      None => latest.push(fact),
    }
  }
  latest
}
