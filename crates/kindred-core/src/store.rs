//! The `GraphStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `kindred-store-sqlite`).
//! Higher layers (`kindred-api`) depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  dedupe::{DuplicateReport, MergeOutcome, MergePreview, MergeRequest},
  entity::{Entity, EntityKind, NewEntity},
  fact::{Fact, NewFact},
  identifier::{Identifier, NewIdentifier},
};

/// Abstraction over a kindred knowledge-graph backend.
///
/// Reads (detection, preview) are side-effect-free; the only mutating
/// operations are `dismiss_suggestion` and `merge_entities`, and the latter
/// must run as a single atomic transaction.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Create and persist a new entity.
  fn add_entity(
    &self,
    input: NewEntity,
  ) -> impl Future<Output = Result<Entity, Self::Error>> + Send + '_;

  /// Retrieve an entity by id, live or retired. Returns `None` if no row
  /// exists at all.
  fn get_entity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + '_;

  /// List live entities, optionally filtered by kind.
  fn list_entities(
    &self,
    kind: Option<EntityKind>,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + '_;

  // ── Identifiers ───────────────────────────────────────────────────────

  /// Bind an external identifier to an entity.
  ///
  /// Fails if the entity already owns an identifier of the same kind — one
  /// current identifier per kind per entity is an invariant, not a default.
  fn bind_identifier(
    &self,
    input: NewIdentifier,
  ) -> impl Future<Output = Result<Identifier, Self::Error>> + Send + '_;

  /// All identifiers currently bound to an entity.
  fn identifiers_for(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Identifier>, Self::Error>> + Send + '_;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Record a new current fact. `recorded_at` is set by the store.
  fn record_fact(
    &self,
    input: NewFact,
  ) -> impl Future<Output = Result<Fact, Self::Error>> + Send + '_;

  /// All current facts for an entity, newest first.
  fn current_facts(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + '_;

  /// Every fact ever recorded for an entity, current and historical,
  /// newest first. Merges historicize facts rather than deleting them, so
  /// superseded values stay reachable here.
  fn fact_history(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + '_;

  // ── Dedupe engine ─────────────────────────────────────────────────────

  /// Run both detection strategies and return a page of candidate groups.
  ///
  /// Pagination applies to distinct primary entities. Given an unchanged
  /// store, repeated calls return the same groups in the same grouping.
  fn detect_duplicates(
    &self,
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<DuplicateReport, Self::Error>> + Send + '_;

  /// Permanently stop suggesting `candidate_id` as a duplicate of
  /// `primary_id`. Idempotent: dismissing an already-dismissed pair is a
  /// no-op, not an error.
  fn dismiss_suggestion<'a>(
    &'a self,
    primary_id: Uuid,
    candidate_id: Uuid,
    dismissed_by: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Whether the pair is already in the dismissal ledger.
  fn is_dismissed(
    &self,
    primary_id: Uuid,
    candidate_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Load both entities' comparable attributes and the conflicts a reviewer
  /// must resolve before merging.
  fn preview_merge(
    &self,
    source_id: Uuid,
    target_id: Uuid,
  ) -> impl Future<Output = Result<MergePreview, Self::Error>> + Send + '_;

  /// Consolidate the source entity into the target as one atomic
  /// transaction and soft-delete the source.
  ///
  /// On any failure the transaction rolls back; nothing partial is ever
  /// visible to readers.
  fn merge_entities(
    &self,
    request: MergeRequest,
  ) -> impl Future<Output = Result<MergeOutcome, Self::Error>> + Send + '_;
}
