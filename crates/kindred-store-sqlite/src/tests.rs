//! Integration tests for `SqliteStore` against an in-memory database.

use kindred_core::{
  dedupe::{ConflictField, FieldResolution, MatchReason, MergeRequest, Resolution},
  entity::{Entity, EntityKind, NewEntity},
  fact::{Fact, NewFact},
  identifier::{Identifier, IdentifierKind, NewIdentifier},
  store::GraphStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn person(s: &SqliteStore, name: &str) -> Entity {
  s.add_entity(NewEntity::new(name, EntityKind::Person))
    .await
    .unwrap()
}

async fn bind(
  s: &SqliteStore,
  entity_id: Uuid,
  kind: IdentifierKind,
  value: &str,
) -> Identifier {
  s.bind_identifier(NewIdentifier::new(entity_id, kind, value))
    .await
    .unwrap()
}

async fn fact(s: &SqliteStore, entity_id: Uuid, kind: &str, value: &str) -> Fact {
  s.record_fact(NewFact::new(entity_id, kind, value))
    .await
    .unwrap()
}

fn merge_request(source: &Entity, target: &Entity) -> MergeRequest {
  MergeRequest {
    source_id:      source.entity_id,
    target_id:      target.entity_id,
    identifier_ids: Vec::new(),
    fact_ids:       Vec::new(),
    resolutions:    Vec::new(),
  }
}

fn resolve(field: ConflictField, kind: &str, resolution: Resolution) -> FieldResolution {
  FieldResolution { field, kind: kind.to_owned(), resolution }
}

async fn dismissal_rows(s: &SqliteStore) -> i64 {
  s.conn
    .call(|conn| {
      Ok(conn.query_row(
        "SELECT COUNT(*) FROM merge_dismissals",
        [],
        |row| row.get(0),
      )?)
    })
    .await
    .unwrap()
}

// ─── Entities ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_entity() {
  let s = store().await;

  let entity = person(&s, "Ana Ivanova").await;
  assert_eq!(entity.kind, EntityKind::Person);
  assert!(entity.is_live());

  let fetched = s.get_entity(entity.entity_id).await.unwrap().unwrap();
  assert_eq!(fetched.entity_id, entity.entity_id);
  assert_eq!(fetched.name, "Ana Ivanova");
}

#[tokio::test]
async fn get_entity_missing_returns_none() {
  let s = store().await;
  assert!(s.get_entity(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_entities_filtered_by_kind() {
  let s = store().await;
  person(&s, "Ana").await;
  s.add_entity(NewEntity::new("Acme GmbH", EntityKind::Organization))
    .await
    .unwrap();
  person(&s, "Boris").await;

  let all = s.list_entities(None).await.unwrap();
  assert_eq!(all.len(), 3);

  let people = s.list_entities(Some(EntityKind::Person)).await.unwrap();
  assert_eq!(people.len(), 2);
  assert!(people.iter().all(|e| e.kind == EntityKind::Person));
}

// ─── Identifiers ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn bind_identifier_and_list() {
  let s = store().await;
  let ana = person(&s, "Ana").await;

  bind(&s, ana.entity_id, IdentifierKind::TelegramId, "555").await;
  bind(&s, ana.entity_id, IdentifierKind::Phone, "+49301234").await;

  let ids = s.identifiers_for(ana.entity_id).await.unwrap();
  assert_eq!(ids.len(), 2);
  assert!(ids.iter().all(|i| i.entity_id == ana.entity_id));
}

#[tokio::test]
async fn second_identifier_of_same_kind_rejected() {
  let s = store().await;
  let ana = person(&s, "Ana").await;
  bind(&s, ana.entity_id, IdentifierKind::TelegramId, "555").await;

  let err = s
    .bind_identifier(NewIdentifier::new(
      ana.entity_id,
      IdentifierKind::TelegramId,
      "556",
    ))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateIdentifierKind { .. }));
}

// ─── Facts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_fact_and_list_current() {
  let s = store().await;
  let ana = person(&s, "Ana").await;

  fact(&s, ana.entity_id, "company", "Acme").await;
  fact(&s, ana.entity_id, "city", "Berlin").await;

  let current = s.current_facts(ana.entity_id).await.unwrap();
  assert_eq!(current.len(), 2);
  assert!(current.iter().all(Fact::is_current));
}

// ─── Detection: orphan identifier strategy ───────────────────────────────────

#[tokio::test]
async fn orphan_identifier_detection() {
  let s = store().await;

  let ana = person(&s, "Ana Ivanova").await;
  bind(&s, ana.entity_id, IdentifierKind::TelegramId, "555").await;
  let orphan = person(&s, "Telegram 555").await;

  let report = s.detect_duplicates(50, 0).await.unwrap();
  assert_eq!(report.total, 1);
  assert_eq!(report.groups.len(), 1);

  let group = &report.groups[0];
  assert_eq!(group.primary.entity.entity_id, ana.entity_id);
  assert_eq!(group.primary.identifiers.len(), 1);
  assert_eq!(group.reason, MatchReason::OrphanedTelegramId);
  assert_eq!(group.candidates.len(), 1);
  assert_eq!(group.candidates[0].entity_id, orphan.entity_id);
  assert_eq!(group.candidates[0].matched_value, "555");
}

#[tokio::test]
async fn orphan_detection_skips_entities_owning_their_id() {
  let s = store().await;

  // The placeholder name is stale, but the entity owns its own telegram_id;
  // nothing to merge.
  let holder = person(&s, "Telegram 555").await;
  bind(&s, holder.entity_id, IdentifierKind::TelegramId, "555").await;

  let report = s.detect_duplicates(50, 0).await.unwrap();
  assert_eq!(report.total, 0);
  assert!(report.groups.is_empty());
}

#[tokio::test]
async fn orphan_detection_ignores_non_numeric_suffix() {
  let s = store().await;

  let ana = person(&s, "Ana").await;
  bind(&s, ana.entity_id, IdentifierKind::TelegramId, "555x").await;
  person(&s, "Telegram 555x").await;

  let report = s.detect_duplicates(50, 0).await.unwrap();
  assert_eq!(report.total, 0);
}

// ─── Detection: shared identifier strategy ───────────────────────────────────

#[tokio::test]
async fn shared_identifier_detection() {
  let s = store().await;

  let jane = person(&s, "Jane").await;
  bind(&s, jane.entity_id, IdentifierKind::TelegramUsername, "Jane_Doe").await;
  let dup = person(&s, "Jane Doe").await;

  let report = s.detect_duplicates(50, 0).await.unwrap();
  assert_eq!(report.total, 1);

  let group = &report.groups[0];
  assert_eq!(group.primary.entity.entity_id, jane.entity_id);
  assert_eq!(group.reason, MatchReason::SharedIdentifier);
  assert_eq!(group.candidates.len(), 1);
  assert_eq!(group.candidates[0].entity_id, dup.entity_id);
  assert_eq!(group.candidates[0].matched_value, "Jane_Doe");
}

#[tokio::test]
async fn shared_identifier_requires_minimum_name_length() {
  let s = store().await;

  let ann = person(&s, "Ann Lee").await;
  bind(&s, ann.entity_id, IdentifierKind::TelegramUsername, "ana").await;
  person(&s, "Ana").await; // normalizes to "ana" — too short to trust

  let report = s.detect_duplicates(50, 0).await.unwrap();
  assert_eq!(report.total, 0);
}

// ─── Detection: grouping, pagination, ledger ─────────────────────────────────

#[tokio::test]
async fn detection_merges_strategies_for_same_primary() {
  let s = store().await;

  let bob = person(&s, "Bob").await;
  bind(&s, bob.entity_id, IdentifierKind::TelegramId, "777").await;
  bind(&s, bob.entity_id, IdentifierKind::TelegramUsername, "BobSmith").await;
  let orphan = person(&s, "Telegram 777").await;
  let named = person(&s, "Bob Smith").await;

  let report = s.detect_duplicates(50, 0).await.unwrap();
  assert_eq!(report.total, 1);

  let group = &report.groups[0];
  assert_eq!(group.primary.entity.entity_id, bob.entity_id);
  // Orphan strategy runs first; its reason tags the combined group.
  assert_eq!(group.reason, MatchReason::OrphanedTelegramId);

  let mut found: Vec<Uuid> =
    group.candidates.iter().map(|c| c.entity_id).collect();
  found.sort();
  let mut expected = vec![orphan.entity_id, named.entity_id];
  expected.sort();
  assert_eq!(found, expected);
}

#[tokio::test]
async fn detection_paginates_on_distinct_primaries() {
  let s = store().await;

  for value in ["111", "222", "333"] {
    let primary = person(&s, &format!("Primary {value}")).await;
    bind(&s, primary.entity_id, IdentifierKind::TelegramId, value).await;
    person(&s, &format!("Telegram {value}")).await;
  }

  let page = s.detect_duplicates(2, 0).await.unwrap();
  assert_eq!(page.total, 3);
  assert_eq!(page.groups.len(), 2);

  let rest = s.detect_duplicates(2, 2).await.unwrap();
  assert_eq!(rest.total, 3);
  assert_eq!(rest.groups.len(), 1);
}

#[tokio::test]
async fn detection_is_deterministic() {
  let s = store().await;

  for value in ["111", "222"] {
    let primary = person(&s, &format!("Primary {value}")).await;
    bind(&s, primary.entity_id, IdentifierKind::TelegramId, value).await;
    person(&s, &format!("Telegram {value}")).await;
  }

  let snapshot = |report: kindred_core::dedupe::DuplicateReport| {
    report
      .groups
      .into_iter()
      .map(|g| {
        let mut candidates: Vec<Uuid> =
          g.candidates.iter().map(|c| c.entity_id).collect();
        candidates.sort();
        (g.primary.entity.entity_id, candidates, g.reason)
      })
      .collect::<Vec<_>>()
  };

  let first = snapshot(s.detect_duplicates(50, 0).await.unwrap());
  let second = snapshot(s.detect_duplicates(50, 0).await.unwrap());
  assert_eq!(first, second);
}

#[tokio::test]
async fn detection_excludes_dismissed_pairs() {
  let s = store().await;

  let ana = person(&s, "Ana").await;
  bind(&s, ana.entity_id, IdentifierKind::TelegramId, "555").await;
  let orphan = person(&s, "Telegram 555").await;

  assert_eq!(s.detect_duplicates(50, 0).await.unwrap().total, 1);

  s.dismiss_suggestion(ana.entity_id, orphan.entity_id, "reviewer")
    .await
    .unwrap();

  let report = s.detect_duplicates(50, 0).await.unwrap();
  assert_eq!(report.total, 0);
  assert!(report.groups.is_empty());
}

#[tokio::test]
async fn detection_reports_message_counts() {
  let s = store().await;

  let ana = person(&s, "Ana").await;
  bind(&s, ana.entity_id, IdentifierKind::TelegramId, "555").await;
  let orphan = person(&s, "Telegram 555").await;
  let other = person(&s, "Boris").await;

  s.record_message(orphan.entity_id, other.entity_id, "hi").await.unwrap();
  s.record_message(other.entity_id, orphan.entity_id, "hey").await.unwrap();

  let report = s.detect_duplicates(50, 0).await.unwrap();
  let group = &report.groups[0];
  assert_eq!(group.primary.message_count, 0);
  assert_eq!(group.candidates[0].message_count, 2);
}

// ─── Suggestion ledger ───────────────────────────────────────────────────────

#[tokio::test]
async fn dismiss_is_idempotent() {
  let s = store().await;
  let a = person(&s, "Ana").await;
  let b = person(&s, "Telegram 555").await;

  s.dismiss_suggestion(a.entity_id, b.entity_id, "reviewer").await.unwrap();
  s.dismiss_suggestion(a.entity_id, b.entity_id, "reviewer").await.unwrap();

  assert_eq!(dismissal_rows(&s).await, 1);
  assert!(s.is_dismissed(a.entity_id, b.entity_id).await.unwrap());
}

#[tokio::test]
async fn dismiss_is_directional() {
  let s = store().await;
  let a = person(&s, "Ana").await;
  let b = person(&s, "Telegram 555").await;

  s.dismiss_suggestion(a.entity_id, b.entity_id, "reviewer").await.unwrap();

  assert!(s.is_dismissed(a.entity_id, b.entity_id).await.unwrap());
  assert!(!s.is_dismissed(b.entity_id, a.entity_id).await.unwrap());
}

#[tokio::test]
async fn dismiss_unknown_entity_errors() {
  let s = store().await;
  let a = person(&s, "Ana").await;

  let err = s
    .dismiss_suggestion(a.entity_id, Uuid::new_v4(), "reviewer")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EntityNotFound(_)));
}

// ─── Merge preview ───────────────────────────────────────────────────────────

#[tokio::test]
async fn preview_reports_fact_conflict() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  fact(&s, a.entity_id, "company", "Acme").await;
  let b = person(&s, "Ana I.").await;
  fact(&s, b.entity_id, "company", "Acme Corp").await;

  let preview = s.preview_merge(b.entity_id, a.entity_id).await.unwrap();
  assert_eq!(preview.conflicts.len(), 1);

  let conflict = &preview.conflicts[0];
  assert_eq!(conflict.field, ConflictField::Fact);
  assert_eq!(conflict.kind, "company");
  assert_eq!(conflict.source_value, "Acme Corp");
  assert_eq!(conflict.target_value, "Acme");
}

#[tokio::test]
async fn preview_reports_identifier_conflict() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  bind(&s, a.entity_id, IdentifierKind::Phone, "+491111").await;
  let b = person(&s, "Ana I.").await;
  bind(&s, b.entity_id, IdentifierKind::Phone, "+492222").await;

  let preview = s.preview_merge(b.entity_id, a.entity_id).await.unwrap();
  assert_eq!(preview.conflicts.len(), 1);

  let conflict = &preview.conflicts[0];
  assert_eq!(conflict.field, ConflictField::Identifier);
  assert_eq!(conflict.kind, "phone");
  assert_eq!(conflict.source_value, "+492222");
  assert_eq!(conflict.target_value, "+491111");
}

#[tokio::test]
async fn preview_silent_when_values_agree_or_one_sided() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  fact(&s, a.entity_id, "role", "engineer").await;
  fact(&s, a.entity_id, "city", "Berlin").await;
  let b = person(&s, "Ana I.").await;
  fact(&s, b.entity_id, "role", "engineer").await; // agrees
  fact(&s, b.entity_id, "team", "infra").await; // only on source

  let preview = s.preview_merge(b.entity_id, a.entity_id).await.unwrap();
  assert!(preview.conflicts.is_empty());
}

#[tokio::test]
async fn preview_conflicts_are_symmetric() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  fact(&s, a.entity_id, "company", "Acme").await;
  bind(&s, a.entity_id, IdentifierKind::Phone, "+491111").await;
  let b = person(&s, "Ana I.").await;
  fact(&s, b.entity_id, "company", "Acme Corp").await;
  bind(&s, b.entity_id, IdentifierKind::Phone, "+492222").await;

  let forward = s.preview_merge(b.entity_id, a.entity_id).await.unwrap();
  let reverse = s.preview_merge(a.entity_id, b.entity_id).await.unwrap();
  assert_eq!(forward.conflicts.len(), reverse.conflicts.len());

  for conflict in &forward.conflicts {
    let mirrored = reverse
      .conflicts
      .iter()
      .find(|c| c.field == conflict.field && c.kind == conflict.kind)
      .unwrap();
    assert_eq!(mirrored.source_value, conflict.target_value);
    assert_eq!(mirrored.target_value, conflict.source_value);
  }
}

#[tokio::test]
async fn preview_includes_counts() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  let b = person(&s, "Ana I.").await;
  s.record_message(a.entity_id, b.entity_id, "hello").await.unwrap();
  s.add_relation_member(Uuid::new_v4(), "advisor", a.entity_id)
    .await
    .unwrap();

  let preview = s.preview_merge(a.entity_id, b.entity_id).await.unwrap();
  assert_eq!(preview.source.message_count, 1);
  assert_eq!(preview.source.relation_count, 1);
  assert_eq!(preview.target.message_count, 1);
  assert_eq!(preview.target.relation_count, 0);
}

#[tokio::test]
async fn preview_missing_entity_errors() {
  let s = store().await;
  let a = person(&s, "Ana").await;

  let err = s.preview_merge(Uuid::new_v4(), a.entity_id).await.unwrap_err();
  assert!(matches!(err, Error::EntityNotFound(_)));
}

// ─── Merge execution ─────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_moves_identifiers_and_facts() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  let b = person(&s, "Telegram 555").await;
  let tg = bind(&s, b.entity_id, IdentifierKind::TelegramId, "555").await;
  let city = fact(&s, b.entity_id, "city", "Berlin").await;

  let mut request = merge_request(&b, &a);
  request.identifier_ids = vec![tg.identifier_id];
  request.fact_ids = vec![city.fact_id];

  let outcome = s.merge_entities(request).await.unwrap();
  assert_eq!(outcome.merged_entity_id, a.entity_id);
  assert_eq!(outcome.identifiers_moved, 1);
  assert_eq!(outcome.facts_moved, 1);

  let ids = s.identifiers_for(a.entity_id).await.unwrap();
  assert_eq!(ids.len(), 1);
  assert_eq!(ids[0].value, "555");

  let facts = s.current_facts(a.entity_id).await.unwrap();
  assert_eq!(facts.len(), 1);
  assert_eq!(facts[0].value, "Berlin");

  // The source is retired, not deleted.
  let b_after = s.get_entity(b.entity_id).await.unwrap().unwrap();
  assert!(!b_after.is_live());
  assert_eq!(s.list_entities(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn merge_into_itself_is_rejected() {
  let s = store().await;
  let a = person(&s, "Ana").await;

  let err = s.merge_entities(merge_request(&a, &a)).await.unwrap_err();
  assert!(matches!(err, Error::SelfMerge));
}

#[tokio::test]
async fn merge_unknown_source_errors() {
  let s = store().await;
  let a = person(&s, "Ana").await;
  let ghost = Entity { entity_id: Uuid::new_v4(), ..a.clone() };

  let err = s.merge_entities(merge_request(&ghost, &a)).await.unwrap_err();
  assert!(matches!(err, Error::EntityNotFound(_)));
}

#[tokio::test]
async fn merging_an_already_merged_source_errors() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  let b = person(&s, "Telegram 555").await;
  let c = person(&s, "Ana I.").await;

  s.merge_entities(merge_request(&b, &a)).await.unwrap();

  let err = s.merge_entities(merge_request(&b, &c)).await.unwrap_err();
  assert!(matches!(err, Error::EntityRetired(_)));
}

#[tokio::test]
async fn merge_keep_source_fact_historicizes_target() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  fact(&s, a.entity_id, "company", "Acme").await;
  let b = person(&s, "Ana I.").await;
  let company = fact(&s, b.entity_id, "company", "Acme Corp").await;

  let mut request = merge_request(&b, &a);
  request.fact_ids = vec![company.fact_id];
  request.resolutions =
    vec![resolve(ConflictField::Fact, "company", Resolution::KeepSource)];

  let outcome = s.merge_entities(request).await.unwrap();
  assert_eq!(outcome.facts_moved, 1);

  let current = s.current_facts(a.entity_id).await.unwrap();
  assert_eq!(current.len(), 1);
  assert_eq!(current[0].value, "Acme Corp");

  // The displaced value is history, not gone.
  let history = s.fact_history(a.entity_id).await.unwrap();
  assert_eq!(history.len(), 2);
  let old = history.iter().find(|f| f.value == "Acme").unwrap();
  assert!(old.valid_until.is_some());
}

#[tokio::test]
async fn merge_keep_both_fact_behaves_like_keep_source() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  fact(&s, a.entity_id, "company", "Acme").await;
  let b = person(&s, "Ana I.").await;
  let company = fact(&s, b.entity_id, "company", "Acme Corp").await;

  let mut request = merge_request(&b, &a);
  request.fact_ids = vec![company.fact_id];
  request.resolutions =
    vec![resolve(ConflictField::Fact, "company", Resolution::KeepBoth)];

  s.merge_entities(request).await.unwrap();

  let current = s.current_facts(a.entity_id).await.unwrap();
  assert_eq!(current.len(), 1);
  assert_eq!(current[0].value, "Acme Corp");
  assert_eq!(s.fact_history(a.entity_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn merge_keep_target_fact_skips_source() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  fact(&s, a.entity_id, "company", "Acme").await;
  let b = person(&s, "Ana I.").await;
  let company = fact(&s, b.entity_id, "company", "Acme Corp").await;

  let mut request = merge_request(&b, &a);
  request.fact_ids = vec![company.fact_id];
  request.resolutions =
    vec![resolve(ConflictField::Fact, "company", Resolution::KeepTarget)];

  let outcome = s.merge_entities(request).await.unwrap();
  assert_eq!(outcome.facts_moved, 0);

  let current = s.current_facts(a.entity_id).await.unwrap();
  assert_eq!(current.len(), 1);
  assert_eq!(current[0].value, "Acme");

  // The skipped fact stays with the retired source.
  assert_eq!(s.fact_history(b.entity_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn merge_conflicting_fact_defaults_to_keep_target() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  fact(&s, a.entity_id, "company", "Acme").await;
  let b = person(&s, "Ana I.").await;
  let company = fact(&s, b.entity_id, "company", "Acme Corp").await;

  let mut request = merge_request(&b, &a);
  request.fact_ids = vec![company.fact_id];

  let outcome = s.merge_entities(request).await.unwrap();
  assert_eq!(outcome.facts_moved, 0);
  assert_eq!(s.current_facts(a.entity_id).await.unwrap()[0].value, "Acme");
}

#[tokio::test]
async fn merge_keep_source_identifier_replaces_target() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  bind(&s, a.entity_id, IdentifierKind::Phone, "+491111").await;
  let b = person(&s, "Ana I.").await;
  let phone = bind(&s, b.entity_id, IdentifierKind::Phone, "+492222").await;

  let mut request = merge_request(&b, &a);
  request.identifier_ids = vec![phone.identifier_id];
  request.resolutions =
    vec![resolve(ConflictField::Identifier, "phone", Resolution::KeepSource)];

  let outcome = s.merge_entities(request).await.unwrap();
  assert_eq!(outcome.identifiers_moved, 1);

  // Exactly one phone identifier survives — never two of one kind.
  let ids = s.identifiers_for(a.entity_id).await.unwrap();
  assert_eq!(ids.len(), 1);
  assert_eq!(ids[0].kind, IdentifierKind::Phone);
  assert_eq!(ids[0].value, "+492222");
}

#[tokio::test]
async fn merge_keep_both_identifier_degrades_to_keep_target() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  bind(&s, a.entity_id, IdentifierKind::Phone, "+491111").await;
  let b = person(&s, "Ana I.").await;
  let phone = bind(&s, b.entity_id, IdentifierKind::Phone, "+492222").await;

  let mut request = merge_request(&b, &a);
  request.identifier_ids = vec![phone.identifier_id];
  request.resolutions =
    vec![resolve(ConflictField::Identifier, "phone", Resolution::KeepBoth)];

  let outcome = s.merge_entities(request).await.unwrap();
  assert_eq!(outcome.identifiers_moved, 0);

  let ids = s.identifiers_for(a.entity_id).await.unwrap();
  assert_eq!(ids.len(), 1);
  assert_eq!(ids[0].value, "+491111");
}

#[tokio::test]
async fn merge_moves_unconflicted_identifier() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  let b = person(&s, "Ana I.").await;
  let email = bind(&s, b.entity_id, IdentifierKind::Email, "ana@example.com").await;

  let mut request = merge_request(&b, &a);
  request.identifier_ids = vec![email.identifier_id];

  let outcome = s.merge_entities(request).await.unwrap();
  assert_eq!(outcome.identifiers_moved, 1);
  assert_eq!(s.identifiers_for(a.entity_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn merge_rewrites_every_dependent_relation() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  let b = person(&s, "Telegram 555").await;
  let x = person(&s, "Boris").await;

  s.record_message(b.entity_id, x.entity_id, "hi").await.unwrap();
  s.record_message(x.entity_id, b.entity_id, "hey").await.unwrap();
  s.add_interaction_participant(Uuid::new_v4(), b.entity_id).await.unwrap();
  s.add_relation_member(Uuid::new_v4(), "member", b.entity_id).await.unwrap();
  s.add_group_member(Uuid::new_v4(), b.entity_id).await.unwrap();
  s.record_activity(b.entity_id, x.entity_id, "intro call").await.unwrap();
  s.record_commitment(b.entity_id, x.entity_id, "send deck").await.unwrap();
  s.record_entity_event(b.entity_id, Some(x.entity_id), "met").await.unwrap();
  s.record_entity_event(x.entity_id, Some(b.entity_id), "mentioned").await.unwrap();
  s.add_transcript_speaker(Uuid::new_v4(), b.entity_id).await.unwrap();
  s.add_pending_resolution(b.entity_id, "tg:555").await.unwrap();
  s.upsert_relationship_profile(b.entity_id, "{}").await.unwrap();
  s.dismiss_suggestion(a.entity_id, b.entity_id, "reviewer").await.unwrap();

  s.merge_entities(merge_request(&b, &a)).await.unwrap();

  assert_eq!(s.count_references(b.entity_id).await.unwrap(), 0);
  assert!(s.relationship_profile(b.entity_id).await.unwrap().is_none());
  assert!(!s.is_dismissed(a.entity_id, b.entity_id).await.unwrap());

  // 2 messages + interaction + relation + group + activity owner +
  // commitment from + event subject + event related + transcript + pending
  assert_eq!(s.count_references(a.entity_id).await.unwrap(), 11);
}

#[tokio::test]
async fn merge_deduplicates_unique_memberships() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  let b = person(&s, "Ana I.").await;
  let relation = Uuid::new_v4();
  let group = Uuid::new_v4();

  // Shared membership rows that would collide on move…
  s.add_relation_member(relation, "advisor", a.entity_id).await.unwrap();
  s.add_relation_member(relation, "advisor", b.entity_id).await.unwrap();
  s.add_group_member(group, a.entity_id).await.unwrap();
  s.add_group_member(group, b.entity_id).await.unwrap();
  // …and one the target lacks, which must survive the move.
  s.add_relation_member(relation, "client", b.entity_id).await.unwrap();

  s.merge_entities(merge_request(&b, &a)).await.unwrap();

  assert_eq!(s.count_references(b.entity_id).await.unwrap(), 0);
  // advisor + client + group membership
  assert_eq!(s.count_references(a.entity_id).await.unwrap(), 3);
}

#[tokio::test]
async fn failed_merge_leaves_no_trace() {
  let s = store().await;

  let a = person(&s, "Ana").await;
  let b = person(&s, "Ana I.").await;
  let phone = bind(&s, b.entity_id, IdentifierKind::Phone, "+492222").await;
  s.record_message(b.entity_id, a.entity_id, "hi").await.unwrap();

  // The valid identifier is processed (and moved) before the bogus one
  // aborts the transaction; the rollback must undo that move.
  let mut request = merge_request(&b, &a);
  request.identifier_ids = vec![phone.identifier_id, Uuid::new_v4()];

  let err = s.merge_entities(request).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(kindred_core::Error::IdentifierNotFound(_))
  ));

  let b_after = s.get_entity(b.entity_id).await.unwrap().unwrap();
  assert!(b_after.is_live());
  assert!(s.identifiers_for(a.entity_id).await.unwrap().is_empty());
  assert_eq!(s.identifiers_for(b.entity_id).await.unwrap().len(), 1);
  assert_eq!(s.count_references(b.entity_id).await.unwrap(), 1);
}

#[tokio::test]
async fn merged_candidate_is_no_longer_detected() {
  let s = store().await;

  let ana = person(&s, "Ana").await;
  bind(&s, ana.entity_id, IdentifierKind::TelegramId, "555").await;
  let orphan = person(&s, "Telegram 555").await;
  assert_eq!(s.detect_duplicates(50, 0).await.unwrap().total, 1);

  // Nothing to carry over; the orphan had no identifiers or facts.
  let request = merge_request(&orphan, &ana);
  s.merge_entities(request.clone()).await.unwrap();

  assert_eq!(s.detect_duplicates(50, 0).await.unwrap().total, 0);
  // A second attempt at the same merge is a conflict, not a repeat.
  let err = s.merge_entities(request).await.unwrap_err();
  assert!(matches!(err, Error::EntityRetired(_)));
}
