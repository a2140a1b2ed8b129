//! Duplicate-candidate detection.
//!
//! Two independent strategies scan the entity/identifier tables; their rows
//! are merged by primary entity, deduplicated by candidate, and paginated
//! over distinct primaries. Everything here runs on the connection thread
//! inside a single [`tokio_rusqlite`] call, so one detection pass costs one
//! round trip no matter how many groups it returns.
//!
//! Detection is read-only and deterministic: given an unchanged store, two
//! runs produce the same groups in the same grouping (candidate order within
//! a group is not guaranteed).

use std::collections::{BTreeMap, HashMap, HashSet};

use kindred_core::{
  dedupe::{
    CandidateGroup, DuplicateCandidate, DuplicateReport, MatchReason,
    MIN_SHARED_NAME_LEN, ORPHAN_NAME_PREFIX, PrimarySummary, normalize_name,
    orphan_name_suffix,
  },
  entity::Entity,
  identifier::{Identifier, IdentifierKind},
};
use rusqlite::Connection;
use uuid::Uuid;

use crate::{
  Result,
  encode::{RawEntity, RawIdentifier, decode_uuid, encode_uuid},
};

// ─── Strategy trait ──────────────────────────────────────────────────────────

/// One raw match produced by a strategy, before grouping and enrichment.
struct CandidateRow {
  primary_id:    Uuid,
  candidate_id:  Uuid,
  matched_value: String,
  reason:        MatchReason,
}

/// A duplicate-detection heuristic.
///
/// Strategies see the whole live graph and return raw (primary, candidate)
/// rows; grouping, dismissal filtering, and pagination are shared machinery.
/// New heuristics slot in here without touching the merge path.
trait DetectionStrategy {
  fn run(&self, conn: &Connection) -> Result<Vec<CandidateRow>>;
}

// ─── Orphan-identifier strategy ──────────────────────────────────────────────

/// Finds entities named `"Telegram <id>"` — placeholder records the ingestion
/// pipeline creates when it knows nothing but a numeric user id — whose id is
/// already owned, as a real identifier, by some other entity.
struct OrphanIdentifierStrategy;

impl DetectionStrategy for OrphanIdentifierStrategy {
  fn run(&self, conn: &Connection) -> Result<Vec<CandidateRow>> {
    let mut stmt = conn.prepare(
      "SELECT entity_id, name FROM entities
       WHERE deleted_at IS NULL AND name LIKE ?1",
    )?;
    let placeholder_named: Vec<(String, String)> = stmt
      .query_map([format!("{ORPHAN_NAME_PREFIX}%")], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })?
      .collect::<rusqlite::Result<_>>()?;

    // Every live telegram_id binding, fetched once.
    let mut stmt = conn.prepare(
      "SELECT i.entity_id, i.value FROM identifiers i
       JOIN entities e ON e.entity_id = i.entity_id
       WHERE i.kind = ?1 AND e.deleted_at IS NULL",
    )?;
    let bindings: Vec<(String, String)> = stmt
      .query_map([IdentifierKind::TelegramId.as_str()], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })?
      .collect::<rusqlite::Result<_>>()?;

    let mut owner_by_value: HashMap<String, Uuid> = HashMap::new();
    let mut id_owners: HashSet<Uuid> = HashSet::new();
    for (owner, value) in bindings {
      let owner = decode_uuid(&owner)?;
      owner_by_value.insert(value, owner);
      id_owners.insert(owner);
    }

    let mut rows = Vec::new();
    for (candidate_id, name) in placeholder_named {
      let candidate_id = decode_uuid(&candidate_id)?;
      let Some(suffix) = orphan_name_suffix(&name) else { continue };
      // An entity that owns a telegram_id is not an orphan, whatever its name.
      if id_owners.contains(&candidate_id) {
        continue;
      }
      if let Some(&primary_id) = owner_by_value.get(suffix) {
        if primary_id != candidate_id {
          rows.push(CandidateRow {
            primary_id,
            candidate_id,
            matched_value: suffix.to_owned(),
            reason: MatchReason::OrphanedTelegramId,
          });
        }
      }
    }
    Ok(rows)
  }
}

// ─── Shared-identifier strategy ──────────────────────────────────────────────

/// Finds entities whose display name, normalized, equals a username
/// identifier owned by a different entity.
struct SharedIdentifierStrategy;

impl DetectionStrategy for SharedIdentifierStrategy {
  fn run(&self, conn: &Connection) -> Result<Vec<CandidateRow>> {
    let mut stmt = conn.prepare(
      "SELECT entity_id, name FROM entities WHERE deleted_at IS NULL",
    )?;
    let live: Vec<(String, String)> = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
      .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare(
      "SELECT i.entity_id, i.value FROM identifiers i
       JOIN entities e ON e.entity_id = i.entity_id
       WHERE i.kind = ?1 AND e.deleted_at IS NULL",
    )?;
    let handles: Vec<(String, String)> = stmt
      .query_map([IdentifierKind::TelegramUsername.as_str()], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })?
      .collect::<rusqlite::Result<_>>()?;

    // normalized handle -> (owner, raw handle)
    let mut owner_by_handle: HashMap<String, (Uuid, String)> = HashMap::new();
    for (owner, value) in handles {
      let owner = decode_uuid(&owner)?;
      owner_by_handle.insert(normalize_name(&value), (owner, value));
    }

    let mut rows = Vec::new();
    for (candidate_id, name) in live {
      let candidate_id = decode_uuid(&candidate_id)?;
      let normalized = normalize_name(&name);
      if normalized.chars().count() < MIN_SHARED_NAME_LEN {
        continue;
      }
      if let Some((primary_id, raw)) = owner_by_handle.get(&normalized) {
        if *primary_id != candidate_id {
          rows.push(CandidateRow {
            primary_id:    *primary_id,
            candidate_id,
            matched_value: raw.clone(),
            reason:        MatchReason::SharedIdentifier,
          });
        }
      }
    }
    Ok(rows)
  }
}

// ─── Grouping and pagination ─────────────────────────────────────────────────

struct GroupAccum {
  reason:     MatchReason,
  /// (candidate id, matched value); deduplicated on insert.
  candidates: Vec<(Uuid, String)>,
}

/// Run both strategies and assemble a page of enriched candidate groups.
pub(crate) fn detect(
  conn: &Connection,
  limit: usize,
  offset: usize,
) -> Result<DuplicateReport> {
  let strategies: [&dyn DetectionStrategy; 2] =
    [&OrphanIdentifierStrategy, &SharedIdentifierStrategy];

  let dismissed = load_dismissed_pairs(conn)?;

  // BTreeMap keys the grouping by primary id, which also fixes the group
  // order — pagination must be stable across runs on an unchanged store.
  let mut groups: BTreeMap<Uuid, GroupAccum> = BTreeMap::new();
  for strategy in strategies {
    for row in strategy.run(conn)? {
      if dismissed.contains(&(row.primary_id, row.candidate_id)) {
        continue;
      }
      let group = groups.entry(row.primary_id).or_insert_with(|| GroupAccum {
        reason:     row.reason,
        candidates: Vec::new(),
      });
      if group.candidates.iter().any(|(id, _)| *id == row.candidate_id) {
        continue;
      }
      group.candidates.push((row.candidate_id, row.matched_value));
    }
  }

  let total = groups.len();
  let page: Vec<(Uuid, GroupAccum)> =
    groups.into_iter().skip(offset).take(limit).collect();

  if page.is_empty() {
    return Ok(DuplicateReport { groups: Vec::new(), total });
  }

  // Batch enrichment for every entity on the page: one query per concern,
  // regardless of group count.
  let mut involved: Vec<Uuid> = Vec::new();
  for (primary_id, group) in &page {
    involved.push(*primary_id);
    involved.extend(group.candidates.iter().map(|(id, _)| *id));
  }
  let entities = load_entities(conn, &involved)?;
  let mut identifiers = load_identifiers(conn, &involved)?;
  let message_counts = load_message_counts(conn, &involved)?;

  let mut out = Vec::with_capacity(page.len());
  for (primary_id, group) in page {
    let Some(entity) = entities.get(&primary_id).cloned() else { continue };
    let primary = PrimarySummary {
      entity,
      identifiers: identifiers.remove(&primary_id).unwrap_or_default(),
      message_count: message_counts.get(&primary_id).copied().unwrap_or(0),
    };

    let mut candidates = Vec::with_capacity(group.candidates.len());
    for (candidate_id, matched_value) in group.candidates {
      let Some(entity) = entities.get(&candidate_id) else { continue };
      candidates.push(DuplicateCandidate {
        entity_id: candidate_id,
        name: entity.name.clone(),
        matched_value,
        created_at: entity.created_at,
        message_count: message_counts.get(&candidate_id).copied().unwrap_or(0),
      });
    }

    out.push(CandidateGroup { primary, candidates, reason: group.reason });
  }

  Ok(DuplicateReport { groups: out, total })
}

// ─── Batch loads ─────────────────────────────────────────────────────────────

fn load_dismissed_pairs(conn: &Connection) -> Result<HashSet<(Uuid, Uuid)>> {
  let mut stmt = conn.prepare(
    "SELECT primary_entity_id, dismissed_entity_id FROM merge_dismissals",
  )?;
  let raw: Vec<(String, String)> = stmt
    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
    .collect::<rusqlite::Result<_>>()?;

  raw
    .into_iter()
    .map(|(p, d)| Ok((decode_uuid(&p)?, decode_uuid(&d)?)))
    .collect()
}

fn sql_placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

fn load_entities(
  conn: &Connection,
  ids: &[Uuid],
) -> Result<HashMap<Uuid, Entity>> {
  let sql = format!(
    "SELECT {} FROM entities WHERE entity_id IN ({})",
    RawEntity::COLUMNS,
    sql_placeholders(ids.len()),
  );
  let params = ids.iter().map(|id| encode_uuid(*id));

  let mut stmt = conn.prepare(&sql)?;
  let raws: Vec<RawEntity> = stmt
    .query_map(rusqlite::params_from_iter(params), RawEntity::from_row)?
    .collect::<rusqlite::Result<_>>()?;

  let mut map = HashMap::with_capacity(raws.len());
  for raw in raws {
    let entity = raw.into_entity()?;
    map.insert(entity.entity_id, entity);
  }
  Ok(map)
}

fn load_identifiers(
  conn: &Connection,
  ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Identifier>>> {
  let sql = format!(
    "SELECT {} FROM identifiers WHERE entity_id IN ({})",
    RawIdentifier::COLUMNS,
    sql_placeholders(ids.len()),
  );
  let params = ids.iter().map(|id| encode_uuid(*id));

  let mut stmt = conn.prepare(&sql)?;
  let raws: Vec<RawIdentifier> = stmt
    .query_map(rusqlite::params_from_iter(params), RawIdentifier::from_row)?
    .collect::<rusqlite::Result<_>>()?;

  let mut map: HashMap<Uuid, Vec<Identifier>> = HashMap::new();
  for raw in raws {
    let identifier = raw.into_identifier()?;
    map.entry(identifier.entity_id).or_default().push(identifier);
  }
  Ok(map)
}

fn load_message_counts(
  conn: &Connection,
  ids: &[Uuid],
) -> Result<HashMap<Uuid, i64>> {
  let sql = format!(
    "SELECT e, COUNT(*) FROM (
       SELECT sender_entity_id AS e FROM messages
       UNION ALL
       SELECT recipient_entity_id AS e FROM messages
     ) WHERE e IN ({}) GROUP BY e",
    sql_placeholders(ids.len()),
  );
  let params = ids.iter().map(|id| encode_uuid(*id));

  let mut stmt = conn.prepare(&sql)?;
  let raw: Vec<(String, i64)> = stmt
    .query_map(rusqlite::params_from_iter(params), |row| {
      Ok((row.get(0)?, row.get(1)?))
    })?
    .collect::<rusqlite::Result<_>>()?;

  raw
    .into_iter()
    .map(|(id, n)| Ok((decode_uuid(&id)?, n)))
    .collect()
}
