//! Merge preview and execution.
//!
//! The previewer is read-only: it loads both sides' comparable attributes and
//! computes field-level conflicts. The executor consolidates the source
//! entity into the target inside one SQL transaction — identifiers and facts
//! move under the caller's per-field resolutions, every dependent relation is
//! rewritten, and the source is soft-deleted. Any failure rolls the whole
//! transaction back; readers never observe a partial merge.

use chrono::Utc;
use kindred_core::{
  dedupe::{
    ConflictField, EntityMergeData, MergeOutcome, MergePreview, MergeRequest,
    Resolution, conflicts_between,
  },
  entity::Entity,
  fact::Fact,
  identifier::Identifier,
};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawEntity, RawFact, RawIdentifier, encode_dt, encode_uuid},
};

// ─── Dependent relations ─────────────────────────────────────────────────────

/// A table outside this engine's ownership that references entities.
///
/// The set is an explicit, ordered list rather than anything derived from
/// schema metadata: each relation needs its own conflict policy, and the
/// executor must stay auditable per relation.
pub(crate) struct DependentRelation {
  pub table:          &'static str,
  /// Columns in `table` that hold entity ids.
  pub entity_columns: &'static [&'static str],
  /// Non-entity columns of a UNIQUE key that covers the entity column.
  /// When set, rows the target already holds under the same key are deleted
  /// from the source before the move; plain-move tables leave this `None`
  /// because duplicate references there are harmless.
  pub dedupe_key:     Option<&'static [&'static str]>,
}

pub(crate) const DEPENDENT_RELATIONS: &[DependentRelation] = &[
  DependentRelation {
    table:          "interaction_participants",
    entity_columns: &["entity_id"],
    dedupe_key:     Some(&["interaction_id"]),
  },
  DependentRelation {
    table:          "relation_members",
    entity_columns: &["entity_id"],
    dedupe_key:     Some(&["relation_id", "role"]),
  },
  DependentRelation {
    table:          "group_members",
    entity_columns: &["entity_id"],
    dedupe_key:     Some(&["group_id"]),
  },
  DependentRelation {
    table:          "messages",
    entity_columns: &["sender_entity_id", "recipient_entity_id"],
    dedupe_key:     None,
  },
  DependentRelation {
    table:          "activities",
    entity_columns: &["owner_entity_id", "client_entity_id"],
    dedupe_key:     None,
  },
  DependentRelation {
    table:          "commitments",
    entity_columns: &["from_entity_id", "to_entity_id"],
    dedupe_key:     None,
  },
  DependentRelation {
    table:          "entity_events",
    entity_columns: &["subject_entity_id", "related_entity_id"],
    dedupe_key:     None,
  },
  DependentRelation {
    table:          "transcript_speakers",
    entity_columns: &["entity_id"],
    dedupe_key:     None,
  },
  DependentRelation {
    table:          "pending_entity_resolutions",
    entity_columns: &["entity_id"],
    dedupe_key:     None,
  },
];

// ─── Shared loaders ──────────────────────────────────────────────────────────

/// Fetch an entity row, requiring it to exist and to be live.
pub(crate) fn load_live_entity(conn: &Connection, id: Uuid) -> Result<Entity> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {} FROM entities WHERE entity_id = ?1",
        RawEntity::COLUMNS
      ),
      [encode_uuid(id)],
      RawEntity::from_row,
    )
    .optional()?;

  let entity = raw.ok_or(Error::EntityNotFound(id))?.into_entity()?;
  if !entity.is_live() {
    return Err(Error::EntityRetired(id));
  }
  Ok(entity)
}

pub(crate) fn identifiers_of(
  conn: &Connection,
  entity_id: Uuid,
) -> Result<Vec<Identifier>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM identifiers WHERE entity_id = ?1 ORDER BY kind",
    RawIdentifier::COLUMNS
  ))?;
  let raws: Vec<RawIdentifier> = stmt
    .query_map([encode_uuid(entity_id)], RawIdentifier::from_row)?
    .collect::<rusqlite::Result<_>>()?;

  raws.into_iter().map(RawIdentifier::into_identifier).collect()
}

pub(crate) fn current_facts_of(
  conn: &Connection,
  entity_id: Uuid,
) -> Result<Vec<Fact>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM facts
     WHERE entity_id = ?1 AND valid_until IS NULL
     ORDER BY recorded_at DESC",
    RawFact::COLUMNS
  ))?;
  let raws: Vec<RawFact> = stmt
    .query_map([encode_uuid(entity_id)], RawFact::from_row)?
    .collect::<rusqlite::Result<_>>()?;

  raws.into_iter().map(RawFact::into_fact).collect()
}

pub(crate) fn fact_history_of(
  conn: &Connection,
  entity_id: Uuid,
) -> Result<Vec<Fact>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM facts WHERE entity_id = ?1 ORDER BY recorded_at DESC",
    RawFact::COLUMNS
  ))?;
  let raws: Vec<RawFact> = stmt
    .query_map([encode_uuid(entity_id)], RawFact::from_row)?
    .collect::<rusqlite::Result<_>>()?;

  raws.into_iter().map(RawFact::into_fact).collect()
}

pub(crate) fn message_count_of(
  conn: &Connection,
  entity_id: Uuid,
) -> Result<i64> {
  let id = encode_uuid(entity_id);
  Ok(conn.query_row(
    "SELECT COUNT(*) FROM messages
     WHERE sender_entity_id = ?1 OR recipient_entity_id = ?1",
    [id],
    |row| row.get(0),
  )?)
}

fn relation_count_of(conn: &Connection, entity_id: Uuid) -> Result<i64> {
  Ok(conn.query_row(
    "SELECT COUNT(*) FROM relation_members WHERE entity_id = ?1",
    [encode_uuid(entity_id)],
    |row| row.get(0),
  )?)
}

fn load_merge_data(conn: &Connection, id: Uuid) -> Result<EntityMergeData> {
  let entity = load_live_entity(conn, id)?;
  Ok(EntityMergeData {
    identifiers:    identifiers_of(conn, id)?,
    current_facts:  current_facts_of(conn, id)?,
    message_count:  message_count_of(conn, id)?,
    relation_count: relation_count_of(conn, id)?,
    entity,
  })
}

// ─── Preview ─────────────────────────────────────────────────────────────────

pub(crate) fn preview(
  conn: &Connection,
  source_id: Uuid,
  target_id: Uuid,
) -> Result<MergePreview> {
  let source = load_merge_data(conn, source_id)?;
  let target = load_merge_data(conn, target_id)?;
  let conflicts = conflicts_between(&source, &target);
  Ok(MergePreview { source, target, conflicts })
}

// ─── Execution ───────────────────────────────────────────────────────────────

/// Execute a merge inside one transaction.
///
/// The caller has already verified the preconditions (both entities live,
/// `source != target`). Errors after this point — SQL failures or a requested
/// row that vanished — abort the transaction: dropping the uncommitted `tx`
/// rolls everything back.
pub(crate) fn merge(
  conn: &mut Connection,
  req: &MergeRequest,
) -> Result<MergeOutcome> {
  let tx = conn.transaction()?;

  let now_str = encode_dt(Utc::now());
  let source = encode_uuid(req.source_id);
  let target = encode_uuid(req.target_id);

  // 1. Identifiers. The one-per-kind invariant means a conflict can only be
  //    resolved by discarding one side, never by keeping both.
  let mut identifiers_moved = 0u32;
  for &identifier_id in &req.identifier_ids {
    let id_str = encode_uuid(identifier_id);
    let row: Option<(String, String)> = tx
      .query_row(
        "SELECT entity_id, kind FROM identifiers WHERE identifier_id = ?1",
        [&id_str],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    let Some((owner, kind)) = row else {
      return Err(kindred_core::Error::IdentifierNotFound(identifier_id).into());
    };
    if owner != source {
      return Err(kindred_core::Error::IdentifierNotFound(identifier_id).into());
    }

    let existing: Option<String> = tx
      .query_row(
        "SELECT identifier_id FROM identifiers
         WHERE entity_id = ?1 AND kind = ?2",
        params![target, kind],
        |row| row.get(0),
      )
      .optional()?;

    match existing {
      None => {
        tx.execute(
          "UPDATE identifiers SET entity_id = ?1 WHERE identifier_id = ?2",
          params![target, id_str],
        )?;
        identifiers_moved += 1;
      }
      // keep_both is unrepresentable for identifiers; it degrades to
      // keep_target and the source value is discarded with the source.
      Some(_) if req.resolution_for(ConflictField::Identifier, &kind)
        != Resolution::KeepSource => {}
      Some(conflicting) => {
        tx.execute(
          "DELETE FROM identifiers WHERE identifier_id = ?1",
          [&conflicting],
        )?;
        tx.execute(
          "UPDATE identifiers SET entity_id = ?1 WHERE identifier_id = ?2",
          params![target, id_str],
        )?;
        identifiers_moved += 1;
      }
    }
  }

  // 2. Facts. keep_source and keep_both behave identically here: the
  //    target's current value becomes history, the source value becomes
  //    current. History is never destroyed either way.
  let mut facts_moved = 0u32;
  for &fact_id in &req.fact_ids {
    let id_str = encode_uuid(fact_id);
    let row: Option<(String, String, Option<String>)> = tx
      .query_row(
        "SELECT entity_id, kind, valid_until FROM facts WHERE fact_id = ?1",
        [&id_str],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()?;

    let Some((owner, kind, valid_until)) = row else {
      return Err(kindred_core::Error::FactNotFound(fact_id).into());
    };
    if owner != source {
      return Err(kindred_core::Error::FactNotFound(fact_id).into());
    }

    // Historical source facts move without conflict handling — they stay
    // historical on the target.
    if valid_until.is_none() {
      let target_current: i64 = tx.query_row(
        "SELECT COUNT(*) FROM facts
         WHERE entity_id = ?1 AND kind = ?2 AND valid_until IS NULL",
        params![target, kind],
        |row| row.get(0),
      )?;

      if target_current > 0 {
        match req.resolution_for(ConflictField::Fact, &kind) {
          Resolution::KeepTarget => continue,
          Resolution::KeepSource | Resolution::KeepBoth => {
            tx.execute(
              "UPDATE facts SET valid_until = ?1
               WHERE entity_id = ?2 AND kind = ?3 AND valid_until IS NULL",
              params![now_str, target, kind],
            )?;
          }
        }
      }
    }

    tx.execute(
      "UPDATE facts SET entity_id = ?1 WHERE fact_id = ?2",
      params![target, id_str],
    )?;
    facts_moved += 1;
  }

  // 3–4. Rewrite every dependent relation. Uniquely-keyed relations drop the
  //      source's rows where the target already holds the equivalent row,
  //      then everything remaining is re-pointed.
  for rel in DEPENDENT_RELATIONS {
    if let Some(keys) = rel.dedupe_key {
      let col = rel.entity_columns[0];
      let correlated = keys
        .iter()
        .map(|k| format!("t.{k} = {table}.{k}", table = rel.table))
        .collect::<Vec<_>>()
        .join(" AND ");
      tx.execute(
        &format!(
          "DELETE FROM {table} WHERE {col} = ?1 AND EXISTS (
             SELECT 1 FROM {table} t WHERE t.{col} = ?2 AND {correlated}
           )",
          table = rel.table,
        ),
        params![source, target],
      )?;
    }
    for col in rel.entity_columns {
      tx.execute(
        &format!(
          "UPDATE {table} SET {col} = ?1 WHERE {col} = ?2",
          table = rel.table,
        ),
        params![target, source],
      )?;
    }
  }

  // 5. Dismissals naming a retired entity are meaningless.
  tx.execute(
    "DELETE FROM merge_dismissals
     WHERE primary_entity_id = ?1 OR dismissed_entity_id = ?1",
    [&source],
  )?;

  // 6. The relationship profile is a derived cache; it will be recomputed
  //    against the target lazily.
  tx.execute(
    "DELETE FROM relationship_profiles WHERE entity_id = ?1",
    [&source],
  )?;

  // 7. Retire the source. The row stays so historical references resolve.
  tx.execute(
    "UPDATE entities SET deleted_at = ?1 WHERE entity_id = ?2",
    params![now_str, source],
  )?;

  tx.commit()?;

  Ok(MergeOutcome {
    merged_entity_id: req.target_id,
    identifiers_moved,
    facts_moved,
  })
}
