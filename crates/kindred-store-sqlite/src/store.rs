//! [`SqliteStore`] — the SQLite implementation of [`GraphStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::{debug, error, info};
use uuid::Uuid;

use kindred_core::{
  dedupe::{DuplicateReport, MergeOutcome, MergePreview, MergeRequest},
  entity::{Entity, EntityKind, NewEntity},
  fact::{Fact, NewFact},
  identifier::{Identifier, NewIdentifier},
  store::GraphStore,
};

use crate::{
  Error, Result, detect,
  encode::{
    RawEntity, encode_dt, encode_entity_kind, encode_identifier_kind,
    encode_uuid,
  },
  merge,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A kindred knowledge graph backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch an entity and require it to resolve to a live record.
  async fn require_live(&self, id: Uuid) -> Result<Entity> {
    let entity =
      self.get_entity(id).await?.ok_or(Error::EntityNotFound(id))?;
    if !entity.is_live() {
      return Err(Error::EntityRetired(id));
    }
    Ok(entity)
  }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteStore {
  type Error = Error;

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn add_entity(&self, input: NewEntity) -> Result<Entity> {
    let entity = Entity {
      entity_id:  Uuid::new_v4(),
      name:       input.name,
      kind:       input.kind,
      photo_path: input.photo_path,
      created_at: Utc::now(),
      deleted_at: None,
    };

    let id_str    = encode_uuid(entity.entity_id);
    let name      = entity.name.clone();
    let kind_str  = encode_entity_kind(entity.kind).to_owned();
    let photo     = entity.photo_path.clone();
    let at_str    = encode_dt(entity.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO entities (entity_id, name, kind, photo_path, created_at, deleted_at)
           VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
          rusqlite::params![id_str, name, kind_str, photo, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(entity)
  }

  async fn get_entity(&self, id: Uuid) -> Result<Option<Entity>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM entities WHERE entity_id = ?1",
              RawEntity::COLUMNS
            ),
            rusqlite::params![id_str],
            RawEntity::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn list_entities(&self, kind: Option<EntityKind>) -> Result<Vec<Entity>> {
    let kind_str = kind.map(encode_entity_kind).map(str::to_owned);

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(k) = kind_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entities WHERE deleted_at IS NULL AND kind = ?1",
            RawEntity::COLUMNS
          ))?;
          stmt
            .query_map(rusqlite::params![k], RawEntity::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entities WHERE deleted_at IS NULL",
            RawEntity::COLUMNS
          ))?;
          stmt
            .query_map([], RawEntity::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  // ── Identifiers ───────────────────────────────────────────────────────────

  async fn bind_identifier(&self, input: NewIdentifier) -> Result<Identifier> {
    let identifier = Identifier {
      identifier_id: Uuid::new_v4(),
      entity_id:     input.entity_id,
      kind:          input.kind,
      value:         input.value,
      recorded_at:   Utc::now(),
    };

    let id_str     = encode_uuid(identifier.identifier_id);
    let entity_str = encode_uuid(identifier.entity_id);
    let kind_str   = encode_identifier_kind(identifier.kind).to_owned();
    let value      = identifier.value.clone();
    let at_str     = encode_dt(identifier.recorded_at);
    let entity_id  = identifier.entity_id;
    let kind       = identifier.kind;

    let inserted: Result<()> = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO identifiers (identifier_id, entity_id, kind, value, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, entity_str, kind_str, value, at_str],
        );
        Ok(match res {
          Ok(_) => Ok(()),
          Err(e) if is_unique_violation(&e) => {
            Err(Error::DuplicateIdentifierKind {
              entity_id,
              kind: kind.as_str().to_owned(),
            })
          }
          Err(e) => Err(e.into()),
        })
      })
      .await?;
    inserted?;

    Ok(identifier)
  }

  async fn identifiers_for(&self, entity_id: Uuid) -> Result<Vec<Identifier>> {
    self
      .conn
      .call(move |conn| Ok(merge::identifiers_of(conn, entity_id)))
      .await?
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn record_fact(&self, input: NewFact) -> Result<Fact> {
    let fact = Fact {
      fact_id:     Uuid::new_v4(),
      entity_id:   input.entity_id,
      kind:        input.kind,
      value:       input.value,
      recorded_at: Utc::now(),
      valid_until: None,
    };

    let id_str     = encode_uuid(fact.fact_id);
    let entity_str = encode_uuid(fact.entity_id);
    let kind       = fact.kind.clone();
    let value      = fact.value.clone();
    let at_str     = encode_dt(fact.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO facts (fact_id, entity_id, kind, value, recorded_at, valid_until)
           VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
          rusqlite::params![id_str, entity_str, kind, value, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(fact)
  }

  async fn current_facts(&self, entity_id: Uuid) -> Result<Vec<Fact>> {
    self
      .conn
      .call(move |conn| Ok(merge::current_facts_of(conn, entity_id)))
      .await?
  }

  async fn fact_history(&self, entity_id: Uuid) -> Result<Vec<Fact>> {
    self
      .conn
      .call(move |conn| Ok(merge::fact_history_of(conn, entity_id)))
      .await?
  }

  // ── Dedupe engine ─────────────────────────────────────────────────────────

  async fn detect_duplicates(
    &self,
    limit: usize,
    offset: usize,
  ) -> Result<DuplicateReport> {
    let report = self
      .conn
      .call(move |conn| Ok(detect::detect(conn, limit, offset)))
      .await??;

    debug!(
      total = report.total,
      page = report.groups.len(),
      "duplicate detection complete"
    );
    Ok(report)
  }

  async fn dismiss_suggestion<'a>(
    &'a self,
    primary_id: Uuid,
    candidate_id: Uuid,
    dismissed_by: &'a str,
  ) -> Result<()> {
    self.require_live(primary_id).await?;
    self.require_live(candidate_id).await?;

    let id_str        = encode_uuid(Uuid::new_v4());
    let primary_str   = encode_uuid(primary_id);
    let candidate_str = encode_uuid(candidate_id);
    let by            = dismissed_by.to_owned();
    let at_str        = encode_dt(Utc::now());

    // INSERT OR IGNORE: the UNIQUE(primary, dismissed) constraint is the
    // idempotence signal, so a concurrent duplicate dismissal is a no-op
    // rather than an error.
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO merge_dismissals
             (dismissal_id, primary_entity_id, dismissed_entity_id, dismissed_by, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, primary_str, candidate_str, by, at_str],
        )?;
        Ok(())
      })
      .await?;

    debug!(%primary_id, %candidate_id, "merge suggestion dismissed");
    Ok(())
  }

  async fn is_dismissed(
    &self,
    primary_id: Uuid,
    candidate_id: Uuid,
  ) -> Result<bool> {
    let primary_str   = encode_uuid(primary_id);
    let candidate_str = encode_uuid(candidate_id);

    let found: bool = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM merge_dismissals
             WHERE primary_entity_id = ?1 AND dismissed_entity_id = ?2",
            rusqlite::params![primary_str, candidate_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;

    Ok(found)
  }

  async fn preview_merge(
    &self,
    source_id: Uuid,
    target_id: Uuid,
  ) -> Result<MergePreview> {
    self
      .conn
      .call(move |conn| Ok(merge::preview(conn, source_id, target_id)))
      .await?
  }

  async fn merge_entities(&self, request: MergeRequest) -> Result<MergeOutcome> {
    // Preconditions are checked before any transaction opens.
    if request.source_id == request.target_id {
      return Err(Error::SelfMerge);
    }
    let source_id = request.source_id;
    let target_id = request.target_id;
    self.require_live(source_id).await?;
    self.require_live(target_id).await?;

    let result = self
      .conn
      .call(move |conn| Ok(merge::merge(conn, &request)))
      .await?;

    match &result {
      Ok(outcome) => info!(
        %source_id,
        %target_id,
        identifiers_moved = outcome.identifiers_moved,
        facts_moved = outcome.facts_moved,
        "entity merge committed"
      ),
      Err(e) => error!(%source_id, %target_id, error = %e, "entity merge failed"),
    }
    result
  }
}
