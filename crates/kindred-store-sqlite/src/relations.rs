//! Write access to the dependent relations.
//!
//! These tables are owned by other subsystems (ingestion, extraction,
//! scheduling); the merge executor only rewrites their entity references.
//! The helpers here are the minimal surface those subsystems use to populate
//! them — and what the executor's tests drive.

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Result, SqliteStore,
  encode::{encode_dt, encode_uuid},
  merge::DEPENDENT_RELATIONS,
};

impl SqliteStore {
  pub async fn record_message(
    &self,
    sender: Uuid,
    recipient: Uuid,
    body: &str,
  ) -> Result<Uuid> {
    let message_id = Uuid::new_v4();
    let id_str     = encode_uuid(message_id);
    let from_str   = encode_uuid(sender);
    let to_str     = encode_uuid(recipient);
    let body       = body.to_owned();
    let at_str     = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO messages (message_id, sender_entity_id, recipient_entity_id, body, sent_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, from_str, to_str, body, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(message_id)
  }

  pub async fn add_interaction_participant(
    &self,
    interaction_id: Uuid,
    entity_id: Uuid,
  ) -> Result<()> {
    let interaction_str = encode_uuid(interaction_id);
    let entity_str      = encode_uuid(entity_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO interaction_participants (interaction_id, entity_id)
           VALUES (?1, ?2)",
          rusqlite::params![interaction_str, entity_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn add_relation_member(
    &self,
    relation_id: Uuid,
    role: &str,
    entity_id: Uuid,
  ) -> Result<()> {
    let relation_str = encode_uuid(relation_id);
    let role         = role.to_owned();
    let entity_str   = encode_uuid(entity_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO relation_members (relation_id, role, entity_id)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![relation_str, role, entity_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn add_group_member(
    &self,
    group_id: Uuid,
    entity_id: Uuid,
  ) -> Result<()> {
    let group_str  = encode_uuid(group_id);
    let entity_str = encode_uuid(entity_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO group_members (group_id, entity_id)
           VALUES (?1, ?2)",
          rusqlite::params![group_str, entity_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn record_activity(
    &self,
    owner: Uuid,
    client: Uuid,
    summary: &str,
  ) -> Result<Uuid> {
    let activity_id = Uuid::new_v4();
    let id_str      = encode_uuid(activity_id);
    let owner_str   = encode_uuid(owner);
    let client_str  = encode_uuid(client);
    let summary     = summary.to_owned();
    let at_str      = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO activities (activity_id, owner_entity_id, client_entity_id, summary, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, owner_str, client_str, summary, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(activity_id)
  }

  pub async fn record_commitment(
    &self,
    from: Uuid,
    to: Uuid,
    summary: &str,
  ) -> Result<Uuid> {
    let commitment_id = Uuid::new_v4();
    let id_str        = encode_uuid(commitment_id);
    let from_str      = encode_uuid(from);
    let to_str        = encode_uuid(to);
    let summary       = summary.to_owned();
    let at_str        = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO commitments (commitment_id, from_entity_id, to_entity_id, summary, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, from_str, to_str, summary, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(commitment_id)
  }

  pub async fn record_entity_event(
    &self,
    subject: Uuid,
    related: Option<Uuid>,
    kind: &str,
  ) -> Result<Uuid> {
    let event_id    = Uuid::new_v4();
    let id_str      = encode_uuid(event_id);
    let subject_str = encode_uuid(subject);
    let related_str = related.map(encode_uuid);
    let kind        = kind.to_owned();
    let at_str      = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO entity_events (event_id, subject_entity_id, related_entity_id, kind, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, subject_str, related_str, kind, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(event_id)
  }

  pub async fn add_transcript_speaker(
    &self,
    transcript_id: Uuid,
    entity_id: Uuid,
  ) -> Result<()> {
    let transcript_str = encode_uuid(transcript_id);
    let entity_str     = encode_uuid(entity_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO transcript_speakers (transcript_id, entity_id)
           VALUES (?1, ?2)",
          rusqlite::params![transcript_str, entity_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn add_pending_resolution(
    &self,
    entity_id: Uuid,
    raw_name: &str,
  ) -> Result<Uuid> {
    let resolution_id = Uuid::new_v4();
    let id_str        = encode_uuid(resolution_id);
    let entity_str    = encode_uuid(entity_id);
    let raw_name      = raw_name.to_owned();
    let at_str        = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO pending_entity_resolutions (resolution_id, entity_id, raw_name, recorded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, entity_str, raw_name, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(resolution_id)
  }

  pub async fn upsert_relationship_profile(
    &self,
    entity_id: Uuid,
    profile_json: &str,
  ) -> Result<()> {
    let entity_str = encode_uuid(entity_id);
    let profile    = profile_json.to_owned();
    let at_str     = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO relationship_profiles (entity_id, profile_json, computed_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (entity_id) DO UPDATE
             SET profile_json = excluded.profile_json,
                 computed_at  = excluded.computed_at",
          rusqlite::params![entity_str, profile, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn relationship_profile(
    &self,
    entity_id: Uuid,
  ) -> Result<Option<String>> {
    use rusqlite::OptionalExtension as _;
    let entity_str = encode_uuid(entity_id);

    let profile: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT profile_json FROM relationship_profiles WHERE entity_id = ?1",
            rusqlite::params![entity_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;
    Ok(profile)
  }

  /// Count rows across every dependent relation that reference `entity_id`.
  ///
  /// Walks the same relation list the merge executor rewrites, plus the
  /// relationship-profile cache, so "no references survive a merge" is a
  /// single queryable number.
  pub async fn count_references(&self, entity_id: Uuid) -> Result<i64> {
    let entity_str = encode_uuid(entity_id);

    let total: i64 = self
      .conn
      .call(move |conn| {
        let mut total = 0i64;
        for rel in DEPENDENT_RELATIONS {
          for col in rel.entity_columns {
            let n: i64 = conn.query_row(
              &format!(
                "SELECT COUNT(*) FROM {table} WHERE {col} = ?1",
                table = rel.table,
              ),
              rusqlite::params![entity_str],
              |row| row.get(0),
            )?;
            total += n;
          }
        }
        let n: i64 = conn.query_row(
          "SELECT COUNT(*) FROM relationship_profiles WHERE entity_id = ?1",
          rusqlite::params![entity_str],
          |row| row.get(0),
        )?;
        Ok(total + n)
      })
      .await?;

    Ok(total)
  }
}
