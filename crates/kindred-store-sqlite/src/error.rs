//! Error type for `kindred-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] kindred_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A statement failed on the connection thread (inside a transaction this
  /// means the whole transaction rolled back).
  #[error("sql error: {0}")]
  Sql(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("entity not found: {0}")]
  EntityNotFound(Uuid),

  #[error("entity {0} was already merged away")]
  EntityRetired(Uuid),

  /// An entity already owns an identifier of this kind.
  #[error("entity {entity_id} already has a {kind} identifier")]
  DuplicateIdentifierKind { entity_id: Uuid, kind: String },

  #[error("cannot merge an entity into itself")]
  SelfMerge,
}

impl Error {
  /// Whether this error means a requested record did not resolve.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::EntityNotFound(_)
        | Self::Core(kindred_core::Error::EntityNotFound(_))
        | Self::Core(kindred_core::Error::IdentifierNotFound(_))
        | Self::Core(kindred_core::Error::FactNotFound(_))
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
