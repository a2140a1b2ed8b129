//! Error types for `kindred-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("entity not found: {0}")]
  EntityNotFound(Uuid),

  /// The entity exists but was soft-deleted by an earlier merge.
  #[error("entity {0} was already merged away")]
  EntityRetired(Uuid),

  #[error("identifier not found on source entity: {0}")]
  IdentifierNotFound(Uuid),

  #[error("fact not found on source entity: {0}")]
  FactNotFound(Uuid),

  #[error("cannot merge an entity into itself")]
  SelfMerge,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
