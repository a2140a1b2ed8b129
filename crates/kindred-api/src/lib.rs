//! JSON REST API for the kindred dedupe engine.
//!
//! Exposes an axum [`Router`] backed by any [`kindred_core::store::GraphStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", kindred_api::api_router(store.clone()))
//! ```

pub mod entities;
pub mod error;
pub mod merge;
pub mod suggestions;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use kindred_core::{entity::Entity, store::GraphStore};
use serde::Deserialize;
use uuid::Uuid;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8675 }
fn default_store_path() -> PathBuf { PathBuf::from("kindred.db") }

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: GraphStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Entities (read surface for the review UI)
    .route("/entities", get(entities::list::<S>))
    .route("/entities/{id}", get(entities::get_one::<S>))
    // Dedupe engine
    .route("/merge/suggestions", get(suggestions::list::<S>))
    .route("/merge/suggestions/dismiss", post(suggestions::dismiss::<S>))
    .route("/merge/preview", get(merge::preview::<S>))
    .route("/merge", post(merge::execute::<S>))
    .with_state(store)
}

// ─── Shared handler helpers ───────────────────────────────────────────────────

/// Resolve an entity and require it to be live.
///
/// Missing entities map to 404; entities retired by an earlier merge map to
/// 409, since retrying the same operation can never succeed.
pub(crate) async fn require_live<S>(store: &S, id: Uuid) -> Result<Entity, ApiError>
where
  S: GraphStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let entity = store
    .get_entity(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))?;
  if !entity.is_live() {
    return Err(ApiError::Conflict(format!(
      "entity {id} was already merged away"
    )));
  }
  Ok(entity)
}
