//! Handlers for `/entities` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/entities` | Optional `?kind=person\|organization\|other` |
//! | `GET`  | `/entities/:id` | 404 if not found; retired entities resolve |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use kindred_core::{
  entity::{Entity, EntityKind},
  store::GraphStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub kind: Option<EntityKind>,
}

/// `GET /entities[?kind=<kind>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Entity>>, ApiError>
where
  S: GraphStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let entities = store
    .list_entities(params.kind)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(entities))
}

/// `GET /entities/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Entity>, ApiError>
where
  S: GraphStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let entity = store
    .get_entity(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))?;
  Ok(Json(entity))
}
