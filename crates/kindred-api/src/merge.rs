//! Handlers for merge preview and execution.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/merge/preview` | `?source_id=&target_id=` |
//! | `POST` | `/merge` | Atomic; 409 on self-merge or retired entity |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use kindred_core::{
  dedupe::{FieldResolution, MergeOutcome, MergePreview, MergeRequest},
  store::GraphStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, require_live};

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
  pub source_id: Uuid,
  pub target_id: Uuid,
}

/// `GET /merge/preview?source_id=<id>&target_id=<id>`
pub async fn preview<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<PreviewParams>,
) -> Result<Json<MergePreview>, ApiError>
where
  S: GraphStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  require_live(store.as_ref(), params.source_id).await?;
  require_live(store.as_ref(), params.target_id).await?;

  let preview = store
    .preview_merge(params.source_id, params.target_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(preview))
}

#[derive(Debug, Deserialize)]
pub struct MergeBody {
  pub source_id:      Uuid,
  pub target_id:      Uuid,
  #[serde(default)]
  pub identifier_ids: Vec<Uuid>,
  #[serde(default)]
  pub fact_ids:       Vec<Uuid>,
  #[serde(default)]
  pub resolutions:    Vec<FieldResolution>,
}

/// `POST /merge`
pub async fn execute<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<MergeBody>,
) -> Result<Json<MergeOutcome>, ApiError>
where
  S: GraphStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if body.source_id == body.target_id {
    return Err(ApiError::Conflict(
      "cannot merge an entity into itself".into(),
    ));
  }
  require_live(store.as_ref(), body.source_id).await?;
  require_live(store.as_ref(), body.target_id).await?;

  let outcome = store
    .merge_entities(MergeRequest {
      source_id:      body.source_id,
      target_id:      body.target_id,
      identifier_ids: body.identifier_ids,
      fact_ids:       body.fact_ids,
      resolutions:    body.resolutions,
    })
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(outcome))
}
