//! Handlers for merge-suggestion endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/merge/suggestions` | `?limit=&offset=`, paginated by primary |
//! | `POST` | `/merge/suggestions/dismiss` | Idempotent |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use kindred_core::{dedupe::DuplicateReport, store::GraphStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, require_live};

const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /merge/suggestions[?limit=...][&offset=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<DuplicateReport>, ApiError>
where
  S: GraphStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = store
    .detect_duplicates(
      params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
      params.offset.unwrap_or(0),
    )
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct DismissBody {
  pub primary_id:   Uuid,
  pub candidate_id: Uuid,
  pub dismissed_by: String,
}

/// `POST /merge/suggestions/dismiss`
///
/// Dismissing an already-dismissed pair succeeds without effect.
pub async fn dismiss<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<DismissBody>,
) -> Result<StatusCode, ApiError>
where
  S: GraphStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  require_live(store.as_ref(), body.primary_id).await?;
  require_live(store.as_ref(), body.candidate_id).await?;

  store
    .dismiss_suggestion(body.primary_id, body.candidate_id, &body.dismissed_by)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(StatusCode::NO_CONTENT)
}
