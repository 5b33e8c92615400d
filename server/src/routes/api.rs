use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::cache::{load_task_list, TaskListPayload, TaskListQuery};
use crate::error::{ApiErrorResponse, TaskError};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/cache/tasks`: the payload the revalidated list caches.
pub async fn cached_tasks(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<TaskListPayload>, ApiErrorResponse> {
    let query = TaskListQuery::from_params(&params).map_err(TaskError::Validation)?;
    let payload = load_task_list(&state.repository, &query, state.cache_window_seconds).await?;
    Ok(Json(payload))
}
