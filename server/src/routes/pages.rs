use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::cache::{CacheDiagnostics, RenderPass, TaskListQuery};
use crate::error::{ApiErrorResponse, TaskError};
use crate::schema::Task;

/// View model for the task list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListPage {
    pub tasks: Vec<Task>,
    /// Both revalidated reads in the render resolved to the same result.
    pub memoization_verified: bool,
    pub revalidate: CacheDiagnostics,
    pub no_store: CacheDiagnostics,
}

/// `GET /tasks`: one render pass reading the revalidated list twice and the
/// uncached list once.
pub async fn task_list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<TaskListPage>, ApiErrorResponse> {
    let query = TaskListQuery::from_params(&params).map_err(TaskError::Validation)?;
    let pass = RenderPass::new();

    let first = state.facade.revalidated(&pass, &query).await?;
    let again = state.facade.revalidated(&pass, &query).await?;
    let no_store = state.facade.uncached(&query).await?;

    Ok(Json(TaskListPage {
        memoization_verified: Arc::ptr_eq(&first, &again),
        tasks: first.tasks.clone(),
        revalidate: first.diagnostics.clone(),
        no_store: no_store.diagnostics,
    }))
}

/// `GET /tasks/{id}`. Ids that are not positive integers are simply not found.
pub async fn task_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiErrorResponse> {
    let not_found = || ApiErrorResponse::not_found("Task not found");
    let id = id.parse::<i64>().ok().filter(|id| *id > 0).ok_or_else(not_found)?;
    match state.repository.find_by_id(id).await? {
        Some(task) => Ok(Json(task)),
        None => Err(not_found()),
    }
}
