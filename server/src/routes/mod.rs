//! HTTP surface: the cached list endpoint, form submissions and JSON views.

pub mod api;
pub mod forms;
pub mod pages;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};

use crate::actions::TaskActions;
use crate::cache::{RepositorySource, TaskListFacade};
use crate::repository::TaskRepository;

#[derive(Debug, Clone)]
pub struct AppState {
    pub repository: TaskRepository,
    pub facade: Arc<TaskListFacade>,
    pub cache_window_seconds: u64,
}

impl AppState {
    /// State whose list facade reads from `repository` through the same
    /// query the list endpoint runs.
    pub fn new(repository: TaskRepository, cache_window: Duration) -> Self {
        let cache_window_seconds = cache_window.as_secs();
        let source = Arc::new(RepositorySource::new(
            repository.clone(),
            cache_window_seconds,
        ));
        Self {
            facade: Arc::new(TaskListFacade::new(source, cache_window)),
            repository,
            cache_window_seconds,
        }
    }

    pub fn in_memory(cache_window: Duration) -> Self {
        Self::new(TaskRepository::in_memory(), cache_window)
    }

    pub fn actions(&self) -> TaskActions {
        TaskActions::new(self.repository.clone(), Arc::clone(&self.facade))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/cache/tasks", get(api::cached_tasks))
        .route("/tasks", get(pages::task_list).post(forms::create_task))
        .route("/tasks/update", post(forms::update_task))
        .route("/tasks/delete", post(forms::delete_task))
        .route("/tasks/toggle", post(forms::toggle_task))
        .route("/tasks/{id}", get(pages::task_detail))
        .with_state(state)
}
