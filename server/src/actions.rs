//! Form submissions that change tasks.
//!
//! Each action validates the submitted fields, applies the change through the
//! repository, drops the cache entries that depended on the task, and answers
//! with where the browser should go next. Nothing but the redirect target
//! leaves an action on success.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{CacheTag, TaskListFacade};
use crate::error::TaskError;
use crate::repository::{TaskPatch, TaskRepository};
use crate::schema::{CreateTaskInput, FieldErrors, TaskIdInput, UpdateTaskInput, FORM_KEY};

/// Body of a rejected submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    pub success: bool,
    pub errors: FieldErrors,
}

impl FormState {
    pub fn failed(errors: FieldErrors) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Applied; continue at this path.
    Redirect(String),
    /// Not applied.
    Rejected(FormState),
}

impl MutationOutcome {
    fn rejected(errors: FieldErrors) -> Self {
        Self::Rejected(FormState::failed(errors))
    }
}

impl IntoResponse for MutationOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect(path) => Redirect::to(&path).into_response(),
            Self::Rejected(state) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(state)).into_response()
            }
        }
    }
}

/// Submitted form fields, as name/value pairs.
pub type FormFields = HashMap<String, String>;

const TASK_FIELDS: [&str; 5] = ["description", "status", "priority", "assignee", "dueDate"];

#[derive(Debug, Clone)]
pub struct TaskActions {
    repository: TaskRepository,
    facade: Arc<TaskListFacade>,
}

impl TaskActions {
    pub fn new(repository: TaskRepository, facade: Arc<TaskListFacade>) -> Self {
        Self { repository, facade }
    }

    pub async fn create_task(&self, form: &FormFields) -> MutationOutcome {
        let mut payload = Map::new();
        if let Some(title) = form.get("title") {
            payload.insert("title".to_string(), Value::String(title.trim().to_string()));
        }
        copy_present(form, &mut payload, &TASK_FIELDS);

        let input = match CreateTaskInput::parse(&Value::Object(payload)) {
            Ok(input) => input,
            Err(errors) => return MutationOutcome::rejected(errors),
        };
        match self.repository.create(input).await {
            Ok(task) => {
                tracing::info!(id = task.id, "task created");
                self.applied(task.id, format!("/tasks/{}", task.id)).await
            }
            Err(error) => failed("create", error),
        }
    }

    /// Blank fields leave the stored value unchanged.
    pub async fn update_task(&self, form: &FormFields) -> MutationOutcome {
        let mut payload = Map::new();
        copy_task_id(form, &mut payload);
        copy_present(form, &mut payload, &["title"]);
        copy_present(form, &mut payload, &TASK_FIELDS);

        let input = match UpdateTaskInput::parse(&Value::Object(payload)) {
            Ok(input) => input,
            Err(errors) => return MutationOutcome::rejected(errors),
        };
        let id = input.id;
        match self.repository.update(id, TaskPatch::from(input)).await {
            Ok(task) => {
                tracing::info!(id, "task updated");
                self.applied(task.id, format!("/tasks/{}", task.id)).await
            }
            Err(error) => failed("update", error),
        }
    }

    pub async fn delete_task(&self, form: &FormFields) -> MutationOutcome {
        let id = match parse_task_id(form) {
            Ok(id) => id,
            Err(errors) => return MutationOutcome::rejected(errors),
        };
        match self.repository.delete(id).await {
            Ok(()) => {
                tracing::info!(id, "task deleted");
                self.applied(id, "/tasks".to_string()).await
            }
            Err(error) => failed("delete", error),
        }
    }

    pub async fn toggle_task(&self, form: &FormFields) -> MutationOutcome {
        let id = match parse_task_id(form) {
            Ok(id) => id,
            Err(errors) => return MutationOutcome::rejected(errors),
        };
        match self.repository.toggle_completed(id).await {
            Ok(task) => {
                tracing::info!(id, completed = task.completed, "task toggled");
                self.applied(id, format!("/tasks/{id}")).await
            }
            Err(error) => failed("toggle", error),
        }
    }

    async fn applied(&self, id: i64, location: String) -> MutationOutcome {
        self.facade
            .invalidate(&[CacheTag::TaskList, CacheTag::Task(id)])
            .await;
        MutationOutcome::Redirect(location)
    }
}

fn failed(verb: &str, error: TaskError) -> MutationOutcome {
    if let TaskError::Validation(errors) = error {
        return MutationOutcome::rejected(errors);
    }
    tracing::error!(%error, "failed to {verb} task");
    MutationOutcome::rejected(FieldErrors::single(
        FORM_KEY,
        format!("Failed to {verb} task. Please try again."),
    ))
}

/// Copy trimmed, non-blank fields into the payload.
fn copy_present(form: &FormFields, payload: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        let value = form.get(*field).map(|value| value.trim()).unwrap_or_default();
        if !value.is_empty() {
            payload.insert(field.to_string(), Value::String(value.to_string()));
        }
    }
}

/// `taskId` becomes `id`: a number when it reads as one, otherwise the raw
/// string so the type check reports it.
fn copy_task_id(form: &FormFields, payload: &mut Map<String, Value>) {
    let raw = form.get("taskId").map(|value| value.trim()).unwrap_or_default();
    if raw.is_empty() {
        return;
    }
    let value = raw
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()));
    payload.insert("id".to_string(), value);
}

fn parse_task_id(form: &FormFields) -> Result<i64, FieldErrors> {
    let mut payload = Map::new();
    copy_task_id(form, &mut payload);
    TaskIdInput::parse(&Value::Object(payload)).map(|input| input.id)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{RenderPass, RepositorySource, TaskListQuery};
    use crate::error::StoreError;
    use crate::schema::{TaskFilter, TaskPriority, TaskSort, TaskStatus};
    use crate::store::{NewTaskRecord, TaskRecord, TaskRecordPatch, TaskStore};

    fn actions_over(repository: TaskRepository) -> (TaskActions, Arc<TaskListFacade>) {
        let source = Arc::new(RepositorySource::new(repository.clone(), 15));
        let facade = Arc::new(TaskListFacade::new(source, Duration::from_secs(15)));
        (TaskActions::new(repository, facade.clone()), facade)
    }

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn errors_of(outcome: MutationOutcome) -> FieldErrors {
        match outcome {
            MutationOutcome::Rejected(state) => {
                assert!(!state.success);
                state.errors
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl TaskStore for BrokenStore {
        async fn find_many(
            &self,
            _: &TaskFilter,
            _: TaskSort,
            _: Option<usize>,
            _: usize,
        ) -> Result<Vec<TaskRecord>, StoreError> {
            Err(down())
        }

        async fn find_unique(&self, _: i64) -> Result<Option<TaskRecord>, StoreError> {
            Err(down())
        }

        async fn count(&self, _: &TaskFilter) -> Result<u64, StoreError> {
            Err(down())
        }

        async fn insert(&self, _: NewTaskRecord) -> Result<TaskRecord, StoreError> {
            Err(down())
        }

        async fn update(
            &self,
            _: i64,
            _: TaskRecordPatch,
        ) -> Result<Option<TaskRecord>, StoreError> {
            Err(down())
        }

        async fn delete(&self, _: i64) -> Result<bool, StoreError> {
            Err(down())
        }

        async fn delete_many(&self, _: &TaskFilter) -> Result<u64, StoreError> {
            Err(down())
        }
    }

    fn down() -> StoreError {
        StoreError::Unavailable("connection refused at 10.0.0.5:5432".to_string())
    }

    #[tokio::test]
    async fn create_redirects_to_the_new_task() {
        let repository = TaskRepository::in_memory();
        let (actions, _) = actions_over(repository.clone());
        let outcome = actions
            .create_task(&form(&[
                ("title", "  Write report  "),
                ("description", ""),
                ("priority", "high"),
                ("assignee", "   "),
                ("dueDate", "2030-01-15"),
            ]))
            .await;

        let MutationOutcome::Redirect(location) = outcome else {
            panic!("expected redirect, got {outcome:?}");
        };
        let id: i64 = location.trim_start_matches("/tasks/").parse().unwrap();
        let task = repository.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(task.title, "Write report");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.description.is_none());
        assert!(task.assignee.is_none());
        assert!(task.due_date.is_some());
    }

    #[tokio::test]
    async fn invalid_create_returns_field_errors_and_stores_nothing() {
        let repository = TaskRepository::in_memory();
        let (actions, _) = actions_over(repository.clone());
        let errors = errors_of(
            actions
                .create_task(&form(&[
                    ("title", "   "),
                    ("status", "archived"),
                    ("assignee", "not-an-email"),
                ]))
                .await,
        );
        assert_eq!(errors.get("title"), Some(&["Title is required".to_string()][..]));
        assert!(errors.contains("status"));
        assert_eq!(errors.get("assignee"), Some(&["Invalid email format".to_string()][..]));
        assert_eq!(repository.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_without_a_title_field_is_required() {
        let (actions, _) = actions_over(TaskRepository::in_memory());
        let errors = errors_of(actions.create_task(&form(&[])).await);
        assert!(errors.contains("title"));
    }

    #[tokio::test]
    async fn update_keeps_blank_fields_and_redirects() {
        let repository = TaskRepository::in_memory();
        let mut input = CreateTaskInput::new("Original");
        input.description = Some("keep me".to_string());
        let task = repository.create(input).await.unwrap();
        let (actions, _) = actions_over(repository.clone());

        let id = task.id.to_string();
        let outcome = actions
            .update_task(&form(&[
                ("taskId", id.as_str()),
                ("title", "Renamed"),
                ("description", ""),
                ("status", "in_progress"),
            ]))
            .await;
        assert_eq!(outcome, MutationOutcome::Redirect(format!("/tasks/{id}")));

        let updated = repository.find_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description.as_deref(), Some("keep me"));
        assert_eq!(updated.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn update_without_id_never_touches_the_store() {
        let repository = TaskRepository::new(Arc::new(BrokenStore));
        let (actions, _) = actions_over(repository);
        let errors = errors_of(actions.update_task(&form(&[("title", "x")])).await);
        assert!(errors.contains("id"));
        assert!(!errors.contains(FORM_KEY));
    }

    #[tokio::test]
    async fn non_numeric_task_id_is_a_type_error() {
        let (actions, _) = actions_over(TaskRepository::in_memory());
        let errors = errors_of(actions.delete_task(&form(&[("taskId", "abc")])).await);
        assert!(errors.contains("id"));
    }

    #[tokio::test]
    async fn missing_task_is_a_generic_failure() {
        let (actions, _) = actions_over(TaskRepository::in_memory());
        let errors = errors_of(actions.delete_task(&form(&[("taskId", "42")])).await);
        assert_eq!(
            errors.get(FORM_KEY),
            Some(&["Failed to delete task. Please try again.".to_string()][..])
        );
    }

    #[tokio::test]
    async fn store_failure_is_generic_and_hides_detail() {
        let (actions, _) = actions_over(TaskRepository::new(Arc::new(BrokenStore)));
        let errors = errors_of(actions.create_task(&form(&[("title", "Anything")])).await);
        let messages = errors.get(FORM_KEY).unwrap();
        assert_eq!(messages, ["Failed to create task. Please try again."]);
        assert!(!errors.to_string().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn toggle_flips_completion() {
        let repository = TaskRepository::in_memory();
        let task = repository.create(CreateTaskInput::new("Flip")).await.unwrap();
        let (actions, _) = actions_over(repository.clone());
        let id = task.id.to_string();

        let outcome = actions.toggle_task(&form(&[("taskId", id.as_str())])).await;
        assert_eq!(outcome, MutationOutcome::Redirect(format!("/tasks/{id}")));
        assert!(repository.find_by_id(task.id).await.unwrap().unwrap().completed);
    }

    #[tokio::test]
    async fn mutations_invalidate_cached_lists() {
        let repository = TaskRepository::in_memory();
        let task = repository.create(CreateTaskInput::new("Cached")).await.unwrap();
        let (actions, facade) = actions_over(repository.clone());
        let query = TaskListQuery::default();

        let before = facade.revalidated(&RenderPass::new(), &query).await.unwrap();
        assert_eq!(before.tasks.len(), 1);

        let id = task.id.to_string();
        let outcome = actions.delete_task(&form(&[("taskId", id.as_str())])).await;
        assert_eq!(outcome, MutationOutcome::Redirect("/tasks".to_string()));

        let after = facade.revalidated(&RenderPass::new(), &query).await.unwrap();
        assert!(after.tasks.is_empty());
    }

    #[test]
    fn outcomes_map_to_http() {
        let redirect = MutationOutcome::Redirect("/tasks/3".to_string()).into_response();
        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
        assert_eq!(redirect.headers()["location"], "/tasks/3");

        let rejected =
            MutationOutcome::rejected(FieldErrors::single("title", "Required")).into_response();
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
