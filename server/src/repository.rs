//! Typed data access over a `TaskStore`.
//!
//! Every row coming back from the store is turned into a `Task` and checked
//! against the schema before it is returned. A row that fails is reported as
//! `StoreError::Corrupt` and never reaches the caller.

use std::sync::Arc;

use validator::Validate;

use crate::error::{StoreError, TaskError};
use crate::schema::{
    CreateTaskInput, FieldErrors, Task, TaskFilter, TaskPriority, TaskQuery, TaskSort, TaskStatus,
    UpdateTaskInput,
};
use crate::store::{InMemoryTaskStore, NewTaskRecord, TaskRecord, TaskRecordPatch, TaskStore};

/// Ordering and paging for `find_many`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub order_by: Option<TaskSort>,
    pub take: Option<usize>,
    pub skip: Option<usize>,
}

/// Typed changes for `update`. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<String>,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    pub completed: Option<bool>,
}

impl From<UpdateTaskInput> for TaskPatch {
    fn from(input: UpdateTaskInput) -> Self {
        Self {
            title: input.title,
            description: input.description,
            status: input.status,
            priority: input.priority,
            assignee: input.assignee,
            due_date: input.due_date,
            completed: None,
        }
    }
}

impl From<TaskPatch> for TaskRecordPatch {
    fn from(patch: TaskPatch) -> Self {
        Self {
            title: patch.title,
            description: patch.description,
            status: patch.status.map(|status| status.as_str().to_string()),
            priority: patch.priority.map(|priority| priority.as_str().to_string()),
            assignee: patch.assignee,
            due_date: patch.due_date,
            completed: patch.completed,
        }
    }
}

#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn TaskStore>,
}

impl std::fmt::Debug for TaskRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRepository").finish_non_exhaustive()
    }
}

impl TaskRepository {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTaskStore::new()))
    }

    /// Newest first unless `options.order_by` says otherwise.
    pub async fn find_many(
        &self,
        filter: Option<&TaskFilter>,
        options: FindOptions,
    ) -> Result<Vec<Task>, TaskError> {
        let everything = TaskFilter::default();
        let rows = self
            .store
            .find_many(
                filter.unwrap_or(&everything),
                options.order_by.unwrap_or_default(),
                options.take,
                options.skip.unwrap_or(0),
            )
            .await?;
        rows.into_iter().map(into_task).collect()
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Task>, TaskError> {
        match self.store.find_unique(id).await? {
            Some(row) => into_task(row).map(Some),
            None => Ok(None),
        }
    }

    pub async fn find_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, TaskError> {
        self.find_many(Some(&TaskFilter::status(status)), FindOptions::default())
            .await
    }

    pub async fn find_by_priority(&self, priority: TaskPriority) -> Result<Vec<Task>, TaskError> {
        self.find_many(Some(&TaskFilter::priority(priority)), FindOptions::default())
            .await
    }

    pub async fn find_by_assignee(&self, assignee: &str) -> Result<Vec<Task>, TaskError> {
        self.find_many(Some(&TaskFilter::assignee(assignee)), FindOptions::default())
            .await
    }

    pub async fn find_completed(&self) -> Result<Vec<Task>, TaskError> {
        self.find_many(Some(&TaskFilter::completed(true)), FindOptions::default())
            .await
    }

    pub async fn find_incomplete(&self) -> Result<Vec<Task>, TaskError> {
        self.find_many(Some(&TaskFilter::completed(false)), FindOptions::default())
            .await
    }

    /// Filters, sort and page taken from a validated `TaskQuery`.
    pub async fn query(&self, query: &TaskQuery) -> Result<Vec<Task>, TaskError> {
        let options = FindOptions {
            order_by: Some(query.sort()),
            take: Some(query.take()),
            skip: Some(query.skip()),
        };
        self.find_many(Some(&query.filter()), options).await
    }

    pub async fn count(&self, filter: Option<&TaskFilter>) -> Result<u64, TaskError> {
        let everything = TaskFilter::default();
        Ok(self.store.count(filter.unwrap_or(&everything)).await?)
    }

    pub async fn exists(&self, id: i64) -> Result<bool, TaskError> {
        Ok(self.store.find_unique(id).await?.is_some())
    }

    pub async fn create(&self, input: CreateTaskInput) -> Result<Task, TaskError> {
        let record = NewTaskRecord {
            title: input.title,
            description: input.description,
            status: input.status.as_str().to_string(),
            priority: input.priority.as_str().to_string(),
            assignee: input.assignee,
            due_date: input.due_date,
            completed: false,
        };
        into_task(self.store.insert(record).await?)
    }

    pub async fn update(&self, id: i64, patch: TaskPatch) -> Result<Task, TaskError> {
        match self.store.update(id, patch.into()).await? {
            Some(row) => into_task(row),
            None => Err(TaskError::NotFound(id)),
        }
    }

    pub async fn update_status(&self, id: i64, status: TaskStatus) -> Result<Task, TaskError> {
        let patch = TaskPatch {
            status: Some(status),
            ..TaskPatch::default()
        };
        self.update(id, patch).await
    }

    pub async fn update_priority(
        &self,
        id: i64,
        priority: TaskPriority,
    ) -> Result<Task, TaskError> {
        let patch = TaskPatch {
            priority: Some(priority),
            ..TaskPatch::default()
        };
        self.update(id, patch).await
    }

    /// Flip `completed`. Read and write are separate store calls, so two
    /// concurrent toggles can both read the same state; the last write wins.
    pub async fn toggle_completed(&self, id: i64) -> Result<Task, TaskError> {
        let current = self.find_by_id(id).await?.ok_or(TaskError::NotFound(id))?;
        let patch = TaskPatch {
            completed: Some(!current.completed),
            ..TaskPatch::default()
        };
        self.update(id, patch).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), TaskError> {
        if self.store.delete(id).await? {
            Ok(())
        } else {
            Err(TaskError::NotFound(id))
        }
    }

    pub async fn delete_many(&self, filter: &TaskFilter) -> Result<u64, TaskError> {
        Ok(self.store.delete_many(filter).await?)
    }
}

fn into_task(row: TaskRecord) -> Result<Task, TaskError> {
    let id = row.id;
    let corrupt = |reason: String| TaskError::Store(StoreError::Corrupt { id, reason });

    let status = row
        .status
        .parse::<TaskStatus>()
        .map_err(|error| corrupt(error.to_string()))?;
    let priority = row
        .priority
        .parse::<TaskPriority>()
        .map_err(|error| corrupt(error.to_string()))?;

    let task = Task {
        id: row.id,
        title: row.title,
        description: row.description,
        status,
        priority,
        assignee: row.assignee,
        due_date: row.due_date,
        completed: row.completed,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    task.validate()
        .map_err(|failures| corrupt(FieldErrors::from(failures).to_string()))?;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::schema::{SortOrder, TaskSortField};

    fn repository() -> TaskRepository {
        TaskRepository::in_memory()
    }

    #[tokio::test]
    async fn minimal_create_uses_defaults() {
        let repository = repository();
        let task = repository
            .create(CreateTaskInput::new("Minimal Task"))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(!task.completed);
        assert!(task.description.is_none());
        assert!(task.assignee.is_none());
        assert!(task.due_date.is_none());
        assert!(task.id > 0);
    }

    #[tokio::test]
    async fn find_by_id_round_trips_created_task() {
        let repository = repository();
        let created = repository.create(CreateTaskInput::new("Find me")).await.unwrap();
        let found = repository.find_by_id(created.id).await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn empty_repository_lists_nothing() {
        let tasks = repository()
            .find_many(None, FindOptions::default())
            .await
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn find_by_id_after_delete_is_none() {
        let repository = repository();
        let task = repository.create(CreateTaskInput::new("Doomed")).await.unwrap();
        repository.delete(task.id).await.unwrap();
        assert_eq!(repository.find_by_id(task.id).await.unwrap(), None);
        assert!(!repository.exists(task.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_id_are_not_found() {
        let repository = repository();
        assert_eq!(
            repository.update(99, TaskPatch::default()).await,
            Err(TaskError::NotFound(99))
        );
        assert_eq!(repository.delete(99).await, Err(TaskError::NotFound(99)));
        assert_eq!(
            repository.toggle_completed(99).await,
            Err(TaskError::NotFound(99))
        );
    }

    #[tokio::test]
    async fn toggle_twice_restores_completed() {
        let repository = repository();
        let task = repository.create(CreateTaskInput::new("Flip")).await.unwrap();
        let once = repository.toggle_completed(task.id).await.unwrap();
        assert!(once.completed);
        let twice = repository.toggle_completed(task.id).await.unwrap();
        assert_eq!(twice.completed, task.completed);
        assert!(twice.updated_at >= twice.created_at);
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let repository = repository();
        let task = repository.create(CreateTaskInput::new("Draft")).await.unwrap();
        let updated = repository
            .update(
                task.id,
                TaskPatch {
                    title: Some("Final".to_string()),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.status, task.status);
        assert_eq!(updated.created_at, task.created_at);

        let status = repository.update_status(task.id, TaskStatus::Done).await.unwrap();
        assert_eq!(status.status, TaskStatus::Done);
        let priority = repository
            .update_priority(task.id, TaskPriority::High)
            .await
            .unwrap();
        assert_eq!(priority.priority, TaskPriority::High);
        assert_eq!(priority.title, "Final");
    }

    #[tokio::test]
    async fn finders_filter_by_field() {
        let repository = repository();
        let mut input = CreateTaskInput::new("Assigned");
        input.assignee = Some("owner@example.com".to_string());
        input.priority = TaskPriority::High;
        input.status = TaskStatus::Done;
        let assigned = repository.create(input).await.unwrap();
        let other = repository.create(CreateTaskInput::new("Other")).await.unwrap();
        repository.toggle_completed(other.id).await.unwrap();

        let by_assignee = repository.find_by_assignee("owner@example.com").await.unwrap();
        assert_eq!(by_assignee.len(), 1);
        assert_eq!(by_assignee[0].id, assigned.id);
        assert_eq!(repository.find_by_status(TaskStatus::Done).await.unwrap().len(), 1);
        assert_eq!(repository.find_by_priority(TaskPriority::Medium).await.unwrap().len(), 1);
        assert_eq!(repository.find_completed().await.unwrap()[0].id, other.id);
        assert_eq!(repository.find_incomplete().await.unwrap()[0].id, assigned.id);
        assert_eq!(repository.count(None).await.unwrap(), 2);
        assert_eq!(
            repository
                .count(Some(&TaskFilter::status(TaskStatus::Todo)))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn find_many_respects_take_and_skip() {
        let repository = repository();
        for i in 0..5 {
            repository
                .create(CreateTaskInput::new(format!("Task {i}")))
                .await
                .unwrap();
        }
        let options = FindOptions {
            take: Some(2),
            skip: Some(1),
            ..FindOptions::default()
        };
        let tasks = repository.find_many(None, options).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Task 3");
    }

    #[tokio::test]
    async fn query_applies_sort_and_page() {
        let repository = repository();
        for title in ["a", "b", "c"] {
            repository.create(CreateTaskInput::new(title)).await.unwrap();
        }
        let query = TaskQuery {
            sort_by: TaskSortField::CreatedAt,
            sort_order: SortOrder::Asc,
            limit: 2,
            ..TaskQuery::default()
        };
        let tasks = repository.query(&query).await.unwrap();
        let titles: Vec<_> = tasks.iter().map(|task| task.title.as_str()).collect();
        assert_eq!(titles, ["a", "b"]);
    }

    #[tokio::test]
    async fn delete_many_counts_removed() {
        let repository = repository();
        repository.create(CreateTaskInput::new("a")).await.unwrap();
        repository.create(CreateTaskInput::new("b")).await.unwrap();
        let removed = repository.delete_many(&TaskFilter::default()).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repository.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_rows_never_escape() {
        let store = Arc::new(InMemoryTaskStore::new());
        let now = Utc::now();
        let good = TaskRecord {
            id: 1,
            title: "fine".to_string(),
            description: None,
            status: "todo".to_string(),
            priority: "low".to_string(),
            assignee: None,
            due_date: None,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        store.seed(good.clone()).await;
        store
            .seed(TaskRecord {
                id: 2,
                status: "archived".to_string(),
                ..good.clone()
            })
            .await;
        store
            .seed(TaskRecord {
                id: 3,
                updated_at: now - Duration::seconds(5),
                ..good.clone()
            })
            .await;
        let repository = TaskRepository::new(store);

        assert!(repository.find_by_id(1).await.unwrap().is_some());
        assert!(matches!(
            repository.find_by_id(2).await,
            Err(TaskError::Store(StoreError::Corrupt { id: 2, .. }))
        ));
        assert!(matches!(
            repository.find_by_id(3).await,
            Err(TaskError::Store(StoreError::Corrupt { id: 3, .. }))
        ));
        assert!(repository.find_many(None, FindOptions::default()).await.is_err());
    }
}
