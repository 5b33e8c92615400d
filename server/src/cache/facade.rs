use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CacheLookup, CacheTag, DataCache, RenderPass};
use crate::error::TaskError;
use crate::repository::{FindOptions, TaskRepository};
use crate::schema::{
    FieldErrors, SortOrder, Task, TaskFilter, TaskPriority, TaskSort, TaskSortField, TaskStatus,
};

/// Equality filters accepted by the list query. Unset means "all".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskListFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TaskListQuery {
    pub filters: TaskListFilters,
    pub sort: TaskSort,
}

impl TaskListQuery {
    /// Read query-string parameters.
    ///
    /// `status` and `priority` are dropped when they are not a known value.
    /// `sortBy` and `sortOrder` default when missing or blank and are
    /// rejected when they name something unknown.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, FieldErrors> {
        let present = |key: &str| {
            params
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let filters = TaskListFilters {
            status: present("status").and_then(|value| value.parse().ok()),
            priority: present("priority").and_then(|value| value.parse().ok()),
        };

        let mut errors = FieldErrors::new();
        let field = match present("sortBy").map(str::parse::<TaskSortField>) {
            None => TaskSortField::default(),
            Some(Ok(field)) => field,
            Some(Err(error)) => {
                errors.add("sortBy", error.to_string());
                TaskSortField::default()
            }
        };
        let order = match present("sortOrder").map(str::parse::<SortOrder>) {
            None => SortOrder::default(),
            Some(Ok(order)) => order,
            Some(Err(error)) => {
                errors.add("sortOrder", error.to_string());
                SortOrder::default()
            }
        };

        errors.into_result(Self {
            filters,
            sort: TaskSort::new(field, order),
        })
    }

    /// Query-string form of the parameters, e.g.
    /// `status=todo&sortBy=createdAt&sortOrder=desc`.
    pub fn cache_key(&self) -> String {
        let mut pairs = Vec::with_capacity(4);
        if let Some(status) = self.filters.status {
            pairs.push(format!("status={status}"));
        }
        if let Some(priority) = self.filters.priority {
            pairs.push(format!("priority={priority}"));
        }
        pairs.push(format!("sortBy={}", self.sort.field));
        pairs.push(format!("sortOrder={}", self.sort.order));
        pairs.join("&")
    }

    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            status: self.filters.status,
            priority: self.filters.priority,
            ..TaskFilter::default()
        }
    }
}

/// Body of `GET /api/cache/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListPayload {
    pub generated_at: DateTime<Utc>,
    pub cache_window_seconds: u64,
    pub sort: TaskSort,
    pub filters: TaskListFilters,
    pub tasks: Vec<Task>,
}

/// Run a list query against the repository and stamp it with the current time.
pub async fn load_task_list(
    repository: &TaskRepository,
    query: &TaskListQuery,
    cache_window_seconds: u64,
) -> Result<TaskListPayload, TaskError> {
    let filter = query.filter();
    let options = FindOptions {
        order_by: Some(query.sort),
        ..FindOptions::default()
    };
    let tasks = repository
        .find_many((!filter.is_empty()).then_some(&filter), options)
        .await?;
    Ok(TaskListPayload {
        generated_at: Utc::now(),
        cache_window_seconds,
        sort: query.sort,
        filters: query.filters,
        tasks,
    })
}

/// Where the facade gets list payloads from.
#[async_trait]
pub trait TaskListSource: Send + Sync {
    async fn fetch(&self, query: &TaskListQuery) -> Result<TaskListPayload, TaskError>;
}

/// In-process source running the same query as the list endpoint.
#[derive(Debug, Clone)]
pub struct RepositorySource {
    repository: TaskRepository,
    cache_window_seconds: u64,
}

impl RepositorySource {
    pub fn new(repository: TaskRepository, cache_window_seconds: u64) -> Self {
        Self {
            repository,
            cache_window_seconds,
        }
    }
}

#[async_trait]
impl TaskListSource for RepositorySource {
    async fn fetch(&self, query: &TaskListQuery) -> Result<TaskListPayload, TaskError> {
        load_task_list(&self.repository, query, self.cache_window_seconds).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDiagnostics {
    pub execution_id: Uuid,
    pub executed_at: DateTime<Utc>,
    pub cache_key: String,
    pub revalidate_in_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTaskList {
    pub tasks: Vec<Task>,
    pub diagnostics: CacheDiagnostics,
}

impl CachedTaskList {
    fn new(payload: TaskListPayload, cache_key: String, revalidate_in_seconds: u64) -> Self {
        Self {
            tasks: payload.tasks,
            diagnostics: CacheDiagnostics {
                execution_id: Uuid::new_v4(),
                executed_at: payload.generated_at,
                cache_key,
                revalidate_in_seconds,
            },
        }
    }
}

fn tags_for(payload: &TaskListPayload) -> HashSet<CacheTag> {
    std::iter::once(CacheTag::TaskList)
        .chain(payload.tasks.iter().map(|task| CacheTag::Task(task.id)))
        .collect()
}

/// The two list strategies: revalidated (data cache plus per-pass memo) and
/// uncached.
pub struct TaskListFacade {
    source: Arc<dyn TaskListSource>,
    data: DataCache<TaskListPayload>,
    window: Duration,
}

impl std::fmt::Debug for TaskListFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskListFacade")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl TaskListFacade {
    pub fn new(source: Arc<dyn TaskListSource>, window: Duration) -> Self {
        Self {
            source,
            data: DataCache::new(),
            window,
        }
    }

    /// Served from the data cache while its entry is inside the window, and
    /// memoized per `pass`: a repeated query in the same pass returns the
    /// same `Arc` without executing again.
    pub async fn revalidated(
        &self,
        pass: &RenderPass,
        query: &TaskListQuery,
    ) -> Result<Arc<CachedTaskList>, TaskError> {
        let key = query.cache_key();
        pass.memoize(&key, || async {
            let (payload, lookup) = self
                .data
                .get_or_fetch(&key, self.window, tags_for, || self.source.fetch(query))
                .await?;
            if lookup == CacheLookup::Hit {
                tracing::debug!(
                    cache_key = %key,
                    generated_at = %payload.generated_at,
                    "serving cached task list"
                );
            }
            let window = payload.cache_window_seconds;
            Ok(CachedTaskList::new(payload, key.clone(), window))
        })
        .await
    }

    /// Always fetches; never reads or fills either cache.
    pub async fn uncached(&self, query: &TaskListQuery) -> Result<CachedTaskList, TaskError> {
        let payload = self.source.fetch(query).await?;
        Ok(CachedTaskList::new(payload, query.cache_key(), 0))
    }

    pub async fn invalidate(&self, tags: &[CacheTag]) -> usize {
        let removed = self.data.invalidate(tags).await;
        tracing::debug!(?tags, removed, "invalidated task list cache");
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::rstest;

    use super::*;
    use crate::schema::CreateTaskInput;

    const WINDOW: Duration = Duration::from_secs(15);

    struct CountingSource {
        inner: RepositorySource,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskListSource for CountingSource {
        async fn fetch(&self, query: &TaskListQuery) -> Result<TaskListPayload, TaskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(query).await
        }
    }

    async fn fixture() -> (TaskRepository, Arc<CountingSource>, TaskListFacade) {
        let repository = TaskRepository::in_memory();
        let mut urgent = CreateTaskInput::new("Urgent");
        urgent.priority = TaskPriority::High;
        repository.create(urgent).await.unwrap();
        repository.create(CreateTaskInput::new("Routine")).await.unwrap();

        let source = Arc::new(CountingSource {
            inner: RepositorySource::new(repository.clone(), WINDOW.as_secs()),
            calls: AtomicUsize::new(0),
        });
        let facade = TaskListFacade::new(source.clone(), WINDOW);
        (repository, source, facade)
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[rstest]
    #[case(&[], "sortBy=createdAt&sortOrder=desc")]
    #[case(&[("status", "todo")], "status=todo&sortBy=createdAt&sortOrder=desc")]
    #[case(
        &[("priority", "high"), ("sortBy", "priority"), ("sortOrder", "asc")],
        "priority=high&sortBy=priority&sortOrder=asc"
    )]
    #[case(&[("status", "archived"), ("priority", "urgent")], "sortBy=createdAt&sortOrder=desc")]
    #[case(&[("status", ""), ("sortBy", " ")], "sortBy=createdAt&sortOrder=desc")]
    fn cache_key_reflects_accepted_params(#[case] pairs: &[(&str, &str)], #[case] expected: &str) {
        let query = TaskListQuery::from_params(&params(pairs)).unwrap();
        assert_eq!(query.cache_key(), expected);
    }

    #[test]
    fn unknown_sort_is_rejected() {
        let errors =
            TaskListQuery::from_params(&params(&[("sortBy", "title"), ("sortOrder", "up")]))
                .unwrap_err();
        assert!(errors.contains("sortBy"));
        assert!(errors.contains("sortOrder"));
    }

    #[tokio::test]
    async fn load_task_list_applies_filters_and_sort() {
        let (repository, _, _) = fixture().await;
        let query = TaskListQuery::from_params(&params(&[("priority", "high")])).unwrap();
        let payload = load_task_list(&repository, &query, 15).await.unwrap();
        assert_eq!(payload.tasks.len(), 1);
        assert_eq!(payload.tasks[0].title, "Urgent");
        assert_eq!(payload.filters.priority, Some(TaskPriority::High));
        assert_eq!(payload.cache_window_seconds, 15);

        let everything = TaskListQuery::default();
        let payload = load_task_list(&repository, &everything, 15).await.unwrap();
        let titles: Vec<_> = payload.tasks.iter().map(|task| task.title.as_str()).collect();
        assert_eq!(titles, ["Routine", "Urgent"]);
    }

    #[tokio::test]
    async fn identical_queries_in_one_pass_share_one_execution() {
        let (_, source, facade) = fixture().await;
        let pass = RenderPass::new();
        let query = TaskListQuery::default();

        let first = facade.revalidated(&pass, &query).await.unwrap();
        let second = facade.revalidated(&pass, &query).await.unwrap();
        let fresh = facade.uncached(&query).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.diagnostics.execution_id, second.diagnostics.execution_id);
        assert_ne!(first.diagnostics.execution_id, fresh.diagnostics.execution_id);
        assert_eq!(first.tasks, fresh.tasks);
        assert_eq!(first.diagnostics.revalidate_in_seconds, 15);
        assert_eq!(fresh.diagnostics.revalidate_in_seconds, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn uncached_always_executes() {
        let (_, source, facade) = fixture().await;
        let query = TaskListQuery::default();
        let a = facade.uncached(&query).await.unwrap();
        let b = facade.uncached(&query).await.unwrap();
        assert_ne!(a.diagnostics.execution_id, b.diagnostics.execution_id);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn different_filters_execute_separately() {
        let (_, source, facade) = fixture().await;
        let pass = RenderPass::new();
        let all = facade.revalidated(&pass, &TaskListQuery::default()).await.unwrap();
        let high = TaskListQuery::from_params(&params(&[("priority", "high")])).unwrap();
        let filtered = facade.revalidated(&pass, &high).await.unwrap();
        assert_eq!(all.tasks.len(), 2);
        assert_eq!(filtered.tasks.len(), 1);
        assert_eq!(filtered.diagnostics.cache_key, "priority=high&sortBy=createdAt&sortOrder=desc");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn new_pass_inside_window_reuses_payload_with_new_execution() {
        let (repository, source, facade) = fixture().await;
        let query = TaskListQuery::default();
        let first = facade.revalidated(&RenderPass::new(), &query).await.unwrap();

        repository.create(CreateTaskInput::new("Late")).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        let second = facade.revalidated(&RenderPass::new(), &query).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.tasks.len(), 2);
        assert_eq!(first.diagnostics.executed_at, second.diagnostics.executed_at);
        assert_ne!(first.diagnostics.execution_id, second.diagnostics.execution_id);

        tokio::time::advance(WINDOW).await;
        let third = facade.revalidated(&RenderPass::new(), &query).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(third.tasks.len(), 3);
    }

    #[tokio::test]
    async fn invalidation_forces_a_refetch() {
        let (repository, source, facade) = fixture().await;
        let query = TaskListQuery::default();
        let before = facade.revalidated(&RenderPass::new(), &query).await.unwrap();
        let target = before.tasks[0].id;

        repository.delete(target).await.unwrap();
        assert_eq!(facade.invalidate(&[CacheTag::Task(target)]).await, 1);

        let after = facade.revalidated(&RenderPass::new(), &query).await.unwrap();
        assert_eq!(after.tasks.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(facade.invalidate(&[CacheTag::Task(target)]).await, 0);
    }

    #[test]
    fn payload_serializes_in_camel_case() {
        let payload = TaskListPayload {
            generated_at: Utc::now(),
            cache_window_seconds: 15,
            sort: TaskSort::default(),
            filters: TaskListFilters {
                status: Some(TaskStatus::InProgress),
                priority: None,
            },
            tasks: Vec::new(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["cacheWindowSeconds"], 15);
        assert_eq!(json["sort"]["field"], "createdAt");
        assert_eq!(json["sort"]["order"], "desc");
        assert_eq!(json["filters"]["status"], "in_progress");
        assert!(json["filters"].get("priority").is_none());
    }
}
