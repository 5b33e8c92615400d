//! The persistence seam.
//!
//! # Design
//! `TaskStore` stands in for a relational table: rows keep `status` and
//! `priority` as plain strings, the way a database column would, and the
//! store never checks them. Turning a row into a `Task` (and rejecting rows
//! that do not fit the schema) is the repository's job.
//!
//! `InMemoryTaskStore` keeps rows in a `BTreeMap` behind a `tokio` `RwLock`.
//! Ids come from a counter that only moves forward, so a deleted id is
//! never handed out again.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::schema::{SortOrder, TaskFilter, TaskPriority, TaskSort, TaskSortField};

/// One stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values for an insert. The store fills in id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskRecord {
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
}

/// Column values for an update. `None` leaves the column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRecordPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_many(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        take: Option<usize>,
        skip: usize,
    ) -> Result<Vec<TaskRecord>, StoreError>;

    async fn find_unique(&self, id: i64) -> Result<Option<TaskRecord>, StoreError>;

    async fn count(&self, filter: &TaskFilter) -> Result<u64, StoreError>;

    async fn insert(&self, record: NewTaskRecord) -> Result<TaskRecord, StoreError>;

    /// `Ok(None)` when no row has this id.
    async fn update(&self, id: i64, patch: TaskRecordPatch)
        -> Result<Option<TaskRecord>, StoreError>;

    /// `Ok(false)` when no row has this id.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    async fn delete_many(&self, filter: &TaskFilter) -> Result<u64, StoreError>;
}

#[derive(Debug)]
struct Table {
    rows: BTreeMap<i64, TaskRecord>,
    last_id: i64,
}

#[derive(Debug)]
pub struct InMemoryTaskStore {
    table: RwLock<Table>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                rows: BTreeMap::new(),
                last_id: 0,
            }),
        }
    }

    /// Put a row in verbatim, bypassing id assignment and timestamps.
    ///
    /// Used to load fixtures, including rows a schema-checking caller would
    /// refuse.
    pub async fn seed(&self, record: TaskRecord) {
        let mut table = self.table.write().await;
        table.last_id = table.last_id.max(record.id);
        table.rows.insert(record.id, record);
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_many(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        take: Option<usize>,
        skip: usize,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let table = self.table.read().await;
        let mut rows: Vec<TaskRecord> = table
            .rows
            .values()
            .filter(|row| matches(filter, row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| compare(sort, a, b));
        let rows = rows.into_iter().skip(skip);
        Ok(match take {
            Some(take) => rows.take(take).collect(),
            None => rows.collect(),
        })
    }

    async fn find_unique(&self, id: i64) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn count(&self, filter: &TaskFilter) -> Result<u64, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|row| matches(filter, row)).count() as u64)
    }

    async fn insert(&self, record: NewTaskRecord) -> Result<TaskRecord, StoreError> {
        let mut table = self.table.write().await;
        let id = table.last_id + 1;
        table.last_id = id;
        let now = Utc::now();
        let row = TaskRecord {
            id,
            title: record.title,
            description: record.description,
            status: record.status,
            priority: record.priority,
            assignee: record.assignee,
            due_date: record.due_date,
            completed: record.completed,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        id: i64,
        patch: TaskRecordPatch,
    ) -> Result<Option<TaskRecord>, StoreError> {
        let mut table = self.table.write().await;
        let Some(row) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            row.title = title;
        }
        if let Some(description) = patch.description {
            row.description = Some(description);
        }
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(priority) = patch.priority {
            row.priority = priority;
        }
        if let Some(assignee) = patch.assignee {
            row.assignee = Some(assignee);
        }
        if let Some(due_date) = patch.due_date {
            row.due_date = Some(due_date);
        }
        if let Some(completed) = patch.completed {
            row.completed = completed;
        }
        // Never move updated_at backwards, even if the wall clock does.
        row.updated_at = Utc::now().max(row.updated_at);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn delete_many(&self, filter: &TaskFilter) -> Result<u64, StoreError> {
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table.rows.retain(|_, row| !matches(filter, row));
        Ok((before - table.rows.len()) as u64)
    }
}

fn matches(filter: &TaskFilter, row: &TaskRecord) -> bool {
    filter.status.map_or(true, |status| row.status == status.as_str())
        && filter
            .priority
            .map_or(true, |priority| row.priority == priority.as_str())
        && filter
            .assignee
            .as_deref()
            .map_or(true, |assignee| row.assignee.as_deref() == Some(assignee))
        && filter
            .completed
            .map_or(true, |completed| row.completed == completed)
}

/// Rows without a due date sort last in either direction; ties fall back to
/// id in the requested direction.
fn compare(sort: TaskSort, a: &TaskRecord, b: &TaskRecord) -> Ordering {
    let directed = |ordering: Ordering| match sort.order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    };
    let primary = match sort.field {
        TaskSortField::CreatedAt => directed(a.created_at.cmp(&b.created_at)),
        TaskSortField::UpdatedAt => directed(a.updated_at.cmp(&b.updated_at)),
        TaskSortField::Priority => {
            directed(priority_rank(&a.priority).cmp(&priority_rank(&b.priority)))
        }
        TaskSortField::DueDate => match (a.due_date, b.due_date) {
            (Some(a), Some(b)) => directed(a.cmp(&b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    primary.then_with(|| directed(a.id.cmp(&b.id)))
}

fn priority_rank(priority: &str) -> u8 {
    priority
        .parse::<TaskPriority>()
        .map_or(u8::MAX, TaskPriority::rank)
}
