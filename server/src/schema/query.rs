use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::{FieldErrors, PayloadReader, TaskPriority, TaskStatus};

pub const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
}

impl TaskSortField {
    pub const ALL: [Self; 4] = [Self::CreatedAt, Self::UpdatedAt, Self::DueDate, Self::Priority];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
            Self::DueDate => "dueDate",
            Self::Priority => "priority",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub const ALL: [Self; 2] = [Self::Asc, Self::Desc];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

closed_enum!(
    TaskSortField,
    &["createdAt", "updatedAt", "dueDate", "priority"]
);
closed_enum!(SortOrder, &["asc", "desc"]);

/// Ordering for list queries. Defaults to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TaskSort {
    pub field: TaskSortField,
    pub order: SortOrder,
}

impl TaskSort {
    pub const fn new(field: TaskSortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

/// Equality filters over stored tasks. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<String>,
    pub completed: Option<bool>,
}

impl TaskFilter {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn priority(priority: TaskPriority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn assignee(assignee: impl Into<String>) -> Self {
        Self {
            assignee: Some(assignee.into()),
            ..Self::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.completed.is_none()
    }
}

/// Filters plus sort and page, as accepted by the list server action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[validate(email(message = "Invalid email format"))]
    pub assignee: Option<String>,
    pub completed: Option<bool>,
    pub sort_by: TaskSortField,
    pub sort_order: SortOrder,
    #[validate(range(min = 1, message = "Number must be greater than 0"))]
    pub limit: i64,
    #[validate(range(min = 0, message = "Number must be greater than or equal to 0"))]
    pub offset: i64,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            assignee: None,
            completed: None,
            sort_by: TaskSortField::default(),
            sort_order: SortOrder::default(),
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl TaskQuery {
    /// Unknown keys are ignored; every known key is checked.
    pub fn parse(payload: &Value) -> Result<Self, FieldErrors> {
        let mut reader = PayloadReader::new(payload)?;
        let defaults = Self::default();

        let query = Self {
            status: reader.enumeration("status"),
            priority: reader.enumeration("priority"),
            assignee: reader.string("assignee"),
            completed: reader.boolean("completed"),
            sort_by: reader.enumeration("sortBy").unwrap_or(defaults.sort_by),
            sort_order: reader.enumeration("sortOrder").unwrap_or(defaults.sort_order),
            limit: reader.integer("limit").unwrap_or(defaults.limit),
            offset: reader.integer("offset").unwrap_or(defaults.offset),
        };

        let mut errors = reader.finish();
        if let Err(failures) = query.validate() {
            errors.absorb(&failures);
        }
        errors.into_result(query)
    }

    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            status: self.status,
            priority: self.priority,
            assignee: self.assignee.clone(),
            completed: self.completed,
        }
    }

    pub fn sort(&self) -> TaskSort {
        TaskSort::new(self.sort_by, self.sort_order)
    }

    pub fn take(&self) -> usize {
        usize::try_from(self.limit).unwrap_or(0)
    }

    pub fn skip(&self) -> usize {
        usize::try_from(self.offset).unwrap_or(0)
    }
}
