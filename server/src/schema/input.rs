use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::task::title_length;
use super::{FieldErrors, PayloadReader, TaskPriority, TaskStatus};

/// Fields accepted when creating a task. Anything else is rejected.
const CREATE_FIELDS: [&str; 6] = [
    "title",
    "description",
    "status",
    "priority",
    "assignee",
    "dueDate",
];

/// Validated input for creating a task.
///
/// The store assigns `id`, the timestamps and `completed`; none of them can
/// be supplied here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    #[validate(custom(function = "title_length"))]
    pub title: String,
    #[validate(length(max = 1000, message = "Description must be less than 1000 characters"))]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[validate(email(message = "Invalid email format"))]
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl CreateTaskInput {
    /// Input with only a title; everything else takes its default.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            assignee: None,
            due_date: None,
        }
    }

    pub fn parse(payload: &Value) -> Result<Self, FieldErrors> {
        let mut reader = PayloadReader::new(payload)?;
        reader.reject_unknown(&CREATE_FIELDS);
        reader.require("title");

        let input = Self {
            title: reader.string("title").unwrap_or_default(),
            description: reader.string("description"),
            status: reader.enumeration("status").unwrap_or_default(),
            priority: reader.enumeration("priority").unwrap_or_default(),
            assignee: reader.string("assignee"),
            due_date: reader.date_time("dueDate"),
        };

        let mut errors = reader.finish();
        if let Err(failures) = input.validate() {
            errors.absorb(&failures);
        }
        errors.into_result(input)
    }
}

/// Validated partial update keyed by `id`. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskInput {
    #[validate(range(min = 1, message = "Number must be greater than 0"))]
    pub id: i64,
    pub title: Option<String>,
    #[validate(length(max = 1000, message = "Description must be less than 1000 characters"))]
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[validate(email(message = "Invalid email format"))]
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl UpdateTaskInput {
    pub fn parse(payload: &Value) -> Result<Self, FieldErrors> {
        let mut reader = PayloadReader::new(payload)?;
        let mut allowed = CREATE_FIELDS.to_vec();
        allowed.push("id");
        reader.reject_unknown(&allowed);
        reader.require("id");

        let input = Self {
            id: reader.integer("id").unwrap_or_default(),
            title: reader.string("title"),
            description: reader.string("description"),
            status: reader.enumeration("status"),
            priority: reader.enumeration("priority"),
            assignee: reader.string("assignee"),
            due_date: reader.date_time("dueDate"),
        };

        let mut errors = reader.finish();
        if let Err(failures) = input.validate() {
            errors.absorb(&failures);
        }
        if let Some(Err(failure)) = input.title.as_deref().map(title_length) {
            if !errors.contains("title") {
                errors.add("title", failure.to_string());
            }
        }
        errors.into_result(input)
    }

    /// True when the update carries no field besides `id`.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.due_date.is_none()
    }
}

/// A bare task id, as submitted by the delete and toggle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TaskIdInput {
    #[validate(range(min = 1, message = "Number must be greater than 0"))]
    pub id: i64,
}

impl TaskIdInput {
    pub fn parse(payload: &Value) -> Result<Self, FieldErrors> {
        let mut reader = PayloadReader::new(payload)?;
        reader.require("id");
        let input = Self {
            id: reader.integer("id").unwrap_or_default(),
        };
        let mut errors = reader.finish();
        if let Err(failures) = input.validate() {
            errors.absorb(&failures);
        }
        errors.into_result(input)
    }
}
