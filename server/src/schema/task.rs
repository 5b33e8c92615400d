use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Workflow state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [Self; 3] = [Self::Todo, Self::InProgress, Self::Done];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

/// Importance of a task. Ordered low < medium < high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

/// A value outside one of the closed enumerations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub expected: &'static [&'static str],
    pub received: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected = self
            .expected
            .iter()
            .map(|name| format!("'{name}'"))
            .collect::<Vec<_>>()
            .join(" | ");
        write!(
            f,
            "Invalid enum value. Expected {expected}, received '{}'",
            self.received
        )
    }
}

impl std::error::Error for UnknownVariant {}

closed_enum!(TaskStatus, &["todo", "in_progress", "done"]);
closed_enum!(TaskPriority, &["low", "medium", "high"]);

/// A stored task, as handed out by the repository.
///
/// Every `Task` leaving the repository has passed `Validate`, so holders can
/// rely on the field constraints and on `created_at <= updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "timestamps_ordered"))]
pub struct Task {
    #[validate(range(min = 1, message = "Number must be greater than 0"))]
    pub id: i64,
    #[validate(custom(function = "title_length"))]
    pub title: String,
    #[validate(length(max = 1000, message = "Description must be less than 1000 characters"))]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[validate(email(message = "Invalid email format"))]
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const TITLE_MAX_CHARS: usize = 255;

/// Titles are 1..=255 characters, counted as Unicode scalar values.
pub(crate) fn title_length(title: &str) -> Result<(), ValidationError> {
    let chars = title.chars().count();
    if chars == 0 {
        return Err(ValidationError::new("length").with_message("Title is required".into()));
    }
    if chars > TITLE_MAX_CHARS {
        return Err(ValidationError::new("length")
            .with_message("Title must be less than 255 characters".into()));
    }
    Ok(())
}

fn timestamps_ordered(task: &Task) -> Result<(), ValidationError> {
    if task.created_at <= task.updated_at {
        return Ok(());
    }
    Err(ValidationError::new("timestamps").with_message("updatedAt precedes createdAt".into()))
}
