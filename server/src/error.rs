//! Error taxonomy and its HTTP rendering.
//!
//! # Design
//! `Validation` carries field-level messages meant for the caller.
//! `NotFound` names the targeted id. `Store` wraps anything the persistence
//! layer reports; its detail is logged and never rendered to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::FieldErrors;

/// Failures reported by the persistence layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record no longer satisfies the task schema.
    #[error("task {id} failed schema validation: {reason}")]
    Corrupt { id: i64, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("task {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<FieldErrors> for TaskError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// JSON body of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
}

#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    pub status: StatusCode,
    pub error: ApiError,
}

impl ApiErrorResponse {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ApiError {
                code: code.to_string(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn validation(details: FieldErrors) -> Self {
        let mut response =
            Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed");
        response.error.details = Some(details);
        response
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Something went wrong. Please try again.",
        )
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<TaskError> for ApiErrorResponse {
    fn from(error: TaskError) -> Self {
        match error {
            TaskError::Validation(details) => Self::validation(details),
            TaskError::NotFound(id) => Self::not_found(format!("Task {id} not found")),
            TaskError::Store(error) => {
                tracing::error!(%error, "store failure while serving request");
                Self::internal()
            }
        }
    }
}
