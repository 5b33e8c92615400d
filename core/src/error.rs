//! Error types for the task API client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers distinguish "the task
//! does not exist" from "the server returned an unexpected status." A
//! rejected form submission is not an error: it comes back as
//! `MutationResult::Rejected`. Everything else lands in `HttpError` with the
//! raw status and body.

use std::fmt;

/// Errors returned by `TaskClient` build and parse methods.
#[derive(Debug)]
pub enum ApiError {
    /// The server returned 404.
    NotFound,

    /// The server returned a status the operation does not expect.
    HttpError { status: u16, body: String },

    /// A redirect arrived without a `Location` header.
    MissingLocation,

    /// The response body could not be deserialized into the expected type.
    DeserializationError(String),

    /// The request could not be encoded.
    SerializationError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound => write!(f, "resource not found"),
            ApiError::HttpError { status, body } => {
                write!(f, "HTTP {status}: {body}")
            }
            ApiError::MissingLocation => write!(f, "redirect without a Location header"),
            ApiError::DeserializationError(msg) => {
                write!(f, "deserialization failed: {msg}")
            }
            ApiError::SerializationError(msg) => {
                write!(f, "serialization failed: {msg}")
            }
        }
    }
}

impl std::error::Error for ApiError {}
