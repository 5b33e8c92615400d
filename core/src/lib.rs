//! Synchronous API client core for the task board service.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). The caller executes the
//! actual HTTP round-trip.
//!
//! # Design
//! - `TaskClient` is stateless; it holds only `base_url`.
//! - Each operation is split into `build_*` (produces request) and
//!   `parse_*` (consumes response).
//! - Mutations resolve to `MutationResult`: the redirect the server answered
//!   with, or the field errors it rejected the submission with.
//! - DTOs are defined independently from the server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod error;
pub mod http;
pub mod types;

pub use client::TaskClient;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use types::{
    CacheDiagnostics, CachedTaskList, FormErrors, ListFilters, ListQuery, ListSort,
    MutationResult, NewTask, SortField, SortOrder, Task, TaskChanges, TaskListPage, TaskPriority,
    TaskStatus,
};
