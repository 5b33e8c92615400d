//! Cached reads of the task list.
//!
//! # Design
//! Two layers sit in front of the repository. `DataCache` holds payloads for
//! a fixed window across requests and drops them by tag on mutation.
//! `RenderPass` lives for a single request and hands back the same shared
//! result for identical queries. `TaskListFacade` combines them, and offers
//! an uncached path that bypasses both.

mod data;
mod facade;
mod memo;

pub use data::{CacheLookup, CacheTag, DataCache};
pub use facade::{
    load_task_list, CacheDiagnostics, CachedTaskList, RepositorySource, TaskListFacade,
    TaskListFilters, TaskListPayload, TaskListQuery, TaskListSource,
};
pub use memo::RenderPass;
