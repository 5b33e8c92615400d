//! Stateless HTTP request builder and response parser for the task API.
//!
//! # Design
//! `TaskClient` holds only a `base_url`. Each operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`. Reads are JSON; writes are
//! form-encoded submissions answered by a redirect or a rejection.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    CachedTaskList, ListQuery, MutationResult, NewTask, RejectedForm, Task, TaskChanges,
    TaskListPage,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Synchronous, stateless client for the task API.
#[derive(Debug, Clone)]
pub struct TaskClient {
    base_url: String,
}

impl TaskClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_list_cached_tasks(&self, query: &ListQuery) -> Result<HttpRequest, ApiError> {
        self.get_with_query("/api/cache/tasks", query)
    }

    pub fn parse_list_cached_tasks(
        &self,
        response: HttpResponse,
    ) -> Result<CachedTaskList, ApiError> {
        check_status(&response, 200)?;
        decode(&response)
    }

    pub fn build_list_page(&self, query: &ListQuery) -> Result<HttpRequest, ApiError> {
        self.get_with_query("/tasks", query)
    }

    pub fn parse_list_page(&self, response: HttpResponse) -> Result<TaskListPage, ApiError> {
        check_status(&response, 200)?;
        decode(&response)
    }

    pub fn build_get_task(&self, id: i64) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/tasks/{id}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn parse_get_task(&self, response: HttpResponse) -> Result<Task, ApiError> {
        check_status(&response, 200)?;
        decode(&response)
    }

    pub fn build_create_task(&self, input: &NewTask) -> Result<HttpRequest, ApiError> {
        Ok(self.form_post("/tasks", encode(input)?))
    }

    pub fn parse_create_task(&self, response: HttpResponse) -> Result<MutationResult, ApiError> {
        parse_mutation(response)
    }

    pub fn build_update_task(
        &self,
        id: i64,
        changes: &TaskChanges,
    ) -> Result<HttpRequest, ApiError> {
        let mut body = task_id_form(id);
        let changes = encode(changes)?;
        if !changes.is_empty() {
            body.push('&');
            body.push_str(&changes);
        }
        Ok(self.form_post("/tasks/update", body))
    }

    pub fn parse_update_task(&self, response: HttpResponse) -> Result<MutationResult, ApiError> {
        parse_mutation(response)
    }

    pub fn build_delete_task(&self, id: i64) -> HttpRequest {
        self.form_post("/tasks/delete", task_id_form(id))
    }

    pub fn parse_delete_task(&self, response: HttpResponse) -> Result<MutationResult, ApiError> {
        parse_mutation(response)
    }

    pub fn build_toggle_task(&self, id: i64) -> HttpRequest {
        self.form_post("/tasks/toggle", task_id_form(id))
    }

    pub fn parse_toggle_task(&self, response: HttpResponse) -> Result<MutationResult, ApiError> {
        parse_mutation(response)
    }

    fn get_with_query(&self, route: &str, query: &ListQuery) -> Result<HttpRequest, ApiError> {
        let query = encode(query)?;
        let path = if query.is_empty() {
            format!("{}{route}", self.base_url)
        } else {
            format!("{}{route}?{query}", self.base_url)
        };
        Ok(HttpRequest {
            method: HttpMethod::Get,
            path,
            headers: Vec::new(),
            body: None,
        })
    }

    fn form_post(&self, route: &str, body: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}{route}", self.base_url),
            headers: vec![("content-type".to_string(), FORM_CONTENT_TYPE.to_string())],
            body: Some(body),
        }
    }
}

fn task_id_form(id: i64) -> String {
    format!("taskId={id}")
}

fn encode<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_urlencoded::to_string(value).map_err(|e| ApiError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// 303 carries the next location; 422 carries field errors.
fn parse_mutation(response: HttpResponse) -> Result<MutationResult, ApiError> {
    match response.status {
        303 => response
            .header("location")
            .map(|location| MutationResult::Redirect(location.to_string()))
            .ok_or(ApiError::MissingLocation),
        422 => {
            let rejected: RejectedForm = decode(&response)?;
            Ok(MutationResult::Rejected(rejected.errors))
        }
        _ => Err(unexpected(&response)),
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    Err(unexpected(response))
}

fn unexpected(response: &HttpResponse) -> ApiError {
    if response.status == 404 {
        return ApiError::NotFound;
    }
    ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    }
}
