//! Task shape, closed enumerations and the input shapes derived from them.
//!
//! # Design
//! Untyped payloads (JSON objects, or form fields mapped to one) are read by
//! `PayloadReader`, which collects type-level problems per field. The typed
//! value is then run through `validator` for length, email and range
//! constraints. Both passes report into one `FieldErrors` map, so a caller
//! always sees every failing field at once.

/// `FromStr`/`Display` for a closed enumeration with `ALL` and `as_str`.
macro_rules! closed_enum {
    ($ty:ty, $names:expr) => {
        impl ::std::str::FromStr for $ty {
            type Err = $crate::schema::UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .into_iter()
                    .find(|variant| variant.as_str() == value)
                    .ok_or_else(|| $crate::schema::UnknownVariant {
                        expected: $names,
                        received: value.to_string(),
                    })
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

mod input;
mod payload;
mod query;
mod task;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

pub use input::{CreateTaskInput, TaskIdInput, UpdateTaskInput};
pub use payload::PayloadReader;
pub use query::{SortOrder, TaskFilter, TaskQuery, TaskSort, TaskSortField};
pub use task::{Task, TaskPriority, TaskStatus, UnknownVariant};

/// Key used for errors that belong to the submission as a whole.
pub const FORM_KEY: &str = "form";

/// Field-level validation failures, keyed by the payload's field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Fold `validator` output in, skipping fields that already failed at
    /// the type level so each field reports its first real problem.
    pub fn absorb(&mut self, errors: &ValidationErrors) {
        for (field, failures) in errors.field_errors() {
            let key = payload_key(&field.to_string());
            if self.contains(&key) {
                continue;
            }
            for failure in failures.iter() {
                let message = failure
                    .message
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| format!("Invalid value ({})", failure.code));
                self.add(key.clone(), message);
            }
        }
    }

    /// `Ok(value)` when no errors were collected.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut collected = Self::new();
        collected.absorb(&errors);
        collected
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{field}: {}", messages.join(", "))?;
        }
        Ok(())
    }
}

/// Map a Rust field name reported by `validator` to the camelCase key used
/// on the wire. Struct-level failures land under `form`.
fn payload_key(field: &str) -> String {
    if field == "__all__" {
        return FORM_KEY.to_string();
    }
    let mut key = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            key.extend(ch.to_uppercase());
            upper = false;
        } else {
            key.push(ch);
        }
    }
    key
}
