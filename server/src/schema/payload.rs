use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

use super::{FieldErrors, UnknownVariant, FORM_KEY};

/// Reads typed fields out of an untyped JSON object, recording one error per
/// field that is present but of the wrong shape.
///
/// Every accessor returns `None` both for an absent key and for a key that
/// failed; `finish` hands back whatever was collected.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    object: &'a Map<String, Value>,
    errors: FieldErrors,
}

impl<'a> PayloadReader<'a> {
    pub fn new(payload: &'a Value) -> Result<Self, FieldErrors> {
        match payload {
            Value::Object(object) => Ok(Self {
                object,
                errors: FieldErrors::new(),
            }),
            other => Err(FieldErrors::single(
                FORM_KEY,
                format!("Expected object, received {}", kind(other)),
            )),
        }
    }

    /// Flag every key outside `allowed`.
    pub fn reject_unknown(&mut self, allowed: &[&str]) {
        let object = self.object;
        for key in object.keys() {
            if !allowed.contains(&key.as_str()) {
                self.errors.add(key.clone(), "Unrecognized key");
            }
        }
    }

    pub fn is_present(&self, key: &str) -> bool {
        self.object.contains_key(key)
    }

    /// Record `Required` when `key` is missing altogether.
    pub fn require(&mut self, key: &str) {
        if !self.is_present(key) {
            self.errors.add(key, "Required");
        }
    }

    pub fn string(&mut self, key: &str) -> Option<String> {
        let object = self.object;
        match object.get(key)? {
            Value::String(value) => Some(value.clone()),
            other => self.mismatch(key, "string", other),
        }
    }

    pub fn integer(&mut self, key: &str) -> Option<i64> {
        let object = self.object;
        match object.get(key)? {
            Value::Number(number) => match number.as_i64() {
                Some(value) => Some(value),
                None => {
                    self.errors.add(key, "Expected integer, received float");
                    None
                }
            },
            other => self.mismatch(key, "number", other),
        }
    }

    pub fn boolean(&mut self, key: &str) -> Option<bool> {
        let object = self.object;
        match object.get(key)? {
            Value::Bool(value) => Some(*value),
            other => self.mismatch(key, "boolean", other),
        }
    }

    /// An RFC 3339 timestamp, or a bare `YYYY-MM-DD` date taken as midnight UTC.
    pub fn date_time(&mut self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.string(key)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        if let Some(midnight) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Some(midnight.and_utc());
        }
        self.errors.add(key, "Invalid date");
        None
    }

    pub fn enumeration<T>(&mut self, key: &str) -> Option<T>
    where
        T: FromStr<Err = UnknownVariant>,
    {
        let raw = self.string(key)?;
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(error) => {
                self.errors.add(key, error.to_string());
                None
            }
        }
    }

    pub fn finish(self) -> FieldErrors {
        self.errors
    }

    fn mismatch<T>(&mut self, key: &str, expected: &str, received: &Value) -> Option<T> {
        self.errors.add(
            key,
            format!("Expected {expected}, received {}", kind(received)),
        );
        None
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
