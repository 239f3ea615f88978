//! # Outcomes
//!
//! The `(errors, value)` pair returned by every catching boundary, and the
//! [`Raised`] value that guarded operations return on their error path.

use serde::{Deserialize, Serialize};

use crate::types::{FailureRecord, Result};
use crate::wrap::Wrap;

/// The outcome of a fallible operation.
///
/// `errors` is either absent or a non-empty ordered sequence; it is never an
/// empty list. `value` is absent on failure unless the failure carried an
/// override value through [`FailureRecord::response`], so callers check the
/// errors first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawOutcome<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Outcome<T> {
    errors: Option<Vec<FailureRecord>>,
    value: Option<T>,
}

// Wire shape of an outcome before the error list is normalized
#[derive(Deserialize)]
struct RawOutcome<T> {
    errors: Option<Vec<FailureRecord>>,
    value: Option<T>,
}

impl<T> From<RawOutcome<T>> for Outcome<T> {
    fn from(raw: RawOutcome<T>) -> Self {
        match raw.errors {
            Some(errors) => Self::from_parts(errors, raw.value),
            None => Self {
                errors: None,
                value: raw.value,
            },
        }
    }
}

impl<T> Outcome<T> {
    /// A successful outcome
    pub fn success(value: T) -> Self {
        Self {
            errors: None,
            value: Some(value),
        }
    }

    /// A failed outcome. An empty list is replaced by a single "Unknown error" record.
    pub fn failure(errors: Vec<FailureRecord>) -> Self {
        Self::from_parts(errors, None)
    }

    pub(crate) fn from_parts(mut errors: Vec<FailureRecord>, value: Option<T>) -> Self {
        if errors.is_empty() {
            errors.push(FailureRecord::operation("Unknown error"));
        }
        Self {
            errors: Some(errors),
            value,
        }
    }

    pub fn errors(&self) -> Option<&[FailureRecord]> {
        self.errors.as_deref()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_none()
    }

    pub fn is_err(&self) -> bool {
        self.errors.is_some()
    }

    /// Splits the outcome into its `(errors, value)` pair
    pub fn into_parts(self) -> (Option<Vec<FailureRecord>>, Option<T>) {
        (self.errors, self.value)
    }

    /// Converts to a standard Result. Errors win over an override value.
    pub fn into_result(self) -> std::result::Result<T, Vec<FailureRecord>> {
        match (self.errors, self.value) {
            (Some(errors), _) => Err(errors),
            (None, Some(value)) => Ok(value),
            (None, None) => Err(vec![FailureRecord::operation("Unknown error")]),
        }
    }

    /// Converts to a Result whose error wraps the whole error sequence under `message`,
    /// ready to be raised into an outer boundary
    pub fn or_wrap<S: Into<String>>(self, message: S) -> Result<T> {
        let message: String = message.into();
        self.into_result()
            .map_err(|errors| Wrap::new(message).cause(errors).build())
    }

    /// Maps the value, keeping the errors untouched
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        Outcome {
            errors: self.errors,
            value: self.value.map(f),
        }
    }
}

/// A failure on its way to a catching boundary.
///
/// Pairs the failure with an optional override value that becomes the
/// outcome's value even though the outcome also carries errors.
#[derive(Debug, Clone)]
pub struct Raised<T> {
    record: FailureRecord,
    response: Option<T>,
}

impl<T> Raised<T> {
    pub fn new(record: FailureRecord) -> Self {
        Self {
            record,
            response: None,
        }
    }

    /// Sets the value reported alongside the failure
    pub fn with_response(mut self, value: T) -> Self {
        self.response = Some(value);
        self
    }

    pub fn record(&self) -> &FailureRecord {
        &self.record
    }

    pub fn response(&self) -> Option<&T> {
        self.response.as_ref()
    }

    /// Flattens the failure into an outcome, optionally preceded by a global message record
    pub(crate) fn into_outcome(self, global_message: Option<&str>) -> Outcome<T> {
        let mut errors = Vec::with_capacity(self.record.nested().len() + 2);
        if let Some(message) = global_message {
            errors.push(FailureRecord::synthetic(message));
        }
        errors.extend(self.record.flatten());
        Outcome::from_parts(errors, self.response)
    }
}

impl<T> From<FailureRecord> for Raised<T> {
    fn from(record: FailureRecord) -> Self {
        Self::new(record)
    }
}

impl<T> From<std::io::Error> for Raised<T> {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.into())
    }
}

impl<T> From<serde_json::Error> for Raised<T> {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.into())
    }
}

impl<T> From<anyhow::Error> for Raised<T> {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.into())
    }
}

impl<T> From<String> for Raised<T> {
    fn from(message: String) -> Self {
        Self::new(message.into())
    }
}

impl<T> From<&str> for Raised<T> {
    fn from(message: &str) -> Self {
        Self::new(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_outcome() {
        let outcome = Outcome::success(123);
        assert!(outcome.is_ok());
        assert!(outcome.errors().is_none());
        assert_eq!(outcome.value(), Some(&123));
        assert_eq!(outcome.into_result().unwrap(), 123);
    }

    #[test]
    fn test_failure_never_holds_an_empty_list() {
        let outcome: Outcome<i32> = Outcome::failure(Vec::new());
        let errors = outcome.errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "Unknown error");
    }

    #[test]
    fn test_response_survives_flattening() {
        let raised = FailureRecord::operation("Partial result").response(7);
        let outcome = raised.into_outcome(None);

        assert!(outcome.is_err());
        assert_eq!(outcome.value(), Some(&7));
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_global_message_is_prepended() {
        let raised: Raised<()> = FailureRecord::operation("Boom").into();
        let (errors, value) = raised.into_outcome(Some("Loading user failed")).into_parts();
        let errors = errors.unwrap();

        assert!(value.is_none());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message(), "Loading user failed");
        assert!(errors[0].trace().is_none());
        assert_eq!(errors[1].message(), "Boom");
    }

    #[test]
    fn test_deserialized_empty_error_list_is_normalized() {
        let outcome: Outcome<i32> =
            serde_json::from_str(r#"{"errors":[],"value":null}"#).unwrap();

        assert!(outcome.is_err());
        assert_eq!(outcome.errors().map(<[FailureRecord]>::len), Some(1));
        assert_eq!(outcome.errors().unwrap()[0].message(), "Unknown error");
        assert_eq!(outcome.into_result().unwrap_err().len(), 1);
    }

    #[test]
    fn test_outcome_survives_serialization() {
        let failed: Outcome<i32> = Outcome::failure(vec![FailureRecord::operation("Boom")]);
        let restored: Outcome<i32> =
            serde_json::from_str(&serde_json::to_string(&failed).unwrap()).unwrap();
        assert_eq!(restored.errors().unwrap()[0].message(), "Boom");

        let success: Outcome<i32> = serde_json::from_str(r#"{"errors":null,"value":4}"#).unwrap();
        assert!(success.is_ok());
        assert_eq!(success.value(), Some(&4));
    }

    #[test]
    fn test_or_wrap_nests_the_errors() {
        let outcome: Outcome<i32> = Outcome::failure(vec![FailureRecord::operation("inner")]);
        let record = outcome.or_wrap("outer").unwrap_err();

        assert_eq!(record.message(), "outer");
        assert_eq!(record.nested().len(), 1);
        assert_eq!(record.nested()[0].message(), "inner");
    }
}
