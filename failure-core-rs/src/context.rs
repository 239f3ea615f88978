//! # Failure Context
//!
//! Extension trait for adding context to an error before it is raised into
//! an outer catching boundary.

use serde::Serialize;

use crate::types::{FailureRecord, Result};
use crate::wrap::Wrap;

/// A trait for turning any convertible error into a failure record, with context
pub trait WithFailure<T> {
    /// Converts the error into a failure record
    fn or_failure(self) -> Result<T>;

    /// Wraps the error under `message`; the original error becomes a nested cause
    fn wrap_failure<S>(self, message: S) -> Result<T>
    where
        S: Into<String>;

    /// Attaches metadata to the converted failure record
    fn with_metadata<V>(self, metadata: V) -> Result<T>
    where
        V: Serialize;
}

impl<T, E> WithFailure<T> for std::result::Result<T, E>
where
    E: Into<FailureRecord>,
{
    fn or_failure(self) -> Result<T> {
        self.map_err(Into::into)
    }

    fn wrap_failure<S>(self, message: S) -> Result<T>
    where
        S: Into<String>,
    {
        self.map_err(|error| {
            let message: String = message.into();
            let cause: FailureRecord = error.into();
            Wrap::new(message).cause(cause).build()
        })
    }

    fn with_metadata<V>(self, metadata: V) -> Result<T>
    where
        V: Serialize,
    {
        self.map_err(|error| {
            let record: FailureRecord = error.into();
            match serde_json::to_value(metadata) {
                Ok(value) => record.with_metadata(value),
                Err(_) => record,
            }
        })
    }
}
