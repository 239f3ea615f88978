//! # Failure Records
//!
//! This module provides the structured representation of a single failure
//! and the taxonomy used to categorize failures across the core.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::outcome::Raised;

/// A type alias for Result with the error type defaulting to a single failure record
pub type Result<T, E = FailureRecord> = std::result::Result<T, E>;

/// Categorizes the failures produced or captured by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// A caller passed a missing or unusable argument to a boundary
    Argument,
    /// The guarded operation itself failed
    Operation,
    /// A failure built by wrapping other failures
    Composite,
    /// A required field was absent
    Validation,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Argument => write!(f, "ArgumentError"),
            FailureKind::Operation => write!(f, "OperationFailure"),
            FailureKind::Composite => write!(f, "CompositeFailure"),
            FailureKind::Validation => write!(f, "ValidationFailure"),
        }
    }
}

/// One logical failure.
///
/// Records are immutable once built: the consuming `with_*` methods are meant
/// for the construction site only, and everything else goes through accessors.
/// Nested causes only live between [`crate::Wrap::build`] and the next
/// catching boundary, which flattens them into the outcome's error sequence.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct FailureRecord {
    id: Uuid,
    kind: FailureKind,
    message: String,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
    #[serde(skip)]
    nested: Vec<FailureRecord>,
}

impl FailureRecord {
    /// Creates a new record of the given kind and captures its trace
    pub fn new<S: Into<String>>(kind: FailureKind, message: S) -> Self {
        let message = message.into();
        let trace = capture_trace(kind, &message);
        Self {
            id: Uuid::new_v4(),
            kind,
            message,
            timestamp: Utc::now(),
            operation_id: crate::logging::current_operation_id(),
            trace: Some(trace),
            metadata: None,
            nested: Vec::new(),
        }
    }

    /// Creates an operation failure
    pub fn operation<S: Into<String>>(message: S) -> Self {
        Self::new(FailureKind::Operation, message)
    }

    /// Creates an argument failure
    pub fn argument<S: Into<String>>(message: S) -> Self {
        Self::new(FailureKind::Argument, message)
    }

    /// Creates a validation failure
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::new(FailureKind::Validation, message)
    }

    /// Creates a record that only carries a message, without a trace
    pub fn synthetic<S: Into<String>>(message: S) -> Self {
        Self {
            trace: None,
            ..Self::new(FailureKind::Composite, message)
        }
    }

    /// Attaches producer metadata. `null` is ignored.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        if !metadata.is_null() {
            self.metadata = Some(metadata);
        }
        self
    }

    pub(crate) fn with_trace(mut self, trace: Option<String>) -> Self {
        self.trace = trace;
        self
    }

    pub(crate) fn with_nested(mut self, nested: Vec<FailureRecord>) -> Self {
        self.nested = nested;
        self
    }

    /// Pairs this failure with a value the catching boundary reports alongside it
    pub fn response<T>(self, value: T) -> Raised<T> {
        Raised::new(self).with_response(value)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The operation id that was active on the creating thread
    ///
    /// The id is read from a thread-local when the record is built. On a
    /// multi-threaded runtime a task can resume on another worker after an
    /// `.await`, so a record built there may carry that worker's id or none.
    /// Set the id inside the task before building records, or build them
    /// within a synchronous `with_operation_id` section.
    pub fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref()
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }

    /// Causes wrapped by this record that have not been flattened yet
    pub fn nested(&self) -> &[FailureRecord] {
        &self.nested
    }

    /// Returns true if the record still carries nested causes
    pub fn is_composite(&self) -> bool {
        !self.nested.is_empty()
    }

    /// Splits the record into `[self, ...nested]` with its own nested list cleared
    pub(crate) fn flatten(mut self) -> Vec<FailureRecord> {
        let nested = std::mem::take(&mut self.nested);
        let mut records = Vec::with_capacity(nested.len() + 1);
        records.push(self);
        records.extend(nested);
        records
    }
}

fn capture_trace(kind: FailureKind, message: &str) -> String {
    let header = format!("{}: {}", kind, message);
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => format!("{}\n{}", header, backtrace),
        _ => header,
    }
}

impl From<std::io::Error> for FailureRecord {
    fn from(err: std::io::Error) -> Self {
        Self::operation(format!("I/O error: {}", err))
            .with_metadata(serde_json::json!({ "io_kind": format!("{:?}", err.kind()) }))
    }
}

impl From<serde_json::Error> for FailureRecord {
    fn from(err: serde_json::Error) -> Self {
        Self::operation(format!("JSON error: {}", err))
    }
}

/// The anyhow cause chain becomes the record's nested causes
impl From<anyhow::Error> for FailureRecord {
    fn from(err: anyhow::Error) -> Self {
        let mut chain = err.chain();
        let head = chain
            .next()
            .map(|cause| cause.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        let nested = chain
            .map(|cause| Self::operation(cause.to_string()))
            .collect();
        Self::operation(head).with_nested(nested)
    }
}

impl From<String> for FailureRecord {
    fn from(message: String) -> Self {
        Self::operation(message)
    }
}

impl From<&str> for FailureRecord {
    fn from(message: &str) -> Self {
        Self::operation(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = FailureRecord::operation("Should fail")
            .with_metadata(serde_json::json!({ "code": 42 }));

        assert_eq!(record.kind(), FailureKind::Operation);
        assert_eq!(record.message(), "Should fail");
        assert_eq!(record.metadata(), Some(&serde_json::json!({ "code": 42 })));
        assert!(record.trace().unwrap().starts_with("OperationFailure: Should fail"));
        assert!(!record.is_composite());
    }

    #[test]
    fn test_synthetic_record_has_no_trace() {
        let record = FailureRecord::synthetic("outer context");
        assert_eq!(record.kind(), FailureKind::Composite);
        assert!(record.trace().is_none());
    }

    #[test]
    fn test_null_metadata_is_ignored() {
        let record = FailureRecord::operation("x").with_metadata(serde_json::Value::Null);
        assert!(record.metadata().is_none());
    }

    #[test]
    fn test_flatten_clears_nested() {
        let record = FailureRecord::operation("head").with_nested(vec![
            FailureRecord::operation("first"),
            FailureRecord::operation("second"),
        ]);

        let flat = record.flatten();
        let messages: Vec<&str> = flat.iter().map(|r| r.message()).collect();
        assert_eq!(messages, vec!["head", "first", "second"]);
        assert!(flat.iter().all(|r| r.nested().is_empty()));
    }

    #[test]
    fn test_anyhow_chain_becomes_nested() {
        let err = anyhow::anyhow!("disk full").context("could not save report");
        let record = FailureRecord::from(err);

        assert_eq!(record.message(), "could not save report");
        assert_eq!(record.nested().len(), 1);
        assert_eq!(record.nested()[0].message(), "disk full");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let record: FailureRecord = io_err.into();

        assert!(record.message().contains("file not found"));
        assert_eq!(record.metadata().unwrap()["io_kind"], "NotFound");
    }

    #[test]
    fn test_display_is_message() {
        let record = FailureRecord::validation("Missing required argument 'b'");
        assert_eq!(record.to_string(), "Missing required argument 'b'");
    }
}
