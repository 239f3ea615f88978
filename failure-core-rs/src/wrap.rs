//! # Composite Failures
//!
//! Builds a failure that wraps other failures. The wrapped causes stay nested
//! under the head record until a catching boundary flattens them, or are
//! collapsed into a single record in merge mode.

use serde::Serialize;

use crate::types::{FailureKind, FailureRecord};

/// A cause accepted by [`Wrap`]
#[derive(Debug, Clone)]
pub enum Cause {
    /// A plain message, turned into a new record. Empty messages are skipped.
    FromMessage(String),
    /// An existing record, followed by its own nested causes
    FromRecord(FailureRecord),
    /// An ordered sequence of causes, flattened recursively
    FromSequence(Vec<Cause>),
}

impl Cause {
    fn normalize_into(self, records: &mut Vec<FailureRecord>) {
        match self {
            Cause::FromMessage(message) => {
                if !message.is_empty() {
                    records.push(FailureRecord::operation(message));
                }
            }
            Cause::FromRecord(record) => records.extend(record.flatten()),
            Cause::FromSequence(causes) => {
                for cause in causes {
                    cause.normalize_into(records);
                }
            }
        }
    }
}

impl From<&str> for Cause {
    fn from(message: &str) -> Self {
        Cause::FromMessage(message.to_string())
    }
}

impl From<String> for Cause {
    fn from(message: String) -> Self {
        Cause::FromMessage(message)
    }
}

impl From<FailureRecord> for Cause {
    fn from(record: FailureRecord) -> Self {
        Cause::FromRecord(record)
    }
}

impl From<Vec<FailureRecord>> for Cause {
    fn from(records: Vec<FailureRecord>) -> Self {
        Cause::FromSequence(records.into_iter().map(Cause::FromRecord).collect())
    }
}

impl From<&[FailureRecord]> for Cause {
    fn from(records: &[FailureRecord]) -> Self {
        records.to_vec().into()
    }
}

impl From<Vec<Cause>> for Cause {
    fn from(causes: Vec<Cause>) -> Self {
        Cause::FromSequence(causes)
    }
}

/// Builder for a composite failure
///
/// # Example
/// ```
/// use failure_core::{catch_errors, FailureRecord, Wrap};
///
/// let inner = catch_errors(|| -> Result<i32, _> {
///     Err(FailureRecord::operation("Should fail").into())
/// });
/// let outer = catch_errors(|| {
///     let value = inner.clone().into_result()
///         .map_err(|errors| Wrap::new("robust_fn failed").cause(errors).build())?;
///     Ok(value)
/// });
///
/// let errors = outer.errors().unwrap();
/// assert_eq!(errors[0].message(), "robust_fn failed");
/// assert_eq!(errors[1].message(), "Should fail");
/// ```
#[derive(Debug, Clone)]
pub struct Wrap {
    head: Cause,
    causes: Vec<Cause>,
    merge: bool,
    metadata: Option<serde_json::Value>,
}

impl Wrap {
    /// Starts a composite failure from its head cause
    pub fn new<H: Into<Cause>>(head: H) -> Self {
        Self {
            head: head.into(),
            causes: Vec::new(),
            merge: false,
            metadata: None,
        }
    }

    /// Appends a cause
    pub fn cause<C: Into<Cause>>(mut self, cause: C) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Appends several causes, in order
    pub fn causes<I, C>(mut self, causes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Cause>,
    {
        self.causes.extend(causes.into_iter().map(Into::into));
        self
    }

    /// Collapses head and causes into one record whose trace joins all of theirs
    pub fn merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    /// Attaches metadata to the resulting record
    pub fn metadata<V: Serialize>(mut self, metadata: V) -> Self {
        if let Ok(value) = serde_json::to_value(metadata) {
            if !value.is_null() {
                self.metadata = Some(value);
            }
        }
        self
    }

    pub fn build(self) -> FailureRecord {
        let mut head_records = Vec::new();
        match self.head {
            Cause::FromMessage(message) if !message.is_empty() => {
                head_records.push(FailureRecord::new(FailureKind::Composite, message));
            }
            head => head.normalize_into(&mut head_records),
        }

        let mut records = head_records.into_iter();
        let head = records
            .next()
            .unwrap_or_else(|| FailureRecord::new(FailureKind::Composite, "Unknown error"));
        let mut causes: Vec<FailureRecord> = records.collect();
        for cause in self.causes {
            cause.normalize_into(&mut causes);
        }

        let record = if self.merge {
            let traces: Vec<&str> = std::iter::once(&head)
                .chain(causes.iter())
                .filter_map(FailureRecord::trace)
                .filter(|trace| !trace.is_empty())
                .collect();
            let trace = if traces.is_empty() {
                None
            } else {
                Some(traces.join("\n"))
            };
            FailureRecord::new(FailureKind::Composite, head.message()).with_trace(trace)
        } else {
            head.with_nested(causes)
        };

        match self.metadata {
            Some(metadata) => record.with_metadata(metadata),
            None => record,
        }
    }
}

/// Wraps `head` around `causes` in their supplied order
pub fn wrap<H, I, C>(head: H, causes: I) -> FailureRecord
where
    H: Into<Cause>,
    I: IntoIterator<Item = C>,
    C: Into<Cause>,
{
    Wrap::new(head).causes(causes).build()
}

/// Reusable wrapping configuration: pre-attached metadata, a fixed head, or both
#[derive(Debug, Clone, Default)]
pub struct Wrapper {
    head: Option<Cause>,
    metadata: Option<serde_json::Value>,
}

impl Wrapper {
    /// Starts a composite failure. With a fixed head, `cause` is nested under it.
    pub fn wrap<C: Into<Cause>>(&self, cause: C) -> Wrap {
        let wrap = match &self.head {
            Some(head) => Wrap::new(head.clone()).cause(cause),
            None => Wrap::new(cause),
        };
        match &self.metadata {
            Some(metadata) => wrap.metadata(metadata),
            None => wrap,
        }
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }
}

/// Returns a wrapper attaching `metadata` to every failure it builds
pub fn wrap_with_metadata<V: Serialize>(metadata: V) -> Wrapper {
    Wrapper {
        head: None,
        metadata: serde_json::to_value(metadata).ok().filter(|value| !value.is_null()),
    }
}

/// Returns a wrapper that always nests its causes under the same head
pub fn wrap_fn<H: Into<Cause>>(head: H) -> Wrapper {
    Wrapper {
        head: Some(head.into()),
        metadata: None,
    }
}
