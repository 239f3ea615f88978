//! # Catching Boundaries
//!
//! Runs a synchronous or asynchronous operation and converts whatever it
//! raises, including panics, into an [`Outcome`]. Nothing raised inside the
//! operation crosses the boundary unconverted.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::outcome::{Outcome, Raised};
use crate::types::FailureRecord;

/// Message of the failure produced when no operation is supplied
pub const MISSING_ARGUMENT: &str = "Missing required argument";

/// An operation handed to [`run`]
pub enum Operation<'a, T> {
    /// A callable invoked immediately
    Sync(Box<dyn FnOnce() -> Result<T, Raised<T>> + Send + 'a>),
    /// A computation awaited until it settles
    Async(BoxFuture<'a, Result<T, Raised<T>>>),
}

impl<'a, T> Operation<'a, T> {
    pub fn sync<F>(operation: F) -> Self
    where
        F: FnOnce() -> Result<T, Raised<T>> + Send + 'a,
    {
        Operation::Sync(Box::new(operation))
    }

    /// Wraps an already in-flight computation
    pub fn future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<T, Raised<T>>> + Send + 'a,
    {
        Operation::Async(future.boxed())
    }

    /// Wraps an async callable. It is invoked inside the boundary, so a panic
    /// while building the future is caught too.
    pub fn deferred<F, Fut>(operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, Raised<T>>> + Send + 'a,
    {
        Operation::Async(async move { operation().await }.boxed())
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Operation::Async(_))
    }
}

/// Runs a synchronous operation and captures its failure
///
/// # Example
/// ```
/// use failure_core::{catch_errors, FailureRecord};
///
/// let outcome = catch_errors(|| -> Result<i32, _> {
///     Err(FailureRecord::operation("Should fail").into())
/// });
/// assert_eq!(outcome.errors().unwrap()[0].message(), "Should fail");
///
/// let outcome = catch_errors(|| Ok(123));
/// assert_eq!(outcome.value(), Some(&123));
/// ```
pub fn catch_errors<T, F>(operation: F) -> Outcome<T>
where
    F: FnOnce() -> Result<T, Raised<T>>,
{
    settle(None, panic::catch_unwind(AssertUnwindSafe(operation)))
}

/// Same as [`catch_errors`], with `message` prepended as its own record to any failure
pub fn catch_errors_with<T, F>(message: &str, operation: F) -> Outcome<T>
where
    F: FnOnce() -> Result<T, Raised<T>>,
{
    settle(Some(message), panic::catch_unwind(AssertUnwindSafe(operation)))
}

/// Awaits an in-flight computation and captures its failure
pub async fn catch_errors_async<T, Fut>(future: Fut) -> Outcome<T>
where
    Fut: Future<Output = Result<T, Raised<T>>>,
{
    settle(None, AssertUnwindSafe(future).catch_unwind().await)
}

/// Same as [`catch_errors_async`], with `message` prepended as its own record to any failure
pub async fn catch_errors_async_with<T, Fut>(message: &str, future: Fut) -> Outcome<T>
where
    Fut: Future<Output = Result<T, Raised<T>>>,
{
    settle(Some(message), AssertUnwindSafe(future).catch_unwind().await)
}

/// Runs whichever kind of operation is supplied.
///
/// A missing operation produces a single argument failure instead of panicking.
pub async fn run<T>(operation: Option<Operation<'_, T>>, message: Option<&str>) -> Outcome<T> {
    match operation {
        None => Raised::new(FailureRecord::argument(MISSING_ARGUMENT)).into_outcome(message),
        Some(Operation::Sync(operation)) => {
            settle(message, panic::catch_unwind(AssertUnwindSafe(operation)))
        }
        Some(Operation::Async(future)) => {
            settle(message, AssertUnwindSafe(future).catch_unwind().await)
        }
    }
}

fn settle<T>(
    message: Option<&str>,
    caught: std::thread::Result<Result<T, Raised<T>>>,
) -> Outcome<T> {
    let raised = match caught {
        Ok(Ok(value)) => return Outcome::success(value),
        Ok(Err(raised)) => raised,
        Err(payload) => Raised::new(FailureRecord::operation(panic_message(payload.as_ref()))),
    };

    let outcome = raised.into_outcome(message);
    if let Some(errors) = outcome.errors() {
        debug!(
            error_count = errors.len(),
            first_error = %errors[0].message(),
            has_response = outcome.value().is_some(),
            "Operation failed"
        );
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown error".to_string()
    }
}
