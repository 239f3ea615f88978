use std::fmt;
use std::future::Future;

use failure_core::{FailureRecord, Outcome};
use futures::future::BoxFuture;
use futures::FutureExt;

type SyncStepFn<T> = dyn Fn(Option<T>) -> Result<StepOutput<T>, FailureRecord> + Send + Sync;
type AsyncStepFn<T> =
    dyn Fn(Option<T>) -> BoxFuture<'static, Result<StepOutput<T>, FailureRecord>> + Send + Sync;

/// A single step in a pipeline
///
/// Each step receives the previous step's output (`None` for the first step)
/// and produces the value handed to the next one. Returning `Err` fails the
/// pipeline with that record as-is.
pub enum Step<T> {
    /// Runs to completion when called
    Sync(Box<SyncStepFn<T>>),
    /// Returns a computation the runner awaits before moving on
    Async(Box<AsyncStepFn<T>>),
}

impl<T: 'static> Step<T> {
    pub fn sync<F>(step: F) -> Self
    where
        F: Fn(Option<T>) -> Result<StepOutput<T>, FailureRecord> + Send + Sync + 'static,
    {
        Step::Sync(Box::new(step))
    }

    pub fn deferred<F, Fut>(step: F) -> Self
    where
        F: Fn(Option<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutput<T>, FailureRecord>> + Send + 'static,
    {
        Step::Async(Box::new(move |input| step(input).boxed()))
    }
}

impl<T> Step<T> {
    /// Get the step kind for logging and argument failures
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Sync(_) => "sync",
            Step::Async(_) => "async",
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Step::Async(_))
    }

    /// Calls the step and classifies what came back
    pub(crate) fn invoke(&self, input: Option<T>) -> Result<Resolution<T>, FailureRecord> {
        match self {
            Step::Sync(step) => step(input).map(Resolution::from),
            Step::Async(step) => Ok(Resolution::Pending(step(input))),
        }
    }
}

impl<T> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step::{}", self.kind())
    }
}

/// What a step hands back: a plain value, or the outcome of a nested boundary
#[derive(Debug, Clone)]
pub enum StepOutput<T> {
    Plain(Option<T>),
    Outcome(Outcome<T>),
}

impl<T> StepOutput<T> {
    pub fn plain(value: T) -> Self {
        StepOutput::Plain(Some(value))
    }

    /// A step that produces nothing; the next step receives `None`
    pub fn empty() -> Self {
        StepOutput::Plain(None)
    }
}

impl<T> From<Outcome<T>> for StepOutput<T> {
    fn from(outcome: Outcome<T>) -> Self {
        StepOutput::Outcome(outcome)
    }
}

/// A step call, classified at the boundary
pub(crate) enum Resolution<T> {
    Plain(Option<T>),
    Pending(BoxFuture<'static, Result<StepOutput<T>, FailureRecord>>),
    Outcome(Outcome<T>),
}

impl<T> From<StepOutput<T>> for Resolution<T> {
    fn from(output: StepOutput<T>) -> Self {
        match output {
            StepOutput::Plain(value) => Resolution::Plain(value),
            StepOutput::Outcome(outcome) => Resolution::Outcome(outcome),
        }
    }
}
