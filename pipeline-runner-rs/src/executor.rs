use std::future::Future;
use std::time::Instant;

use failure_core::{
    catch_errors, catch_errors_async, current_operation_id, wrap, FailureRecord, Outcome,
    Raised,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::step::{Resolution, Step, StepOutput};

/// Result of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput<T> {
    /// Every step's output, in step order
    pub trace: Vec<Option<T>>,
    /// The last step's output; `None` for an empty pipeline
    pub value: Option<T>,
}

/// Pipeline executor that runs steps sequentially, threading each output into the next step
///
/// # Example
/// ```
/// use pipeline_runner::{Pipeline, StepOutput};
///
/// let pipeline = Pipeline::builder("totals")
///     .add_step(|_| Ok(StepOutput::plain(1)))
///     .add_step(|prev| Ok(StepOutput::plain(prev.unwrap_or(0) + 1)))
///     .build();
///
/// let outcome = pipeline.run_sync();
/// assert_eq!(outcome.value().unwrap().value, Some(2));
/// ```
pub struct Pipeline<T> {
    name: String,
    steps: Vec<Step<T>>,
}

impl<T> Pipeline<T>
where
    T: Clone + Send + 'static,
{
    /// Create a new pipeline builder
    pub fn builder(name: impl Into<String>) -> PipelineBuilder<T> {
        PipelineBuilder::new(name)
    }

    /// Creates a pipeline from an existing list of steps
    pub fn from_steps(name: impl Into<String>, steps: Vec<Step<T>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Runs every step to completion on the calling thread.
    ///
    /// An async step makes the whole pipeline fail before any step runs.
    pub fn run_sync(&self) -> Outcome<PipelineOutput<T>> {
        catch_errors(|| self.execute_sync())
    }

    /// Runs the steps one at a time, awaiting each async step before the next one starts
    pub async fn run_async(&self) -> Outcome<PipelineOutput<T>> {
        catch_errors_async(self.execute_async()).await
    }

    fn failure_message(&self) -> String {
        format!("'{}' function failed", self.name)
    }

    fn validate_sync(&self) -> Result<(), FailureRecord> {
        match self.steps.iter().position(Step::is_async) {
            Some(index) => Err(wrap(
                self.failure_message(),
                [FailureRecord::argument(format!(
                    "Wrong argument exception. Pipeline '{}' only accepts sync steps in sync \
                     mode. Found {} step at index {} instead.",
                    self.name,
                    self.steps[index].kind(),
                    index
                ))],
            )),
            None => Ok(()),
        }
    }

    fn execute_sync(&self) -> Result<PipelineOutput<T>, Raised<PipelineOutput<T>>> {
        self.validate_sync().map_err(|e| self.log_failure(None, e))?;

        let pipeline_start = self.log_start("sync");
        let mut trace: Vec<Option<T>> = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let step_start = self.log_step(index, step);
            let input = trace.last().cloned().flatten();

            let value = step
                .invoke(input)
                .and_then(|resolution| self.settle(resolution))
                .map_err(|e| self.log_failure(Some(index), e))?;

            debug!(
                pipeline = %self.name,
                step = index + 1,
                duration_ms = step_start.elapsed().as_millis() as u64,
                "Step completed"
            );
            trace.push(value);
        }

        Ok(self.finish(trace, pipeline_start))
    }

    async fn execute_async(&self) -> Result<PipelineOutput<T>, Raised<PipelineOutput<T>>> {
        let pipeline_start = self.log_start("async");
        let mut trace: Vec<Option<T>> = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let step_start = self.log_step(index, step);
            let input = trace.last().cloned().flatten();

            let value = match step.invoke(input) {
                Ok(Resolution::Pending(pending)) => match pending.await {
                    Ok(output) => self.settle(Resolution::from(output)),
                    Err(e) => Err(e),
                },
                Ok(resolution) => self.settle(resolution),
                Err(e) => Err(e),
            }
            .map_err(|e| self.log_failure(Some(index), e))?;

            debug!(
                pipeline = %self.name,
                step = index + 1,
                duration_ms = step_start.elapsed().as_millis() as u64,
                "Step completed"
            );
            trace.push(value);
        }

        Ok(self.finish(trace, pipeline_start))
    }

    /// Unwraps a settled step result into the value stored in the trace
    fn settle(&self, resolution: Resolution<T>) -> Result<Option<T>, FailureRecord> {
        match resolution {
            Resolution::Plain(value) => Ok(value),
            Resolution::Outcome(outcome) => match outcome.into_parts() {
                (Some(errors), _) => Err(wrap(self.failure_message(), [errors])),
                (None, value) => Ok(value),
            },
            // Only reachable from sync mode, which validates steps first
            Resolution::Pending(_) => Err(FailureRecord::argument(format!(
                "Pipeline '{}' received an unsettled step result",
                self.name
            ))),
        }
    }

    fn log_start(&self, mode: &str) -> Instant {
        info!(
            pipeline = %self.name,
            mode,
            steps = self.steps.len(),
            operation_id = ?current_operation_id(),
            "Starting pipeline"
        );
        Instant::now()
    }

    fn log_step(&self, index: usize, step: &Step<T>) -> Instant {
        debug!(
            pipeline = %self.name,
            step = index + 1,
            steps = self.steps.len(),
            kind = step.kind(),
            "Executing step"
        );
        Instant::now()
    }

    fn log_failure(&self, index: Option<usize>, e: FailureRecord) -> Raised<PipelineOutput<T>> {
        error!(
            pipeline = %self.name,
            step = ?index.map(|i| i + 1),
            error = %e,
            operation_id = ?current_operation_id(),
            "Pipeline failed"
        );
        Raised::new(e)
    }

    fn finish(&self, trace: Vec<Option<T>>, pipeline_start: Instant) -> PipelineOutput<T> {
        info!(
            pipeline = %self.name,
            steps = trace.len(),
            duration_ms = pipeline_start.elapsed().as_millis() as u64,
            "Pipeline completed successfully"
        );
        let value = trace.last().cloned().flatten();
        PipelineOutput { trace, value }
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder<T> {
    name: String,
    steps: Vec<Step<T>>,
}

impl<T: 'static> PipelineBuilder<T> {
    /// Create a new pipeline builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Add a sync step to the pipeline
    pub fn add_step<F>(mut self, step: F) -> Self
    where
        F: Fn(Option<T>) -> Result<StepOutput<T>, FailureRecord> + Send + Sync + 'static,
    {
        self.steps.push(Step::sync(step));
        self
    }

    /// Add an async step to the pipeline
    pub fn add_async_step<F, Fut>(mut self, step: F) -> Self
    where
        F: Fn(Option<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutput<T>, FailureRecord>> + Send + 'static,
    {
        self.steps.push(Step::deferred(step));
        self
    }

    /// Add an already constructed step to the pipeline
    pub fn add_boxed_step(mut self, step: Step<T>) -> Self {
        self.steps.push(step);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline<T> {
        Pipeline {
            name: self.name,
            steps: self.steps,
        }
    }
}

/// Runs `steps` synchronously as a pipeline named `run_sync`
pub fn run_sync<T>(steps: Vec<Step<T>>) -> Outcome<PipelineOutput<T>>
where
    T: Clone + Send + 'static,
{
    Pipeline::from_steps("run_sync", steps).run_sync()
}

/// Runs `steps` as a pipeline named `run_async`, awaiting async steps in order
pub async fn run_async<T>(steps: Vec<Step<T>>) -> Outcome<PipelineOutput<T>>
where
    T: Clone + Send + 'static,
{
    Pipeline::from_steps("run_async", steps).run_async().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use failure_core::FailureKind;

    fn messages<V>(outcome: &Outcome<V>) -> Vec<&str> {
        outcome
            .errors()
            .unwrap_or_default()
            .iter()
            .map(FailureRecord::message)
            .collect()
    }

    #[test]
    fn test_pipeline_success() {
        let pipeline = Pipeline::builder("test-pipeline")
            .add_step(|_| Ok(StepOutput::plain(1)))
            .add_step(|prev| Ok(StepOutput::plain(prev.unwrap_or(0) + 1)))
            .add_step(|prev| Ok(StepOutput::plain(prev.unwrap_or(0) + 2)))
            .build();

        assert_eq!(pipeline.name(), "test-pipeline");
        assert_eq!(pipeline.step_count(), 3);

        let output = pipeline.run_sync().into_result().unwrap();
        assert_eq!(output.trace, vec![Some(1), Some(2), Some(4)]);
        assert_eq!(output.value, Some(4));
    }

    #[test]
    fn test_pipeline_is_reusable() {
        let pipeline = Pipeline::builder("counter")
            .add_step(|_| Ok(StepOutput::plain(10)))
            .build();

        assert_eq!(pipeline.run_sync().value().unwrap().value, Some(10));
        assert_eq!(pipeline.run_sync().value().unwrap().value, Some(10));
    }

    #[test]
    fn test_step_failure_stops_pipeline() {
        let pipeline = Pipeline::builder("test-pipeline")
            .add_step(|_| Ok(StepOutput::plain(1)))
            .add_step(|_| Err(FailureRecord::operation("Boom")))
            .add_step(|_| panic!("never reached"))
            .build();

        let outcome = pipeline.run_sync();
        assert_eq!(messages(&outcome), vec!["Boom"]);
        assert!(outcome.value().is_none());
    }

    #[test]
    fn test_empty_step_output_feeds_none() {
        let pipeline = Pipeline::builder("gaps")
            .add_step(|_| Ok(StepOutput::empty()))
            .add_step(|prev: Option<i32>| Ok(StepOutput::plain(if prev.is_none() { 7 } else { 0 })))
            .build();

        let output = pipeline.run_sync().into_result().unwrap();
        assert_eq!(output.trace, vec![None, Some(7)]);
    }

    #[test]
    fn test_sync_mode_rejects_async_steps_up_front() {
        let pipeline = Pipeline::builder("mixed")
            .add_step(|_| panic!("no step runs before validation"))
            .add_async_step(|prev: Option<i32>| async move { Ok(StepOutput::Plain(prev)) })
            .build();

        let outcome = pipeline.run_sync();
        let errors = outcome.errors().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message(), "'mixed' function failed");
        assert_eq!(errors[1].kind(), FailureKind::Argument);
        assert!(errors[1].message().contains("index 1"));
        assert!(errors[1].message().contains("async"));
    }

    #[test]
    fn test_empty_pipeline() {
        let output = run_sync::<i32>(Vec::new()).into_result().unwrap();
        assert!(output.trace.is_empty());
        assert_eq!(output.value, None);
    }

    #[tokio::test]
    async fn test_async_pipeline_awaits_in_order() {
        let pipeline = Pipeline::builder("async-pipeline")
            .add_async_step(|_| async { Ok(StepOutput::plain(String::from("a"))) })
            .add_step(|prev| Ok(StepOutput::plain(prev.unwrap_or_default() + "b")))
            .add_async_step(|prev| async move {
                tokio::task::yield_now().await;
                Ok(StepOutput::plain(prev.unwrap_or_default() + "c"))
            })
            .build();

        let output = pipeline.run_async().await.into_result().unwrap();
        assert_eq!(output.value.as_deref(), Some("abc"));
    }
}
