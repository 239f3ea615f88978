//! Sequential pipeline runner built on the failure core.
//!
//! A pipeline is an ordered list of steps run one at a time. Each step gets
//! the previous step's output, and the run returns the full trace of outputs
//! along with the last one. Any failure stops the run and comes back as data.
//!
//! # Example
//! ```
//! use pipeline_runner::{run_sync, Step, StepOutput};
//!
//! let outcome = run_sync(vec![
//!     Step::sync(|_| Ok(StepOutput::plain(1))),
//!     Step::sync(|prev| Ok(StepOutput::plain(prev.unwrap_or(0) + 1))),
//! ]);
//! assert_eq!(outcome.value().unwrap().trace, vec![Some(1), Some(2)]);
//! ```

pub mod executor;
pub mod step;

// Re-export main types
pub use executor::{run_async, run_sync, Pipeline, PipelineBuilder, PipelineOutput};
pub use step::{Step, StepOutput};
