//! # Failure Core
//!
//! Errors as data. Operations run inside a catching boundary and come back as
//! an [`Outcome`]: a flat, ordered list of failure records (outermost first)
//! or a value. Failures are wrapped under higher-level messages on the way
//! out instead of being rethrown.
//!
//! ## Features
//!
//! - Sync and async catching boundaries that also capture panics
//! - Wrapping with metadata, merge mode and a response escape hatch
//! - Sequence combinators: merging records and extracting metadata
//! - Fail-fast required-field checks
//! - Structured logging with global metadata and operation ids
//!

pub mod types;
pub mod outcome;
pub mod wrap;
pub mod catch;
pub mod combinators;
pub mod validation;
pub mod context;
pub mod logging;

// Re-export commonly used types
pub use types::{FailureKind, FailureRecord, Result};
pub use outcome::{Outcome, Raised};
pub use wrap::{wrap, wrap_fn, wrap_with_metadata, Cause, Wrap, Wrapper};
pub use catch::{
    catch_errors, catch_errors_async, catch_errors_async_with, catch_errors_with, run, Operation,
    MISSING_ARGUMENT,
};
pub use combinators::{extract_metadata, is_truthy, merge_records};
pub use validation::{require_fields, require_keys, Presence};
pub use context::WithFailure;
pub use logging::{
    clear_operation_id, current_operation_id, generate_operation_id, init_logging,
    safe_stringify, set_operation_id, with_operation_id, LogEntry, LogLevel, Logger,
    LoggingConfig,
};

/// Initializes logging from the environment (`LOG_LEVEL`, `LOG_META`, ...)
pub fn init() -> Result<Logger> {
    init_logging(Some(LoggingConfig::from_env()))
}

/// Initializes logging from a `config::Config` carrying `logging.*` keys
pub fn init_with_config(config: config::Config) -> Result<Logger> {
    let log_config = LoggingConfig::try_from(config).ok();
    init_logging(log_config)
}
