//! # Structured Logging
//!
//! This module provides the logging collaborator of the core: a `tracing`
//! subscriber installed once per process, a [`Logger`] that renders log
//! entries with process-wide metadata merged in, and thread-local operation
//! ids used to group the log lines and failure records of one operation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::env;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use uuid::Uuid;

use crate::types::{FailureRecord, Result};

/// Environment variable holding the process-wide log metadata, as a JSON object
pub const LOG_META_ENV: &str = "LOG_META";

// Per worker thread, not per async task
thread_local! {
    static OPERATION_ID: RefCell<Option<String>> = RefCell::new(None);
}

// First configuration handed to `init_logging`; immutable afterwards
static INSTALLED: OnceCell<LoggingConfig> = OnceCell::new();

/// Configuration for the logging system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// The log level to use (trace, debug, info, warn, error)
    pub level: String,
    /// The service name for identification
    pub service_name: String,
    /// Whether to use JSON formatting
    pub json_format: bool,
    /// Whether to output logs to a file
    pub file_output: bool,
    /// The directory to store log files in
    pub log_dir: Option<String>,
    /// Fields merged into every rendered log line
    pub global_metadata: Map<String, Value>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "unknown-service".to_string(),
            json_format: true,
            file_output: false,
            log_dir: None,
            global_metadata: Map::new(),
        }
    }
}

impl LoggingConfig {
    /// Reads the configuration from the environment, loading `.env` first.
    ///
    /// `LOG_META` must hold a non-empty JSON object; anything else yields no
    /// global metadata.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.level = level;
        }
        if let Ok(service_name) = env::var("LOG_SERVICE_NAME") {
            config.service_name = service_name;
        }
        if let Ok(json_format) = env::var("LOG_JSON") {
            config.json_format =
                !matches!(json_format.to_lowercase().as_str(), "0" | "false" | "no");
        }
        if let Ok(log_dir) = env::var("LOG_DIR") {
            config.file_output = true;
            config.log_dir = Some(log_dir);
        }
        if let Ok(raw) = env::var(LOG_META_ENV) {
            config.global_metadata = parse_global_metadata(&raw);
        }
        config
    }
}

/// Parses the raw `LOG_META` value
pub fn parse_global_metadata(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => {
            debug!(error = %e, "Ignoring unparsable {}", LOG_META_ENV);
            Map::new()
        }
    }
}

impl TryFrom<config::Config> for LoggingConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        // Start from defaults and selectively override from the provided config.
        let mut base = LoggingConfig::default();

        if let Ok(level) = cfg.get::<String>("logging.level") {
            base.level = level;
        }
        if let Ok(service_name) = cfg.get::<String>("logging.service_name") {
            base.service_name = service_name;
        }
        if let Ok(json_format) = cfg.get::<bool>("logging.json_format") {
            base.json_format = json_format;
        }
        if let Ok(file_output) = cfg.get::<bool>("logging.file_output") {
            base.file_output = file_output;
        }
        if let Ok(log_dir) = cfg.get::<String>("logging.log_dir") {
            base.log_dir = Some(log_dir);
        }
        if let Ok(Value::Object(map)) = cfg.get::<Value>("logging.global_metadata") {
            base.global_metadata = map;
        }

        Ok(base)
    }
}

/// Installs the global subscriber and returns a logger carrying the global metadata.
///
/// Only the first call installs anything. Later calls return a logger built
/// from that first configuration, whatever they pass in. A subscriber already
/// installed by the host application is left in place.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<Logger> {
    let installed = INSTALLED.get_or_try_init(|| install(config.unwrap_or_default()))?;
    Ok(Logger::new(installed.global_metadata.clone()))
}

fn install(config: LoggingConfig) -> Result<LoggingConfig> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let json_layer = config.json_format.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
    });
    let text_layer = (!config.json_format).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
    });

    let file_layer = if config.file_output {
        let log_dir = config.log_dir.as_deref().ok_or_else(|| {
            FailureRecord::argument("Missing required argument 'log_dir' for file output")
        })?;
        let file_appender =
            tracing_appender::rolling::daily(log_dir, format!("{}.log", config.service_name));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // The guard flushes on drop; it has to outlive every log call.
        Box::leak(Box::new(guard));

        Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer);

    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => info!(
            service = %config.service_name,
            level = %config.level,
            json = %config.json_format,
            global_fields = config.global_metadata.len(),
            "Structured logging initialized"
        ),
        Err(e) => debug!(error = %e, "Global subscriber already installed, keeping it"),
    }

    Ok(config)
}

/// Severity of a rendered log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Case-insensitive; anything unknown is `Info`
    pub fn parse(level: &str) -> Self {
        match level.to_uppercase().as_str() {
            "WARN" => LogLevel::Warn,
            "ERROR" => LogLevel::Error,
            "CRITICAL" => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// One log line before rendering
#[derive(Debug, Clone, Default)]
pub struct LogEntry {
    level: LogLevel,
    message: String,
    code: Option<String>,
    metric: Option<f64>,
    unit: Option<String>,
    time_ms: Option<f64>,
    op_id: Option<String>,
    test: bool,
    data: Option<Value>,
    errors: Vec<FailureRecord>,
    extra: HashMap<String, Value>,
}

impl LogEntry {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn metric(mut self, metric: f64, unit: Option<&str>) -> Self {
        self.metric = Some(metric);
        self.unit = unit.map(str::to_string);
        self
    }

    /// Elapsed time in milliseconds; takes precedence over `metric`
    pub fn time(mut self, millis: f64) -> Self {
        self.time_ms = Some(millis);
        self
    }

    /// Overrides the thread's current operation id
    pub fn op_id<S: Into<String>>(mut self, op_id: S) -> Self {
        self.op_id = Some(op_id.into());
        self
    }

    pub fn test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn data<V: Serialize>(mut self, data: V) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }

    pub fn errors(mut self, errors: &[FailureRecord]) -> Self {
        self.errors = errors.to_vec();
        self
    }

    /// Adds a free-form field to the line
    pub fn field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        if let Ok(value) = serde_json::to_value(value) {
            self.extra.insert(key.into(), value);
        }
        self
    }
}

/// Renders and emits log entries. The global metadata is fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    global_metadata: Map<String, Value>,
}

impl Logger {
    pub fn new(global_metadata: Map<String, Value>) -> Self {
        Self { global_metadata }
    }

    pub fn global_metadata(&self) -> &Map<String, Value> {
        &self.global_metadata
    }

    /// Builds the JSON line: global metadata, then free-form fields, then the explicit fields
    pub fn render(&self, entry: &LogEntry) -> Value {
        let mut line = self.global_metadata.clone();
        for (key, value) in &entry.extra {
            line.insert(key.clone(), value.clone());
        }

        line.insert("level".into(), Value::from(entry.level.as_str()));
        line.insert("test".into(), Value::from(entry.test));
        line.insert("message".into(), Value::from(entry.message.as_str()));

        if let Some(code) = &entry.code {
            line.insert("code".into(), Value::from(code.as_str()));
        }
        // Zero counts as unset for both time and metric
        if let Some(time) = entry.time_ms.filter(|time| *time != 0.0) {
            line.insert("metric".into(), Value::from(time));
            line.insert("unit".into(), Value::from("ms"));
        } else if let Some(metric) = entry.metric.filter(|metric| *metric != 0.0) {
            line.insert("metric".into(), Value::from(metric));
            if let Some(unit) = &entry.unit {
                line.insert("unit".into(), Value::from(unit.as_str()));
            }
        }
        if let Some(op_id) = entry.op_id.clone().or_else(current_operation_id) {
            line.insert("op_id".into(), Value::from(op_id));
        }
        if let Some(data) = &entry.data {
            line.insert("data".into(), data.clone());
        }
        if !entry.errors.is_empty() {
            let errors = entry
                .errors
                .iter()
                .map(|record| {
                    let mut error = serde_json::json!({
                        "message": record.message(),
                        "stack": record.trace().unwrap_or_default(),
                    });
                    if let Some(metadata) = record.metadata() {
                        error["metadata"] = metadata.clone();
                    }
                    error
                })
                .collect();
            line.insert("errors".into(), Value::Array(errors));
        }

        Value::Object(line)
    }

    /// Emits the rendered line through `tracing` at the matching level
    pub fn log(&self, entry: &LogEntry) {
        let line = safe_stringify(&self.render(entry));
        match entry.level {
            LogLevel::Info => info!(target: "failure_core::log", "{}", line),
            LogLevel::Warn => warn!(target: "failure_core::log", "{}", line),
            LogLevel::Error | LogLevel::Critical => error!(target: "failure_core::log", "{}", line),
        }
    }
}

/// Serializes to JSON without ever failing; unserializable values become `{}`
pub fn safe_stringify<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

/// Sets the operation id for the current thread
pub fn set_operation_id<S: Into<String>>(operation_id: S) {
    OPERATION_ID.with(|id| *id.borrow_mut() = Some(operation_id.into()));
}

/// Generates and sets a new operation id
pub fn generate_operation_id() -> String {
    let id = Uuid::new_v4().to_string();
    set_operation_id(id.clone());
    id
}

/// Retrieves the current operation id
pub fn current_operation_id() -> Option<String> {
    OPERATION_ID.with(|id| id.borrow().clone())
}

/// Clears the operation id for the current thread
pub fn clear_operation_id() {
    OPERATION_ID.with(|id| *id.borrow_mut() = None);
}

/// Executes a function with a specific operation id, restoring the previous one afterwards
pub fn with_operation_id<F, R, S>(operation_id: S, f: F) -> R
where
    F: FnOnce() -> R,
    S: Into<String>,
{
    let previous = current_operation_id();
    set_operation_id(operation_id);

    let result = f();

    match previous {
        Some(id) => set_operation_id(id),
        None => clear_operation_id(),
    }

    result
}
