use anyhow::Result;
use failure_core::{
    catch_errors_async_with, clear_operation_id, generate_operation_id, init_logging,
    logging::parse_global_metadata, FailureRecord, LogEntry, LogLevel, LoggingConfig, Outcome,
    Raised,
};
use serde_json::{json, Map, Value};

fn config_with(metadata: Value) -> LoggingConfig {
    LoggingConfig {
        level: "debug".to_string(),
        service_name: "failure-core-tests".to_string(),
        json_format: false,
        global_metadata: metadata.as_object().cloned().unwrap_or_else(Map::new),
        ..LoggingConfig::default()
    }
}

#[test]
fn test_first_configuration_wins() -> Result<()> {
    let first = init_logging(Some(config_with(json!({ "deployment": "blue" }))))
        .map_err(|e| anyhow::anyhow!(e))?;
    let second = init_logging(Some(config_with(json!({ "deployment": "green" }))))
        .map_err(|e| anyhow::anyhow!(e))?;

    assert_eq!(first.global_metadata()["deployment"], "blue");
    assert_eq!(second.global_metadata()["deployment"], "blue");

    let line = second.render(&LogEntry::new("Cache warmed").level(LogLevel::parse("notice")));
    assert_eq!(line["deployment"], "blue");
    assert_eq!(line["level"], "INFO");

    second.log(&LogEntry::new("Cache warmed").level(LogLevel::Critical));
    Ok(())
}

#[test]
fn test_log_meta_must_be_a_non_empty_object() {
    assert_eq!(parse_global_metadata(r#"{"team":"payments"}"#)["team"], "payments");
    assert!(parse_global_metadata(r#""payments""#).is_empty());
    assert!(parse_global_metadata("{").is_empty());
}

#[tokio::test]
async fn test_operation_id_is_stamped_on_records_and_lines() -> Result<()> {
    let op_id = generate_operation_id();

    let outcome: Outcome<()> = catch_errors_async_with("Sync job failed", async {
        Err(Raised::from(FailureRecord::operation("Remote timed out")))
    })
    .await;

    let errors = outcome.errors().unwrap();
    assert_eq!(errors[0].message(), "Sync job failed");
    assert_eq!(errors[1].operation_id(), Some(op_id.as_str()));

    let logger = failure_core::Logger::default();
    let line = logger.render(&LogEntry::new("Sync job failed").errors(errors).time(12.5));
    assert_eq!(line["op_id"], op_id.as_str());
    assert_eq!(line["unit"], "ms");
    assert_eq!(line["errors"].as_array().map(Vec::len), Some(2));

    clear_operation_id();
    Ok(())
}

#[test]
fn test_environment_drives_the_configuration() {
    std::env::set_var("LOG_LEVEL", "warn");
    std::env::set_var("LOG_SERVICE_NAME", "billing");
    std::env::set_var("LOG_JSON", "false");
    std::env::set_var("LOG_DIR", "/tmp/failure-core-logs");
    std::env::set_var("LOG_META", r#"{"team":"payments"}"#);

    let config = LoggingConfig::from_env();

    for name in ["LOG_LEVEL", "LOG_SERVICE_NAME", "LOG_JSON", "LOG_DIR", "LOG_META"] {
        std::env::remove_var(name);
    }

    assert_eq!(config.level, "warn");
    assert_eq!(config.service_name, "billing");
    assert!(!config.json_format);
    assert!(config.file_output);
    assert_eq!(config.log_dir.as_deref(), Some("/tmp/failure-core-logs"));
    assert_eq!(config.global_metadata["team"], "payments");
}
