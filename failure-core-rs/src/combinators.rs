//! # Error Sequence Combinators
//!
//! Pure helpers that collapse or inspect a flattened error sequence.

use serde_json::Value;

use crate::types::{FailureKind, FailureRecord};

/// Collapses an error sequence into one record.
///
/// The message is the first record's message (empty for an empty sequence)
/// and the trace joins every non-empty trace with newlines, in order.
pub fn merge_records(errors: &[FailureRecord]) -> FailureRecord {
    let Some(first) = errors.first() else {
        return FailureRecord::new(FailureKind::Composite, "").with_trace(None);
    };

    let traces: Vec<&str> = errors
        .iter()
        .filter_map(FailureRecord::trace)
        .filter(|trace| !trace.is_empty())
        .collect();
    let trace = if traces.is_empty() {
        None
    } else {
        Some(traces.join("\n"))
    };

    FailureRecord::new(first.kind(), first.message()).with_trace(trace)
}

/// Merges the metadata of every record into one value.
///
/// Walks from the last record to the first. The first truthy metadata found
/// seeds the result; earlier records then fill keys that are missing or falsy.
/// Filling only happens between JSON objects, so a scalar seed (for example a
/// plain string) is returned as-is. Returns `None` if no record carries
/// truthy metadata.
pub fn extract_metadata(errors: &[FailureRecord]) -> Option<Value> {
    let mut merged: Option<Value> = None;

    for record in errors.iter().rev() {
        let Some(metadata) = record.metadata().filter(|metadata| is_truthy(metadata)) else {
            continue;
        };

        match merged.as_mut() {
            None => merged = Some(metadata.clone()),
            Some(Value::Object(accumulated)) => {
                if let Value::Object(contribution) = metadata {
                    for (key, value) in contribution {
                        let present = accumulated.get(key).map(is_truthy).unwrap_or(false);
                        if !present {
                            accumulated.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            Some(_) => {}
        }
    }

    merged
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catch::catch_errors;
    use crate::outcome::Outcome;
    use crate::wrap::{wrap_with_metadata, Wrap};
    use serde_json::json;

    fn with_metadata(message: &str, metadata: Value) -> FailureRecord {
        FailureRecord::operation(message).with_metadata(metadata)
    }

    fn nested_failure(inner_metadata: Value) -> Vec<FailureRecord> {
        let inner: Outcome<i32> = catch_errors(|| {
            Err(wrap_with_metadata(inner_metadata).wrap("Should fail").build().into())
        });
        let outer: Outcome<i32> = catch_errors(|| {
            Err(wrap_with_metadata(json!({ "code": 123 }))
                .wrap("robust_fn failed")
                .cause(inner.errors().unwrap_or_default())
                .build()
                .into())
        });
        outer.into_parts().0.unwrap_or_default()
    }

    #[test]
    fn test_merge_records() {
        let errors = vec![
            FailureRecord::operation("robust_fn failed"),
            FailureRecord::operation("Should fail"),
        ];
        let merged = merge_records(&errors);

        assert_eq!(merged.message(), "robust_fn failed");
        let trace = merged.trace().unwrap();
        assert!(trace.contains("robust_fn failed"));
        assert!(trace.contains("Should fail"));
    }

    #[test]
    fn test_merge_records_skips_missing_traces() {
        let errors = vec![FailureRecord::synthetic("outer"), FailureRecord::operation("inner")];
        let merged = merge_records(&errors);

        assert_eq!(merged.message(), "outer");
        assert_eq!(merged.trace().unwrap().lines().next(), Some("OperationFailure: inner"));
    }

    #[test]
    fn test_merge_empty_sequence() {
        let merged = merge_records(&[]);
        assert_eq!(merged.message(), "");
        assert!(merged.trace().is_none());
    }

    #[test]
    fn test_merge_is_idempotent_on_message() {
        let errors = vec![FailureRecord::operation("first"), FailureRecord::operation("second")];
        let once = merge_records(&errors);
        let twice = merge_records(&[once.clone()]);

        assert_eq!(once.message(), twice.message());
        assert_eq!(once.trace(), twice.trace());
    }

    #[test]
    fn test_last_record_seeds_and_earlier_fill_gaps() {
        let errors = vec![
            FailureRecord::operation("outer"),
            with_metadata("middle", json!({ "code": 1 })),
            with_metadata("inner", json!({ "id": 2 })),
        ];

        assert_eq!(extract_metadata(&errors), Some(json!({ "id": 2, "code": 1 })));
    }

    #[test]
    fn test_innermost_metadata_wins_on_conflicts() {
        let errors = nested_failure(json!({ "id": 456, "code": 897 }));
        assert_eq!(errors.len(), 2);

        let metadata = extract_metadata(&errors).unwrap();
        assert_eq!(metadata["id"], 456);
        assert_eq!(metadata["code"], 897);
    }

    #[test]
    fn test_scalar_seed_short_circuits() {
        let errors = nested_failure(json!("Boom"));
        assert_eq!(extract_metadata(&errors), Some(json!("Boom")));
    }

    #[test]
    fn test_scalar_metadata_mixed_with_plain_wrap() {
        let inner: Outcome<i32> =
            catch_errors(|| Err(wrap_with_metadata("Boom").wrap("Should fail").build().into()));
        let errors = Wrap::new("robust_fn failed")
            .cause(inner.into_parts().0.unwrap_or_default())
            .build()
            .flatten();

        assert_eq!(extract_metadata(&errors), Some(json!("Boom")));
    }

    #[test]
    fn test_falsy_values_are_overwritten() {
        let errors = vec![
            with_metadata("outer", json!({ "retries": 3 })),
            with_metadata("inner", json!({ "retries": 0, "id": 9 })),
        ];

        assert_eq!(extract_metadata(&errors), Some(json!({ "retries": 3, "id": 9 })));
    }

    #[test]
    fn test_no_metadata() {
        let errors = vec![FailureRecord::operation("a"), FailureRecord::operation("b")];
        assert_eq!(extract_metadata(&errors), None);
        assert_eq!(extract_metadata(&[]), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!("x")));
    }
}
