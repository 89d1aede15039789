//! Shared utilities for sink integration tests.

use serde_json::Value;
use service_logs::record::CaptureWriter;

/// Key names of a record, in output order.
#[allow(dead_code)]
pub fn keys(record: &Value) -> Vec<String> {
    record
        .as_object()
        .expect("record is a JSON object")
        .keys()
        .cloned()
        .collect()
}

/// Exactly one record, or panic with everything that was captured.
#[allow(dead_code)]
pub fn single_record(capture: &CaptureWriter) -> Value {
    let records = capture.records();
    assert_eq!(
        records.len(),
        1,
        "expected one record, captured:\n{}",
        capture.contents()
    );
    records.into_iter().next().unwrap()
}
