//! JSON line encoder for sink records.
//!
//! # Responsibilities
//! - Stamp severity, timestamp and record-type under configurable keys
//! - Append event fields in declaration order with their JSON types
//! - Render the reserved `fatal` marker as the `FATAL` severity label
//! - Never let an event field replace a header key

use std::fmt;

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::record::{RecordType, Severity};

/// Boolean field that upgrades an `ERROR` event to a `FATAL` record.
/// It is consumed by the encoder and never written out.
pub const FATAL_MARKER: &str = "fatal";

/// Prefix given to an event field whose name matches a header key.
pub const SHADOWED_FIELD_PREFIX: &str = "fields.";

/// Output key names for the three fields every record carries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EncoderKeys {
    /// Key for the capitalized severity label.
    pub level: String,

    /// Key for the record-type discriminator.
    pub record_type: String,

    /// Key for the RFC 3339 timestamp.
    pub timestamp: String,
}

impl Default for EncoderKeys {
    fn default() -> Self {
        Self {
            level: "level".to_string(),
            record_type: "type".to_string(),
            timestamp: "timestamp".to_string(),
        }
    }
}

/// Event formatter producing one JSON object per line.
#[derive(Debug, Clone)]
pub struct RecordFormat {
    record_type: RecordType,
    keys: EncoderKeys,
}

impl RecordFormat {
    pub fn new(record_type: RecordType, keys: EncoderKeys) -> Self {
        Self { record_type, keys }
    }

    /// Render an event as a single JSON object, without the line terminator.
    pub fn render(&self, event: &Event<'_>) -> String {
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let severity = if fields.fatal {
            Severity::Fatal
        } else {
            Severity::from(event.metadata().level())
        };

        let mut record = Map::new();
        record.insert(self.keys.level.clone(), Value::from(severity.label()));
        record.insert(
            self.keys.timestamp.clone(),
            Value::from(Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        record.insert(
            self.keys.record_type.clone(),
            Value::from(self.record_type.as_str()),
        );
        for (name, value) in fields.values {
            if record.contains_key(name) {
                // Header keys are fixed; a colliding field moves aside.
                record.insert(format!("{SHADOWED_FIELD_PREFIX}{name}"), value);
            } else {
                record.insert(name.to_string(), value);
            }
        }

        Value::Object(record).to_string()
    }
}

impl<S, N> FormatEvent<S, N> for RecordFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        writeln!(writer, "{}", self.render(event))
    }
}

/// Collects event fields in the order the visitor sees them.
#[derive(Default)]
struct FieldCollector {
    values: Vec<(&'static str, Value)>,
    fatal: bool,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: Value) {
        self.values.push((field.name(), value));
    }
}

impl Visit for FieldCollector {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == FATAL_MARKER {
            self.fatal = value;
            return;
        }
        self.push(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, Value::from(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CaptureWriter;
    use tracing::Dispatch;

    fn capture(keys: EncoderKeys, emit: impl FnOnce()) -> Vec<String> {
        let capture = CaptureWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(capture.clone())
            .event_format(RecordFormat::new(RecordType::Db, keys))
            .finish();
        tracing::dispatcher::with_default(&Dispatch::new(subscriber), emit);
        capture.lines()
    }

    #[test]
    fn test_header_keys_precede_fields() {
        let lines = capture(EncoderKeys::default(), || {
            tracing::info!(sql = "SELECT 1", rows = 1i64);
        });
        assert_eq!(lines.len(), 1);

        let record: Map<String, Value> = serde_json::from_str(&lines[0]).unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["level", "timestamp", "type", "sql", "rows"]);
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["type"], "db");
        assert_eq!(record["rows"], 1);
        assert!(chrono::DateTime::parse_from_rfc3339(record["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_custom_keys() {
        let keys = EncoderKeys {
            level: "severity".to_string(),
            record_type: "kind".to_string(),
            timestamp: "ts".to_string(),
        };
        let lines = capture(keys, || tracing::warn!(sql = "SELECT 1"));

        let record: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["severity"], "WARN");
        assert_eq!(record["kind"], "db");
        assert!(record.get("ts").is_some());
        assert!(record.get("level").is_none());
    }

    #[test]
    fn test_fatal_marker_is_consumed() {
        let lines = capture(EncoderKeys::default(), || {
            tracing::error!(fatal = true, message = "shutting down");
        });

        let record: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["level"], "FATAL");
        assert_eq!(record["message"], "shutting down");
        assert!(record.get(FATAL_MARKER).is_none());
    }

    #[test]
    fn test_absent_optional_field_is_omitted() {
        let missing: Option<&str> = None;
        let lines = capture(EncoderKeys::default(), || {
            tracing::info!(message = missing, status = 200i64, "elapsed-ms" = 1.5f64);
        });

        let record: Value = serde_json::from_str(&lines[0]).unwrap();
        assert!(record.get("message").is_none());
        assert_eq!(record["status"], 200);
        assert_eq!(record["elapsed-ms"], 1.5);
    }

    #[test]
    fn test_display_values_become_strings() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let lines = capture(EncoderKeys::default(), || {
            tracing::error!(error = %err);
        });

        let record: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["level"], "ERROR");
        assert_eq!(record["error"], "disk full");
    }

    #[test]
    fn test_field_cannot_replace_header_key() {
        let keys = EncoderKeys {
            level: "sql".to_string(),
            ..EncoderKeys::default()
        };
        let lines = capture(keys, || tracing::info!(sql = "SELECT 1", rows = 1i64));

        let record: Map<String, Value> = serde_json::from_str(&lines[0]).unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["sql", "timestamp", "type", "fields.sql", "rows"]);
        assert_eq!(record["sql"], "INFO");
        assert_eq!(record["type"], "db");
        assert_eq!(record["fields.sql"], "SELECT 1");
    }
}
