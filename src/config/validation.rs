//! Configuration validation.
//!
//! # Responsibilities
//! - Reject empty encoder keys
//! - Reject encoder keys that collide within one sink
//! - Reject encoder keys that shadow a field the sink writes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LoggingConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::{LoggingConfig, SinkConfig};
use crate::record::RecordType;

/// A semantic problem in an otherwise well-formed config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("[{sink}] encoder key `{field}` is empty")]
    EmptyKey {
        sink: &'static str,
        field: &'static str,
    },

    #[error("[{sink}] encoder keys `{first}` and `{second}` both use \"{key}\"")]
    DuplicateKey {
        sink: &'static str,
        first: &'static str,
        second: &'static str,
        key: String,
    },

    #[error("[{sink}] encoder key `{field}` uses \"{key}\", which {sink} records write as a field")]
    ReservedKey {
        sink: &'static str,
        field: &'static str,
        key: String,
    },
}

/// Check every sink section, collecting all problems found.
pub fn validate_config(config: &LoggingConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_sink(RecordType::App, &config.app, &mut errors);
    check_sink(RecordType::Db, &config.db.sink, &mut errors);
    check_sink(RecordType::Network, &config.network.sink, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_sink(record_type: RecordType, config: &SinkConfig, errors: &mut Vec<ValidationError>) {
    let sink = record_type.as_str();
    let keys = [
        ("level", &config.keys.level),
        ("record_type", &config.keys.record_type),
        ("timestamp", &config.keys.timestamp),
    ];

    for (field, key) in keys {
        if key.trim().is_empty() {
            errors.push(ValidationError::EmptyKey { sink, field });
        } else if record_type.field_names().contains(&key.as_str()) {
            errors.push(ValidationError::ReservedKey {
                sink,
                field,
                key: key.clone(),
            });
        }
    }

    for (i, &(first, a)) in keys.iter().enumerate() {
        for &(second, b) in &keys[i + 1..] {
            if !a.is_empty() && a == b {
                errors.push(ValidationError::DuplicateKey {
                    sink,
                    first,
                    second,
                    key: a.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = LoggingConfig::default();
        config.app.keys.level = String::new();
        config.network.sink.keys.timestamp = "type".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0],
            ValidationError::EmptyKey {
                sink: "app",
                field: "level"
            }
        );
        assert_eq!(
            errors[1],
            ValidationError::DuplicateKey {
                sink: "network",
                first: "record_type",
                second: "timestamp",
                key: "type".to_string(),
            }
        );
    }

    #[test]
    fn test_key_shadowing_sink_field_is_rejected() {
        let mut config = LoggingConfig::default();
        config.app.keys.record_type = "message".to_string();
        config.db.sink.keys.level = "sql".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ReservedKey {
                    sink: "app",
                    field: "record_type",
                    key: "message".to_string(),
                },
                ValidationError::ReservedKey {
                    sink: "db",
                    field: "level",
                    key: "sql".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_field_names_are_only_reserved_for_their_own_sink() {
        // `sql` is a db field; app records never write it.
        let mut config = LoggingConfig::default();
        config.app.keys.level = "sql".to_string();
        config.network.sink.keys.timestamp = "caller".to_string();

        assert!(validate_config(&config).is_ok());
    }
}
