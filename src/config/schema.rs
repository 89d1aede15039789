//! Configuration schema definitions.
//!
//! One section per sink. All types derive Serde traits for deserialization
//! from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::record::{EncoderKeys, Output, Severity};

/// Root configuration for the three sinks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application sink.
    pub app: SinkConfig,

    /// Database query sink.
    pub db: DatabaseConfig,

    /// HTTP request sink.
    pub network: NetworkConfig,
}

/// Writer settings shared by every sink.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Minimum severity written (debug, info, warn, error, fatal).
    pub level: Severity,

    /// Destination stream for records.
    pub output: Output,

    /// Output key names for level, record type and timestamp.
    pub keys: EncoderKeys,
}

/// Database sink configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    #[serde(flatten)]
    pub sink: SinkConfig,

    /// Queries slower than this are logged at warn. 0 disables the rule.
    pub slow_threshold_ms: u64,

    /// Skip the error tier for "record not found" failures.
    pub ignore_record_not_found: bool,
}

impl DatabaseConfig {
    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sink: SinkConfig::default(),
            slow_threshold_ms: 200,
            ignore_record_not_found: false,
        }
    }
}

/// Network sink configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(flatten)]
    pub sink: SinkConfig,

    /// Resolve the client IP from X-Forwarded-For / X-Real-IP before
    /// falling back to the socket peer address.
    pub trust_forwarded_headers: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            sink: SinkConfig::default(),
            trust_forwarded_headers: true,
        }
    }
}
