//! Log record model and writer.
//!
//! # Data Flow
//! ```text
//! sink operation (app / db / network)
//!     → tracing event on the sink's own dispatcher
//!     → format.rs (one JSON object per line)
//!     → writer.rs destination (stdout / stderr / injected)
//! ```
//!
//! # Design Decisions
//! - Every sink owns its logger; nothing installs a global subscriber
//! - The record-type discriminator is stamped by the formatter, so a
//!   record can never carry a discriminator other than its sink's
//! - Field order within a record is the order the sink declares them

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::Level;

pub mod format;
pub mod writer;

pub use format::{EncoderKeys, RecordFormat};
#[cfg(any(test, feature = "test-util"))]
pub use writer::CaptureWriter;
pub use writer::{Output, SinkLogger};

/// Fixed discriminator identifying the sink that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    App,
    Db,
    Network,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::App => "app",
            RecordType::Db => "db",
            RecordType::Network => "network",
        }
    }

    /// Field names this record type writes after the header keys.
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            RecordType::App => &["message", "error"],
            RecordType::Db => &["error", "sql", "elapsed-in-ms", "rows", "caller"],
            RecordType::Network => &[
                "endpoint",
                "method",
                "ip",
                "user-agent",
                "status",
                "message",
                "error-code",
                "response-time-ms",
                "response-size-bytes",
                "aborted",
            ],
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record severity, ordered from most to least verbose.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// Capitalized label written under the severity key.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Subscriber filter admitting this severity and everything above it.
    pub fn as_filter(&self) -> LevelFilter {
        match self {
            Severity::Debug => LevelFilter::DEBUG,
            Severity::Info => LevelFilter::INFO,
            Severity::Warn => LevelFilter::WARN,
            // Fatal records travel as ERROR events.
            Severity::Error | Severity::Fatal => LevelFilter::ERROR,
        }
    }
}

impl From<&Level> for Severity {
    fn from(level: &Level) -> Self {
        match *level {
            Level::ERROR => Severity::Error,
            Level::WARN => Severity::Warn,
            Level::INFO => Severity::Info,
            _ => Severity::Debug,
        }
    }
}
