//! Per-sink logger instances and their destinations.

use std::io;
#[cfg(any(test, feature = "test-util"))]
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
#[cfg(any(test, feature = "test-util"))]
use serde_json::Value;
use tracing::Dispatch;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};

use crate::config::SinkConfig;
use crate::record::{RecordFormat, RecordType};

/// Standard stream a sink writes its records to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    #[default]
    Stdout,
    Stderr,
}

impl Output {
    fn writer(&self) -> BoxMakeWriter {
        match self {
            Output::Stdout => BoxMakeWriter::new(io::stdout),
            Output::Stderr => BoxMakeWriter::new(io::stderr),
        }
    }
}

/// A logger owned by exactly one sink.
///
/// Wraps its own `tracing` dispatcher so records never depend on, or leak
/// into, whatever global subscriber the host process installs.
#[derive(Debug, Clone)]
pub struct SinkLogger {
    dispatch: Dispatch,
    record_type: RecordType,
}

impl SinkLogger {
    /// Build a logger writing to the configured standard stream.
    pub fn new(record_type: RecordType, config: &SinkConfig) -> Self {
        Self::with_writer(record_type, config, config.output.writer())
    }

    /// Build a logger writing to an arbitrary destination.
    pub fn with_writer<W>(record_type: RecordType, config: &SinkConfig, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(config.level.as_filter())
            .with_writer(writer)
            .event_format(RecordFormat::new(record_type, config.keys.clone()))
            .finish();

        Self {
            dispatch: Dispatch::new(subscriber),
            record_type,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Run `emit` with this logger as the current dispatcher.
    pub fn in_scope<T>(&self, emit: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, emit)
    }
}

/// In-memory destination for records, shared between clones.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, Default)]
pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

#[cfg(any(test, feature = "test-util"))]
impl CaptureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Every captured line that parses as a JSON record.
    pub fn records(&self) -> Vec<Value> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Severity;

    #[test]
    fn test_level_filter_drops_verbose_records() {
        let capture = CaptureWriter::new();
        let config = SinkConfig {
            level: Severity::Warn,
            ..SinkConfig::default()
        };
        let logger = SinkLogger::with_writer(RecordType::App, &config, capture.clone());

        logger.in_scope(|| {
            tracing::info!(message = "dropped");
            tracing::warn!(message = "kept");
        });

        let records = capture.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], "kept");
        assert_eq!(records[0]["type"], "app");
    }

    #[test]
    fn test_loggers_are_isolated() {
        let first = CaptureWriter::new();
        let second = CaptureWriter::new();
        let config = SinkConfig::default();
        let app = SinkLogger::with_writer(RecordType::App, &config, first.clone());
        let network = SinkLogger::with_writer(RecordType::Network, &config, second.clone());

        app.in_scope(|| tracing::info!(message = "one"));
        network.in_scope(|| tracing::info!(status = 200i64));

        assert_eq!(app.record_type(), RecordType::App);
        assert_eq!(first.records().len(), 1);
        assert_eq!(first.records()[0]["type"], "app");
        assert_eq!(second.records().len(), 1);
        assert_eq!(second.records()[0]["type"], "network");
    }

    #[test]
    fn test_output_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            output: Output,
        }
        let parsed: Wrapper = toml::from_str("output = \"stderr\"").unwrap();
        assert_eq!(parsed.output, Output::Stderr);
    }
}
