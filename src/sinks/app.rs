//! Application event sink.
//!
//! Free-form messages from anywhere in the service, tagged `app`.

use std::error::Error;
use std::io::{self, Write};

use tracing_subscriber::fmt::writer::MakeWriter;

use crate::config::SinkConfig;
use crate::record::{RecordType, SinkLogger};

/// Exit status used by [`AppSink::fatal`].
pub const FATAL_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone)]
pub struct AppSink {
    logger: SinkLogger,
}

impl AppSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            logger: SinkLogger::new(RecordType::App, config),
        }
    }

    pub fn with_writer<W>(config: &SinkConfig, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self {
            logger: SinkLogger::with_writer(RecordType::App, config, writer),
        }
    }

    pub fn info(&self, message: &str) {
        self.logger.in_scope(|| tracing::info!(message));
    }

    pub fn warn(&self, message: &str) {
        self.logger.in_scope(|| tracing::warn!(message));
    }

    pub fn error(&self, message: &str, err: &dyn Error) {
        self.logger
            .in_scope(|| tracing::error!(message, error = %err));
    }

    /// Write a `FATAL` record, then terminate the process.
    ///
    /// Both standard streams are flushed before exiting, so the record is
    /// always written ahead of termination.
    pub fn fatal(&self, message: &str, err: &dyn Error) -> ! {
        self.write_fatal(message, err);
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        std::process::exit(FATAL_EXIT_CODE)
    }

    fn write_fatal(&self, message: &str, err: &dyn Error) {
        self.logger
            .in_scope(|| tracing::error!(fatal = true, message, error = %err));
    }
}
