//! Database query sink.
//!
//! # Responsibilities
//! - Turn each executed statement into one `db` record
//! - Pick the severity from the outcome: error, slow query, or plain info
//! - Hand out independent copies when the ORM asks for a new level
//!
//! # Design Decisions
//! - All output goes through `trace`; the message hooks of
//!   [`QueryLogger`] stay no-ops
//! - The debug short-circuit is kept exactly as the ORM contract states:
//!   a `Debug` threshold silences tracing entirely
//! - Row count −1 means unknown and is written as `"-"`

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteQueryResult, SqliteRow};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

use crate::config::DatabaseConfig;
use crate::record::{RecordType, Severity, SinkLogger};

/// Verbosity requested by the ORM layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrmLevel {
    Silent,
    Error,
    Warn,
    Info,
}

/// Logging capability an ORM adapter expects from its logger slot.
pub trait QueryLogger {
    /// Return a copy of this logger at the requested level.
    fn log_mode(&self, level: OrmLevel) -> Self
    where
        Self: Sized;

    /// Free-form info hook. Ignored unless overridden.
    fn info(&self, _message: &str, _data: &[&dyn fmt::Debug]) {}

    /// Free-form warn hook. Ignored unless overridden.
    fn warn(&self, _message: &str, _data: &[&dyn fmt::Debug]) {}

    /// Free-form error hook. Ignored unless overridden.
    fn error(&self, _message: &str, _data: &[&dyn fmt::Debug]) {}

    /// Record one executed statement.
    ///
    /// `query` yields the statement text and the affected row count
    /// (−1 when unknown); it is only invoked if a record may be written.
    #[track_caller]
    fn trace<F>(&self, begin: Instant, query: F, err: Option<&(dyn Error + 'static)>)
    where
        F: FnOnce() -> (String, i64);
}

/// Rows touched by a statement, as reported to the sink.
pub trait RowCount {
    fn row_count(&self) -> i64;
}

impl RowCount for SqliteQueryResult {
    fn row_count(&self) -> i64 {
        i64::try_from(self.rows_affected()).unwrap_or(i64::MAX)
    }
}

impl RowCount for SqliteRow {
    fn row_count(&self) -> i64 {
        1
    }
}

impl<T> RowCount for Vec<T> {
    fn row_count(&self) -> i64 {
        self.len() as i64
    }
}

impl<T> RowCount for Option<T> {
    fn row_count(&self) -> i64 {
        i64::from(self.is_some())
    }
}

/// True when `err` is the driver's "no rows returned" condition.
pub fn is_record_not_found(err: &(dyn Error + 'static)) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::RowNotFound)
    )
}

/// Fields shared by every tier.
struct QueryOutcome<'a> {
    sql: &'a str,
    elapsed_ms: f64,
    rows: Option<i64>,
    caller: String,
}

macro_rules! query_event {
    ($level:expr, $error:expr, $outcome:expr) => {{
        let outcome: &QueryOutcome<'_> = $outcome;
        let error: Option<&str> = $error;
        match outcome.rows {
            Some(rows) => tracing::event!(
                $level,
                error,
                sql = outcome.sql,
                "elapsed-in-ms" = outcome.elapsed_ms,
                rows,
                caller = outcome.caller.as_str()
            ),
            None => tracing::event!(
                $level,
                error,
                sql = outcome.sql,
                "elapsed-in-ms" = outcome.elapsed_ms,
                rows = "-",
                caller = outcome.caller.as_str()
            ),
        }
    }};
}

/// Query tracing sink registered in the ORM's logger slot.
#[derive(Debug, Clone)]
pub struct DbSink {
    logger: SinkLogger,
    threshold: Severity,
    slow_threshold: Duration,
    ignore_record_not_found: bool,
}

impl DbSink {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self::from_logger(SinkLogger::new(RecordType::Db, &config.sink), config)
    }

    pub fn with_writer<W>(config: &DatabaseConfig, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self::from_logger(
            SinkLogger::with_writer(RecordType::Db, &config.sink, writer),
            config,
        )
    }

    fn from_logger(logger: SinkLogger, config: &DatabaseConfig) -> Self {
        Self {
            logger,
            threshold: Severity::Info,
            slow_threshold: config.slow_threshold(),
            ignore_record_not_found: config.ignore_record_not_found,
        }
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    pub fn ignores_record_not_found(&self) -> bool {
        self.ignore_record_not_found
    }

    /// Await one sqlx statement and trace its outcome.
    ///
    /// The recorded caller is the location of this call.
    #[track_caller]
    pub fn traced<'a, T, F>(
        &'a self,
        sql: &'a str,
        statement: F,
    ) -> impl Future<Output = Result<T, sqlx::Error>> + 'a
    where
        F: Future<Output = Result<T, sqlx::Error>> + 'a,
        T: RowCount + 'a,
    {
        let caller = Location::caller();
        async move {
            let begin = Instant::now();
            let result = statement.await;
            let rows = match &result {
                Ok(value) => value.row_count(),
                Err(_) => -1,
            };
            let err = result.as_ref().err().map(|e| e as &(dyn Error + 'static));
            self.trace_at(caller, begin, || (sql.to_string(), rows), err);
            result
        }
    }

    fn trace_at<F>(
        &self,
        caller: &Location<'_>,
        begin: Instant,
        query: F,
        err: Option<&(dyn Error + 'static)>,
    ) where
        F: FnOnce() -> (String, i64),
    {
        if self.threshold <= Severity::Debug {
            return;
        }

        let (sql, rows) = query();
        let elapsed = begin.elapsed();
        let outcome = QueryOutcome {
            sql: &sql,
            elapsed_ms: elapsed.as_nanos() as f64 / 1e6,
            rows: (rows != -1).then_some(rows),
            caller: format!("{}:{}", caller.file(), caller.line()),
        };

        match err {
            Some(err)
                if self.threshold <= Severity::Error
                    && (!is_record_not_found(err) || !self.ignore_record_not_found) =>
            {
                let description = err.to_string();
                self.logger.in_scope(|| {
                    query_event!(Level::ERROR, Some(description.as_str()), &outcome)
                });
            }
            _ if elapsed > self.slow_threshold
                && !self.slow_threshold.is_zero()
                && self.threshold <= Severity::Warn =>
            {
                self.logger
                    .in_scope(|| query_event!(Level::WARN, None, &outcome));
            }
            _ if self.threshold <= Severity::Info => {
                self.logger
                    .in_scope(|| query_event!(Level::INFO, None, &outcome));
            }
            _ => {}
        }
    }
}

impl QueryLogger for DbSink {
    fn log_mode(&self, level: OrmLevel) -> Self {
        let mut sink = self.clone();
        sink.threshold = match level {
            OrmLevel::Error => Severity::Error,
            OrmLevel::Warn => Severity::Warn,
            OrmLevel::Info => Severity::Info,
            OrmLevel::Silent => Severity::Debug,
        };
        sink
    }

    fn trace<F>(&self, begin: Instant, query: F, err: Option<&(dyn Error + 'static)>)
    where
        F: FnOnce() -> (String, i64),
    {
        self.trace_at(Location::caller(), begin, query, err);
    }
}
