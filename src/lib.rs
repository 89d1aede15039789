//! Structured event logging for backend services.
//!
//! Three sinks write JSON line records, each tagged with a fixed
//! record-type discriminator:
//! - [`AppSink`]: free-form application messages (`app`)
//! - [`DbSink`]: one record per executed SQL statement (`db`)
//! - [`NetworkSink`]: one record per HTTP request (`network`)

pub mod config;
pub mod record;
pub mod sinks;

pub use config::LoggingConfig;
pub use record::{RecordType, Severity, SinkLogger};
pub use sinks::{AppSink, DbSink, NetworkSink, Sinks};
