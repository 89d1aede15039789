//! The three record sinks.
//!
//! # Data Flow
//! ```text
//! call sites            → app.rs     → "app" records
//! ORM logger slot       → db.rs      → "db" records
//! axum middleware chain → network.rs → "network" records
//! ```
//!
//! # Design Decisions
//! - Sinks are independent leaves; none reads another's state
//! - Each is built explicitly and injected where it is needed

pub mod app;
pub mod db;
pub mod network;

pub use app::AppSink;
pub use db::{DbSink, OrmLevel, QueryLogger, RowCount};
pub use network::{network_logger, ErrorCode, NetworkSink, ResponseMessage};

use crate::config::LoggingConfig;

/// All three sinks, built from one config.
#[derive(Debug, Clone)]
pub struct Sinks {
    pub app: AppSink,
    pub db: DbSink,
    pub network: NetworkSink,
}

impl Sinks {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            app: AppSink::new(&config.app),
            db: DbSink::new(&config.db),
            network: NetworkSink::new(&config.network),
        }
    }
}
