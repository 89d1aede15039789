//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LoggingConfig (validated, immutable)
//!     → one section handed to each sink at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; sinks copy what they need
//! - All fields have defaults, so an empty file reproduces the built-in
//!   constants (info level, stdout, 200ms slow-query threshold)
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{DatabaseConfig, LoggingConfig, NetworkConfig, SinkConfig};
pub use validation::ValidationError;
