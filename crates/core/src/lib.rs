//! # entigraph-core
//!
//! Foundation pieces shared by the entigraph crates: store configuration
//! (with environment overrides and validation) and the tracing bootstrap
//! used by applications embedding the store.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigSource, Environment, StoreConfig, StoreConfigTrait};
pub use logging::{init_logging, LoggingConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
