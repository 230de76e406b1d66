//! Tracing bootstrap for applications embedding the store.
//!
//! The store itself only emits `tracing` events (targets under
//! `entigraph::`); installing a subscriber is left to the host. These
//! helpers cover the common setups.

use crate::config::{Environment, StoreConfig};
use serde_json::{json, Value};
use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration for hosts of the store
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Enable pretty printing for development
    pub pretty_print: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Custom fields reported with the initialization event
    pub global_fields: serde_json::Map<String, Value>,
    /// Environment filter (supports directives like "entigraph=debug")
    pub env_filter: Option<String>,
    pub service_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_print: true,
            include_location: false,
            global_fields: serde_json::Map::new(),
            env_filter: None,
            service_name: None,
        }
    }
}

impl LoggingConfig {
    /// Create production logging configuration
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            pretty_print: false,
            env_filter: Some("entigraph=info".to_string()),
            ..Self::default()
        }
        .with_global_field("env", "production")
    }

    /// Create development logging configuration
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            include_location: true,
            env_filter: Some("entigraph=debug".to_string()),
            ..Self::default()
        }
        .with_global_field("env", "development")
    }

    /// Create test logging configuration (minimal output)
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            pretty_print: false,
            env_filter: Some("entigraph=error".to_string()),
            ..Self::default()
        }
        .with_global_field("env", "test")
    }

    /// Derive a logging setup from a store configuration.
    ///
    /// `trace_relations` raises the relation targets to `trace` on top of the
    /// configured level.
    pub fn for_store(config: &StoreConfig) -> Self {
        let base = match config.environment {
            Environment::Production => Self::production(),
            Environment::Testing => Self::test(),
            Environment::Development => Self::development(),
        };

        let mut filter = format!("entigraph={}", config.log_level.to_lowercase());
        if config.trace_relations {
            filter.push_str(",entigraph::relations=trace");
        }

        Self {
            level: config.log_level.to_lowercase(),
            ..base
        }
        .with_env_filter(filter)
    }

    /// Add a global field to the initialization event
    pub fn with_global_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.global_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_service(mut self, name: &str) -> Self {
        self.service_name = Some(name.to_string());
        self
    }

    /// Set environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }
}

/// Install a global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter when set. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = config.env_filter.as_deref().unwrap_or(&config.level);

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(env_filter))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .json(),
            )
            .try_init()?;
    } else if config.pretty_print {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .pretty(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout))
            .try_init()?;
    }

    let mut init_msg = json!({
        "message": "Structured logging initialized",
        "level": config.level,
        "format": if config.json_format { "json" } else { "text" },
    });
    if let Some(name) = config.service_name {
        init_msg["service_name"] = json!(name);
    }
    for (key, value) in config.global_fields {
        init_msg[key] = value;
    }

    tracing::info!(target: "entigraph::logging", "{}", init_msg);

    Ok(())
}
