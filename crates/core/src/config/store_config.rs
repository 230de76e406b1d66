use crate::config::{
    ConfigError, ConfigSource, ConfigValidator, IdentifierValidator, LogLevelValidator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

const ENV_ENVIRONMENT: &str = "ENTIGRAPH_ENV";
const ENV_PRIMARY_KEY: &str = "ENTIGRAPH_PRIMARY_KEY";
const ENV_PIVOT_SEPARATOR: &str = "ENTIGRAPH_PIVOT_SEPARATOR";
const ENV_STRICT_ATTRIBUTES: &str = "ENTIGRAPH_STRICT_ATTRIBUTES";
const ENV_TRACE_RELATIONS: &str = "ENTIGRAPH_TRACE_RELATIONS";
const ENV_LOG_LEVEL: &str = "ENTIGRAPH_LOG_LEVEL";

/// Configuration trait for store configuration
pub trait StoreConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid_value(
                "environment",
                s,
                "development, testing, or production",
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    /// Check if environment is development
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    /// Check if environment is testing
    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }

    /// Check if environment is production
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Runtime configuration of a model registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub environment: Environment,
    /// Primary key attribute used when a model does not declare one
    pub default_primary_key: String,
    /// Joins the sorted model names of a synthesized pivot model
    pub pivot_separator: String,
    /// Reject unknown attribute names instead of ignoring them
    pub strict_attributes: bool,
    /// Emit verbose tracing for relation initialization and notifications
    pub trace_relations: bool,
    pub log_level: String,
}

impl StoreConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self {
            environment: Environment::Development,
            default_primary_key: "id".to_string(),
            pivot_separator: "_".to_string(),
            strict_attributes: false,
            trace_relations: false,
            log_level: "info".to_string(),
        }
    }

    /// Create configuration for development
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            trace_relations: true,
            log_level: "debug".to_string(),
            ..Self::new()
        }
    }

    /// Create configuration for testing
    pub fn testing() -> Self {
        Self {
            environment: Environment::Testing,
            strict_attributes: true,
            log_level: "warn".to_string(),
            ..Self::new()
        }
    }

    /// Create configuration for production
    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            ..Self::new()
        }
    }

    pub fn with_default_primary_key(mut self, key: impl Into<String>) -> Self {
        self.default_primary_key = key.into();
        self
    }

    pub fn with_pivot_separator(mut self, separator: impl Into<String>) -> Self {
        self.pivot_separator = separator.into();
        self
    }

    pub fn with_strict_attributes(mut self, strict: bool) -> Self {
        self.strict_attributes = strict;
        self
    }

    pub fn with_trace_relations(mut self, trace: bool) -> Self {
        self.trace_relations = trace;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(var, raw, "boolean flag (true/false)")),
    }
}

fn source_of(var: &'static str, default: &'static str) -> ConfigSource {
    match env::var(var) {
        Ok(raw) => ConfigSource::Environment { var, raw },
        Err(_) => ConfigSource::Default(default),
    }
}

impl StoreConfigTrait for StoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(env_str) = env::var(ENV_ENVIRONMENT) {
            config.environment = env_str.parse()?;
        }

        if let Ok(key) = env::var(ENV_PRIMARY_KEY) {
            config.default_primary_key = key;
        }

        if let Ok(separator) = env::var(ENV_PIVOT_SEPARATOR) {
            config.pivot_separator = separator;
        }

        if let Ok(raw) = env::var(ENV_STRICT_ATTRIBUTES) {
            config.strict_attributes = parse_flag(ENV_STRICT_ATTRIBUTES, &raw)?;
        }

        if let Ok(raw) = env::var(ENV_TRACE_RELATIONS) {
            config.trace_relations = parse_flag(ENV_TRACE_RELATIONS, &raw)?;
        }

        if let Ok(log_level) = env::var(ENV_LOG_LEVEL) {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        IdentifierValidator::new("default_primary_key").validate(&self.default_primary_key)?;
        IdentifierValidator::new("pivot_separator").validate(&self.pivot_separator)?;
        LogLevelValidator.validate(&self.log_level)?;

        if self.environment.is_production() && self.trace_relations {
            return Err(ConfigError::invalid_value(
                "trace_relations",
                "true",
                "false in production environment",
            ));
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();

        sources.insert(
            "environment".to_string(),
            source_of(ENV_ENVIRONMENT, "development"),
        );
        sources.insert(
            "default_primary_key".to_string(),
            source_of(ENV_PRIMARY_KEY, "id"),
        );
        sources.insert(
            "pivot_separator".to_string(),
            source_of(ENV_PIVOT_SEPARATOR, "_"),
        );
        sources.insert(
            "strict_attributes".to_string(),
            source_of(ENV_STRICT_ATTRIBUTES, "false"),
        );
        sources.insert(
            "trace_relations".to_string(),
            source_of(ENV_TRACE_RELATIONS, "false"),
        );
        sources.insert("log_level".to_string(), source_of(ENV_LOG_LEVEL, "info"));

        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean_test_env() {
        for var in [
            ENV_ENVIRONMENT,
            ENV_PRIMARY_KEY,
            ENV_PIVOT_SEPARATOR,
            ENV_STRICT_ATTRIBUTES,
            ENV_TRACE_RELATIONS,
            ENV_LOG_LEVEL,
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_presets_validate() {
        assert!(StoreConfig::new().validate().is_ok());
        assert!(StoreConfig::development().validate().is_ok());
        assert!(StoreConfig::testing().validate().is_ok());
        assert!(StoreConfig::production().validate().is_ok());
    }

    #[test]
    fn test_tracing_rejected_in_production() {
        let config = StoreConfig::production().with_trace_relations(true);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "trace_relations"
        ));
    }

    #[test]
    fn test_builder_setters() {
        let config = StoreConfig::new()
            .with_default_primary_key("uuid")
            .with_pivot_separator("__")
            .with_strict_attributes(true)
            .with_log_level("debug");

        assert_eq!(config.default_primary_key, "uuid");
        assert_eq!(config.pivot_separator, "__");
        assert!(config.strict_attributes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_primary_key_name() {
        let config = StoreConfig::new().with_default_primary_key("");
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clean_test_env();
        env::set_var(ENV_ENVIRONMENT, "testing");
        env::set_var(ENV_PRIMARY_KEY, "key");
        env::set_var(ENV_STRICT_ATTRIBUTES, "yes");
        env::set_var(ENV_TRACE_RELATIONS, "0");

        let config = StoreConfig::from_env().unwrap();
        assert_eq!(config.environment, Environment::Testing);
        assert_eq!(config.default_primary_key, "key");
        assert!(config.strict_attributes);
        assert!(!config.trace_relations);

        let sources = config.config_sources();
        assert!(sources["environment"].from_environment());
        assert!(sources["pivot_separator"].is_default());
        assert_eq!(sources["default_primary_key"].raw(), "key");
        assert_eq!(
            sources["strict_attributes"].to_string(),
            "ENTIGRAPH_STRICT_ATTRIBUTES=\"yes\""
        );
        assert_eq!(sources["pivot_separator"].to_string(), "default \"_\"");

        clean_test_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_flag() {
        clean_test_env();
        env::set_var(ENV_TRACE_RELATIONS, "sometimes");

        let result = StoreConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        clean_test_env();
    }

    #[test]
    fn test_partial_config_document() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"environment": "production", "pivot_separator": "__"}"#)
                .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.pivot_separator, "__");
        assert_eq!(config.default_primary_key, "id");
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
        assert_eq!(Environment::Testing.to_string(), "testing");
    }
}
