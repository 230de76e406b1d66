use thiserror::Error;

/// Configuration errors raised while loading or validating a [`StoreConfig`](super::StoreConfig)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Environment variable error: {message}")]
    EnvironmentError { message: String },
}

impl ConfigError {
    /// Create a missing required field error
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Create an environment error
    pub fn environment_error(message: impl Into<String>) -> Self {
        Self::EnvironmentError {
            message: message.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T: ?Sized> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Validates attribute and key names used by the store (primary key, separators).
///
/// A valid identifier is non-empty, contains no whitespace and none of the
/// `forbidden` characters.
pub struct IdentifierValidator {
    pub field: &'static str,
    pub forbidden: Vec<char>,
}

impl IdentifierValidator {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            forbidden: vec![','],
        }
    }
}

impl ConfigValidator<str> for IdentifierValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        if value.is_empty() {
            return Err(ConfigError::missing_required(
                self.field,
                "Value must not be empty",
            ));
        }

        if value.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid_value(
                self.field,
                value,
                "identifier without whitespace",
            ));
        }

        if let Some(c) = value.chars().find(|c| self.forbidden.contains(c)) {
            return Err(ConfigError::invalid_value(
                self.field,
                value,
                format!("identifier without '{}'", c),
            ));
        }

        Ok(())
    }
}

/// Log level validator
pub struct LogLevelValidator;

impl ConfigValidator<str> for LogLevelValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        match value.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(()),
            _ => Err(ConfigError::invalid_value(
                "log_level",
                value,
                "one of trace, debug, info, warn, error, off",
            )),
        }
    }
}
