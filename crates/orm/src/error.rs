//! Error types for the object graph
//!
//! Lookups never fail: a missing key, an empty query or an orphaned foreign
//! key collapse to `None` or an empty list. Errors are reserved for schema
//! mistakes, bad writes and failures raised by user hooks.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Error types for model and relation operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A model was referenced by name but never registered
    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    #[error("Model '{model}' has no relation named '{relation}'")]
    UnknownRelation { model: String, relation: String },

    /// Unknown attribute while strict attribute checking is enabled
    #[error("Model '{model}' has no field named '{field}'")]
    UnknownField { model: String, field: String },

    /// Inconsistent model or relation declaration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Scalar key used where a composite key is declared, or vice versa
    #[error("Key shape mismatch: expected {expected}, found {found}")]
    KeyShape { expected: String, found: String },

    /// A value that cannot take part in a key
    #[error("Invalid key error: {0}")]
    InvalidKey(String),

    #[error("Field '{model}.{field}' is not nullable")]
    NotNullable { model: String, field: String },

    /// A field sanitizer rejected the raw value
    #[error("Invalid value for field '{field}': expected {expected}, found {found}")]
    InvalidValue {
        field: String,
        expected: String,
        found: String,
    },

    /// Primary key attributes of a stored instance cannot be rewritten
    #[error("Primary key field '{model}.{field}' of a stored instance is immutable")]
    ImmutableKey { model: String, field: String },

    /// Error raised by a user supplied hook
    #[error("Hook error: {0}")]
    Hook(String),
}

impl ModelError {
    /// Whether this error points at a programming mistake in the schema or
    /// in how the graph is addressed, rather than at the data being written.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ModelError::UnknownModel(_)
                | ModelError::UnknownRelation { .. }
                | ModelError::Configuration(_)
                | ModelError::KeyShape { .. }
        )
    }

    pub(crate) fn unknown_relation(model: &str, relation: &str) -> Self {
        ModelError::UnknownRelation {
            model: model.to_string(),
            relation: relation.to_string(),
        }
    }

    pub(crate) fn invalid_value(field: &str, expected: &str, found: &serde_json::Value) -> Self {
        ModelError::InvalidValue {
            field: field.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl From<entigraph_core::ConfigError> for ModelError {
    fn from(err: entigraph_core::ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_configuration_classification() {
        assert!(ModelError::UnknownModel("Post".into()).is_configuration());
        assert!(ModelError::Configuration("arity".into()).is_configuration());
        assert!(ModelError::KeyShape {
            expected: "composite".into(),
            found: "scalar".into()
        }
        .is_configuration());

        assert!(!ModelError::NotNullable {
            model: "User".into(),
            field: "name".into()
        }
        .is_configuration());
        assert!(!ModelError::Hook("boom".into()).is_configuration());
    }

    #[test]
    fn test_error_display() {
        let err = ModelError::invalid_value("age", "number", &json!("abc"));
        assert_eq!(
            err.to_string(),
            "Invalid value for field 'age': expected number, found \"abc\""
        );

        let err = ModelError::unknown_relation("User", "posts");
        assert_eq!(err.to_string(), "Model 'User' has no relation named 'posts'");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: ModelError =
            entigraph_core::ConfigError::validation_failed("bad separator").into();
        assert!(matches!(err, ModelError::Configuration(_)));
    }
}
