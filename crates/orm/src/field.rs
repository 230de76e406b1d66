//! Field declarations: sanitizing raw attribute values and supplying defaults.

use crate::error::{ModelError, ModelResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

/// Sanitizer used by [`FieldKind::Custom`] fields
pub type Sanitizer = Rc<dyn Fn(&Value) -> ModelResult<Value>>;

/// Default value factory
pub type DefaultFactory = Rc<dyn Fn() -> Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Array,
    /// Any JSON value, stored as given
    Json,
    /// String identifier, defaulting to a fresh UUID v4
    Uid,
    /// RFC 3339 UTC timestamp, accepting epoch milliseconds or RFC 3339 input
    Timestamp,
    Custom,
}

#[derive(Clone)]
pub enum FieldDefault {
    None,
    Value(Value),
    Factory(DefaultFactory),
}

#[derive(Clone)]
pub struct Field {
    kind: FieldKind,
    default: FieldDefault,
    nullable: bool,
    sanitizer: Option<Sanitizer>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default = match &self.default {
            FieldDefault::None => "none".to_string(),
            FieldDefault::Value(v) => v.to_string(),
            FieldDefault::Factory(_) => "<factory>".to_string(),
        };
        f.debug_struct("Field")
            .field("kind", &self.kind)
            .field("default", &default)
            .field("nullable", &self.nullable)
            .finish()
    }
}

impl Field {
    fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            default: FieldDefault::None,
            nullable: false,
            sanitizer: None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldKind::String)
    }

    pub fn number() -> Self {
        Self::of(FieldKind::Number)
    }

    pub fn boolean() -> Self {
        Self::of(FieldKind::Boolean)
    }

    pub fn array() -> Self {
        Self::of(FieldKind::Array)
    }

    pub fn json() -> Self {
        Self::of(FieldKind::Json)
    }

    pub fn uid() -> Self {
        Self::of(FieldKind::Uid)
    }

    pub fn timestamp() -> Self {
        Self::of(FieldKind::Timestamp)
    }

    /// Field whose values pass through a user supplied sanitizer
    pub fn custom<F>(sanitizer: F) -> Self
    where
        F: Fn(&Value) -> ModelResult<Value> + 'static,
    {
        Self {
            sanitizer: Some(Rc::new(sanitizer)),
            ..Self::of(FieldKind::Custom)
        }
    }

    /// Set a constant default. A `null` default makes the field nullable.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            self.nullable = true;
        }
        self.default = FieldDefault::Value(value);
        self
    }

    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.default = FieldDefault::Factory(Rc::new(factory));
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn has_default(&self) -> bool {
        !matches!(self.default, FieldDefault::None)
    }

    /// Default value for a missing attribute
    pub fn default_value(&self) -> Value {
        match &self.default {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Factory(factory) => factory(),
            FieldDefault::None if self.nullable => Value::Null,
            FieldDefault::None => self.zero_value(),
        }
    }

    fn zero_value(&self) -> Value {
        match self.kind {
            FieldKind::String => Value::String(String::new()),
            FieldKind::Number => Value::from(0),
            FieldKind::Boolean => Value::Bool(false),
            FieldKind::Array => Value::Array(Vec::new()),
            FieldKind::Json | FieldKind::Custom => Value::Object(Map::new()),
            FieldKind::Uid => Value::String(uuid::Uuid::new_v4().to_string()),
            FieldKind::Timestamp => {
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }

    /// Convert a raw non-null value into the stored representation
    pub fn sanitize(&self, name: &str, raw: &Value) -> ModelResult<Value> {
        match self.kind {
            FieldKind::String | FieldKind::Uid => match raw {
                Value::String(_) => Ok(raw.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(ModelError::invalid_value(name, "string", other)),
            },
            FieldKind::Number => match raw {
                Value::Number(_) => Ok(raw.clone()),
                Value::Bool(b) => Ok(Value::from(u8::from(*b))),
                Value::String(s) => parse_number(s.trim())
                    .ok_or_else(|| ModelError::invalid_value(name, "number", raw)),
                other => Err(ModelError::invalid_value(name, "number", other)),
            },
            FieldKind::Boolean => match raw {
                Value::Bool(_) => Ok(raw.clone()),
                Value::Number(n) => Ok(Value::Bool(n.as_f64().map_or(false, |f| f != 0.0))),
                Value::String(s) => match s.as_str() {
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" | "" => Ok(Value::Bool(false)),
                    _ => Err(ModelError::invalid_value(name, "boolean", raw)),
                },
                other => Err(ModelError::invalid_value(name, "boolean", other)),
            },
            FieldKind::Array => match raw {
                Value::Array(_) => Ok(raw.clone()),
                other => Err(ModelError::invalid_value(name, "array", other)),
            },
            FieldKind::Json => Ok(raw.clone()),
            FieldKind::Timestamp => sanitize_timestamp(name, raw),
            FieldKind::Custom => match &self.sanitizer {
                Some(sanitizer) => sanitizer(raw),
                None => Ok(raw.clone()),
            },
        }
    }

    /// Value to store for an attribute on write.
    ///
    /// A missing value takes the default. An explicit `null` is kept for
    /// nullable fields, replaced by the default if there is one, and
    /// rejected otherwise.
    pub fn value_for_write(
        &self,
        model: &str,
        name: &str,
        raw: Option<&Value>,
    ) -> ModelResult<Value> {
        match raw {
            None => Ok(self.default_value()),
            Some(Value::Null) if self.nullable => Ok(Value::Null),
            Some(Value::Null) if self.has_default() => Ok(self.default_value()),
            Some(Value::Null) => Err(ModelError::NotNullable {
                model: model.to_string(),
                field: name.to_string(),
            }),
            Some(value) => self.sanitize(name, value),
        }
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(Value::from(n));
    }
    s.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

fn sanitize_timestamp(name: &str, raw: &Value) -> ModelResult<Value> {
    let parsed = match raw {
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    };

    parsed
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .ok_or_else(|| ModelError::invalid_value(name, "timestamp", raw))
}
