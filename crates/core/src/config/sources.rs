use std::fmt;

/// Origin of one resolved store setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from `var`, whose raw text was `raw`
    Environment { var: &'static str, raw: String },
    /// Built-in default
    Default(&'static str),
}

impl ConfigSource {
    pub fn from_environment(&self) -> bool {
        matches!(self, ConfigSource::Environment { .. })
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default(_))
    }

    /// Raw text the setting was parsed from
    pub fn raw(&self) -> &str {
        match self {
            ConfigSource::Environment { raw, .. } => raw,
            ConfigSource::Default(value) => value,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Environment { var, raw } => write!(f, "{}={:?}", var, raw),
            ConfigSource::Default(value) => write!(f, "default {:?}", value),
        }
    }
}
