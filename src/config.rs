//! Validation settings.
//!
//! Settings are resolved once and injected into validator constructors.
//! Precedence, lowest to highest: defaults, `CITRUS_`-prefixed environment
//! variables, a YAML properties mapping, explicit setters.

use crate::enums::MessageType;
use crate::error::ValidationError;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const IGNORE_WHITESPACE_PROPERTY: &str = "citrus.plaintext.validation.ignore.whitespace";
pub const IGNORE_NEW_LINE_TYPE_PROPERTY: &str = "citrus.plaintext.validation.ignore.newline.type";
pub const JSON_SCHEMA_VALIDATION_PROPERTY: &str = "citrus.json.schema.validation.enabled";
pub const SCHEMA_VALIDATION_PROPERTY: &str = "citrus.schema.validation.enabled";
pub const JSON_STRICT_PROPERTY: &str = "citrus.json.strict";
pub const DEFAULT_MESSAGE_TYPE_PROPERTY: &str = "citrus.default.message.type";

/// Global validation switches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationSettings {
    /// Collapse whitespace runs before plaintext comparison.
    pub ignore_whitespace: bool,
    /// Treat `\r\n`, `\r` and `\n` alike in plaintext comparison.
    pub ignore_new_line_type: bool,
    /// Validate JSON payloads against registered schemas unless a context says otherwise.
    pub json_schema_validation_enabled: bool,
    /// Require equal entry counts and array sizes in JSON tree comparison.
    pub json_strict: bool,
    /// Type assumed for messages without a declared type.
    pub default_message_type: MessageType,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            ignore_whitespace: false,
            ignore_new_line_type: false,
            json_schema_validation_enabled: false,
            json_strict: true,
            default_message_type: MessageType::Xml,
        }
    }
}

/// Raw `CITRUS_*` environment variables.
///
/// Set via e.g. `CITRUS_PLAINTEXT_VALIDATION_IGNORE_WHITESPACE=true`. Boolean
/// values are case-insensitive.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct EnvSettings {
    #[serde(default, deserialize_with = "env_flag")]
    pub plaintext_validation_ignore_whitespace: Option<bool>,
    #[serde(default, deserialize_with = "env_flag")]
    pub plaintext_validation_ignore_newline_type: Option<bool>,
    #[serde(default, deserialize_with = "env_flag")]
    pub json_schema_validation_enabled: Option<bool>,
    #[serde(default, deserialize_with = "env_flag")]
    pub schema_validation_enabled: Option<bool>,
    #[serde(default, deserialize_with = "env_flag")]
    pub json_strict: Option<bool>,
    #[serde(default)]
    pub default_message_type: Option<String>,
}

const ENV_PREFIX: &str = "CITRUS_";

impl EnvSettings {
    /// Reads the `CITRUS_` prefixed environment.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Configuration`] naming the unparseable variable.
    pub fn load() -> Result<Self, ValidationError> {
        Self::from_vars(std::env::vars())
    }

    /// Reads `CITRUS_` prefixed pairs from any variable source.
    pub fn from_vars<I>(vars: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(vars).map_err(|e| {
            ValidationError::configuration(format!(
                "Failed to read {}* environment settings: {}",
                ENV_PREFIX, e
            ))
        })
    }
}

fn env_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match text.trim() {
        t if t.eq_ignore_ascii_case("true") => Ok(Some(true)),
        t if t.eq_ignore_ascii_case("false") => Ok(Some(false)),
        other => Err(serde::de::Error::custom(format!(
            "expected 'true' or 'false', got '{}'",
            other
        ))),
    }
}

impl ValidationSettings {
    /// Resolves settings from the environment and an optional YAML properties document.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Configuration`] if an environment variable or
    /// the properties document cannot be read, or names an unknown default
    /// message type.
    pub fn load(properties: Option<&str>) -> Result<Self, ValidationError> {
        Self::from_sources(&EnvSettings::load()?, properties)
    }

    /// Same as [`ValidationSettings::load`] with an explicit environment overlay.
    pub fn from_sources(env: &EnvSettings, properties: Option<&str>) -> Result<Self, ValidationError> {
        let mut settings = ValidationSettings::default();
        settings.apply_env(env)?;
        if let Some(text) = properties {
            settings.apply_properties(text)?;
        }
        debug!(?settings, "resolved validation settings");
        Ok(settings)
    }

    fn apply_env(&mut self, env: &EnvSettings) -> Result<(), ValidationError> {
        if let Some(v) = env.plaintext_validation_ignore_whitespace {
            self.ignore_whitespace = v;
        }
        if let Some(v) = env.plaintext_validation_ignore_newline_type {
            self.ignore_new_line_type = v;
        }
        if let Some(v) = env
            .json_schema_validation_enabled
            .or(env.schema_validation_enabled)
        {
            self.json_schema_validation_enabled = v;
        }
        if let Some(v) = env.json_strict {
            self.json_strict = v;
        }
        if let Some(v) = &env.default_message_type {
            self.default_message_type = parse_message_type(v)?;
        }
        Ok(())
    }

    fn apply_properties(&mut self, text: &str) -> Result<(), ValidationError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let value: Value = serde_saphyr::from_str(text).map_err(|e| {
            ValidationError::configuration(format!("Failed to read validation properties: {}", e))
        })?;
        let Value::Object(map) = value else {
            return Err(ValidationError::configuration(
                "validation properties must be a YAML mapping",
            ));
        };

        for (key, value) in &map {
            match key.as_str() {
                IGNORE_WHITESPACE_PROPERTY => self.ignore_whitespace = flag(key, value)?,
                IGNORE_NEW_LINE_TYPE_PROPERTY => self.ignore_new_line_type = flag(key, value)?,
                JSON_SCHEMA_VALIDATION_PROPERTY => {
                    self.json_schema_validation_enabled = flag(key, value)?
                }
                SCHEMA_VALIDATION_PROPERTY => {
                    if !map.contains_key(JSON_SCHEMA_VALIDATION_PROPERTY) {
                        self.json_schema_validation_enabled = flag(key, value)?;
                    }
                }
                JSON_STRICT_PROPERTY => self.json_strict = flag(key, value)?,
                DEFAULT_MESSAGE_TYPE_PROPERTY => {
                    let name = value.as_str().ok_or_else(|| {
                        ValidationError::configuration(format!("'{}' must be a string", key))
                    })?;
                    self.default_message_type = parse_message_type(name)?;
                }
                other => debug!(property = other, "ignoring unrelated property"),
            }
        }
        Ok(())
    }

    pub fn with_ignore_whitespace(mut self, enabled: bool) -> Self {
        self.ignore_whitespace = enabled;
        self
    }

    pub fn with_ignore_new_line_type(mut self, enabled: bool) -> Self {
        self.ignore_new_line_type = enabled;
        self
    }

    pub fn with_json_schema_validation(mut self, enabled: bool) -> Self {
        self.json_schema_validation_enabled = enabled;
        self
    }

    pub fn with_json_strict(mut self, strict: bool) -> Self {
        self.json_strict = strict;
        self
    }

    pub fn with_default_message_type(mut self, message_type: MessageType) -> Self {
        self.default_message_type = message_type;
        self
    }
}

fn flag(key: &str, value: &Value) -> Result<bool, ValidationError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(ValidationError::configuration(format!(
            "'{}' must be a boolean, got {}",
            key, value
        ))),
    }
}

fn parse_message_type(name: &str) -> Result<MessageType, ValidationError> {
    name.parse().map_err(ValidationError::configuration)
}
