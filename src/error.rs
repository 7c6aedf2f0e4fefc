use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`ValidationError`].
///
/// Tooling uses the kind to tell a failing assertion (`Mismatch`) from a
/// broken test definition (`Configuration`) or an environment problem
/// (`Resource`, `Payload`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Mismatch,
    Configuration,
    Resource,
    Payload,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Mismatch => "mismatch",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Resource => "resource",
            ErrorKind::Payload => "payload",
        };
        f.write_str(name)
    }
}

/// Error raised by every validator, matcher and resolver in this crate.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Expected and actual content differ.
    #[error("{message}")]
    Mismatch { message: String },

    /// Plain text values are equal once all whitespace is removed.
    #[error(
        "Text values not equal, expected '{expected}' but was '{actual}' - text differs in only whitespaces!"
    )]
    WhitespaceMismatch { expected: String, actual: String },

    /// Every violation reported by every candidate JSON schema.
    #[error("Json validation failed: {}", violations.join("\n\t"))]
    SchemaViolations { violations: Vec<String> },

    /// A validation script assertion evaluated to false.
    #[error("Script validation failed in {script}: assertion `{expression}` failed\n{snippet}")]
    ScriptAssertion {
        script: String,
        expression: String,
        snippet: String,
    },

    #[error("Unknown validation matcher '{name}'")]
    UnknownMatcher { name: String },

    #[error("Unable to find JSON schema '{name}'")]
    UnknownSchema { name: String },

    #[error("Unable to find JSON schema repository '{name}'")]
    UnknownSchemaRepository { name: String },

    #[error("Unknown variable '{name}'")]
    UnknownVariable { name: String },

    /// A path expression or script could not be compiled.
    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// A path expression selected nothing in the received payload.
    #[error("No result for expression: '{expression}'")]
    ExpressionNotFound { expression: String },

    /// Any other broken test definition.
    #[error("{message}")]
    Configuration { message: String },

    /// Reading or decoding an external resource failed.
    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// A payload is not valid for its declared format.
    #[error("{message}")]
    MalformedPayload { message: String },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::Mismatch { .. }
            | ValidationError::WhitespaceMismatch { .. }
            | ValidationError::SchemaViolations { .. }
            | ValidationError::ScriptAssertion { .. } => ErrorKind::Mismatch,
            ValidationError::UnknownMatcher { .. }
            | ValidationError::UnknownSchema { .. }
            | ValidationError::UnknownSchemaRepository { .. }
            | ValidationError::UnknownVariable { .. }
            | ValidationError::InvalidExpression { .. }
            | ValidationError::ExpressionNotFound { .. }
            | ValidationError::Configuration { .. } => ErrorKind::Configuration,
            ValidationError::Io { .. } => ErrorKind::Resource,
            ValidationError::MalformedPayload { .. } => ErrorKind::Payload,
        }
    }

    /// True when the error is a content failure rather than a broken setup.
    pub fn is_mismatch(&self) -> bool {
        self.kind() == ErrorKind::Mismatch
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        ValidationError::Mismatch {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ValidationError::Configuration {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ValidationError::MalformedPayload {
            message: message.into(),
        }
    }

    pub fn invalid_expression(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        ValidationError::Io {
            message: message.into(),
            source,
        }
    }
}

/// Builds the standard mismatch text: `<base>, expected '<expected>' but was '<actual>'`.
pub fn value_mismatch(
    base: &str,
    expected: impl fmt::Display,
    actual: impl fmt::Display,
) -> ValidationError {
    ValidationError::Mismatch {
        message: format!("{}, expected '{}' but was '{}'", base, expected, actual),
    }
}

pub type Result<T, E = ValidationError> = std::result::Result<T, E>;
