//! Closed enumerations shared by messages, validators and validation contexts.
//!
//! Message types are parsed case-insensitively from the declared type string.
//! Names outside the known set stay usable as custom tags because the
//! validator registry keys by string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Well-known message payload formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Xml,
    Xhtml,
    Json,
    Plaintext,
    BinaryBase64,
    GzipBase64,
    Binary,
    Gzip,
    Csv,
    Yaml,
}

impl MessageType {
    pub const ALL: [MessageType; 10] = [
        MessageType::Xml,
        MessageType::Xhtml,
        MessageType::Json,
        MessageType::Plaintext,
        MessageType::BinaryBase64,
        MessageType::GzipBase64,
        MessageType::Binary,
        MessageType::Gzip,
        MessageType::Csv,
        MessageType::Yaml,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Xml => "XML",
            MessageType::Xhtml => "XHTML",
            MessageType::Json => "JSON",
            MessageType::Plaintext => "PLAINTEXT",
            MessageType::BinaryBase64 => "BINARY_BASE64",
            MessageType::GzipBase64 => "GZIP_BASE64",
            MessageType::Binary => "BINARY",
            MessageType::Gzip => "GZIP",
            MessageType::Csv => "CSV",
            MessageType::Yaml => "YAML",
        }
    }

    /// True for `XML` and `XHTML`.
    pub fn is_xml(&self) -> bool {
        matches!(self, MessageType::Xml | MessageType::Xhtml)
    }

    /// True for the raw byte formats that carry no text encoding.
    pub fn is_binary(&self) -> bool {
        matches!(self, MessageType::Binary | MessageType::Gzip)
    }

    /// Case-insensitive equality against a declared type string.
    pub fn matches(&self, declared: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(declared.trim())
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .into_iter()
            .find(|t| t.matches(s))
            .ok_or_else(|| format!("unknown message type '{}'", s))
    }
}

/// Result type an XPath expression is evaluated to, selected by an
/// optional expression prefix such as `string:` or `node-set:`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XpathResultType {
    #[default]
    Node,
    NodeSet,
    String,
    Number,
    Integer,
    Boolean,
}

impl XpathResultType {
    fn prefix(&self) -> &'static str {
        match self {
            XpathResultType::Node => "node:",
            XpathResultType::NodeSet => "node-set:",
            XpathResultType::String => "string:",
            XpathResultType::Number => "number:",
            XpathResultType::Integer => "integer:",
            XpathResultType::Boolean => "boolean:",
        }
    }

    /// Splits a result type prefix off an expression.
    ///
    /// Expressions without a known prefix evaluate as [`XpathResultType::Node`].
    pub fn from_expression(expression: &str) -> (XpathResultType, &str) {
        const ORDER: [XpathResultType; 6] = [
            XpathResultType::NodeSet,
            XpathResultType::Node,
            XpathResultType::String,
            XpathResultType::Number,
            XpathResultType::Integer,
            XpathResultType::Boolean,
        ];
        for result_type in ORDER {
            if let Some(rest) = expression.strip_prefix(result_type.prefix()) {
                return (result_type, rest);
            }
        }
        (XpathResultType::Node, expression)
    }
}

/// Scripting language of a script validation context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    #[default]
    Cel,
}
