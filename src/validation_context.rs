//! Per-action validation expectations, one variant per validator family.
//!
//! A context is built before an action runs, consumed by the validators that
//! understand it and dropped afterwards.

use crate::enums::ScriptType;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Expectations handed to [`crate::validator::MessageValidator::validate_message`].
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationContext {
    /// Plain comparison against the control message, no extra settings.
    Default,
    Xml(XmlValidationContext),
    Xpath(XpathValidationContext),
    Json(JsonValidationContext),
    JsonPath(JsonPathValidationContext),
    Script(ScriptValidationContext),
    Header(HeaderValidationContext),
}

impl ValidationContext {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationContext::Default => "default",
            ValidationContext::Xml(_) => "xml",
            ValidationContext::Xpath(_) => "xpath",
            ValidationContext::Json(_) => "json",
            ValidationContext::JsonPath(_) => "json_path",
            ValidationContext::Script(_) => "script",
            ValidationContext::Header(_) => "header",
        }
    }
}

/// Returns the first context of a family.
macro_rules! find_context {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(contexts: &[ValidationContext]) -> Option<&$ty> {
            contexts.iter().find_map(|c| match c {
                ValidationContext::$variant(inner) => Some(inner),
                _ => None,
            })
        }
    };
}

find_context!(xml_context, Xml, XmlValidationContext);
find_context!(json_context, Json, JsonValidationContext);
find_context!(header_context, Header, HeaderValidationContext);

/// All XPath contexts; several may be configured on one action.
pub fn xpath_contexts(contexts: &[ValidationContext]) -> impl Iterator<Item = &XpathValidationContext> {
    contexts.iter().filter_map(|c| match c {
        ValidationContext::Xpath(inner) => Some(inner),
        _ => None,
    })
}

pub fn json_path_contexts(
    contexts: &[ValidationContext],
) -> impl Iterator<Item = &JsonPathValidationContext> {
    contexts.iter().filter_map(|c| match c {
        ValidationContext::JsonPath(inner) => Some(inner),
        _ => None,
    })
}

pub fn script_contexts(
    contexts: &[ValidationContext],
) -> impl Iterator<Item = &ScriptValidationContext> {
    contexts.iter().filter_map(|c| match c {
        ValidationContext::Script(inner) => Some(inner),
        _ => None,
    })
}

/// DOM tree comparison settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlValidationContext {
    /// XPath expressions selecting elements or attributes to skip.
    pub ignore_expressions: BTreeSet<String>,
    /// Namespace declarations the received root element must carry, prefix to URI.
    /// The default namespace uses the empty prefix.
    pub control_namespaces: BTreeMap<String, String>,
    /// Prefix bindings used when evaluating ignore expressions.
    pub namespaces: BTreeMap<String, String>,
}

impl XmlValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self, expression: impl Into<String>) -> Self {
        self.ignore_expressions.insert(expression.into());
        self
    }

    pub fn control_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.control_namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }
}

/// Ordered XPath assertions and extractions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XpathValidationContext {
    /// Expression to expected value, evaluated in insertion order.
    pub expressions: Vec<(String, String)>,
    pub namespaces: BTreeMap<String, String>,
    /// Expression to variable name.
    pub extract: Vec<(String, String)>,
}

impl XpathValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expression(mut self, expression: impl Into<String>, expected: impl Into<String>) -> Self {
        self.expressions.push((expression.into(), expected.into()));
        self
    }

    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn extract(mut self, expression: impl Into<String>, variable: impl Into<String>) -> Self {
        self.extract.push((expression.into(), variable.into()));
        self
    }
}

/// JSON tree comparison and schema selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JsonValidationContext {
    /// JSONPath expressions of entries to skip.
    pub ignore_expressions: BTreeSet<String>,
    /// Explicit schema name; wins over `schema_repository`.
    pub schema: Option<String>,
    pub schema_repository: Option<String>,
    /// Overrides the global schema validation switch when set.
    pub schema_validation: Option<bool>,
    /// Overrides the global strict comparison switch when set.
    pub strict: Option<bool>,
}

impl JsonValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self, expression: impl Into<String>) -> Self {
        self.ignore_expressions.insert(expression.into());
        self
    }

    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.schema = Some(name.into());
        self
    }

    pub fn schema_repository(mut self, name: impl Into<String>) -> Self {
        self.schema_repository = Some(name.into());
        self
    }

    pub fn schema_validation(mut self, enabled: bool) -> Self {
        self.schema_validation = Some(enabled);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }
}

/// Ordered JSONPath assertions and extractions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JsonPathValidationContext {
    pub expressions: Vec<(String, String)>,
    pub extract: Vec<(String, String)>,
}

impl JsonPathValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expression(mut self, expression: impl Into<String>, expected: impl Into<String>) -> Self {
        self.expressions.push((expression.into(), expected.into()));
        self
    }

    pub fn extract(mut self, expression: impl Into<String>, variable: impl Into<String>) -> Self {
        self.extract.push((expression.into(), variable.into()));
        self
    }
}

/// Assertion script, inline or from a file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptValidationContext {
    pub script: Option<String>,
    pub script_resource: Option<PathBuf>,
    pub script_type: ScriptType,
}

impl ScriptValidationContext {
    pub fn inline(script: impl Into<String>) -> Self {
        Self {
            script: Some(script.into()),
            ..Self::default()
        }
    }

    pub fn resource(path: impl Into<PathBuf>) -> Self {
        Self {
            script_resource: Some(path.into()),
            ..Self::default()
        }
    }

    /// Label used in failure messages.
    pub fn source_name(&self) -> String {
        match &self.script_resource {
            Some(path) => path.display().to_string(),
            None => "inline script".to_string(),
        }
    }
}

/// Additional header expectations on top of the control message headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderValidationContext {
    pub headers: BTreeMap<String, String>,
}

impl HeaderValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
