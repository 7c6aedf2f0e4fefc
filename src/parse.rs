//! Validation definitions in YAML.
//!
//! A definition document is a list of single-key blocks, one per validation
//! context:
//!
//! ```yaml
//! - xpath:
//!     namespaces: {ns: "http://citrus/test"}
//!     expressions:
//!       //ns:greeting: Hello
//!       count(//item): 3
//!     extract:
//!       //ns:id: messageId
//! - json_path:
//!     expressions: {$.user.name: Penny}
//! - json: {ignore: [$.id], schema: userSchema}
//! - script: {type: cel, script: "json.user.age > 18"}
//! - header: {operation: sayHello}
//! - xml: {ignore: [//timestamp]}
//! - plaintext: {}
//! ```
//!
//! Expression maps keep their document order. Scalar values are read as text,
//! so `count(//item): 3` expects `"3"`.

use crate::enums::ScriptType;
use crate::error::ValidationError;
use crate::validation_context::{
    HeaderValidationContext, JsonPathValidationContext, JsonValidationContext,
    ScriptValidationContext, ValidationContext, XmlValidationContext, XpathValidationContext,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ValidationBlock {
    Xpath(XpathBlock),
    JsonPath(JsonPathBlock),
    Json(JsonBlock),
    Script(ScriptBlock),
    Plaintext(PlaintextBlock),
    Header(Map<String, Value>),
    Xml(XmlBlock),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct XpathBlock {
    #[serde(default)]
    expressions: Map<String, Value>,
    #[serde(default)]
    namespaces: Map<String, Value>,
    #[serde(default)]
    extract: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonPathBlock {
    #[serde(default)]
    expressions: Map<String, Value>,
    #[serde(default)]
    extract: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonBlock {
    #[serde(default)]
    ignore: Vec<String>,
    schema: Option<String>,
    schema_repository: Option<String>,
    schema_validation: Option<bool>,
    strict: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptBlock {
    #[serde(default, rename = "type")]
    script_type: ScriptType,
    script: Option<String>,
    resource: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlaintextBlock {}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlBlock {
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default)]
    namespaces: Map<String, Value>,
    #[serde(default)]
    control_namespaces: Map<String, Value>,
}

/// Parses a YAML list of validation blocks into validation contexts.
///
/// Blank input yields no contexts.
///
/// # Errors
///
/// Returns [`ValidationError::Configuration`] for YAML syntax errors, a root
/// that is not a list, unknown block or field names, non-scalar expected
/// values, and script blocks without exactly one of `script`/`resource`.
pub fn parse_validations(input: &str) -> Result<Vec<ValidationContext>, ValidationError> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_saphyr::from_str(input).map_err(|e| {
        ValidationError::configuration(format!("Invalid validation definitions: {}", e))
    })?;
    let Value::Array(blocks) = value else {
        return Err(ValidationError::configuration(
            "Invalid validation definitions: root must be a YAML list of validation blocks",
        ));
    };

    let mut contexts = Vec::with_capacity(blocks.len());
    for (index, block) in blocks.into_iter().enumerate() {
        let block: ValidationBlock = serde_json::from_value(block).map_err(|e| {
            ValidationError::configuration(format!(
                "Invalid validation block at index {}: {}",
                index, e
            ))
        })?;
        let context = block.into_context().map_err(|e| match e {
            ValidationError::Configuration { message } => ValidationError::configuration(
                format!("Invalid validation block at index {}: {}", index, message),
            ),
            other => other,
        })?;
        debug!(index, kind = context.kind(), "parsed validation block");
        contexts.push(context);
    }
    Ok(contexts)
}

impl ValidationBlock {
    fn into_context(self) -> Result<ValidationContext, ValidationError> {
        Ok(match self {
            ValidationBlock::Xpath(block) => ValidationContext::Xpath(XpathValidationContext {
                expressions: text_pairs(block.expressions, "expressions")?,
                namespaces: text_pairs(block.namespaces, "namespaces")?.into_iter().collect(),
                extract: text_pairs(block.extract, "extract")?,
            }),
            ValidationBlock::JsonPath(block) => {
                ValidationContext::JsonPath(JsonPathValidationContext {
                    expressions: text_pairs(block.expressions, "expressions")?,
                    extract: text_pairs(block.extract, "extract")?,
                })
            }
            ValidationBlock::Json(block) => ValidationContext::Json(JsonValidationContext {
                ignore_expressions: block.ignore.into_iter().collect(),
                schema: block.schema,
                schema_repository: block.schema_repository,
                schema_validation: block.schema_validation,
                strict: block.strict,
            }),
            ValidationBlock::Script(block) => {
                if block.script.is_some() == block.resource.is_some() {
                    return Err(ValidationError::configuration(
                        "script block needs exactly one of 'script' or 'resource'",
                    ));
                }
                ValidationContext::Script(ScriptValidationContext {
                    script: block.script,
                    script_resource: block.resource,
                    script_type: block.script_type,
                })
            }
            ValidationBlock::Plaintext(PlaintextBlock {}) => ValidationContext::Default,
            ValidationBlock::Header(headers) => ValidationContext::Header(HeaderValidationContext {
                headers: text_pairs(headers, "header")?.into_iter().collect(),
            }),
            ValidationBlock::Xml(block) => ValidationContext::Xml(XmlValidationContext {
                ignore_expressions: block.ignore.into_iter().collect(),
                namespaces: text_pairs(block.namespaces, "namespaces")?.into_iter().collect(),
                control_namespaces: text_pairs(block.control_namespaces, "control_namespaces")?
                    .into_iter()
                    .collect(),
            }),
        })
    }
}

/// Map entries as text pairs, in document order.
fn text_pairs(map: Map<String, Value>, field: &str) -> Result<Vec<(String, String)>, ValidationError> {
    map.into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ValidationError::configuration(format!(
                        "{} entry '{}' must be a scalar value",
                        field, key
                    )));
                }
            };
            Ok((key, text))
        })
        .collect()
}
