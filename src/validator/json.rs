//! Full-tree JSON comparison of a received payload against a control payload.

use super::json_schema::JsonSchemaValidation;
use super::{MessageValidator, control_payload, validate_value_with};
use crate::config::ValidationSettings;
use crate::context::TestContext;
use crate::enums::MessageType;
use crate::error::{ValidationError, value_mismatch};
use crate::json_path::normalize_path;
use crate::matcher;
use crate::message::Message;
use crate::placeholder::IGNORE_PLACEHOLDER;
use crate::validation_context::{JsonValidationContext, ValidationContext, json_context};
use serde_json::{Map, Value};
use serde_json_path::JsonPath;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct JsonTextMessageValidator {
    strict: bool,
    schema_validation_enabled: bool,
    schema_validation: JsonSchemaValidation,
}

impl Default for JsonTextMessageValidator {
    fn default() -> Self {
        Self::new(&ValidationSettings::default())
    }
}

impl JsonTextMessageValidator {
    pub fn new(settings: &ValidationSettings) -> Self {
        Self {
            strict: settings.json_strict,
            schema_validation_enabled: settings.json_schema_validation_enabled,
            schema_validation: JsonSchemaValidation,
        }
    }

    /// Require equal entry counts and array sizes.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn schema_validation(mut self, enabled: bool) -> Self {
        self.schema_validation_enabled = enabled;
        self
    }
}

fn parse_json(text: &str, what: &str) -> Result<Value, ValidationError> {
    serde_json::from_str(text)
        .map_err(|e| ValidationError::malformed(format!("Failed to parse {} JSON text: {}", what, e)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pointer_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// JSON pointers of the received entries selected by the ignore expressions.
fn ignored_pointers(
    received: &Value,
    expressions: impl IntoIterator<Item = impl AsRef<str>>,
) -> Result<HashSet<String>, ValidationError> {
    let mut pointers = HashSet::new();
    for expression in expressions {
        let expression = expression.as_ref();
        let path = JsonPath::parse(&normalize_path(expression))
            .map_err(|e| ValidationError::invalid_expression(expression, e.to_string()))?;
        for node in path.query_located(received) {
            pointers.insert(node.location().to_json_pointer());
        }
    }
    Ok(pointers)
}

/// One comparison run; `path` is the display path and `pointer` the JSON pointer.
struct TreeComparison<'a> {
    strict: bool,
    ignored: &'a HashSet<String>,
}

impl TreeComparison<'_> {
    fn compare(
        &self,
        path: &str,
        pointer: &str,
        received: &Value,
        control: &Value,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        if self.ignored.contains(pointer) {
            debug!(entry = path, "JSON entry is ignored - skip value validation");
            return Ok(());
        }
        if let Value::String(expected) = control {
            if expected.trim() == IGNORE_PLACEHOLDER {
                debug!(entry = path, "JSON entry is ignored by placeholder");
                return Ok(());
            }
            let scalar = matches!(received, Value::String(_) | Value::Number(_) | Value::Bool(_));
            if !scalar && matcher::is_matcher_expression(expected) {
                let actual = if received.is_null() {
                    String::new()
                } else {
                    scalar_text(received)
                };
                return matcher::resolve(path, &actual, expected, context);
            }
        }

        match (control, received) {
            (Value::Object(expected), Value::Object(actual)) => {
                self.compare_objects(path, pointer, actual, expected, context)
            }
            (Value::Array(expected), Value::Array(actual)) => {
                self.compare_arrays(path, pointer, actual, expected, context)
            }
            (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => {
                Err(value_mismatch(
                    &format!("Type mismatch for JSON entry '{}'", path),
                    type_name(control),
                    type_name(received),
                ))
            }
            (Value::Null, actual) if !actual.is_null() => Err(value_mismatch(
                &format!("Values not equal for entry: '{}'", path),
                "null",
                scalar_text(actual),
            )),
            (Value::String(expected), Value::Null) if expected.trim().is_empty() => Ok(()),
            _ => {
                let base = format!("Values not equal for entry: '{}'", path);
                validate_value_with(&base, path, &scalar_text(received), &scalar_text(control), context)
            }
        }
    }

    fn compare_objects(
        &self,
        path: &str,
        pointer: &str,
        received: &Map<String, Value>,
        control: &Map<String, Value>,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        if self.strict && control.len() != received.len() {
            return Err(value_mismatch(
                &format!("Number of JSON entries not equal for element: '{}'", path),
                control.len(),
                received.len(),
            ));
        }
        for (key, expected) in control {
            let actual = received
                .get(key)
                .ok_or_else(|| ValidationError::mismatch(format!("Missing JSON entry: '{}'", key)))?;
            let child_path = format!("{}.{}", path, key);
            let child_pointer = format!("{}/{}", pointer, pointer_token(key));
            self.compare(&child_path, &child_pointer, actual, expected, context)?;
            debug!(entry = child_path.as_str(), "validation successful for JSON entry");
        }
        Ok(())
    }

    fn compare_arrays(
        &self,
        path: &str,
        pointer: &str,
        received: &[Value],
        control: &[Value],
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        debug!(entries = control.len(), "validating JSON array");
        if (self.strict && control.len() != received.len()) || control.len() > received.len() {
            return Err(value_mismatch(
                &format!("JSON array size mismatch for JSON entry '{}'", path),
                control.len(),
                received.len(),
            ));
        }
        for (i, (expected, actual)) in control.iter().zip(received).enumerate() {
            self.compare(
                &format!("{}[{}]", path, i),
                &format!("{}/{}", pointer, i),
                actual,
                expected,
                context,
            )?;
        }
        Ok(())
    }
}

impl JsonTextMessageValidator {
    /// Compares two parsed JSON documents.
    pub fn validate_json(
        &self,
        received: &Value,
        control: &Value,
        validation_context: &JsonValidationContext,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        let ignored = ignored_pointers(received, &validation_context.ignore_expressions)?;
        let comparison = TreeComparison {
            strict: validation_context.strict.unwrap_or(self.strict),
            ignored: &ignored,
        };
        comparison.compare("$", "", received, control, context)
    }
}

impl MessageValidator for JsonTextMessageValidator {
    fn name(&self) -> &str {
        "defaultJsonMessageValidator"
    }

    fn supports_message_type(&self, message_type: &str, message: &Message) -> bool {
        MessageType::Json.matches(message_type)
            && (message.payload.is_empty() || message.has_json_payload())
    }

    fn validate_message(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &mut TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let validation_context = json_context(validation_contexts).cloned().unwrap_or_default();
        let received_text = received.payload_text();

        if validation_context
            .schema_validation
            .unwrap_or(self.schema_validation_enabled)
        {
            let json = parse_json(&received_text, "received")?;
            self.schema_validation
                .validate(&json, context.references(), &validation_context)?;
        }

        let Some(control) = control_payload(control) else {
            debug!("Skip message payload validation as no control message was defined");
            return Ok(());
        };
        debug!("Start JSON message validation");

        let control_text = context.replace_dynamic_content(&control)?;
        if control_text.trim().is_empty() {
            debug!("Skip message payload validation as no control message was defined");
            return Ok(());
        }
        if received_text.trim().is_empty() {
            return Err(ValidationError::mismatch(
                "Validation failed - expected message contents, but received empty message!",
            ));
        }

        let received_json = parse_json(&received_text, "received")?;
        let control_json = parse_json(&control_text, "control")?;
        self.validate_json(&received_json, &control_json, &validation_context, context)?;

        info!("JSON message validation successful: All values OK");
        Ok(())
    }
}
