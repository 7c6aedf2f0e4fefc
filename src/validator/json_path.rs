//! JSONPath assertions and extractions on JSON payloads.

use super::{MessageValidator, validate_value};
use crate::context::TestContext;
use crate::enums::MessageType;
use crate::error::ValidationError;
use crate::json_path;
use crate::message::Message;
use crate::validation_context::{ValidationContext, json_path_contexts};
use serde_json::Value;
use tracing::{debug, info};

/// Binds each `expression -> variable` result into the test context.
pub fn extract_variables(
    json: &Value,
    extract: &[(String, String)],
    context: &mut TestContext,
) -> Result<(), ValidationError> {
    for (expression, variable) in extract {
        let expression = context.replace_dynamic_content(expression)?;
        let value = json_path::evaluate_to_string(json, &expression)?;
        debug!(expression = expression.as_str(), variable = variable.as_str(), "extracting JSONPath value");
        context.set_variable(variable, value)?;
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonPathMessageValidator;

impl MessageValidator for JsonPathMessageValidator {
    fn name(&self) -> &str {
        "defaultJsonPathMessageValidator"
    }

    fn supports_message_type(&self, message_type: &str, message: &Message) -> bool {
        MessageType::Json.matches(message_type)
            && (message.payload.is_empty() || message.has_json_payload())
    }

    fn applies_to(&self, validation_contexts: &[ValidationContext]) -> bool {
        json_path_contexts(validation_contexts).next().is_some()
    }

    fn validate_message(
        &self,
        received: &Message,
        _control: Option<&Message>,
        context: &mut TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        if !self.applies_to(validation_contexts) {
            return Ok(());
        }
        debug!("Start JSONPath element validation");

        let payload = received.payload_text();
        if payload.trim().is_empty() {
            return Err(ValidationError::mismatch(
                "Unable to validate message elements - receive message payload was empty",
            ));
        }
        let json: Value = serde_json::from_str(&payload).map_err(|e| {
            ValidationError::malformed(format!("Failed to parse received JSON text: {}", e))
        })?;

        for validation_context in json_path_contexts(validation_contexts) {
            for (expression, expected) in &validation_context.expressions {
                let expression = context.replace_dynamic_content(expression)?;
                let actual = json_path::evaluate_to_string(&json, &expression)?;
                validate_value(&expression, &actual, expected, context)?;
                debug!(expression = expression.as_str(), "validating element: value as expected");
            }
            extract_variables(&json, &validation_context.extract, context)?;
        }

        info!("JSONPath element validation successful: All values OK");
        Ok(())
    }
}
