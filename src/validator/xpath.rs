//! XPath assertions and extractions on XML payloads.

use super::{MessageValidator, validate_value};
use crate::context::TestContext;
use crate::enums::MessageType;
use crate::error::ValidationError;
use crate::message::Message;
use crate::validation_context::{ValidationContext, xpath_contexts};
use crate::xpath::{XPathResult, evaluate_typed};
use roxmltree::Document;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Parses an XML payload, failing with a payload error.
pub(crate) fn parse_document(text: &str) -> Result<Document<'_>, ValidationError> {
    Document::parse(text)
        .map_err(|e| ValidationError::malformed(format!("Failed to parse XML message payload: {}", e)))
}

/// Evaluates an expression and renders it the way `expected` is written.
fn actual_value(
    document: &Document<'_>,
    expression: &str,
    namespaces: &BTreeMap<String, String>,
    expected: &str,
) -> Result<String, ValidationError> {
    let result = evaluate_typed(document, expression, namespaces)?;
    let bracketed = matches!(result, XPathResult::NodeSet(_))
        && expected.trim_start().starts_with('[')
        && expected.trim_end().ends_with(']');
    Ok(result.render(bracketed))
}

/// Binds each `expression -> variable` result into the test context.
pub fn extract_variables(
    document: &Document<'_>,
    extract: &[(String, String)],
    namespaces: &BTreeMap<String, String>,
    context: &mut TestContext,
) -> Result<(), ValidationError> {
    for (expression, variable) in extract {
        let expression = context.replace_dynamic_content(expression)?;
        let value = evaluate_typed(document, &expression, namespaces)?.render(false);
        debug!(expression = expression.as_str(), variable = variable.as_str(), "extracting XPath value");
        context.set_variable(variable, value)?;
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default)]
pub struct XpathMessageValidator;

impl MessageValidator for XpathMessageValidator {
    fn name(&self) -> &str {
        "defaultXPathMessageValidator"
    }

    fn supports_message_type(&self, message_type: &str, message: &Message) -> bool {
        (MessageType::Xml.matches(message_type) || MessageType::Xhtml.matches(message_type))
            && (message.payload.is_empty() || message.has_xml_payload())
    }

    fn applies_to(&self, validation_contexts: &[ValidationContext]) -> bool {
        xpath_contexts(validation_contexts).next().is_some()
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
        debug!("Start XPath element validation");

        let payload = received.payload_text();
        if payload.trim().is_empty() {
            return Err(ValidationError::mismatch(
                "Unable to validate message elements - receive message payload was empty",
            ));
        }
        let document = parse_document(&payload)?;

        for validation_context in xpath_contexts(validation_contexts) {
            for (expression, expected) in &validation_context.expressions {
                let expression = context.replace_dynamic_content(expression)?;
                let actual =
                    actual_value(&document, &expression, &validation_context.namespaces, expected)?;
                validate_value(&expression, &actual, expected, context)?;
                debug!(expression = expression.as_str(), "validating element: value as expected");
            }
            extract_variables(
                &document,
                &validation_context.extract,
                &validation_context.namespaces,
                context,
            )?;
        }

        info!("XPath element validation successful: All elements OK");
        Ok(())
    }
}
