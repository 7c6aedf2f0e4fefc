//! Message header validation.

use super::{MessageValidator, validate_value_with};
use crate::context::TestContext;
use crate::error::ValidationError;
use crate::message::Message;
use crate::validation_context::{ValidationContext, header_context};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Prefix of framework internal headers that are never compared.
pub const INTERNAL_HEADER_PREFIX: &str = "citrus_";

/// Exact lookup first, then case-insensitive.
fn find_header<'m>(message: &'m Message, name: &str) -> Option<&'m str> {
    message.header(name).or_else(|| {
        message
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderValidator;

impl HeaderValidator {
    /// Validates every expected header against the received message.
    pub fn validate_headers<'e>(
        &self,
        received: &Message,
        expected: impl IntoIterator<Item = (&'e String, &'e String)>,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        for (name, value) in expected {
            if name.starts_with(INTERNAL_HEADER_PREFIX) {
                continue;
            }
            let name = context.replace_dynamic_content(name)?;
            let actual = find_header(received, &name).ok_or_else(|| {
                ValidationError::mismatch(format!(
                    "Validation failed: Header element '{}' is missing",
                    name
                ))
            })?;
            validate_value_with(
                &format!("Values not equal for header element '{}'", name),
                &name,
                actual,
                value,
                context,
            )?;
            debug!(header = name.as_str(), value = actual, "validating header element: value as expected");
        }
        Ok(())
    }
}

impl MessageValidator for HeaderValidator {
    fn name(&self) -> &str {
        "defaultMessageHeaderValidator"
    }

    fn supports_message_type(&self, _message_type: &str, _message: &Message) -> bool {
        true
    }

    fn validate_message(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &mut TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let mut expected: BTreeMap<&String, &String> = control
            .map(|control| control.headers.iter().collect())
            .unwrap_or_default();
        if let Some(header_context) = header_context(validation_contexts) {
            expected.extend(header_context.headers.iter());
        }
        if expected.is_empty() {
            return Ok(());
        }

        debug!("Start message header validation");
        self.validate_headers(received, expected, context)?;
        info!("Message header validation successful: All values OK");
        Ok(())
    }
}
