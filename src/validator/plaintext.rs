//! Plain text comparison with ignore and variable tokens.

use super::{MessageValidator, control_payload};
use crate::config::ValidationSettings;
use crate::context::TestContext;
use crate::enums::MessageType;
use crate::error::{ValidationError, value_mismatch};
use crate::matcher;
use crate::message::Message;
use crate::normalize::{normalize_text, strip_whitespace};
use crate::placeholder;
use crate::validation_context::ValidationContext;
use tracing::{debug, info};

#[derive(Clone, Debug, Default)]
pub struct PlainTextMessageValidator {
    ignore_whitespace: bool,
    ignore_new_line_type: bool,
}

impl PlainTextMessageValidator {
    pub fn new(settings: &ValidationSettings) -> Self {
        Self {
            ignore_whitespace: settings.ignore_whitespace,
            ignore_new_line_type: settings.ignore_new_line_type,
        }
    }

    pub fn ignore_whitespace(mut self, enabled: bool) -> Self {
        self.ignore_whitespace = enabled;
        self
    }

    pub fn ignore_new_line_type(mut self, enabled: bool) -> Self {
        self.ignore_new_line_type = enabled;
        self
    }

    /// Compares received text with control text.
    pub fn validate_text(
        &self,
        received: &str,
        control: &str,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        debug!("Start text message validation");

        let received = self.normalize(received.trim());
        let control = self.normalize(&context.replace_dynamic_content(control.trim())?);
        let control = placeholder::resolve(&control, &received, context)?;

        if matcher::is_matcher_expression(&control) {
            matcher::resolve("payload", &received, &control, context)?;
        } else {
            compare(&received, &control)?;
        }

        info!("Text validation successful: All values OK");
        Ok(())
    }

    fn normalize(&self, text: &str) -> String {
        normalize_text(text, self.ignore_whitespace, self.ignore_new_line_type)
    }
}

fn compare(received: &str, control: &str) -> Result<(), ValidationError> {
    if control.is_empty() {
        debug!("Skip message payload validation as no control message was defined");
        return Ok(());
    }
    if received.is_empty() {
        return Err(ValidationError::mismatch(
            "Validation failed - expected message contents, but received empty message!",
        ));
    }
    if received == control {
        return Ok(());
    }
    if strip_whitespace(received) == strip_whitespace(control) {
        return Err(ValidationError::WhitespaceMismatch {
            expected: control.to_string(),
            actual: received.to_string(),
        });
    }
    Err(value_mismatch("Text values not equal", control, received))
}

impl MessageValidator for PlainTextMessageValidator {
    fn name(&self) -> &str {
        "defaultPlaintextMessageValidator"
    }

    fn supports_message_type(&self, message_type: &str, _message: &Message) -> bool {
        MessageType::Plaintext.matches(message_type)
    }

    fn validate_message(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &mut TestContext,
        _validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let Some(control) = control_payload(control) else {
            debug!("Skip message payload validation as no control message was defined");
            return Ok(());
        };
        self.validate_text(&received.payload_text(), &control, context)
    }
}
