//! Base64 and gzip+base64 payload validators.
//!
//! Raw byte payloads are converted into base64 text, after gunzip for the
//! gzip variant, and compared as plain text against a base64 control payload.
//! The received message is never modified; comparison runs on a converted copy.

use super::plaintext::PlainTextMessageValidator;
use super::{MessageValidator, control_payload};
use crate::config::ValidationSettings;
use crate::context::TestContext;
use crate::enums::MessageType;
use crate::error::ValidationError;
use crate::message::{Message, Payload};
use crate::validation_context::ValidationContext;
use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::read::GzDecoder;
use std::borrow::Cow;
use std::io::Read;
use tracing::debug;

/// Text form of a received payload after transport decoding.
fn encoded_payload(payload: &Payload, gunzip: bool) -> Result<Cow<'_, str>, ValidationError> {
    match payload {
        Payload::Text(text) => Ok(Cow::Borrowed(text)),
        Payload::Binary(bytes) if gunzip => {
            let mut decoded = Vec::new();
            GzDecoder::new(bytes.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|e| ValidationError::io("Failed to validate gzipped message", e))?;
            Ok(Cow::Owned(STANDARD.encode(decoded)))
        }
        Payload::Binary(bytes) => Ok(Cow::Owned(STANDARD.encode(bytes))),
    }
}

#[derive(Clone, Debug, Default)]
pub struct BinaryBase64MessageValidator {
    text: PlainTextMessageValidator,
}

impl BinaryBase64MessageValidator {
    pub fn new(settings: &ValidationSettings) -> Self {
        Self {
            text: PlainTextMessageValidator::new(settings),
        }
    }
}

impl MessageValidator for BinaryBase64MessageValidator {
    fn name(&self) -> &str {
        "defaultBinaryBase64MessageValidator"
    }

    fn supports_message_type(&self, message_type: &str, _message: &Message) -> bool {
        MessageType::BinaryBase64.matches(message_type)
    }

    fn validate_message(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &mut TestContext,
        _validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let Some(control) = control_payload(control) else {
            debug!("Skip binary payload validation as no control message was defined");
            return Ok(());
        };
        let received = encoded_payload(&received.payload, false)?;
        self.text.validate_text(&received, &control, context)
    }
}

#[derive(Clone, Debug, Default)]
pub struct GzipBase64MessageValidator {
    text: PlainTextMessageValidator,
}

impl GzipBase64MessageValidator {
    pub fn new(settings: &ValidationSettings) -> Self {
        Self {
            text: PlainTextMessageValidator::new(settings),
        }
    }
}

impl MessageValidator for GzipBase64MessageValidator {
    fn name(&self) -> &str {
        "defaultGzipBinaryBase64MessageValidator"
    }

    fn supports_message_type(&self, message_type: &str, _message: &Message) -> bool {
        MessageType::GzipBase64.matches(message_type)
    }

    fn validate_message(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &mut TestContext,
        _validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let Some(control) = control_payload(control) else {
            debug!("Skip gzip payload validation as no control message was defined");
            return Ok(());
        };
        let received = encoded_payload(&received.payload, true)?;
        self.text.validate_text(&received, &control, context)
    }
}
