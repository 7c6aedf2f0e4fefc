//! Message validators.
//!
//! Every validator implements [`MessageValidator`]. Field level comparisons of
//! the path based validators share [`validate_value`], so ignore, variable and
//! matcher tokens behave the same for XPath, JSONPath, JSON trees, headers and
//! result sets.

pub mod binary;
pub mod header;
pub mod json;
pub mod json_path;
pub mod json_schema;
pub mod plaintext;
pub mod result_set;
pub mod script;
pub mod xml;
pub mod xpath;

use crate::context::TestContext;
use crate::error::{ValidationError, value_mismatch};
use crate::matcher;
use crate::message::Message;
use crate::placeholder::{self, IGNORE_PLACEHOLDER};
use crate::validation_context::ValidationContext;
use tracing::debug;

/// Compares a received message against expectations.
pub trait MessageValidator: Send + Sync {
    /// Registry name, e.g. `"defaultJsonMessageValidator"`.
    fn name(&self) -> &str;

    /// Whether this validator handles the declared type for this message.
    fn supports_message_type(&self, message_type: &str, message: &Message) -> bool;

    /// Whether the configured contexts ask for this validator at all.
    ///
    /// Validators that only make sense with their own context (XPath, JSONPath,
    /// script) return false when it is missing.
    fn applies_to(&self, _validation_contexts: &[ValidationContext]) -> bool {
        true
    }

    /// Validates `received`, returning the first mismatch.
    ///
    /// A missing or empty control message is not a failure; validators that
    /// compare against it skip their work.
    fn validate_message(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &mut TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError>;
}

/// Compares one received field value with its expected value.
///
/// Pipeline: `${}` expansion, exact `@ignore@`, positional placeholders,
/// matcher expression, string equality. Plain text payloads resolve in the
/// same order.
pub fn validate_value(
    field: &str,
    actual: &str,
    expected: &str,
    context: &mut TestContext,
) -> Result<(), ValidationError> {
    let base = format!("Values not equal for element '{}'", field);
    validate_value_with(&base, field, actual, expected, context)
}

/// [`validate_value`] with a caller supplied mismatch message prefix.
pub fn validate_value_with(
    base: &str,
    field: &str,
    actual: &str,
    expected: &str,
    context: &mut TestContext,
) -> Result<(), ValidationError> {
    let expected = context.replace_dynamic_content(expected)?;

    if expected.trim() == IGNORE_PLACEHOLDER {
        debug!(field, "ignoring value");
        return Ok(());
    }

    let expected = if placeholder::contains_placeholder(&expected) {
        placeholder::resolve(&expected, actual, context)?
    } else {
        expected
    };

    if matcher::is_matcher_expression(&expected) {
        return matcher::resolve(field, actual, &expected, context);
    }

    if actual != expected {
        return Err(value_mismatch(base, expected, actual));
    }
    debug!(field, value = actual, "value as expected");
    Ok(())
}

/// Control payload text, `None` when the control message is missing or blank.
pub(crate) fn control_payload(control: Option<&Message>) -> Option<String> {
    let text = control?.payload_text().into_owned();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
