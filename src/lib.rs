//! Message validation engine for integration tests.
//!
//! A received [`Message`] is checked against a control message and a set of
//! [`ValidationContext`]s. Validators for plaintext, XML (DOM tree and XPath),
//! JSON (tree, JSONPath and JSON Schema), base64/gzip payloads, headers and
//! assertion scripts share one value pipeline:
//!
//! ```text
//! ${variable} expansion → @ignore@ → positional @ignore@/@variable@ → @matcher(args)@ → equality
//! ```
//!
//! Extracted values land in the [`TestContext`] for later steps.
//!
//! # Quick Start
//!
//! ```rust
//! use citrus_validation::{Message, TestContext};
//!
//! let received = Message::new(r#"{"user": {"name": "Penny", "id": 4711}}"#).with_type("JSON");
//! let control = Message::new(r#"{"user": {"name": "Penny", "id": "@ignore@"}}"#);
//! let definitions = r#"
//! - json_path:
//!     expressions:
//!       $.user.name: "@startsWith('Pen')@"
//!     extract:
//!       $.user.id: userId
//! "#;
//!
//! let mut context = TestContext::new();
//! citrus_validation::validate_message(&received, Some(&control), definitions, &mut context)
//!     .expect("message is valid");
//! assert_eq!(context.get_variable("userId"), Some("4711"));
//! ```
//!
//! # Feature Flags
//!
//! | Feature       | Default | Description |
//! |---------------|---------|-------------|
//! | `script-eval` | yes     | CEL assertion scripts via the [`cel`] crate. Enables [`validator::script::DefaultCelEvaluator`]. |

pub mod config;
pub mod context;
pub mod enums;
pub mod error;
pub mod json_path;
pub mod matcher;
pub mod message;
pub mod normalize;
pub mod parse;
pub mod placeholder;
pub mod registry;
pub mod schema_repository;
pub mod validation_context;
pub mod validator;
pub mod xpath;

pub use config::ValidationSettings;
pub use context::{ReferenceResolver, TestContext};
pub use enums::{MessageType, ScriptType, XpathResultType};
pub use error::{ErrorKind, ValidationError};
pub use message::{Message, Payload};
pub use registry::MessageValidatorRegistry;
pub use validation_context::*;
pub use validator::MessageValidator;

// Re-export entry-point functions at the crate root for convenience.
pub use parse::parse_validations;

/// Convenience entry point composing settings → parse → validate.
///
/// Settings come from the `CITRUS_*` environment, validators from
/// [`MessageValidatorRegistry::default_registry`] and contexts from the YAML
/// `definitions` (see [`parse_validations`]).
///
/// # Errors
///
/// Returns the first configuration problem or validation failure.
pub fn validate_message(
    received: &Message,
    control: Option<&Message>,
    definitions: &str,
    context: &mut TestContext,
) -> Result<(), ValidationError> {
    let settings = ValidationSettings::load(None)?;
    let validation_contexts = parse::parse_validations(definitions)?;
    MessageValidatorRegistry::default_registry(&settings).validate(
        received,
        control,
        context,
        &validation_contexts,
    )
}
