//! Assertion scripts evaluated against the received message.
//!
//! A script is a list of lines:
//!
//! ```text
//! // comment
//! assert json.user.name == "Penny"
//! size(root.children) == 2
//! set orderId = json.order.id
//! ```
//!
//! `assert <expr>` and bare expressions must yield `true`; `set <name> = <expr>`
//! stores the result as a test variable, visible to later lines through
//! `variables`. Expressions see these bindings:
//!
//! | Name        | Value                                                    |
//! |-------------|----------------------------------------------------------|
//! | `payload`   | payload text                                             |
//! | `headers`   | header map                                               |
//! | `json`      | parsed JSON payload, `null` when not JSON                |
//! | `root`      | XML root element (see [`element_to_json`]), `null` when not XML |
//! | `variables` | test context variables                                   |
//!
//! Expressions are CEL, evaluated by [`DefaultCelEvaluator`] when the
//! `script-eval` feature is on. Other engines plug in via [`ScriptEvaluator`].

use super::MessageValidator;
use crate::context::TestContext;
use crate::enums::MessageType;
use crate::error::ValidationError;
use crate::message::Message;
use crate::validation_context::{ScriptValidationContext, ValidationContext, script_contexts};
use roxmltree::{Document, Node};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Evaluates one script expression against a JSON object of named bindings.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, bindings: &Value) -> Result<Value, ValidationError>;
}

// ─── Default CEL evaluator (behind `script-eval` feature) ──────────────────

/// CEL evaluator backed by the `cel` crate.
///
/// Missing map keys and undeclared names evaluate to `false`, so an assertion
/// on an absent field fails instead of aborting the script.
#[cfg(feature = "script-eval")]
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCelEvaluator;

#[cfg(feature = "script-eval")]
impl ScriptEvaluator for DefaultCelEvaluator {
    fn evaluate(&self, expression: &str, bindings: &Value) -> Result<Value, ValidationError> {
        let program = cel::Program::compile(expression).map_err(|e| {
            ValidationError::invalid_expression(expression, format!("CEL compile error: {}", e))
        })?;

        let mut cel_ctx = cel::Context::default();
        if let Value::Object(map) = bindings {
            for (key, value) in map {
                cel_ctx.add_variable_from_value(key.as_str(), json_to_cel(value));
            }
        }

        match program.execute(&cel_ctx) {
            Ok(result) => Ok(cel_to_json(&result)),
            Err(cel::ExecutionError::NoSuchKey(_)) => Ok(Value::Bool(false)),
            Err(cel::ExecutionError::UndeclaredReference(_)) => Ok(Value::Bool(false)),
            Err(ref e @ cel::ExecutionError::NotSupportedAsMethod { .. }) => Err(
                ValidationError::configuration(format!("CEL unsupported method: {}", e)),
            ),
            Err(e) => Err(ValidationError::configuration(format!(
                "CEL execution error in `{}`: {}",
                expression, e
            ))),
        }
    }
}

#[cfg(feature = "script-eval")]
fn json_to_cel(value: &Value) -> cel::Value {
    use std::collections::HashMap;

    match value {
        Value::Null => cel::Value::Null,
        Value::Bool(b) => cel::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                cel::Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                cel::Value::UInt(u)
            } else if let Some(f) = n.as_f64() {
                cel::Value::Float(f)
            } else {
                cel::Value::Null
            }
        }
        Value::String(s) => cel::Value::String(Arc::new(s.clone())),
        Value::Array(arr) => cel::Value::List(Arc::new(arr.iter().map(json_to_cel).collect())),
        Value::Object(map) => {
            let entries: HashMap<String, cel::Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), json_to_cel(v)))
                .collect();
            entries.into()
        }
    }
}

#[cfg(feature = "script-eval")]
fn cel_to_json(value: &cel::Value) -> Value {
    match value {
        cel::Value::Null => Value::Null,
        cel::Value::Bool(b) => Value::Bool(*b),
        cel::Value::Int(i) => Value::Number((*i).into()),
        cel::Value::UInt(u) => Value::Number((*u).into()),
        cel::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        cel::Value::String(s) => Value::String(s.to_string()),
        cel::Value::List(l) => Value::Array(l.iter().map(cel_to_json).collect()),
        cel::Value::Map(m) => {
            let mut obj = Map::new();
            for (key, val) in m.map.iter() {
                let k = match key {
                    cel::objects::Key::String(s) => s.to_string(),
                    cel::objects::Key::Int(i) => i.to_string(),
                    cel::objects::Key::Uint(u) => u.to_string(),
                    cel::objects::Key::Bool(b) => b.to_string(),
                };
                obj.insert(k, cel_to_json(val));
            }
            Value::Object(obj)
        }
        // Bytes, Duration, Timestamp, Function, Opaque
        _ => Value::Null,
    }
}

// ─── Script model ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Assert(String),
    Set { name: String, expression: String },
}

/// A statement with its 1-based source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub statement: Statement,
}

/// Splits a script into statements; blank lines and `//` comments are dropped.
pub fn parse_script(script: &str) -> Result<Vec<ScriptLine>, ValidationError> {
    let mut lines = Vec::new();
    for (index, raw) in script.lines().enumerate() {
        let text = raw.trim();
        if text.is_empty() || text.starts_with("//") {
            continue;
        }
        let statement = if let Some(rest) = text.strip_prefix("set ") {
            let (name, expression) = rest.split_once('=').ok_or_else(|| {
                ValidationError::invalid_expression(text, "expected `set <name> = <expression>`")
            })?;
            let name = name.trim();
            let valid_name = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
            if !valid_name || expression.trim().is_empty() {
                return Err(ValidationError::invalid_expression(
                    text,
                    "expected `set <name> = <expression>`",
                ));
            }
            Statement::Set {
                name: name.to_string(),
                expression: expression.trim().to_string(),
            }
        } else {
            let expression = text.strip_prefix("assert ").unwrap_or(text).trim();
            Statement::Assert(expression.to_string())
        };
        lines.push(ScriptLine {
            line: index + 1,
            statement,
        });
    }
    Ok(lines)
}

/// Converts an XML element into the `root` binding shape.
///
/// Keys: `name`, `namespace`, `text` (trimmed direct text), `attributes`,
/// `children`, plus each child element under its local name (first occurrence)
/// unless that name is already taken.
pub fn element_to_json(node: Node<'_, '_>) -> Value {
    let attributes: Map<String, Value> = node
        .attributes()
        .map(|a| (a.name().to_string(), Value::String(a.value().to_string())))
        .collect();
    let text: String = node
        .children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let children: Vec<(String, Value)> = node
        .children()
        .filter(|n| n.is_element())
        .map(|child| (child.tag_name().name().to_string(), element_to_json(child)))
        .collect();

    let mut element = Map::new();
    element.insert("name".into(), Value::String(node.tag_name().name().to_string()));
    element.insert(
        "namespace".into(),
        node.tag_name()
            .namespace()
            .map_or(Value::Null, |ns| Value::String(ns.to_string())),
    );
    element.insert("text".into(), Value::String(text.trim().to_string()));
    element.insert("attributes".into(), Value::Object(attributes));
    element.insert(
        "children".into(),
        Value::Array(children.iter().map(|(_, child)| child.clone()).collect()),
    );
    for (name, child) in children {
        element.entry(name).or_insert(child);
    }
    Value::Object(element)
}

/// Bindings visible to script expressions.
pub fn script_bindings(message: &Message, context: &TestContext) -> Value {
    let payload = message.payload_text();
    let json = if message.has_json_payload() {
        serde_json::from_str(&payload).unwrap_or(Value::Null)
    } else {
        Value::Null
    };
    let root = if message.has_xml_payload() {
        Document::parse(&payload)
            .map(|document| element_to_json(document.root_element()))
            .unwrap_or(Value::Null)
    } else {
        Value::Null
    };
    let headers: Map<String, Value> = message
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let variables: Map<String, Value> = context
        .variables()
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    let mut bindings = Map::new();
    bindings.insert("payload".into(), Value::String(payload.into_owned()));
    bindings.insert("headers".into(), Value::Object(headers));
    bindings.insert("json".into(), json);
    bindings.insert("root".into(), root);
    bindings.insert("variables".into(), Value::Object(variables));
    Value::Object(bindings)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Left and right operand of a top-level `==` or `!=`.
fn comparison_operands(expression: &str) -> Option<(&str, &str)> {
    let bytes = expression.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    for i in 0..bytes.len().saturating_sub(1) {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                b'=' | b'!' if depth == 0 && bytes[i + 1] == b'=' => {
                    return Some((expression[..i].trim(), expression[i + 2..].trim()));
                }
                _ => {}
            },
        }
    }
    None
}

// ─── Validator ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ScriptValidator {
    evaluator: Option<Arc<dyn ScriptEvaluator>>,
}

impl std::fmt::Debug for ScriptValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptValidator")
            .field("evaluator", &self.evaluator.is_some())
            .finish()
    }
}

impl Default for ScriptValidator {
    fn default() -> Self {
        #[cfg(feature = "script-eval")]
        let evaluator: Option<Arc<dyn ScriptEvaluator>> = Some(Arc::new(DefaultCelEvaluator));
        #[cfg(not(feature = "script-eval"))]
        let evaluator: Option<Arc<dyn ScriptEvaluator>> = None;
        Self { evaluator }
    }
}

impl ScriptValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluator(evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        Self {
            evaluator: Some(evaluator),
        }
    }

    /// Script text of a context, read from the resource when not inline.
    pub fn script_source(
        &self,
        script_context: &ScriptValidationContext,
        context: &TestContext,
    ) -> Result<String, ValidationError> {
        let text = match (&script_context.script, &script_context.script_resource) {
            (Some(script), _) => script.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                ValidationError::io(
                    format!("Failed to read script resource '{}'", path.display()),
                    e,
                )
            })?,
            (None, None) => String::new(),
        };
        context.replace_dynamic_content(&text)
    }

    /// Runs one script against a received message.
    pub fn run_script(
        &self,
        received: &Message,
        script_context: &ScriptValidationContext,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        let script = self.script_source(script_context, context)?;
        if script.trim().is_empty() {
            debug!("Skip script validation as script is empty");
            return Ok(());
        }
        let evaluator = self.evaluator.as_ref().ok_or_else(|| {
            ValidationError::configuration(
                "Script validation is not available: no script evaluator configured",
            )
        })?;

        let source = script_context.source_name();
        let mut bindings = script_bindings(received, context);

        for ScriptLine { line, statement } in parse_script(&script)? {
            match statement {
                Statement::Assert(expression) => {
                    match evaluator.evaluate(&expression, &bindings)? {
                        Value::Bool(true) => {
                            debug!(line, expression = expression.as_str(), "script assertion OK");
                        }
                        Value::Bool(false) => {
                            let mut snippet = format!("line {}: {}", line, expression);
                            if let Some((left, right)) = comparison_operands(&expression) {
                                if let (Ok(l), Ok(r)) = (
                                    evaluator.evaluate(left, &bindings),
                                    evaluator.evaluate(right, &bindings),
                                ) {
                                    snippet.push_str(&format!(
                                        "\n  left:  {}\n  right: {}",
                                        l, r
                                    ));
                                }
                            }
                            return Err(ValidationError::ScriptAssertion {
                                script: source,
                                expression,
                                snippet,
                            });
                        }
                        other => {
                            return Err(ValidationError::configuration(format!(
                                "Script assertion `{}` in {} must evaluate to a boolean, got {}",
                                expression, source, other
                            )));
                        }
                    }
                }
                Statement::Set { name, expression } => {
                    let value = value_text(&evaluator.evaluate(&expression, &bindings)?);
                    context.set_variable(&name, value.clone())?;
                    if let Some(Value::Object(variables)) = bindings.get_mut("variables") {
                        variables.insert(name, Value::String(value));
                    }
                }
            }
        }
        Ok(())
    }
}

impl MessageValidator for ScriptValidator {
    fn name(&self) -> &str {
        "defaultScriptMessageValidator"
    }

    fn supports_message_type(&self, message_type: &str, message: &Message) -> bool {
        if MessageType::Xml.matches(message_type) || MessageType::Xhtml.matches(message_type) {
            message.has_xml_payload()
        } else if MessageType::Json.matches(message_type) {
            message.has_json_payload()
        } else {
            MessageType::Plaintext.matches(message_type)
        }
    }

    fn applies_to(&self, validation_contexts: &[ValidationContext]) -> bool {
        script_contexts(validation_contexts).next().is_some()
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
        debug!("Start script message validation");
        for script_context in script_contexts(validation_contexts) {
            self.run_script(received, script_context, context)?;
        }
        info!("Script validation successful: All values OK");
        Ok(())
    }
}
