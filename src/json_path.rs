//! JSONPath evaluation with the conveniences test authors expect.
//!
//! Queries run on `serde_json_path` (RFC 9535). Before parsing, dotted member
//! names that RFC 9535 rejects (`$.root.sub-element`) are rewritten into
//! bracket selectors, and one trailing function suffix is split off:
//!
//! | Suffix        | Result                                        |
//! |---------------|-----------------------------------------------|
//! | `.size()`     | array length or object entry count, else 1    |
//! | `.keySet()`   | object keys as an array                       |
//! | `.values()`   | object values as an array                     |
//! | `.exists()`   | `true`/`false`, never "not found"             |
//! | `.toString()` | compact JSON text                             |
//!
//! A single match is unwrapped; several matches form an array.

use crate::error::ValidationError;
use serde_json::Value;
use serde_json_path::JsonPath;

/// Function applied to the query result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JsonPathFunction {
    Size,
    KeySet,
    Values,
    Exists,
    ToString,
}

impl JsonPathFunction {
    const SUFFIXES: [(&'static str, JsonPathFunction); 6] = [
        (".size()", JsonPathFunction::Size),
        (".length()", JsonPathFunction::Size),
        (".keySet()", JsonPathFunction::KeySet),
        (".values()", JsonPathFunction::Values),
        (".exists()", JsonPathFunction::Exists),
        (".toString()", JsonPathFunction::ToString),
    ];

    /// Splits a trailing function suffix off an expression.
    pub fn split(expression: &str) -> (&str, Option<JsonPathFunction>) {
        let trimmed = expression.trim();
        Self::SUFFIXES
            .iter()
            .find_map(|(suffix, function)| {
                trimmed
                    .strip_suffix(suffix)
                    .map(|path| (path, Some(*function)))
            })
            .unwrap_or((trimmed, None))
    }

    fn apply(self, value: Option<Value>, expression: &str) -> Result<Value, ValidationError> {
        if self == JsonPathFunction::Exists {
            return Ok(Value::Bool(value.is_some()));
        }
        let value = value.ok_or_else(|| not_found(expression))?;
        Ok(match self {
            JsonPathFunction::Size => Value::from(match &value {
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                _ => 1,
            }),
            JsonPathFunction::KeySet => match value {
                Value::Object(map) => Value::Array(map.keys().cloned().map(Value::String).collect()),
                _ => Value::Array(Vec::new()),
            },
            JsonPathFunction::Values => match value {
                Value::Object(map) => Value::Array(map.values().cloned().collect()),
                Value::Array(items) => Value::Array(items),
                other => Value::Array(vec![other]),
            },
            JsonPathFunction::ToString => Value::String(value.to_string()),
            JsonPathFunction::Exists => Value::Bool(true),
        })
    }
}

fn not_found(expression: &str) -> ValidationError {
    ValidationError::ExpressionNotFound {
        expression: expression.to_string(),
    }
}

fn is_plain_member(name: &str) -> bool {
    name == "*" || name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Rewrites dotted member names RFC 9535 cannot parse into bracket form.
///
/// `$..element.sub-element` becomes `$..element['sub-element']`. Bracket
/// contents and quoted strings are left alone.
pub fn normalize_path(expression: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let mut out = String::with_capacity(expression.len());
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '[' => {
                depth += 1;
                out.push(c);
                i += 1;
            }
            ']' => {
                depth = depth.saturating_sub(1);
                out.push(c);
                i += 1;
            }
            '.' if depth == 0 => {
                let descendant = chars.get(i + 1) == Some(&'.');
                let start = if descendant { i + 2 } else { i + 1 };
                let mut end = start;
                while end < chars.len() && !matches!(chars[end], '.' | '[') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                if name.is_empty() || is_plain_member(&name) {
                    out.push_str(if descendant { ".." } else { "." });
                    out.push_str(&name);
                } else {
                    if descendant {
                        out.push_str("..");
                    }
                    out.push_str(&format!("['{}']", name.replace('\'', "\\'")));
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Evaluates an expression, applying any trailing function.
///
/// # Errors
///
/// - [`ValidationError::InvalidExpression`] when the path does not parse.
/// - [`ValidationError::ExpressionNotFound`] when nothing matches (except `.exists()`).
pub fn evaluate(json: &Value, expression: &str) -> Result<Value, ValidationError> {
    let (path, function) = JsonPathFunction::split(expression);
    let normalized = normalize_path(path);
    let compiled = JsonPath::parse(&normalized)
        .map_err(|e| ValidationError::invalid_expression(expression, e.to_string()))?;

    let nodes = compiled.query(json).all();
    let result = match nodes.len() {
        0 => None,
        1 => Some(nodes[0].clone()),
        _ => Some(Value::Array(nodes.into_iter().cloned().collect())),
    };

    match function {
        Some(function) => function.apply(result, expression),
        None => result.ok_or_else(|| not_found(expression)),
    }
}

/// Evaluates an expression and renders the result with [`stringify`].
pub fn evaluate_to_string(json: &Value, expression: &str) -> Result<String, ValidationError> {
    evaluate(json, expression).map(|value| stringify(&value))
}

/// Text form used for comparison and variable extraction.
///
/// Strings are raw, `null` is empty, arrays render as `[a, b]` and objects
/// as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        other => other.to_string(),
    }
}
