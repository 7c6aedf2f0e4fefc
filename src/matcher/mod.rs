//! Validation matchers invoked through `@name(args)@` control values.
//!
//! A control value is a matcher expression when it consists only of one or
//! more `@name@` / `@name(args)@` tokens separated by whitespace. Every token
//! must pass. Names may carry a library prefix (`@lib:name(...)@`); the default
//! library has the empty prefix.

pub mod library;

use crate::context::TestContext;
use crate::error::ValidationError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A named predicate over a received value.
pub trait ValidationMatcher: Send + Sync {
    /// Checks `actual` against the matcher arguments.
    ///
    /// `field` names the validated element for failure messages.
    fn validate(
        &self,
        field: &str,
        actual: &str,
        args: &[String],
        context: &mut TestContext,
    ) -> Result<(), ValidationError>;
}

/// Standard failure for a matcher predicate that does not hold.
pub fn matcher_failure(
    matcher: &str,
    field: &str,
    actual: &str,
    expected: impl fmt::Display,
) -> ValidationError {
    ValidationError::mismatch(format!(
        "Validation matcher '{}' failed for field '{}'. Received value is '{}', control value is '{}'",
        matcher, field, actual, expected
    ))
}

/// Matchers registered under a common prefix.
#[derive(Clone)]
pub struct MatcherLibrary {
    name: String,
    prefix: String,
    matchers: BTreeMap<String, Arc<dyn ValidationMatcher>>,
}

impl fmt::Debug for MatcherLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherLibrary")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("matchers", &self.matchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MatcherLibrary {
    /// An empty library. `prefix` is written without the trailing colon.
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            matchers: BTreeMap::new(),
        }
    }

    pub fn with_matcher(
        mut self,
        name: impl Into<String>,
        matcher: impl ValidationMatcher + 'static,
    ) -> Self {
        self.matchers.insert(name.into(), Arc::new(matcher));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matcher(&self, name: &str) -> Option<Arc<dyn ValidationMatcher>> {
        self.matchers.get(name).cloned()
    }

    pub fn matcher_names(&self) -> impl Iterator<Item = &str> {
        self.matchers.keys().map(String::as_str)
    }
}

/// All known matcher libraries, keyed by prefix.
#[derive(Clone, Debug)]
pub struct MatcherRegistry {
    libraries: Vec<MatcherLibrary>,
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self {
            libraries: vec![library::default_library()],
        }
    }
}

impl MatcherRegistry {
    /// Registers a library, replacing any library with the same prefix.
    pub fn with_library(mut self, library: MatcherLibrary) -> Self {
        self.libraries.retain(|l| l.prefix != library.prefix);
        self.libraries.push(library);
        self
    }

    pub fn library_for_prefix(&self, prefix: &str) -> Option<&MatcherLibrary> {
        self.libraries.iter().find(|l| l.prefix == prefix)
    }

    fn lookup(&self, prefix: &str, name: &str) -> Result<Arc<dyn ValidationMatcher>, ValidationError> {
        self.library_for_prefix(prefix)
            .and_then(|library| library.matcher(name))
            .ok_or_else(|| ValidationError::UnknownMatcher {
                name: if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{}:{}", prefix, name)
                },
            })
    }
}

/// One parsed `@prefix:name(args)@` token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatcherExpression<'a> {
    pub prefix: &'a str,
    pub name: &'a str,
    pub args: &'a str,
}

/// True when the whole value is a sequence of matcher tokens.
pub fn is_matcher_expression(value: &str) -> bool {
    parse_expressions(value).is_some()
}

/// Splits a control value into matcher tokens, `None` when it is not a matcher expression.
pub fn parse_expressions(value: &str) -> Option<Vec<MatcherExpression<'_>>> {
    let mut rest = value.trim();
    if rest.is_empty() {
        return None;
    }

    let mut expressions = Vec::new();
    while !rest.is_empty() {
        let (expression, consumed) = parse_token(rest)?;
        expressions.push(expression);
        let after = &rest[consumed..];
        let trimmed = after.trim_start();
        if !trimmed.is_empty() && trimmed.len() == after.len() {
            return None;
        }
        rest = trimmed;
    }
    Some(expressions)
}

fn parse_token(text: &str) -> Option<(MatcherExpression<'_>, usize)> {
    let body = text.strip_prefix('@')?;
    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
        .unwrap_or(body.len());
    if name_len == 0 {
        return None;
    }
    let qualified = &body[..name_len];
    let (prefix, name) = match qualified.split_once(':') {
        Some((prefix, name)) if !name.is_empty() => (prefix, name),
        Some(_) => return None,
        None => ("", qualified),
    };

    let after_name = &body[name_len..];
    if after_name.starts_with('@') {
        let consumed = 1 + name_len + 1;
        return Some((MatcherExpression { prefix, name, args: "" }, consumed));
    }

    let args_body = after_name.strip_prefix('(')?;
    let close = find_closing_paren(args_body)?;
    if !args_body[close + 1..].starts_with('@') {
        return None;
    }
    let consumed = 1 + name_len + 1 + close + 2;
    Some((
        MatcherExpression {
            prefix,
            name,
            args: &args_body[..close],
        },
        consumed,
    ))
}

/// Index of the `)` closing an argument list, skipping quoted text.
fn find_closing_paren(args: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in args.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Splits a matcher argument list.
///
/// Without single quotes the whole text is one argument. Otherwise arguments
/// are separated by commas outside quotes and lose their surrounding quotes.
pub fn parse_arguments(args: &str) -> Vec<String> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if !trimmed.contains('\'') {
        return vec![trimmed.to_string()];
    }

    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in trimmed.chars() {
        match c {
            '\'' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => {
                values.push(unquote(&current));
                current.clear();
            }
            _ => current.push(c),
        }
    }
    values.push(unquote(&current));
    values
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value)
        .to_string()
}

/// Runs every matcher token of `control` against `actual`.
///
/// # Errors
///
/// Returns [`ValidationError::UnknownMatcher`] for unregistered names, a
/// configuration error when `control` is not a matcher expression, and the
/// first failing matcher's mismatch otherwise.
pub fn resolve(
    field: &str,
    actual: &str,
    control: &str,
    context: &mut TestContext,
) -> Result<(), ValidationError> {
    let expressions = parse_expressions(control).ok_or_else(|| {
        ValidationError::configuration(format!("'{}' is not a validation matcher expression", control))
    })?;

    for expression in expressions {
        let matcher = context
            .references()
            .matchers()
            .lookup(expression.prefix, expression.name)?;
        let args = parse_arguments(expression.args)
            .iter()
            .map(|arg| context.replace_dynamic_content(arg))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(field, matcher = expression.name, ?args, "validation matcher");
        matcher.validate(field, actual, &args, context)?;
    }
    Ok(())
}
