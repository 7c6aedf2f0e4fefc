//! Positional `@ignore@` and `@variable@` tokens inside control values.
//!
//! Each token is replaced by the run of the received value found at the same
//! character offset, so that the control value lines up with the received one
//! before comparison. A counted `@ignore(N)@` never consumes the characters
//! the literal rest of the control still needs. Tokens resolve left to right; offsets of later tokens are
//! taken from the already rewritten control string.

use crate::context::TestContext;
use crate::error::ValidationError;
use regex::{Captures, Regex};
use std::sync::LazyLock;

pub const IGNORE_PLACEHOLDER: &str = "@ignore@";

static IGNORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@ignore\(?(\d*)\)?@").unwrap());

static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@variable\(?'?([a-zA-Z_0-9\-\.]*)'?\)?@").unwrap());

/// Terminates an unbounded `@ignore@` run.
static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]").unwrap());

/// Terminates a `@variable@` capture.
static NON_VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z_0-9\-\.]").unwrap());

enum Token<'c> {
    Ignore(Captures<'c>),
    Variable(Captures<'c>),
}

/// True when the value contains an ignore or variable token anywhere.
pub fn contains_placeholder(value: &str) -> bool {
    IGNORE_RE.is_match(value) || VARIABLE_RE.is_match(value)
}

/// Rewrites `control` so that every placeholder holds the matching part of `actual`.
///
/// Variable tokens bind their captured run into `context`. A control value that
/// is exactly `@ignore@` comes back unchanged.
///
/// # Errors
///
/// Returns a configuration error for a variable token without a name.
pub fn resolve(
    control: &str,
    actual: &str,
    context: &mut TestContext,
) -> Result<String, ValidationError> {
    if control.trim() == IGNORE_PLACEHOLDER {
        return Ok(control.to_string());
    }

    let mut control = control.to_string();
    let mut from = 0;

    loop {
        let Some(token) = next_token(&control, from) else {
            break;
        };
        let (range, replacement) = match token {
            Token::Ignore(caps) => {
                let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
                let tail = tail_at(actual, char_offset(&control, whole.start));
                let run = match caps.get(1).map(|m| m.as_str()).filter(|n| !n.is_empty()) {
                    Some(count) => {
                        let count = count.parse::<usize>().unwrap_or(usize::MAX);
                        let available = tail
                            .chars()
                            .count()
                            .saturating_sub(literal_len(&control[whole.end..]));
                        take_chars(tail, count.min(available))
                    }
                    None => take_until(tail, &NON_WORD_RE),
                };
                (whole, run.to_string())
            }
            Token::Variable(caps) => {
                let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
                let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let tail = tail_at(actual, char_offset(&control, whole.start));
                let run = take_until(tail, &NON_VARIABLE_RE).to_string();
                context.set_variable(name, run.as_str())?;
                (whole, run)
            }
        };
        from = range.start + replacement.len();
        control.replace_range(range, &replacement);
    }

    Ok(control)
}

fn next_token(control: &str, from: usize) -> Option<Token<'_>> {
    let ignore = IGNORE_RE.captures_at(control, from);
    let variable = VARIABLE_RE.captures_at(control, from);
    match (ignore, variable) {
        (Some(i), Some(v)) => {
            let ignore_start = i.get(0).map_or(usize::MAX, |m| m.start());
            let variable_start = v.get(0).map_or(usize::MAX, |m| m.start());
            if ignore_start <= variable_start {
                Some(Token::Ignore(i))
            } else {
                Some(Token::Variable(v))
            }
        }
        (Some(i), None) => Some(Token::Ignore(i)),
        (None, Some(v)) => Some(Token::Variable(v)),
        (None, None) => None,
    }
}

fn char_offset(text: &str, byte_index: usize) -> usize {
    text[..byte_index].chars().count()
}

/// Suffix of `text` starting at a character offset; empty past the end.
fn tail_at(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((index, _)) => &text[index..],
        None => "",
    }
}

/// Characters of `control` outside of placeholder tokens.
fn literal_len(control: &str) -> usize {
    let without_ignores = IGNORE_RE.replace_all(control, "");
    VARIABLE_RE.replace_all(&without_ignores, "").chars().count()
}

fn take_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

fn take_until<'a>(text: &'a str, terminator: &Regex) -> &'a str {
    match terminator.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}
