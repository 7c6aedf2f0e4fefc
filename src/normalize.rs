//! Whitespace and line ending normalization applied before text comparison.

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n?").unwrap());

/// Normalizes text according to the plaintext comparison switches.
///
/// With `ignore_whitespace` every whitespace run collapses to one space and the
/// result is trimmed; `ignore_new_line_type` is then irrelevant. Otherwise, with
/// `ignore_new_line_type`, `\r\n` and `\r` become `\n`.
pub fn normalize_text(text: &str, ignore_whitespace: bool, ignore_new_line_type: bool) -> String {
    if ignore_whitespace {
        collapse_whitespace(text)
    } else if ignore_new_line_type {
        normalize_line_endings(text)
    } else {
        text.to_string()
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN_RE.replace_all(text, " ").trim().to_string()
}

pub fn normalize_line_endings(text: &str) -> String {
    LINE_BREAK_RE.replace_all(text, "\n").into_owned()
}

/// Removes every whitespace character.
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
