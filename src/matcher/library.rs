//! The default matcher library.

use super::{MatcherLibrary, ValidationMatcher, matcher_failure};
use crate::context::TestContext;
use crate::error::ValidationError;
use crate::normalize::strip_whitespace;
use chrono::format::{self, Parsed, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Library registered under the empty prefix.
pub fn default_library() -> MatcherLibrary {
    MatcherLibrary::new("citrusValidationMatcherLibrary", "")
        .with_matcher("equalsIgnoreCase", Predicate::new("equalsIgnoreCase", equals_ignore_case))
        .with_matcher("contains", Predicate::new("contains", contains))
        .with_matcher(
            "containsIgnoreCase",
            Predicate::new("containsIgnoreCase", contains_ignore_case),
        )
        .with_matcher("startsWith", Predicate::new("startsWith", starts_with))
        .with_matcher("endsWith", Predicate::new("endsWith", ends_with))
        .with_matcher("matches", Predicate::new("matches", matches_regex))
        .with_matcher("isNumber", Predicate::new("isNumber", is_number))
        .with_matcher("greaterThan", Predicate::new("greaterThan", greater_than))
        .with_matcher("lowerThan", Predicate::new("lowerThan", lower_than))
        .with_matcher("isEmpty", Predicate::new("isEmpty", is_empty))
        .with_matcher("empty", Predicate::new("empty", is_empty))
        .with_matcher("notEmpty", Predicate::new("notEmpty", not_empty))
        .with_matcher("isNull", Predicate::new("isNull", is_null))
        .with_matcher("notNull", Predicate::new("notNull", not_null))
        .with_matcher("stringLength", Predicate::new("stringLength", string_length))
        .with_matcher("trim", Predicate::new("trim", trim))
        .with_matcher(
            "trimAllWhitespaces",
            Predicate::new("trimAllWhitespaces", trim_all_whitespaces),
        )
        .with_matcher(
            "matchesDatePattern",
            Predicate::new("matchesDatePattern", matches_date_pattern),
        )
        .with_matcher("ignore", Ignore)
        .with_matcher("variable", Variable)
}

type Check = fn(actual: &str, args: &[String]) -> Result<bool, ValidationError>;

/// A side-effect free matcher backed by a check function.
struct Predicate {
    name: &'static str,
    check: Check,
}

impl Predicate {
    fn new(name: &'static str, check: Check) -> Self {
        Self { name, check }
    }
}

impl ValidationMatcher for Predicate {
    fn validate(
        &self,
        field: &str,
        actual: &str,
        args: &[String],
        _context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        if (self.check)(actual, args)? {
            Ok(())
        } else {
            Err(matcher_failure(self.name, field, actual, args.join(", ")))
        }
    }
}

/// Always passes.
struct Ignore;

impl ValidationMatcher for Ignore {
    fn validate(
        &self,
        _field: &str,
        _actual: &str,
        _args: &[String],
        _context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Binds the whole received value; the field name is used when no name is given.
struct Variable;

impl ValidationMatcher for Variable {
    fn validate(
        &self,
        field: &str,
        actual: &str,
        args: &[String],
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        let name = args
            .first()
            .map(String::as_str)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(field);
        context.set_variable(name, actual)
    }
}

fn argument<'a>(matcher: &str, args: &'a [String]) -> Result<&'a str, ValidationError> {
    args.first().map(String::as_str).ok_or_else(|| {
        ValidationError::configuration(format!(
            "Validation matcher '{}' requires a control value",
            matcher
        ))
    })
}

fn numeric_argument(matcher: &str, args: &[String]) -> Result<f64, ValidationError> {
    let raw = argument(matcher, args)?;
    raw.trim().parse().map_err(|_| {
        ValidationError::configuration(format!(
            "Validation matcher '{}' expects a numeric control value, got '{}'",
            matcher, raw
        ))
    })
}

fn equals_ignore_case(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    let expected = argument("equalsIgnoreCase", args)?;
    Ok(actual.to_lowercase() == expected.to_lowercase())
}

fn contains(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    Ok(actual.contains(argument("contains", args)?))
}

fn contains_ignore_case(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    let expected = argument("containsIgnoreCase", args)?;
    Ok(actual.to_lowercase().contains(&expected.to_lowercase()))
}

fn starts_with(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    Ok(actual.starts_with(argument("startsWith", args)?))
}

fn ends_with(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    Ok(actual.ends_with(argument("endsWith", args)?))
}

fn matches_regex(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    let pattern = argument("matches", args)?;
    let re = Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| ValidationError::invalid_expression(pattern, e.to_string()))?;
    Ok(re.is_match(actual))
}

fn is_number(actual: &str, _args: &[String]) -> Result<bool, ValidationError> {
    Ok(actual.trim().parse::<f64>().is_ok_and(f64::is_finite))
}

fn greater_than(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    let threshold = numeric_argument("greaterThan", args)?;
    Ok(actual.trim().parse::<f64>().is_ok_and(|v| v > threshold))
}

fn lower_than(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    let threshold = numeric_argument("lowerThan", args)?;
    Ok(actual.trim().parse::<f64>().is_ok_and(|v| v < threshold))
}

fn is_empty(actual: &str, _args: &[String]) -> Result<bool, ValidationError> {
    Ok(actual.is_empty())
}

fn not_empty(actual: &str, _args: &[String]) -> Result<bool, ValidationError> {
    Ok(!actual.is_empty())
}

/// JSON nulls reach matchers as `null` from tree comparison and as an empty
/// string from JSONPath results.
fn is_null(actual: &str, _args: &[String]) -> Result<bool, ValidationError> {
    Ok(actual.is_empty() || actual == "null")
}

fn not_null(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    Ok(!is_null(actual, args)?)
}

fn string_length(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    let raw = argument("stringLength", args)?;
    let expected: usize = raw.trim().parse().map_err(|_| {
        ValidationError::configuration(format!(
            "Validation matcher 'stringLength' expects an integer control value, got '{}'",
            raw
        ))
    })?;
    Ok(actual.chars().count() == expected)
}

fn trim(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    Ok(actual.trim() == argument("trim", args)?.trim())
}

fn trim_all_whitespaces(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    let expected = argument("trimAllWhitespaces", args)?;
    Ok(strip_whitespace(actual) == strip_whitespace(expected))
}

fn matches_date_pattern(actual: &str, args: &[String]) -> Result<bool, ValidationError> {
    let pattern = argument("matchesDatePattern", args)?;
    let date = DatePattern::compile(pattern)?;
    Ok(date.matches(actual))
}

/// A `SimpleDateFormat` style pattern such as `yyyy-MM-dd'T'HH:mm:ss`,
/// translated to a chrono format string.
struct DatePattern {
    format: String,
    /// Year, month and day are all present, so the calendar date must exist.
    complete_date: bool,
}

impl DatePattern {
    fn compile(pattern: &str) -> Result<Self, ValidationError> {
        let mut format = String::new();
        let (mut year, mut month, mut day) = (false, false, false);
        let chars: Vec<char> = pattern.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '\'' {
                let mut j = i + 1;
                if j < chars.len() && chars[j] == '\'' {
                    format.push('\'');
                    i += 2;
                    continue;
                }
                while j < chars.len() && chars[j] != '\'' {
                    push_literal(&mut format, chars[j]);
                    j += 1;
                }
                i = j + 1;
                continue;
            }

            if !c.is_ascii_alphabetic() {
                push_literal(&mut format, c);
                i += 1;
                continue;
            }

            let mut run = 1;
            while i + run < chars.len() && chars[i + run] == c {
                run += 1;
            }
            let specifier = match (c, run) {
                ('y' | 'Y' | 'u', 2) => "%y",
                ('y' | 'Y' | 'u', _) => "%Y",
                ('M' | 'L', 1 | 2) => "%m",
                ('M' | 'L', 3) => "%b",
                ('M' | 'L', _) => "%B",
                ('d', _) => "%d",
                ('D', _) => "%j",
                ('H', _) => "%H",
                ('h', _) => "%I",
                ('m', _) => "%M",
                ('s', _) => "%S",
                ('S', 3) => "%3f",
                ('S', 6) => "%6f",
                ('S', 9) => "%9f",
                ('E', 1..=3) => "%a",
                ('E', _) => "%A",
                ('a', _) => "%p",
                ('Z', _) => "%z",
                ('X', _) => "%:z",
                (other, _) => {
                    return Err(ValidationError::configuration(format!(
                        "Unsupported date pattern letter '{}' in '{}'",
                        other, pattern
                    )));
                }
            };
            match c {
                'y' | 'Y' | 'u' => year = true,
                'M' | 'L' => month = true,
                'd' => day = true,
                _ => {}
            }
            format.push_str(specifier);
            i += run;
        }

        Ok(Self {
            format,
            complete_date: year && month && day,
        })
    }

    fn matches(&self, value: &str) -> bool {
        if NaiveDateTime::parse_from_str(value, &self.format).is_ok()
            || NaiveDate::parse_from_str(value, &self.format).is_ok()
        {
            return true;
        }
        if self.complete_date {
            return false;
        }
        if NaiveTime::parse_from_str(value, &self.format).is_ok() {
            return true;
        }
        let mut parsed = Parsed::new();
        format::parse(&mut parsed, value, StrftimeItems::new(&self.format)).is_ok()
    }
}

fn push_literal(format: &mut String, c: char) {
    if c == '%' {
        format.push_str("%%");
    } else {
        format.push(c);
    }
}
