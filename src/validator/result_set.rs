//! Tabular (SQL) result set validation.
//!
//! Expected values are compared column by column and row by row. The literal
//! `NULL` expects an SQL null; every other expected value goes through the
//! shared value pipeline, so ignore, variable and matcher tokens work per cell.

use super::validate_value_with;
use crate::context::TestContext;
use crate::error::{ValidationError, value_mismatch};
use crate::placeholder::IGNORE_PLACEHOLDER;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Expected SQL null.
pub const NULL_VALUE: &str = "NULL";

/// Received rows, stored per column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultSet {
    columns: BTreeMap<String, Vec<Option<String>>>,
    rows: usize,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a result set from rows of `column -> value`.
    pub fn from_rows<I, R, K>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let mut result = Self::default();
        for row in rows {
            for (column, value) in row {
                let values = result.columns.entry(column.into()).or_default();
                values.resize(result.rows, None);
                values.push(value);
            }
            result.rows += 1;
        }
        for values in result.columns.values_mut() {
            values.resize(result.rows, None);
        }
        result
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        self.rows = self.rows.max(values.len());
        self.columns.insert(name.into(), values);
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Column values; names match exactly first, then case-insensitively.
    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.columns
            .get(name)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }
}

/// Expected column values plus `column -> variable` extractions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlResultSet {
    pub columns: Vec<(String, Vec<String>)>,
    pub extract: Vec<(String, String)>,
}

impl ControlResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column<V: Into<String>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.columns
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn extract(mut self, column: impl Into<String>, variable: impl Into<String>) -> Self {
        self.extract.push((column.into(), variable.into()));
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResultSetValidator;

impl ResultSetValidator {
    pub fn validate(
        &self,
        received: &ResultSet,
        control: &ControlResultSet,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        debug!("Start result set validation");

        for (column, expected) in &control.columns {
            let actual = received.column(column).ok_or_else(|| {
                ValidationError::mismatch(format!("Missing column '{}' in result set", column))
            })?;
            if expected.len() != actual.len() {
                return Err(value_mismatch(
                    &format!("Number of rows not equal for column '{}'", column),
                    expected.len(),
                    actual.len(),
                ));
            }
            for (row, (expected, actual)) in expected.iter().zip(actual).enumerate() {
                let field = format!("{}[{}]", column, row);
                validate_cell(&field, actual.as_deref(), expected, context)?;
            }
            debug!(column = column.as_str(), "validating database column: values as expected");
        }

        for (column, variable) in &control.extract {
            let values = received.column(column).ok_or_else(|| {
                ValidationError::configuration(format!(
                    "Failed to extract variable '{}': no column '{}' in result set",
                    variable, column
                ))
            })?;
            let joined = values
                .iter()
                .map(|value| value.as_deref().unwrap_or(NULL_VALUE))
                .collect::<Vec<_>>()
                .join(",");
            context.set_variable(variable, joined)?;
        }

        info!("Result set validation successful: All values OK");
        Ok(())
    }
}

fn validate_cell(
    field: &str,
    actual: Option<&str>,
    expected: &str,
    context: &mut TestContext,
) -> Result<(), ValidationError> {
    let base = format!("Values not equal for column '{}'", field);
    let expected = context.replace_dynamic_content(expected)?;
    match actual {
        None if expected.trim() == NULL_VALUE || expected.trim() == IGNORE_PLACEHOLDER => Ok(()),
        None => Err(value_mismatch(&base, expected, NULL_VALUE)),
        Some(actual) if expected.trim() == NULL_VALUE => Err(value_mismatch(&base, NULL_VALUE, actual)),
        Some(actual) => validate_value_with(&base, field, actual, &expected, context),
    }
}
