//! Per-test mutable state: variables and the shared reference resolver.

use crate::error::ValidationError;
use crate::matcher::MatcherRegistry;
use crate::schema_repository::{JsonSchema, JsonSchemaRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const VARIABLE_PREFIX: &str = "${";
const VARIABLE_SUFFIX: &str = "}";
const ESCAPE_MARKER: &str = "//";

/// Named collaborators shared read-only across test contexts.
#[derive(Debug, Default)]
pub struct ReferenceResolver {
    schema_repositories: Vec<JsonSchemaRepository>,
    schemas: HashMap<String, JsonSchema>,
    matchers: MatcherRegistry,
}

impl ReferenceResolver {
    /// Resolver with the default matcher library and no schemas.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema_repository(mut self, repository: JsonSchemaRepository) -> Self {
        self.schema_repositories.push(repository);
        self
    }

    /// Registers a standalone schema under its own name.
    pub fn with_schema(mut self, schema: JsonSchema) -> Self {
        self.schemas.insert(schema.name().to_string(), schema);
        self
    }

    pub fn with_matchers(mut self, matchers: MatcherRegistry) -> Self {
        self.matchers = matchers;
        self
    }

    pub fn schema_repositories(&self) -> &[JsonSchemaRepository] {
        &self.schema_repositories
    }

    pub fn schema_repository(&self, name: &str) -> Option<&JsonSchemaRepository> {
        self.schema_repositories.iter().find(|r| r.name() == name)
    }

    /// Looks up a schema by name: standalone schemas first, then every repository.
    pub fn schema(&self, name: &str) -> Option<&JsonSchema> {
        self.schemas.get(name).or_else(|| {
            self.schema_repositories
                .iter()
                .find_map(|repository| repository.schema(name))
        })
    }

    pub fn matchers(&self) -> &MatcherRegistry {
        &self.matchers
    }
}

/// Variables of one test execution plus the shared [`ReferenceResolver`].
///
/// A context belongs to exactly one test and is never shared between threads.
#[derive(Debug, Clone, Default)]
pub struct TestContext {
    variables: HashMap<String, String>,
    references: Arc<ReferenceResolver>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_references(references: Arc<ReferenceResolver>) -> Self {
        Self {
            variables: HashMap::new(),
            references,
        }
    }

    pub fn references(&self) -> &ReferenceResolver {
        &self.references
    }

    /// Binds a variable. A `${name}` wrapper around the name is stripped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for blank names.
    pub fn set_variable(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let name = strip_variable_wrapper(name);
        if name.trim().is_empty() {
            return Err(ValidationError::configuration(
                "Can not create variable with empty name",
            ));
        }
        let value = value.into();
        debug!(variable = name, value = %value, "setting variable");
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    /// Returns the variable value, accepting both `name` and `${name}`.
    pub fn variable(&self, name: &str) -> Result<&str, ValidationError> {
        let name = strip_variable_wrapper(name);
        self.variables
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ValidationError::UnknownVariable {
                name: name.to_string(),
            })
    }

    pub fn get_variable(&self, name: &str) -> Option<&str> {
        self.variable(name).ok()
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(strip_variable_wrapper(name))
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn clear(&mut self) {
        self.variables.clear();
    }

    /// Replaces every `${name}` occurrence with the variable value.
    ///
    /// `${//name//}` produces the literal `${name}`. An unclosed `${` is kept as is.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownVariable`] when a referenced variable is unset.
    pub fn replace_dynamic_content(&self, text: &str) -> Result<String, ValidationError> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(VARIABLE_PREFIX) {
            let after_prefix = &rest[start + VARIABLE_PREFIX.len()..];
            let Some(end) = after_prefix.find(VARIABLE_SUFFIX) else {
                break;
            };
            let name = &after_prefix[..end];
            result.push_str(&rest[..start]);

            match name
                .strip_prefix(ESCAPE_MARKER)
                .and_then(|n| n.strip_suffix(ESCAPE_MARKER))
            {
                Some(escaped) => {
                    result.push_str(VARIABLE_PREFIX);
                    result.push_str(escaped);
                    result.push_str(VARIABLE_SUFFIX);
                }
                None => result.push_str(self.variable(name)?),
            }
            rest = &after_prefix[end + VARIABLE_SUFFIX.len()..];
        }

        result.push_str(rest);
        Ok(result)
    }

    /// Resolves a value that is as a whole a `${name}` reference; other values pass through.
    pub fn resolve_dynamic_value(&self, value: &str) -> Result<String, ValidationError> {
        if is_variable_name(value) {
            Ok(self.variable(value)?.to_string())
        } else {
            Ok(value.to_string())
        }
    }
}

/// True for `${name}` expressions.
pub fn is_variable_name(value: &str) -> bool {
    value.starts_with(VARIABLE_PREFIX) && value.ends_with(VARIABLE_SUFFIX) && value.len() > 3
}

fn strip_variable_wrapper(name: &str) -> &str {
    name.strip_prefix(VARIABLE_PREFIX)
        .and_then(|n| n.strip_suffix(VARIABLE_SUFFIX))
        .unwrap_or(name)
}
