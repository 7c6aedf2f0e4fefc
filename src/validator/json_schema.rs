//! JSON schema validation against registered schemas.
//!
//! Candidate schemas, first rule that applies:
//! 1. the schema named by the context,
//! 2. every schema of the repository named by the context,
//! 3. every schema of every registered repository.
//!
//! All violations of all candidates are collected before failing.

use crate::context::ReferenceResolver;
use crate::error::ValidationError;
use crate::schema_repository::JsonSchema;
use crate::validation_context::JsonValidationContext;
use serde_json::Value;
use tracing::{debug, info};

/// Stateless schema checker used by the JSON text validator.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSchemaValidation;

impl JsonSchemaValidation {
    /// Schemas the context selects.
    ///
    /// # Errors
    ///
    /// Unknown schema or repository names are configuration errors.
    pub fn candidate_schemas<'r>(
        &self,
        references: &'r ReferenceResolver,
        validation_context: &JsonValidationContext,
    ) -> Result<Vec<&'r JsonSchema>, ValidationError> {
        if let Some(name) = &validation_context.schema {
            let schema = references
                .schema(name)
                .ok_or_else(|| ValidationError::UnknownSchema { name: name.clone() })?;
            return Ok(vec![schema]);
        }
        if let Some(name) = &validation_context.schema_repository {
            let repository = references.schema_repository(name).ok_or_else(|| {
                ValidationError::UnknownSchemaRepository { name: name.clone() }
            })?;
            return Ok(repository.schemas().iter().collect());
        }
        Ok(references
            .schema_repositories()
            .iter()
            .flat_map(|repository| repository.schemas())
            .collect())
    }

    /// Every violation of `json` against the selected schemas, prefixed with the schema name.
    pub fn report(
        &self,
        json: &Value,
        references: &ReferenceResolver,
        validation_context: &JsonValidationContext,
    ) -> Result<Vec<String>, ValidationError> {
        let schemas = self.candidate_schemas(references, validation_context)?;
        if schemas.is_empty() {
            debug!("No JSON schema found to validate against");
            return Ok(Vec::new());
        }
        if json.as_object().is_some_and(|map| map.is_empty()) {
            debug!("Skip JSON schema validation for empty JSON object");
            return Ok(Vec::new());
        }

        let mut violations = Vec::new();
        for schema in schemas {
            debug!(schema = schema.name(), "validating against JSON schema");
            violations.extend(
                schema
                    .violations(json)?
                    .into_iter()
                    .map(|violation| format!("[{}] {}", schema.name(), violation)),
            );
        }
        Ok(violations)
    }

    /// Fails with one aggregated report when any schema reports a violation.
    pub fn validate(
        &self,
        json: &Value,
        references: &ReferenceResolver,
        validation_context: &JsonValidationContext,
    ) -> Result<(), ValidationError> {
        let violations = self.report(json, references, validation_context)?;
        if !violations.is_empty() {
            return Err(ValidationError::SchemaViolations { violations });
        }
        info!("JSON schema validation successful: All values OK");
        Ok(())
    }
}
