//! Named JSON schemas and schema repositories.

use crate::error::ValidationError;
use jsonschema::Validator;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// A JSON schema registered under a name.
///
/// The schema is compiled on first use and the compiled validator is shared
/// by all clones.
#[derive(Clone)]
pub struct JsonSchema {
    name: String,
    schema: Value,
    compiled: Arc<OnceLock<Result<Validator, String>>>,
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish()
    }
}

impl PartialEq for JsonSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.schema == other.schema
    }
}

impl JsonSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            compiled: Arc::new(OnceLock::new()),
        }
    }

    /// Parses schema JSON text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the text is not JSON.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, ValidationError> {
        let name = name.into();
        let schema = serde_json::from_str(text).map_err(|e| {
            ValidationError::configuration(format!("Invalid JSON schema '{}': {}", name, e))
        })?;
        Ok(Self::new(name, schema))
    }

    /// Loads a schema file; the file stem becomes the schema name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::io(
                format!("Failed to read JSON schema resource '{}'", path.display()),
                e,
            )
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(name, &text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validates an instance and returns every violation, empty when valid.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the schema itself does not compile.
    pub fn violations(&self, instance: &Value) -> Result<Vec<String>, ValidationError> {
        let validator = self
            .compiled
            .get_or_init(|| Validator::new(&self.schema).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| {
                ValidationError::configuration(format!("Invalid JSON schema '{}': {}", self.name, e))
            })?;
        Ok(validator
            .iter_errors(instance)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect())
    }
}

/// A named collection of JSON schemas.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonSchemaRepository {
    name: String,
    schemas: Vec<JsonSchema>,
}

impl JsonSchemaRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schemas: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: JsonSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Adds every `*.json` file of a directory, sorted by file name.
    pub fn with_schema_dir(mut self, dir: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            ValidationError::io(
                format!("Failed to read JSON schema directory '{}'", dir.display()),
                e,
            )
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                ValidationError::io(
                    format!("Failed to read JSON schema directory '{}'", dir.display()),
                    e,
                )
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            self.schemas.push(JsonSchema::from_file(path)?);
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schemas(&self) -> &[JsonSchema] {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Option<&JsonSchema> {
        self.schemas.iter().find(|s| s.name == name)
    }
}
