//! Compiled JSON-Schema cache

use crate::error::{LoadError, ValidatorError};
use crate::fsutil;
use crate::kv::KeyedStore;

use jsonschema::JSONSchema;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One schema violation inside a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Human readable description
    pub message: String,

    /// Location of the offending value (JSON pointer, `(root)` for the document)
    pub field: String,

    /// The offending value
    pub value: Value,
}

impl FieldError {
    /// Error not tied to a particular field
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: String::new(),
            value: Value::Null,
        }
    }
}

/// Outcome of validating a single file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// Validated file (or the directory whose scan failed)
    pub file_path: PathBuf,

    errors: Vec<FieldError>,
}

impl ValidationResult {
    /// Result for a file with the given violations
    pub fn new(file_path: impl Into<PathBuf>, errors: Vec<FieldError>) -> Self {
        Self {
            file_path: file_path.into(),
            errors,
        }
    }

    /// Synthetic result recording a scan or read failure
    pub fn failure(file_path: impl Into<PathBuf>, err: &dyn std::error::Error) -> Self {
        Self::new(file_path, vec![FieldError::message(err.to_string())])
    }

    /// True when no violations were found
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Violations found in the file
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }
}

/// Schema key → compiled schema
///
/// Populated eagerly for the known schema set and lazily for anything else;
/// read-only once validation is under way.
#[derive(Default)]
pub struct SchemaCache {
    schemas: KeyedStore<Arc<JSONSchema>>,
}

impl SchemaCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register the schema at `path` under its path, if not cached yet
    pub fn load(&self, path: &Path) -> Result<Arc<JSONSchema>, ValidatorError> {
        let key = schema_key(path);
        if let Some(schema) = self.schemas.get(&key) {
            return Ok(schema);
        }

        let document = fsutil::yaml_to_json(path).map_err(|err| ValidatorError::Schema {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let compiled = JSONSchema::compile(&document).map_err(|err| ValidatorError::Schema {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let compiled = Arc::new(compiled);
        self.schemas.set(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Number of cached schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Validate the YAML document at `document` against the schema at `schema`
    ///
    /// Read failures are returned as `Err` so callers can tolerate optional
    /// files; a document that is not valid YAML yields an invalid result.
    pub fn validate(&self, schema: &Path, document: &Path) -> Result<ValidationResult, LoadError> {
        let compiled = match self.load(schema) {
            Ok(compiled) => compiled,
            Err(err) => return Ok(ValidationResult::failure(document, &err)),
        };

        let instance = match fsutil::yaml_to_json(document) {
            Ok(instance) => instance,
            Err(err @ LoadError::Malformed { .. }) => {
                return Ok(ValidationResult::failure(document, &err));
            }
            Err(err) => return Err(err),
        };

        Ok(ValidationResult::new(document, check(&compiled, &instance)))
    }
}

fn check(schema: &JSONSchema, instance: &Value) -> Vec<FieldError> {
    match schema.validate(instance) {
        Ok(()) => Vec::new(),
        Err(violations) => violations
            .map(|violation| {
                let pointer = violation.instance_path.to_string();
                FieldError {
                    message: violation.to_string(),
                    field: if pointer.is_empty() {
                        "(root)".to_string()
                    } else {
                        pointer
                    },
                    value: violation.instance.into_owned(),
                }
            })
            .collect(),
    }
}

fn schema_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
