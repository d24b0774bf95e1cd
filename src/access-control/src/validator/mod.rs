//! Pre-deployment schema gate for policy trees
//!
//! Walks the same layout as the [`PolicyLoader`](crate::store::PolicyLoader)
//! and checks every declarative file against its JSON Schema. Nothing is
//! written to a policy store; the output is one [`ValidationResult`] per file.
//! Scan and read failures are recorded as synthetic results so a single bad
//! directory never hides problems elsewhere.

mod schema;

pub use schema::{FieldError, SchemaCache, ValidationResult};

use crate::error::{LoadError, ValidatorError};
use crate::fsutil;
use crate::store::loader::{
    is_yaml, CLIENTS_DIR, CLIENT_FILE, PERMISSION_GROUPS_FILE, ROLE_MAPPING_DIR, SCOPES_DIR,
    SCOPE_FILE,
};
use crate::store::DEFAULT_MAX_CONCURRENCY;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Default schema directory, relative to the policy root
pub const DEFAULT_SCHEMA_DIR: &str = "config/schema";

const CLIENT_SCHEMA: &str = "client.yaml";
const SCOPE_SCHEMA: &str = "scope.yaml";
const ROLE_MAPPING_SCHEMA: &str = "role-mapping.yaml";
const PERMISSION_GROUPS_SCHEMA: &str = "permission-groups.yaml";

/// Validates a policy tree against its schema set
#[derive(Clone)]
pub struct SchemaValidator {
    root: PathBuf,
    schema_dir: PathBuf,
    cache: Arc<SchemaCache>,
    max_concurrency: usize,
}

impl SchemaValidator {
    /// Create a validator; `schema_dir` is resolved against `root`
    pub fn new(root: impl Into<PathBuf>, schema_dir: impl AsRef<Path>) -> Self {
        let root = root.into();
        let schema_dir = root.join(schema_dir);
        Self {
            root,
            schema_dir,
            cache: Arc::new(SchemaCache::new()),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Override the number of scope directories validated concurrently
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Compile the fixed schema set into the cache
    pub fn load_schemas(&self) -> Result<(), ValidatorError> {
        for name in [
            CLIENT_SCHEMA,
            SCOPE_SCHEMA,
            ROLE_MAPPING_SCHEMA,
            PERMISSION_GROUPS_SCHEMA,
        ] {
            self.cache.load(&self.schema_dir.join(name))?;
        }
        debug!(schemas = self.cache.len(), "Loaded validation schemas");
        Ok(())
    }

    /// Validate every client and scope file
    ///
    /// # Errors
    ///
    /// Only setup failures: an unreadable root directory or a schema that
    /// cannot be loaded. Everything else is reported inside the results.
    pub async fn validate_all(&self) -> Result<Vec<ValidationResult>, ValidatorError> {
        std::fs::read_dir(&self.root).map_err(|source| {
            ValidatorError::Load(LoadError::Io {
                path: self.root.clone(),
                source,
            })
        })?;

        let this = self.clone();
        let mut results = tokio::task::spawn_blocking(move || {
            this.load_schemas()?;
            Ok::<_, ValidatorError>(this.validate_clients())
        })
        .await
        .map_err(|e| ValidatorError::Load(LoadError::Join(e.to_string())))??;

        results.extend(self.validate_scopes().await?);

        let invalid = results.iter().filter(|r| !r.valid()).count();
        info!(files = results.len(), invalid, "Schema validation finished");

        Ok(results)
    }

    fn validate_clients(&self) -> Vec<ValidationResult> {
        let clients_dir = self.root.join(CLIENTS_DIR);
        let dirs = match fsutil::read_dir_names(&clients_dir) {
            Ok(dirs) => dirs,
            Err(err) => return vec![ValidationResult::failure(clients_dir, &err)],
        };

        let schema = self.schema_dir.join(CLIENT_SCHEMA);
        dirs.iter()
            .map(|dir| {
                let document = dir.join(CLIENT_FILE);
                self.cache
                    .validate(&schema, &document)
                    .unwrap_or_else(|err| ValidationResult::failure(document, &err))
            })
            .collect()
    }

    async fn validate_scopes(&self) -> Result<Vec<ValidationResult>, ValidatorError> {
        let scopes_dir = self.root.join(SCOPES_DIR);
        let dirs = match fsutil::read_dir_names(&scopes_dir) {
            Ok(dirs) => dirs,
            Err(err) => return Ok(vec![ValidationResult::failure(scopes_dir, &err)]),
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for dir in dirs {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| ValidatorError::Load(LoadError::Join(e.to_string())))?;
            let this = self.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                this.validate_scope_dir(&dir)
                    .unwrap_or_else(|err| vec![ValidationResult::failure(dir, &err)])
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(dir_results) => results.extend(dir_results),
                Err(err) => {
                    let err = LoadError::Join(err.to_string());
                    results.push(ValidationResult::failure(scopes_dir.clone(), &err));
                }
            }
        }

        Ok(results)
    }

    fn validate_scope_dir(&self, dir: &Path) -> Result<Vec<ValidationResult>, LoadError> {
        let mut results = Vec::new();

        // scope.yaml is mandatory; a missing one is reported against the file
        let scope_file = dir.join(SCOPE_FILE);
        let scope = self
            .cache
            .validate(&self.schema_dir.join(SCOPE_SCHEMA), &scope_file)
            .or_else(|err| match err {
                LoadError::NotFound(_) => Ok(ValidationResult::failure(&scope_file, &err)),
                other => Err(other),
            })?;
        results.push(scope);

        match self.cache.validate(
            &self.schema_dir.join(PERMISSION_GROUPS_SCHEMA),
            &dir.join(PERMISSION_GROUPS_FILE),
        ) {
            Ok(result) => results.push(result),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let mapping_dir = dir.join(ROLE_MAPPING_DIR);
        let files = match fsutil::read_file_names(&mapping_dir) {
            Ok(files) => files,
            Err(err) if err.is_not_found() => return Ok(results),
            Err(err) => return Err(err),
        };

        let schema = self.schema_dir.join(ROLE_MAPPING_SCHEMA);
        for file in files.into_iter().filter(|f| is_yaml(f)) {
            let result = self
                .cache
                .validate(&schema, &file)
                .unwrap_or_else(|err| ValidationResult::failure(&file, &err));
            results.push(result);
        }

        Ok(results)
    }
}

/// True when every result is valid
pub fn all_valid(results: &[ValidationResult]) -> bool {
    results.iter().all(ValidationResult::valid)
}
