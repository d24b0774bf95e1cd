//! Policy tree ingestion
//!
//! Walks the fixed directory layout and populates a [`PolicyStore`]:
//!
//! ```text
//! <root>/clients/<client-dir>/client.yaml
//! <root>/config/roles.yaml
//! <root>/scopes/<scope-dir>/scope.yaml
//! <root>/scopes/<scope-dir>/permission-groups.yaml      (optional)
//! <root>/scopes/<scope-dir>/role-mapping/<file>.yaml    (0..n)
//! ```
//!
//! Scope directories are processed on blocking worker tasks, at most
//! `max_concurrency` at a time. Failures from every task are joined into one
//! [`LoadError::Aggregate`]; the store is only handed out when no task failed.

use super::types::{
    ClientDefinition, PermissionGroupDefinition, RoleDefinition, RoleMappingDefinition, Scope,
    ScopeDefinition,
};
use super::PolicyStore;
use crate::error::{LoadError, Result};
use crate::fsutil;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default number of scope directories processed concurrently
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

pub(crate) const CLIENTS_DIR: &str = "clients";
pub(crate) const CLIENT_FILE: &str = "client.yaml";
pub(crate) const CONFIG_DIR: &str = "config";
pub(crate) const ROLES_FILE: &str = "roles.yaml";
pub(crate) const SCOPES_DIR: &str = "scopes";
pub(crate) const SCOPE_FILE: &str = "scope.yaml";
pub(crate) const PERMISSION_GROUPS_FILE: &str = "permission-groups.yaml";
pub(crate) const ROLE_MAPPING_DIR: &str = "role-mapping";

/// Loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Upper bound on concurrently processed scope directories
    pub max_concurrency: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Builds a [`PolicyStore`] from a policy directory tree
#[derive(Debug, Clone)]
pub struct PolicyLoader {
    root: PathBuf,
    config: LoaderConfig,
}

impl PolicyLoader {
    /// Create a loader with the default configuration
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, LoaderConfig::default())
    }

    /// Create a loader with a custom configuration
    pub fn with_config(root: impl Into<PathBuf>, config: LoaderConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Ingest the whole tree
    ///
    /// # Errors
    ///
    /// Any structural defect aborts the load: malformed YAML, a missing
    /// mandatory file, a client id, role id or scope key declared twice, or
    /// two role mappings for the same (scope, role) pair.
    /// An empty `clients/` directory and a missing or empty `role-mapping/`
    /// directory are tolerated.
    pub async fn load(&self) -> Result<PolicyStore> {
        let store = Arc::new(PolicyStore::new());

        let root = self.root.clone();
        let global = Arc::clone(&store);
        tokio::task::spawn_blocking(move || load_globals(&global, &root))
            .await
            .map_err(|e| LoadError::Join(e.to_string()))??;

        self.load_scopes(&store).await?;

        let store = Arc::try_unwrap(store)
            .map_err(|_| LoadError::Join("policy store still shared after load".to_string()))?;

        let (clients, roles, scopes, role_mappings) = store.counts();
        info!(
            root = %self.root.display(),
            clients,
            roles,
            scopes,
            role_mappings,
            "Loaded access-control policy"
        );

        Ok(store)
    }

    async fn load_scopes(&self, store: &Arc<PolicyStore>) -> Result<()> {
        let scopes_dir = self.root.join(SCOPES_DIR);
        let dirs = fsutil::read_dir_names(&scopes_dir)?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for dir in dirs {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| LoadError::Join(e.to_string()))?;
            let store = Arc::clone(store);

            tasks.spawn_blocking(move || {
                let _permit = permit;
                load_scope_dir(&store, &dir).map_err(|source| LoadError::Scope {
                    dir,
                    source: Box::new(source),
                })
            });
        }

        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, "Scope directory failed to load");
                    errors.push(err);
                }
                Err(err) => errors.push(LoadError::Join(err.to_string())),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LoadError::Aggregate(errors))
        }
    }
}

fn load_globals(store: &PolicyStore, root: &Path) -> Result<()> {
    match load_clients(store, root) {
        Ok(()) => {}
        Err(err) if err.is_dir_empty() => debug!(error = %err, "No clients defined"),
        Err(err) => return Err(err),
    }

    load_roles(store, root)
}

fn load_clients(store: &PolicyStore, root: &Path) -> Result<()> {
    let clients_dir = root.join(CLIENTS_DIR);
    let dirs = fsutil::read_dir_names(&clients_dir)?;
    if dirs.is_empty() {
        return Err(LoadError::DirEmpty(clients_dir));
    }

    for dir in dirs {
        let path = dir.join(CLIENT_FILE);
        let definition: ClientDefinition = fsutil::yaml_unmarshal(&path)?;
        let id = definition.client.id.clone();
        if !store.put_client(definition.client) {
            return Err(LoadError::DuplicateClient { id, path });
        }
    }

    Ok(())
}

fn load_roles(store: &PolicyStore, root: &Path) -> Result<()> {
    let path = root.join(CONFIG_DIR).join(ROLES_FILE);
    let definition: RoleDefinition = fsutil::yaml_unmarshal(&path)?;
    for role in definition.roles {
        let id = role.id.clone();
        if !store.put_role(role) {
            return Err(LoadError::DuplicateRole { id, path });
        }
    }

    Ok(())
}

fn load_scope_dir(store: &PolicyStore, dir: &Path) -> Result<()> {
    let scope = read_scope(dir)?;
    let scope_key = scope.key.clone();
    if !store.put_scope(scope) {
        return Err(LoadError::DuplicateScope {
            key: scope_key,
            dir: dir.to_path_buf(),
        });
    }

    let mappings = match read_role_mappings(dir) {
        Ok(mappings) => mappings,
        Err(err) if err.is_dir_empty() || err.is_not_found() => {
            debug!(scope = %scope_key, "No role mappings defined");
            Vec::new()
        }
        Err(err) => return Err(err),
    };

    for mapping in mappings {
        let role = mapping.role_id.clone();
        if !store.put_role_mapping(&scope_key, mapping) {
            return Err(LoadError::Conflict {
                scope: scope_key,
                role,
            });
        }
    }

    Ok(())
}

fn read_scope(dir: &Path) -> Result<Scope> {
    let definition: ScopeDefinition = fsutil::yaml_unmarshal(&dir.join(SCOPE_FILE))?;
    let mut scope = Scope::from(definition.scope);

    match fsutil::yaml_unmarshal::<PermissionGroupDefinition>(&dir.join(PERMISSION_GROUPS_FILE)) {
        Ok(groups) => scope.permission_groups = groups.permission_groups,
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    Ok(scope)
}

fn read_role_mappings(dir: &Path) -> Result<Vec<super::RoleMapping>> {
    let mapping_dir = dir.join(ROLE_MAPPING_DIR);
    let files: Vec<PathBuf> = fsutil::read_file_names(&mapping_dir)?
        .into_iter()
        .filter(|path| is_yaml(path))
        .collect();

    if files.is_empty() {
        return Err(LoadError::DirEmpty(mapping_dir));
    }

    files
        .iter()
        .map(|file| fsutil::yaml_unmarshal::<RoleMappingDefinition>(file).map(|d| d.role))
        .collect()
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
