//! In-memory policy store
//!
//! Indexes for clients, roles, scopes and role mappings, populated once by
//! [`PolicyLoader`] and read-only afterwards. The store exposes no mutation
//! API outside this crate.
//!
//! # Example
//!
//! ```no_run
//! use access_control::store::PolicyLoader;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PolicyLoader::new("/etc/access-control").load().await?;
//!
//! let mapping = store.get_role_mapping("fleet", "admin")?;
//! println!("{} rules for admin in fleet", mapping.mapping.len());
//! # Ok(())
//! # }
//! ```

pub(crate) mod loader;
pub mod types;

pub use loader::{LoaderConfig, PolicyLoader, DEFAULT_MAX_CONCURRENCY};
pub use types::{Client, Filter, Mapping, PermissionGroup, Role, RoleMapping, Scope};

use crate::error::StoreError;
use crate::kv::KeyedStore;

/// Read-after-load policy indexes
#[derive(Debug, Default)]
pub struct PolicyStore {
    clients: KeyedStore<Client>,
    roles: KeyedStore<Role>,
    scopes: KeyedStore<Scope>,
    role_mappings: KeyedStore<RoleMapping>,
}

/// Lookup surface the access resolver depends on
pub trait RoleMappingSource: Send + Sync {
    /// The single role mapping for a (scope, role) pair
    fn get_role_mapping(&self, scope_key: &str, role_id: &str) -> Result<RoleMapping, StoreError>;
}

impl PolicyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Get a client by id
    pub fn get_client(&self, id: &str) -> Result<Client, StoreError> {
        self.clients
            .get(&client_key(id))
            .ok_or_else(|| StoreError::ClientNotFound(id.to_string()))
    }

    /// All clients, order unspecified
    pub fn get_clients(&self) -> Vec<Client> {
        self.clients.values()
    }

    /// Get a role by id
    pub fn get_role(&self, id: &str) -> Result<Role, StoreError> {
        self.roles
            .get(&role_key(id))
            .ok_or_else(|| StoreError::RoleNotFound(id.to_string()))
    }

    /// All roles, order unspecified
    pub fn get_roles(&self) -> Vec<Role> {
        self.roles.values()
    }

    /// Get a scope by key
    pub fn get_scope(&self, key: &str) -> Result<Scope, StoreError> {
        self.scopes
            .get(&scope_key(key))
            .ok_or_else(|| StoreError::ScopeNotFound(key.to_string()))
    }

    /// All scopes, order unspecified
    pub fn get_scopes(&self) -> Vec<Scope> {
        self.scopes.values()
    }

    /// The single role mapping for a (scope, role) pair
    pub fn get_role_mapping(&self, scope_key: &str, role_id: &str) -> Result<RoleMapping, StoreError> {
        self.role_mappings
            .get(&role_mapping_key(scope_key, role_id))
            .ok_or_else(|| StoreError::RoleMappingNotFound {
                scope: scope_key.to_string(),
                role: role_id.to_string(),
            })
    }

    /// Every role mapping registered under a scope
    ///
    /// Prefix scan over the composite key space; not a secondary index.
    pub fn get_role_mappings(&self, scope_key: &str) -> Vec<RoleMapping> {
        let prefix = role_mapping_prefix(scope_key);
        self.role_mappings
            .filter(|key, _| key.starts_with(&prefix))
            .into_iter()
            .map(|(_, mapping)| mapping)
            .collect()
    }

    /// Entry counts as (clients, roles, scopes, role mappings)
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.clients.len(),
            self.roles.len(),
            self.scopes.len(),
            self.role_mappings.len(),
        )
    }

    // Registration is first-writer-wins; `false` means the id was taken

    pub(crate) fn put_client(&self, client: Client) -> bool {
        self.clients.insert_new(client_key(&client.id), client)
    }

    pub(crate) fn put_role(&self, role: Role) -> bool {
        self.roles.insert_new(role_key(&role.id), role)
    }

    pub(crate) fn put_scope(&self, scope: Scope) -> bool {
        self.scopes.insert_new(scope_key(&scope.key), scope)
    }

    /// Register a role mapping; `false` if the pair is already taken
    pub(crate) fn put_role_mapping(&self, scope_key: &str, mapping: RoleMapping) -> bool {
        let key = role_mapping_key(scope_key, &mapping.role_id);
        self.role_mappings.insert_new(key, mapping)
    }
}

impl RoleMappingSource for PolicyStore {
    fn get_role_mapping(&self, scope_key: &str, role_id: &str) -> Result<RoleMapping, StoreError> {
        PolicyStore::get_role_mapping(self, scope_key, role_id)
    }
}

fn client_key(id: &str) -> String {
    format!("client:{id}")
}

fn role_key(id: &str) -> String {
    format!("role:{id}")
}

fn scope_key(key: &str) -> String {
    format!("scope:{key}")
}

fn role_mapping_prefix(scope_key: &str) -> String {
    format!("scope:{scope_key}/role:")
}

fn role_mapping_key(scope_key: &str, role_id: &str) -> String {
    format!("{}{role_id}", role_mapping_prefix(scope_key))
}
