//! # Access Control
//!
//! File-based access-control policy combined with live partner and role facts.
//!
//! ## Components
//!
//! - **Policy store** ([`store`]): clients, roles, scopes and role mappings
//!   ingested once from a directory tree with bounded parallelism, then
//!   read-only
//! - **Schema validator** ([`validator`]): pre-deployment check of the same
//!   tree against a JSON Schema set
//! - **Access resolver** ([`resolver`]): per-request evaluation of a user's
//!   permission groups from identity-provider and partner-directory facts
//!
//! ## Example
//!
//! ```no_run
//! use access_control::gateway::{HttpGateway, IdentityProviderClient, PartnerDirectoryClient, UpstreamConfig};
//! use access_control::{AccessResolver, PolicyLoader};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(PolicyLoader::new("/etc/iam").load().await?);
//!
//!     let http = HttpGateway::new(&UpstreamConfig::default())?;
//!     let identity = IdentityProviderClient::new("https://idp.example.com", None, http.clone())?;
//!     let partners = PartnerDirectoryClient::new("https://partners.example.com/partners", http)?;
//!
//!     let resolver = AccessResolver::new(store, Arc::new(identity), Arc::new(partners));
//!     let access = resolver
//!         .resolve_user_access("jdoe", &["fleet".to_string()])
//!         .await?;
//!
//!     for entry in access {
//!         println!("{}: {:?}", entry.context.id, entry.permission_groups);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod gateway;
pub mod kv;
pub mod resolver;
pub mod store;
pub mod validator;

// Re-export commonly used types
pub use error::{AccessError, LoadError, Result, StoreError, UpstreamError, ValidatorError};
pub use kv::KeyedStore;
pub use resolver::{AccessResolver, IdentityProvider, PartnerDirectory, User, UserAccess};
pub use store::{PolicyLoader, PolicyStore, RoleMappingSource};
pub use validator::{SchemaValidator, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
