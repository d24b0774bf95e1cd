//! Error types for the access-control service

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Lookup misses on the policy store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No client registered under the id
    #[error("client not found: {0}")]
    ClientNotFound(String),

    /// No role registered under the id
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// No scope registered under the key
    #[error("scope not found: {0}")]
    ScopeNotFound(String),

    /// No role mapping for the (scope, role) pair
    #[error("role mapping not found for scope [{scope}] and role [{role}]")]
    RoleMappingNotFound {
        /// Scope key
        scope: String,
        /// Role id
        role: String,
    },
}

/// Errors raised while ingesting a policy directory tree
#[derive(Debug, Error)]
pub enum LoadError {
    /// A directory exists but holds no usable entries
    #[error("directory is empty: {}", .0.display())]
    DirEmpty(PathBuf),

    /// A file or directory does not exist
    #[error("file/directory not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Reading a file or directory failed
    #[error("failed to read [{}]: {source}", path.display())]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A YAML document could not be decoded into its typed definition
    #[error("failed to unmarshal [{}]: {source}", path.display())]
    Malformed {
        /// Offending path
        path: PathBuf,
        /// Underlying decode error
        #[source]
        source: serde_yaml::Error,
    },

    /// A second role mapping targets an already registered (scope, role) pair
    #[error("duplicate role mapping found for scope [{scope}] and role [{role}]")]
    Conflict {
        /// Scope key
        scope: String,
        /// Role id
        role: String,
    },

    /// Two client directories declare the same client id
    #[error("duplicate client [{id}] declared in [{}]", path.display())]
    DuplicateClient {
        /// Client id
        id: String,
        /// File holding the second declaration
        path: PathBuf,
    },

    /// A role id is listed more than once
    #[error("duplicate role [{id}] declared in [{}]", path.display())]
    DuplicateRole {
        /// Role id
        id: String,
        /// Roles file
        path: PathBuf,
    },

    /// Two scope directories declare the same scope key
    #[error("duplicate scope [{key}] declared in [{}]", dir.display())]
    DuplicateScope {
        /// Scope key
        key: String,
        /// Directory holding the second declaration
        dir: PathBuf,
    },

    /// Failure while processing one scope directory
    #[error("failed to load scope directory [{}]: {source}", dir.display())]
    Scope {
        /// Scope directory
        dir: PathBuf,
        /// What went wrong inside it
        #[source]
        source: Box<LoadError>,
    },

    /// Failures collected from concurrent scope tasks
    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<LoadError>),

    /// A worker task panicked or was cancelled
    #[error("loader task failed: {0}")]
    Join(String),
}

impl LoadError {
    /// True for the "directory empty" condition, tolerated for optional directories
    pub fn is_dir_empty(&self) -> bool {
        matches!(self, Self::DirEmpty(_))
    }

    /// True when the path was missing altogether
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True if this error, or any error it wraps or aggregates, is a
    /// uniqueness violation
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. }
            | Self::DuplicateClient { .. }
            | Self::DuplicateRole { .. }
            | Self::DuplicateScope { .. } => true,
            Self::Scope { source, .. } => source.is_conflict(),
            Self::Aggregate(errors) => errors.iter().any(LoadError::is_conflict),
            _ => false,
        }
    }

    /// Flattened view over aggregated errors
    pub fn errors(&self) -> Vec<&LoadError> {
        match self {
            Self::Aggregate(errors) => errors.iter().flat_map(LoadError::errors).collect(),
            other => vec![other],
        }
    }
}

struct AggregateDisplay<'a>(&'a [LoadError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// Failures reported by the identity provider or partner directory
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream has no record for the requested key
    #[error("upstream record not found")]
    NotFound,

    /// Upstream answered with an unexpected status
    #[error("upstream responded with status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// The request never produced a usable response
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be decoded
    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    /// The token endpoint refused or failed the client-credentials grant
    #[error("failed to obtain upstream access token: {0}")]
    Token(String),

    /// The configured base URL cannot address the resource
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by the access resolver
#[derive(Debug, Error)]
pub enum AccessError {
    /// Identity provider has no such user
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// The request itself is unusable
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Identity provider or partner directory failed
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Role mapping lookup failed for a reason other than a miss
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A fan-out task panicked or was cancelled
    #[error("resolver task failed: {0}")]
    Join(String),
}

/// Catastrophic schema-validation setup failures
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// A schema file could not be read or parsed
    #[error("failed to load schema [{}]: {reason}", path.display())]
    Schema {
        /// Schema path
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A directory that must exist could not be scanned
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Result type for policy loading
pub type Result<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_lists_every_member() {
        let err = LoadError::Aggregate(vec![
            LoadError::Conflict {
                scope: "fleet".into(),
                role: "admin".into(),
            },
            LoadError::NotFound(PathBuf::from("/policy/scopes/orders/scope.yaml")),
        ]);

        let rendered = err.to_string();
        assert!(rendered.contains("scope [fleet] and role [admin]"));
        assert!(rendered.contains("/policy/scopes/orders/scope.yaml"));
        assert_eq!(err.errors().len(), 2);
    }

    #[test]
    fn test_conflict_detected_through_wrappers() {
        let err = LoadError::Aggregate(vec![LoadError::Scope {
            dir: PathBuf::from("/policy/scopes/fleet"),
            source: Box::new(LoadError::Conflict {
                scope: "fleet".into(),
                role: "admin".into(),
            }),
        }]);

        assert!(err.is_conflict());
        assert!(LoadError::DuplicateScope {
            key: "fleet".into(),
            dir: PathBuf::from("/policy/scopes/fleet-copy"),
        }
        .is_conflict());
        assert!(!LoadError::DirEmpty(PathBuf::from("/x")).is_conflict());
    }

    #[test]
    fn test_store_error_message() {
        let err = StoreError::RoleMappingNotFound {
            scope: "fleet".into(),
            role: "admin".into(),
        };
        assert_eq!(
            err.to_string(),
            "role mapping not found for scope [fleet] and role [admin]"
        );
    }
}
