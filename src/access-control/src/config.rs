//! Service configuration from environment variables
//!
//! | Variable | Default |
//! |---|---|
//! | `APP_NAME` | `access-control` |
//! | `APP_VERSION` | crate version |
//! | `APP_ENV` | `local` (`local`, `dev`, `prod`) |
//! | `HTTP_PORT` | `8080` |
//! | `HTTP_ADMIN_PORT` | `8081` |
//! | `LOG_LEVEL` | `info` |
//! | `IAM_ROOT_DIR` | required |
//! | `LOADER_MAX_CONCURRENCY` | `5` |
//! | `IDENTITY_PROVIDER_BASE_URL` | required |
//! | `IDENTITY_PROVIDER_USER_KEY` | unset |
//! | `PARTNER_DIRECTORY_BASE_URL` | required |
//! | `UPSTREAM_TIMEOUT_SECS` | `5` |
//! | `UPSTREAM_ATTEMPTS` | `3` |
//!
//! Each upstream may authenticate with an OAuth2 client-credentials grant.
//! Setting `<UPSTREAM>_CLIENT_ID` enables it and makes the secret and token
//! URL mandatory, where `<UPSTREAM>` is `IDENTITY_PROVIDER` or
//! `PARTNER_DIRECTORY`:
//!
//! | Variable | Default |
//! |---|---|
//! | `<UPSTREAM>_CLIENT_ID` | unset (requests are sent unauthenticated) |
//! | `<UPSTREAM>_CLIENT_SECRET` | required with a client id |
//! | `<UPSTREAM>_TOKEN_URL` | `IDENTITY_PROVIDER_ISSUER` + `/connect/token` for the identity provider, otherwise required |
//! | `<UPSTREAM>_SCOPES` | none (comma separated) |
//! | `<UPSTREAM>_AUDIENCE` | unset |

use crate::gateway::{ClientCredentials, UpstreamConfig};
use crate::store::{LoaderConfig, DEFAULT_MAX_CONCURRENCY};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Local,
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Prod => "prod",
        })
    }
}

/// Application identity
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub env: Environment,
}

/// HTTP listener and logging
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
    /// Liveness and readiness listener
    pub admin_port: u16,
    /// Fallback filter when `RUST_LOG` is unset
    pub log_level: String,
}

/// Policy tree location and loader settings
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub root_dir: PathBuf,
    pub loader: LoaderConfig,
}

/// Upstream collaborator endpoints
#[derive(Debug, Clone)]
pub struct UpstreamEndpoints {
    pub identity_provider_url: String,
    pub identity_provider_user_key: Option<String>,
    pub identity_provider_credentials: Option<ClientCredentials>,
    pub partner_directory_url: String,
    pub partner_directory_credentials: Option<ClientCredentials>,
    pub transport: UpstreamConfig,
}

/// Variable names of one upstream's client-credentials settings
struct CredentialVars {
    client_id: &'static str,
    client_secret: &'static str,
    token_url: &'static str,
    scopes: &'static str,
    audience: &'static str,
    /// Token URL is derived as `{issuer}/connect/token` when unset
    issuer: Option<&'static str>,
}

const IDENTITY_PROVIDER_CREDENTIALS: CredentialVars = CredentialVars {
    client_id: "IDENTITY_PROVIDER_CLIENT_ID",
    client_secret: "IDENTITY_PROVIDER_CLIENT_SECRET",
    token_url: "IDENTITY_PROVIDER_TOKEN_URL",
    scopes: "IDENTITY_PROVIDER_SCOPES",
    audience: "IDENTITY_PROVIDER_AUDIENCE",
    issuer: Some("IDENTITY_PROVIDER_ISSUER"),
};

const PARTNER_DIRECTORY_CREDENTIALS: CredentialVars = CredentialVars {
    client_id: "PARTNER_DIRECTORY_CLIENT_ID",
    client_secret: "PARTNER_DIRECTORY_CLIENT_SECRET",
    token_url: "PARTNER_DIRECTORY_TOKEN_URL",
    scopes: "PARTNER_DIRECTORY_SCOPES",
    audience: "PARTNER_DIRECTORY_AUDIENCE",
    issuer: None,
};

/// Full service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub http: HttpConfig,
    pub policy: PolicyConfig,
    pub upstream: UpstreamEndpoints,
}

impl Config {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let app = AppConfig {
            name: vars.get("APP_NAME").unwrap_or_else(|| "access-control".to_string()),
            version: vars
                .get("APP_VERSION")
                .unwrap_or_else(|| crate::VERSION.to_string()),
            env: vars.parse("APP_ENV", Environment::default())?,
        };

        let http = HttpConfig {
            port: vars.parse("HTTP_PORT", 8080)?,
            admin_port: vars.parse("HTTP_ADMIN_PORT", 8081)?,
            log_level: vars.get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        let policy = PolicyConfig {
            root_dir: PathBuf::from(vars.required("IAM_ROOT_DIR")?),
            loader: LoaderConfig {
                max_concurrency: vars.parse("LOADER_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?,
            },
        };

        let defaults = UpstreamConfig::default();
        let upstream = UpstreamEndpoints {
            identity_provider_url: vars.required("IDENTITY_PROVIDER_BASE_URL")?,
            identity_provider_user_key: vars.get("IDENTITY_PROVIDER_USER_KEY"),
            identity_provider_credentials: vars.credentials(&IDENTITY_PROVIDER_CREDENTIALS)?,
            partner_directory_url: vars.required("PARTNER_DIRECTORY_BASE_URL")?,
            partner_directory_credentials: vars.credentials(&PARTNER_DIRECTORY_CREDENTIALS)?,
            transport: UpstreamConfig {
                timeout: Duration::from_secs(
                    vars.parse("UPSTREAM_TIMEOUT_SECS", defaults.timeout.as_secs())?,
                ),
                attempts: vars.parse("UPSTREAM_ATTEMPTS", defaults.attempts)?,
            },
        };

        Ok(Self {
            app,
            http,
            policy,
            upstream,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set, non-blank value
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }

    fn credentials(&self, names: &CredentialVars) -> Result<Option<ClientCredentials>, ConfigError> {
        let Some(client_id) = self.get(names.client_id) else {
            return Ok(None);
        };

        let token_url = self
            .get(names.token_url)
            .or_else(|| {
                names
                    .issuer
                    .and_then(|issuer| self.get(issuer))
                    .map(|issuer| format!("{}/connect/token", issuer.trim_end_matches('/')))
            })
            .ok_or(ConfigError::Missing(names.token_url))?;

        Ok(Some(ClientCredentials {
            client_id,
            client_secret: self.required(names.client_secret)?,
            token_url,
            scopes: self
                .get(names.scopes)
                .map(|scopes| {
                    scopes
                        .split(',')
                        .map(str::trim)
                        .filter(|scope| !scope.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            audience: self.get(names.audience),
        }))
    }
}
