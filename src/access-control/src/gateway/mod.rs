//! HTTP clients for the upstream collaborators
//!
//! Both gateways share an [`HttpGateway`]: one pooled `reqwest::Client` with
//! a fixed per-call timeout, retrying transport failures and 5xx responses a
//! bounded number of times. A gateway configured with [`ClientCredentials`]
//! sends an OAuth2 bearer token with every request. Dropping the calling
//! future drops the in-flight request.

mod identity;
mod partner_directory;
mod token;

pub use identity::IdentityProviderClient;
pub use partner_directory::PartnerDirectoryClient;
pub use token::ClientCredentials;

use token::TokenSource;

use crate::error::UpstreamError;

use reqwest::{RequestBuilder, Response, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of attempts per call
pub const DEFAULT_ATTEMPTS: u32 = 3;

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Transport settings shared by the upstream clients
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Timeout applied to every attempt
    pub timeout: Duration,
    /// Attempts per call, including the first
    pub attempts: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            attempts: DEFAULT_ATTEMPTS,
        }
    }
}

/// Pooled HTTP client with bounded retries
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    attempts: u32,
    tokens: Option<Arc<TokenSource>>,
}

impl HttpGateway {
    /// Build the underlying client
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            attempts: config.attempts.max(1),
            tokens: None,
        })
    }

    /// Authenticate every request with a client-credentials access token
    ///
    /// The pooled connections are shared with the gateway this was derived
    /// from; the token cache is not.
    pub fn with_credentials(mut self, credentials: ClientCredentials) -> Self {
        self.tokens = Some(Arc::new(TokenSource::new(credentials)));
        self
    }

    /// Send the request produced by `build`, retrying transient failures
    ///
    /// The last response is returned as-is, even when it is a 5xx. A failed
    /// token request is returned without retrying.
    pub(crate) async fn send<F>(&self, operation: &str, build: F) -> Result<Response, UpstreamError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let mut request = build(&self.client);
            if let Some(tokens) = &self.tokens {
                request = request.bearer_auth(tokens.token(&self.client).await?);
            }

            match request.send().await {
                Ok(response) if response.status().is_server_error() && attempt < self.attempts => {
                    warn!(operation, attempt, status = %response.status(), "Upstream call failed, retrying");
                }
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.attempts => {
                    warn!(operation, attempt, error = %err, "Upstream call failed, retrying");
                }
                Err(err) => return Err(UpstreamError::Transport(err)),
            }

            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            attempt += 1;
        }
    }
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, UpstreamError> {
    let url = Url::parse(base_url).map_err(|e| UpstreamError::InvalidUrl(format!("{base_url}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(UpstreamError::InvalidUrl(base_url.to_string()));
    }
    Ok(url)
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::Router;
    use std::net::SocketAddr;

    /// Serve `app` on an ephemeral local port
    pub async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn flaky(State(calls): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            (StatusCode::SERVICE_UNAVAILABLE, "busy")
        } else {
            (StatusCode::OK, "ok")
        }
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route("/", get(flaky)).with_state(Arc::clone(&calls));
        let addr = testing::serve(app).await;

        let gateway = HttpGateway::new(&UpstreamConfig::default()).unwrap();
        let response = gateway
            .send("test", |client| client.get(format!("http://{addr}/")))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_attempt_returns_server_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route("/", get(flaky)).with_state(Arc::clone(&calls));
        let addr = testing::serve(app).await;

        let config = UpstreamConfig {
            attempts: 1,
            ..Default::default()
        };
        let gateway = HttpGateway::new(&config).unwrap();
        let response = gateway
            .send("test", |client| client.get(format!("http://{addr}/")))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_base_url() {
        assert!(parse_base_url("https://partners.example.com/v1").is_ok());
        assert!(matches!(
            parse_base_url("not a url"),
            Err(UpstreamError::InvalidUrl(_))
        ));
    }
}
