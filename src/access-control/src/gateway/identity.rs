//! Identity provider client

use super::{parse_base_url, HttpGateway};
use crate::error::UpstreamError;
use crate::resolver::{IdentityProvider, IdentityUser};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

const USERS_BY_CORRELATION_ID: [&str; 2] = ["users", "by-correlation-id"];
const USER_KEY_HEADER: &str = "user-key";

/// Looks users up at `GET {base}/users/by-correlation-id/{id}`
#[derive(Debug, Clone)]
pub struct IdentityProviderClient {
    base_url: Url,
    user_key: Option<String>,
    http: HttpGateway,
}

impl IdentityProviderClient {
    /// Create a client; `user_key` is sent as the `user-key` header when set
    pub fn new(base_url: &str, user_key: Option<String>, http: HttpGateway) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            user_key,
            http,
        })
    }

    fn user_url(&self, id: &str) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(USERS_BY_CORRELATION_ID)
            .push(id);
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for IdentityProviderClient {
    async fn get_user_by_correlation_id(&self, id: &str) -> Result<IdentityUser, UpstreamError> {
        let url = self.user_url(id)?;
        debug!(correlation_id = id, "Fetching user from identity provider");

        let response = self
            .http
            .send("identity.get_user_by_correlation_id", |client| {
                let request = client.get(url.clone());
                match &self.user_key {
                    Some(key) => request.header(USER_KEY_HEADER, key),
                    None => request,
                }
            })
            .await?;

        match response.status() {
            StatusCode::OK => response
                .json::<IdentityUser>()
                .await
                .map_err(|e| UpstreamError::Decode(e.to_string())),
            StatusCode::NOT_FOUND => Err(UpstreamError::NotFound),
            status => Err(UpstreamError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
