//! Partner directory client

use super::{parse_base_url, HttpGateway};
use crate::error::UpstreamError;
use crate::resolver::{PartnerDirectory, PartnerRecord, PartnerType};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct PartnersResponse {
    #[serde(default)]
    data: Vec<PartnerRecord>,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    message: String,
}

/// Batched partner lookup at `GET {base}?codes=a,b&type=T`
#[derive(Debug, Clone)]
pub struct PartnerDirectoryClient {
    base_url: Url,
    http: HttpGateway,
}

impl PartnerDirectoryClient {
    pub fn new(base_url: &str, http: HttpGateway) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            http,
        })
    }
}

#[async_trait]
impl PartnerDirectory for PartnerDirectoryClient {
    async fn get_partners_by_codes(
        &self,
        codes: &[String],
        partner_type: &str,
    ) -> Result<Vec<PartnerRecord>, UpstreamError> {
        let codes = codes.join(",");
        let partner_type = PartnerType::from_raw(partner_type);
        debug!(codes = %codes, partner_type = %partner_type, "Fetching partners from directory");

        let response = self
            .http
            .send("partners.get_partners_by_codes", |client| {
                client
                    .get(self.base_url.clone())
                    .query(&[("codes", codes.as_str()), ("type", partner_type.as_str())])
            })
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let envelope: PartnersResponse = if body.trim().is_empty() {
            PartnersResponse::default()
        } else {
            serde_json::from_str(&body).map_err(|e| UpstreamError::Decode(e.to_string()))?
        };

        if status != StatusCode::OK {
            let message = envelope
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| status.to_string());
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(envelope.data)
    }
}
