//! HTTP provisioning client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{parse_response, ConnectionParameters, DeviceIdentity, HandshakeError, Negotiator};
use crate::config::ProvisioningConfig;
use crate::error::{LinkError, Result};
use crate::protocol::{HEADER_CLIENT_ID, HEADER_DEVICE_ID};

/// Negotiator backed by a provisioning endpoint
#[derive(Debug, Clone)]
pub struct OtaNegotiator {
    client: Client,
    url: String,
    user_agent: String,
}

impl OtaNegotiator {
    /// Create a negotiator for the given endpoint
    pub fn new(
        url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LinkError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            user_agent: user_agent.into(),
        })
    }

    /// Create from the `[provisioning]` config section
    pub fn from_config(config: &ProvisioningConfig) -> Result<Self> {
        Self::new(
            config.url.clone(),
            config.user_agent.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Provisioning URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Negotiator for OtaNegotiator {
    async fn negotiate(
        &self,
        identity: &DeviceIdentity,
    ) -> std::result::Result<ConnectionParameters, HandshakeError> {
        let body = json!({
            "version": 0,
            "uuid": identity.client_id,
            "mac_address": identity.device_id,
            "application": {
                "name": self.user_agent,
                "version": identity.client_version,
            },
        });

        tracing::debug!(
            url = %self.url,
            device_id = %identity.device_id,
            "Requesting connection parameters"
        );

        let response = self
            .client
            .post(&self.url)
            .header(HEADER_DEVICE_ID, &identity.device_id)
            .header(HEADER_CLIENT_ID, &identity.client_id)
            .header(
                reqwest::header::USER_AGENT,
                format!("{}/{}", self.user_agent, identity.client_version),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| HandshakeError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandshakeError::Unreachable(format!(
                "provisioning endpoint returned {status}"
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| HandshakeError::Unreachable(e.to_string()))?;

        let params = parse_response(&text)?;
        tracing::info!(
            endpoint = %params.endpoint_url,
            version = %params.protocol_version,
            credential = params.credential.is_some(),
            "Provisioned"
        );
        if let Some(activation) = &params.activation {
            tracing::warn!(code = %activation.code, "Device requires activation");
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Port 9 (discard) on loopback is closed on test hosts
        let negotiator =
            OtaNegotiator::new("http://127.0.0.1:9/ota/", "voxlink", Duration::from_secs(2)).unwrap();
        let identity = DeviceIdentity::new("aa:bb:cc:dd:ee:ff", "client-1", "1.0.0");

        let err = negotiator.negotiate(&identity).await.unwrap_err();
        assert!(matches!(err, HandshakeError::Unreachable(_)));
    }

    #[test]
    fn test_from_config() {
        let config = ProvisioningConfig::default();
        let negotiator = OtaNegotiator::from_config(&config).unwrap();
        assert_eq!(negotiator.url(), config.url);
    }
}
