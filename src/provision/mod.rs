//! Endpoint provisioning.
//!
//! Before streaming, a device asks a fixed provisioning endpoint where and
//! how to connect. One request, one response, no retries: callers own the
//! retry policy.
//!
//! ```text
//! POST <provisioning url>
//! Device-Id: <device id>
//! Client-Id: <client id>
//! User-Agent: <agent>/<client version>
//!
//! 200 OK
//! {"websocket": {"url": "wss://...", "token": "...", "version": 2},
//!  "activation": {"code": "123456", "message": "..."}}
//! ```
//!
//! `token` and `version` are optional; `version` defaults to 1 when absent or
//! not a number. `activation` is present when the device still has to be
//! bound to an account.

mod ota;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::codec::ProtocolVersion;
use crate::protocol::authorization_value;

pub use ota::OtaNegotiator;

/// Provisioning failures. Both are retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Endpoint could not be reached or refused the request.
    #[error("provisioning endpoint unreachable: {0}")]
    Unreachable(String),

    /// Response could not be interpreted.
    #[error("malformed provisioning response: {0}")]
    MalformedResponse(String),
}

/// Device identity presented during provisioning and on connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Stable device identifier (typically a MAC address)
    pub device_id: String,
    /// Identifier of this client installation
    pub client_id: String,
    /// Client software version
    pub client_version: String,
}

impl DeviceIdentity {
    /// Create an identity
    pub fn new(
        device_id: impl Into<String>,
        client_id: impl Into<String>,
        client_version: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            client_id: client_id.into(),
            client_version: client_version.into(),
        }
    }
}

/// Pending device activation returned by the provisioning endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationChallenge {
    /// Code the user enters to bind the device
    pub code: String,
    /// Human-readable instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Where and how to stream, as issued by one provisioning exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParameters {
    /// Streaming endpoint URL
    pub endpoint_url: String,
    /// Bearer credential, if issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Binary framing version for the connection
    pub protocol_version: ProtocolVersion,
    /// Pending activation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationChallenge>,
}

impl ConnectionParameters {
    /// Parameters without a credential
    pub fn new(endpoint_url: impl Into<String>, protocol_version: ProtocolVersion) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            credential: None,
            protocol_version,
            activation: None,
        }
    }

    /// Set the credential
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// `Authorization` header value, if a credential was issued
    pub fn authorization(&self) -> Option<String> {
        self.credential.as_deref().map(authorization_value)
    }
}

/// Resolves connection parameters for a device.
#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Perform one provisioning exchange
    async fn negotiate(
        &self,
        identity: &DeviceIdentity,
    ) -> Result<ConnectionParameters, HandshakeError>;
}

/// Negotiator that always returns the same parameters.
///
/// Useful when the endpoint is known out of band.
#[derive(Debug, Clone)]
pub struct StaticNegotiator {
    params: ConnectionParameters,
}

impl StaticNegotiator {
    /// Wrap fixed parameters
    pub fn new(params: ConnectionParameters) -> Self {
        Self { params }
    }
}

#[async_trait]
impl Negotiator for StaticNegotiator {
    async fn negotiate(
        &self,
        _identity: &DeviceIdentity,
    ) -> Result<ConnectionParameters, HandshakeError> {
        Ok(self.params.clone())
    }
}

/// Interpret a provisioning response body
pub fn parse_response(body: &str) -> Result<ConnectionParameters, HandshakeError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| HandshakeError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let websocket = value
        .get("websocket")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            HandshakeError::MalformedResponse("missing websocket descriptor".to_string())
        })?;

    let endpoint_url = websocket
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| HandshakeError::MalformedResponse("missing websocket url".to_string()))?
        .to_string();

    let credential = websocket
        .get("token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    let protocol_version = parse_version(websocket.get("version"))?;

    let activation = value
        .get("activation")
        .and_then(|a| serde_json::from_value::<ActivationChallenge>(a.clone()).ok());

    Ok(ConnectionParameters {
        endpoint_url,
        credential,
        protocol_version,
        activation,
    })
}

/// Absent or non-numeric versions fall back to 1; numeric versions must be
/// whole and supported.
fn parse_version(value: Option<&Value>) -> Result<ProtocolVersion, HandshakeError> {
    let number = match value {
        Some(Value::Number(n)) => Some(n.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let Some(number) = number else {
        return Ok(ProtocolVersion::V1);
    };
    let unsupported =
        || HandshakeError::MalformedResponse(format!("unsupported protocol version {number}"));

    if number.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&number) {
        return Err(unsupported());
    }
    // Whole and in range
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = number as u8;
    ProtocolVersion::from_u8(whole).ok_or_else(unsupported)
}
