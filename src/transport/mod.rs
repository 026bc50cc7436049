//! Transport seam for the streaming connection.
//!
//! A session never touches a socket directly. It asks a [`Connector`] for a
//! [`Connection`], a message sink plus a message stream, and speaks
//! [`WireMessage`]s over it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                Session                  │
//! │          (transport-agnostic)           │
//! └──────────────────┬──────────────────────┘
//!                    │ Connector::connect(ConnectRequest)
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │   WsConnector   │ │ MemoryConnector │
//! │   (WebSocket)   │ │  (in-process)   │
//! └─────────────────┘ └─────────────────┘
//! ```

pub mod memory;
mod websocket;

pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use websocket::WsConnector;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::Sink;
use thiserror::Error;

use crate::protocol::{
    HEADER_AUTHORIZATION, HEADER_CLIENT_ID, HEADER_DEVICE_ID, HEADER_PROTOCOL_VERSION,
};
use crate::provision::{ConnectionParameters, DeviceIdentity};

/// Transport failures. All of them end the current connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request could not be built (bad URL or header value)
    #[error("invalid connect request: {0}")]
    InvalidRequest(String),

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Connection was not established in time
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// Peer closed the connection
    #[error("connection closed: {0}")]
    Closed(String),

    /// Read or write failure on an open connection
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// One message on the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// JSON control message
    Text(String),
    /// Framed audio
    Binary(Bytes),
}

impl WireMessage {
    /// Short kind name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Text(_) => "text",
            WireMessage::Binary(_) => "binary",
        }
    }

    /// Text content, if a text message
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WireMessage::Text(text) => Some(text),
            WireMessage::Binary(_) => None,
        }
    }

    /// Binary content, if a binary message
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            WireMessage::Binary(bytes) => Some(bytes),
            WireMessage::Text(_) => None,
        }
    }
}

/// Outbound half of a connection
pub type WireSink = Pin<Box<dyn Sink<WireMessage, Error = TransportError> + Send>>;

/// Inbound half of a connection
pub type WireStream = BoxStream<'static, Result<WireMessage, TransportError>>;

/// An open connection. Dropping it releases the transport.
pub struct Connection {
    /// Outbound messages
    pub sink: WireSink,
    /// Inbound messages; ends when the peer goes away
    pub stream: WireStream,
}

impl Connection {
    /// Assemble from halves
    pub fn new(sink: WireSink, stream: WireStream) -> Self {
        Self { sink, stream }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Everything needed to open the streaming connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Endpoint URL
    pub url: String,
    /// Headers in send order
    pub headers: Vec<(String, String)>,
}

impl ConnectRequest {
    /// Build the request for a negotiated endpoint.
    ///
    /// `Authorization` is only present when a credential was issued.
    pub fn new(params: &ConnectionParameters, identity: &DeviceIdentity) -> Self {
        let mut headers = Vec::with_capacity(4);
        if let Some(authorization) = params.authorization() {
            headers.push((HEADER_AUTHORIZATION.to_string(), authorization));
        }
        headers.push((
            HEADER_PROTOCOL_VERSION.to_string(),
            params.protocol_version.to_string(),
        ));
        headers.push((HEADER_DEVICE_ID.to_string(), identity.device_id.clone()));
        headers.push((HEADER_CLIENT_ID.to_string(), identity.client_id.clone()));

        Self {
            url: params.endpoint_url.clone(),
            headers,
        }
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Opens connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection for the request
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection, TransportError>;

    /// Name for logging
    fn name(&self) -> &'static str;
}
