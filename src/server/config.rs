//! Server configuration.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::codec::ProtocolVersion;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub addr: SocketAddr,
    /// Protocol version handed out by provisioning
    pub protocol_version: ProtocolVersion,
    /// Credential handed out by provisioning and required on connect
    pub token: Option<String>,
    /// Activation code returned with provisioning responses
    pub activation_code: Option<String>,
    /// Streaming URL to advertise; derived from the bound address if unset
    pub public_url: Option<String>,
    /// Echo inbound audio frames back to the device
    pub echo_audio: bool,
    /// Enable request logging
    pub logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8002)),
            protocol_version: ProtocolVersion::V1,
            token: None,
            activation_code: None,
            public_url: None,
            echo_audio: true,
            logging: true,
        }
    }
}

impl ServerConfig {
    /// Create with custom port
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }

    /// Bind to all interfaces
    pub fn bind_all(mut self) -> Self {
        self.addr = SocketAddr::from(([0, 0, 0, 0], self.addr.port()));
        self
    }

    /// Set address directly
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Set the protocol version handed out
    pub fn with_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Require and hand out a credential
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Return an activation challenge with every provisioning response
    pub fn with_activation(mut self, code: &str) -> Self {
        self.activation_code = Some(code.to_string());
        self
    }

    /// Advertise a fixed streaming URL
    pub fn with_public_url(mut self, url: &str) -> Self {
        self.public_url = Some(url.to_string());
        self
    }

    /// Do not echo audio
    pub fn without_echo(mut self) -> Self {
        self.echo_audio = false;
        self
    }

    /// Disable logging
    pub fn without_logging(mut self) -> Self {
        self.logging = false;
        self
    }
}
