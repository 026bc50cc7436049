//! Client capabilities advertised in the hello exchange.
//!
//! The client announces its optional features and the audio format it will
//! stream immediately after the transport opens. The server may echo the
//! audio parameters back in its own hello.

use serde::{Deserialize, Serialize};

use super::TRANSPORT_WEBSOCKET;
use crate::codec::ProtocolVersion;

/// Optional client features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Device performs acoustic echo cancellation
    pub aec: bool,
    /// Device exposes MCP tools
    pub mcp: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            aec: true,
            mcp: true,
        }
    }
}

/// Audio stream format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioParams {
    /// Payload codec name (opaque to this crate)
    pub format: String,
    /// Sample rate in Hz
    #[serde(rename = "sample_rate")]
    pub sample_rate_hz: u32,
    /// Channel count
    pub channels: u8,
    /// Duration of one frame in milliseconds
    #[serde(rename = "frame_duration")]
    pub frame_duration_ms: u32,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            format: "opus".to_string(),
            sample_rate_hz: 16_000,
            channels: 1,
            frame_duration_ms: 60,
        }
    }
}

impl AudioParams {
    /// Samples per channel in one frame
    pub fn samples_per_frame(&self) -> u32 {
        self.sample_rate_hz / 1000 * self.frame_duration_ms
    }
}

/// Capability advertisement sent as the client hello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloDescriptor {
    /// Negotiated binary protocol version
    pub protocol_version: ProtocolVersion,
    /// Transport name, always `websocket`
    pub transport: String,
    /// Optional features
    pub features: Features,
    /// Outbound audio format
    pub audio_params: AudioParams,
}

impl HelloDescriptor {
    /// Create a descriptor for the given version
    pub fn new(protocol_version: ProtocolVersion) -> Self {
        Self {
            protocol_version,
            transport: TRANSPORT_WEBSOCKET.to_string(),
            features: Features::default(),
            audio_params: AudioParams::default(),
        }
    }

    /// Set features
    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Set audio parameters
    pub fn with_audio_params(mut self, audio_params: AudioParams) -> Self {
        self.audio_params = audio_params;
        self
    }

    /// Same advertisement for a different protocol version
    pub fn for_version(&self, protocol_version: ProtocolVersion) -> Self {
        Self {
            protocol_version,
            ..self.clone()
        }
    }
}
