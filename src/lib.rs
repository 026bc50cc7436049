//! # voxlink - Voice Device Connection Protocol
//!
//! Device side of a voice-interaction link: endpoint provisioning, the
//! streaming connection handshake, a session state machine with automatic
//! reconnect, and the versioned binary framing used for audio.
//!
//! ## Features
//!
//! - **Provisioning**: one HTTP exchange yields the endpoint, credential and
//!   framing version
//! - **Three wire framings**: raw (v1), 16-byte timestamped header (v2),
//!   4-byte compact header (v3)
//! - **Session lifecycle**: hello exchange, routing of control vs audio,
//!   capped exponential backoff on transport loss
//! - **Pluggable transport**: WebSocket by default, in-memory for tests
//! - **Loopback server**: provisioning and streaming endpoints for local
//!   development
//!
//! ## Protocol Overview
//!
//! ```text
//! Device                                  Cloud
//!    |------ POST /ota/ ------------------>|
//!    |<----- {websocket:{url,token,ver}} --|
//!    |====== connect (headers) ===========>|
//!    |------ {"type":"hello",...} -------->|
//!    |<----- {"type":"hello",...} ---------|
//!    |<====> audio frames / JSON control <>|
//! ```
//!
//! ### Wire Formats
//!
//! | Version | Layout                                                      |
//! |---------|-------------------------------------------------------------|
//! | 1       | payload                                                     |
//! | 2       | `version:u16 type:u16 reserved:u32 ts:u32 len:u32` payload  |
//! | 3       | `type:u8 reserved:u8 len:u16` payload                       |
//!
//! All integers are big-endian.
//!
//! ### State Machine
//!
//! ```text
//!   [Idle] ─open─> [Handshaking] ─> [AwaitingServerHello] ─hello─> [Streaming]
//!                      ^                     │                          │
//!                      └── [Reconnecting] <──┴──── transport lost ──────┘
//!
//!   any ─close─> [Closing] ─> [Closed]
//! ```
//!
//! ## Quick Start
//!
//! ### Framing Only
//!
//! ```rust
//! use voxlink::codec::{FrameCodec, ProtocolVersion};
//!
//! let codec = FrameCodec::new(ProtocolVersion::V3);
//! let frame = codec.encode(&[1, 2, 3]).unwrap();
//! assert_eq!(&frame[..], &[0x01, 0x00, 0x00, 0x03, 1, 2, 3]);
//! assert_eq!(codec.decode(&frame).unwrap(), &[1, 2, 3]);
//! ```
//!
//! ### Full Session
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use voxlink::{Config, EventHandler, Session, SessionState};
//!
//! let config = Config::load(None)?;
//! let (handler, mut events) = EventHandler::channel();
//! let session = Session::from_config(&config, Arc::new(handler))?;
//!
//! session.open().await?;
//! session.wait_for(SessionState::Streaming, Duration::from_secs(5)).await;
//! session.send_audio(&opus_packet)?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! session.close().await;
//! ```
//!
//! ## Modules
//!
//! - [`codec`]: Binary audio framing
//! - [`protocol`]: Hello exchange, control messages, state machine
//! - [`provision`]: Endpoint provisioning
//! - [`transport`]: Connection seam and connectors
//! - [`session`]: Session lifecycle and routing
//! - [`server`]: Loopback endpoint (Axum-based)
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod provision;
pub mod server;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use codec::{FrameCodec, FrameError, ProtocolVersion};
pub use config::Config;
pub use error::{LinkError, Result};
pub use protocol::{AudioParams, ControlMessage, Features, HelloDescriptor, SessionState};
pub use provision::{
    ConnectionParameters, DeviceIdentity, HandshakeError, Negotiator, OtaNegotiator,
};
pub use server::ServerConfig;
pub use session::{
    EventHandler, ReconnectConfig, SendError, Session, SessionEvent, SessionHandler, SessionStats,
};
pub use transport::{Connector, TransportError, WsConnector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
