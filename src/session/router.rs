//! Inbound message classification.
//!
//! Every inbound message lands in exactly one [`Route`]. Text is parsed as a
//! control message; the reserved hello completes the handshake and is never
//! forwarded. Binary is unframed with the connection's codec.

use bytes::Bytes;

use crate::codec::{FrameCodec, FrameError};
use crate::protocol::{ControlMessage, ControlParseError, ServerHello};
use crate::transport::WireMessage;

/// Where an inbound message goes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Server hello; consumed by the session
    ServerHello(ServerHello),
    /// Control message for the host
    Control(ControlMessage),
    /// Decoded audio payload for the host
    Audio(Bytes),
    /// Text that is not a JSON object
    BadControl(ControlParseError),
    /// Binary that does not decode
    BadFrame(FrameError),
}

/// Per-connection router
#[derive(Debug, Clone, Copy)]
pub struct MessageRouter {
    codec: FrameCodec,
}

impl MessageRouter {
    /// Router for a connection using `codec`
    pub fn new(codec: FrameCodec) -> Self {
        Self { codec }
    }

    /// Classify one inbound message
    pub fn route(&self, message: WireMessage) -> Route {
        match message {
            WireMessage::Text(text) => match ControlMessage::parse(&text) {
                Ok(control) if control.is_hello() => {
                    Route::ServerHello(ServerHello::from_control(&control))
                },
                Ok(control) => Route::Control(control),
                Err(err) => Route::BadControl(err),
            },
            WireMessage::Binary(frame) => match self.codec.decode_bytes(frame) {
                Ok(payload) => Route::Audio(payload),
                Err(err) => Route::BadFrame(err),
            },
        }
    }
}
