//! Wire-level protocol definitions.
//!
//! Everything here is pure data: the hello exchange, control messages, the
//! header names used when opening a connection, and the connection state
//! machine. Nothing in this module performs I/O.
//!
//! # Message Flow
//!
//! ```text
//! Device                                  Cloud
//!    |                                      |
//!    |------ POST provisioning ----------->|  identity
//!    |<----- {websocket:{url,token,ver}} --|
//!    |                                      |
//!    |====== connect (headers) ===========>|  Authorization, Protocol-Version,
//!    |                                      |  Device-Id, Client-Id
//!    |------ {"type":"hello",...} -------->|  features + audio format
//!    |<----- {"type":"hello",...} ---------|  session established
//!    |                                      |
//!    |====== binary audio frames =========>|  framed per protocol version
//!    |<===== binary audio frames ==========|
//!    |<----> JSON control messages <------>|
//! ```
//!
//! ## Connection Headers
//!
//! | Header             | Value                                       |
//! |--------------------|---------------------------------------------|
//! | `Authorization`    | `Bearer <token>`, only if a token was issued |
//! | `Protocol-Version` | negotiated version (`1`, `2` or `3`)        |
//! | `Device-Id`        | device identifier                           |
//! | `Client-Id`        | client instance identifier                  |

mod capabilities;
mod message;
mod state;

pub use capabilities::{AudioParams, Features, HelloDescriptor};
pub use message::{ControlMessage, ControlParseError, ServerHello};
pub use state::{Event, Phase, SessionState, Transition, TransitionError};

/// Reserved control message type for the hello exchange
pub const HELLO_TYPE: &str = "hello";

/// Transport name advertised in the hello
pub const TRANSPORT_WEBSOCKET: &str = "websocket";

/// Header carrying the bearer credential
pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// Header carrying the negotiated protocol version
pub const HEADER_PROTOCOL_VERSION: &str = "Protocol-Version";

/// Header carrying the device identifier
pub const HEADER_DEVICE_ID: &str = "Device-Id";

/// Header carrying the client identifier
pub const HEADER_CLIENT_ID: &str = "Client-Id";

/// Format a credential for the `Authorization` header.
///
/// Tokens that already carry a scheme (contain a space) are sent as-is.
pub fn authorization_value(token: &str) -> String {
    if token.contains(' ') {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}
