//! Control messages exchanged as text frames.
//!
//! Control messages are arbitrary JSON objects keyed by a `type` field. The
//! only type this crate interprets is `hello`; everything else is passed
//! through to the host untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::capabilities::{AudioParams, Features, HelloDescriptor};
use super::HELLO_TYPE;
use crate::codec::ProtocolVersion;

/// Failure to interpret an inbound text frame.
///
/// The offending message is dropped; the session keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlParseError {
    /// Text is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// JSON is valid but not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Hello message is missing or has a malformed field.
    #[error("invalid hello: {0}")]
    InvalidHello(String),
}

/// Structured control message (a JSON object)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlMessage(Map<String, Value>);

impl ControlMessage {
    /// Create a message with the given `type`
    pub fn new(msg_type: &str) -> Self {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(msg_type.to_string()));
        Self(map)
    }

    /// Add a field
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Parse an inbound text frame
    pub fn parse(text: &str) -> Result<Self, ControlParseError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ControlParseError::InvalidJson(e.to_string()))?;
        Self::try_from(value)
    }

    /// The `type` field, if present and a string
    pub fn msg_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Whether this is the reserved hello message
    pub fn is_hello(&self) -> bool {
        self.msg_type() == Some(HELLO_TYPE)
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the underlying object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Serialize to JSON text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}

impl From<Map<String, Value>> for ControlMessage {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ControlMessage {
    type Error = ControlParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(ControlParseError::NotAnObject("null")),
            Value::Bool(_) => Err(ControlParseError::NotAnObject("a boolean")),
            Value::Number(_) => Err(ControlParseError::NotAnObject("a number")),
            Value::String(_) => Err(ControlParseError::NotAnObject("a string")),
            Value::Array(_) => Err(ControlParseError::NotAnObject("an array")),
        }
    }
}

/// Client hello as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HelloWire {
    #[serde(rename = "type")]
    msg_type: String,
    version: ProtocolVersion,
    transport: String,
    #[serde(default)]
    features: Features,
    audio_params: AudioParams,
}

impl HelloDescriptor {
    /// Serialize as the client hello control message
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&HelloWire {
            msg_type: HELLO_TYPE.to_string(),
            version: self.protocol_version,
            transport: self.transport.clone(),
            features: self.features,
            audio_params: self.audio_params.clone(),
        })
    }

    /// Read a client hello (server side)
    pub fn from_control(message: &ControlMessage) -> Result<Self, ControlParseError> {
        if !message.is_hello() {
            return Err(ControlParseError::InvalidHello(format!(
                "unexpected type {:?}",
                message.msg_type()
            )));
        }
        let wire: HelloWire = serde_json::from_value(message.clone().into_value())
            .map_err(|e| ControlParseError::InvalidHello(e.to_string()))?;

        Ok(Self {
            protocol_version: wire.version,
            transport: wire.transport,
            features: wire.features,
            audio_params: wire.audio_params,
        })
    }
}

/// Server hello acknowledgement.
///
/// Every field is optional; a bare `{"type":"hello"}` completes the
/// handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHello {
    /// Server-assigned session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Transport the server believes it is speaking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// Audio format the server will stream back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_params: Option<AudioParams>,
}

impl ServerHello {
    /// Extract the known fields from a hello control message.
    ///
    /// Malformed optional fields are dropped rather than failing the
    /// handshake.
    pub fn from_control(message: &ControlMessage) -> Self {
        let session_id = message
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let transport = message
            .get("transport")
            .and_then(Value::as_str)
            .map(str::to_string);
        let audio_params = message
            .get("audio_params")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        Self {
            session_id,
            transport,
            audio_params,
        }
    }

    /// Build the hello control message (server side)
    pub fn to_control(&self) -> ControlMessage {
        let mut message = ControlMessage::new(HELLO_TYPE);
        if let Ok(Value::Object(fields)) = serde_json::to_value(self) {
            message.0.extend(fields);
        }
        message
    }
}
