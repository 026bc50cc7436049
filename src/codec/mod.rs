//! Versioned binary audio-frame codec.
//!
//! Every audio frame crossing the connection is wrapped in one of three
//! framings, selected once per connection by the negotiated protocol version:
//!
//! | Version | Layout                                                   | Max payload |
//! |---------|----------------------------------------------------------|-------------|
//! | 1       | raw payload, no header                                   | unbounded   |
//! | 2       | `version:u16 type:u16 reserved:u32 ts:u32 len:u32` + payload | `u32::MAX` |
//! | 3       | `type:u8 reserved:u8 len:u16` + payload                  | 65535       |
//!
//! The codec is stateless. A [`FrameCodec`] is a closed set of variants chosen
//! at connection setup; it never re-reads a mutable version field per frame.
//!
//! # Decode Rules
//!
//! - A buffer shorter than the header is [`FrameError::Truncated`].
//! - A declared length running past the buffer end is [`FrameError::Truncated`].
//! - Bytes after the declared payload are ignored.
//! - Reserved fields and the v2 `version` field are not checked.
//!
//! Decode never panics; callers drop the offending frame and continue.
//!
//! # Example
//!
//! ```rust
//! use voxlink::codec::{FrameCodec, ProtocolVersion};
//!
//! let codec = FrameCodec::new(ProtocolVersion::V3);
//! let wire = codec.encode(&[0x01, 0x02, 0x03]).unwrap();
//! assert_eq!(&wire[..], &[0x01, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03]);
//! assert_eq!(codec.decode(&wire).unwrap(), &[0x01, 0x02, 0x03]);
//! ```

mod header;

use std::fmt;
use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use header::{FrameType, V2Header, V3Header, V2_HEADER_SIZE, V3_HEADER_SIZE};

/// Frame-level decode/encode failures.
///
/// These never escalate past the session: the offending frame is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer ends before the header or the declared payload does.
    #[error("frame truncated: need {needed} bytes, got {available}")]
    Truncated {
        /// Bytes the header requires
        needed: usize,
        /// Bytes actually present
        available: usize,
    },

    /// Payload cannot be described by the version's length field.
    #[error("payload of {len} bytes exceeds protocol v{version} limit of {max} bytes")]
    PayloadTooLarge {
        /// Payload length
        len: usize,
        /// Largest payload the framing can carry
        max: usize,
        /// Protocol version
        version: u8,
    },
}

/// Negotiated binary protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    /// Raw payload
    #[default]
    V1,
    /// 16-byte header with timestamp
    V2,
    /// 4-byte compact header
    V3,
}

impl ProtocolVersion {
    /// All supported versions
    pub const ALL: [ProtocolVersion; 3] =
        [ProtocolVersion::V1, ProtocolVersion::V2, ProtocolVersion::V3];

    /// Parse a wire version number
    pub fn from_u8(version: u8) -> Option<Self> {
        match version {
            1 => Some(ProtocolVersion::V1),
            2 => Some(ProtocolVersion::V2),
            3 => Some(ProtocolVersion::V3),
            _ => None,
        }
    }

    /// Wire version number
    pub fn as_u8(&self) -> u8 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
            ProtocolVersion::V3 => 3,
        }
    }

    /// Codec for this version
    pub fn codec(&self) -> FrameCodec {
        FrameCodec::new(*self)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_u8(value).ok_or_else(|| format!("unsupported protocol version: {value}"))
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(version: ProtocolVersion) -> Self {
        version.as_u8()
    }
}

impl std::str::FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        trimmed
            .parse::<u8>()
            .map_err(|_| format!("invalid protocol version: {s}"))
            .and_then(Self::try_from)
    }
}

/// Stateless frame codec, one variant per protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCodec {
    /// Version 1: payload is the whole frame
    Raw,
    /// Version 2: 16-byte header
    Timestamped,
    /// Version 3: 4-byte header
    Compact,
}

impl FrameCodec {
    /// Select the codec for a negotiated version
    pub fn new(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::V1 => FrameCodec::Raw,
            ProtocolVersion::V2 => FrameCodec::Timestamped,
            ProtocolVersion::V3 => FrameCodec::Compact,
        }
    }

    /// Protocol version this codec speaks
    pub fn version(&self) -> ProtocolVersion {
        match self {
            FrameCodec::Raw => ProtocolVersion::V1,
            FrameCodec::Timestamped => ProtocolVersion::V2,
            FrameCodec::Compact => ProtocolVersion::V3,
        }
    }

    /// Header length in bytes
    pub fn header_len(&self) -> usize {
        match self {
            FrameCodec::Raw => 0,
            FrameCodec::Timestamped => V2_HEADER_SIZE,
            FrameCodec::Compact => V3_HEADER_SIZE,
        }
    }

    /// Largest payload a single frame can carry
    pub fn max_payload(&self) -> usize {
        match self {
            FrameCodec::Raw => usize::MAX,
            FrameCodec::Timestamped => usize::try_from(u32::MAX).unwrap_or(usize::MAX),
            FrameCodec::Compact => usize::from(u16::MAX),
        }
    }

    /// Encode a payload, stamping v2 frames with the current wall clock
    pub fn encode(&self, payload: &[u8]) -> Result<Bytes, FrameError> {
        self.encode_at(payload, wall_clock_millis())
    }

    /// Encode a payload with an explicit v2 timestamp (ignored by v1/v3)
    pub fn encode_at(&self, payload: &[u8], timestamp: u32) -> Result<Bytes, FrameError> {
        match self {
            FrameCodec::Raw => Ok(Bytes::copy_from_slice(payload)),
            FrameCodec::Timestamped => {
                let len = u32::try_from(payload.len()).map_err(|_| self.too_large(payload))?;
                let mut buf = BytesMut::with_capacity(V2_HEADER_SIZE + payload.len());
                buf.put_slice(&V2Header::audio(timestamp, len).to_bytes());
                buf.put_slice(payload);
                Ok(buf.freeze())
            },
            FrameCodec::Compact => {
                let len = u16::try_from(payload.len()).map_err(|_| self.too_large(payload))?;
                let mut buf = BytesMut::with_capacity(V3_HEADER_SIZE + payload.len());
                buf.put_slice(&V3Header::audio(len).to_bytes());
                buf.put_slice(payload);
                Ok(buf.freeze())
            },
        }
    }

    /// Extract the payload from a wire frame
    pub fn decode<'a>(&self, frame: &'a [u8]) -> Result<&'a [u8], FrameError> {
        let range = self.payload_range(frame)?;
        Ok(&frame[range])
    }

    /// Extract the payload without copying
    pub fn decode_bytes(&self, frame: Bytes) -> Result<Bytes, FrameError> {
        let range = self.payload_range(&frame)?;
        Ok(frame.slice(range))
    }

    fn payload_range(&self, frame: &[u8]) -> Result<Range<usize>, FrameError> {
        let declared = match self {
            FrameCodec::Raw => return Ok(0..frame.len()),
            FrameCodec::Timestamped => {
                let header = V2Header::from_bytes(frame)?;
                usize::try_from(header.payload_len).unwrap_or(usize::MAX)
            },
            FrameCodec::Compact => usize::from(V3Header::from_bytes(frame)?.payload_len),
        };

        let start = self.header_len();
        let end = start.saturating_add(declared);
        if end > frame.len() {
            return Err(FrameError::Truncated {
                needed: end,
                available: frame.len(),
            });
        }
        if end < frame.len() {
            tracing::trace!(extra = frame.len() - end, "Ignoring bytes after frame payload");
        }

        Ok(start..end)
    }

    fn too_large(&self, payload: &[u8]) -> FrameError {
        FrameError::PayloadTooLarge {
            len: payload.len(),
            max: self.max_payload(),
            version: self.version().as_u8(),
        }
    }
}

impl From<ProtocolVersion> for FrameCodec {
    fn from(version: ProtocolVersion) -> Self {
        Self::new(version)
    }
}

/// Wall-clock milliseconds truncated to 32 bits
pub fn wall_clock_millis() -> u32 {
    // Truncation is the wire contract
    chrono::Utc::now().timestamp_millis() as u32
}
