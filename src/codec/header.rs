//! Fixed headers for the versioned binary audio framings.
//!
//! All multi-byte integers are big-endian (network byte order).
//!
//! ```text
//! v2 (16 bytes):
//! ┌─────────┬────────────┬──────────┬───────────┬─────────────┐
//! │ version │ frame_type │ reserved │ timestamp │ payload_len │
//! │   u16   │    u16     │   u32    │    u32    │     u32     │
//! └─────────┴────────────┴──────────┴───────────┴─────────────┘
//!
//! v3 (4 bytes):
//! ┌────────────┬──────────┬─────────────┐
//! │ frame_type │ reserved │ payload_len │
//! │     u8     │    u8    │     u16     │
//! └────────────┴──────────┴─────────────┘
//! ```

use super::FrameError;

/// Size of the v2 header in bytes
pub const V2_HEADER_SIZE: usize = 16;

/// Size of the v3 header in bytes
pub const V3_HEADER_SIZE: usize = 4;

/// Frame type tag carried in the v2/v3 headers.
///
/// Only audio frames are produced; any other tag seen on the wire is kept
/// as `Unknown` and otherwise ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Opaque audio payload
    Audio,
    /// Tag not defined by this protocol revision
    Unknown(u16),
}

impl FrameType {
    const AUDIO_TAG: u16 = 1;

    /// Map a wire tag to a frame type
    pub fn from_u16(tag: u16) -> Self {
        match tag {
            Self::AUDIO_TAG => FrameType::Audio,
            other => FrameType::Unknown(other),
        }
    }

    /// Wire tag for this frame type
    pub fn as_u16(&self) -> u16 {
        match self {
            FrameType::Audio => Self::AUDIO_TAG,
            FrameType::Unknown(tag) => *tag,
        }
    }
}

/// v2 header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2Header {
    /// Protocol version as written by the sender (not validated on decode)
    pub version: u16,
    /// Frame type tag
    pub frame_type: FrameType,
    /// Reserved, zero on encode
    pub reserved: u32,
    /// Sender wall-clock milliseconds truncated to 32 bits; advisory only
    pub timestamp: u32,
    /// Length of the payload following the header
    pub payload_len: u32,
}

impl V2Header {
    /// Header for an outbound audio frame
    pub fn audio(timestamp: u32, payload_len: u32) -> Self {
        Self {
            version: 2,
            frame_type: FrameType::Audio,
            reserved: 0,
            timestamp,
            payload_len,
        }
    }

    /// Encode to bytes
    pub fn to_bytes(&self) -> [u8; V2_HEADER_SIZE] {
        let mut bytes = [0u8; V2_HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.version.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.frame_type.as_u16().to_be_bytes());
        bytes[4..8].copy_from_slice(&self.reserved.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.timestamp.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.payload_len.to_be_bytes());
        bytes
    }

    /// Decode from the start of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < V2_HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: V2_HEADER_SIZE,
                available: bytes.len(),
            });
        }

        Ok(Self {
            version: u16::from_be_bytes([bytes[0], bytes[1]]),
            frame_type: FrameType::from_u16(u16::from_be_bytes([bytes[2], bytes[3]])),
            reserved: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            timestamp: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            payload_len: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }
}

/// v3 header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Header {
    /// Frame type tag (one byte on the wire)
    pub frame_type: FrameType,
    /// Reserved, zero on encode
    pub reserved: u8,
    /// Length of the payload following the header
    pub payload_len: u16,
}

impl V3Header {
    /// Header for an outbound audio frame
    pub fn audio(payload_len: u16) -> Self {
        Self {
            frame_type: FrameType::Audio,
            reserved: 0,
            payload_len,
        }
    }

    /// Encode to bytes
    pub fn to_bytes(&self) -> [u8; V3_HEADER_SIZE] {
        let mut bytes = [0u8; V3_HEADER_SIZE];
        // v3 carries the tag in a single byte
        bytes[0] = self.frame_type.as_u16() as u8;
        bytes[1] = self.reserved;
        bytes[2..4].copy_from_slice(&self.payload_len.to_be_bytes());
        bytes
    }

    /// Decode from the start of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < V3_HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: V3_HEADER_SIZE,
                available: bytes.len(),
            });
        }

        Ok(Self {
            frame_type: FrameType::from_u16(u16::from(bytes[0])),
            reserved: bytes[1],
            payload_len: u16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }
}
