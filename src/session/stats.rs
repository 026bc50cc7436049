//! Session counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of session activity since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Audio frames written to the transport
    pub audio_sent: u64,
    /// Audio frames decoded and delivered
    pub audio_received: u64,
    /// Control messages written (hello excluded)
    pub control_sent: u64,
    /// Control messages delivered (hello excluded)
    pub control_received: u64,
    /// Inbound frames that failed to decode, plus outbound frames lost to
    /// backpressure
    pub frames_dropped: u64,
    /// Inbound text that was not a JSON object
    pub messages_dropped: u64,
    /// Reconnect attempts
    pub reconnects: u64,
}

/// Thread-safe counters behind [`SessionStats`]
#[derive(Debug, Default)]
pub(crate) struct Counters {
    audio_sent: AtomicU64,
    audio_received: AtomicU64,
    control_sent: AtomicU64,
    control_received: AtomicU64,
    frames_dropped: AtomicU64,
    messages_dropped: AtomicU64,
    reconnects: AtomicU64,
}

impl Counters {
    pub(crate) fn audio_sent(&self) {
        self.audio_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn audio_received(&self) {
        self.audio_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn control_sent(&self) {
        self.control_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn control_received(&self) {
        self.control_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            audio_sent: self.audio_sent.load(Ordering::Relaxed),
            audio_received: self.audio_received.load(Ordering::Relaxed),
            control_sent: self.control_sent.load(Ordering::Relaxed),
            control_received: self.control_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}
