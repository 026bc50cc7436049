//! Host callbacks.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::codec::FrameError;
use crate::protocol::{ControlMessage, SessionState};

/// Receives inbound traffic and lifecycle notifications.
///
/// Callbacks run on the session's driver task in arrival order and must not
/// block.
pub trait SessionHandler: Send + Sync {
    /// Decoded audio payload
    fn on_audio(&self, payload: Bytes);

    /// Control message other than the server hello
    fn on_control(&self, message: ControlMessage);

    /// State transition
    fn on_state_change(&self, _from: SessionState, _to: SessionState) {}

    /// Inbound frame that failed to decode and was dropped
    fn on_frame_dropped(&self, _error: &FrameError) {}
}

/// Handler that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl SessionHandler for NoopHandler {
    fn on_audio(&self, _payload: Bytes) {}

    fn on_control(&self, _message: ControlMessage) {}
}

/// Callback as a value, for [`EventHandler`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// See [`SessionHandler::on_audio`]
    Audio(Bytes),
    /// See [`SessionHandler::on_control`]
    Control(ControlMessage),
    /// See [`SessionHandler::on_state_change`]
    StateChanged {
        /// Previous state
        from: SessionState,
        /// New state
        to: SessionState,
    },
    /// See [`SessionHandler::on_frame_dropped`]
    FrameDropped(FrameError),
}

/// Handler that forwards every callback into a channel
#[derive(Debug, Clone)]
pub struct EventHandler {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventHandler {
    /// Create a handler and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: SessionEvent) {
        // Receiver gone means nobody is listening
        let _ = self.tx.send(event);
    }
}

impl SessionHandler for EventHandler {
    fn on_audio(&self, payload: Bytes) {
        self.emit(SessionEvent::Audio(payload));
    }

    fn on_control(&self, message: ControlMessage) {
        self.emit(SessionEvent::Control(message));
    }

    fn on_state_change(&self, from: SessionState, to: SessionState) {
        self.emit(SessionEvent::StateChanged { from, to });
    }

    fn on_frame_dropped(&self, error: &FrameError) {
        self.emit(SessionEvent::FrameDropped(error.clone()));
    }
}
