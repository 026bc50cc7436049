//! Connection state machine.
//!
//! ```text
//!             open                connected            server hello
//!   [Idle] ────────> [Handshaking] ─────────> [AwaitingServerHello] ─────────> [Streaming]
//!     ^                   │  ^                         │                            │
//!     │                   │  │ renegotiated            │ transport lost             │
//!     │                   v  │                         v                            │
//!     │              [Reconnecting] <──────────────────┴────────────────────────────┘
//!     │
//!     │  (any state) ── close ──> [Closing] ── released ──> [Closed] ── open ──> [Handshaking]
//! ```
//!
//! The phase carries the live connection (`L`) only in the states where one
//! exists, so code holding a `Phase::Streaming(link)` has the link in hand
//! and code in any other state cannot reach one.

use std::fmt;

use thiserror::Error;

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No transport open
    Idle,
    /// Transport connection in flight
    Handshaking,
    /// Client hello sent, waiting for the server's
    AwaitingServerHello,
    /// Audio and control flowing
    Streaming,
    /// Transport lost; renegotiating
    Reconnecting,
    /// Releasing the transport
    Closing,
    /// Transport released
    Closed,
}

impl SessionState {
    /// Lowercase name for logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Handshaking => "handshaking",
            SessionState::AwaitingServerHello => "awaiting_server_hello",
            SessionState::Streaming => "streaming",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }

    /// A transport handle exists in this state
    pub fn has_transport(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingServerHello | SessionState::Streaming
        )
    }

    /// Close has been requested or completed
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs to the state machine
#[derive(Debug)]
pub enum Event<L> {
    /// Start connecting with fresh parameters
    Open,
    /// Transport opened and client hello written
    Connected(L),
    /// Server hello observed
    ServerHello,
    /// Transport failed or closed unexpectedly
    TransportLost,
    /// Reconnect negotiation produced fresh parameters
    Renegotiated,
    /// Local close requested
    Close,
    /// Transport handle released
    Released,
}

impl<L> Event<L> {
    /// Name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Event::Open => "open",
            Event::Connected(_) => "connected",
            Event::ServerHello => "server_hello",
            Event::TransportLost => "transport_lost",
            Event::Renegotiated => "renegotiated",
            Event::Close => "close",
            Event::Released => "released",
        }
    }
}

/// Event not permitted in the current state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event '{event}' is not valid in state {from}")]
pub struct TransitionError {
    /// State when the event arrived
    pub from: SessionState,
    /// Rejected event
    pub event: &'static str,
}

/// A state change produced by [`Phase::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Previous state
    pub from: SessionState,
    /// New state
    pub to: SessionState,
}

impl Transition {
    /// The event was accepted without changing state
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// State plus the data that only exists in that state
#[derive(Debug)]
pub enum Phase<L> {
    /// See [`SessionState::Idle`]
    Idle,
    /// See [`SessionState::Handshaking`]
    Handshaking,
    /// See [`SessionState::AwaitingServerHello`]
    AwaitingServerHello(L),
    /// See [`SessionState::Streaming`]
    Streaming(L),
    /// See [`SessionState::Reconnecting`]
    Reconnecting,
    /// See [`SessionState::Closing`]
    Closing,
    /// See [`SessionState::Closed`]
    Closed,
}

impl<L> Default for Phase<L> {
    fn default() -> Self {
        Phase::Idle
    }
}

impl<L> Phase<L> {
    /// Observable state
    pub fn state(&self) -> SessionState {
        match self {
            Phase::Idle => SessionState::Idle,
            Phase::Handshaking => SessionState::Handshaking,
            Phase::AwaitingServerHello(_) => SessionState::AwaitingServerHello,
            Phase::Streaming(_) => SessionState::Streaming,
            Phase::Reconnecting => SessionState::Reconnecting,
            Phase::Closing => SessionState::Closing,
            Phase::Closed => SessionState::Closed,
        }
    }

    /// Live link, only while streaming
    pub fn streaming_link(&self) -> Option<&L> {
        match self {
            Phase::Streaming(link) => Some(link),
            _ => None,
        }
    }

    /// Live link in any connected state
    pub fn link(&self) -> Option<&L> {
        match self {
            Phase::AwaitingServerHello(link) | Phase::Streaming(link) => Some(link),
            _ => None,
        }
    }

    /// Apply an event. On error the phase is left untouched.
    ///
    /// Leaving a connected state drops the link it carried.
    pub fn apply(&mut self, event: Event<L>) -> Result<Transition, TransitionError> {
        let from = self.state();
        let current = std::mem::take(self);

        let next = match (current, event) {
            (Phase::Idle | Phase::Closed, Event::Open) => Phase::Handshaking,
            (Phase::Handshaking, Event::Connected(link)) => Phase::AwaitingServerHello(link),
            (Phase::AwaitingServerHello(link) | Phase::Streaming(link), Event::ServerHello) => {
                Phase::Streaming(link)
            },
            (
                Phase::Handshaking | Phase::AwaitingServerHello(_) | Phase::Streaming(_),
                Event::TransportLost,
            ) => Phase::Reconnecting,
            (Phase::Reconnecting, Event::Renegotiated) => Phase::Handshaking,
            (Phase::Closed, Event::Close) => Phase::Closed,
            (_, Event::Close) => Phase::Closing,
            (Phase::Closing, Event::Released) => Phase::Closed,
            (current, event) => {
                let name = event.name();
                *self = current;
                return Err(TransitionError { from, event: name });
            },
        };

        *self = next;
        Ok(Transition {
            from,
            to: self.state(),
        })
    }
}
