//! Session lifecycle.
//!
//! A [`Session`] owns one logical connection to the cloud: it provisions,
//! opens the transport, performs the hello exchange, routes inbound traffic
//! to a [`SessionHandler`], and reconnects when the transport drops.
//!
//! ```text
//!   host                       Session                         driver task
//!    │  open() ──────────────> negotiate (Idle)
//!    │                         Idle → Handshaking ───────────> connect, write hello
//!    │                                                         → AwaitingServerHello
//!    │                                                         server hello → Streaming
//!    │  send_audio() ────────> encode, bounded queue ────────> transport
//!    │  <──────────── on_audio / on_control ────────────────── route inbound
//!    │                                                         transport lost → Reconnecting
//!    │  close() ─────────────> → Closing, cancel ────────────> release transport
//!    │                         → Closed
//! ```
//!
//! All state changes go through [`Phase::apply`]; the current state is
//! published on a `watch` channel and to [`SessionHandler::on_state_change`].

mod backoff;
mod driver;
mod handler;
mod router;
mod stats;

pub use backoff::ReconnectConfig;
pub use handler::{EventHandler, NoopHandler, SessionEvent, SessionHandler};
pub use router::{MessageRouter, Route};
pub use stats::SessionStats;

pub use crate::protocol::TransitionError;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::{FrameCodec, FrameError, ProtocolVersion};
use crate::config::{Config, SessionConfig};
use crate::error::{LinkError, Result};
use crate::protocol::{
    AudioParams, ControlMessage, Event, Features, HelloDescriptor, Phase, ServerHello,
    SessionState, Transition,
};
use crate::provision::{ConnectionParameters, DeviceIdentity, Negotiator, OtaNegotiator};
use crate::transport::{Connector, WireMessage, WsConnector};

use stats::Counters;

/// Outbound send rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Session is not in a state that accepts this send
    #[error("session not ready (state: {0})")]
    NotReady(SessionState),

    /// Outbound queue is full; the frame was dropped
    #[error("outbound queue full")]
    Backpressure,

    /// Payload cannot be framed
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Control message cannot be serialized
    #[error("encode error: {0}")]
    Encode(String),
}

/// The live connection, present only in connected states
#[derive(Debug)]
pub(crate) struct Link {
    params: ConnectionParameters,
    codec: FrameCodec,
    outbound: mpsc::Sender<WireMessage>,
}

/// State shared between the handle and the driver task
pub(crate) struct Shared {
    identity: DeviceIdentity,
    hello: HelloDescriptor,
    negotiator: Arc<dyn Negotiator>,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn SessionHandler>,
    reconnect: ReconnectConfig,
    outbound_queue: usize,
    connect_timeout: Duration,
    phase: Mutex<Phase<Link>>,
    /// Taken under `phase` and held while the handler is notified
    notify: Mutex<()>,
    state_tx: watch::Sender<SessionState>,
    server_hello: Mutex<Option<ServerHello>>,
    counters: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Apply an event, publish the new state, and notify the handler.
    ///
    /// The handler sees transitions in the order they were applied. It runs
    /// outside the phase lock, so it may call back into the session.
    fn transition(&self, event: Event<Link>) -> std::result::Result<Transition, TransitionError> {
        let (outcome, _notify) = {
            let mut phase = lock(&self.phase);
            let outcome = phase.apply(event);
            if let Ok(transition) = &outcome {
                if !transition.is_noop() {
                    self.state_tx.send_replace(transition.to);
                }
            }
            (outcome, lock(&self.notify))
        };

        match &outcome {
            Ok(transition) if !transition.is_noop() => {
                tracing::info!(from = %transition.from, to = %transition.to, "Session state changed");
                self.handler.on_state_change(transition.from, transition.to);
            },
            Ok(_) => {},
            Err(err) if err.from.is_shutting_down() => {
                tracing::debug!(error = %err, "Transition rejected during shutdown");
            },
            Err(err) => tracing::warn!(error = %err, "Transition rejected"),
        }
        outcome
    }

    /// Close and release from inside the driver
    fn shut_down(&self) {
        let _ = self.transition(Event::Close);
        if self.state() == SessionState::Closing {
            let _ = self.transition(Event::Released);
        }
    }
}

#[derive(Debug, Default)]
struct Control {
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
    opening: bool,
}

/// Handle to one logical device connection
pub struct Session {
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device_id", &self.shared.identity.device_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start building a session
    pub fn builder(identity: DeviceIdentity, negotiator: Arc<dyn Negotiator>) -> SessionBuilder {
        SessionBuilder::new(identity, negotiator)
    }

    /// Session provisioned over HTTP and connected over WebSocket, as
    /// described by `config`
    pub fn from_config(config: &Config, handler: Arc<dyn SessionHandler>) -> Result<Self> {
        let negotiator = OtaNegotiator::from_config(&config.provisioning)?;
        let connector =
            WsConnector::new(Duration::from_secs(config.session.connect_timeout_secs));

        Ok(Self::builder(config.identity(), Arc::new(negotiator))
            .connector(Arc::new(connector))
            .handler(handler)
            .features(config.features)
            .audio_params(config.audio.clone())
            .reconnect(config.reconnect.clone())
            .options(config.session.clone())
            .build())
    }

    /// Provision and start connecting.
    ///
    /// Negotiation happens while the session is still `Idle`; if it fails
    /// the error is returned and the session stays where it was. On success
    /// the session moves to `Handshaking` and the connection continues in
    /// the background. Watch [`Session::subscribe`] for `Streaming`.
    pub async fn open(&self) -> Result<()> {
        let cancel = {
            let mut control = lock(&self.control);
            let state = self.state();
            if control.opening || !matches!(state, SessionState::Idle | SessionState::Closed) {
                return Err(TransitionError {
                    from: state,
                    event: "open",
                }
                .into());
            }
            control.opening = true;
            control.cancel = CancellationToken::new();
            control.cancel.clone()
        };

        let negotiated = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LinkError::Closed),
            result = self.shared.negotiator.negotiate(&self.shared.identity) => {
                result.map_err(LinkError::from)
            },
        };

        let mut control = lock(&self.control);
        control.opening = false;
        let params = match negotiated {
            Ok(params) => params,
            Err(err) => {
                tracing::warn!(error = %err, "Provisioning failed");
                return Err(err);
            },
        };
        if cancel.is_cancelled() {
            return Err(LinkError::Closed);
        }

        self.shared.transition(Event::Open)?;
        control.driver = Some(tokio::spawn(driver::run(
            Arc::clone(&self.shared),
            params,
            cancel,
        )));
        Ok(())
    }

    /// Frame and queue one audio payload.
    ///
    /// Never blocks: fails with [`SendError::NotReady`] outside `Streaming`
    /// and [`SendError::Backpressure`] when the outbound queue is full.
    pub fn send_audio(&self, payload: &[u8]) -> std::result::Result<(), SendError> {
        let phase = lock(&self.shared.phase);
        let link = phase
            .streaming_link()
            .ok_or_else(|| SendError::NotReady(phase.state()))?;
        let frame = link.codec.encode(payload)?;

        match link.outbound.try_send(WireMessage::Binary(frame)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.shared.counters.frame_dropped();
                Err(SendError::Backpressure)
            },
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::NotReady(phase.state())),
        }
    }

    /// Queue a control message, serialized verbatim.
    ///
    /// Allowed once the client hello is on the wire.
    pub fn send_control(&self, message: &ControlMessage) -> std::result::Result<(), SendError> {
        let text = message
            .to_json()
            .map_err(|e| SendError::Encode(e.to_string()))?;

        let phase = lock(&self.shared.phase);
        let link = phase
            .link()
            .ok_or_else(|| SendError::NotReady(phase.state()))?;

        match link.outbound.try_send(WireMessage::Text(text)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SendError::Backpressure),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::NotReady(phase.state())),
        }
    }

    /// Close the session and release the transport.
    ///
    /// Safe from any state; cancels in-flight provisioning, connects and
    /// reconnect backoff. Never reconnects.
    pub async fn close(&self) {
        let driver = {
            let mut control = lock(&self.control);
            let _ = self.shared.transition(Event::Close);
            control.cancel.cancel();
            control.driver.take()
        };

        if let Some(driver) = driver {
            if let Err(err) = driver.await {
                tracing::warn!(error = %err, "Session driver ended abnormally");
            }
        }

        if self.state() == SessionState::Closing {
            let _ = self.shared.transition(Event::Released);
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until the session reaches `state`, up to `timeout`.
    ///
    /// Returns false on timeout.
    pub async fn wait_for(&self, state: SessionState, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        let reached = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|current| *current == state)).await,
            Ok(Ok(_))
        );
        reached
    }

    /// Counters since creation
    pub fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot()
    }

    /// Server hello of the current connection, once received
    pub fn server_hello(&self) -> Option<ServerHello> {
        lock(&self.shared.server_hello).clone()
    }

    /// Parameters of the current connection
    pub fn parameters(&self) -> Option<ConnectionParameters> {
        lock(&self.shared.phase)
            .link()
            .map(|link| link.params.clone())
    }

    /// Protocol version of the current connection
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        lock(&self.shared.phase)
            .link()
            .map(|link| link.codec.version())
    }

    /// Identity this session presents
    pub fn identity(&self) -> &DeviceIdentity {
        &self.shared.identity
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        lock(&self.control).cancel.cancel();
    }
}

/// Builder for [`Session`]
pub struct SessionBuilder {
    identity: DeviceIdentity,
    negotiator: Arc<dyn Negotiator>,
    connector: Option<Arc<dyn Connector>>,
    handler: Arc<dyn SessionHandler>,
    features: Features,
    audio_params: AudioParams,
    reconnect: ReconnectConfig,
    options: SessionConfig,
}

impl SessionBuilder {
    fn new(identity: DeviceIdentity, negotiator: Arc<dyn Negotiator>) -> Self {
        Self {
            identity,
            negotiator,
            connector: None,
            handler: Arc::new(NoopHandler),
            features: Features::default(),
            audio_params: AudioParams::default(),
            reconnect: ReconnectConfig::default(),
            options: SessionConfig::default(),
        }
    }

    /// Transport connector (default: WebSocket)
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Inbound traffic handler (default: discard)
    pub fn handler(mut self, handler: Arc<dyn SessionHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Features advertised in the hello
    pub fn features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Audio format advertised in the hello
    pub fn audio_params(mut self, audio_params: AudioParams) -> Self {
        self.audio_params = audio_params;
        self
    }

    /// Reconnect policy
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Queue size and timeouts
    pub fn options(mut self, options: SessionConfig) -> Self {
        self.options = options;
        self
    }

    /// Build the session in `Idle`
    pub fn build(self) -> Session {
        let connect_timeout = Duration::from_secs(self.options.connect_timeout_secs);
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector::new(connect_timeout)));
        let (state_tx, _) = watch::channel(SessionState::Idle);

        let shared = Shared {
            identity: self.identity,
            hello: HelloDescriptor::new(ProtocolVersion::default())
                .with_features(self.features)
                .with_audio_params(self.audio_params),
            negotiator: self.negotiator,
            connector,
            handler: self.handler,
            reconnect: self.reconnect,
            outbound_queue: self.options.outbound_queue.max(1),
            connect_timeout,
            phase: Mutex::new(Phase::Idle),
            notify: Mutex::new(()),
            state_tx,
            server_hello: Mutex::new(None),
            counters: Counters::default(),
        };

        Session {
            shared: Arc::new(shared),
            control: Mutex::new(Control::default()),
        }
    }
}
