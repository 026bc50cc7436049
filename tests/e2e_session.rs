//! End-to-end session tests.
//!
//! These drive a full [`Session`] against an in-process server: handshake,
//! framing on the wire, routing of inbound traffic, reconnect and shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use hex_literal::hex;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tokio::time::timeout;
use voxlink::codec::{FrameError, ProtocolVersion};
use voxlink::config::SessionConfig;
use voxlink::protocol::ControlMessage;
use voxlink::provision::{ConnectionParameters, DeviceIdentity, HandshakeError, Negotiator};
use voxlink::session::{
    EventHandler, ReconnectConfig, SendError, Session, SessionEvent,
};
use voxlink::transport::{
    ConnectRequest, Connection, Connector, MemoryConnector, MemoryListener, MemoryPeer,
    TransportError, WireMessage,
};
use voxlink::{LinkError, SessionState};

const WAIT: Duration = Duration::from_secs(5);

/// Negotiator that counts calls and can be told to fail
struct ScriptedNegotiator {
    /// Handed out in order; the last one repeats
    params: Vec<ConnectionParameters>,
    calls: AtomicUsize,
    /// Calls numbered >= this fail
    fail_from: usize,
}

impl ScriptedNegotiator {
    fn new(params: ConnectionParameters) -> Arc<Self> {
        Self::failing_from(params, usize::MAX)
    }

    fn failing_from(params: ConnectionParameters, fail_from: usize) -> Arc<Self> {
        Arc::new(Self {
            params: vec![params],
            calls: AtomicUsize::new(0),
            fail_from,
        })
    }

    fn sequence(params: Vec<ConnectionParameters>) -> Arc<Self> {
        Arc::new(Self {
            params,
            calls: AtomicUsize::new(0),
            fail_from: usize::MAX,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Negotiator for ScriptedNegotiator {
    async fn negotiate(
        &self,
        _identity: &DeviceIdentity,
    ) -> Result<ConnectionParameters, HandshakeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_from {
            return Err(HandshakeError::Unreachable("provisioning offline".to_string()));
        }
        Ok(self.params[call.min(self.params.len() - 1)].clone())
    }
}

fn identity() -> DeviceIdentity {
    DeviceIdentity::new("02:00:00:00:00:01", "client-e2e", "1.0.0")
}

fn params(version: ProtocolVersion) -> ConnectionParameters {
    ConnectionParameters::new("wss://x/ws", version).with_credential("abc")
}

fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        enabled: true,
        max_attempts,
        initial_delay_ms: 10,
        max_delay_ms: 50,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

struct Harness {
    session: Session,
    negotiator: Arc<ScriptedNegotiator>,
    connector: MemoryConnector,
    listener: MemoryListener,
    events: UnboundedReceiver<SessionEvent>,
}

fn harness(negotiator: Arc<ScriptedNegotiator>, reconnect: ReconnectConfig) -> Harness {
    let (connector, listener) = MemoryConnector::pair();
    let (handler, events) = EventHandler::channel();
    let session = Session::builder(identity(), negotiator.clone())
        .connector(Arc::new(connector.clone()))
        .handler(Arc::new(handler))
        .reconnect(reconnect)
        .build();

    Harness {
        session,
        negotiator,
        connector,
        listener,
        events,
    }
}

async fn accept(listener: &mut MemoryListener) -> MemoryPeer {
    timeout(WAIT, listener.accept())
        .await
        .expect("Accept timed out")
        .expect("Listener closed")
}

async fn recv(peer: &mut MemoryPeer) -> WireMessage {
    timeout(WAIT, peer.recv())
        .await
        .expect("Receive timed out")
        .expect("Client closed")
}

/// Accept a connection, consume the client hello and answer it
async fn accept_streaming(h: &mut Harness) -> MemoryPeer {
    let mut peer = accept(&mut h.listener).await;
    let hello = recv(&mut peer).await;
    assert!(ControlMessage::parse(hello.as_text().unwrap()).unwrap().is_hello());
    assert!(peer.send_text(r#"{"type":"hello"}"#));
    assert!(h.session.wait_for(SessionState::Streaming, WAIT).await);
    peer
}

/// Next event that is not a state change
async fn next_traffic(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("Event timed out")
            .expect("Handler dropped");
        if !matches!(event, SessionEvent::StateChanged { .. }) {
            return event;
        }
    }
}

/// Consume state changes until `state` is entered
async fn reach(events: &mut UnboundedReceiver<SessionEvent>, state: SessionState) {
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("State change timed out")
            .expect("Handler dropped");
        if let SessionEvent::StateChanged { to, .. } = event {
            if to == state {
                return;
            }
        }
    }
}

/// Test the full handshake and v2 framing on the wire
#[tokio::test]
async fn test_handshake_then_v2_audio() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V2)), fast_reconnect(3));

    h.session.open().await.unwrap();
    let mut peer = accept(&mut h.listener).await;

    // Connect headers
    let request = peer.request().clone();
    assert_eq!(request.url, "wss://x/ws");
    assert_eq!(request.header("Authorization"), Some("Bearer abc"));
    assert_eq!(request.header("Protocol-Version"), Some("2"));
    assert_eq!(request.header("Device-Id"), Some("02:00:00:00:00:01"));
    assert_eq!(request.header("Client-Id"), Some("client-e2e"));

    // The hello is the first thing on the wire
    let first = recv(&mut peer).await;
    let hello = ControlMessage::parse(first.as_text().expect("hello is text")).unwrap();
    assert!(hello.is_hello());
    assert_eq!(hello.get("version"), Some(&json!(2)));
    assert_eq!(hello.get("transport"), Some(&json!("websocket")));
    assert_eq!(hello.get("features"), Some(&json!({"aec": true, "mcp": true})));
    assert_eq!(hello.get("audio_params").unwrap()["sample_rate"], 16000);

    // Audio is refused until the server answers
    assert!(h.session.wait_for(SessionState::AwaitingServerHello, WAIT).await);
    assert_eq!(
        h.session.send_audio(&[1, 2, 3]),
        Err(SendError::NotReady(SessionState::AwaitingServerHello))
    );

    assert!(peer.send_text(r#"{"type":"hello","session_id":"s-1"}"#));
    assert!(h.session.wait_for(SessionState::Streaming, WAIT).await);
    assert_eq!(
        h.session.server_hello().unwrap().session_id.as_deref(),
        Some("s-1")
    );
    assert_eq!(h.session.protocol_version(), Some(ProtocolVersion::V2));

    h.session.send_audio(&[0x01, 0x02, 0x03]).unwrap();
    let frame = recv(&mut peer).await;
    let frame = frame.as_binary().expect("audio is binary");
    assert_eq!(frame.len(), 19);
    assert_eq!(&frame[..8], &hex!("00 02 00 01 00 00 00 00"));
    assert_eq!(&frame[12..], &hex!("00 00 00 03 01 02 03"));

    h.session.close().await;
    assert_eq!(h.session.state(), SessionState::Closed);
    assert_eq!(h.session.stats().audio_sent, 1);
}

/// Test v1 frames carry the payload unchanged
#[tokio::test]
async fn test_v1_audio_is_raw() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V1)), fast_reconnect(3));
    h.session.open().await.unwrap();
    let mut peer = accept_streaming(&mut h).await;

    h.session.send_audio(&[9, 8, 7]).unwrap();
    assert_eq!(
        recv(&mut peer).await,
        WireMessage::Binary(Bytes::from_static(&[9, 8, 7]))
    );

    assert!(peer.send(WireMessage::Binary(Bytes::from_static(&[4, 5]))));
    assert_eq!(
        next_traffic(&mut h.events).await,
        SessionEvent::Audio(Bytes::from_static(&[4, 5]))
    );

    h.session.close().await;
}

/// Test control messages are forwarded and the hello is not
#[tokio::test]
async fn test_control_routing() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V3)), fast_reconnect(3));
    h.session.open().await.unwrap();
    let mut peer = accept_streaming(&mut h).await;

    // Duplicate hello is swallowed
    assert!(peer.send_text(r#"{"type":"hello"}"#));
    assert!(peer.send_text(r#"{"type":"tts","state":"start"}"#));

    let SessionEvent::Control(message) = next_traffic(&mut h.events).await else {
        panic!("expected control message");
    };
    assert_eq!(message.msg_type(), Some("tts"));
    assert_eq!(message.get("state"), Some(&json!("start")));

    // Outbound control is written verbatim
    let listen = ControlMessage::new("listen").with("state", "start");
    h.session.send_control(&listen).unwrap();
    let sent = recv(&mut peer).await;
    assert_eq!(ControlMessage::parse(sent.as_text().unwrap()).unwrap(), listen);

    // Non-object text is dropped without disturbing the session
    assert!(peer.send_text("[1,2,3]"));
    assert!(peer.send_text(r#"{"type":"stt","text":"hi"}"#));
    let SessionEvent::Control(message) = next_traffic(&mut h.events).await else {
        panic!("expected control message");
    };
    assert_eq!(message.msg_type(), Some("stt"));

    let stats = h.session.stats();
    assert_eq!(stats.control_received, 2);
    assert_eq!(stats.control_sent, 1);
    assert_eq!(stats.messages_dropped, 1);
    assert_eq!(h.session.state(), SessionState::Streaming);

    h.session.close().await;
}

/// Test a malformed frame is dropped and the next one still decodes
#[tokio::test]
async fn test_truncated_frame_dropped() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V3)), fast_reconnect(3));
    h.session.open().await.unwrap();
    let peer = accept_streaming(&mut h).await;

    assert!(peer.send(WireMessage::Binary(Bytes::from_static(&hex!("01 00 00 05 AA")))));
    assert!(peer.send(WireMessage::Binary(Bytes::from_static(&hex!("01 00 00 02 AA BB")))));
    // Padding after the declared payload is ignored
    assert!(peer.send(WireMessage::Binary(Bytes::from_static(&hex!("01 00 00 01 CC 00 00")))));

    assert!(matches!(
        next_traffic(&mut h.events).await,
        SessionEvent::FrameDropped(FrameError::Truncated { .. })
    ));
    assert_eq!(
        next_traffic(&mut h.events).await,
        SessionEvent::Audio(Bytes::from_static(&hex!("AA BB")))
    );
    assert_eq!(
        next_traffic(&mut h.events).await,
        SessionEvent::Audio(Bytes::from_static(&hex!("CC")))
    );

    let stats = h.session.stats();
    assert_eq!(stats.frames_dropped, 1);
    assert_eq!(stats.audio_received, 2);
    assert_eq!(h.session.state(), SessionState::Streaming);

    h.session.close().await;
}

/// Test transport loss triggers renegotiation and a fresh hello
#[tokio::test]
async fn test_reconnect_after_transport_loss() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V2)), fast_reconnect(3));
    h.session.open().await.unwrap();
    let peer = accept_streaming(&mut h).await;
    assert_eq!(h.negotiator.calls(), 1);

    assert!(peer.fail(TransportError::Io("connection reset".to_string())));
    reach(&mut h.events, SessionState::Reconnecting).await;
    assert_eq!(
        h.session.send_audio(&[1]),
        Err(SendError::NotReady(SessionState::Reconnecting))
    );

    // New connection, new hello
    let _peer = accept_streaming(&mut h).await;
    assert_eq!(h.negotiator.calls(), 2);
    assert_eq!(h.connector.connect_count(), 2);
    assert_eq!(h.session.stats().reconnects, 1);

    h.session.close().await;
    assert_eq!(h.session.state(), SessionState::Closed);
}

/// Test a reconnect uses the parameters from the new provisioning round
#[tokio::test]
async fn test_reconnect_uses_fresh_parameters() {
    let negotiator = ScriptedNegotiator::sequence(vec![
        ConnectionParameters::new("memory://ep0", ProtocolVersion::V2).with_credential("tok0"),
        ConnectionParameters::new("memory://ep1", ProtocolVersion::V3).with_credential("tok1"),
    ]);
    let mut h = harness(negotiator, fast_reconnect(3));
    h.session.open().await.unwrap();
    let peer = accept_streaming(&mut h).await;
    assert_eq!(h.session.protocol_version(), Some(ProtocolVersion::V2));

    drop(peer);
    reach(&mut h.events, SessionState::Reconnecting).await;
    let mut peer = accept_streaming(&mut h).await;

    let requests = h.connector.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, "memory://ep0");
    assert_eq!(requests[1].url, "memory://ep1");
    assert_eq!(requests[1].header("Authorization"), Some("Bearer tok1"));
    assert_eq!(requests[1].header("Protocol-Version"), Some("3"));
    assert_eq!(h.session.protocol_version(), Some(ProtocolVersion::V3));

    // Frames switch to the new version
    h.session.send_audio(&[9, 8]).unwrap();
    let frame = recv(&mut peer).await;
    assert_eq!(&frame.as_binary().unwrap()[..], &hex!("01 00 0002 09 08"));

    h.session.close().await;
}

/// Test state callbacks form one unbroken chain when close races a reconnect
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_state_callbacks_follow_transition_order() {
    for _ in 0..20 {
        let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V1)), fast_reconnect(3));
        h.session.open().await.unwrap();
        let peer = accept_streaming(&mut h).await;

        let fail = tokio::spawn(async move {
            let _ = peer.fail(TransportError::Io("connection reset".to_string()));
        });
        timeout(WAIT, h.session.close()).await.expect("Close timed out");
        fail.await.unwrap();

        let mut current = SessionState::Idle;
        while let Ok(event) = h.events.try_recv() {
            if let SessionEvent::StateChanged { from, to } = event {
                assert_eq!(from, current, "{from} -> {to} after {current}");
                current = to;
            }
        }
        assert_eq!(current, SessionState::Closed);
        assert_eq!(h.session.state(), SessionState::Closed);
    }
}

/// Test a peer that goes away is treated like a transport error
#[tokio::test]
async fn test_reconnect_after_peer_drop() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V1)), fast_reconnect(0));
    h.session.open().await.unwrap();
    let peer = accept_streaming(&mut h).await;

    drop(peer);
    reach(&mut h.events, SessionState::Reconnecting).await;
    let _peer = accept_streaming(&mut h).await;

    h.session.close().await;
}

/// Test refused connects are retried with backoff
#[tokio::test]
async fn test_refused_connect_retried() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V1)), fast_reconnect(5));
    h.connector.refuse_next(2);

    h.session.open().await.unwrap();
    let _peer = accept_streaming(&mut h).await;

    assert_eq!(h.connector.connect_count(), 3);
    assert_eq!(h.negotiator.calls(), 3);
    assert_eq!(h.session.stats().reconnects, 2);

    h.session.close().await;
}

/// Test the session closes once reconnect attempts run out
#[tokio::test]
async fn test_reconnect_exhausted_closes() {
    let negotiator = ScriptedNegotiator::failing_from(params(ProtocolVersion::V1), 1);
    let mut h = harness(negotiator, fast_reconnect(2));
    h.session.open().await.unwrap();
    let peer = accept_streaming(&mut h).await;

    assert!(peer.fail(TransportError::Closed("server restart".to_string())));
    assert!(h.session.wait_for(SessionState::Closed, WAIT).await);

    // First call succeeded, then two failed retries
    assert_eq!(h.negotiator.calls(), 3);
    assert_eq!(h.session.stats().reconnects, 2);

    // close() after the fact is harmless
    h.session.close().await;
    assert_eq!(h.session.state(), SessionState::Closed);
}

/// Test disabled reconnect closes on the first transport loss
#[tokio::test]
async fn test_reconnect_disabled_closes() {
    let mut h = harness(
        ScriptedNegotiator::new(params(ProtocolVersion::V1)),
        ReconnectConfig::disabled(),
    );
    h.session.open().await.unwrap();
    let peer = accept_streaming(&mut h).await;

    assert!(peer.fail(TransportError::Io("reset".to_string())));
    assert!(h.session.wait_for(SessionState::Closed, WAIT).await);
    assert_eq!(h.negotiator.calls(), 1);
}

/// Test close mid-stream releases the transport and never reconnects
#[tokio::test]
async fn test_close_releases_transport() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V3)), fast_reconnect(3));
    h.session.open().await.unwrap();
    let mut peer = accept_streaming(&mut h).await;

    h.session.close().await;
    assert_eq!(h.session.state(), SessionState::Closed);

    // Client side of the connection is gone
    let end = timeout(WAIT, peer.recv()).await.expect("Receive timed out");
    assert!(end.is_none());

    assert_eq!(
        h.session.send_audio(&[1]),
        Err(SendError::NotReady(SessionState::Closed))
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.connector.connect_count(), 1);
    assert_eq!(h.negotiator.calls(), 1);
}

/// Test a closed session can be opened again
#[tokio::test]
async fn test_reopen_after_close() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V2)), fast_reconnect(3));
    h.session.open().await.unwrap();
    let _first = accept_streaming(&mut h).await;
    h.session.close().await;

    h.session.open().await.unwrap();
    let _second = accept_streaming(&mut h).await;
    assert_eq!(h.negotiator.calls(), 2);

    h.session.close().await;
}

/// Test open is rejected while a session is already running
#[tokio::test]
async fn test_open_twice_rejected() {
    let mut h = harness(ScriptedNegotiator::new(params(ProtocolVersion::V2)), fast_reconnect(3));
    h.session.open().await.unwrap();
    let _peer = accept_streaming(&mut h).await;

    let err = h.session.open().await.unwrap_err();
    assert!(matches!(err, LinkError::State(_)));
    assert_eq!(h.session.state(), SessionState::Streaming);

    h.session.close().await;
}

/// Connector whose connections accept the hello and one frame, then stall
struct StallingConnector;

#[async_trait]
impl Connector for StallingConnector {
    async fn connect(&self, _request: &ConnectRequest) -> Result<Connection, TransportError> {
        let sink = futures::sink::unfold(0u32, |written, _message: WireMessage| async move {
            if written >= 2 {
                futures::future::pending::<()>().await;
            }
            Ok::<_, TransportError>(written + 1)
        });
        let stream = futures::stream::iter(vec![Ok(WireMessage::Text(
            r#"{"type":"hello"}"#.to_string(),
        ))])
        .chain(futures::stream::pending());

        Ok(Connection::new(Box::pin(sink), stream.boxed()))
    }

    fn name(&self) -> &'static str {
        "stalling"
    }
}

/// Test a full outbound queue rejects audio instead of blocking
#[tokio::test]
async fn test_backpressure() {
    let session = Session::builder(
        identity(),
        ScriptedNegotiator::new(params(ProtocolVersion::V3)),
    )
    .connector(Arc::new(StallingConnector))
    .options(SessionConfig {
        outbound_queue: 1,
        ..SessionConfig::default()
    })
    .build();

    session.open().await.unwrap();
    assert!(session.wait_for(SessionState::Streaming, WAIT).await);

    let mut rejected = false;
    for _ in 0..10 {
        match session.send_audio(&[0; 32]) {
            Ok(()) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(SendError::Backpressure) => {
                rejected = true;
                break;
            },
            Err(other) => panic!("unexpected send error: {other}"),
        }
    }
    assert!(rejected);
    assert!(session.stats().frames_dropped >= 1);

    // Close still completes with the transport stalled
    timeout(WAIT, session.close()).await.expect("Close timed out");
    assert_eq!(session.state(), SessionState::Closed);
}

/// Connector whose connections accept the hello, then fail the next write
/// once the gate opens
struct FailingWriteConnector {
    gate: Arc<Notify>,
}

#[async_trait]
impl Connector for FailingWriteConnector {
    async fn connect(&self, _request: &ConnectRequest) -> Result<Connection, TransportError> {
        let gate = Arc::clone(&self.gate);
        let sink = futures::sink::unfold(0u32, move |written, _message: WireMessage| {
            let gate = Arc::clone(&gate);
            async move {
                if written >= 1 {
                    gate.notified().await;
                    return Err(TransportError::Io("broken pipe".to_string()));
                }
                Ok(written + 1)
            }
        });
        let stream = futures::stream::iter(vec![Ok(WireMessage::Text(
            r#"{"type":"hello"}"#.to_string(),
        ))])
        .chain(futures::stream::pending());

        Ok(Connection::new(Box::pin(sink), stream.boxed()))
    }

    fn name(&self) -> &'static str {
        "failing-write"
    }
}

/// Test audio still queued when the transport fails is counted as dropped
#[tokio::test]
async fn test_queued_audio_counted_on_transport_loss() {
    let gate = Arc::new(Notify::new());
    let session = Session::builder(
        identity(),
        ScriptedNegotiator::new(params(ProtocolVersion::V3)),
    )
    .connector(Arc::new(FailingWriteConnector {
        gate: Arc::clone(&gate),
    }))
    .reconnect(ReconnectConfig::disabled())
    .options(SessionConfig {
        outbound_queue: 8,
        ..SessionConfig::default()
    })
    .build();

    session.open().await.unwrap();
    assert!(session.wait_for(SessionState::Streaming, WAIT).await);

    for _ in 0..3 {
        session.send_audio(&[0; 16]).unwrap();
    }
    gate.notify_one();

    assert!(session.wait_for(SessionState::Closed, WAIT).await);
    let stats = session.stats();
    assert_eq!(stats.audio_sent, 0);
    assert_eq!(stats.frames_dropped, 3);
}

/// Test close interrupts a connect that never completes
#[tokio::test]
async fn test_close_during_connect() {
    struct HangingConnector;

    #[async_trait]
    impl Connector for HangingConnector {
        async fn connect(&self, _request: &ConnectRequest) -> Result<Connection, TransportError> {
            futures::future::pending().await
        }

        fn name(&self) -> &'static str {
            "hanging"
        }
    }

    let session = Session::builder(
        identity(),
        ScriptedNegotiator::new(params(ProtocolVersion::V1)),
    )
    .connector(Arc::new(HangingConnector))
    .build();

    session.open().await.unwrap();
    assert_eq!(session.state(), SessionState::Handshaking);

    timeout(WAIT, session.close()).await.expect("Close timed out");
    assert_eq!(session.state(), SessionState::Closed);
}

/// Test close() while provisioning is still in flight
#[tokio::test]
async fn test_close_during_negotiation() {
    struct StalledNegotiator {
        started: Notify,
    }

    #[async_trait]
    impl Negotiator for StalledNegotiator {
        async fn negotiate(
            &self,
            _identity: &DeviceIdentity,
        ) -> Result<ConnectionParameters, HandshakeError> {
            self.started.notify_one();
            futures::future::pending().await
        }
    }

    let negotiator = Arc::new(StalledNegotiator {
        started: Notify::new(),
    });
    let (connector, _listener) = MemoryConnector::pair();
    let session = Session::builder(identity(), negotiator.clone())
        .connector(Arc::new(connector.clone()))
        .build();

    let (opened, ()) = timeout(WAIT, async {
        tokio::join!(session.open(), async {
            negotiator.started.notified().await;
            session.close().await;
        })
    })
    .await
    .expect("Open did not return after close");

    assert!(matches!(opened, Err(LinkError::Closed)));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(connector.connect_count(), 0);
}
