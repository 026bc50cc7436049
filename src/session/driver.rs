//! Background task that owns the transport.
//!
//! One driver runs per opened session. It holds the only [`Connection`],
//! processes inbound messages one at a time, drains the outbound queue, and
//! runs the reconnect loop. Cancellation drops whatever is in flight.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::router::{MessageRouter, Route};
use super::{lock, Link, Shared};
use crate::codec::FrameCodec;
use crate::error::{LinkError, Result};
use crate::protocol::{Event, SessionState};
use crate::provision::ConnectionParameters;
use crate::transport::{ConnectRequest, Connection, TransportError, WireMessage};

/// Time allowed for a graceful close handshake
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub(super) async fn run(
    shared: Arc<Shared>,
    mut params: ConnectionParameters,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let established = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = establish(&shared, &params) => result,
        };

        let mut stranded = None;
        match established {
            Ok((connection, mut outbound_rx, router)) => {
                failures = 0;
                match pump(&shared, connection, &mut outbound_rx, router, &cancel).await {
                    Some(err) => tracing::warn!(error = %err, "Transport lost"),
                    None => return,
                }
                stranded = Some(outbound_rx);
            },
            // Close won the race against connect
            Err(LinkError::State(_)) => return,
            Err(err) => {
                tracing::warn!(url = %params.endpoint_url, error = %err, "Connect failed");
            },
        }

        if cancel.is_cancelled() || shared.transition(Event::TransportLost).is_err() {
            return;
        }
        if let Some(outbound_rx) = stranded {
            discard(&shared, outbound_rx);
        }

        match renegotiate(&shared, &cancel, &mut failures).await {
            Some(fresh) => {
                params = fresh;
                if shared.transition(Event::Renegotiated).is_err() {
                    return;
                }
            },
            None => {
                if !cancel.is_cancelled() {
                    shared.shut_down();
                }
                return;
            },
        }
    }
}

/// Connect, write the hello, and enter `AwaitingServerHello`
async fn establish(
    shared: &Shared,
    params: &ConnectionParameters,
) -> Result<(Connection, mpsc::Receiver<WireMessage>, MessageRouter)> {
    let request = ConnectRequest::new(params, &shared.identity);
    tracing::info!(
        url = %request.url,
        version = %params.protocol_version,
        connector = shared.connector.name(),
        "Connecting"
    );

    let mut connection =
        tokio::time::timeout(shared.connect_timeout, shared.connector.connect(&request))
            .await
            .map_err(|_| TransportError::Timeout(shared.connect_timeout))??;

    let hello = shared.hello.for_version(params.protocol_version).to_json()?;
    connection.sink.send(WireMessage::Text(hello)).await?;
    tracing::debug!("Client hello sent");

    let codec = FrameCodec::new(params.protocol_version);
    let (outbound, outbound_rx) = mpsc::channel(shared.outbound_queue);
    *lock(&shared.server_hello) = None;

    shared.transition(Event::Connected(Link {
        params: params.clone(),
        codec,
        outbound,
    }))?;

    Ok((connection, outbound_rx, MessageRouter::new(codec)))
}

/// Move messages until the transport fails (`Some`) or the session is
/// cancelled (`None`)
async fn pump(
    shared: &Shared,
    mut connection: Connection,
    outbound_rx: &mut mpsc::Receiver<WireMessage>,
    router: MessageRouter,
    cancel: &CancellationToken,
) -> Option<TransportError> {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                release(connection).await;
                return None;
            },
            outbound = outbound_rx.recv() => match outbound {
                Some(message) => {
                    let audio = matches!(message, WireMessage::Binary(_));
                    let sent = tokio::select! {
                        biased;
                        () = cancel.cancelled() => None,
                        result = connection.sink.send(message) => Some(result),
                    };
                    match sent {
                        None => {
                            release(connection).await;
                            return None;
                        },
                        Some(Err(err)) => {
                            if audio {
                                shared.counters.frame_dropped();
                            }
                            return Some(err);
                        },
                        Some(Ok(())) => {},
                    }
                    if audio {
                        shared.counters.audio_sent();
                    } else {
                        shared.counters.control_sent();
                    }
                },
                // Link dropped by close(); cancellation follows
                None => {
                    cancel.cancelled().await;
                    release(connection).await;
                    return None;
                },
            },
            inbound = connection.stream.next() => match inbound {
                Some(Ok(message)) => dispatch(shared, router.route(message)),
                Some(Err(err)) => return Some(err),
                None => return Some(TransportError::Closed("stream ended".to_string())),
            },
        }
    }
}

async fn release(mut connection: Connection) {
    if tokio::time::timeout(CLOSE_GRACE, connection.sink.close())
        .await
        .is_err()
    {
        tracing::debug!("Close handshake timed out");
    }
}

/// Drop what was still queued for a lost link. The link is already
/// unpublished, so nothing new can arrive.
fn discard(shared: &Shared, mut outbound_rx: mpsc::Receiver<WireMessage>) {
    outbound_rx.close();
    let mut discarded = 0usize;
    while let Ok(message) = outbound_rx.try_recv() {
        if matches!(message, WireMessage::Binary(_)) {
            shared.counters.frame_dropped();
        }
        discarded += 1;
    }
    if discarded > 0 {
        tracing::debug!(discarded, "Outbound queue discarded with lost link");
    }
}

fn dispatch(shared: &Shared, route: Route) {
    match route {
        Route::ServerHello(hello) => match shared.transition(Event::ServerHello) {
            Ok(transition) if transition.is_noop() => {
                tracing::debug!("Duplicate server hello ignored");
            },
            Ok(_) => {
                tracing::info!(session_id = ?hello.session_id, "Server hello received");
                *lock(&shared.server_hello) = Some(hello);
            },
            Err(_) => {},
        },
        Route::Control(message) => {
            tracing::debug!(msg_type = ?message.msg_type(), "Control message received");
            shared.counters.control_received();
            shared.handler.on_control(message);
        },
        Route::Audio(payload) => {
            if shared.state() == SessionState::Streaming {
                shared.counters.audio_received();
                shared.handler.on_audio(payload);
            } else {
                tracing::debug!(len = payload.len(), "Audio before server hello dropped");
                shared.counters.frame_dropped();
            }
        },
        Route::BadFrame(err) => {
            tracing::warn!(error = %err, "Dropping malformed audio frame");
            shared.counters.frame_dropped();
            shared.handler.on_frame_dropped(&err);
        },
        Route::BadControl(err) => {
            tracing::warn!(error = %err, "Dropping malformed control message");
            shared.counters.message_dropped();
        },
    }
}

/// Back off and provision again. `None` when cancelled or out of attempts.
async fn renegotiate(
    shared: &Shared,
    cancel: &CancellationToken,
    failures: &mut u32,
) -> Option<ConnectionParameters> {
    loop {
        if !shared.reconnect.should_retry(*failures) {
            if shared.reconnect.enabled {
                tracing::error!(attempts = *failures, "Reconnect attempts exhausted");
            } else {
                tracing::info!("Reconnect disabled, closing");
            }
            return None;
        }

        *failures += 1;
        let delay = shared.reconnect.calculate_delay(*failures);
        tracing::info!(attempt = *failures, delay_ms = delay.as_millis() as u64, "Reconnecting");
        shared.counters.reconnect();

        let negotiated = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            result = async {
                tokio::time::sleep(delay).await;
                shared.negotiator.negotiate(&shared.identity).await
            } => result,
        };

        match negotiated {
            Ok(params) => return Some(params),
            Err(err) => {
                tracing::warn!(attempt = *failures, error = %err, "Renegotiation failed");
            },
        }
    }
}
