//! WebSocket connector.

use std::time::Duration;

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};

use super::{ConnectRequest, Connection, Connector, TransportError, WireMessage};

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::Closed(err.to_string())
            },
            other => TransportError::Io(other.to_string()),
        }
    }
}

impl From<WireMessage> for Message {
    fn from(message: WireMessage) -> Self {
        match message {
            WireMessage::Text(text) => Message::Text(text.into()),
            WireMessage::Binary(bytes) => Message::Binary(bytes),
        }
    }
}

/// Map an inbound frame. Ping and pong are answered by tungstenite and
/// never surface.
fn inbound(
    message: Result<Message, tungstenite::Error>,
) -> Option<Result<WireMessage, TransportError>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(WireMessage::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(bytes)) => Some(Ok(WireMessage::Binary(bytes))),
        Ok(Message::Close(frame)) => {
            let reason = frame
                .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                .unwrap_or_else(|| "close frame".to_string());
            Some(Err(TransportError::Closed(reason)))
        },
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(err) => Some(Err(err.into())),
    }
}

/// Connector over WebSocket (`ws://` and `wss://`)
#[derive(Debug, Clone)]
pub struct WsConnector {
    timeout: Duration,
}

impl WsConnector {
    /// Create a connector with the given connect timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection, TransportError> {
        let mut ws_request = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {e}", request.url)))?;

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
            ws_request.headers_mut().insert(name, value);
        }

        tracing::debug!(url = %request.url, "Opening WebSocket");

        let (ws_stream, _response) =
            tokio::time::timeout(self.timeout, tokio_tungstenite::connect_async(ws_request))
                .await
                .map_err(|_| TransportError::Timeout(self.timeout))?
                .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();

        let sink = write.sink_map_err(TransportError::from).with(|message: WireMessage| {
            future::ready(Ok::<_, TransportError>(Message::from(message)))
        });
        let stream = read.filter_map(|message| future::ready(inbound(message)));

        Ok(Connection::new(Box::pin(sink), stream.boxed()))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}
