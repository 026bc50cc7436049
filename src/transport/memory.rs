//! In-process connector.
//!
//! Each [`MemoryConnector::connect`] hands a [`MemoryPeer`] to the paired
//! [`MemoryListener`], which plays the server side. Used to drive sessions
//! without sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};

use super::{ConnectRequest, Connection, Connector, TransportError, WireMessage};

/// Client-side connector
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refusals: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ConnectRequest>>>,
}

/// Server side: yields one peer per accepted connection
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Server end of one in-process connection
#[derive(Debug)]
pub struct MemoryPeer {
    request: ConnectRequest,
    from_client: mpsc::UnboundedReceiver<WireMessage>,
    to_client: mpsc::UnboundedSender<Result<WireMessage, TransportError>>,
}

impl MemoryConnector {
    /// Create a connector and its listener
    pub fn pair() -> (Self, MemoryListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded();
        let connector = Self {
            accept_tx,
            refusals: Arc::new(AtomicUsize::new(0)),
            connects: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        (connector, MemoryListener { accept_rx })
    }

    /// Refuse the next `count` connection attempts
    pub fn refuse_next(&self, count: usize) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    /// Connection attempts so far, refused ones included
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Requests seen so far, in order
    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (client_tx, from_client) = mpsc::unbounded();
        let (to_client, client_rx) = mpsc::unbounded();

        let peer = MemoryPeer {
            request: request.clone(),
            from_client,
            to_client,
        };
        self.accept_tx
            .unbounded_send(peer)
            .map_err(|_| TransportError::Connect("listener dropped".to_string()))?;

        let sink = client_tx.sink_map_err(|_| TransportError::Closed("peer dropped".to_string()));
        Ok(Connection::new(Box::pin(sink), client_rx.boxed()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl MemoryListener {
    /// Wait for the next connection
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.next().await
    }
}

impl MemoryPeer {
    /// Request the client connected with
    pub fn request(&self) -> &ConnectRequest {
        &self.request
    }

    /// Next message from the client; `None` once the client side is gone
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.from_client.next().await
    }

    /// Send a message to the client. Returns false if the client is gone.
    pub fn send(&self, message: WireMessage) -> bool {
        self.to_client.unbounded_send(Ok(message)).is_ok()
    }

    /// Send a text message to the client
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(WireMessage::Text(text.into()))
    }

    /// Deliver a transport error to the client
    pub fn fail(&self, error: TransportError) -> bool {
        self.to_client.unbounded_send(Err(error)).is_ok()
    }
}
