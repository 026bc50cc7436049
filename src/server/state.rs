//! Server state and connection tracking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

use super::config::ServerConfig;
use crate::codec::ProtocolVersion;

/// Application state shared across handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Streaming URL handed out by provisioning
    pub ws_url: String,
    /// Open streaming connections
    pub connections: ConnectionRegistry,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServerConfig, ws_url: String) -> Self {
        Self {
            config,
            ws_url,
            connections: ConnectionRegistry::new(),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// One streaming connection that completed the hello exchange
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    /// Server-assigned session id
    pub session_id: String,
    /// Device that connected
    pub device_id: String,
    /// Framing in use
    pub protocol_version: ProtocolVersion,
    /// Audio frames echoed so far
    pub frames_echoed: u64,
    /// Seconds since the hello
    pub age_secs: u64,
}

struct ConnectionEntry {
    device_id: String,
    protocol_version: ProtocolVersion,
    frames_echoed: u64,
    opened_at: Instant,
}

/// Tracks open connections by session id
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, ConnectionEntry>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection after its hello
    pub async fn register(&self, session_id: &str, device_id: &str, version: ProtocolVersion) {
        let entry = ConnectionEntry {
            device_id: device_id.to_string(),
            protocol_version: version,
            frames_echoed: 0,
            opened_at: Instant::now(),
        };
        self.connections
            .write()
            .await
            .insert(session_id.to_string(), entry);
    }

    /// Count an echoed frame
    pub async fn record_echo(&self, session_id: &str) {
        if let Some(entry) = self.connections.write().await.get_mut(session_id) {
            entry.frames_echoed += 1;
        }
    }

    /// Forget a connection
    pub async fn remove(&self, session_id: &str) {
        self.connections.write().await.remove(session_id);
    }

    /// Number of open connections
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Snapshot of open connections
    pub async fn list(&self) -> Vec<ConnectionInfo> {
        let mut list: Vec<ConnectionInfo> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, entry)| ConnectionInfo {
                session_id: id.clone(),
                device_id: entry.device_id.clone(),
                protocol_version: entry.protocol_version,
                frames_echoed: entry.frames_echoed,
                age_secs: entry.opened_at.elapsed().as_secs(),
            })
            .collect();
        list.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        list
    }
}
