//! Loopback cloud endpoint.
//!
//! A minimal in-process counterpart to the device side, used by the CLI and
//! the end-to-end tests:
//! - `POST /ota/` hands out connection parameters
//! - `GET /ws` accepts the streaming connection, answers the hello, echoes
//!   audio frames and control messages
//! - `GET /health`, `GET /status`
//!
//! # Example
//!
//! ```rust,ignore
//! use voxlink::server::{self, ServerConfig};
//!
//! let config = ServerConfig::default().with_port(8002);
//! let listener = server::bind(&config).await?;
//! server::serve(listener, config).await?;
//! ```

mod config;
mod handlers;
mod state;

pub use config::ServerConfig;
pub use handlers::{create_router, health_check};
pub use state::{AppState, ConnectionInfo, ConnectionRegistry};

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::{LinkError, Result};

/// Bind the configured address
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    TcpListener::bind(config.addr)
        .await
        .map_err(|e| LinkError::Server(format!("Failed to bind {}: {e}", config.addr)))
}

/// Serve on an already-bound listener until the future is dropped
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let local_addr = listener.local_addr()?;
    let ws_url = config
        .public_url
        .clone()
        .unwrap_or_else(|| format!("ws://{local_addr}/ws"));

    tracing::info!("Loopback server listening on {}", local_addr);
    tracing::info!("Provisioning: http://{}/ota/", local_addr);
    tracing::info!("Streaming: {} (protocol v{})", ws_url, config.protocol_version);

    let state = Arc::new(AppState::new(config, ws_url));
    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| LinkError::Server(format!("Server error: {e}")))
}
