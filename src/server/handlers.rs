//! HTTP and WebSocket handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Json, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use super::state::{AppState, ConnectionInfo};
use crate::codec::{FrameCodec, ProtocolVersion};
use crate::protocol::{
    authorization_value, ControlMessage, HelloDescriptor, ServerHello, HEADER_AUTHORIZATION,
    HEADER_DEVICE_ID, HEADER_PROTOCOL_VERSION, TRANSPORT_WEBSOCKET,
};

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let logging = state.config.logging;
    let router = Router::new()
        // Health and status
        .route("/health", get(health_check))
        .route("/status", get(status))
        // Provisioning
        .route("/ota/", post(provision))
        // Streaming
        .route("/ws", get(stream))
        .with_state(state);

    if logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Status response
#[derive(Serialize)]
pub struct StatusResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Seconds since start
    pub uptime_secs: u64,
    /// Open streaming connections
    pub connections: Vec<ConnectionInfo>,
}

/// Status endpoint
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime().as_secs(),
        connections: state.connections.list().await,
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Provisioning endpoint: tells the device where to stream
async fn provision(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(device_id) = header(&headers, HEADER_DEVICE_ID) else {
        return error_response(StatusCode::BAD_REQUEST, "missing Device-Id header");
    };

    let application = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("application").cloned());
    tracing::info!(device_id, ?application, "Provisioning request");

    let mut websocket = json!({
        "url": state.ws_url,
        "version": state.config.protocol_version.as_u8(),
    });
    if let Some(token) = &state.config.token {
        websocket["token"] = json!(token);
    }

    let mut response = json!({
        "server_time": { "timestamp": chrono::Utc::now().timestamp_millis() },
        "websocket": websocket,
    });
    if let Some(code) = &state.config.activation_code {
        response["activation"] = json!({
            "code": code,
            "message": format!("Enter {code} to bind this device"),
        });
    }

    Json(response).into_response()
}

/// Streaming endpoint: validates connect headers, then upgrades
async fn stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(device_id) = header(&headers, HEADER_DEVICE_ID).map(str::to_string) else {
        return error_response(StatusCode::BAD_REQUEST, "missing Device-Id header");
    };

    if let Some(token) = &state.config.token {
        let expected = authorization_value(token);
        if header(&headers, HEADER_AUTHORIZATION) != Some(expected.as_str()) {
            tracing::warn!(device_id = %device_id, "Rejected connection with bad credential");
            return error_response(StatusCode::UNAUTHORIZED, "invalid credential");
        }
    }

    let version = match header(&headers, HEADER_PROTOCOL_VERSION) {
        None => ProtocolVersion::V1,
        Some(value) => match value.parse::<ProtocolVersion>() {
            Ok(version) => version,
            Err(err) => return error_response(StatusCode::BAD_REQUEST, &err),
        },
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, device_id, version))
}

/// Per-connection loop
async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    device_id: String,
    version: ProtocolVersion,
) {
    let codec = FrameCodec::new(version);
    let mut session_id: Option<String> = None;
    tracing::info!(device_id = %device_id, %version, "Device connected");

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(device_id = %device_id, error = %err, "Socket error");
                break;
            },
        };

        let reply = match message {
            Message::Text(text) => {
                on_text(&state, &device_id, version, &mut session_id, &text).await
            },
            Message::Binary(frame) => {
                on_binary(&state, codec, session_id.as_deref(), &frame).await
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => None,
        };

        if let Some(reply) = reply {
            if socket.send(reply).await.is_err() {
                break;
            }
        }
    }

    if let Some(id) = session_id {
        state.connections.remove(&id).await;
    }
    tracing::info!(device_id = %device_id, "Device disconnected");
}

async fn on_text(
    state: &AppState,
    device_id: &str,
    version: ProtocolVersion,
    session_id: &mut Option<String>,
    text: &str,
) -> Option<Message> {
    let control = match ControlMessage::parse(text) {
        Ok(control) => control,
        Err(err) => {
            tracing::warn!(device_id, error = %err, "Ignoring malformed control message");
            return None;
        },
    };

    if !control.is_hello() {
        let echo = ControlMessage::new("echo").with("message", control.into_value());
        return echo.to_json().ok().map(Message::Text);
    }

    let hello = match HelloDescriptor::from_control(&control) {
        Ok(hello) => hello,
        Err(err) => {
            let error = ControlMessage::new("error").with("message", err.to_string());
            return error.to_json().ok().map(Message::Text);
        },
    };
    if hello.protocol_version != version {
        tracing::warn!(
            device_id,
            header = %version,
            hello = %hello.protocol_version,
            "Hello version differs from connect header"
        );
    }

    let id = match session_id {
        Some(id) => id.clone(),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            state.connections.register(&id, device_id, version).await;
            *session_id = Some(id.clone());
            id
        },
    };

    let reply = ServerHello {
        session_id: Some(id),
        transport: Some(TRANSPORT_WEBSOCKET.to_string()),
        audio_params: Some(hello.audio_params),
    };
    reply.to_control().to_json().ok().map(Message::Text)
}

async fn on_binary(
    state: &AppState,
    codec: FrameCodec,
    session_id: Option<&str>,
    frame: &[u8],
) -> Option<Message> {
    let session_id = session_id?;
    if !state.config.echo_audio {
        return None;
    }

    let payload = match codec.decode(frame) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(session_id, error = %err, "Dropping malformed audio frame");
            return None;
        },
    };

    match codec.encode(payload) {
        Ok(echo) => {
            state.connections.record_echo(session_id).await;
            Some(Message::Binary(echo.to_vec()))
        },
        Err(err) => {
            tracing::warn!(session_id, error = %err, "Cannot re-frame audio");
            None
        },
    }
}
