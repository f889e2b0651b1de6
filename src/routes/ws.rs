//! WebSocket handler — join validation and per-connection relay.
//!
//! DESIGN
//! ======
//! The display name is validated before the session exists: the socket is
//! upgraded and then immediately closed with code 4000 when the `username`
//! query parameter is missing, repeated or too long. Nothing is read from a
//! rejected socket.
//!
//! An accepted connection joins the hub and enters a `select!` loop:
//! - Incoming client text → parse as cursor position → hub update
//! - Outbound queue payloads (snapshots) → forward to client
//!
//! Malformed payloads are logged and dropped; the connection stays open.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → validate name → `hub.join` (session + channel, broadcast)
//! 2. Cursor messages → `hub.move_cursor` (broadcast)
//! 3. Client close / EOF / transport error → `guard.leave` (broadcast)
//! 4. Hub closed by shutdown → outbound queue ends → close frame 1001 → leave

use axum::extract::rejection::QueryRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{
    self, CLOSE_GOING_AWAY, CLOSE_INTERNAL_ERROR, CLOSE_INVALID_JOIN, ErrorCode, PayloadError, USERNAME_PARAM,
};
use crate::services::hub::{Hub, HubError};
use crate::services::registry::RegistryError;
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

/// Why a connection was refused before a session was created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("username parameter missing")]
    MissingUsername,
    #[error("username parameter supplied {0} times")]
    DuplicateUsername(usize),
    #[error("username longer than {max} characters")]
    UsernameTooLong { max: usize },
    #[error("malformed query string")]
    MalformedQuery,
    #[error("server is shutting down")]
    ShuttingDown,
    #[error("session could not be created")]
    SessionUnavailable,
}

impl JoinError {
    #[must_use]
    pub fn close_code(&self) -> u16 {
        match self {
            Self::ShuttingDown => CLOSE_GOING_AWAY,
            Self::SessionUnavailable => CLOSE_INTERNAL_ERROR,
            _ => CLOSE_INVALID_JOIN,
        }
    }

    #[must_use]
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::ShuttingDown => "Server shutting down",
            Self::SessionUnavailable => "Session could not be created",
            _ => "Invalid username provided",
        }
    }
}

impl ErrorCode for JoinError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingUsername => "E_USERNAME_MISSING",
            Self::DuplicateUsername(_) => "E_USERNAME_DUPLICATE",
            Self::UsernameTooLong { .. } => "E_USERNAME_TOO_LONG",
            Self::MalformedQuery => "E_MALFORMED_QUERY",
            Self::ShuttingDown => "E_SHUTTING_DOWN",
            Self::SessionUnavailable => "E_SESSION_UNAVAILABLE",
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum InboundError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(ws) = ws else {
        return super::LIVENESS_TEXT.into_response();
    };

    let username = query
        .map_err(|_| JoinError::MalformedQuery)
        .and_then(|Query(params)| validate_username(&params, state.config.max_username_len));

    match username {
        Ok(name) => ws.on_upgrade(move |socket| run_ws(socket, state, name)),
        Err(err) => {
            warn!(code = err.error_code(), error = %err, "ws: join rejected");
            ws.on_upgrade(move |socket| reject(socket, err))
        }
    }
}

/// Extract the single `username` value from the query parameters.
///
/// # Errors
///
/// Returns `JoinError` if the parameter is absent, repeated, or longer than
/// `max_len` characters.
pub fn validate_username(params: &[(String, String)], max_len: usize) -> Result<String, JoinError> {
    let mut names = params
        .iter()
        .filter(|(key, _)| key == USERNAME_PARAM)
        .map(|(_, value)| value);

    let Some(name) = names.next() else {
        return Err(JoinError::MissingUsername);
    };
    let extra = names.count();
    if extra > 0 {
        return Err(JoinError::DuplicateUsername(extra + 1));
    }
    if name.chars().count() > max_len {
        return Err(JoinError::UsernameTooLong { max: max_len });
    }
    Ok(name.clone())
}

async fn reject(mut socket: WebSocket, err: JoinError) {
    send_close(&mut socket, &err).await;
}

async fn send_close(socket: &mut WebSocket, err: &JoinError) {
    let frame = CloseFrame { code: err.close_code(), reason: Utf8Bytes::from(err.close_reason()) };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!(code = err.close_code(), error = %e, "ws: failed to send close frame");
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, username: String) {
    // Per-connection queue for snapshots fanned out by the broadcast engine.
    let (client_tx, mut client_rx) = mpsc::channel::<Utf8Bytes>(state.config.outbound_queue_capacity);

    let guard = match state.hub.join(&username, client_tx).await {
        Ok(guard) => guard,
        Err(e) => {
            let err = match &e {
                HubError::Closed => JoinError::ShuttingDown,
                HubError::Registry(_) => JoinError::SessionUnavailable,
            };
            warn!(code = e.error_code(), error = %e, "ws: join failed");
            reject(socket, err).await;
            return;
        }
    };
    let session_id = guard.session_id();

    info!(%session_id, %username, "ws: client connected");

    let mut hub_closed = false;
    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let result = process_inbound_text(&state.hub, session_id, text.as_str()).await;
                        report_inbound(session_id, result);
                    }
                    Message::Binary(bytes) => {
                        let result = process_inbound_bytes(&state.hub, session_id, &bytes).await;
                        report_inbound(session_id, result);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            payload = client_rx.recv() => {
                let Some(payload) = payload else {
                    hub_closed = true;
                    break;
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
        }
    }

    if hub_closed {
        send_close(&mut socket, &JoinError::ShuttingDown).await;
    }

    guard.leave().await;
    info!(%session_id, %username, "ws: client disconnected");
}

// =============================================================================
// INBOUND
// =============================================================================

/// Parse one text payload and apply it to the session's cursor.
async fn process_inbound_text(hub: &Hub, session_id: Uuid, text: &str) -> Result<(), InboundError> {
    let position = protocol::parse_cursor(text)?;
    hub.move_cursor(session_id, position).await?;
    Ok(())
}

/// Same as [`process_inbound_text`] for binary frames carrying UTF-8 JSON.
async fn process_inbound_bytes(hub: &Hub, session_id: Uuid, bytes: &[u8]) -> Result<(), InboundError> {
    let position = protocol::parse_cursor_bytes(bytes)?;
    hub.move_cursor(session_id, position).await?;
    Ok(())
}

fn report_inbound(session_id: Uuid, result: Result<(), InboundError>) {
    match result {
        Ok(()) => {}
        Err(InboundError::Payload(e)) => {
            warn!(%session_id, code = e.error_code(), error = %e, "ws: dropped inbound payload");
        }
        Err(InboundError::Registry(e)) => {
            debug!(%session_id, code = e.error_code(), error = %e, "ws: update for departed session ignored");
        }
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
