//! Wire protocol — cursor updates in, full presence snapshots out.
//!
//! DESIGN
//! ======
//! Both directions carry JSON text. Clients send a bare `{"x": .., "y": ..}`
//! object on every pointer move. The server answers every state change with
//! the complete session map keyed by session id, identical for every
//! recipient. There is no delta encoding and no request/response correlation.
//!
//! Inbound parsing is strict: a payload either becomes a fully-populated
//! `CursorPosition` or a `PayloadError`, never a partial value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// CLOSE CODES
// =============================================================================

/// Application close code sent when the join request is rejected.
pub const CLOSE_INVALID_JOIN: u16 = 4000;

/// Standard "going away" close code sent when the server shuts down.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Standard "internal error" close code for a join that failed server-side.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Query parameter carrying the participant's display name.
pub const USERNAME_PARAM: &str = "username";

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error codes for log lines.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// TYPES
// =============================================================================

/// Pointer position reported by a client.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

impl CursorPosition {
    /// Position assigned to a session when it joins.
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One participant as seen by every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    #[serde(rename = "username")]
    pub display_name: String,
    pub cursor: CursorPosition,
}

/// Full presence state at one instant, keyed by session id.
///
/// Ordered so that identical state always encodes to identical bytes.
pub type Snapshot = BTreeMap<Uuid, SessionView>;

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed cursor payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("cursor payload is not valid utf-8")]
    NotUtf8,
}

impl ErrorCode for PayloadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_MALFORMED_PAYLOAD",
            Self::NotUtf8 => "E_PAYLOAD_NOT_UTF8",
        }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Parse an inbound text payload into a cursor position.
///
/// # Errors
///
/// Returns `PayloadError::Malformed` if the text is not a JSON object with
/// numeric `x` and `y` fields.
pub fn parse_cursor(text: &str) -> Result<CursorPosition, PayloadError> {
    Ok(serde_json::from_str(text)?)
}

/// Parse an inbound binary payload carrying UTF-8 JSON.
///
/// # Errors
///
/// Returns `PayloadError::NotUtf8` for non-UTF-8 bytes, otherwise the same
/// errors as [`parse_cursor`].
pub fn parse_cursor_bytes(bytes: &[u8]) -> Result<CursorPosition, PayloadError> {
    let text = std::str::from_utf8(bytes).map_err(|_| PayloadError::NotUtf8)?;
    parse_cursor(text)
}

/// Encode a snapshot as the outbound JSON payload.
///
/// # Errors
///
/// Returns a serde error if serialization fails.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(snapshot)
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
