//! Connection channel set — outbound delivery handles keyed by session id.
//!
//! DESIGN
//! ======
//! Each connection task owns the receiving half of a bounded queue; the set
//! holds the sending half. Delivery is a non-blocking `try_send`, so fan-out
//! never waits on a slow socket and never holds a lock across network I/O.
//! The actual socket write happens in the connection task.
//!
//! ERROR HANDLING
//! ==============
//! A failed delivery is reported per channel and never stops the loop. The
//! set does not tear anything down itself: a closed channel means its
//! connection task is already exiting and will remove its own session.

use std::collections::HashMap;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;
use uuid::Uuid;

use crate::protocol::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

/// Sending half of a connection's outbound queue.
pub type Outbound = mpsc::Sender<Utf8Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    Full,
    #[error("connection channel closed")]
    Closed,
}

impl ErrorCode for DeliveryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Full => "E_DELIVERY_QUEUE_FULL",
            Self::Closed => "E_DELIVERY_CHANNEL_CLOSED",
        }
    }
}

impl<T> From<TrySendError<T>> for DeliveryError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => Self::Full,
            TrySendError::Closed(_) => Self::Closed,
        }
    }
}

/// One channel that did not accept a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub session_id: Uuid,
    pub error: DeliveryError,
}

// =============================================================================
// CHANNEL SET
// =============================================================================

#[derive(Debug, Default)]
pub struct ChannelSet {
    channels: HashMap<Uuid, Outbound>,
}

impl ChannelSet {
    #[cfg(test)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an outbound handle to a session id. Returns `false` and keeps the
    /// existing handle if the id is already registered.
    pub fn register(&mut self, id: Uuid, channel: Outbound) -> bool {
        if self.channels.contains_key(&id) {
            warn!(session_id = %id, "channels: duplicate registration ignored");
            return false;
        }
        self.channels.insert(id, channel);
        true
    }

    /// Drop the handle for a session id. Unregistering an absent id is a no-op.
    pub fn unregister(&mut self, id: Uuid) -> bool {
        self.channels.remove(&id).is_some()
    }

    /// Drop every handle, returning how many were registered. Each connection
    /// task observes its queue closing.
    pub fn clear(&mut self) -> usize {
        let count = self.channels.len();
        self.channels.clear();
        count
    }

    /// Run `deliver` against every channel. Failures are collected and the
    /// loop always visits every channel.
    pub fn for_each<F>(&self, mut deliver: F) -> Vec<DeliveryFailure>
    where
        F: FnMut(Uuid, &Outbound) -> Result<(), DeliveryError>,
    {
        let mut failures = Vec::new();
        for (session_id, channel) in &self.channels {
            if let Err(error) = deliver(*session_id, channel) {
                failures.push(DeliveryFailure { session_id: *session_id, error });
            }
        }
        failures
    }

    /// Enqueue the same payload on every channel.
    pub fn send_to_all(&self, payload: &Utf8Bytes) -> Vec<DeliveryFailure> {
        self.for_each(|_, channel| channel.try_send(payload.clone()).map_err(DeliveryError::from))
    }

    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.channels.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
#[path = "channels_test.rs"]
mod tests;
