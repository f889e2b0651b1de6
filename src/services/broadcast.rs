//! Broadcast engine — full-state fan-out on every presence change.
//!
//! DESIGN
//! ======
//! Registered on the hub as a `ChangeListener`, so it runs after every join,
//! cursor move and leave with the mutation already applied. Each run takes
//! a fresh snapshot, encodes it once, and enqueues the identical payload on
//! every channel, the originating session included. No diffing, batching or
//! coalescing.
//!
//! ERROR HANDLING
//! ==============
//! Delivery failures are logged and dropped. The next change re-sends full
//! state to whoever is still connected, so nothing is retried here.

use axum::extract::ws::Utf8Bytes;
use tracing::{debug, warn};

use crate::protocol::{self, ErrorCode};
use crate::services::channels::DeliveryFailure;
use crate::services::hub::{Change, ChangeListener, Presence};

/// Outcome of one fan-out.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Channels the payload was offered to.
    pub recipients: usize,
    pub failures: Vec<DeliveryFailure>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BroadcastEngine;

impl BroadcastEngine {
    /// Snapshot the registry, encode once, deliver to every channel.
    #[must_use]
    pub fn broadcast(&self, presence: &Presence) -> BroadcastReport {
        let snapshot = presence.registry.snapshot();
        let payload = match protocol::encode_snapshot(&snapshot) {
            Ok(json) => Utf8Bytes::from(json),
            Err(e) => {
                warn!(error = %e, "broadcast: failed to encode snapshot");
                return BroadcastReport::default();
            }
        };

        let failures = presence.channels.send_to_all(&payload);
        for failure in &failures {
            warn!(
                session_id = %failure.session_id,
                code = failure.error.error_code(),
                error = %failure.error,
                "broadcast: delivery failed"
            );
        }
        BroadcastReport { recipients: presence.channels.len(), failures }
    }
}

impl ChangeListener for BroadcastEngine {
    fn on_change(&self, change: Change, presence: &Presence) {
        let report = self.broadcast(presence);
        debug!(
            ?change,
            session_id = %change.session_id(),
            sessions = presence.registry.len(),
            recipients = report.recipients,
            failed = report.failures.len(),
            "broadcast: snapshot sent"
        );
    }
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
