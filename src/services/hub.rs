//! Hub — the single serialization point for presence state.
//!
//! DESIGN
//! ======
//! `Presence` pairs the session registry with the connection channel set.
//! Both live behind one `Mutex`, so every mutation touches them together and
//! no reader ever sees a session without its channel or the reverse.
//!
//! Every successful mutation yields a `Change` that is handed to each
//! registered `ChangeListener` while the lock is still held. The broadcast
//! engine is one such listener; mutation call sites never know about it.
//! Listeners must stay synchronous and non-blocking: they run inside the
//! critical section.
//!
//! LIFECYCLE
//! =========
//! 1. `join` → session + channel inserted together → `Change::Joined`
//! 2. `move_cursor` → cursor overwritten → `Change::Moved`
//! 3. `SessionGuard::leave` (or guard drop) → both removed → `Change::Left`
//! 4. `close` → hub refuses new joins, all sessions and channels drained
//! 5. `shutdown` → `close`, then `wait_idle` bounded by the grace period
//!
//! Each connection task owns exactly one `SessionGuard`. The guard makes
//! removal happen once per connection regardless of which close path fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{CursorPosition, ErrorCode};
use crate::services::channels::{ChannelSet, Outbound};
use crate::services::registry::{RegistryError, Session, SessionRegistry};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("hub is shutting down")]
    Closed,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ErrorCode for HubError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Closed => "E_HUB_CLOSED",
            Self::Registry(e) => e.error_code(),
        }
    }
}

/// State change notification delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Joined(Uuid),
    Moved(Uuid),
    Left(Uuid),
}

impl Change {
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        match self {
            Self::Joined(id) | Self::Moved(id) | Self::Left(id) => *id,
        }
    }
}

/// Outcome of [`Hub::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Every connection task released its session within the grace period.
    Idle { dropped: usize },
    /// The grace period ran out with `remaining` tasks still running.
    TimedOut { dropped: usize, remaining: usize },
}

/// Observer of presence mutations. Called with the lock held and the
/// mutation fully applied.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, change: Change, presence: &Presence);
}

// =============================================================================
// PRESENCE
// =============================================================================

/// Registry and channel set, always mutated together.
#[derive(Debug, Default)]
pub struct Presence {
    pub registry: SessionRegistry,
    pub channels: ChannelSet,
    closed: bool,
}

impl Presence {
    /// True when every session has exactly one channel and vice versa.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.registry.len() == self.channels.len() && self.registry.ids().all(|id| self.channels.contains(id))
    }
}

// =============================================================================
// HUB
// =============================================================================

/// Cloneable handle to the shared presence state.
#[derive(Clone)]
pub struct Hub {
    presence: Arc<Mutex<Presence>>,
    listeners: Arc<[Arc<dyn ChangeListener>]>,
    /// Number of live `SessionGuard`s, i.e. connection tasks still running.
    live: Arc<watch::Sender<usize>>,
}

impl Hub {
    #[must_use]
    pub fn new(listeners: Vec<Arc<dyn ChangeListener>>) -> Self {
        let (live, _) = watch::channel(0);
        Self { presence: Arc::new(Mutex::new(Presence::default())), listeners: listeners.into(), live: Arc::new(live) }
    }

    /// Register a new session and its outbound channel as one step.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Closed` once shutdown has begun, or a registry error
    /// if the generated id collides with a live session.
    pub async fn join(&self, display_name: &str, channel: Outbound) -> Result<SessionGuard, HubError> {
        let mut presence = self.presence.lock().await;
        if presence.closed {
            return Err(HubError::Closed);
        }

        let id = Uuid::new_v4();
        let session = presence.registry.create(id, display_name)?;
        if !presence.channels.register(id, channel) {
            presence.registry.remove(id);
            return Err(RegistryError::DuplicateId(id).into());
        }
        debug_assert!(presence.is_consistent());

        self.live.send_modify(|n| *n += 1);
        info!(session_id = %id, username = %display_name, sessions = presence.registry.len(), "hub: session joined");
        self.notify(Change::Joined(id), &presence);

        Ok(SessionGuard { hub: self.clone(), session, left: false })
    }

    /// Record a new cursor position for a session.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownSession` if the session already left.
    pub async fn move_cursor(&self, id: Uuid, position: CursorPosition) -> Result<(), RegistryError> {
        let mut presence = self.presence.lock().await;
        presence.registry.update_cursor(id, position)?;
        self.notify(Change::Moved(id), &presence);
        Ok(())
    }

    /// Remove a session and its channel. Returns `false` if it was already
    /// gone, in which case no change is emitted.
    pub async fn leave(&self, id: Uuid) -> bool {
        let mut presence = self.presence.lock().await;
        presence.channels.unregister(id);
        let removed = presence.registry.remove(id).is_some();
        debug_assert!(presence.is_consistent());

        if removed {
            info!(session_id = %id, sessions = presence.registry.len(), "hub: session left");
            self.notify(Change::Left(id), &presence);
        } else {
            debug!(session_id = %id, "hub: leave for absent session ignored");
        }
        removed
    }

    /// Refuse further joins and drop every session and channel. Connection
    /// tasks see their outbound queue close and shut their sockets down.
    /// Returns the number of sessions dropped.
    pub async fn close(&self) -> usize {
        let mut presence = self.presence.lock().await;
        presence.closed = true;
        presence.channels.clear();
        let dropped = presence.registry.clear();
        info!(dropped, "hub: closed");
        dropped
    }

    /// Resolve once every connection task has released its session.
    pub async fn wait_idle(&self) {
        let mut rx = self.live.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Close the hub, then wait up to `grace` for connection tasks to finish.
    pub async fn shutdown(&self, grace: Duration) -> Drain {
        let dropped = self.close().await;
        match tokio::time::timeout(grace, self.wait_idle()).await {
            Ok(()) => Drain::Idle { dropped },
            Err(_) => Drain::TimedOut { dropped, remaining: self.live_connections() },
        }
    }

    /// Current presence state.
    #[cfg(test)]
    pub async fn snapshot(&self) -> crate::protocol::Snapshot {
        self.presence.lock().await.registry.snapshot()
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.presence.lock().await.registry.len()
    }

    /// Number of connection tasks still holding a session.
    #[must_use]
    pub fn live_connections(&self) -> usize {
        *self.live.borrow()
    }

    /// Run `f` against the locked presence state.
    #[cfg(test)]
    pub async fn inspect<R>(&self, f: impl FnOnce(&Presence) -> R) -> R {
        f(&*self.presence.lock().await)
    }

    fn notify(&self, change: Change, presence: &Presence) {
        for listener in self.listeners.iter() {
            listener.on_change(change, presence);
        }
    }
}

// =============================================================================
// SESSION GUARD
// =============================================================================

/// Owned by a connection task for the life of its session.
///
/// Call [`SessionGuard::leave`] on the normal close path. If the task is
/// cancelled or panics first, dropping the guard schedules the same removal.
pub struct SessionGuard {
    hub: Hub,
    session: Session,
    left: bool,
}

impl SessionGuard {
    #[cfg(test)]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session.id
    }

    /// Remove the session and emit the final change.
    ///
    /// The guard only counts as released once the removal has run. If this
    /// future is dropped while waiting for the lock, the guard's drop still
    /// schedules the removal.
    pub async fn leave(mut self) -> bool {
        let removed = self.hub.leave(self.session.id).await;
        self.left = true;
        removed
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let live = Arc::clone(&self.hub.live);
        if self.left {
            live.send_modify(|n| *n = n.saturating_sub(1));
            return;
        }

        // The live count drops only after the session is gone, so
        // `wait_idle` never resolves while a session is still registered.
        let hub = self.hub.clone();
        let id = self.session.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    hub.leave(id).await;
                    live.send_modify(|n| *n = n.saturating_sub(1));
                });
            }
            Err(_) => {
                warn!(session_id = %id, "hub: guard dropped outside runtime, session not removed");
                live.send_modify(|n| *n = n.saturating_sub(1));
            }
        }
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
