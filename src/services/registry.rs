//! Session registry — authoritative set of connected participants.
//!
//! DESIGN
//! ======
//! A plain owned map from session id to `Session`. It has no locking of its
//! own: the hub owns it alongside the channel set and serializes every
//! mutation of both under one lock. Snapshots are owned copies, so a later
//! write can never alter a snapshot already handed out.

use std::collections::HashMap;

use uuid::Uuid;

use crate::protocol::{CursorPosition, ErrorCode, SessionView, Snapshot};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("session already exists: {0}")]
    DuplicateId(Uuid),
    #[error("session not found: {0}")]
    UnknownSession(Uuid),
}

impl ErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateId(_) => "E_DUPLICATE_SESSION",
            Self::UnknownSession(_) => "E_UNKNOWN_SESSION",
        }
    }
}

/// A connected participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    /// Client-supplied label, fixed for the session's life.
    pub display_name: String,
    /// Last reported position. Last write wins.
    pub cursor: CursorPosition,
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<Uuid, Session>,
}

impl SessionRegistry {
    #[cfg(test)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session with its cursor at the origin.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateId` if `id` is already present.
    pub fn create(&mut self, id: Uuid, display_name: &str) -> Result<Session, RegistryError> {
        if self.sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        let session = Session { id, display_name: display_name.to_owned(), cursor: CursorPosition::ORIGIN };
        self.sessions.insert(id, session.clone());
        Ok(session)
    }

    /// Overwrite a session's cursor position.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownSession` if `id` is absent, e.g. when an
    /// update races the session's disconnect.
    pub fn update_cursor(&mut self, id: Uuid, position: CursorPosition) -> Result<(), RegistryError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSession(id))?;
        session.cursor = position;
        Ok(())
    }

    /// Remove a session. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: Uuid) -> Option<Session> {
        self.sessions.remove(&id)
    }

    /// Remove every session, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }

    /// Owned point-in-time copy of every session.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.sessions
            .values()
            .map(|s| (s.id, SessionView { display_name: s.display_name.clone(), cursor: s.cursor }))
            .collect()
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Session> {
        self.sessions.get(&id)
    }

    #[cfg(test)]
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.sessions.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
