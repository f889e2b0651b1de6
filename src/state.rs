//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the presence hub (wired to the broadcast engine) and the parsed
//! config. There are no ambient globals: every connection reaches presence
//! state through this handle.

use std::sync::Arc;

use crate::config::Config;
use crate::services::broadcast::BroadcastEngine;
use crate::services::hub::{ChangeListener, Hub};

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let broadcaster: Arc<dyn ChangeListener> = Arc::new(BroadcastEngine);
        Self { hub: Hub::new(vec![broadcaster]), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// Create a test `AppState` with default config.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(Config::default())
    }

    /// Create a test `AppState` with a custom config.
    #[must_use]
    pub fn test_app_state_with(config: Config) -> AppState {
        AppState::new(config)
    }
}
