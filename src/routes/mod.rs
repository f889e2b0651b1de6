//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! A single Axum router. `/` is the websocket endpoint; a plain GET without
//! upgrade headers gets a liveness text instead. `/healthz` is the bare
//! status probe for orchestrators.

pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Body returned by `GET /` when the request is not a websocket upgrade.
pub const LIVENESS_TEXT: &str = "cursorcast is running";

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
