//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Three endpoints under one Axum router: the WebSocket relay at `/ws`, the
//! static browser client at `/`, and a liveness recorder at `/healthz`. HTTP
//! requests get a tracing span from `TraceLayer`; upgraded sockets log
//! through the relay from there on.

pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .route_service("/", ServeFile::new(&state.index_html))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
