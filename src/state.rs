//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds no per-connection data: each accepted socket gets its own relay,
//! built from the connector and session options kept here. The shutdown
//! token and task tracker let `main` stop accepting, cancel every relay,
//! and wait for teardown to finish.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::live::{LiveConnect, SessionOptions};
use crate::relay::Coordinator;

/// Shared application state. Clone is required by Axum; every field is
/// cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Opens one live session per relay. Swappable for tests.
    pub connector: Arc<dyn LiveConnect>,
    pub session_options: SessionOptions,
    pub index_html: PathBuf,
    /// Cancelled once on server shutdown.
    pub shutdown: CancellationToken,
    /// Tracks every running relay so shutdown can wait for teardown.
    pub relays: TaskTracker,
}

impl AppState {
    #[must_use]
    pub fn new(config: &Config, connector: Arc<dyn LiveConnect>) -> Self {
        Self {
            connector,
            session_options: config.session.clone(),
            index_html: config.index_html.clone(),
            shutdown: CancellationToken::new(),
            relays: TaskTracker::new(),
        }
    }

    /// Coordinator for one new connection.
    #[must_use]
    pub fn coordinator(&self) -> Coordinator {
        Coordinator::new(Arc::clone(&self.connector), self.session_options.clone(), self.shutdown.clone())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
