//! WebSocket message bouncer for small multi-party board-game sessions.
//!
//! Clients connect to a URL whose path names a game; the server forwards
//! every client's messages to all other clients in the same game and
//! announces joiners and leavers. There is no game logic; the server is a
//! transport.

pub mod config;
pub mod relay;
pub mod routes;

use std::sync::Arc;

use config::Config;
use relay::superhub::Superhub;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub superhub: Arc<Superhub>,
}
