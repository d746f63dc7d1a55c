pub mod hello;

use axum::Router;

use crate::relay::server;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(hello::router()).merge(server::router())
}
