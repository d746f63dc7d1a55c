use axum::routing::get;
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(hello))
}

/// Proof of running.
async fn hello() -> &'static str {
    "Hello, there"
}
