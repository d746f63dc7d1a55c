//! WebSocket upgrade boundary: cookie identity, hub admission, refusal.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::header::{HeaderMap, SET_COOKIE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::AppState;

use super::client::Client;
use super::cookie;
use super::CLOSE_NORMAL;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/g/{game}", get(bounce_upgrade))
        .route("/cmd/annul-cookie", get(annul_cookie))
}

/// Upgrades a game connection. The hub key is the full request path, and the
/// chosen client id (echoed or minted) rides back on the response cookie.
async fn bounce_upgrade(
    ws: WebSocketUpgrade,
    Path(game): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let client_id = cookie::client_id_or_new(&headers);
    let cookie = cookie::set_cookie(&client_id);
    let game = format!("/g/{game}");

    let mut response = ws
        .on_upgrade(move |socket| attach(socket, state, game, client_id))
        .into_response();
    response.headers_mut().append(SET_COOKIE, cookie);
    response
}

async fn attach(socket: WebSocket, state: AppState, game: String, client_id: String) {
    let hub = match state.superhub.hub(&game) {
        Ok(hub) => hub,
        Err(err) => {
            tracing::info!(%game, id = %client_id, %err, "refusing connection");
            let mut socket = socket;
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_NORMAL,
                    reason: err.to_string().into(),
                })))
                .await;
            return;
        }
    };

    tracing::info!(%game, id = %client_id, "client connected");
    Client::new(
        client_id,
        socket,
        hub,
        state.superhub.clone(),
        state.config.relay_settings(),
    )
    .start();
}

/// Upgrades, annuls the `clientID` cookie on the response, and closes.
async fn annul_cookie(ws: WebSocketUpgrade) -> Response {
    let mut response = ws
        .on_upgrade(|mut socket| async move {
            let _ = socket.send(Message::Close(None)).await;
        })
        .into_response();
    response.headers_mut().append(SET_COOKIE, cookie::set_cookie(""));
    response
}
