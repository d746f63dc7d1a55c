#![allow(dead_code)] // not every test binary uses every helper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Response;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use bounce_server::config::Config;
use bounce_server::relay::superhub::Superhub;
use bounce_server::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a real TCP server for WebSocket testing, with the default config.
/// The server runs in the background.
pub async fn start_server() -> (SocketAddr, AppState) {
    start_server_with(Config::default()).await
}

/// Start a server with a custom config (short timers, small limits, ...).
pub async fn start_server_with(config: Config) -> (SocketAddr, AppState) {
    let superhub = Arc::new(Superhub::with_max_clients(config.max_clients));
    let state = AppState {
        config: Arc::new(config),
        superhub,
    };
    let app = bounce_server::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Connect to the server, sending a `clientID` cookie if non-empty. Returns
/// the socket and the upgrade response (for its `Set-Cookie` header).
pub async fn dial(addr: SocketAddr, path: &str, client_id: &str) -> (WsClient, Response) {
    let url = format!("ws://{addr}{path}");
    let mut request = url.into_client_request().expect("client request");
    if !client_id.is_empty() {
        request.headers_mut().insert(
            "Cookie",
            format!("clientID={client_id}").parse().expect("cookie header"),
        );
    }
    tokio_tungstenite::connect_async(request)
        .await
        .expect("ws connect")
}

/// The `clientID` value set by the upgrade response, if any.
pub fn response_client_id(response: &Response) -> Option<String> {
    let raw = response.headers().get("set-cookie")?.to_str().ok()?;
    let pair = raw.split(';').next()?;
    let (name, value) = pair.trim().split_once('=')?;
    (name == "clientID").then(|| value.to_string())
}

/// Read the next envelope, skipping control frames, within `timeout_ms`.
pub async fn read_envelope(ws: &mut WsClient, timeout_ms: u64) -> serde_json::Value {
    let deadline = Duration::from_millis(timeout_ms);
    loop {
        let msg = time::timeout(deadline, ws.next())
            .await
            .expect("timed out waiting for envelope")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Binary(data) => {
                return serde_json::from_slice(&data).expect("parse envelope")
            }
            other => panic!("expected an envelope, got: {other:?}"),
        }
    }
}

/// Expect the next envelope to carry the given intent, and swallow it.
pub async fn swallow_intent(ws: &mut WsClient, intent: &str) -> serde_json::Value {
    let env = read_envelope(ws, 500).await;
    assert_eq!(env["Intent"], intent, "unexpected envelope: {env}");
    env
}

/// Expect silence (control frames aside) on the socket for `timeout_ms`.
pub async fn expect_no_message(ws: &mut WsClient, timeout_ms: u64) {
    let deadline = time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        match time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(other) => panic!("wrongly got something: {other:?}"),
        }
    }
}

/// Compare a JSON array of strings against an expected multiset.
pub fn same_elements(actual: &serde_json::Value, expected: &[&str]) -> bool {
    let Some(list) = actual.as_array() else {
        return false;
    };
    if list.len() != expected.len() {
        return false;
    }
    let mut actual: Vec<&str> = list.iter().filter_map(|v| v.as_str()).collect();
    let mut expected = expected.to_vec();
    actual.sort_unstable();
    expected.sort_unstable();
    actual == expected
}

/// Poll until the superhub has no hubs left, or fail after `timeout_ms`.
pub async fn wait_for_quiescence(state: &AppState, timeout_ms: u64) {
    let deadline = time::Instant::now() + Duration::from_millis(timeout_ms);
    while state.superhub.count() != 0 {
        assert!(
            time::Instant::now() < deadline,
            "superhub still has {} hub(s)",
            state.superhub.count()
        );
        time::sleep(Duration::from_millis(20)).await;
    }
}
