//! Per-connection actor pair: an inbound reader and an outbound writer.
//!
//! The reader publishes join → data* → leaver to the hub and never touches
//! the inbox. The writer consumes the inbox, paces pings, closes the socket,
//! and releases the hub exactly once, after draining the inbox to closure.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use super::envelope::Envelope;
use super::hub::{ClientHandle, FrameKind, Hub, HubMessage};
use super::superhub::Superhub;
use super::CLOSE_TOO_BIG;

/// Per-connection tunables.
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// How often the writer pings.
    pub ping_freq: Duration,
    /// Deadline on every socket write.
    pub write_timeout: Duration,
    /// Ceiling on a single inbound frame, in bytes.
    pub read_limit: usize,
}

impl RelaySettings {
    /// How long the reader waits for a pong before giving the connection up.
    fn pong_timeout(&self) -> Duration {
        self.ping_freq * 5 / 4
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            ping_freq: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            read_limit: 60 * 1024,
        }
    }
}

/// One WebSocket connection attached to a hub.
pub struct Client {
    id: String,
    socket: WebSocket,
    hub: Hub,
    superhub: Arc<Superhub>,
    settings: RelaySettings,
}

impl Client {
    pub fn new(
        id: String,
        socket: WebSocket,
        hub: Hub,
        superhub: Arc<Superhub>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            id,
            socket,
            hub,
            superhub,
            settings,
        }
    }

    /// Launches the reader and writer tasks. Call exactly once; the actor
    /// then lives until its socket dies or its hub closes the inbox.
    pub fn start(self) {
        let (ws_tx, ws_rx) = self.socket.split();
        let (handle, inbox_rx) = ClientHandle::new(self.id);

        // Reader → writer close requests; the writer owns the sink.
        let (ctrl_tx, ctrl_rx) = mpsc::channel(1);

        let tracker = self.superhub.tracker().clone();
        tracker.spawn(read_loop(
            ws_rx,
            handle.clone(),
            self.hub.clone(),
            ctrl_tx,
            self.settings,
        ));
        tracker.spawn(write_loop(
            ws_tx,
            inbox_rx,
            ctrl_rx,
            handle.id().to_string(),
            self.hub,
            self.superhub,
            self.settings,
        ));
    }
}

/// Reads frames until the connection fails, forwarding each payload to the
/// hub. Exit order is fixed: close request to the writer, then the Leaver.
async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    handle: Arc<ClientHandle>,
    hub: Hub,
    ctrl: mpsc::Sender<Option<CloseFrame>>,
    settings: RelaySettings,
) {
    hub.publish(HubMessage::join(handle.clone())).await;

    let pong_timeout = settings.pong_timeout();
    let mut deadline = Instant::now() + pong_timeout;
    let mut close_frame = None;

    loop {
        match time::timeout_at(deadline, ws_rx.next()).await {
            Err(_) => {
                tracing::debug!(id = %handle.id(), "pong deadline passed");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                tracing::debug!(id = %handle.id(), %err, "read error");
                break;
            }
            Ok(Some(Ok(Message::Binary(data)))) => {
                if data.len() > settings.read_limit {
                    close_frame = Some(too_big());
                    break;
                }
                hub.publish(HubMessage::peer(
                    handle.clone(),
                    FrameKind::Binary,
                    data.to_vec(),
                ))
                .await;
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                if text.len() > settings.read_limit {
                    close_frame = Some(too_big());
                    break;
                }
                hub.publish(HubMessage::peer(
                    handle.clone(),
                    FrameKind::Text,
                    text.as_str().as_bytes().to_vec(),
                ))
                .await;
            }
            Ok(Some(Ok(Message::Pong(_)))) => {
                deadline = Instant::now() + pong_timeout;
            }
            Ok(Some(Ok(Message::Ping(_)))) => {
                // The socket layer answers pings on its own.
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
        }
    }

    let _ = ctrl.send(close_frame).await;
    hub.publish(HubMessage::leave(handle)).await;
}

fn too_big() -> CloseFrame {
    CloseFrame {
        code: CLOSE_TOO_BIG,
        reason: "message too big".into(),
    }
}

/// Writes hub envelopes and pings until the inbox closes, a write fails, or
/// the reader requests a close. It never initiates teardown of the inbox: it
/// drains it to closure so the hub's fan-out sends always complete, and only
/// then releases the hub.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut inbox: mpsc::Receiver<Arc<Envelope>>,
    mut ctrl: mpsc::Receiver<Option<CloseFrame>>,
    id: String,
    hub: Hub,
    superhub: Arc<Superhub>,
    settings: RelaySettings,
) {
    let mut pinger = time::interval(settings.ping_freq);
    pinger.tick().await; // First tick fires immediately; skip it.

    loop {
        tokio::select! {
            maybe = inbox.recv() => match maybe {
                Some(env) => {
                    let frame = match serde_json::to_vec(env.as_ref()) {
                        Ok(bytes) => Message::Binary(bytes.into()),
                        Err(err) => {
                            // A server bug, not a protocol condition: skip
                            // this send only.
                            tracing::error!(id = %id, %err, "envelope marshal failed");
                            continue;
                        }
                    };
                    if write_frame(&mut ws_tx, frame, settings.write_timeout, &id)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                None => break,
            },
            _ = pinger.tick() => {
                if write_frame(
                    &mut ws_tx,
                    Message::Ping(Bytes::new()),
                    settings.write_timeout,
                    &id,
                )
                .await
                .is_err()
                {
                    break;
                }
            }
            request = ctrl.recv() => {
                if let Some(Some(frame)) = request {
                    let _ = write_frame(
                        &mut ws_tx,
                        Message::Close(Some(frame)),
                        settings.write_timeout,
                        &id,
                    )
                    .await;
                }
                break;
            }
        }
    }

    let _ = ws_tx.close().await;

    // Drain until the hub closes the inbox, so its blocking sends complete.
    while inbox.recv().await.is_some() {}

    tracing::debug!(id = %id, game = hub.name(), "client detached");
    superhub.release(&hub);
}

async fn write_frame(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    write_timeout: Duration,
    id: &str,
) -> Result<(), ()> {
    match time::timeout(write_timeout, ws_tx.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            tracing::debug!(id = %id, %err, "write error");
            Err(())
        }
        Err(_) => {
            tracing::debug!(id = %id, "write deadline passed");
            Err(())
        }
    }
}
