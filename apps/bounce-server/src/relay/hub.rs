//! Per-game coordinator: owns membership, fans out messages, and emits the
//! Welcome / Joiner / Leaver / Peer envelopes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use super::envelope::{Envelope, Intent};

/// Capacity of each client's inbox of outbound envelopes. Fan-out blocks on a
/// full inbox, so this bounds how far one slow client can stall the hub; the
/// client's own read/write deadlines evict a truly stuck consumer.
pub(crate) const INBOX_CAPACITY: usize = 32;

/// Capacity of a hub's pending channel of inbound hub-messages.
const PENDING_CAPACITY: usize = 16;

static NEXT_CONN: AtomicU64 = AtomicU64::new(1);
static NEXT_HUB_UID: AtomicU64 = AtomicU64::new(1);

/// Kind of WebSocket data frame a client payload arrived on. Carried through
/// the hub untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Binary,
    Text,
}

/// The hub's view of one connection.
///
/// Membership identity is the connection number `conn`, never the client id:
/// two connections may legitimately share an id (same user, two tabs). The
/// inbox sender lives only inside this struct, so the channel closes exactly
/// when the hub has dropped the client from membership and every in-flight
/// hub-message from it has been consumed.
#[derive(Debug)]
pub struct ClientHandle {
    conn: u64,
    id: String,
    inbox: mpsc::Sender<Arc<Envelope>>,
}

impl ClientHandle {
    /// Creates a handle and the receiving end of its inbox.
    pub fn new(id: impl Into<String>) -> (Arc<Self>, mpsc::Receiver<Arc<Envelope>>) {
        let (inbox, rx) = mpsc::channel(INBOX_CAPACITY);
        let handle = Arc::new(Self {
            conn: NEXT_CONN.fetch_add(1, Ordering::Relaxed),
            id: id.into(),
            inbox,
        });
        (handle, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    async fn deliver(&self, env: Arc<Envelope>) {
        if self.inbox.send(env).await.is_err() {
            // Only possible if the writer task died without draining.
            tracing::warn!(id = %self.id, "inbox receiver gone");
        }
    }
}

/// What a client publishes to its hub: a join marker (no intent, no body), a
/// departure (`intent = Leaver`), or peer data (`body` set).
pub struct HubMessage {
    pub from: Arc<ClientHandle>,
    pub frame: FrameKind,
    pub intent: Option<Intent>,
    pub body: Option<Vec<u8>>,
}

impl HubMessage {
    pub fn join(from: Arc<ClientHandle>) -> Self {
        Self {
            from,
            frame: FrameKind::Binary,
            intent: None,
            body: None,
        }
    }

    pub fn leave(from: Arc<ClientHandle>) -> Self {
        Self {
            from,
            frame: FrameKind::Binary,
            intent: Some(Intent::Leaver),
            body: None,
        }
    }

    pub fn peer(from: Arc<ClientHandle>, frame: FrameKind, body: Vec<u8>) -> Self {
        Self {
            from,
            frame,
            intent: None,
            body: Some(body),
        }
    }
}

/// Cloneable handle to one game's coordination task.
#[derive(Clone, Debug)]
pub struct Hub {
    name: Arc<str>,
    uid: u64,
    pending: mpsc::Sender<HubMessage>,
    detached: mpsc::Sender<()>,
}

impl Hub {
    /// Creates a hub for the given game and starts its coordination task on
    /// the tracker.
    pub fn start(name: &str, tracker: &TaskTracker) -> Self {
        let (pending_tx, pending_rx) = mpsc::channel(PENDING_CAPACITY);
        let (detached_tx, detached_rx) = mpsc::channel(1);
        let hub = Self {
            name: Arc::from(name),
            uid: NEXT_HUB_UID.fetch_add(1, Ordering::Relaxed),
            pending: pending_tx,
            detached: detached_tx,
        };

        let state = HubState {
            name: hub.name.clone(),
            members: HashMap::new(),
        };
        tracker.spawn(state.run(pending_rx, detached_rx));

        hub
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn uid(&self) -> u64 {
        self.uid
    }

    /// Queue a hub-message for the coordination task.
    pub async fn publish(&self, msg: HubMessage) {
        if self.pending.send(msg).await.is_err() {
            tracing::debug!(game = %self.name, "publish to stopped hub");
        }
    }

    /// Announce that no more clients will attach. Sent by the superhub, at
    /// most once, when the attachment count reaches zero.
    pub(crate) fn signal_detached(&self) {
        let _ = self.detached.try_send(());
    }
}

struct HubState {
    name: Arc<str>,
    members: HashMap<u64, Arc<ClientHandle>>,
}

impl HubState {
    async fn run(
        mut self,
        mut pending: mpsc::Receiver<HubMessage>,
        mut detached: mpsc::Receiver<()>,
    ) {
        tracing::debug!(game = %self.name, "hub started");

        let mut detached_ack = false;
        while !detached_ack {
            tokio::select! {
                _ = detached.recv() => {
                    // The release protocol guarantees this fires only after
                    // every attached client's Leaver has been processed.
                    detached_ack = true;
                }
                maybe = pending.recv() => match maybe {
                    Some(msg) => self.dispatch(msg).await,
                    None => break,
                },
            }
        }

        tracing::debug!(game = %self.name, "hub stopped");
    }

    async fn dispatch(&mut self, msg: HubMessage) {
        if !self.members.contains_key(&msg.from.conn) {
            self.admit(msg.from).await;
        } else if msg.intent == Some(Intent::Leaver) {
            self.evict(&msg.from).await;
        } else if let Some(body) = msg.body {
            self.bounce(&msg.from, body).await;
        } else {
            // Unreachable under correct clients.
            tracing::error!(game = %self.name, id = %msg.from.id, "inexplicable hub message");
            panic!("inexplicable hub message in game {}", self.name);
        }
    }

    /// Welcome the joiner, announce it to the whole membership (the joiner
    /// included), then insert it.
    async fn admit(&mut self, joiner: Arc<ClientHandle>) {
        tracing::debug!(game = %self.name, id = %joiner.id, "joiner");
        let now = Utc::now().timestamp();

        let welcome = Envelope {
            from: self.member_ids(),
            to: vec![joiner.id.clone()],
            time: now,
            intent: Intent::Welcome,
            body: None,
        };
        joiner.deliver(Arc::new(welcome)).await;

        let mut to = self.member_ids();
        to.push(joiner.id.clone());
        let joined = Arc::new(Envelope {
            from: vec![joiner.id.clone()],
            to,
            time: now,
            intent: Intent::Joiner,
            body: None,
        });
        for member in self.members.values() {
            member.deliver(joined.clone()).await;
        }
        joiner.deliver(joined).await;

        self.members.insert(joiner.conn, joiner);
    }

    /// Drop the leaver from membership (which releases its inbox) and tell
    /// everyone left.
    async fn evict(&mut self, leaver: &Arc<ClientHandle>) {
        tracing::debug!(game = %self.name, id = %leaver.id, "leaver");
        self.members.remove(&leaver.conn);

        let env = Arc::new(Envelope {
            from: vec![leaver.id.clone()],
            to: self.member_ids(),
            time: Utc::now().timestamp(),
            intent: Intent::Leaver,
            body: None,
        });
        for member in self.members.values() {
            member.deliver(env.clone()).await;
        }
    }

    /// Forward a client payload to every other member. One shared envelope,
    /// never echoed to the sender.
    async fn bounce(&mut self, sender: &Arc<ClientHandle>, body: Vec<u8>) {
        let to = self
            .members
            .values()
            .filter(|m| m.conn != sender.conn)
            .map(|m| m.id.clone())
            .collect();
        let env = Arc::new(Envelope {
            from: vec![sender.id.clone()],
            to,
            time: Utc::now().timestamp(),
            intent: Intent::Peer,
            body: Some(body),
        });
        for member in self.members.values().filter(|m| m.conn != sender.conn) {
            member.deliver(env.clone()).await;
        }
    }

    fn member_ids(&self) -> Vec<String> {
        self.members.values().map(|m| m.id.clone()).collect()
    }
}
