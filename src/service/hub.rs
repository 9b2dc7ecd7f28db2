//! Live update hub: fans events out to every open session of a user.
//!
//! A connection moves through `Connection::new` (connecting), then `register` (registered),
//! then `unregister` or shed on a full outbound queue, then closed. Closing means the hub drops
//! the connection's only sender, so its receiver drains what is buffered and then ends.
//! The registry lives inside a single actor; nothing else ever touches it.

use crate::db::UserId;
use crate::error::DevsyncError;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

pub type ConnectionId = u64;

pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Server side of one client session. Owned by the hub once registered.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    outbound: mpsc::Sender<String>,
}

impl Connection {
    /// Create a connection for `user_id` with a bounded outbound queue.
    /// The receiver is the session's write side.
    pub fn new(user_id: UserId, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let conn = Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            user_id,
            outbound,
        };
        (conn, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'a str,
    data: &'a Value,
}

/// Messages handled by the hub actor.
#[derive(Debug)]
pub enum HubMessage {
    Register(Connection),
    Unregister {
        user_id: UserId,
        id: ConnectionId,
    },
    Broadcast {
        user_id: UserId,
        event: String,
        data: Value,
    },
    /// Number of live connections for a user.
    ConnectionCount(UserId, RpcReplyPort<usize>),
}

/// Handle for interacting with the hub actor.
#[derive(Clone)]
pub struct HubHandle {
    actor: ActorRef<HubMessage>,
}

impl HubHandle {
    pub fn register(&self, conn: Connection) -> Result<(), DevsyncError> {
        ractor::cast!(self.actor, HubMessage::Register(conn))
            .map_err(|e| DevsyncError::RactorError(format!("Register cast failed: {e}")))
    }

    pub fn unregister(&self, user_id: UserId, id: ConnectionId) {
        let _ = ractor::cast!(self.actor, HubMessage::Unregister { user_id, id });
    }

    /// Queue `{event, data}` for every session of `user_id`. Fire-and-forget.
    pub fn broadcast(&self, user_id: UserId, event: impl Into<String>, data: Value) {
        let event = event.into();
        if let Err(e) = ractor::cast!(
            self.actor,
            HubMessage::Broadcast {
                user_id,
                event,
                data
            }
        ) {
            warn!(user_id, "hub unreachable, broadcast dropped: {}", e);
        }
    }

    pub async fn connection_count(&self, user_id: UserId) -> Result<usize, DevsyncError> {
        ractor::call!(self.actor, HubMessage::ConnectionCount, user_id)
            .map_err(|e| DevsyncError::RactorError(format!("ConnectionCount RPC failed: {e}")))
    }

    pub fn stop(&self) {
        self.actor.stop(Some("shutdown".to_string()));
    }
}

#[derive(Default)]
struct HubState {
    connections: HashMap<UserId, HashMap<ConnectionId, mpsc::Sender<String>>>,
}

impl HubState {
    /// Drop a connection's sender (closing it) and the user's entry once it is empty.
    fn remove(&mut self, user_id: UserId, id: ConnectionId) -> bool {
        let Some(conns) = self.connections.get_mut(&user_id) else {
            return false;
        };
        let removed = conns.remove(&id).is_some();
        if conns.is_empty() {
            self.connections.remove(&user_id);
        }
        removed
    }
}

struct HubActor;

#[ractor::async_trait]
impl Actor for HubActor {
    type Msg = HubMessage;
    type State = HubState;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _arguments: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!("Notification hub started");
        Ok(HubState::default())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            HubMessage::Register(conn) => {
                debug!(user_id = conn.user_id, id = conn.id, "connection registered");
                state
                    .connections
                    .entry(conn.user_id)
                    .or_default()
                    .insert(conn.id, conn.outbound);
            }
            HubMessage::Unregister { user_id, id } => {
                if state.remove(user_id, id) {
                    debug!(user_id, id, "connection unregistered");
                }
            }
            HubMessage::Broadcast {
                user_id,
                event,
                data,
            } => {
                self.handle_broadcast(state, user_id, &event, &data);
            }
            HubMessage::ConnectionCount(user_id, reply) => {
                let count = state.connections.get(&user_id).map_or(0, HashMap::len);
                let _ = reply.send(count);
            }
        }
        Ok(())
    }
}

impl HubActor {
    fn handle_broadcast(&self, state: &mut HubState, user_id: UserId, event: &str, data: &Value) {
        let Some(conns) = state.connections.get(&user_id) else {
            debug!(user_id, event, "no live connections; broadcast skipped");
            return;
        };
        let frame = match serde_json::to_string(&Envelope { event, data }) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(user_id, event, "failed to encode broadcast: {}", e);
                return;
            }
        };

        let mut delivered = 0usize;
        let mut dead = Vec::new();
        for (&id, tx) in conns {
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(user_id, id, "outbound queue full; shedding slow connection");
                    dead.push(id);
                }
                Err(TrySendError::Closed(_)) => dead.push(id),
            }
        }
        for id in dead {
            state.remove(user_id, id);
        }
        debug!(user_id, event, delivered, "broadcast delivered");
    }
}

/// Spawn the hub actor and return a handle.
pub async fn spawn() -> Result<HubHandle, DevsyncError> {
    let (actor, _jh) = Actor::spawn(None, HubActor, ())
        .await
        .map_err(|e| DevsyncError::RactorError(format!("failed to spawn hub: {e}")))?;
    Ok(HubHandle { actor })
}
