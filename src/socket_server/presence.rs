//! Presence registry
//!
//! Tracks which users are connected and through which session. One active
//! session per user: a second login overwrites the slot and the prior
//! handle is orphaned (no forced disconnect is issued here). The registry
//! also owns the broadcast channel used to fan events out to every open
//! session; the interest set is explicitly "all sessions" today so it can
//! be narrowed later without changing the contract.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};

use crate::error::{EngineError, Result};
use crate::schema::UserId;
use crate::socket_server::protocol::{PresenceStatus, ServerEvent};

/// Unique identifier for one connection
pub type ConnId = String;

/// A live addressable endpoint for pushing events to one connected user.
pub struct SessionHandle {
    pub conn_id: ConnId,
    pub user_id: UserId,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl SessionHandle {
    pub fn new(
        conn_id: ConnId,
        user_id: UserId,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        Self {
            conn_id,
            user_id,
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Push an event to this session.
    ///
    /// Fails with `StaleSession` when the connection side has already gone
    /// away; callers treat that as already-disconnected and drop the event.
    pub fn push(&self, event: ServerEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| EngineError::StaleSession {
                user_id: self.user_id.clone(),
            })
    }
}

#[derive(Default)]
struct Slots {
    by_user: HashMap<UserId, Arc<SessionHandle>>,
    by_conn: HashMap<ConnId, UserId>,
}

/// Statistics about the registry
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub session_count: usize,
}

/// In-memory user ↔ session map, owned by the daemon process lifecycle.
pub struct PresenceRegistry {
    slots: RwLock<Slots>,
    broadcast_tx: broadcast::Sender<ServerEvent>,
}

impl PresenceRegistry {
    pub fn new(broadcast_capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(broadcast_capacity);
        Self {
            slots: RwLock::new(Slots::default()),
            broadcast_tx,
        }
    }

    /// Register the session for a user, overwriting any existing slot.
    ///
    /// Broadcasts `userStatusChanged(online)` to all sessions.
    pub fn mark_online(&self, handle: SessionHandle) {
        let user_id = handle.user_id.clone();
        let conn_id = handle.conn_id.clone();
        {
            let mut slots = self.slots.write();
            if let Some(prior) = slots.by_user.insert(user_id.clone(), Arc::new(handle)) {
                // Second login: the previous handle is orphaned
                slots.by_conn.remove(&prior.conn_id);
                tracing::info!(
                    "Replaced session {} for user {} with {}",
                    prior.conn_id,
                    user_id,
                    conn_id
                );
            }
            slots.by_conn.insert(conn_id, user_id.clone());
        }
        self.broadcast(ServerEvent::UserStatusChanged {
            user_id,
            status: PresenceStatus::Online,
        });
    }

    /// Unregister by connection id.
    ///
    /// Removes the mapping only if the user's slot still points at this
    /// connection, so a stale disconnect cannot clobber a newer session.
    /// Returns the owning user when a slot was actually cleared.
    pub fn mark_offline(&self, conn_id: &str) -> Option<UserId> {
        let cleared = {
            let mut slots = self.slots.write();
            let user_id = slots.by_conn.remove(conn_id)?;
            match slots.by_user.get(&user_id) {
                Some(current) if current.conn_id == conn_id => {
                    slots.by_user.remove(&user_id);
                    Some(user_id)
                }
                // The slot was already taken over by a newer session
                _ => None,
            }
        };
        if let Some(user_id) = &cleared {
            self.broadcast(ServerEvent::UserStatusChanged {
                user_id: user_id.clone(),
                status: PresenceStatus::Offline,
            });
        }
        cleared
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.slots.read().by_user.contains_key(user_id)
    }

    pub fn session_for(&self, user_id: &str) -> Option<Arc<SessionHandle>> {
        self.slots.read().by_user.get(user_id).cloned()
    }

    /// Subscribe to the all-sessions fan-out channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Publish an event to every open session. Lossy when nobody listens.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.broadcast_tx.send(event);
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            session_count: self.slots.read().by_user.len(),
        }
    }
}
