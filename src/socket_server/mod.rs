//! SafeChat Socket Server
//!
//! The standalone daemon surface: one WebSocket connection per client,
//! presence tracking, message relay and proximity alert pushes.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                  SAFECHAT SOCKET SERVER (safechat-daemon)          │
//! │                  Single daemon, one session per user               │
//! ├────────────────────────────────────────────────────────────────────┤
//! │                                                                    │
//! │  ┌────────────────────────────────────────────────────────────┐   │
//! │  │                 PresenceRegistry (RwLock)                   │   │
//! │  │                                                             │   │
//! │  │  user_id ──► SessionHandle { conn_id, connected_at, tx }   │   │
//! │  │  conn_id ──► user_id              (reverse index)          │   │
//! │  └────────────────────────────────────────────────────────────┘   │
//! │                                                                    │
//! │  updateLocation ──► ProximityEvaluator ──► AlertDispatcher        │
//! │  sendMessage / typing ──► MessageRelay                            │
//! │  presence + location changes ──► broadcast to all sessions       │
//! │                                                                    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol
//!
//! All events are JSON over WebSocket, discriminated by `type`:
//!
//! ```json
//! // Client -> Server
//! {"type": "userOnline", "userId": "u1"}
//! {"type": "updateLocation", "userId": "u1", "latitude": 37.77, "longitude": -122.41, "accuracy": 5}
//! {"type": "sendMessage", "senderId": "u1", "recipientId": "u2", "content": "hi"}
//!
//! // Server -> Client
//! {"type": "userStatusChanged", "userId": "u1", "status": "online"}
//! {"type": "proximityAlert", "id": "...", "relativeName": "Mom", "distance": 0.4, "alertType": "ENTERING"}
//! {"type": "receiveMessage", "senderId": "u1", "content": "hi", "timestamp": "..."}
//! ```

pub mod alerts;
pub mod connection;
pub mod presence;
pub mod protocol;
pub mod relay;

pub use alerts::{AlertDispatcher, AlertPage};
pub use connection::handle_connection;
pub use presence::{ConnId, PresenceRegistry, RegistryStats, SessionHandle};
pub use protocol::{ClientEvent, NearbySummary, PresenceStatus, ServerEvent};
pub use relay::MessageRelay;
