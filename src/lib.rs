//! SafeChat presence & proximity engine
//!
//! Real-time core for a chat application with a proximity-alert feature:
//! users register relatives by phone number, share GPS location, and get
//! alerted when a relative is nearby. The engine tracks who is connected
//! and via which session, ingests location updates, computes great-circle
//! distance against each user's registered relatives, classifies
//! ENTERING/EXITING transitions (emitting each alert exactly once per
//! transition), and relays direct messages and typing signals to online
//! recipients.
//!
//! Persistence, authentication, encryption at rest and HTTP routing are
//! external collaborators behind the traits in [`store`] and
//! [`proximity::ContactLocationResolver`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use safechat_engine::engine::{Engine, EngineConfig};
//! use safechat_engine::proximity::UnresolvedDirectory;
//! use safechat_engine::store::{MemoryAlertStore, MemoryMessageStore, MemoryUserStore};
//!
//! let engine = Engine::new(
//!     EngineConfig::default(),
//!     MemoryUserStore::new(),
//!     MemoryAlertStore::new(),
//!     MemoryMessageStore::new(),
//!     Arc::new(UnresolvedDirectory),
//! );
//! let ack = engine.location_update("u1", 37.7749, -122.4194, 5.0).await?;
//! ```

pub mod contacts;
pub mod engine;
pub mod error;
pub mod geo;
pub mod proximity;
pub mod schema;
pub mod socket_server;
pub mod store;

// Re-export commonly used types
pub use contacts::{ContactUpdate, ContactsService, NewContact};
pub use engine::{Engine, EngineConfig, LocationAck};
pub use error::{EngineError, Result};
pub use proximity::{
    ContactLocationResolver, Evaluation, NearbyContact, ProximityEvaluator, TransitionEvent,
    UnresolvedDirectory, DEFAULT_THRESHOLD_KM,
};
pub use schema::{
    AlertRecord, Classification, Contact, GeoPoint, LocationSample, Message, UserId, UserProfile,
};
pub use store::{
    AlertQuery, AlertStore, MemoryAlertStore, MemoryMessageStore, MemoryUserStore, MessageStore,
    UserStore,
};
