//! Engine assembly and per-operation logic
//!
//! The [`Engine`] owns every shared service for one daemon process: the
//! presence registry, the proximity evaluator, the alert dispatcher, the
//! relay and the store collaborators. It is created at startup and torn
//! down at shutdown; connection handlers translate wire events into the
//! operations here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::contacts::ContactsService;
use crate::error::{EngineError, Result};
use crate::geo;
use crate::proximity::{ContactLocationResolver, ProximityEvaluator, DEFAULT_THRESHOLD_KM};
use crate::schema::{LocationSample, Message, UserId};
use crate::socket_server::alerts::AlertDispatcher;
use crate::socket_server::presence::{ConnId, PresenceRegistry, SessionHandle};
use crate::socket_server::protocol::{NearbySummary, ServerEvent};
use crate::socket_server::relay::MessageRelay;
use crate::store::{AlertStore, MessageStore, UserStore};

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Distance below which a relative counts as nearby, in kilometers
    pub threshold_km: f64,
    /// Suppression window for identical repeat alerts; zero disables
    pub alert_cooldown: Duration,
    /// Capacity of the all-sessions broadcast channel
    pub broadcast_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold_km: DEFAULT_THRESHOLD_KM,
            alert_cooldown: Duration::from_secs(60),
            broadcast_capacity: 100,
        }
    }
}

/// Acknowledgement for a processed location update.
#[derive(Debug, Clone)]
pub struct LocationAck {
    pub timestamp: DateTime<Utc>,
    /// Relatives currently inside the threshold, for the live badge
    pub nearby: Vec<NearbySummary>,
}

pub struct Engine {
    registry: Arc<PresenceRegistry>,
    evaluator: ProximityEvaluator,
    dispatcher: AlertDispatcher,
    relay: MessageRelay,
    contacts: ContactsService,
    users: Arc<dyn UserStore>,
    messages: Arc<dyn MessageStore>,
    resolver: Arc<dyn ContactLocationResolver>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        users: Arc<dyn UserStore>,
        alerts: Arc<dyn AlertStore>,
        messages: Arc<dyn MessageStore>,
        resolver: Arc<dyn ContactLocationResolver>,
    ) -> Arc<Self> {
        let registry = Arc::new(PresenceRegistry::new(config.broadcast_capacity));
        Arc::new(Self {
            evaluator: ProximityEvaluator::new(config.threshold_km),
            dispatcher: AlertDispatcher::new(
                alerts,
                Arc::clone(&registry),
                config.alert_cooldown,
            ),
            relay: MessageRelay::new(Arc::clone(&registry)),
            contacts: ContactsService::new(Arc::clone(&users)),
            registry,
            users,
            messages,
            resolver,
        })
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    pub fn alerts(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    pub fn contacts(&self) -> &ContactsService {
        &self.contacts
    }

    /// Register a session for a user; the connection side keeps the
    /// receiving half of `sender`.
    pub fn open_session(
        &self,
        user_id: &str,
        conn_id: &str,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) {
        self.registry.mark_online(SessionHandle::new(
            conn_id.to_string(),
            user_id.to_string(),
            sender,
        ));
    }

    /// Guarded unregister; returns the user whose slot was cleared.
    pub fn close_session(&self, conn_id: &str) -> Option<UserId> {
        self.registry.mark_offline(conn_id)
    }

    /// Process one GPS reading: validate, persist, broadcast, evaluate
    /// proximity and dispatch alerts.
    pub async fn location_update(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
    ) -> Result<LocationAck> {
        if !geo::is_valid_coordinate(latitude, longitude) {
            return Err(EngineError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(EngineError::InvalidAccuracy { accuracy });
        }

        let sample = LocationSample::new(latitude, longitude, accuracy);
        let profile = self.users.set_location(user_id, sample.clone()).await?;

        self.registry.broadcast(ServerEvent::LocationUpdated {
            user_id: user_id.to_string(),
            latitude,
            longitude,
            accuracy,
            timestamp: sample.captured_at,
        });

        let evaluation = self
            .evaluator
            .evaluate(
                user_id,
                &sample,
                &profile.saved_relatives,
                self.resolver.as_ref(),
            )
            .await?;
        self.dispatcher
            .dispatch(user_id, &sample, &evaluation.transitions)
            .await?;

        Ok(LocationAck {
            timestamp: sample.captured_at,
            nearby: evaluation.nearby.iter().map(NearbySummary::from).collect(),
        })
    }

    /// Disable location sharing and tell everyone.
    pub async fn stop_location_sharing(&self, user_id: &str) -> Result<()> {
        self.users.set_sharing(user_id, false).await?;
        self.registry.broadcast(ServerEvent::LocationSharingDisabled {
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    /// Persist a direct message, then relay the plaintext to the recipient
    /// if they are online.
    pub async fn send_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
        encrypted_content: Option<String>,
    ) -> Result<()> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender: sender_id.to_string(),
            recipient: recipient_id.to_string(),
            // Encryption at rest is the store collaborator's concern; a
            // deployment without it stores the plaintext as-is.
            encrypted_content: encrypted_content.unwrap_or_else(|| content.to_string()),
            is_read: false,
            sent_at: Utc::now(),
        };
        self.messages.append(message).await?;
        self.relay.relay(sender_id, recipient_id, content);
        Ok(())
    }

    pub fn notify_typing(&self, sender_id: &str, recipient_id: &str, is_typing: bool) {
        self.relay.notify_typing(sender_id, recipient_id, is_typing);
    }

    pub fn call_offer(&self, caller_id: &str, recipient_id: &str, caller_conn: &ConnId) {
        self.relay.call_offer(caller_id, recipient_id, caller_conn);
    }

    pub fn call_accept(&self, caller_id: &str, recipient_conn: &ConnId) {
        self.relay.call_accept(caller_id, recipient_conn);
    }

    /// Tracked proximity pairs, for the daemon stats line.
    pub fn tracked_pairs(&self) -> usize {
        self.evaluator.tracked_pairs()
    }
}
