//! Alert dispatch
//!
//! Persists proximity alerts and pushes them to the affected user's active
//! session. The evaluator debounces unchanged states; the dispatcher adds a
//! second layer that suppresses identical repeats of the last dispatched
//! classification within a cooldown window. Alternating ENTERING/EXITING
//! flaps are never suppressed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::proximity::TransitionEvent;
use crate::schema::{AlertRecord, Classification, GeoPoint, LocationSample, UserId};
use crate::socket_server::presence::PresenceRegistry;
use crate::socket_server::protocol::ServerEvent;
use crate::store::{AlertQuery, AlertStore};

/// One page of alert history.
#[derive(Debug, Clone)]
pub struct AlertPage {
    pub alerts: Vec<AlertRecord>,
    pub total: usize,
    pub limit: usize,
    pub skip: usize,
    pub has_more: bool,
}

pub struct AlertDispatcher {
    store: Arc<dyn AlertStore>,
    registry: Arc<PresenceRegistry>,
    cooldown: Duration,
    last_dispatched: Mutex<HashMap<(UserId, String), (Classification, Instant)>>,
}

impl AlertDispatcher {
    pub fn new(
        store: Arc<dyn AlertStore>,
        registry: Arc<PresenceRegistry>,
        cooldown: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            cooldown,
            last_dispatched: Mutex::new(HashMap::new()),
        }
    }

    /// Persist and push alerts for a batch of transition events.
    ///
    /// Each record is persisted before the push; a store failure propagates
    /// to the caller and the evaluator's pair state is not rolled back. If
    /// the owner is offline the record is persisted without a push (no
    /// queued redelivery; clients poll history on reconnect). Pushes
    /// against a stale session are dropped and logged.
    pub async fn dispatch(
        &self,
        owner: &str,
        user_location: &LocationSample,
        events: &[TransitionEvent],
    ) -> Result<Vec<AlertRecord>> {
        let mut recorded = Vec::with_capacity(events.len());
        for event in events {
            if self.suppressed(owner, event) {
                tracing::debug!(
                    "Suppressing repeat {} alert for {} / {}",
                    event.classification,
                    owner,
                    event.contact.phone_number
                );
                continue;
            }

            let record = AlertRecord {
                id: Uuid::new_v4().to_string(),
                owner: owner.to_string(),
                relative_name: event.contact.name.clone(),
                relative_phone_number: event.contact.phone_number.clone(),
                distance_km: event.distance_km,
                user_location: GeoPoint::from(user_location),
                relative_location: Some(GeoPoint::from(&event.relative_location)),
                classification: event.classification,
                dismissed: false,
                dismissed_at: None,
                created_at: Utc::now(),
            };
            self.store.append(record.clone()).await?;
            self.note_dispatched(owner, event);

            if let Some(session) = self.registry.session_for(owner) {
                if session
                    .push(ServerEvent::ProximityAlert {
                        alert: record.clone(),
                    })
                    .is_err()
                {
                    tracing::debug!("Stale session for {}, dropping alert push", owner);
                }
            }
            recorded.push(record);
        }
        Ok(recorded)
    }

    /// Mark an alert dismissed.
    ///
    /// NotFound when the alert does not exist or belongs to someone else.
    /// Repeat dismissals succeed without touching `dismissed_at`.
    pub async fn dismiss(&self, owner: &str, alert_id: &str) -> Result<AlertRecord> {
        let existing = self
            .store
            .get(owner, alert_id)
            .await?
            .ok_or_else(|| EngineError::AlertNotFound {
                id: alert_id.to_string(),
            })?;
        if existing.dismissed {
            return Ok(existing);
        }
        self.store.set_dismissed(owner, alert_id, Utc::now()).await
    }

    /// Newest-first page of alert history.
    pub async fn history(&self, owner: &str, query: AlertQuery) -> Result<AlertPage> {
        let (alerts, total) = self.store.page(owner, &query).await?;
        Ok(AlertPage {
            alerts,
            total,
            has_more: query.skip + query.limit < total,
            limit: query.limit,
            skip: query.skip,
        })
    }

    fn suppressed(&self, owner: &str, event: &TransitionEvent) -> bool {
        if self.cooldown.is_zero() {
            return false;
        }
        let key = (owner.to_string(), event.contact.phone_number.clone());
        match self.last_dispatched.lock().get(&key) {
            Some((classification, at)) => {
                *classification == event.classification && at.elapsed() < self.cooldown
            }
            None => false,
        }
    }

    fn note_dispatched(&self, owner: &str, event: &TransitionEvent) {
        self.last_dispatched.lock().insert(
            (owner.to_string(), event.contact.phone_number.clone()),
            (event.classification, Instant::now()),
        );
    }
}
