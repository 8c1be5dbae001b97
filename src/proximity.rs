//! Proximity evaluation
//!
//! Classifies each location update against the user's registered relatives
//! and the last known state per (user, relative) pair. Only the transition
//! edges ENTERING and EXITING produce alert-worthy events; steady-state
//! readings inside the threshold are reported as ambient "nearby" signals
//! so the UI can show a live badge without flooding the alert log.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{EngineError, Result};
use crate::geo;
use crate::schema::{Classification, Contact, LocationSample, UserId};

/// Default alert threshold in kilometers
pub const DEFAULT_THRESHOLD_KM: f64 = 1.0;

/// Capability to resolve a relative's phone number to a last known
/// location.
///
/// Phone-to-identity resolution is owned by an external collaborator; the
/// engine only depends on this seam. The default implementation resolves
/// nothing.
#[async_trait]
pub trait ContactLocationResolver: Send + Sync {
    async fn location_of(&self, phone_number: &str) -> Option<LocationSample>;
}

/// Default resolver: the phone directory join is not wired up, so no
/// relative ever resolves to a location.
pub struct UnresolvedDirectory;

#[async_trait]
impl ContactLocationResolver for UnresolvedDirectory {
    async fn location_of(&self, _phone_number: &str) -> Option<LocationSample> {
        None
    }
}

/// A classification change for one (user, relative) pair.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub contact: Contact,
    pub distance_km: f64,
    pub classification: Classification,
    pub relative_location: LocationSample,
}

/// A relative currently inside the threshold, with display-ready direction.
#[derive(Debug, Clone)]
pub struct NearbyContact {
    pub contact: Contact,
    pub distance_km: f64,
    pub direction: &'static str,
}

/// Result of evaluating one location update.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Transition events in input contact order, one per pair with a
    /// state change
    pub transitions: Vec<TransitionEvent>,
    /// Every relative currently within the threshold
    pub nearby: Vec<NearbyContact>,
}

#[derive(Debug, Clone, Copy)]
struct PairState {
    distance_km: f64,
    within: bool,
}

/// Stateful transition classifier.
///
/// Holds the last computed state per (user, relative) pair in memory. The
/// state survives session churn so debouncing stays correct across
/// reconnects.
pub struct ProximityEvaluator {
    threshold_km: f64,
    state: Mutex<HashMap<(UserId, String), PairState>>,
}

impl ProximityEvaluator {
    pub fn new(threshold_km: f64) -> Self {
        Self {
            threshold_km,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn threshold_km(&self) -> f64 {
        self.threshold_km
    }

    /// Evaluate a location update against the user's relatives.
    ///
    /// Rejects an invalid sample without touching pair state. Relatives
    /// whose location cannot be resolved, or resolves to garbage
    /// coordinates, are skipped. Pair state is updated unconditionally for
    /// every resolved reading, including non-transition ones.
    pub async fn evaluate(
        &self,
        user_id: &str,
        sample: &LocationSample,
        contacts: &[Contact],
        resolver: &dyn ContactLocationResolver,
    ) -> Result<Evaluation> {
        if !sample.is_valid() {
            return Err(EngineError::InvalidCoordinates {
                latitude: sample.latitude,
                longitude: sample.longitude,
            });
        }

        // Resolve before classifying: the state lock is never held across
        // an await.
        let mut resolved = Vec::with_capacity(contacts.len());
        for contact in contacts {
            if let Some(location) = resolver.location_of(&contact.phone_number).await {
                if location.is_valid() {
                    resolved.push((contact.clone(), location));
                }
            }
        }

        let mut evaluation = Evaluation::default();
        let mut state = self.state.lock();
        for (contact, location) in resolved {
            let distance_km = geo::distance_km(
                sample.latitude,
                sample.longitude,
                location.latitude,
                location.longitude,
            );
            let within = distance_km <= self.threshold_km;

            let key = (user_id.to_string(), contact.phone_number.clone());
            let was_within = state.get(&key).map(|s| s.within);
            state.insert(
                key,
                PairState {
                    distance_km,
                    within,
                },
            );

            if within {
                let bearing = geo::bearing_degrees(
                    sample.latitude,
                    sample.longitude,
                    location.latitude,
                    location.longitude,
                );
                evaluation.nearby.push(NearbyContact {
                    contact: contact.clone(),
                    distance_km,
                    direction: geo::bearing_to_compass(bearing),
                });
            }

            let classification = match (was_within, within) {
                // First reading inside, or crossing in from outside
                (None, true) | (Some(false), true) => Some(Classification::Entering),
                (Some(true), false) => Some(Classification::Exiting),
                // Steady state, inside or outside: no transition
                _ => None,
            };
            if let Some(classification) = classification {
                evaluation.transitions.push(TransitionEvent {
                    contact,
                    distance_km,
                    classification,
                    relative_location: location,
                });
            }
        }

        Ok(evaluation)
    }

    /// Last computed distance for a pair, if any reading has resolved.
    pub fn last_distance(&self, user_id: &str, phone_number: &str) -> Option<f64> {
        self.state
            .lock()
            .get(&(user_id.to_string(), phone_number.to_string()))
            .map(|s| s.distance_km)
    }

    /// Number of tracked pairs, for the daemon stats line.
    pub fn tracked_pairs(&self) -> usize {
        self.state.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// Resolver over a fixed phone -> location table.
    struct FixedResolver(HashMap<String, LocationSample>);

    #[async_trait]
    impl ContactLocationResolver for FixedResolver {
        async fn location_of(&self, phone_number: &str) -> Option<LocationSample> {
            self.0.get(phone_number).cloned()
        }
    }

    fn contact(phone: &str) -> Contact {
        Contact {
            phone_number: phone.to_string(),
            name: "Mom".to_string(),
            notes: String::new(),
            added_at: Utc::now(),
        }
    }

    fn sample(latitude: f64, longitude: f64) -> LocationSample {
        LocationSample::new(latitude, longitude, 5.0)
    }

    /// Distance north of the equator origin that works out to `km`.
    fn point_at_km(km: f64) -> LocationSample {
        sample(km / 111.195, 0.0)
    }

    #[tokio::test]
    async fn transition_sequence_fires_exactly_on_edges() {
        let evaluator = ProximityEvaluator::new(DEFAULT_THRESHOLD_KM);
        let user_loc = sample(0.0, 0.0);
        let contacts = vec![contact("555-123-4567")];

        let mut emitted = Vec::new();
        for contact_km in [2.0, 0.8, 0.8, 1.5, 0.3] {
            let resolver = FixedResolver(HashMap::from([(
                "555-123-4567".to_string(),
                point_at_km(contact_km),
            )]));
            let eval = evaluator
                .evaluate("u1", &user_loc, &contacts, &resolver)
                .await
                .unwrap();
            assert!(eval.transitions.len() <= 1);
            emitted.push(eval.transitions.first().map(|t| t.classification));
        }

        assert_eq!(
            emitted,
            vec![
                None,
                Some(Classification::Entering),
                None,
                Some(Classification::Exiting),
                Some(Classification::Entering),
            ]
        );
    }

    #[tokio::test]
    async fn steady_inside_still_reports_ambient_nearby() {
        let evaluator = ProximityEvaluator::new(DEFAULT_THRESHOLD_KM);
        let user_loc = sample(0.0, 0.0);
        let contacts = vec![contact("555-123-4567")];
        let resolver = FixedResolver(HashMap::from([(
            "555-123-4567".to_string(),
            point_at_km(0.5),
        )]));

        let first = evaluator
            .evaluate("u1", &user_loc, &contacts, &resolver)
            .await
            .unwrap();
        assert_eq!(first.transitions.len(), 1);
        assert_eq!(first.nearby.len(), 1);
        assert_eq!(first.nearby[0].direction, "N");

        let second = evaluator
            .evaluate("u1", &user_loc, &contacts, &resolver)
            .await
            .unwrap();
        assert!(second.transitions.is_empty());
        assert_eq!(second.nearby.len(), 1);
        assert!((second.nearby[0].distance_km - 0.5).abs() < 0.01);

        let tracked = evaluator.last_distance("u1", "555-123-4567").unwrap();
        assert!((tracked - 0.5).abs() < 0.01);
    }

    #[tokio::test]
    async fn first_reading_inside_threshold_is_entering() {
        let evaluator = ProximityEvaluator::new(DEFAULT_THRESHOLD_KM);
        let contacts = vec![contact("555-123-4567")];
        let resolver = FixedResolver(HashMap::from([(
            "555-123-4567".to_string(),
            sample(37.7750, -122.4195),
        )]));

        let eval = evaluator
            .evaluate("u1", &sample(37.7749, -122.4194), &contacts, &resolver)
            .await
            .unwrap();
        assert_eq!(eval.transitions.len(), 1);
        assert_eq!(eval.transitions[0].classification, Classification::Entering);
        assert!((eval.transitions[0].distance_km - 0.013).abs() < 0.005);
    }

    #[tokio::test]
    async fn invalid_sample_is_rejected_without_state_change() {
        let evaluator = ProximityEvaluator::new(DEFAULT_THRESHOLD_KM);
        let contacts = vec![contact("555-123-4567")];
        let resolver = FixedResolver(HashMap::from([(
            "555-123-4567".to_string(),
            point_at_km(0.5),
        )]));

        for _ in 0..2 {
            let err = evaluator
                .evaluate("u1", &sample(0.0, 200.0), &contacts, &resolver)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidCoordinates { .. }));
        }
        assert_eq!(evaluator.tracked_pairs(), 0);

        // A later valid reading inside the threshold is still the first
        // reading for the pair, so it classifies as ENTERING.
        let eval = evaluator
            .evaluate("u1", &sample(0.0, 0.0), &contacts, &resolver)
            .await
            .unwrap();
        assert_eq!(eval.transitions[0].classification, Classification::Entering);
    }

    #[tokio::test]
    async fn unresolved_relatives_are_skipped() {
        let evaluator = ProximityEvaluator::new(DEFAULT_THRESHOLD_KM);
        let contacts = vec![contact("555-123-4567"), contact("555-999-0000")];
        // Only one of the two numbers resolves
        let resolver = FixedResolver(HashMap::from([(
            "555-999-0000".to_string(),
            point_at_km(0.2),
        )]));

        let eval = evaluator
            .evaluate("u1", &sample(0.0, 0.0), &contacts, &resolver)
            .await
            .unwrap();
        assert_eq!(eval.transitions.len(), 1);
        assert_eq!(eval.transitions[0].contact.phone_number, "555-999-0000");
        assert_eq!(evaluator.tracked_pairs(), 1);
    }

    #[tokio::test]
    async fn default_resolver_produces_no_events() {
        let evaluator = ProximityEvaluator::new(DEFAULT_THRESHOLD_KM);
        let contacts = vec![contact("555-123-4567")];
        let eval = evaluator
            .evaluate("u1", &sample(0.0, 0.0), &contacts, &UnresolvedDirectory)
            .await
            .unwrap();
        assert!(eval.transitions.is_empty());
        assert!(eval.nearby.is_empty());
    }

    #[tokio::test]
    async fn pairs_are_tracked_per_user() {
        let evaluator = ProximityEvaluator::new(DEFAULT_THRESHOLD_KM);
        let contacts = vec![contact("555-123-4567")];
        let resolver = FixedResolver(HashMap::from([(
            "555-123-4567".to_string(),
            point_at_km(0.5),
        )]));

        let a = evaluator
            .evaluate("u1", &sample(0.0, 0.0), &contacts, &resolver)
            .await
            .unwrap();
        // Same relative, different monitoring user: independent state
        let b = evaluator
            .evaluate("u2", &sample(0.0, 0.0), &contacts, &resolver)
            .await
            .unwrap();
        assert_eq!(a.transitions.len(), 1);
        assert_eq!(b.transitions.len(), 1);
        assert_eq!(evaluator.tracked_pairs(), 2);
    }
}
