//! Domain data model for presence, messaging and proximity alerts
//!
//! These records travel two ways: persisted through the store collaborators
//! and serialized onto the socket protocol. Field names follow the wire
//! (camelCase) in both cases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo;

/// Opaque stable user identifier, owned by the external user store.
pub type UserId = String;

/// A single GPS reading for a user.
///
/// Immutable once recorded; each new sample supersedes the previous one.
/// History lives only in the alert log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported GPS accuracy in meters
    pub accuracy: f64,
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            captured_at: Utc::now(),
        }
    }

    /// Coordinates finite and in range, accuracy non-negative.
    pub fn is_valid(&self) -> bool {
        geo::is_valid_coordinate(self.latitude, self.longitude)
            && self.accuracy.is_finite()
            && self.accuracy >= 0.0
    }
}

/// Bare coordinate pair stored on alert records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&LocationSample> for GeoPoint {
    fn from(sample: &LocationSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
        }
    }
}

/// A relative registered for proximity monitoring.
///
/// Keyed by phone number within the owner's contact set. A contact carries
/// no location of its own; location is resolved only if the phone number
/// maps to a registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub phone_number: String,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    pub added_at: DateTime<Utc>,
}

/// Proximity transition label for a (user, contact) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Entering,
    Exiting,
    InRange,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Entering => write!(f, "ENTERING"),
            Classification::Exiting => write!(f, "EXITING"),
            Classification::InRange => write!(f, "IN_RANGE"),
        }
    }
}

/// Persisted proximity alert.
///
/// Created on a classification transition, append-only. Dismissal is the
/// only mutation and repeat dismissals are a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: String,
    pub owner: UserId,
    pub relative_name: String,
    pub relative_phone_number: String,
    /// Distance in kilometers at the time of the transition
    #[serde(rename = "distance")]
    pub distance_km: f64,
    pub user_location: GeoPoint,
    pub relative_location: Option<GeoPoint>,
    #[serde(rename = "alertType")]
    pub classification: Classification,
    pub dismissed: bool,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Direct message as persisted by the external message store.
///
/// The body is encrypted at rest by an external collaborator; the engine
/// never inspects `encrypted_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: UserId,
    pub recipient: UserId,
    pub encrypted_content: String,
    pub is_read: bool,
    pub sent_at: DateTime<Utc>,
}

/// The slice of the external user document the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub saved_relatives: Vec<Contact>,
    #[serde(default)]
    pub current_location: Option<LocationSample>,
    #[serde(default)]
    pub location_sharing_enabled: bool,
}

impl UserProfile {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            saved_relatives: Vec::new(),
            current_location: None,
            location_sharing_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_wire_names() {
        assert_eq!(
            serde_json::to_string(&Classification::Entering).unwrap(),
            "\"ENTERING\""
        );
        assert_eq!(
            serde_json::to_string(&Classification::InRange).unwrap(),
            "\"IN_RANGE\""
        );
        let parsed: Classification = serde_json::from_str("\"EXITING\"").unwrap();
        assert_eq!(parsed, Classification::Exiting);
    }

    #[test]
    fn alert_record_serializes_flat_wire_fields() {
        let record = AlertRecord {
            id: "a1".into(),
            owner: "u1".into(),
            relative_name: "Mom".into(),
            relative_phone_number: "+1 (555) 123-4567".into(),
            distance_km: 0.42,
            user_location: GeoPoint {
                latitude: 37.0,
                longitude: -122.0,
            },
            relative_location: None,
            classification: Classification::Entering,
            dismissed: false,
            dismissed_at: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["alertType"], "ENTERING");
        assert_eq!(json["relativeName"], "Mom");
        assert_eq!(json["distance"], 0.42);
        assert!(json["dismissedAt"].is_null());
    }

    #[test]
    fn sample_validity_rejects_bad_accuracy() {
        let mut sample = LocationSample::new(10.0, 20.0, 5.0);
        assert!(sample.is_valid());
        sample.accuracy = -1.0;
        assert!(!sample.is_valid());
    }
}
