//! Socket server protocol message types
//!
//! Defines the JSON message format for client-server communication. Tags
//! and fields are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::proximity::NearbyContact;
use crate::schema::AlertRecord;

/// Client-to-server event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Identify the connection; moves the session to OPEN
    UserOnline { user_id: String },
    /// GPS reading from the client
    UpdateLocation {
        user_id: String,
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        accuracy: f64,
    },
    /// Direct message; the body is persisted encrypted before relay
    SendMessage {
        sender_id: String,
        recipient_id: String,
        content: String,
        #[serde(default)]
        encrypted_content: Option<String>,
    },
    /// Typing indicator on
    Typing {
        sender_id: String,
        recipient_id: String,
    },
    /// Typing indicator off
    StopTyping {
        sender_id: String,
        recipient_id: String,
    },
    /// Disable location sharing for the user
    StopLocationSharing { user_id: String },
    /// Offer a call to another user
    InitiateCall {
        caller_id: String,
        recipient_id: String,
    },
    /// Accept a pending call
    AcceptCall { caller_id: String },
}

/// Presence status carried on userStatusChanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// A relative currently within the alert threshold, as reported on the
/// locationTracked ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbySummary {
    pub phone_number: String,
    pub name: String,
    #[serde(rename = "distance")]
    pub distance_km: f64,
    /// Compass direction from the user toward the relative
    pub direction: String,
}

impl From<&NearbyContact> for NearbySummary {
    fn from(nearby: &NearbyContact) -> Self {
        Self {
            phone_number: nearby.contact.phone_number.clone(),
            name: nearby.contact.name.clone(),
            distance_km: nearby.distance_km,
            direction: nearby.direction.to_string(),
        }
    }
}

/// Server-to-client event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// A user's presence changed; broadcast to all sessions
    UserStatusChanged {
        user_id: String,
        status: PresenceStatus,
    },
    /// Location update acknowledged; carries the live nearby list
    LocationTracked {
        success: bool,
        message: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        nearby: Vec<NearbySummary>,
    },
    /// Location update declined
    LocationError { message: String },
    /// A user's location changed; broadcast to all sessions
    LocationUpdated {
        user_id: String,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        timestamp: DateTime<Utc>,
    },
    /// Proximity alert pushed to the monitoring user
    ProximityAlert {
        #[serde(flatten)]
        alert: AlertRecord,
    },
    /// Incoming direct message
    ReceiveMessage {
        sender_id: String,
        content: String,
        timestamp: DateTime<Utc>,
    },
    /// Sender started typing
    UserTyping { user_id: String },
    /// Sender stopped typing
    UserStopTyping { user_id: String },
    /// A user disabled location sharing; broadcast to all sessions
    LocationSharingDisabled { user_id: String },
    /// Sharing toggle acknowledged
    LocationSharingToggled { enabled: bool },
    /// Call offer relayed to the recipient
    IncomingCall {
        caller_id: String,
        caller_session_id: String,
    },
    /// Call acceptance relayed back to the caller
    CallAccepted { recipient_session_id: String },
    /// Protocol-level error
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Classification, GeoPoint};

    #[test]
    fn client_event_parses_wire_names() {
        let json = r#"{"type":"userOnline","userId":"u1"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::UserOnline { user_id } => assert_eq!(user_id, "u1"),
            other => panic!("expected userOnline, got {other:?}"),
        }

        let json = r#"{"type":"updateLocation","userId":"u1","latitude":37.7,"longitude":-122.4}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::UpdateLocation {
                latitude, accuracy, ..
            } => {
                assert_eq!(latitude, 37.7);
                assert_eq!(accuracy, 0.0); // defaulted
            }
            other => panic!("expected updateLocation, got {other:?}"),
        }
    }

    #[test]
    fn send_message_allows_missing_ciphertext() {
        let json = r#"{"type":"sendMessage","senderId":"a","recipientId":"b","content":"hi"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SendMessage {
                encrypted_content, ..
            } => assert!(encrypted_content.is_none()),
            other => panic!("expected sendMessage, got {other:?}"),
        }
    }

    #[test]
    fn status_event_serializes_lowercase_status() {
        let event = ServerEvent::UserStatusChanged {
            user_id: "u1".into(),
            status: PresenceStatus::Online,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "userStatusChanged");
        assert_eq!(json["status"], "online");
    }

    #[test]
    fn proximity_alert_flattens_record_fields() {
        let event = ServerEvent::ProximityAlert {
            alert: AlertRecord {
                id: "a1".into(),
                owner: "u1".into(),
                relative_name: "Mom".into(),
                relative_phone_number: "555-123-4567".into(),
                distance_km: 0.013,
                user_location: GeoPoint {
                    latitude: 37.7749,
                    longitude: -122.4194,
                },
                relative_location: Some(GeoPoint {
                    latitude: 37.7750,
                    longitude: -122.4195,
                }),
                classification: Classification::Entering,
                dismissed: false,
                dismissed_at: None,
                created_at: Utc::now(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "proximityAlert");
        assert_eq!(json["id"], "a1");
        assert_eq!(json["alertType"], "ENTERING");
        assert_eq!(json["relativeName"], "Mom");
    }

    #[test]
    fn location_tracked_omits_empty_nearby() {
        let event = ServerEvent::LocationTracked {
            success: true,
            message: "Location updated".into(),
            timestamp: Utc::now(),
            nearby: Vec::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("nearby").is_none());
    }
}
