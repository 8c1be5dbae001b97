//! Message and typing relay
//!
//! Stateless pass-through to the recipient's active session. Offline
//! recipients make every relay a silent no-op: message persistence happens
//! before the relay is attempted, and there is no queued redelivery.

use std::sync::Arc;

use chrono::Utc;

use crate::socket_server::presence::PresenceRegistry;
use crate::socket_server::protocol::ServerEvent;

pub struct MessageRelay {
    registry: Arc<PresenceRegistry>,
}

impl MessageRelay {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver a chat message to the recipient if they have a session.
    pub fn relay(&self, sender_id: &str, recipient_id: &str, content: &str) {
        self.push(
            recipient_id,
            ServerEvent::ReceiveMessage {
                sender_id: sender_id.to_string(),
                content: content.to_string(),
                timestamp: Utc::now(),
            },
        );
    }

    /// Forward a typing-state change to the recipient.
    ///
    /// No debouncing here; throttling keystroke-driven calls is the
    /// caller's responsibility.
    pub fn notify_typing(&self, sender_id: &str, recipient_id: &str, is_typing: bool) {
        let event = if is_typing {
            ServerEvent::UserTyping {
                user_id: sender_id.to_string(),
            }
        } else {
            ServerEvent::UserStopTyping {
                user_id: sender_id.to_string(),
            }
        };
        self.push(recipient_id, event);
    }

    /// Relay a call offer to the recipient.
    pub fn call_offer(&self, caller_id: &str, recipient_id: &str, caller_session_id: &str) {
        self.push(
            recipient_id,
            ServerEvent::IncomingCall {
                caller_id: caller_id.to_string(),
                caller_session_id: caller_session_id.to_string(),
            },
        );
    }

    /// Relay a call acceptance back to the caller.
    pub fn call_accept(&self, caller_id: &str, recipient_session_id: &str) {
        self.push(
            caller_id,
            ServerEvent::CallAccepted {
                recipient_session_id: recipient_session_id.to_string(),
            },
        );
    }

    fn push(&self, recipient_id: &str, event: ServerEvent) {
        let Some(session) = self.registry.session_for(recipient_id) else {
            return;
        };
        if session.push(event).is_err() {
            tracing::debug!("Stale session for {}, dropping relay", recipient_id);
        }
    }
}
