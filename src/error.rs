//! Error types and wire codes for safechat-engine

use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid coordinates: lat {latitude}, lon {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Invalid accuracy: {accuracy}")]
    InvalidAccuracy { accuracy: f64 },

    #[error("Invalid phone number format: {number}")]
    InvalidPhoneNumber { number: String },

    #[error("Invalid {field}: {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Alert not found: {id}")]
    AlertNotFound { id: String },

    #[error("Relative not found: {phone_number}")]
    ContactNotFound { phone_number: String },

    #[error("Already monitoring this phone number: {phone_number}")]
    DuplicateContact { phone_number: String },

    #[error("Session no longer registered for user {user_id}")]
    StaleSession { user_id: String },

    #[error("Persistence failure: {message}")]
    Persistence { message: String },
}

impl EngineError {
    /// Stable code carried on protocol-level error events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCoordinates { .. } => "invalid_coordinates",
            Self::InvalidAccuracy { .. } => "invalid_accuracy",
            Self::InvalidPhoneNumber { .. } => "invalid_phone_number",
            Self::InvalidField { .. } => "invalid_field",
            Self::UserNotFound { .. } => "user_not_found",
            Self::AlertNotFound { .. } => "alert_not_found",
            Self::ContactNotFound { .. } => "relative_not_found",
            Self::DuplicateContact { .. } => "duplicate_relative",
            Self::StaleSession { .. } => "stale_session",
            Self::Persistence { .. } => "persistence_failure",
        }
    }

    /// Validation errors are rejected synchronously at ingestion and never
    /// reach the proximity evaluator.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidCoordinates { .. }
                | Self::InvalidAccuracy { .. }
                | Self::InvalidPhoneNumber { .. }
                | Self::InvalidField { .. }
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
