//! Relative (contact) management
//!
//! Operation layer behind the contact endpoints: register a phone number
//! for proximity monitoring, list/update/remove, manual location updates
//! and the location-sharing toggle. HTTP routing and authentication live
//! outside the engine; callers arrive here already authenticated.

use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{EngineError, Result};
use crate::geo;
use crate::schema::{Contact, LocationSample, UserProfile};
use crate::store::UserStore;

static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?\(?[0-9]{3}\)?[-\s.]?[0-9]{3}[-\s.]?[0-9]{4,6}$").unwrap());

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 50;
const NOTES_MAX: usize = 200;

/// A contact registration request, pre-validation.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub phone_number: String,
    pub name: String,
    pub notes: Option<String>,
}

/// Partial update to an existing contact.
#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub notes: Option<String>,
}

pub struct ContactsService {
    users: Arc<dyn UserStore>,
}

impl ContactsService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Register a relative for proximity monitoring.
    ///
    /// Fails with `DuplicateContact` if the phone number is already in the
    /// owner's set.
    pub async fn add(&self, owner: &str, new: NewContact) -> Result<Contact> {
        let phone_number = validate_phone(&new.phone_number)?;
        let name = validate_name(&new.name)?;
        let notes = validate_notes(new.notes.as_deref())?;

        let mut profile = self.profile(owner).await?;
        if profile
            .saved_relatives
            .iter()
            .any(|c| c.phone_number == phone_number)
        {
            return Err(EngineError::DuplicateContact { phone_number });
        }

        let contact = Contact {
            phone_number,
            name,
            notes,
            added_at: Utc::now(),
        };
        profile.saved_relatives.push(contact.clone());
        self.users.upsert(profile).await?;
        Ok(contact)
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<Contact>> {
        Ok(self.profile(owner).await?.saved_relatives)
    }

    /// Update the name and/or notes of a registered relative.
    pub async fn update(
        &self,
        owner: &str,
        phone_number: &str,
        update: ContactUpdate,
    ) -> Result<Contact> {
        let name = update.name.map(|n| validate_name(&n)).transpose()?;
        let notes = update.notes.map(|n| validate_notes(Some(&n))).transpose()?;

        let mut profile = self.profile(owner).await?;
        let contact = profile
            .saved_relatives
            .iter_mut()
            .find(|c| c.phone_number == phone_number)
            .ok_or_else(|| EngineError::ContactNotFound {
                phone_number: phone_number.to_string(),
            })?;

        if let Some(name) = name {
            contact.name = name;
        }
        if let Some(notes) = notes {
            contact.notes = notes;
        }
        let updated = contact.clone();
        self.users.upsert(profile).await?;
        Ok(updated)
    }

    /// Remove a relative from monitoring, returning how many remain.
    pub async fn remove(&self, owner: &str, phone_number: &str) -> Result<usize> {
        let mut profile = self.profile(owner).await?;
        let before = profile.saved_relatives.len();
        profile
            .saved_relatives
            .retain(|c| c.phone_number != phone_number);
        if profile.saved_relatives.len() == before {
            return Err(EngineError::ContactNotFound {
                phone_number: phone_number.to_string(),
            });
        }
        let remaining = profile.saved_relatives.len();
        self.users.upsert(profile).await?;
        Ok(remaining)
    }

    /// Manual location update (the non-socket path).
    pub async fn set_location(
        &self,
        owner: &str,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
    ) -> Result<LocationSample> {
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
        let profile = self.users.set_location(owner, sample).await?;
        Ok(profile.current_location.expect("location just set"))
    }

    /// Enable or disable location sharing.
    pub async fn set_sharing(&self, owner: &str, enabled: bool) -> Result<bool> {
        let profile = self.users.set_sharing(owner, enabled).await?;
        Ok(profile.location_sharing_enabled)
    }

    async fn profile(&self, owner: &str) -> Result<UserProfile> {
        self.users
            .get(owner)
            .await?
            .ok_or_else(|| EngineError::UserNotFound {
                id: owner.to_string(),
            })
    }
}

fn validate_phone(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if PHONE_REGEX.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(EngineError::InvalidPhoneNumber {
            number: raw.to_string(),
        })
    }
}

fn validate_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if (NAME_MIN..=NAME_MAX).contains(&trimmed.chars().count()) {
        Ok(trimmed.to_string())
    } else {
        Err(EngineError::InvalidField {
            field: "name",
            message: format!("must be between {NAME_MIN} and {NAME_MAX} characters"),
        })
    }
}

fn validate_notes(raw: Option<&str>) -> Result<String> {
    let trimmed = raw.unwrap_or_default().trim();
    if trimmed.chars().count() <= NOTES_MAX {
        Ok(trimmed.to_string())
    } else {
        Err(EngineError::InvalidField {
            field: "notes",
            message: format!("must not exceed {NOTES_MAX} characters"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;

    async fn service_with_user(id: &str) -> ContactsService {
        let users = MemoryUserStore::new();
        users.upsert(UserProfile::new(id)).await.unwrap();
        ContactsService::new(users)
    }

    fn new_contact(phone: &str) -> NewContact {
        NewContact {
            phone_number: phone.to_string(),
            name: "Grandma".to_string(),
            notes: None,
        }
    }

    #[test]
    fn phone_pattern_accepts_common_formats() {
        for number in [
            "5551234567",
            "555-123-4567",
            "555.123.4567",
            "555 123 4567",
            "(555)123-4567",
            "+15551234567",
        ] {
            assert!(validate_phone(number).is_ok(), "rejected {number}");
        }
    }

    #[test]
    fn phone_pattern_rejects_garbage() {
        for number in ["", "12", "abc-def-ghij", "555-12-34567890abc"] {
            assert!(validate_phone(number).is_err(), "accepted {number}");
        }
    }

    #[tokio::test]
    async fn add_rejects_duplicate_phone() {
        let service = service_with_user("u1").await;
        service.add("u1", new_contact("555-123-4567")).await.unwrap();
        let err = service
            .add("u1", new_contact("555-123-4567"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateContact { .. }));
        assert_eq!(service.list("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_short_name() {
        let service = service_with_user("u1").await;
        let err = service
            .add(
                "u1",
                NewContact {
                    phone_number: "555-123-4567".into(),
                    name: "a".into(),
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidField { field: "name", .. }));
    }

    #[tokio::test]
    async fn update_missing_contact_is_not_found() {
        let service = service_with_user("u1").await;
        let err = service
            .update("u1", "555-000-0000", ContactUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ContactNotFound { .. }));
    }

    #[tokio::test]
    async fn remove_returns_remaining_count() {
        let service = service_with_user("u1").await;
        service.add("u1", new_contact("555-123-4567")).await.unwrap();
        service.add("u1", new_contact("555-765-4321")).await.unwrap();
        assert_eq!(service.remove("u1", "555-123-4567").await.unwrap(), 1);
        let err = service.remove("u1", "555-123-4567").await.unwrap_err();
        assert!(matches!(err, EngineError::ContactNotFound { .. }));
    }

    #[tokio::test]
    async fn manual_location_rejects_out_of_range() {
        let service = service_with_user("u1").await;
        let err = service.set_location("u1", 0.0, 200.0, 0.0).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidCoordinates { .. }));
        assert!(err.is_validation());
    }
}
