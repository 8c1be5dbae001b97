//! External store collaborators
//!
//! The engine treats persistence as a key-value/document collaborator
//! reachable through lookup-by-id and upsert operations. The traits here
//! are that contract; the in-memory implementations back the daemon and the
//! tests. A database-backed deployment supplies its own implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{EngineError, Result};
use crate::schema::{AlertRecord, LocationSample, Message, UserProfile};

/// Page query over the alert history.
#[derive(Debug, Clone)]
pub struct AlertQuery {
    pub limit: usize,
    pub skip: usize,
    /// Filter on the dismissed flag
    pub dismissed: bool,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            skip: 0,
            dismissed: false,
        }
    }
}

/// User document store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<UserProfile>>;

    async fn upsert(&self, profile: UserProfile) -> Result<()>;

    /// Replace the user's current location, returning the updated profile.
    async fn set_location(&self, id: &str, sample: LocationSample) -> Result<UserProfile>;

    /// Flip the location-sharing flag, returning the updated profile.
    async fn set_sharing(&self, id: &str, enabled: bool) -> Result<UserProfile>;
}

/// Append-only proximity alert store.
///
/// Records are never deleted by the engine; retention is an external
/// concern.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn append(&self, record: AlertRecord) -> Result<()>;

    async fn get(&self, owner: &str, id: &str) -> Result<Option<AlertRecord>>;

    async fn set_dismissed(&self, owner: &str, id: &str, at: DateTime<Utc>)
        -> Result<AlertRecord>;

    /// Newest-first page matching the query, plus the total match count.
    async fn page(&self, owner: &str, query: &AlertQuery) -> Result<(Vec<AlertRecord>, usize)>;
}

/// Message store; bodies arrive already encrypted at rest.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: Message) -> Result<Message>;
}

/// In-memory user store for the daemon default and tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryUserStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn upsert(&self, profile: UserProfile) -> Result<()> {
        self.users.write().insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn set_location(&self, id: &str, sample: LocationSample) -> Result<UserProfile> {
        let mut users = self.users.write();
        let profile = users.get_mut(id).ok_or_else(|| EngineError::UserNotFound {
            id: id.to_string(),
        })?;
        profile.current_location = Some(sample);
        Ok(profile.clone())
    }

    async fn set_sharing(&self, id: &str, enabled: bool) -> Result<UserProfile> {
        let mut users = self.users.write();
        let profile = users.get_mut(id).ok_or_else(|| EngineError::UserNotFound {
            id: id.to_string(),
        })?;
        profile.location_sharing_enabled = enabled;
        Ok(profile.clone())
    }
}

/// In-memory alert store, append order preserved per owner.
#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: RwLock<HashMap<String, Vec<AlertRecord>>>,
}

impl MemoryAlertStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn append(&self, record: AlertRecord) -> Result<()> {
        self.alerts
            .write()
            .entry(record.owner.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn get(&self, owner: &str, id: &str) -> Result<Option<AlertRecord>> {
        Ok(self
            .alerts
            .read()
            .get(owner)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned()))
    }

    async fn set_dismissed(
        &self,
        owner: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<AlertRecord> {
        let mut alerts = self.alerts.write();
        let record = alerts
            .get_mut(owner)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| EngineError::AlertNotFound { id: id.to_string() })?;
        record.dismissed = true;
        record.dismissed_at = Some(at);
        Ok(record.clone())
    }

    async fn page(&self, owner: &str, query: &AlertQuery) -> Result<(Vec<AlertRecord>, usize)> {
        let alerts = self.alerts.read();
        let matching: Vec<&AlertRecord> = alerts
            .get(owner)
            .map(|records| {
                records
                    .iter()
                    .rev() // newest first, append order preserved
                    .filter(|r| r.dismissed == query.dismissed)
                    .collect()
            })
            .unwrap_or_default();
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(query.skip)
            .take(query.limit)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

/// In-memory message store.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, message: Message) -> Result<Message> {
        self.messages.write().push(message.clone());
        Ok(message)
    }
}
