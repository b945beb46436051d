//! In-memory store for issued passcode sessions.
//!
//! The store is process-local by design: records live only as long as the
//! server and are evicted by the [`Sweeper`](crate::otp::sweeper::Sweeper)
//! or by the post-verification grace cleanup.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// A single issued passcode bound to an opaque session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub code: String,
    pub subject: String,
    pub device_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// A record can be verified (or replayed on re-issue) while it is
    /// unexpired and unused.
    #[must_use]
    pub fn is_verifiable(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }
}

/// Map of session id to record, serialized behind a single lock.
///
/// The lock is held only for the duration of a map operation, so each
/// operation observes and mutates the store atomically.
#[derive(Debug, Default)]
pub struct CodeStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl CodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, record: SessionRecord) {
        self.records
            .lock()
            .await
            .insert(record.session_id.clone(), record);
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.records.lock().await.get(session_id).cloned()
    }

    pub async fn delete(&self, session_id: &str) {
        self.records.lock().await.remove(session_id);
    }

    /// Snapshot of every stored record, expired or not.
    pub async fn list(&self) -> Vec<SessionRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Flip `used` to true for an unused record, returning the updated
    /// record. Returns `None` when the session is unknown or the code was
    /// already consumed, so two racing verifications cannot both succeed.
    pub async fn mark_used(&self, session_id: &str) -> Option<SessionRecord> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(session_id)?;
        if record.used {
            return None;
        }
        record.used = true;
        Some(record.clone())
    }

    /// Drop every record whose expiry has passed, returning the eviction count.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        before - records.len()
    }
}
