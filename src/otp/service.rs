//! Code issuing and verification.
//!
//! The service owns the [`CodeStore`] and pushes every newly minted code
//! through the [`Broadcaster`]. Re-issuing against a session that is still
//! unexpired and unused is an idempotent replay: same code, no broadcast.

use crate::otp::{
    broadcast::{Broadcaster, Envelope},
    store::{CodeStore, SessionRecord},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::fmt::{self, Write};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const DEFAULT_CODE_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_USED_GRACE_SECONDS: u64 = 60;

/// Tunables for issuing and cleanup.
#[derive(Clone, Debug)]
pub struct OtpConfig {
    code_ttl: Duration,
    used_grace: std::time::Duration,
}

impl OtpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_ttl: Duration::seconds(DEFAULT_CODE_TTL_SECONDS),
            used_grace: std::time::Duration::from_secs(DEFAULT_USED_GRACE_SECONDS),
        }
    }

    /// Validity window of an issued code.
    #[must_use]
    pub fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }

    /// How long a consumed record lingers before deletion.
    #[must_use]
    pub fn with_used_grace(mut self, grace: std::time::Duration) -> Self {
        self.used_grace = grace;
        self
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a successful issue call.
#[derive(Clone, Debug)]
pub struct IssuedCode {
    pub session_id: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a successful verification.
#[derive(Clone, Debug)]
pub struct Verification {
    pub auth_token: String,
    pub subject: String,
    pub device_id: String,
    pub verified_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyError {
    UnknownSession,
    Expired,
    AlreadyUsed,
    InvalidCode,
}

impl VerifyError {
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::UnknownSession => "Invalid session ID",
            Self::Expired => "Code has expired",
            Self::AlreadyUsed => "Code has already been used",
            Self::InvalidCode => "Invalid code",
        }
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for VerifyError {}

/// Issues and verifies one-time passcodes.
#[derive(Debug)]
pub struct OtpService {
    config: OtpConfig,
    store: Arc<CodeStore>,
    broadcaster: Arc<Broadcaster>,
}

impl OtpService {
    #[must_use]
    pub fn new(config: OtpConfig, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            config,
            store: Arc::new(CodeStore::new()),
            broadcaster,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<CodeStore> {
        &self.store
    }

    /// Issue a code for `subject`, or replay an existing valid session.
    ///
    /// The caller is responsible for rejecting an empty subject; the
    /// subject itself is opaque and never validated for format.
    pub async fn issue(
        &self,
        subject: &str,
        device_id: Option<&str>,
        existing_session_id: Option<&str>,
    ) -> IssuedCode {
        let now = Utc::now();

        if let Some(existing) = existing_session_id {
            if let Some(record) = self.store.get(existing).await {
                if record.is_verifiable(now) {
                    debug!(session = %record.session_id, "replaying existing session code");
                    return IssuedCode {
                        session_id: record.session_id,
                        code: record.code,
                        expires_at: record.expires_at,
                    };
                }
            }
        }

        let record = SessionRecord {
            session_id: Uuid::new_v4().simple().to_string(),
            code: generate_code(),
            subject: subject.to_string(),
            device_id: device_id.unwrap_or("unknown").to_string(),
            issued_at: now,
            expires_at: now + self.config.code_ttl,
            used: false,
        };

        self.store.put(record.clone()).await;
        self.broadcaster.publish(&Envelope::new_code(&record));
        info!(session = %record.session_id, "issued new authentication code");

        IssuedCode {
            session_id: record.session_id,
            code: record.code,
            expires_at: record.expires_at,
        }
    }

    /// Verify `code` against a session, consuming it on success.
    ///
    /// A consumed record is kept for a grace window so repeat submissions
    /// answer "already used" instead of "invalid session", then deleted.
    pub async fn verify(&self, session_id: &str, code: &str) -> Result<Verification, VerifyError> {
        let now = Utc::now();

        let Some(record) = self.store.get(session_id).await else {
            return Err(VerifyError::UnknownSession);
        };

        if record.is_expired(now) {
            self.store.delete(session_id).await;
            return Err(VerifyError::Expired);
        }

        if record.used {
            return Err(VerifyError::AlreadyUsed);
        }

        // There is deliberately no lockout or rate limit on wrong codes;
        // the record stays verifiable until expiry. Known gap, kept as-is.
        if record.code != code {
            return Err(VerifyError::InvalidCode);
        }

        // mark_used is the single-use gate: a racing verification loses here.
        let Some(record) = self.store.mark_used(session_id).await else {
            return Err(VerifyError::AlreadyUsed);
        };

        self.schedule_cleanup(&record.session_id);
        info!(session = %record.session_id, "authentication code verified");

        Ok(Verification {
            auth_token: generate_auth_token(),
            subject: record.subject,
            device_id: record.device_id,
            verified_at: now,
        })
    }

    /// Delete the consumed record after the grace window, regardless of
    /// its expiry. Holds only a weak store handle so the task cannot keep
    /// the store alive past its owner.
    fn schedule_cleanup(&self, session_id: &str) {
        let store = Arc::downgrade(&self.store);
        let session_id = session_id.to_string();
        let grace = self.config.used_grace;

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(store) = store.upgrade() {
                store.delete(&session_id).await;
                debug!(session = %session_id, "removed verified session after grace window");
            }
        });
    }
}

/// Uniform 4-digit code; uniqueness across sessions is not a goal.
fn generate_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Opaque bearer token handed out on successful verification.
fn generate_auth_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
