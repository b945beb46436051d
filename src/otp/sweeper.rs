//! Background eviction of expired records.

use crate::otp::store::CodeStore;
use chrono::Utc;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default sweep cadence.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Owned reaper task; scans the store on a fixed interval and deletes
/// anything past its expiry. Stops on its own when the store is dropped,
/// or immediately when the sweeper itself is dropped.
#[derive(Debug)]
pub struct Sweeper {
    task: JoinHandle<()>,
}

impl Sweeper {
    #[must_use]
    pub fn spawn(store: &Arc<CodeStore>, every: Duration) -> Self {
        let task = tokio::spawn(sweep_loop(Arc::downgrade(store), every));
        Self { task }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn sweep_loop(store: Weak<CodeStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // skip the immediate first tick
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(store) = store.upgrade() else {
            break;
        };
        let evicted = store.evict_expired(Utc::now()).await;
        if evicted > 0 {
            debug!(evicted, "swept expired sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::store::SessionRecord;
    use chrono::Duration as ChronoDuration;

    fn expired_record(session_id: &str) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: session_id.to_string(),
            code: "1234".to_string(),
            subject: "y".to_string(),
            device_id: "unknown".to_string(),
            issued_at: now - ChronoDuration::minutes(10),
            expires_at: now - ChronoDuration::minutes(5),
            used: false,
        }
    }

    #[tokio::test]
    async fn sweeper_evicts_expired_records() {
        let store = Arc::new(CodeStore::new());
        store.put(expired_record("dead")).await;

        let _sweeper = Sweeper::spawn(&store, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get("dead").await.is_none());
    }

    #[tokio::test]
    async fn dropped_sweeper_stops_sweeping() {
        let store = Arc::new(CodeStore::new());
        let sweeper = Sweeper::spawn(&store, Duration::from_millis(10));
        drop(sweeper);

        store.put(expired_record("dead")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get("dead").await.is_some());
    }
}
