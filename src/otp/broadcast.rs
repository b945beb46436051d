//! Fan-out of code events to live notification subscribers.
//!
//! The broadcaster keeps a registry of per-subscriber unbounded senders.
//! Delivery is at-most-once and best-effort: a failed send means the
//! subscriber went away, and the sink is pruned on the spot. Subscribers
//! that connect after an event was published never see it.

use crate::otp::store::SessionRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::HashMap,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, Weak,
    },
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::debug;

/// Keep-alive cadence for idle connections.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Connected,
    NewCode,
    Ping,
}

/// Payload of a `NEW_CODE` event.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAnnouncement {
    pub session_id: String,
    pub code: String,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Wire envelope pushed to every subscriber.
#[derive(Clone, Debug, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CodeAnnouncement>,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    #[must_use]
    pub fn connected() -> Self {
        Self {
            kind: EventKind::Connected,
            data: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn ping() -> Self {
        Self {
            kind: EventKind::Ping,
            data: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn new_code(record: &SessionRecord) -> Self {
        Self {
            kind: EventKind::NewCode,
            data: Some(CodeAnnouncement {
                session_id: record.session_id.clone(),
                code: record.code.clone(),
                subject: record.subject.clone(),
                issued_at: record.issued_at,
                expires_at: record.expires_at,
            }),
            timestamp: Utc::now(),
        }
    }
}

type Registry = Mutex<HashMap<u64, mpsc::UnboundedSender<Envelope>>>;

fn registry_lock(registry: &Registry) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<Envelope>>> {
    // A poisoned registry only means a panic happened while holding the
    // lock; the map itself is still usable.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publish/subscribe hub with an owned keep-alive task.
///
/// The ping task holds a weak handle to the registry and stops on its own
/// once the broadcaster is gone; `Drop` aborts it eagerly.
#[derive(Debug)]
pub struct Broadcaster {
    subscribers: Arc<Registry>,
    next_id: AtomicU64,
    ping_task: JoinHandle<()>,
}

impl Broadcaster {
    #[must_use]
    pub fn new(ping_interval: Duration) -> Self {
        let subscribers: Arc<Registry> = Arc::new(Mutex::new(HashMap::new()));
        let ping_task = tokio::spawn(ping_loop(Arc::downgrade(&subscribers), ping_interval));

        Self {
            subscribers,
            next_id: AtomicU64::new(0),
            ping_task,
        }
    }

    /// Register a new subscriber and queue its `CONNECTED` greeting.
    ///
    /// Dropping the returned [`Subscription`] unregisters the sink; a sink
    /// whose receiver is gone is also pruned on the next publish or ping.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is still in hand, this send cannot fail.
        let _ = tx.send(Envelope::connected());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = registry_lock(&self.subscribers);
        subscribers.insert(id, tx);
        debug!(subscriber = id, total = subscribers.len(), "notification subscriber connected");
        drop(subscribers);

        Subscription {
            id,
            receiver: rx,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Push an event to every live subscriber, pruning the dead ones.
    pub fn publish(&self, event: &Envelope) {
        publish_to(&self.subscribers, event);
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        registry_lock(&self.subscribers).len()
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.ping_task.abort();
    }
}

fn publish_to(registry: &Registry, event: &Envelope) {
    let mut subscribers = registry_lock(registry);
    subscribers.retain(|id, tx| {
        if tx.send(event.clone()).is_ok() {
            true
        } else {
            debug!(subscriber = *id, "pruning disconnected subscriber");
            false
        }
    });
}

async fn ping_loop(registry: Weak<Registry>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick fires immediately; subscribers already got CONNECTED.
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(registry) = registry.upgrade() else {
            break;
        };
        publish_to(&registry, &Envelope::ping());
    }
}

/// A live subscriber handle; yields envelopes as a stream.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<Envelope>,
    registry: Weak<Registry>,
}

impl Stream for Subscription {
    type Item = Envelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry_lock(&registry).remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tokio_stream::StreamExt;

    fn sample_record() -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: "abc123".to_string(),
            code: "4321".to_string(),
            subject: "+61 400 000 000".to_string(),
            device_id: "unknown".to_string(),
            issued_at: now,
            expires_at: now + ChronoDuration::minutes(5),
            used: false,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_connected_then_codes() {
        let broadcaster = Broadcaster::new(Duration::from_secs(3600));
        let mut subscription = broadcaster.subscribe();

        let greeting = subscription.next().await;
        assert!(matches!(greeting, Some(env) if env.kind == EventKind::Connected));

        broadcaster.publish(&Envelope::new_code(&sample_record()));
        let event = subscription.next().await;
        match event {
            Some(env) => {
                assert_eq!(env.kind, EventKind::NewCode);
                assert_eq!(env.data.map(|d| d.code), Some("4321".to_string()));
            }
            None => panic!("expected NEW_CODE event"),
        }
    }

    #[tokio::test]
    async fn late_subscriber_misses_history() {
        let broadcaster = Broadcaster::new(Duration::from_secs(3600));
        broadcaster.publish(&Envelope::new_code(&sample_record()));

        let mut late = broadcaster.subscribe();
        let greeting = late.next().await;
        assert!(matches!(greeting, Some(env) if env.kind == EventKind::Connected));

        // only future events arrive
        broadcaster.publish(&Envelope::ping());
        let event = late.next().await;
        assert!(matches!(event, Some(env) if env.kind == EventKind::Ping));
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_on_publish() {
        let broadcaster = Broadcaster::new(Duration::from_secs(3600));
        let first = broadcaster.subscribe();
        let _second = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(first);
        // Drop unregisters synchronously.
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.publish(&Envelope::ping());
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn ping_task_delivers_keepalive() {
        let broadcaster = Broadcaster::new(Duration::from_millis(10));
        let mut subscription = broadcaster.subscribe();

        // skip the greeting
        let _ = subscription.next().await;
        let event = subscription.next().await;
        assert!(matches!(event, Some(env) if env.kind == EventKind::Ping));
    }

    #[test]
    fn envelope_serializes_wire_shape() {
        let envelope = Envelope::new_code(&sample_record());
        let value = serde_json::to_value(&envelope).expect("envelope serializes");
        assert_eq!(value["type"], "NEW_CODE");
        assert_eq!(value["data"]["sessionId"], "abc123");
        assert_eq!(value["data"]["code"], "4321");
        assert!(value["timestamp"].is_string());

        let ping = serde_json::to_value(Envelope::ping()).expect("ping serializes");
        assert_eq!(ping["type"], "PING");
        assert!(ping.get("data").is_none());
    }
}
