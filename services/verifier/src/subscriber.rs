//! Subscriber management
//!
//! Each subscriber owns a bounded queue of encoded frames drained by its own
//! writer task. The registry lock is held for add, remove and to snapshot the
//! current set; never while a frame is being delivered.

use crate::error::{Result, VerifierError};
use config::LagPolicy;
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Encoded JSON frame, shared by every subscriber queue
pub type EncodedFrame = Arc<str>;

pub struct Subscriber {
    pub id: Uuid,
    /// Peer address or sink path, for logs
    pub label: String,
    sender: mpsc::Sender<EncodedFrame>,
    dropped: AtomicU64,
}

impl Subscriber {
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherStats {
    /// Frames broadcast
    pub published: u64,
    /// Frames not delivered to a lagging subscriber
    pub subscriber_drops: u64,
    /// Subscribers closed because their queue was full
    pub disconnected_lagging: u64,
    pub subscribers: usize,
}

pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<Uuid, Arc<Subscriber>>>,
    max_subscribers: usize,
    queue_size: usize,
    lag_policy: LagPolicy,
    published: AtomicU64,
    subscriber_drops: AtomicU64,
    disconnected_lagging: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new(max_subscribers: usize, queue_size: usize, lag_policy: LagPolicy) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            max_subscribers,
            queue_size,
            lag_policy,
            published: AtomicU64::new(0),
            subscriber_drops: AtomicU64::new(0),
            disconnected_lagging: AtomicU64::new(0),
        }
    }

    /// Add a subscriber with the configured queue size.
    ///
    /// `greeting` is queued before the subscriber becomes visible to
    /// broadcasts, so it is always the first frame received.
    pub fn register(
        &self,
        label: impl Into<String>,
        greeting: Option<EncodedFrame>,
    ) -> Result<(Uuid, mpsc::Receiver<EncodedFrame>)> {
        self.register_with_capacity(label, greeting, self.queue_size)
    }

    pub fn register_with_capacity(
        &self,
        label: impl Into<String>,
        greeting: Option<EncodedFrame>,
        capacity: usize,
    ) -> Result<(Uuid, mpsc::Receiver<EncodedFrame>)> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        if let Some(frame) = greeting {
            // Fresh queue with capacity >= 1 cannot be full
            let _ = sender.try_send(frame);
        }
        let subscriber = Arc::new(Subscriber {
            id: Uuid::new_v4(),
            label: label.into(),
            sender,
            dropped: AtomicU64::new(0),
        });

        let mut subscribers = self.subscribers.lock();
        if subscribers.len() >= self.max_subscribers {
            return Err(VerifierError::SubscriberLimit(self.max_subscribers));
        }
        let id = subscriber.id;
        info!(
            subscriber = %id,
            label = %subscriber.label,
            total = subscribers.len() + 1,
            "Added subscriber"
        );
        subscribers.insert(id, subscriber);
        Ok((id, receiver))
    }

    /// Remove a subscriber; its pending frames are dropped with the queue
    pub fn remove(&self, id: Uuid) -> bool {
        let mut subscribers = self.subscribers.lock();
        match subscribers.remove(&id) {
            Some(subscriber) => {
                info!(
                    subscriber = %id,
                    dropped = subscriber.dropped(),
                    total = subscribers.len(),
                    "Removed subscriber"
                );
                true
            }
            None => false,
        }
    }

    /// Non-blocking fan-out of one frame to every current subscriber
    pub fn broadcast(&self, frame: &EncodedFrame) {
        self.published.fetch_add(1, Ordering::Relaxed);
        let snapshot: Vec<Arc<Subscriber>> = self.subscribers.lock().values().cloned().collect();

        let mut failed = Vec::new();
        for subscriber in &snapshot {
            match subscriber.sender.try_send(Arc::clone(frame)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => match self.lag_policy {
                    LagPolicy::Drop => {
                        subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                        self.subscriber_drops.fetch_add(1, Ordering::Relaxed);
                    }
                    LagPolicy::Disconnect => {
                        warn!(subscriber = %subscriber.id, label = %subscriber.label, "Disconnecting lagging subscriber");
                        self.subscriber_drops.fetch_add(1, Ordering::Relaxed);
                        self.disconnected_lagging.fetch_add(1, Ordering::Relaxed);
                        failed.push(subscriber.id);
                    }
                },
                Err(TrySendError::Closed(_)) => failed.push(subscriber.id),
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for id in failed {
                subscribers.remove(&id);
                debug!(subscriber = %id, "Removed disconnected subscriber");
            }
        }
    }

    /// Queue `terminal` to every subscriber, waiting up to `wait` for room,
    /// then release all of them. Writers finish once their queue is drained.
    pub async fn close_all(&self, terminal: EncodedFrame, wait: Duration) {
        let subscribers: Vec<Arc<Subscriber>> =
            self.subscribers.lock().drain().map(|(_, s)| s).collect();
        info!(count = subscribers.len(), "Closing subscribers");

        join_all(subscribers.iter().map(|subscriber| {
            let frame = Arc::clone(&terminal);
            async move {
                if subscriber.sender.send_timeout(frame, wait).await.is_err() {
                    warn!(subscriber = %subscriber.id, "Terminal frame not delivered");
                }
            }
        }))
        .await;
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            published: self.published.load(Ordering::Relaxed),
            subscriber_drops: self.subscriber_drops.load(Ordering::Relaxed),
            disconnected_lagging: self.disconnected_lagging.load(Ordering::Relaxed),
            subscribers: self.len(),
        }
    }

    /// Dropped-frame count of one subscriber
    pub fn dropped_for(&self, id: Uuid) -> Option<u64> {
        self.subscribers.lock().get(&id).map(|s| s.dropped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> EncodedFrame {
        Arc::from(text)
    }

    #[test]
    fn test_register_and_remove() {
        let registry = SubscriberRegistry::new(10, 4, LagPolicy::Drop);
        assert!(registry.is_empty());

        let (id, _rx) = registry.register("test", None).unwrap();
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_subscriber_limit() {
        let registry = SubscriberRegistry::new(1, 4, LagPolicy::Drop);
        let _first = registry.register("a", None).unwrap();
        assert!(matches!(
            registry.register("b", None),
            Err(VerifierError::SubscriberLimit(1))
        ));
    }

    #[tokio::test]
    async fn test_greeting_comes_first() {
        let registry = SubscriberRegistry::new(10, 4, LagPolicy::Drop);
        let (_id, mut rx) = registry.register("test", Some(frame("hello"))).unwrap();
        registry.broadcast(&frame("one"));

        assert_eq!(&*rx.recv().await.unwrap(), "hello");
        assert_eq!(&*rx.recv().await.unwrap(), "one");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_drops_without_affecting_others() {
        let registry = SubscriberRegistry::new(10, 2, LagPolicy::Drop);
        let (slow, _slow_rx) = registry.register("slow", None).unwrap();
        let (_fast, mut fast_rx) = registry.register("fast", None).unwrap();

        for i in 0..5 {
            registry.broadcast(&frame(&i.to_string()));
            assert_eq!(&*fast_rx.recv().await.unwrap(), i.to_string());
        }

        assert_eq!(registry.dropped_for(slow), Some(3));
        assert_eq!(registry.len(), 2);
        let stats = registry.stats();
        assert_eq!(stats.published, 5);
        assert_eq!(stats.subscriber_drops, 3);
    }

    #[tokio::test]
    async fn test_disconnect_policy_removes_lagging_subscriber() {
        let registry = SubscriberRegistry::new(10, 1, LagPolicy::Disconnect);
        let (_id, mut rx) = registry.register("slow", None).unwrap();

        registry.broadcast(&frame("a"));
        registry.broadcast(&frame("b"));

        assert_eq!(registry.len(), 0);
        assert_eq!(registry.stats().disconnected_lagging, 1);
        assert_eq!(&*rx.recv().await.unwrap(), "a");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_receiver_is_pruned() {
        let registry = SubscriberRegistry::new(10, 4, LagPolicy::Drop);
        let (_id, rx) = registry.register("gone", None).unwrap();
        drop(rx);

        registry.broadcast(&frame("x"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_close_all_sends_terminal_frame() {
        let registry = SubscriberRegistry::new(10, 4, LagPolicy::Drop);
        let (_id, mut rx) = registry.register("test", None).unwrap();
        registry.broadcast(&frame("v"));

        registry
            .close_all(frame(r#"{"status":"COMPLETE"}"#), Duration::from_millis(100))
            .await;

        assert!(registry.is_empty());
        assert_eq!(&*rx.recv().await.unwrap(), "v");
        assert_eq!(&*rx.recv().await.unwrap(), r#"{"status":"COMPLETE"}"#);
        assert!(rx.recv().await.is_none());
    }
}
