//! # Stream Coordinator
//!
//! Joins replay messages to their indexed originals and hands verdicts to the
//! publisher. Per message:
//!
//! 1. tokenize the replay; no correlation key means skip and ack
//! 2. look the key up in the original index
//! 3. compare, or emit `MISSING_IN_ORIGINAL`
//! 4. enqueue the verdict, waiting at most the publish timeout
//! 5. remove the key from the index, then ack
//!
//! A verdict that cannot be enqueued in time is dropped and counted; the
//! message is still acked and its index entry stays.
//!
//! Workers of one stream pull from a shared work queue filled by the stream's
//! consumer task. With a single worker, verdicts follow bus arrival order.

use crate::bus::{Delivery, ReplaySource};
use crate::counters::StreamCounters;
use crate::error::BusError;
use crate::index::OriginalIndex;
use codec::{Comparator, TagMap, Tokenizer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::{Verdict, VerdictStatus};

/// What happened to one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No correlation key; acked, no verdict
    Skipped,
    /// Verdict enqueued for the publisher
    Published(VerdictStatus),
    /// MATCH suppressed by `emitMatches=false`
    Filtered,
    /// Publisher full past the timeout, or gone
    Dropped(VerdictStatus),
    /// Internal error; not acked
    Failed,
}

pub struct Coordinator {
    stream: Arc<str>,
    /// Set when verdicts must carry the stream name
    label: Option<Arc<str>>,
    index: Arc<dyn OriginalIndex>,
    counters: Arc<StreamCounters>,
    tokenizer: Tokenizer,
    comparator: Comparator,
    verdicts: mpsc::Sender<Verdict>,
    publish_timeout: Duration,
    emit_matches: bool,
}

/// Reusable parse buffers owned by one worker
#[derive(Debug, Default)]
pub struct WorkerBuffers {
    replay: TagMap,
    original: TagMap,
}

impl Coordinator {
    pub fn new(
        stream: Arc<str>,
        index: Arc<dyn OriginalIndex>,
        counters: Arc<StreamCounters>,
        tokenizer: Tokenizer,
        comparator: Comparator,
        verdicts: mpsc::Sender<Verdict>,
    ) -> Self {
        Self {
            stream,
            label: None,
            index,
            counters,
            tokenizer,
            comparator,
            verdicts,
            publish_timeout: Duration::from_millis(100),
            emit_matches: true,
        }
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_emit_matches(mut self, emit: bool) -> Self {
        self.emit_matches = emit;
        self
    }

    /// Tag every verdict with the stream name
    pub fn with_stream_label(mut self) -> Self {
        self.label = Some(Arc::clone(&self.stream));
        self
    }

    pub fn counters(&self) -> &Arc<StreamCounters> {
        &self.counters
    }

    pub async fn process(&self, buffers: &mut WorkerBuffers, delivery: Delivery) -> Outcome {
        let stream = &*self.stream;
        let key = match self.tokenizer.tokenize_into(delivery.payload(), &mut buffers.replay) {
            Some(key) => key.to_owned(),
            None => {
                debug!(stream, reason = "no correlation key", sequence = delivery.sequence(), "Skipping replay message");
                self.counters.record_skipped_no_key();
                delivery.ack();
                return Outcome::Skipped;
            }
        };

        let original = match self.index.get(&key) {
            Ok(original) => original,
            Err(e) => {
                error!(stream, key = %key, error = %e, "Original lookup failed");
                self.counters.record_processing_error();
                return Outcome::Failed;
            }
        };

        let verdict = match original {
            Some(text) => {
                self.tokenizer.tokenize_into(text.as_bytes(), &mut buffers.original);
                self.comparator.verdict(&key, &buffers.original, &buffers.replay)
            }
            None => Verdict::missing_in_original(&key),
        };
        let status = verdict.status();
        self.counters.record_verdict(status);
        debug!(stream, key = %key, %status, "Verdict");

        if status == VerdictStatus::Match && !self.emit_matches {
            self.counters.record_filtered_match();
            self.index.remove(&key);
            delivery.ack();
            return Outcome::Filtered;
        }

        let verdict = match &self.label {
            Some(label) => verdict.with_stream(Arc::clone(label)),
            None => verdict,
        };

        let outcome = match tokio::time::timeout(self.publish_timeout, self.verdicts.send(verdict)).await {
            Ok(Ok(())) => {
                self.index.remove(&key);
                Outcome::Published(status)
            }
            Ok(Err(_)) => {
                warn!(stream, key = %key, "Publisher closed, verdict dropped");
                self.counters.record_dropped_verdict();
                Outcome::Dropped(status)
            }
            Err(_) => {
                warn!(stream, key = %key, timeout_ms = self.publish_timeout.as_millis() as u64, "Publisher backpressure, verdict dropped");
                self.counters.record_dropped_verdict();
                Outcome::Dropped(status)
            }
        };
        delivery.ack();
        outcome
    }

    /// Spawn `count` workers sharing `queue`. They exit once the queue is
    /// closed and empty.
    pub fn spawn_workers(
        self: Arc<Self>,
        count: usize,
        queue: mpsc::Receiver<Delivery>,
    ) -> Vec<JoinHandle<()>> {
        let queue = Arc::new(Mutex::new(queue));
        (0..count.max(1))
            .map(|worker| {
                let coordinator = Arc::clone(&self);
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let mut buffers = WorkerBuffers::default();
                    loop {
                        let next = queue.lock().await.recv().await;
                        let Some(delivery) = next else { break };
                        coordinator.process(&mut buffers, delivery).await;
                    }
                    debug!(stream = %coordinator.stream, worker, "Coordinator worker drained");
                })
            })
            .collect()
    }
}

/// Pump `source` into the work queue until it is exhausted or `shutdown` fires.
///
/// The only producer into a stream's work queue. The source is handed back
/// so it can be closed after the workers have acked what is still queued;
/// a fatal bus error is returned once the source gives up reconnecting.
pub async fn run_consumer(
    stream: Arc<str>,
    mut source: Box<dyn ReplaySource>,
    work: mpsc::Sender<Delivery>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<Box<dyn ReplaySource>, BusError> {
    info!(stream = %stream, source = %source.describe(), "Consumer started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => {
                info!(stream = %stream, "Consumer stopping");
                break;
            }
            next = source.next_delivery() => match next? {
                Some(delivery) => {
                    if work.send(delivery).await.is_err() {
                        break;
                    }
                }
                None => {
                    info!(stream = %stream, "Replay source exhausted");
                    break;
                }
            }
        }
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;

    const ORIGINALS: &str = "\
8=FIX.4.2^A35=D^A55=VOD.L^A38=100^A44=12.5^A
8=FIX.4.2^A35=D^A55=BARC.L^A38=5^A
";

    fn coordinator(verdicts: mpsc::Sender<Verdict>) -> (Coordinator, Arc<MemoryIndex>) {
        let index = Arc::new(
            MemoryIndex::from_reader(ORIGINALS.as_bytes(), &Tokenizer::default(), "test").unwrap(),
        );
        let coordinator = Coordinator::new(
            Arc::from("OMS"),
            index.clone(),
            Arc::new(StreamCounters::new()),
            Tokenizer::default(),
            Comparator::default(),
            verdicts,
        );
        (coordinator, index)
    }

    fn delivery(payload: &str) -> Delivery {
        Delivery::new(1, payload.as_bytes().to_vec(), None)
    }

    #[tokio::test]
    async fn test_match_then_duplicate_is_missing() {
        let (tx, mut rx) = mpsc::channel(8);
        let (coordinator, index) = coordinator(tx);
        let mut buffers = WorkerBuffers::default();

        let replay = "8=FIX.4.2|35=D|55=VOD.L|38=100|44=12.5|";
        let outcome = coordinator.process(&mut buffers, delivery(replay)).await;
        assert_eq!(outcome, Outcome::Published(VerdictStatus::Match));
        assert_eq!(index.len(), 1);

        let outcome = coordinator.process(&mut buffers, delivery(replay)).await;
        assert_eq!(outcome, Outcome::Published(VerdictStatus::MissingInOriginal));

        assert_eq!(rx.recv().await.unwrap().status(), VerdictStatus::Match);
        assert_eq!(rx.recv().await.unwrap().status(), VerdictStatus::MissingInOriginal);
        let stats = coordinator.counters().snapshot("OMS", index.len());
        assert_eq!((stats.processed, stats.matches, stats.missing), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_mismatch_diff() {
        let (tx, mut rx) = mpsc::channel(8);
        let (coordinator, _index) = coordinator(tx);
        let mut buffers = WorkerBuffers::default();

        coordinator
            .process(&mut buffers, delivery("8=FIX.4.2|35=D|55=VOD.L|38=100|44=12.6|"))
            .await;
        let verdict = rx.recv().await.unwrap();
        assert_eq!(verdict.status(), VerdictStatus::Mismatch);
        assert_eq!(verdict.diffs().len(), 1);
        assert_eq!(verdict.diff("44").unwrap().original, "12.5");
    }

    #[tokio::test]
    async fn test_no_key_is_skipped() {
        let (tx, mut rx) = mpsc::channel(8);
        let (coordinator, index) = coordinator(tx);
        let mut buffers = WorkerBuffers::default();

        let outcome = coordinator.process(&mut buffers, delivery("8=FIX.4.2|35=0|")).await;
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(coordinator.counters().snapshot("OMS", 0).skipped_no_key, 1);
        assert_eq!(index.len(), 2);
        drop(coordinator);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_timeout_keeps_index_entry() {
        let (tx, _rx) = mpsc::channel(1);
        let (coordinator, index) = coordinator(tx);
        let coordinator = coordinator.with_publish_timeout(Duration::from_millis(10));
        let mut buffers = WorkerBuffers::default();

        let first = coordinator.process(&mut buffers, delivery("8=FIX.4.2|55=ZZZ|")).await;
        assert_eq!(first, Outcome::Published(VerdictStatus::MissingInOriginal));

        let replay = "8=FIX.4.2|35=D|55=BARC.L|38=5|";
        let second = coordinator.process(&mut buffers, delivery(replay)).await;
        assert_eq!(second, Outcome::Dropped(VerdictStatus::Match));
        assert!(index.get("BARC.L").unwrap().is_some());
        assert_eq!(coordinator.counters().snapshot("OMS", 0).dropped_verdicts, 1);
    }

    #[tokio::test]
    async fn test_filtered_matches_are_removed() {
        let (tx, mut rx) = mpsc::channel(8);
        let (coordinator, index) = coordinator(tx);
        let coordinator = coordinator.with_emit_matches(false);
        let mut buffers = WorkerBuffers::default();

        let outcome = coordinator
            .process(&mut buffers, delivery("8=FIX.4.2|35=D|55=BARC.L|38=5|"))
            .await;
        assert_eq!(outcome, Outcome::Filtered);
        assert!(index.get("BARC.L").unwrap().is_none());
        drop(coordinator);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_label() {
        let (tx, mut rx) = mpsc::channel(8);
        let (coordinator, _index) = coordinator(tx);
        let coordinator = coordinator.with_stream_label();
        let mut buffers = WorkerBuffers::default();

        coordinator.process(&mut buffers, delivery("8=FIX.4.2|55=NEW|")).await;
        assert_eq!(rx.recv().await.unwrap().stream(), Some("OMS"));
    }

    #[tokio::test]
    async fn test_acks_sent_after_processing() {
        let (tx, _rx) = mpsc::channel(8);
        let (coordinator, _index) = coordinator(tx);
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
        let mut buffers = WorkerBuffers::default();

        let delivery = Delivery::new(41, b"8=FIX.4.2|55=VOD.L|".to_vec(), Some(ack_tx.clone()));
        coordinator.process(&mut buffers, delivery).await;
        let skipped = Delivery::new(42, b"8=FIX.4.2|35=0|".to_vec(), Some(ack_tx));
        coordinator.process(&mut buffers, skipped).await;

        assert_eq!(ack_rx.recv().await, Some(41));
        assert_eq!(ack_rx.recv().await, Some(42));
    }
}
