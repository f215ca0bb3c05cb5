//! Verdict publisher
//!
//! Single task between the coordinators and the subscriber queues: each
//! verdict is encoded once and fanned out without waiting on any subscriber.

use crate::subscriber::{EncodedFrame, SubscriberRegistry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use types::{Frame, Verdict};

/// Encode a frame for the wire
pub fn encode(frame: &Frame) -> serde_json::Result<EncodedFrame> {
    frame.encode().map(Arc::from)
}

/// Spawn the fan-out task. It ends once every verdict sender is dropped and
/// the channel is drained.
pub fn spawn_publisher(
    registry: Arc<SubscriberRegistry>,
    mut verdicts: mpsc::Receiver<Verdict>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(verdict) = verdicts.recv().await {
            match encode(&Frame::Result(verdict)) {
                Ok(frame) => registry.broadcast(&frame),
                Err(e) => error!("Failed to encode verdict: {}", e),
            }
        }
        debug!("Verdict channel closed, publisher finished");
    })
}
