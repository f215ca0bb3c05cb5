//! # Replay Sources
//!
//! Where replayed messages come from. A live deployment reads the message bus
//! through [`LineBridgeBus`]; batch runs read a file through [`FileReplaySource`].
//! Both hand out [`Delivery`] values that are acknowledged only after the
//! coordinator has enqueued the verdict.

mod file;
mod line_bridge;
mod reconnect;

pub use file::FileReplaySource;
pub use line_bridge::{BridgeSettings, LineBridgeBus};
pub use reconnect::ReconnectPolicy;

use crate::error::BusError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One inbound replay message awaiting acknowledgement
#[derive(Debug)]
pub struct Delivery {
    sequence: u64,
    payload: Vec<u8>,
    acker: Option<mpsc::UnboundedSender<u64>>,
}

impl Delivery {
    pub fn new(sequence: u64, payload: Vec<u8>, acker: Option<mpsc::UnboundedSender<u64>>) -> Self {
        Self {
            sequence,
            payload,
            acker,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Acknowledge upstream. Dropping a delivery without acking leaves it
    /// for the broker to redeliver.
    pub fn ack(self) {
        if let Some(acker) = self.acker {
            // The connection may already be gone; the broker redelivers in that case
            let _ = acker.send(self.sequence);
        }
    }
}

#[async_trait]
pub trait ReplaySource: Send {
    /// Next message, or `None` once the source is exhausted
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, BusError>;

    fn describe(&self) -> String;

    /// Stop reading and flush acknowledgements. Resolves once every
    /// delivery handed out has been acked or dropped.
    async fn close(&mut self) {}
}
