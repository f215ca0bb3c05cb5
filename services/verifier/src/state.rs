//! Read-only view of the running verifier, shared with the server

use crate::counters::StreamCounters;
use crate::index::OriginalIndex;
use crate::subscriber::SubscriberRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use types::{StatsFrame, StreamStats};

pub struct StreamView {
    pub name: Arc<str>,
    pub index: Arc<dyn OriginalIndex>,
    pub counters: Arc<StreamCounters>,
}

impl StreamView {
    pub fn stats(&self) -> StreamStats {
        self.counters.snapshot(&self.name, self.index.len())
    }
}

pub struct VerifierState {
    pub streams: Vec<StreamView>,
    pub registry: Arc<SubscriberRegistry>,
    pub snapshot_on_connect: bool,
}

impl VerifierState {
    pub fn stream_stats(&self) -> Vec<StreamStats> {
        self.streams.iter().map(StreamView::stats).collect()
    }

    /// Aggregate snapshot sent to newly connected subscribers
    pub fn stats_frame(&self) -> StatsFrame {
        StatsFrame::aggregate(&self.stream_stats())
    }

    pub fn status(&self) -> Value {
        let streams: Vec<Value> = self
            .streams
            .iter()
            .map(|view| {
                json!({
                    "counters": view.stats(),
                    "index": view.index.stats(),
                })
            })
            .collect();

        json!({
            "status": "running",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "subscribers": self.registry.len(),
            "publisher": self.registry.stats(),
            "streams": streams,
        })
    }
}
