//! Outbound frames pushed to dashboard subscribers

use crate::stats::StreamStats;
use crate::verdict::Verdict;
use serde::Serialize;

/// Snapshot frame sent to a subscriber right after it connects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "stats")]
pub struct StatsFrame {
    pub processed: u64,
    pub mismatches: u64,
    pub remaining: usize,
}

impl StatsFrame {
    /// Sum the counters of every stream into a single snapshot
    pub fn aggregate<'a>(streams: impl IntoIterator<Item = &'a StreamStats>) -> Self {
        streams.into_iter().fold(Self::default(), |mut acc, s| {
            acc.processed += s.processed;
            acc.mismatches += s.mismatches;
            acc.remaining += s.remaining;
            acc
        })
    }
}

#[derive(Serialize)]
struct CompleteFrame {
    status: &'static str,
}

/// Everything a subscriber can receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Result(Verdict),
    Stats(StatsFrame),
    /// Terminal frame sent on shutdown
    Complete,
}

impl Frame {
    /// Compact JSON text for one frame
    pub fn encode(&self) -> serde_json::Result<String> {
        match self {
            Frame::Result(verdict) => serde_json::to_string(verdict),
            Frame::Stats(stats) => serde_json::to_string(stats),
            Frame::Complete => serde_json::to_string(&CompleteFrame { status: "COMPLETE" }),
        }
    }
}

impl From<Verdict> for Frame {
    fn from(verdict: Verdict) -> Self {
        Frame::Result(verdict)
    }
}
