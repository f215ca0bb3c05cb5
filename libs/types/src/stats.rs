//! Counter snapshots

use serde::Serialize;

/// Point-in-time view of one stream's coordinator counters and index size
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub stream: String,
    pub processed: u64,
    pub matches: u64,
    pub mismatches: u64,
    pub missing: u64,
    pub skipped_no_key: u64,
    pub processing_errors: u64,
    pub dropped_verdicts: u64,
    pub filtered_matches: u64,
    /// Original entries still waiting for a replay
    pub remaining: usize,
}
