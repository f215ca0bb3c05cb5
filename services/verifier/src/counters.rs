//! Per-stream coordinator counters

use std::sync::atomic::{AtomicU64, Ordering};
use types::{StreamStats, VerdictStatus};

/// Atomic counters shared by every worker of one stream
#[derive(Debug, Default)]
pub struct StreamCounters {
    processed: AtomicU64,
    matches: AtomicU64,
    mismatches: AtomicU64,
    missing: AtomicU64,
    skipped_no_key: AtomicU64,
    processing_errors: AtomicU64,
    dropped_verdicts: AtomicU64,
    filtered_matches: AtomicU64,
}

impl StreamCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// One correlated replay message produced a verdict
    pub fn record_verdict(&self, status: VerdictStatus) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match status {
            VerdictStatus::Match => &self.matches,
            VerdictStatus::Mismatch => &self.mismatches,
            VerdictStatus::MissingInOriginal => &self.missing,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_no_key(&self) {
        self.skipped_no_key.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processing_error(&self) {
        self.processing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_verdict(&self) {
        self.dropped_verdicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered_match(&self) {
        self.filtered_matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, stream: &str, remaining: usize) -> StreamStats {
        StreamStats {
            stream: stream.to_string(),
            processed: self.processed.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            mismatches: self.mismatches.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            skipped_no_key: self.skipped_no_key.load(Ordering::Relaxed),
            processing_errors: self.processing_errors.load(Ordering::Relaxed),
            dropped_verdicts: self.dropped_verdicts.load(Ordering::Relaxed),
            filtered_matches: self.filtered_matches.load(Ordering::Relaxed),
            remaining,
        }
    }
}
