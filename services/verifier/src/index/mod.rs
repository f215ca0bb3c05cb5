//! # Original Index
//!
//! Lookup table from correlation key to the recorded original message.
//! Built once at startup, before any replay message is consumed; afterwards
//! entries are only ever removed.
//!
//! Two implementations share [`OriginalIndex`]:
//! - [`MemoryIndex`]: every original normalized and held in memory
//! - [`OffsetIndex`]: key to byte range over a memory-mapped log, normalized on lookup

mod memory;
mod offset;
pub mod scanner;

pub use memory::MemoryIndex;
pub use offset::OffsetIndex;
pub use scanner::{Segment, SegmentScanner};

use crate::error::IndexError;
use codec::Tokenizer;
use config::IndexMode;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub trait OriginalIndex: Send + Sync {
    /// Original message for `key` with every delimiter normalized to SOH
    fn get(&self, key: &str) -> Result<Option<Arc<str>>, IndexError>;

    /// Remove `key`; returns whether an entry was present
    fn remove(&self, key: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build-time statistics
    fn stats(&self) -> IndexStats;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Message segments found in the log
    pub segments: u64,
    /// Distinct keys indexed
    pub indexed: u64,
    /// Segments whose key was already present (later message kept)
    pub duplicates: u64,
    /// Segments without a correlation key
    pub unindexed: u64,
}

/// Build the index selected by `mode` from the log at `path`
pub fn build_index(
    mode: IndexMode,
    path: &Path,
    tokenizer: &Tokenizer,
) -> Result<Arc<dyn OriginalIndex>, IndexError> {
    let index: Arc<dyn OriginalIndex> = match mode {
        IndexMode::Memory => Arc::new(MemoryIndex::build(path, tokenizer)?),
        IndexMode::Offset => Arc::new(OffsetIndex::build(path, tokenizer)?),
    };
    Ok(index)
}

pub(crate) fn open_log(path: &Path) -> Result<File, IndexError> {
    File::open(path).map_err(|source| IndexError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Segment `reader`, key every segment and hand it to `insert`.
///
/// `insert` returns `true` when it replaced an existing entry.
pub(crate) fn scan_log<R, F>(
    reader: R,
    tokenizer: &Tokenizer,
    source: &str,
    mut insert: F,
) -> Result<IndexStats, IndexError>
where
    R: Read,
    F: FnMut(String, Segment<'_>) -> bool,
{
    info!(source, correlation_tag = tokenizer.correlation_tag(), "Indexing original log");
    let started = Instant::now();
    let mut stats = IndexStats::default();
    let mut scanner = SegmentScanner::new(reader);

    while let Some(segment) = scanner.next_segment()? {
        stats.segments += 1;
        let Some(key) = tokenizer.correlation_key(segment.bytes) else {
            stats.unindexed += 1;
            continue;
        };
        if insert(key.clone(), segment) {
            stats.duplicates += 1;
            warn!(key = %key, offset = segment.offset, "Duplicate correlation key in original log; keeping later message");
        } else {
            stats.indexed += 1;
        }
    }

    info!(
        source,
        segments = stats.segments,
        indexed = stats.indexed,
        duplicates = stats.duplicates,
        unindexed = stats.unindexed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Original index built"
    );
    Ok(stats)
}
