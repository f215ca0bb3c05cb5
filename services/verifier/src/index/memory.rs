use super::{open_log, scan_log, IndexStats, OriginalIndex};
use crate::error::IndexError;
use codec::{normalize_delimiters, Tokenizer};
use dashmap::DashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Fully materialized index: normalized originals keyed by correlation key
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: DashMap<String, Arc<str>>,
    stats: IndexStats,
}

impl MemoryIndex {
    pub fn build(path: &Path, tokenizer: &Tokenizer) -> Result<Self, IndexError> {
        let file = open_log(path)?;
        Self::from_reader(file, tokenizer, &path.display().to_string())
    }

    pub fn from_reader<R: Read>(
        reader: R,
        tokenizer: &Tokenizer,
        source: &str,
    ) -> Result<Self, IndexError> {
        let entries = DashMap::new();
        let stats = scan_log(reader, tokenizer, source, |key, segment| {
            let normalized: Arc<str> = normalize_delimiters(segment.bytes).into();
            entries.insert(key, normalized).is_some()
        })?;
        Ok(Self { entries, stats })
    }
}

impl OriginalIndex for MemoryIndex {
    fn get(&self, key: &str) -> Result<Option<Arc<str>>, IndexError> {
        Ok(self.entries.get(key).map(|entry| Arc::clone(entry.value())))
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> IndexStats {
        self.stats
    }
}
