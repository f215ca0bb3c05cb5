use super::{open_log, scan_log, IndexStats, OriginalIndex};
use crate::error::IndexError;
use codec::{normalize_delimiters, Tokenizer};
use dashmap::DashMap;
use memmap2::{Mmap, MmapOptions};
use std::path::Path;
use std::sync::Arc;

/// Byte-range index over a read-only memory map of the original log.
///
/// Only `(offset, len)` is kept per key; the message is sliced out of the map
/// and normalized on each lookup.
#[derive(Debug)]
pub struct OffsetIndex {
    /// `None` for an empty log, which cannot be mapped
    map: Option<Mmap>,
    entries: DashMap<String, (usize, usize)>,
    stats: IndexStats,
}

impl OffsetIndex {
    pub fn build(path: &Path, tokenizer: &Tokenizer) -> Result<Self, IndexError> {
        let file = open_log(path)?;
        let source = path.display().to_string();
        let entries = DashMap::new();

        if file.metadata()?.len() == 0 {
            let stats = scan_log(std::io::empty(), tokenizer, &source, |_, _| false)?;
            return Ok(Self {
                map: None,
                entries,
                stats,
            });
        }

        // SAFETY: the original log must not be truncated or rewritten while the verifier runs.
        let map = unsafe { MmapOptions::new().map(&file)? };
        let stats = scan_log(&map[..], tokenizer, &source, |key, segment| {
            let range = (segment.offset as usize, segment.bytes.len());
            entries.insert(key, range).is_some()
        })?;

        Ok(Self {
            map: Some(map),
            entries,
            stats,
        })
    }
}

impl OriginalIndex for OffsetIndex {
    fn get(&self, key: &str) -> Result<Option<Arc<str>>, IndexError> {
        let Some((offset, len)) = self.entries.get(key).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        let bytes = self.map.as_deref().unwrap_or_default();
        match bytes.get(offset..offset + len) {
            Some(raw) => Ok(Some(normalize_delimiters(raw).into())),
            None => Err(IndexError::OutOfRange {
                key: key.to_string(),
                offset,
                len,
                size: bytes.len(),
            }),
        }
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

#[cfg(test)]
impl OffsetIndex {
    /// Point `key` at an arbitrary range
    pub(crate) fn insert_raw(&self, key: &str, offset: usize, len: usize) {
        self.entries.insert(key.to_string(), (offset, len));
    }
}
