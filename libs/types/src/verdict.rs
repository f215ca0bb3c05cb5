//! Verdict model
//!
//! A [`Verdict`] is created once per correlated replay message. Its status is
//! derived from the diff list at construction time, so `MATCH` always comes
//! with an empty diff list and `MISMATCH` never does.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Placeholder used in a diff tuple for the side that lacks the tag
pub const MISSING: &str = "MISSING";

/// Outcome of comparing one replay message against its original
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Match,
    Mismatch,
    MissingInOriginal,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Match => "MATCH",
            VerdictStatus::Mismatch => "MISMATCH",
            VerdictStatus::MissingInOriginal => "MISSING_IN_ORIGINAL",
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One differing tag: `(original, replay)` values, either of which may be [`MISSING`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMismatch {
    pub tag: String,
    pub original: String,
    pub replay: String,
}

impl TagMismatch {
    /// Tag present on both sides with different values
    pub fn changed(tag: impl Into<String>, original: impl Into<String>, replay: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            original: original.into(),
            replay: replay.into(),
        }
    }

    /// Tag only present in the replay
    pub fn extra_in_replay(tag: impl Into<String>, replay: impl Into<String>) -> Self {
        Self::changed(tag, MISSING, replay)
    }

    /// Tag only present in the original
    pub fn missing_in_replay(tag: impl Into<String>, original: impl Into<String>) -> Self {
        Self::changed(tag, original, MISSING)
    }

    /// Same tag with the two sides exchanged
    pub fn swapped(&self) -> Self {
        Self::changed(self.tag.clone(), self.replay.clone(), self.original.clone())
    }
}

/// Result record for one replay message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    stream: Option<Arc<str>>,
    key: String,
    status: VerdictStatus,
    diffs: Vec<TagMismatch>,
}

impl Verdict {
    /// Build a comparison verdict; the status follows from whether `diffs` is empty
    pub fn compared(key: impl Into<String>, diffs: Vec<TagMismatch>) -> Self {
        let status = if diffs.is_empty() {
            VerdictStatus::Match
        } else {
            VerdictStatus::Mismatch
        };
        Self {
            stream: None,
            key: key.into(),
            status,
            diffs,
        }
    }

    /// The replay key has no entry in the original index
    pub fn missing_in_original(key: impl Into<String>) -> Self {
        Self {
            stream: None,
            key: key.into(),
            status: VerdictStatus::MissingInOriginal,
            diffs: Vec::new(),
        }
    }

    /// Tag the verdict with its stream name (only serialized when set)
    pub fn with_stream(mut self, stream: Arc<str>) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> VerdictStatus {
        self.status
    }

    pub fn diffs(&self) -> &[TagMismatch] {
        &self.diffs
    }

    pub fn stream(&self) -> Option<&str> {
        self.stream.as_deref()
    }

    /// Look up the diff entry for one tag
    pub fn diff(&self, tag: &str) -> Option<&TagMismatch> {
        self.diffs.iter().find(|d| d.tag == tag)
    }
}

/// Serializes diffs as an ordered JSON object `{tag: [original, replay]}`
struct MismatchMap<'a>(&'a [TagMismatch]);

impl Serialize for MismatchMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for diff in self.0 {
            map.serialize_entry(&diff.tag, &[diff.original.as_str(), diff.replay.as_str()])?;
        }
        map.end()
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.stream.is_some() { 5 } else { 4 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("type", "RESULT")?;
        if let Some(stream) = &self.stream {
            map.serialize_entry("stream", stream.as_ref())?;
        }
        map.serialize_entry("orderId", &self.key)?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("tagMismatches", &MismatchMap(&self.diffs))?;
        map.end()
    }
}
