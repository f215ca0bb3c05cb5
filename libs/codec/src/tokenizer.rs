//! FIX tag=value tokenizer
//!
//! Tokenization never fails: malformed input produces an empty or partial
//! [`TagMap`] and the caller decides what to do with it. The tokenizer walks
//! the raw bytes once and recognizes every delimiter dialect in place, so no
//! normalized copy of the message is built on the hot path.

use crate::normalize::{delimiter_width, fix_payload};
use crate::tag_map::TagMap;
use std::borrow::Cow;

/// Symbol (tag 55)
pub const DEFAULT_CORRELATION_TAG: &str = "55";

/// Splits raw messages into fields and extracts the correlation key.
///
/// Cheap to clone; each coordinator worker owns one alongside its reusable
/// [`TagMap`] buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenizer {
    correlation_tag: String,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_CORRELATION_TAG)
    }
}

impl Tokenizer {
    pub fn new(correlation_tag: impl Into<String>) -> Self {
        Self {
            correlation_tag: correlation_tag.into(),
        }
    }

    pub fn correlation_tag(&self) -> &str {
        &self.correlation_tag
    }

    /// Clear `out`, fill it with the fields of `raw` and return the correlation key.
    ///
    /// An absent or empty correlation tag yields `None` (uncorrelatable message).
    pub fn tokenize_into<'m>(&self, raw: &[u8], out: &'m mut TagMap) -> Option<&'m str> {
        out.clear();
        if let Some(payload) = fix_payload(raw) {
            for_each_field(payload, |tag, value| {
                out.insert(&utf8(tag), &utf8(value));
            });
        }
        out.get(&self.correlation_tag).filter(|key| !key.is_empty())
    }

    /// Allocating convenience form of [`Tokenizer::tokenize_into`]
    pub fn tokenize(&self, raw: &[u8]) -> (TagMap, Option<String>) {
        let mut map = TagMap::with_capacity(32);
        let key = self.tokenize_into(raw, &mut map).map(str::to_owned);
        (map, key)
    }

    /// Extract only the correlation key, without materializing a map
    pub fn correlation_key(&self, raw: &[u8]) -> Option<String> {
        let payload = fix_payload(raw)?;
        let wanted = self.correlation_tag.as_bytes();
        let mut key = None;
        for_each_field(payload, |tag, value| {
            if tag == wanted {
                key = Some(value);
            }
        });
        key.filter(|v| !v.is_empty()).map(|v| utf8(v).into_owned())
    }
}

fn utf8(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Invoke `f(tag, value)` for every `tag=value` field of `payload`.
///
/// Fields are split at the first `=`; empty fields, fields without `=` and
/// fields with an empty tag are dropped.
fn for_each_field<'a>(payload: &'a [u8], mut f: impl FnMut(&'a [u8], &'a [u8])) {
    let mut start = 0;
    let mut i = 0;

    while i < payload.len() {
        match delimiter_width(payload, i) {
            Some(width) => {
                emit_field(&payload[start..i], &mut f);
                i += width;
                start = i;
            }
            None => i += 1,
        }
    }
    emit_field(&payload[start..], &mut f);
}

#[inline]
fn emit_field<'a>(field: &'a [u8], f: &mut impl FnMut(&'a [u8], &'a [u8])) {
    if let Some(eq) = field.iter().position(|&b| b == b'=') {
        if eq > 0 {
            f(&field[..eq], &field[eq + 1..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOH_MSG: &[u8] = b"8=FIX.4.2\x0135=D\x0155=VOD.L\x0138=100\x0144=12.5\x01";

    #[test]
    fn test_tokenize_soh() {
        let (map, key) = Tokenizer::default().tokenize(SOH_MSG);
        assert_eq!(key.as_deref(), Some("VOD.L"));
        assert_eq!(map.len(), 5);
        assert_eq!(map.get("44"), Some("12.5"));
        assert_eq!(map.tags().collect::<Vec<_>>(), vec!["8", "35", "55", "38", "44"]);
    }

    #[test]
    fn test_dialects_tokenize_identically() {
        let tokenizer = Tokenizer::default();
        let (soh, _) = tokenizer.tokenize(SOH_MSG);
        let (pipe, _) = tokenizer.tokenize(b"8=FIX.4.2|35=D|55=VOD.L|38=100|44=12.5|");
        let (caret, _) = tokenizer.tokenize(b"8=FIX.4.2^A35=D^A55=VOD.L^A38=100^A44=12.5^A");
        assert_eq!(soh, pipe);
        assert_eq!(soh, caret);
    }

    #[test]
    fn test_log_prefix_discarded() {
        let (map, key) =
            Tokenizer::default().tokenize(b"2025-01-01 10:00:00.123 parse: 8=FIX.4.2|55=X=Y|");
        assert_eq!(key.as_deref(), Some("X=Y"));
        assert_eq!(map.get("8"), Some("FIX.4.2"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_prefix_ending_in_digit() {
        let (map, key) = Tokenizer::default().tokenize(b"seq#128=FIX.4.2|35=D|55=A|");
        assert_eq!(key.as_deref(), Some("A"));
        assert_eq!(map.get("35"), Some("D"));
    }

    #[test]
    fn test_malformed_fields_dropped() {
        let (map, key) = Tokenizer::default().tokenize(b"8=FIX.4.2||garbage|=orphan|35=D");
        assert_eq!(key, None);
        assert_eq!(map.tags().collect::<Vec<_>>(), vec!["8", "35"]);
    }

    #[test]
    fn test_no_begin_string_yields_empty_map() {
        let (map, key) = Tokenizer::default().tokenize(b"35=D|55=VOD.L|");
        assert!(map.is_empty());
        assert_eq!(key, None);

        let (map, key) = Tokenizer::default().tokenize(b"");
        assert!(map.is_empty());
        assert_eq!(key, None);
    }

    #[test]
    fn test_duplicate_tag_last_wins() {
        let (map, key) = Tokenizer::default().tokenize(b"8=FIX.4.2|55=A|55=B|");
        assert_eq!(key.as_deref(), Some("B"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_empty_key_is_uncorrelatable() {
        let (_, key) = Tokenizer::default().tokenize(b"8=FIX.4.2|55=|");
        assert_eq!(key, None);
        assert_eq!(Tokenizer::default().correlation_key(b"8=FIX.4.2|55=|"), None);
    }

    #[test]
    fn test_configured_correlation_tag() {
        let tokenizer = Tokenizer::new("11");
        let raw = b"8=FIX.4.2|11=CL-1|37=ORD-9|55=VOD.L|";
        assert_eq!(tokenizer.correlation_key(raw).as_deref(), Some("CL-1"));

        let mut buffer = TagMap::new();
        assert_eq!(tokenizer.tokenize_into(raw, &mut buffer), Some("CL-1"));
    }

    #[test]
    fn test_buffer_reuse_clears_previous_fields() {
        let tokenizer = Tokenizer::default();
        let mut buffer = TagMap::new();
        tokenizer.tokenize_into(b"8=FIX.4.2|55=A|58=first|", &mut buffer);
        let key = tokenizer.tokenize_into(b"8=FIX.4.2|55=B|", &mut buffer);
        assert_eq!(key, Some("B"));
        assert!(!buffer.contains("58"));
    }
}
