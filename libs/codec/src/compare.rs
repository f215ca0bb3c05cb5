//! Tag-level comparison of an original message and its replay

use crate::tag_map::TagMap;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::trace;
use types::{TagMismatch, Verdict};

/// BodyLength, CheckSum and SendingTime differ on every resend
pub const DEFAULT_IGNORED_TAGS: [&str; 3] = ["9", "10", "52"];

/// Compares two tokenized messages over the union of their tags, minus the ignore set.
#[derive(Debug, Clone)]
pub struct Comparator {
    ignored: HashSet<String>,
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_TAGS)
    }
}

impl Comparator {
    pub fn new<I, S>(ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored: ignored.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_ignored(&self, tag: &str) -> bool {
        self.ignored.contains(tag)
    }

    /// Ignored tags in tag order
    pub fn ignored_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.ignored.iter().map(String::as_str).collect();
        tags.sort_unstable_by(|a, b| tag_order(a, b));
        tags
    }

    /// Differing tags in tag order; empty means the messages match.
    ///
    /// Values are compared byte for byte: no numeric parsing, no trimming.
    pub fn compare(&self, original: &TagMap, replay: &TagMap) -> Vec<TagMismatch> {
        let mut union: Vec<&str> = original
            .tags()
            .chain(replay.tags().filter(|t| !original.contains(t)))
            .filter(|t| !self.is_ignored(t))
            .collect();
        union.sort_unstable_by(|a, b| tag_order(a, b));

        let mut diffs = Vec::new();
        for tag in union {
            let diff = match (original.get(tag), replay.get(tag)) {
                (None, Some(replay_value)) => TagMismatch::extra_in_replay(tag, replay_value),
                (Some(original_value), None) => TagMismatch::missing_in_replay(tag, original_value),
                (Some(a), Some(b)) if a == b => continue,
                (Some(a), Some(b)) => TagMismatch::changed(tag, a, b),
                (None, None) => continue,
            };
            trace!(tag, original = %diff.original, replay = %diff.replay, "tag mismatch");
            diffs.push(diff);
        }
        diffs
    }

    /// Compare and wrap the outcome as a `MATCH`/`MISMATCH` verdict for `key`
    pub fn verdict(&self, key: &str, original: &TagMap, replay: &TagMap) -> Verdict {
        Verdict::compared(key, self.compare(original, replay))
    }
}

/// Numeric tags ascending by value, then non-numeric tags lexicographically
pub fn tag_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tokenizer;
    use types::VerdictStatus;

    fn parse(raw: &str) -> TagMap {
        Tokenizer::default().tokenize(raw.as_bytes()).0
    }

    const ORIGINAL: &str = "8=FIX.4.2|35=D|55=VOD.L|38=100|44=12.5|";

    #[test]
    fn test_exact_match() {
        let verdict = Comparator::default().verdict("VOD.L", &parse(ORIGINAL), &parse(ORIGINAL));
        assert_eq!(verdict.status(), VerdictStatus::Match);
        assert!(verdict.diffs().is_empty());
    }

    #[test]
    fn test_single_field_mismatch() {
        let replay = "8=FIX.4.2|35=D|55=VOD.L|38=100|44=12.6|";
        let diffs = Comparator::default().compare(&parse(ORIGINAL), &parse(replay));
        assert_eq!(diffs, vec![TagMismatch::changed("44", "12.5", "12.6")]);
    }

    #[test]
    fn test_ignored_tag_only_difference() {
        let original = "8=FIX.4.2|9=120|35=D|52=20250101-10:00:00|55=VOD.L|10=001|";
        let replay = "8=FIX.4.2|9=121|35=D|52=20250101-10:00:01|55=VOD.L|10=222|";
        let verdict = Comparator::default().verdict("VOD.L", &parse(original), &parse(replay));
        assert_eq!(verdict.status(), VerdictStatus::Match);
    }

    #[test]
    fn test_ignored_tag_present_on_one_side_only() {
        let replay = "8=FIX.4.2|35=D|52=20250101-10:00:01|55=VOD.L|38=100|44=12.5|";
        let diffs = Comparator::default().compare(&parse(ORIGINAL), &parse(replay));
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_extra_and_missing_tags() {
        let original = "8=FIX.4.2|35=D|55=VOD.L|38=100|";
        let replay = "8=FIX.4.2|35=D|55=VOD.L|58=note|";
        let diffs = Comparator::default().compare(&parse(original), &parse(replay));
        assert_eq!(
            diffs,
            vec![
                TagMismatch::missing_in_replay("38", "100"),
                TagMismatch::extra_in_replay("58", "note"),
            ]
        );
    }

    #[test]
    fn test_byte_exact_values() {
        let diffs = Comparator::default().compare(
            &parse("8=FIX.4.2|55=A|44=12.50|"),
            &parse("8=FIX.4.2|55=A|44=12.5|"),
        );
        assert_eq!(diffs.len(), 1);

        let diffs = Comparator::default().compare(
            &parse("8=FIX.4.2|55=A|58=x|"),
            &parse("8=FIX.4.2|55=A|58=x |"),
        );
        assert_eq!(diffs.len(), 1);
    }

    #[test]
    fn test_custom_ignore_set() {
        let comparator = Comparator::new(["44"]);
        assert!(comparator.is_ignored("44"));
        assert!(!comparator.is_ignored("52"));
        let replay = "8=FIX.4.2|35=D|55=VOD.L|38=100|44=99|";
        assert!(comparator.compare(&parse(ORIGINAL), &parse(replay)).is_empty());
    }

    #[test]
    fn test_tag_order() {
        let mut tags = vec!["100", "9", "abc", "55", "10", "Abc", "8"];
        tags.sort_by(|a, b| tag_order(a, b));
        assert_eq!(tags, vec!["8", "9", "10", "55", "100", "Abc", "abc"]);
        assert_eq!(Comparator::default().ignored_tags(), vec!["9", "10", "52"]);
    }
}
