//! Parsed view of one FIX message

use std::collections::HashMap;

/// Insertion-ordered `tag -> value` mapping.
///
/// A duplicate tag overwrites the earlier value in place, so the first
/// occurrence fixes the position and the last occurrence fixes the value.
/// `clear` keeps the allocations, which lets a worker reuse one map per side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, tag: &str, value: &str) {
        match self.positions.get(tag) {
            Some(&pos) => {
                let slot = &mut self.entries[pos].1;
                slot.clear();
                slot.push_str(value);
            }
            None => {
                self.positions.insert(tag.to_owned(), self.entries.len());
                self.entries.push((tag.to_owned(), value.to_owned()));
            }
        }
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.positions
            .get(tag)
            .map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.positions.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }

    /// Fields in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut map = TagMap::new();
        for (tag, value) in iter {
            map.insert(tag, value);
        }
        map
    }
}
