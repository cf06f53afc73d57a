//! Sets of file offsets.
//!
//! `RangeSet` collects offsets (typically the lines a change touched) and can
//! walk them back as merged ranges. `TypedRangeSet` attaches a value to each
//! offset, which is how analyzer tags are stored.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    offsets: BTreeSet<usize>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, offset: usize) {
        self.offsets.insert(offset);
    }

    /// Add every offset in `[start, end)`.
    pub fn add_range(&mut self, start: usize, end: usize) {
        self.offsets.extend(start..end);
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.offsets.contains(&offset)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.offsets.iter().copied()
    }

    /// Contiguous runs, in ascending order.
    pub fn ranges(&self) -> Vec<Range<usize>> {
        let mut out: Vec<Range<usize>> = Vec::new();
        for &off in &self.offsets {
            match out.last_mut() {
                Some(last) if last.end == off => last.end = off + 1,
                _ => out.push(off..off + 1),
            }
        }
        out
    }

    pub fn merge(&mut self, other: &RangeSet) {
        self.offsets.extend(other.offsets.iter().copied());
    }
}

/// Offset-keyed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedRangeSet<T> {
    values: BTreeMap<usize, T>,
}

impl<T> Default for TypedRangeSet<T> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<T: Clone + PartialEq> TypedRangeSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value at `offset`, replacing any existing value.
    pub fn add(&mut self, offset: usize, value: T) {
        self.values.insert(offset, value);
    }

    pub fn add_range(&mut self, start: usize, end: usize, value: T) {
        for off in start..end {
            self.values.insert(off, value.clone());
        }
    }

    pub fn remove(&mut self, offset: usize) -> Option<T> {
        self.values.remove(&offset)
    }

    pub fn get(&self, offset: usize) -> Option<&T> {
        self.values.get(&offset)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Runs of equal values over contiguous offsets.
    pub fn ranges(&self) -> Vec<(Range<usize>, T)> {
        let mut out: Vec<(Range<usize>, T)> = Vec::new();
        for (&off, val) in &self.values {
            match out.last_mut() {
                Some((range, last)) if range.end == off && last == val => range.end = off + 1,
                _ => out.push((off..off + 1, val.clone())),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_merge_adjacent() {
        let mut set = RangeSet::new();
        set.add(5);
        set.add_range(1, 4);
        set.add(4);
        set.add(9);
        assert_eq!(set.ranges(), vec![1..6, 9..10]);
        assert_eq!(set.len(), 6);
        assert!(set.contains(3));
        assert!(!set.contains(6));
    }

    #[test]
    fn test_typed_ranges_split_on_value() {
        let mut set = TypedRangeSet::new();
        set.add_range(0, 3, 'a');
        set.add(3, 'b');
        set.add(5, 'b');
        assert_eq!(set.ranges(), vec![(0..3, 'a'), (3..4, 'b'), (5..6, 'b')]);
        assert_eq!(set.get(1), Some(&'a'));
        assert_eq!(set.remove(1), Some('a'));
        assert_eq!(set.get(1), None);
    }
}
