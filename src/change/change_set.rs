//! Ordered groups of change records, applied and undone as a unit.

use crate::change::undoable::{ReanalysisScope, UndoableChange};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<UndoableChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            changes: Vec::with_capacity(capacity),
        }
    }

    /// Set holding a single change.
    pub fn single(change: UndoableChange) -> Self {
        Self {
            changes: vec![change],
        }
    }

    pub fn add(&mut self, change: UndoableChange) {
        self.changes.push(change);
    }

    /// Add `change` if there is one. Convenient with constructors that
    /// return `None` for a no-op.
    pub fn add_non_null(&mut self, change: Option<UndoableChange>) {
        if let Some(change) = change {
            self.changes.push(change);
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&UndoableChange> {
        self.changes.get(index)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &UndoableChange> + '_ {
        self.changes.iter()
    }

    /// Most severe analysis scope across all records.
    pub fn required_scope(&self) -> ReanalysisScope {
        self.changes
            .iter()
            .fold(ReanalysisScope::None, |acc, uc| acc.max_severity(uc.scope))
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a UndoableChange;
    type IntoIter = std::slice::Iter<'a, UndoableChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl FromIterator<UndoableChange> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = UndoableChange>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}
