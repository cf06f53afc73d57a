//! Cross-reference records.

use crate::core::anattrib::{AccessFlags, MemoryEffect};
use std::fmt;

/// How the referencing location uses the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XrefKind {
    /// JSR/JSL operand
    SubCallOp,
    /// Branch or jump operand
    BranchOp,
    /// Any other instruction operand
    MemAccessOp,
    /// Address stored in data, e.g. a pointer table
    RefFromData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Xref {
    /// Offset of the referencing item
    pub offset: usize,
    /// Reference came from a symbolic operand rather than a raw address
    pub is_by_name: bool,
    pub kind: XrefKind,
    pub access: MemoryEffect,
    pub flags: AccessFlags,
    /// Symbol value minus operand address
    pub adjustment: i32,
}

impl Xref {
    pub fn new(
        offset: usize,
        is_by_name: bool,
        kind: XrefKind,
        access: MemoryEffect,
        flags: AccessFlags,
        adjustment: i32,
    ) -> Self {
        Self {
            offset,
            is_by_name,
            kind,
            access,
            flags,
            adjustment,
        }
    }
}

impl fmt::Display for Xref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Xref off=+{:06x} sym={} type={:?} accType={} adj={}",
            self.offset,
            self.is_by_name,
            self.kind,
            self.access.as_str(),
            self.adjustment
        )
    }
}

/// References to one target, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XrefSet {
    refs: Vec<Xref>,
}

impl XrefSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, xref: Xref) {
        self.refs.push(xref);
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Xref> + '_ {
        self.refs.iter()
    }
}

impl<'a> IntoIterator for &'a XrefSet {
    type Item = &'a Xref;
    type IntoIter = std::slice::Iter<'a, Xref>;

    fn into_iter(self) -> Self::IntoIter {
        self.refs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xref_display() {
        let xref = Xref::new(
            0x10,
            true,
            XrefKind::MemAccessOp,
            MemoryEffect::Read,
            AccessFlags::empty(),
            -2,
        );
        assert_eq!(
            xref.to_string(),
            "Xref off=+000010 sym=true type=MemAccessOp accType=read adj=-2"
        );
        let mut set = XrefSet::new();
        set.add(xref);
        assert_eq!(set.len(), 1);
        assert_eq!((&set).into_iter().count(), 1);
    }
}
