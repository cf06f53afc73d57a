//! Problems found in project data during analysis.
//!
//! Bad user data (labels inside instructions, descriptors past the end of the
//! file) is never fatal. The offending item is skipped and an entry lands here
//! so a caller can show it to the user.

use std::fmt;

/// Ordered so that sorting descending puts errors first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    HiddenLabel,
    HiddenLocalVariableTable,
    UnresolvedWeakRef,
    InvalidOffsetOrLength,
    InvalidDescriptor,
    BankOverrun,
    NonAddrLabelRef,
}

/// What the analyzer did about the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    None,
    LabelIgnored,
    LocalVariableTableIgnored,
    FormatDescriptorIgnored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub severity: Severity,
    pub offset: usize,
    pub kind: MessageKind,
    /// Label, descriptor or other context, rendered as text
    pub context: String,
    pub resolution: Resolution,
}

impl MessageEntry {
    pub fn new(
        severity: Severity,
        offset: usize,
        kind: MessageKind,
        context: impl Into<String>,
        resolution: Resolution,
    ) -> Self {
        Self {
            severity,
            offset,
            kind,
            context: context.into(),
            resolution,
        }
    }
}

impl fmt::Display for MessageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} +{:06x} {:?}({}): {:?}",
            self.severity, self.offset, self.kind, self.context, self.resolution
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageList {
    entries: Vec<MessageEntry>,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: MessageEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageEntry> + '_ {
        self.entries.iter()
    }

    /// Highest severity first, then by offset.
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| b.severity.cmp(&a.severity).then(a.offset.cmp(&b.offset)));
    }

    pub fn count_of(&self, kind: MessageKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}
