//! Individual change records.
//!
//! A record holds both the old and the new value so it can be applied in
//! either direction. The constructors decide how much reanalysis the change
//! needs; applying a record never recomputes that.

use crate::analysis::AnalyzerTag;
use crate::config::ProjectProperties;
use crate::core::address_map::AddressMapEntry;
use crate::core::anattrib::MiscFlags;
use crate::core::comment::MultiLineComment;
use crate::core::format_descriptor::{FormatDescriptor, FormatType};
use crate::core::local_variables::LocalVariableTable;
use crate::core::range_set::TypedRangeSet;
use crate::core::status_flags::StatusFlags;
use crate::core::symbol::{Symbol, SymbolSource};
use std::fmt;
use tracing::debug;

/// How much of the analysis pipeline must re-run after a change.
///
/// `None < DataOnly < CodeAndData` by severity. `DisplayOnly` asks for a
/// redraw without touching analysis results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReanalysisScope {
    #[default]
    None,
    DisplayOnly,
    DataOnly,
    CodeAndData,
}

impl ReanalysisScope {
    /// Position on the severity axis. `DisplayOnly` doesn't affect analysis.
    pub fn severity(self) -> u8 {
        match self {
            ReanalysisScope::None | ReanalysisScope::DisplayOnly => 0,
            ReanalysisScope::DataOnly => 1,
            ReanalysisScope::CodeAndData => 2,
        }
    }

    /// The more severe of the two analysis scopes. Never returns
    /// `DisplayOnly`; redraw requests are tracked separately.
    pub fn max_severity(self, other: ReanalysisScope) -> ReanalysisScope {
        let pick = if other.severity() > self.severity() { other } else { self };
        if pick == ReanalysisScope::DisplayOnly {
            ReanalysisScope::None
        } else {
            pick
        }
    }
}

/// The value pair carried by a change record.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// Forces an update without changing anything
    Dummy,
    /// Add, replace or remove the address map entry at the record's offset
    SetAddress {
        old: Option<AddressMapEntry>,
        new: Option<AddressMapEntry>,
    },
    /// Analyzer tags. `new` lists only the offsets being changed, `old`
    /// holds their previous values.
    SetAnalyzerTags {
        old: TypedRangeSet<AnalyzerTag>,
        new: TypedRangeSet<AnalyzerTag>,
    },
    SetStatusFlagOverride { old: StatusFlags, new: StatusFlags },
    SetLabel {
        old: Option<Symbol>,
        new: Option<Symbol>,
    },
    SetOperandFormat {
        old: Option<FormatDescriptor>,
        new: Option<FormatDescriptor>,
    },
    SetComment { old: String, new: String },
    SetLongComment {
        old: Option<MultiLineComment>,
        new: Option<MultiLineComment>,
    },
    SetNote {
        old: Option<MultiLineComment>,
        new: Option<MultiLineComment>,
    },
    SetMiscFlags { old: MiscFlags, new: MiscFlags },
    SetProjectProperties {
        old: Box<ProjectProperties>,
        new: Box<ProjectProperties>,
    },
    SetLocalVariableTable {
        old: Option<LocalVariableTable>,
        new: Option<LocalVariableTable>,
    },
}

impl ChangeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeKind::Dummy => "Dummy",
            ChangeKind::SetAddress { .. } => "SetAddress",
            ChangeKind::SetAnalyzerTags { .. } => "SetAnalyzerTags",
            ChangeKind::SetStatusFlagOverride { .. } => "SetStatusFlagOverride",
            ChangeKind::SetLabel { .. } => "SetLabel",
            ChangeKind::SetOperandFormat { .. } => "SetOperandFormat",
            ChangeKind::SetComment { .. } => "SetComment",
            ChangeKind::SetLongComment { .. } => "SetLongComment",
            ChangeKind::SetNote { .. } => "SetNote",
            ChangeKind::SetMiscFlags { .. } => "SetMiscFlags",
            ChangeKind::SetProjectProperties { .. } => "SetProjectProperties",
            ChangeKind::SetLocalVariableTable { .. } => "SetLocalVariableTable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoableChange {
    /// Root offset of the change, `None` for whole-project changes
    pub offset: Option<usize>,
    pub kind: ChangeKind,
    pub scope: ReanalysisScope,
}

impl UndoableChange {
    fn at(offset: usize, kind: ChangeKind, scope: ReanalysisScope) -> Self {
        Self {
            offset: Some(offset),
            kind,
            scope,
        }
    }

    pub fn dummy(scope: ReanalysisScope) -> Self {
        Self {
            offset: None,
            kind: ChangeKind::Dummy,
            scope,
        }
    }

    /// Address changes reshape code flow, so they always need full analysis.
    pub fn set_address(
        offset: usize,
        old: Option<AddressMapEntry>,
        new: Option<AddressMapEntry>,
    ) -> Self {
        if old == new {
            debug!(offset, "No-op address change");
        }
        Self::at(offset, ChangeKind::SetAddress { old, new }, ReanalysisScope::CodeAndData)
    }

    pub fn set_analyzer_tags(
        old: TypedRangeSet<AnalyzerTag>,
        new: TypedRangeSet<AnalyzerTag>,
    ) -> Self {
        Self {
            offset: None,
            kind: ChangeKind::SetAnalyzerTags { old, new },
            scope: ReanalysisScope::CodeAndData,
        }
    }

    pub fn set_status_flag_override(offset: usize, old: StatusFlags, new: StatusFlags) -> Self {
        if old == new {
            debug!(offset, "No-op status flag change");
        }
        Self::at(
            offset,
            ChangeKind::SetStatusFlagOverride { old, new },
            ReanalysisScope::CodeAndData,
        )
    }

    /// Adding or removing a label changes data analysis. A rename only needs
    /// the referencing lines redrawn.
    pub fn set_label(offset: usize, old: Option<Symbol>, new: Option<Symbol>) -> Self {
        debug_assert!(new.as_ref().map_or(true, |s| s.source == SymbolSource::User));
        let scope = if old.is_none() || new.is_none() {
            ReanalysisScope::DataOnly
        } else {
            ReanalysisScope::None
        };
        Self::at(offset, ChangeKind::SetLabel { old, new }, scope)
    }

    /// Format change, or `None` if it would do nothing. A `Remove` descriptor
    /// is turned into a removal.
    pub fn set_operand_format_checked(
        offset: usize,
        old: Option<FormatDescriptor>,
        new: Option<FormatDescriptor>,
    ) -> Option<Self> {
        let new = new.filter(|dfd| dfd.format_type != FormatType::Remove);
        if old == new {
            debug!(offset, "No-op format change");
            return None;
        }
        Some(Self::set_operand_format(offset, old, new))
    }

    /// Symbol and address formats feed data target analysis; adding,
    /// removing or resizing a format changes what's left uncategorized.
    /// Anything else only changes how the item is displayed.
    pub fn set_operand_format(
        offset: usize,
        old: Option<FormatDescriptor>,
        new: Option<FormatDescriptor>,
    ) -> Self {
        let has_ref = |f: &Option<FormatDescriptor>| f.as_ref().is_some_and(|d| d.has_symbol_or_address());
        let scope = match (&old, &new) {
            _ if has_ref(&old) || has_ref(&new) => ReanalysisScope::DataOnly,
            (Some(o), Some(n)) if o.length() == n.length() => ReanalysisScope::None,
            _ => ReanalysisScope::DataOnly,
        };
        Self::at(offset, ChangeKind::SetOperandFormat { old, new }, scope)
    }

    pub fn set_comment(offset: usize, old: &str, new: &str) -> Self {
        Self::at(
            offset,
            ChangeKind::SetComment {
                old: old.to_string(),
                new: new.to_string(),
            },
            ReanalysisScope::None,
        )
    }

    pub fn set_long_comment(
        offset: usize,
        old: Option<MultiLineComment>,
        new: Option<MultiLineComment>,
    ) -> Self {
        Self::at(offset, ChangeKind::SetLongComment { old, new }, ReanalysisScope::None)
    }

    pub fn set_note(
        offset: usize,
        old: Option<MultiLineComment>,
        new: Option<MultiLineComment>,
    ) -> Self {
        Self::at(offset, ChangeKind::SetNote { old, new }, ReanalysisScope::None)
    }

    /// Misc flags steer platform symbol matching, which runs after the code
    /// analyzer.
    pub fn set_misc_flags(offset: usize, old: MiscFlags, new: MiscFlags) -> Self {
        Self::at(offset, ChangeKind::SetMiscFlags { old, new }, ReanalysisScope::DataOnly)
    }

    pub fn set_project_properties(old: ProjectProperties, new: ProjectProperties) -> Self {
        Self {
            offset: None,
            kind: ChangeKind::SetProjectProperties {
                old: Box::new(old),
                new: Box::new(new),
            },
            scope: ReanalysisScope::CodeAndData,
        }
    }

    pub fn set_local_variable_table(
        offset: usize,
        old: Option<LocalVariableTable>,
        new: Option<LocalVariableTable>,
    ) -> Self {
        Self::at(
            offset,
            ChangeKind::SetLocalVariableTable { old, new },
            ReanalysisScope::DataOnly,
        )
    }
}

impl fmt::Display for UndoableChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(off) => write!(f, "[UC type={} offset=+{off:06x}]", self.kind.name()),
            None => write!(f, "[UC type={} offset=N/A]", self.kind.name()),
        }
    }
}
