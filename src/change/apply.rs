//! Applying change sets to the project.
//!
//! Each record is checked against the current state before anything is
//! written: the structure must hold the record's "old" value (or "new" when
//! undoing). A mismatch means the undo history and the project have drifted
//! apart, which is a bug, so it asserts in debug builds and aborts the set
//! with `InconsistentState` otherwise.
//!
//! Derived state is not rebuilt here. The caller runs the pipeline at the
//! returned severity. Records that need no reanalysis patch the symbol table
//! and attribute array directly and report which offsets need redrawing.

use crate::analysis::xrefs::refactor_label;
use crate::analysis::AnalyzerTag;
use crate::change::change_set::ChangeSet;
use crate::change::undoable::{ChangeKind, ReanalysisScope, UndoableChange};
use crate::core::range_set::RangeSet;
use crate::core::symbol::Symbol;
use crate::error::{DisasmError, Result};
use crate::project::DisasmProject;
use std::collections::BTreeMap;
use tracing::{debug, error, info, trace};

/// What a change set did and what has to happen next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    /// How much analysis has to be rerun. Never `DisplayOnly`.
    pub severity: ReanalysisScope,
    /// Some record asked for a full redraw without reanalysis
    pub redraw: bool,
    /// Offsets whose lines changed. Only meaningful when `severity` is `None`.
    pub affected: RangeSet,
    /// Report text from reloading external files, if a properties change
    /// triggered a reload
    pub load_report: String,
}

impl ApplyOutcome {
    /// Combined scope, with a redraw request showing through only when no
    /// reanalysis is needed.
    pub fn scope(&self) -> ReanalysisScope {
        if self.severity == ReanalysisScope::None && self.redraw {
            ReanalysisScope::DisplayOnly
        } else {
            self.severity
        }
    }
}

/// Apply `cs` forward, or reverse it when `backward` is set.
pub fn apply_changes(
    project: &mut DisasmProject,
    cs: &ChangeSet,
    backward: bool,
) -> Result<ApplyOutcome> {
    let _span = crate::span_trace!("apply_changes", count = cs.len(), backward).entered();
    let mut outcome = ApplyOutcome::default();

    let mut records: Vec<&UndoableChange> = cs.iter().collect();
    if backward {
        records.reverse();
    }
    for uc in records {
        trace!(change = %uc, "Applying");
        let scope = apply_one(project, uc, backward, &mut outcome)?;
        if scope == ReanalysisScope::DisplayOnly {
            outcome.redraw = true;
        }
        outcome.severity = outcome.severity.max_severity(scope);
    }

    debug!(
        severity = ?outcome.severity,
        redraw = outcome.redraw,
        affected = outcome.affected.len(),
        "Change set applied"
    );
    Ok(outcome)
}

fn fault(uc: &UndoableChange, problem: &str) -> DisasmError {
    error!(change = %uc, problem, "Change record doesn't match project state");
    debug_assert!(false, "{uc}: {problem}");
    DisasmError::InconsistentState(format!("{uc}: {problem}"))
}

fn direction<'a, T>(old: &'a T, new: &'a T, backward: bool) -> (&'a T, &'a T) {
    if backward {
        (new, old)
    } else {
        (old, new)
    }
}

fn record_offset(uc: &UndoableChange, file_len: usize) -> Result<usize> {
    match uc.offset {
        Some(offset) if offset < file_len => Ok(offset),
        Some(_) => Err(fault(uc, "offset outside file")),
        None => Err(fault(uc, "record has no offset")),
    }
}

/// Check-then-set for the simple per-offset tables. An empty value removes
/// the entry.
fn swap_entry<T: Clone + PartialEq>(
    uc: &UndoableChange,
    map: &mut BTreeMap<usize, T>,
    offset: usize,
    old: Option<&T>,
    new: Option<&T>,
) -> Result<()> {
    if map.get(&offset) != old {
        return Err(fault(uc, "current value differs from recorded old value"));
    }
    match new {
        Some(value) => {
            map.insert(offset, value.clone());
        }
        None => {
            map.remove(&offset);
        }
    }
    Ok(())
}

fn apply_one(
    project: &mut DisasmProject,
    uc: &UndoableChange,
    backward: bool,
    outcome: &mut ApplyOutcome,
) -> Result<ReanalysisScope> {
    let mut scope = uc.scope;
    let file_len = project.image.len();

    match &uc.kind {
        ChangeKind::Dummy => {}

        ChangeKind::SetAddress { old, new } => {
            let (old, new) = direction(old, new, backward);
            let offset = record_offset(uc, file_len)?;
            if project.addr_map.entry_at(offset) != old.as_ref() {
                return Err(fault(uc, "address map entry mismatch"));
            }
            match (old, new) {
                (None, Some(entry)) => project.addr_map.add_entry(entry.clone())?,
                (Some(_), None) => {
                    project.addr_map.remove_entry(offset)?;
                }
                (Some(_), Some(entry)) => {
                    project.addr_map.replace_entry(entry.clone())?;
                }
                (None, None) => {}
            }
        }

        ChangeKind::SetAnalyzerTags { old, new } => {
            let (old, new) = direction(old, new, backward);
            let tags = &mut project.tables.analyzer_tags;
            for (offset, _) in new.iter() {
                let current = tags.get(offset).copied().unwrap_or_default();
                let expected = old.get(offset).copied().unwrap_or_default();
                if current != expected {
                    return Err(fault(uc, "analyzer tag mismatch"));
                }
            }
            for (offset, &tag) in new.iter() {
                if tag == AnalyzerTag::None {
                    tags.remove(offset);
                } else {
                    tags.add(offset, tag);
                }
            }
        }

        ChangeKind::SetStatusFlagOverride { old, new } => {
            let (old, new) = direction(old, new, backward);
            let offset = record_offset(uc, file_len)?;
            let overrides = &mut project.tables.status_overrides;
            if overrides.get(&offset).copied().unwrap_or_default() != *old {
                return Err(fault(uc, "status flag override mismatch"));
            }
            if new.is_default() {
                overrides.remove(&offset);
            } else {
                overrides.insert(offset, *new);
            }
        }

        ChangeKind::SetLabel { old, new } => {
            let (old, new) = direction(old, new, backward);
            let offset = record_offset(uc, file_len)?;
            scope = apply_label(project, uc, offset, old.as_ref(), new.as_ref(), outcome)?;
        }

        ChangeKind::SetOperandFormat { old, new } => {
            let (old, new) = direction(old, new, backward);
            let offset = record_offset(uc, file_len)?;
            swap_entry(
                uc,
                &mut project.tables.operand_formats,
                offset,
                old.as_ref(),
                new.as_ref(),
            )?;
            if let Some(attr) = project.derived.anattribs.get_mut(offset) {
                attr.data_descriptor = new.clone();
            }
            if scope == ReanalysisScope::None {
                let old_len = old.as_ref().map_or(0, |d| d.length());
                let new_len = new.as_ref().map_or(0, |d| d.length());
                let span = old_len.max(new_len).max(1);
                outcome.affected.add_range(offset, (offset + span).min(file_len));
            }
        }

        ChangeKind::SetComment { old, new } => {
            let (old, new) = direction(old, new, backward);
            let offset = record_offset(uc, file_len)?;
            let old = (!old.is_empty()).then_some(old);
            let new = (!new.is_empty()).then_some(new);
            swap_entry(uc, &mut project.tables.comments, offset, old, new)?;
            outcome.affected.add(offset);
        }

        ChangeKind::SetLongComment { old, new } => {
            let (old, new) = direction(old, new, backward);
            let offset = record_offset(uc, file_len)?;
            swap_entry(
                uc,
                &mut project.tables.long_comments,
                offset,
                old.as_ref(),
                new.as_ref(),
            )?;
            outcome.affected.add(offset);
        }

        ChangeKind::SetNote { old, new } => {
            let (old, new) = direction(old, new, backward);
            let offset = record_offset(uc, file_len)?;
            swap_entry(uc, &mut project.tables.notes, offset, old.as_ref(), new.as_ref())?;
            outcome.affected.add(offset);
        }

        ChangeKind::SetMiscFlags { old, new } => {
            let (old, new) = direction(old, new, backward);
            let offset = record_offset(uc, file_len)?;
            let old = (!old.is_empty()).then_some(old);
            let new = (!new.is_empty()).then_some(new);
            swap_entry(uc, &mut project.tables.misc_flags, offset, old, new)?;
        }

        ChangeKind::SetProjectProperties { old, new } => {
            let (old, new) = direction(old, new, backward);
            if project.props != **old {
                return Err(fault(uc, "project properties mismatch"));
            }
            let reload = project.props.external_files_differ(new);
            project.props = (**new).clone();
            if reload {
                info!("External file list changed, reloading");
                let text = project.load_external_files();
                outcome.load_report.push_str(&text);
            }
        }

        ChangeKind::SetLocalVariableTable { old, new } => {
            let (old, new) = direction(old, new, backward);
            let offset = record_offset(uc, file_len)?;
            swap_entry(
                uc,
                &mut project.tables.lv_tables,
                offset,
                old.as_ref(),
                new.as_ref(),
            )?;
        }
    }
    Ok(scope)
}

/// Set, clear or rename a user label. Renames patch the symbol table and
/// every referencing descriptor in place so no reanalysis is needed, unless
/// the old or new name also belongs to a project or platform symbol.
fn apply_label(
    project: &mut DisasmProject,
    uc: &UndoableChange,
    offset: usize,
    old: Option<&Symbol>,
    new: Option<&Symbol>,
    outcome: &mut ApplyOutcome,
) -> Result<ReanalysisScope> {
    // Values follow the address map and may have been corrected since the
    // record was made, so only the name and type are compared.
    let same_label = match (project.tables.user_labels.get(&offset), old) {
        (Some(cur), Some(old)) => cur.label == old.label && cur.symbol_type == old.symbol_type,
        (None, None) => true,
        _ => false,
    };
    if !same_label {
        return Err(fault(uc, "user label mismatch"));
    }
    let mut scope = uc.scope;

    if let Some(old) = old {
        project.derived.symbols.remove(&old.label);
    }
    match new {
        None => {
            project.tables.user_labels.remove(&offset);
        }
        Some(new) => {
            project.tables.user_labels.insert(offset, new.clone());
            project.derived.symbols.insert(new.clone());
            if scope == ReanalysisScope::None {
                scope = rename_label(project, offset, old, new, &mut outcome.affected);
            }
        }
    }

    if project.ext_host.is_label_significant(old, new) {
        debug!(offset, "Extension host wants full reanalysis for label change");
        scope = ReanalysisScope::CodeAndData;
    }
    Ok(scope)
}

fn rename_label(
    project: &mut DisasmProject,
    offset: usize,
    old: Option<&Symbol>,
    new: &Symbol,
    affected: &mut RangeSet,
) -> ReanalysisScope {
    let derived = &mut project.derived;
    if let Some(attr) = derived.anattribs.get_mut(offset) {
        attr.symbol = Some(new.clone());
    }

    let mut repaired = false;
    if let Some(old) = old {
        repaired = refactor_label(
            &mut derived.anattribs,
            &mut project.tables.operand_formats,
            &derived.xrefs,
            offset,
            &old.label,
        );
    }
    if repaired {
        // A reference that was broken now resolves, which changes xrefs.
        debug!(label = %new.label, "Rename repaired an existing reference");
        return ReanalysisScope::DataOnly;
    }

    let shadows_def = |label: &str| {
        project.props.project_symbols.contains_key(label)
            || project.platform_lists.iter().any(|list| list.get(label).is_some())
    };
    if old.is_some_and(|o| shadows_def(&o.label)) || shadows_def(&new.label) {
        debug!(label = %new.label, "Rename involves a project or platform symbol");
        return ReanalysisScope::DataOnly;
    }

    let mut add_line = |off: usize| {
        let len = derived.anattribs.get(off).map_or(1, |a| a.length().max(1));
        affected.add_range(off, off + len);
    };
    add_line(offset);
    if let Some(xset) = derived.xrefs.get(&offset) {
        for xr in xset.iter() {
            add_line(xr.offset);
        }
    }
    ReanalysisScope::None
}
