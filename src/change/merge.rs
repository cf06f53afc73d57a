//! Merging a batch of new operand formats into the existing set.

use crate::change::change_set::ChangeSet;
use crate::change::undoable::{ReanalysisScope, UndoableChange};
use crate::core::format_descriptor::FormatDescriptor;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Intersection of two half-open ranges is non-empty.
fn overlaps(a_off: usize, a_len: usize, b_off: usize, b_len: usize) -> bool {
    a_off.max(b_off) < (a_off + a_len).min(b_off + b_len)
}

fn format_change(
    offset: usize,
    old: Option<&FormatDescriptor>,
    new: Option<&FormatDescriptor>,
) -> Option<UndoableChange> {
    UndoableChange::set_operand_format_checked(offset, old.cloned(), new.cloned()).map(|mut uc| {
        uc.scope = ReanalysisScope::CodeAndData;
        uc
    })
}

/// Build the change set that applies `new_list` on top of `main`, removing
/// every existing format that overlaps a new one. Identical entries produce
/// no change, so merging a list into itself yields an empty set.
pub fn generate_format_merge_set(
    main: &BTreeMap<usize, FormatDescriptor>,
    new_list: &BTreeMap<usize, FormatDescriptor>,
) -> ChangeSet {
    let _span = crate::span_trace!("format_merge", count = new_list.len()).entered();
    let main: Vec<(usize, &FormatDescriptor)> = main.iter().map(|(k, v)| (*k, v)).collect();
    let new: Vec<(usize, &FormatDescriptor)> = new_list.iter().map(|(k, v)| (*k, v)).collect();
    let mut cs = ChangeSet::with_capacity(new.len() * 2);

    let mut main_idx = 0;
    let mut new_idx = 0;
    while new_idx < new.len() {
        let (new_off, new_dfd) = new[new_idx];
        let new_len = new_dfd.length();

        let Some(&(main_off, main_dfd)) = main.get(main_idx) else {
            cs.add_non_null(format_change(new_off, None, Some(new_dfd)));
            new_idx += 1;
            continue;
        };

        if overlaps(main_off, main_dfd.length(), new_off, new_len) {
            trace!(main_off, new_off, "Format overlap");
            if main_off == new_off {
                if main_dfd == new_dfd {
                    trace!(offset = new_off, "No-op format");
                } else {
                    cs.add_non_null(format_change(new_off, Some(main_dfd), Some(new_dfd)));
                }
            } else {
                cs.add_non_null(format_change(main_off, Some(main_dfd), None));
                cs.add_non_null(format_change(new_off, None, Some(new_dfd)));
            }
            new_idx += 1;

            // A wide new entry can cover several old ones.
            main_idx += 1;
            while let Some(&(off, dfd)) = main.get(main_idx) {
                if !overlaps(off, dfd.length(), new_off, new_len) {
                    break;
                }
                cs.add_non_null(format_change(off, Some(dfd), None));
                main_idx += 1;
            }
        } else if main_off < new_off {
            main_idx += 1;
        } else {
            cs.add_non_null(format_change(new_off, None, Some(new_dfd)));
            new_idx += 1;
        }
    }
    debug!(changes = cs.len(), "Generated format merge set");
    cs
}
