mod common;

use common::*;
use disasm_core::change::{ReanalysisScope, UndoableChange};
use disasm_core::core::format_descriptor::{FormatDescriptor, FormatSubType, FormatType};
use std::collections::BTreeMap;

fn hex(len: usize) -> FormatDescriptor {
    FormatDescriptor::new(len, FormatType::NumericLE, FormatSubType::Hex)
}

/// RTS followed by 15 zero bytes.
fn data_project() -> disasm_core::DisasmProject {
    let mut data = vec![0x60];
    data.extend_from_slice(&[0; 15]);
    project(&data)
}

fn assert_no_overlaps(formats: &BTreeMap<usize, FormatDescriptor>) {
    let mut end = 0;
    for (&off, dfd) in formats {
        assert!(off >= end, "format at +{off:06x} overlaps previous");
        end = off + dfd.length();
    }
}

#[test]
fn test_overlapping_entry_replaced() {
    let mut project = data_project();
    project
        .do_changes(
            [UndoableChange::set_operand_format(10, None, Some(hex(3)))]
                .into_iter()
                .collect(),
        )
        .unwrap();

    let new_list: BTreeMap<usize, FormatDescriptor> = [(12, hex(2))].into_iter().collect();
    let cs = project.generate_format_merge_set(&new_list);
    assert_eq!(cs.len(), 2);
    assert_eq!(cs.required_scope(), ReanalysisScope::CodeAndData);
    let offsets: Vec<_> = cs.iter().map(|uc| uc.offset).collect();
    assert_eq!(offsets, vec![Some(10), Some(12)]);

    project.do_changes(cs).unwrap();
    assert_eq!(project.operand_formats(), &new_list);
    assert_no_overlaps(project.operand_formats());
    item_starts(project.anattribs());

    // Merging the same list again does nothing.
    assert!(project.generate_format_merge_set(&new_list).is_empty());

    project.undo().unwrap();
    assert_eq!(project.operand_formats().len(), 1);
    assert_eq!(project.operand_formats()[&10], hex(3));
}

#[test]
fn test_wide_entry_subsumes_several() {
    let mut project = data_project();
    let cs = [
        UndoableChange::set_operand_format(2, None, Some(hex(2))),
        UndoableChange::set_operand_format(4, None, Some(hex(1))),
        UndoableChange::set_operand_format(5, None, Some(hex(2))),
        UndoableChange::set_operand_format(9, None, Some(hex(1))),
    ]
    .into_iter()
    .collect();
    project.do_changes(cs).unwrap();

    let wide = FormatDescriptor::new(5, FormatType::Dense, FormatSubType::None);
    let new_list: BTreeMap<usize, FormatDescriptor> = [(3, wide.clone())].into_iter().collect();
    let cs = project.generate_format_merge_set(&new_list);
    // remove 2, add 3, remove 4, remove 5
    assert_eq!(cs.len(), 4);

    project.do_changes(cs).unwrap();
    let offsets: Vec<_> = project.operand_formats().keys().copied().collect();
    assert_eq!(offsets, vec![3, 9]);
    assert_eq!(project.operand_formats()[&3], wide);
    assert_no_overlaps(project.operand_formats());
}

#[test]
fn test_adjacent_entries_untouched() {
    let mut project = data_project();
    project
        .do_changes(
            [UndoableChange::set_operand_format(4, None, Some(hex(2)))]
                .into_iter()
                .collect(),
        )
        .unwrap();
    let new_list: BTreeMap<usize, FormatDescriptor> =
        [(2, hex(2)), (6, hex(2))].into_iter().collect();
    let cs = project.generate_format_merge_set(&new_list);
    assert_eq!(cs.len(), 2);
    assert!(cs.iter().all(|uc| matches!(
        &uc.kind,
        disasm_core::change::ChangeKind::SetOperandFormat { old: None, .. }
    )));
}
