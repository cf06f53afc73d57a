mod common;

use common::*;
use disasm_core::analysis::AnalyzerTag;
use disasm_core::change::{ChangeSet, ReanalysisScope, UndoableChange};
use disasm_core::core::address_map::AddressMapEntry;
use disasm_core::core::comment::MultiLineComment;
use disasm_core::core::format_descriptor::FormatDescriptor;
use disasm_core::core::local_variables::LocalVariableTable;
use disasm_core::core::range_set::TypedRangeSet;
use disasm_core::core::weak_ref::{Part, WeakSymbolRef};

#[test]
fn test_undo_restores_every_table() {
    let mut project = project(&LOOP_PROGRAM);
    let tables_before = project.tables().clone();
    let map_before = project.addr_map().clone();
    let attrs_before = project.anattribs().to_vec();

    let mut old_tags = TypedRangeSet::new();
    old_tags.add(6, AnalyzerTag::None);
    let mut new_tags = TypedRangeSet::new();
    new_tags.add(6, AnalyzerTag::Stop);

    let mut lv = LocalVariableTable::new();
    lv.clear_previous = true;

    let mut cs = ChangeSet::new();
    cs.add(UndoableChange::set_label(6, None, Some(user_label("FOO", 0x1006))));
    cs.add(UndoableChange::set_long_comment(
        0,
        None,
        Some(MultiLineComment::new("Main loop")),
    ));
    cs.add(UndoableChange::set_note(3, None, Some(MultiLineComment::new("check"))));
    cs.add(UndoableChange::set_analyzer_tags(old_tags, new_tags));
    cs.add(UndoableChange::set_local_variable_table(0, None, Some(lv)));
    cs.add(UndoableChange::set_address(
        3,
        None,
        Some(AddressMapEntry::new(3, Some(0x2000))),
    ));

    let outcome = project.do_changes(cs).unwrap();
    assert_eq!(outcome.severity, ReanalysisScope::CodeAndData);
    assert_ne!(project.tables(), &tables_before);
    assert_eq!(project.addr_map().entries().len(), 2);

    project.undo().unwrap();
    assert_eq!(project.tables(), &tables_before);
    assert_eq!(project.addr_map(), &map_before);
    assert_eq!(project.anattribs(), attrs_before.as_slice());

    project.redo().unwrap();
    assert_eq!(project.tables().user_labels[&6].label, "FOO");
    assert_eq!(project.tables().analyzer_tags.get(6), Some(&AnalyzerTag::Stop));
}

#[test]
fn test_rename_needs_no_reanalysis() {
    let mut project = project(&LOOP_PROGRAM);
    project
        .do_changes(ChangeSet::single(UndoableChange::set_label(
            6,
            None,
            Some(user_label("FOO", 0x1006)),
        )))
        .unwrap();
    assert_eq!(operand_symbol(&project, 0).as_deref(), Some("FOO"));

    let rename = UndoableChange::set_label(
        6,
        Some(user_label("FOO", 0x1006)),
        Some(user_label("BAR", 0x1006)),
    );
    assert_eq!(rename.scope, ReanalysisScope::None);
    let outcome = project.do_changes(ChangeSet::single(rename)).unwrap();

    assert_eq!(outcome.scope(), ReanalysisScope::None);
    // the label line plus the LDA that refers to it
    assert_eq!(outcome.affected.ranges(), vec![0..3, 6..7]);
    assert_eq!(operand_symbol(&project, 0).as_deref(), Some("BAR"));
    assert!(project.symbol_table().contains("BAR"));
    assert!(!project.symbol_table().contains("FOO"));
    assert_eq!(project.find_label_offset_by_name("BAR"), Some(6));

    // A full pass agrees with the incremental patch.
    let patched = project.anattribs().to_vec();
    project.analyze(ReanalysisScope::CodeAndData);
    assert_eq!(project.anattribs(), patched.as_slice());

    let outcome = project.undo().unwrap();
    assert_eq!(outcome.scope(), ReanalysisScope::None);
    assert_eq!(operand_symbol(&project, 0).as_deref(), Some("FOO"));
}

#[test]
fn test_rename_keeps_high_part_big_endian() {
    let mut project = project(&LOOP_PROGRAM);
    let high_be = FormatDescriptor::with_symbol(3, WeakSymbolRef::new("FOO", Part::High), true);
    let mut cs = ChangeSet::new();
    cs.add(UndoableChange::set_label(6, None, Some(user_label("FOO", 0x1006))));
    cs.add(UndoableChange::set_operand_format(0, None, Some(high_be)));
    project.do_changes(cs).unwrap();
    assert_eq!(operand_symbol(&project, 0).as_deref(), Some("FOO"));

    project
        .do_changes(ChangeSet::single(UndoableChange::set_label(
            6,
            Some(user_label("FOO", 0x1006)),
            Some(user_label("BAR", 0x1006)),
        )))
        .unwrap();

    let live = project.anattrib(0).unwrap().data_descriptor.clone().unwrap();
    let stored = project.operand_formats()[&0].clone();
    for dfd in [live, stored] {
        let wref = dfd.symbol_ref.as_ref().unwrap();
        assert_eq!(wref.label, "BAR");
        assert_eq!(wref.part, Part::High);
        assert!(dfd.is_big_endian());
    }
}

#[test]
fn test_undo_redo_empty_stack() {
    let mut project = project(&LOOP_PROGRAM);
    assert_eq!(project.undo().unwrap_err().to_string(), "Can't undo");
    assert_eq!(project.redo().unwrap_err().to_string(), "Can't redo");
}

#[test]
fn test_push_discards_redo() {
    let mut project = project(&LOOP_PROGRAM);
    let comment = |old: &str, new: &str| ChangeSet::single(UndoableChange::set_comment(0, old, new));
    project.do_changes(comment("", "one")).unwrap();
    project.undo().unwrap();
    assert!(project.undo_stack().can_redo());
    project.do_changes(comment("", "two")).unwrap();
    assert!(!project.undo_stack().can_redo());
    assert_eq!(project.tables().comments[&0], "two");
}

#[cfg(debug_assertions)]
#[test]
#[should_panic]
fn test_mismatched_record_asserts() {
    let mut project = project(&LOOP_PROGRAM);
    let stale = UndoableChange::set_label(6, Some(user_label("GONE", 0x1006)), None);
    let _ = project.apply_changes(&ChangeSet::single(stale), false);
}

#[cfg(not(debug_assertions))]
#[test]
fn test_mismatched_record_aborts_set() {
    let mut project = project(&LOOP_PROGRAM);
    let mut cs = ChangeSet::new();
    cs.add(UndoableChange::set_comment(0, "", "applied"));
    cs.add(UndoableChange::set_label(6, Some(user_label("GONE", 0x1006)), None));
    cs.add(UndoableChange::set_comment(3, "", "never"));

    let err = project.do_changes(cs).unwrap_err();
    assert!(matches!(err, disasm_core::DisasmError::InconsistentState(_)));
    assert_eq!(project.tables().comments[&0], "applied");
    assert!(!project.tables().comments.contains_key(&3));
    assert!(project.user_labels().is_empty());
    assert!(!project.undo_stack().can_undo());
}
