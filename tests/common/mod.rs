//! Shared helpers for the integration tests.
//!
//! Projects are built from small hand-assembled 6502 images loaded at
//! `LOAD_ADDR`, analyzed with the reference tracer and data analyzer.

#![allow(dead_code)]

use disasm_core::config::ProjectProperties;
use disasm_core::core::anattrib::Anattrib;
use disasm_core::core::file_image::FileImage;
use disasm_core::core::symbol::{Symbol, SymbolSource, SymbolType};
use disasm_core::DisasmProject;

pub const LOAD_ADDR: i32 = 0x1000;

/// ```text
/// 1000: LDA $1006
/// 1003: JMP $1000
/// 1006: .db $42
/// ```
pub const LOOP_PROGRAM: [u8; 7] = [0xad, 0x06, 0x10, 0x4c, 0x00, 0x10, 0x42];

/// Analyze `data` with default properties.
pub fn project(data: &[u8]) -> DisasmProject {
    project_with(data, ProjectProperties::default())
}

/// Analyze `data` with `props`. Panics if external files reported problems.
pub fn project_with(data: &[u8], props: ProjectProperties) -> DisasmProject {
    let mut project =
        DisasmProject::new(FileImage::new(data.to_vec(), "test.bin"), LOAD_ADDR, props);
    let report = project.prepare();
    assert!(report.is_empty(), "unexpected load report: {report}");
    project
}

pub fn user_label(label: &str, value: i32) -> Symbol {
    Symbol::new(label, value, SymbolSource::User, SymbolType::LocalOrGlobalAddr)
}

/// Label of the weak reference in the descriptor at `offset`, if any.
pub fn operand_symbol(project: &DisasmProject, offset: usize) -> Option<String> {
    project
        .anattrib(offset)?
        .data_descriptor
        .as_ref()?
        .symbol_ref
        .as_ref()
        .map(|r| r.label.clone())
}

/// Walk the attribute array by item length and return the item starts.
/// Panics if the walk doesn't land exactly on the end of the file.
pub fn item_starts(anattribs: &[Anattrib]) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut offset = 0;
    while offset < anattribs.len() {
        let attr = &anattribs[offset];
        assert!(attr.is_start(), "+{offset:06x} is not an item start");
        assert!(attr.length() > 0, "+{offset:06x} has zero length");
        starts.push(offset);
        offset += attr.length();
    }
    assert_eq!(offset, anattribs.len(), "items overrun the file");
    starts
}
