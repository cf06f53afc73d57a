//! Post-analysis consistency checks.

use crate::core::address_map::AddressMap;
use crate::core::anattrib::Anattrib;
use crate::core::format_descriptor::{FormatDescriptor, FormatType};
use crate::core::messages::{MessageEntry, MessageKind, MessageList, Resolution, Severity};
use std::collections::BTreeMap;

/// Longest instruction is four bytes, so a stray tail is at most three.
const MAX_EXTRA_INSTR_BYTES: usize = 3;

/// Check that the attribute array tiles the file and that the persistent
/// formats hold no placeholder entries. Returns a description of each
/// problem found; an empty list means the analysis is consistent.
pub fn validate(
    anattribs: &[Anattrib],
    operand_formats: &BTreeMap<usize, FormatDescriptor>,
) -> Vec<String> {
    let mut problems = Vec::new();
    let len = anattribs.len();

    let mut offset = 0;
    while offset < len {
        let attr = &anattribs[offset];
        if !attr.is_start() || attr.length() == 0 {
            problems.push(format!("+{offset:06x}: walk landed on non-start ({attr})"));
            break;
        }
        let is_code = attr.is_instruction_start();
        offset += attr.length();

        // Embedded instructions may run past the end of the outer one.
        let mut extra = 0;
        while offset < len && anattribs[offset].is_instruction() && !anattribs[offset].is_instruction_start() {
            extra += 1;
            offset += 1;
        }
        if extra != 0 && !is_code {
            problems.push(format!("+{offset:06x}: data runs into middle of instruction"));
        }
        if extra > MAX_EXTRA_INSTR_BYTES {
            problems.push(format!("+{offset:06x}: {extra} stray instruction bytes"));
        }
    }
    if offset > len {
        problems.push(format!("walk overran file: {offset} > {len}"));
    }

    if let Some(offset) = anattribs.iter().position(|a| a.is_untyped()) {
        problems.push(format!("+{offset:06x}: byte not classified"));
    }

    for (offset, dfd) in operand_formats {
        if matches!(dfd.format_type, FormatType::Default | FormatType::Remove) {
            problems.push(format!("+{offset:06x}: placeholder operand format {dfd}"));
        }
    }
    problems
}

/// Report address regions that cross a 64K bank boundary.
pub fn validate_address_map(addr_map: &AddressMap, messages: &mut MessageList) {
    for (region, bad_offset) in addr_map.bank_overruns() {
        messages.add(MessageEntry::new(
            Severity::Error,
            region.offset,
            MessageKind::BankOverrun,
            format!("+{bad_offset:06x}"),
            Resolution::None,
        ));
    }
}
