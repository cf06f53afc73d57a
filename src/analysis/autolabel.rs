//! Annotated auto labels.
//!
//! Replaces plain `L1234` labels with ones that say how the location is
//! used, e.g. `S_1234` for a subroutine or `DW_1234` for data that is both
//! pointed to and written.

use crate::analysis::xrefs::refactor_label;
use crate::config::AutoLabelStyle;
use crate::core::anattrib::{Anattrib, MemoryEffect};
use crate::core::format_descriptor::FormatDescriptor;
use crate::core::symbol::{Symbol, SymbolSource};
use crate::core::symbol_table::SymbolTable;
use crate::core::xref::{XrefKind, XrefSet};
use crate::error::Result;
use bitflags::bitflags;
use std::collections::BTreeMap;
use tracing::{error, trace};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct RefTypes: u8 {
        const SUB_CALL = 1 << 0;
        const BRANCH = 1 << 1;
        const DATA_REF = 1 << 2;
        const WRITE = 1 << 3;
        const READ = 1 << 4;
    }
}

/// One tag character per `RefTypes` bit, lowest bit first.
const TAGS: [(RefTypes, char); 5] = [
    (RefTypes::SUB_CALL, 'S'),
    (RefTypes::BRANCH, 'B'),
    (RefTypes::DATA_REF, 'D'),
    (RefTypes::WRITE, 'W'),
    (RefTypes::READ, 'R'),
];

fn collect_ref_types(xset: &XrefSet) -> RefTypes {
    let mut types = RefTypes::empty();
    for xr in xset.iter() {
        types |= match xr.kind {
            XrefKind::SubCallOp => RefTypes::SUB_CALL,
            XrefKind::BranchOp => RefTypes::BRANCH,
            XrefKind::RefFromData => RefTypes::DATA_REF,
            XrefKind::MemAccessOp => match xr.access {
                MemoryEffect::Read => RefTypes::READ,
                MemoryEffect::Write => RefTypes::WRITE,
                MemoryEffect::ReadModifyWrite => RefTypes::READ | RefTypes::WRITE,
                MemoryEffect::None | MemoryEffect::Unknown => RefTypes::empty(),
            },
        };
    }
    types
}

/// Label prefix for `xset`, e.g. "S_" or "BDR_". `Annotated` keeps only the
/// highest-priority tag.
pub fn annotation_prefix(xset: &XrefSet, style: AutoLabelStyle) -> String {
    let types = collect_ref_types(xset);
    if types.is_empty() {
        return "X_".to_string();
    }
    let mut prefix = String::with_capacity(6);
    for (bit, tag) in TAGS {
        if types.contains(bit) {
            prefix.push(tag);
            if style == AutoLabelStyle::Annotated {
                break;
            }
        }
    }
    prefix.push('_');
    prefix
}

/// Build an annotated label for `addr`, unique within `table`.
pub fn generate_annotated_label(
    addr: i32,
    table: &SymbolTable,
    xset: &XrefSet,
    style: AutoLabelStyle,
) -> Result<Symbol> {
    table.generate_unique_for_address(addr, &annotation_prefix(xset, style))
}

/// Rewrite every referenced auto label in `anattribs` using `style`, then
/// refactor the references to follow the new names.
pub fn annotate_auto_labels(
    anattribs: &mut [Anattrib],
    table: &mut SymbolTable,
    operand_formats: &mut BTreeMap<usize, FormatDescriptor>,
    xrefs: &BTreeMap<usize, XrefSet>,
    style: AutoLabelStyle,
) {
    if style == AutoLabelStyle::Simple {
        return;
    }
    for offset in 0..anattribs.len() {
        let Some(old) = anattribs[offset]
            .symbol
            .as_ref()
            .filter(|s| s.source == SymbolSource::Auto)
            .cloned()
        else {
            continue;
        };
        let Some(xset) = xrefs.get(&offset) else {
            continue;
        };
        let new = match generate_annotated_label(old.value, table, xset, style) {
            Ok(sym) => sym,
            Err(err) => {
                error!(offset, label = %old.label, error = %err, "Unable to annotate auto label");
                continue;
            }
        };
        if new == old {
            continue;
        }
        trace!(offset, old = %old.label, new = %new.label, "Annotating auto label");
        anattribs[offset].symbol = Some(new.clone());
        table.remove(&old.label);
        table.add(new);
        refactor_label(anattribs, operand_formats, xrefs, offset, &old.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::anattrib::AccessFlags;
    use crate::core::format_descriptor::symbol_descriptor;
    use crate::core::symbol::SymbolType;
    use crate::core::xref::Xref;

    fn xset(refs: &[(XrefKind, MemoryEffect)]) -> XrefSet {
        let mut set = XrefSet::new();
        for (i, &(kind, access)) in refs.iter().enumerate() {
            set.add(Xref::new(i, true, kind, access, AccessFlags::empty(), 0));
        }
        set
    }

    #[test]
    fn test_prefixes() {
        let set = xset(&[
            (XrefKind::MemAccessOp, MemoryEffect::ReadModifyWrite),
            (XrefKind::BranchOp, MemoryEffect::Unknown),
        ]);
        assert_eq!(annotation_prefix(&set, AutoLabelStyle::Annotated), "B_");
        assert_eq!(annotation_prefix(&set, AutoLabelStyle::FullyAnnotated), "BWR_");
        let set = xset(&[(XrefKind::RefFromData, MemoryEffect::Unknown)]);
        assert_eq!(annotation_prefix(&set, AutoLabelStyle::FullyAnnotated), "D_");
    }

    #[test]
    fn test_annotate_and_refactor() {
        let mut attrs = vec![Anattrib::default(); 4];
        attrs[0].set_instruction_start(true);
        attrs[0].set_length(3);
        attrs[0].data_descriptor = Some(symbol_descriptor(3, "L1003"));
        let auto = Symbol::new("L1003", 0x1003, SymbolSource::Auto, SymbolType::LocalOrGlobalAddr);
        attrs[3].symbol = Some(auto.clone());
        let mut table = SymbolTable::new();
        table.add(auto);
        table.add(Symbol::new("S_1003", 0x2000, SymbolSource::User, SymbolType::LocalOrGlobalAddr));
        let mut xrefs = BTreeMap::new();
        xrefs.insert(3, xset(&[(XrefKind::SubCallOp, MemoryEffect::Unknown)]));
        let mut formats = BTreeMap::new();

        annotate_auto_labels(&mut attrs, &mut table, &mut formats, &xrefs, AutoLabelStyle::Annotated);
        assert_eq!(attrs[3].symbol.as_ref().unwrap().label, "S_1003_0");
        assert!(!table.contains("L1003"));
        assert!(table.contains("S_1003_0"));
        let wref = attrs[0].data_descriptor.as_ref().unwrap().symbol_ref.as_ref().unwrap();
        assert_eq!(wref.label, "S_1003_0");
    }

    #[test]
    fn test_simple_style_untouched() {
        let mut attrs = vec![Anattrib::default(); 1];
        let auto = Symbol::new("L1000", 0x1000, SymbolSource::Auto, SymbolType::LocalOrGlobalAddr);
        attrs[0].symbol = Some(auto);
        let mut xrefs = BTreeMap::new();
        xrefs.insert(0, xset(&[(XrefKind::SubCallOp, MemoryEffect::Unknown)]));
        annotate_auto_labels(&mut attrs, &mut SymbolTable::new(), &mut BTreeMap::new(), &xrefs, AutoLabelStyle::Simple);
        assert_eq!(attrs[0].symbol.as_ref().unwrap().label, "L1000");
    }
}
