//! Cross-reference generation and label refactoring.
//!
//! Two kinds of reference are recorded. A symbolic reference comes from an
//! operand or data item whose descriptor names a symbol; a numeric reference
//! comes from an instruction operand that resolves to a file offset. When a
//! symbolic reference lands exactly on the operand target the numeric one is
//! redundant and is skipped.

use crate::analysis::variable_refs::create_lookup;
use crate::analysis::ByteCounts;
use crate::core::address_map::AddressMap;
use crate::core::anattrib::{AccessFlags, Anattrib, FlowKind, MemoryEffect};
use crate::core::format_descriptor::{read_word, FormatDescriptor, FormatSubType, FormatType};
use crate::core::local_variables::LocalVariableTable;
use crate::core::messages::{MessageEntry, MessageKind, MessageList, Resolution, Severity};
use crate::core::symbol::{SymbolSource, SymbolType};
use crate::core::symbol_table::SymbolTable;
use crate::core::weak_ref::WeakSymbolRef;
use crate::core::xref::{Xref, XrefKind, XrefSet};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// Output of `generate_xrefs`.
#[derive(Debug, Clone, Default)]
pub struct XrefResult {
    /// References to file offsets
    pub xrefs: BTreeMap<usize, XrefSet>,
    /// References to project, platform and variable symbols, by label
    pub def_xrefs: BTreeMap<String, XrefSet>,
    pub byte_counts: ByteCounts,
}

impl XrefResult {
    fn add(&mut self, target: usize, xref: Xref) {
        self.xrefs.entry(target).or_default().add(xref);
    }

    fn add_def(&mut self, label: &str, xref: Xref) {
        self.def_xrefs.entry(label.to_string()).or_default().add(xref);
    }
}

/// Map every visible label to its offset. Labels on attributes come first;
/// region pre-labels map to the region's first byte. Duplicates are dropped.
pub fn create_label_to_offset_map(
    anattribs: &[Anattrib],
    addr_map: &AddressMap,
) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (offset, attr) in anattribs.iter().enumerate() {
        if let Some(sym) = &attr.symbol {
            if map.contains_key(&sym.label) {
                debug!(label = %sym.label, offset, "Xref ignoring duplicate label");
                continue;
            }
            map.insert(sym.label.clone(), offset);
        }
    }
    for region in addr_map.regions() {
        if !region.has_valid_pre_label() {
            continue;
        }
        if map.contains_key(&region.pre_label) {
            debug!(label = %region.pre_label, "Xref ignoring duplicate pre-label");
            continue;
        }
        map.insert(region.pre_label.clone(), region.offset);
    }
    map
}

fn reference_kind(attr: &Anattrib) -> (XrefKind, MemoryEffect, AccessFlags) {
    if attr.is_instruction() {
        let kind = match attr.instr.flow {
            FlowKind::SubCall => XrefKind::SubCallOp,
            FlowKind::Branch => XrefKind::BranchOp,
            FlowKind::None => XrefKind::MemAccessOp,
        };
        let effect = if kind == XrefKind::MemAccessOp {
            attr.instr.effect
        } else {
            MemoryEffect::Unknown
        };
        (kind, effect, attr.instr.access)
    } else {
        (XrefKind::RefFromData, MemoryEffect::Unknown, AccessFlags::empty())
    }
}

/// Build the cross-reference sets and byte counts from the final attributes.
pub fn generate_xrefs(
    anattribs: &[Anattrib],
    data: &[u8],
    addr_map: &AddressMap,
    lv_tables: &BTreeMap<usize, LocalVariableTable>,
    table: &SymbolTable,
    messages: &mut MessageList,
) -> XrefResult {
    let label_map = create_label_to_offset_map(anattribs, addr_map);
    let mut lookup = create_lookup(anattribs, lv_tables, table);
    let mut result = XrefResult::default();

    let mut offset = 0;
    while offset < anattribs.len() {
        let attr = &anattribs[offset];
        let (kind, effect, flags) = reference_kind(attr);

        if let Some(dfd) = &attr.data_descriptor {
            let mut has_zero_adj = false;
            let operand_offset = if attr.is_instruction_start() {
                attr.operand_offset
            } else {
                None
            };

            if let Some(wref) = dfd.symbol_ref.as_ref().filter(|_| dfd.sub_type == FormatSubType::Symbol) {
                if let Some(&sym_offset) = label_map.get(&wref.label) {
                    let target = &anattribs[sym_offset];
                    if target.is_non_addressable()
                        && target.symbol.as_ref().is_some_and(|s| s.label == wref.label)
                    {
                        messages.add(MessageEntry::new(
                            Severity::Error,
                            offset,
                            MessageKind::NonAddrLabelRef,
                            wref.label.as_str(),
                            Resolution::None,
                        ));
                    }
                    let adj = match operand_offset {
                        Some(op_off) => {
                            target.address.unwrap_or(0) - anattribs[op_off].address.unwrap_or(0)
                        }
                        None => 0,
                    };
                    result.add(sym_offset, Xref::new(offset, true, kind, effect, flags, adj));
                    has_zero_adj = adj == 0;
                } else if wref.is_variable() {
                    if let Some(var) = lookup.get_symbol_by_ref(offset, wref) {
                        let adj = var.value() - attr.operand_address.unwrap_or(0);
                        let label = var.label().to_string();
                        result.add_def(&label, Xref::new(offset, true, kind, effect, flags, adj));
                    }
                } else if let Some(sym) = table.get_symbol(&wref.label) {
                    if matches!(sym.source, SymbolSource::Project | SymbolSource::Platform) {
                        let adj = match attr.operand_address {
                            Some(op_addr) if sym.symbol_type != SymbolType::Constant => {
                                sym.value - op_addr
                            }
                            _ => 0,
                        };
                        result.add_def(&sym.label, Xref::new(offset, true, kind, effect, flags, adj));
                    } else {
                        trace!(offset, label = %sym.label, "Not cross-referencing symbol");
                    }
                } else {
                    messages.add(MessageEntry::new(
                        Severity::Info,
                        offset,
                        MessageKind::UnresolvedWeakRef,
                        wref.label.as_str(),
                        Resolution::FormatDescriptorIgnored,
                    ));
                }
            } else if dfd.sub_type == FormatSubType::Address
                && (attr.is_data() || attr.is_inline_data())
            {
                let addr = read_word(data, offset, dfd.length(), dfd.is_big_endian());
                if let Some(target) = addr_map.address_to_offset(offset, addr) {
                    result.add(target, Xref::new(offset, false, kind, effect, flags, 0));
                }
            }

            if !has_zero_adj && attr.is_instruction_start() {
                if let Some(op_off) = attr.operand_offset {
                    result.add(op_off, Xref::new(offset, false, kind, effect, flags, 0));
                }
            }
        } else if attr.is_instruction_start() {
            if let Some(op_off) = attr.operand_offset {
                result.add(op_off, Xref::new(offset, false, kind, effect, flags, 0));
            }
        }

        if attr.is_data_start() || attr.is_inline_data_start() {
            let len = attr.length().max(1);
            let junk = attr
                .data_descriptor
                .as_ref()
                .is_some_and(|d| matches!(d.format_type, FormatType::Uninit | FormatType::Junk));
            if junk {
                result.byte_counts.junk += len;
            } else {
                result.byte_counts.data += len;
            }
            offset += len;
        } else {
            // Step one byte so instructions embedded in operands are seen.
            result.byte_counts.code += 1;
            offset += 1;
        }
    }
    result
}

/// After the label at `label_offset` was renamed from `old_label`, point the
/// descriptors of everything that referenced it at the new name. Both the
/// attribute array and the user's operand formats are updated.
///
/// Returns true if some reference already named the new label, meaning a
/// previously broken reference has been repaired.
pub fn refactor_label(
    anattribs: &mut [Anattrib],
    operand_formats: &mut BTreeMap<usize, FormatDescriptor>,
    xrefs: &BTreeMap<usize, XrefSet>,
    label_offset: usize,
    old_label: &str,
) -> bool {
    let Some(xset) = xrefs.get(&label_offset) else {
        debug!(label = old_label, "No references to refactor");
        return false;
    };
    let Some(new_label) = anattribs
        .get(label_offset)
        .and_then(|a| a.symbol.as_ref())
        .map(|s| s.label.clone())
    else {
        return false;
    };

    let relabel = |dfd: &FormatDescriptor| -> Option<FormatDescriptor> {
        let wref = dfd.symbol_ref.as_ref()?;
        (wref.label == old_label).then(|| {
            FormatDescriptor::with_symbol(
                dfd.length(),
                WeakSymbolRef::new(&new_label, wref.part),
                dfd.is_big_endian(),
            )
        })
    };

    let mut found_existing = false;
    for xr in xset.iter() {
        let Some(dfd) = anattribs[xr.offset].data_descriptor.as_ref() else {
            continue;
        };
        if !dfd.has_symbol() {
            continue;
        }
        if dfd.symbol_ref.as_ref().is_some_and(|w| w.label == new_label) {
            found_existing = true;
        }
        if let Some(updated) = relabel(dfd) {
            anattribs[xr.offset].data_descriptor = Some(updated);
        }
    }

    for xr in xset.iter() {
        let Some(dfd) = operand_formats.get(&xr.offset) else {
            continue;
        };
        if !dfd.has_symbol() {
            continue;
        }
        if let Some(updated) = relabel(dfd) {
            debug!(offset = xr.offset, label = %new_label, "Replacing operand format symbol");
            operand_formats.insert(xr.offset, updated);
        }
    }
    found_existing
}
