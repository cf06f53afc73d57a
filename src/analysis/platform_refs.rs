//! Platform and project symbol references.
//!
//! Operands and address data items that point outside the file are matched
//! against the symbol table. A match replaces the item's descriptor with a
//! weak reference to the symbol.

use crate::core::address_map::AddressMap;
use crate::core::anattrib::{Anattrib, MemoryEffect, MiscFlags};
use crate::core::format_descriptor::{read_word, FormatDescriptor, FormatSubType};
use crate::core::symbol::{Symbol, SymbolSource};
use crate::core::symbol_table::SymbolTable;
use crate::core::weak_ref::{Part, WeakSymbolRef};
use std::collections::BTreeMap;
use tracing::trace;

/// Offsets tried around an address when nearby matching is on.
// Order matters: -1, then -2, then +1.
const NEARBY_DELTAS: [i32; 3] = [-1, -2, 1];

/// Find the symbol for `addr`, as referenced from `offset`.
///
/// The exact address is tried first. With `seek_nearby` set, addresses
/// above the zero page also try a byte or two below and one above, without
/// leaving the 64K bank.
pub fn find_symbol_near(
    table: &SymbolTable,
    addr_map: &AddressMap,
    offset: usize,
    addr: i32,
    effect: MemoryEffect,
    seek_nearby: bool,
) -> Option<Symbol> {
    if let Some(sym) = find_external(table, addr_map, offset, addr, addr, effect) {
        return Some(sym);
    }
    if !seek_nearby || addr <= 0xff {
        return None;
    }
    NEARBY_DELTAS.iter().find_map(|delta| {
        let near = addr + delta;
        if near < 0 || (near >> 16) != (addr >> 16) {
            return None;
        }
        find_external(table, addr_map, offset, near, addr, effect)
    })
}

/// Look up `addr`. An internal label whose value doesn't map into the file
/// from here can't be what the operand means; in that case fall back to a
/// project, platform or pre-label symbol at the operand's own address,
/// `orig_addr`.
fn find_external(
    table: &SymbolTable,
    addr_map: &AddressMap,
    offset: usize,
    addr: i32,
    orig_addr: i32,
    effect: MemoryEffect,
) -> Option<Symbol> {
    let sym = table.find_non_variable_by_address(addr, effect)?;
    let external = matches!(
        sym.source,
        SymbolSource::Project | SymbolSource::Platform | SymbolSource::AddrPreLabel
    );
    if !external && addr_map.address_to_offset(offset, sym.value).is_none() {
        return table
            .find_proj_plat_pre_by_address(orig_addr, effect)
            .cloned();
    }
    Some(sym.clone())
}

pub fn generate_platform_symbol_refs(
    anattribs: &mut [Anattrib],
    data: &[u8],
    addr_map: &AddressMap,
    table: &SymbolTable,
    misc_flags: &BTreeMap<usize, MiscFlags>,
    seek_nearby: bool,
) {
    let mut offset = 0;
    while offset < anattribs.len() {
        let attr = &anattribs[offset];
        let mut advance = 1;
        let mut found: Option<(Symbol, bool)> = None;

        if attr.is_instruction_start() {
            let disregard = misc_flags
                .get(&offset)
                .is_some_and(|f| f.contains(MiscFlags::DISREGARD_OPERAND_ADDRESS));
            if attr.data_descriptor.is_none() && attr.operand_offset.is_none() && !disregard {
                if let Some(addr) = attr.operand_address {
                    found = find_symbol_near(table, addr_map, offset, addr, attr.instr.effect, seek_nearby)
                        .map(|sym| (sym, false));
                }
            }
        } else if attr.is_data_start() || attr.is_inline_data_start() {
            advance = attr.length().max(1);
            if let Some(dfd) = &attr.data_descriptor {
                if dfd.is_numeric() && dfd.sub_type == FormatSubType::Address {
                    let addr = read_word(data, offset, dfd.length(), dfd.is_big_endian());
                    if addr_map.address_to_offset(offset, addr).is_none() {
                        found = find_symbol_near(
                            table,
                            addr_map,
                            offset,
                            addr,
                            MemoryEffect::ReadModifyWrite,
                            seek_nearby,
                        )
                        .map(|sym| (sym, dfd.is_big_endian()));
                    }
                }
            }
        }

        if let Some((sym, big_endian)) = found {
            trace!(offset, label = %sym.label, "Platform symbol reference");
            let len = anattribs[offset].length();
            anattribs[offset].data_descriptor = Some(FormatDescriptor::with_symbol(
                len,
                WeakSymbolRef::new(&sym.label, Part::Low),
                big_endian,
            ));
        }
        offset += advance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::def_symbol::DefSymbol;
    use crate::core::format_descriptor::FormatType;
    use crate::core::symbol::SymbolType;

    fn platform(label: &str, value: i32) -> DefSymbol {
        DefSymbol::new(label, value, SymbolSource::Platform, SymbolType::ExternalAddr, FormatSubType::Hex)
    }

    fn jsr(attrs: &mut [Anattrib], offset: usize, target: i32) {
        attrs[offset].set_instruction_start(true);
        attrs[offset].set_length(3);
        attrs[offset].operand_address = Some(target);
        attrs[offset + 1].set_instruction(true);
        attrs[offset + 2].set_instruction(true);
    }

    #[test]
    fn test_nearby_order() {
        let map = AddressMap::new(4, 0x1000);
        let mut table = SymbolTable::new();
        table.add(platform("ABOVE", 0xfdf0));
        table.add(platform("BELOW2", 0xfdee));
        let sym = find_symbol_near(&table, &map, 0, 0xfdef, MemoryEffect::Read, true);
        // -1 misses, -2 hits before +1
        assert_eq!(sym.unwrap().label, "BELOW2");
        assert!(find_symbol_near(&table, &map, 0, 0xfdef, MemoryEffect::Read, false).is_none());
        table.add(platform("ZP", 0x10));
        assert!(find_symbol_near(&table, &map, 0, 0x11, MemoryEffect::Read, true).is_none());
    }

    #[test]
    fn test_nearby_stays_in_bank() {
        let map = AddressMap::new(4, 0x1000);
        let mut table = SymbolTable::new();
        table.add(platform("NEXTBANK", 0x10000));
        assert!(find_symbol_near(&table, &map, 0, 0xffff, MemoryEffect::Read, true).is_none());
    }

    #[test]
    fn test_unmapped_label_falls_back_at_operand_address() {
        // file at $1000-$1003, operand points at $2000
        let map = AddressMap::new(4, 0x1000);
        let mut table = SymbolTable::new();
        table.add(Symbol::new("ELSEWHERE", 0x1fff, SymbolSource::User, SymbolType::LocalOrGlobalAddr));
        table.add(platform("PORT", 0x2000));
        table.add(platform("PORTM1", 0x1ffe));
        let sym = find_external(&table, &map, 0, 0x1fff, 0x2000, MemoryEffect::Read);
        assert_eq!(sym.unwrap().label, "PORT");
        let sym = find_external(&table, &map, 0, 0x1fff, 0x1fff, MemoryEffect::Read);
        assert!(sym.is_none());
    }

    #[test]
    fn test_operand_and_data_refs() {
        let data = [0x20, 0xed, 0xfd, 0xed, 0xfd, 0x00];
        let map = AddressMap::new(data.len(), 0x1000);
        let mut table = SymbolTable::new();
        table.add(platform("COUT", 0xfded));
        let mut attrs = vec![Anattrib::default(); data.len()];
        jsr(&mut attrs, 0, 0xfded);
        attrs[3].set_data(true);
        attrs[3].data_descriptor = Some(FormatDescriptor::new(2, FormatType::NumericLE, FormatSubType::Address));
        attrs[5].set_data(true);
        attrs[5].data_descriptor = Some(FormatDescriptor::new(1, FormatType::Default, FormatSubType::None));

        generate_platform_symbol_refs(&mut attrs, &data, &map, &table, &BTreeMap::new(), false);
        for off in [0, 3] {
            let dfd = attrs[off].data_descriptor.as_ref().unwrap();
            assert_eq!(dfd.symbol_ref.as_ref().unwrap().label, "COUT");
        }
        assert_eq!(attrs[0].data_descriptor.as_ref().unwrap().length(), 3);
        assert_eq!(attrs[3].data_descriptor.as_ref().unwrap().length(), 2);
    }

    #[test]
    fn test_disregard_operand_address() {
        let data = [0x20, 0xed, 0xfd];
        let map = AddressMap::new(data.len(), 0x1000);
        let mut table = SymbolTable::new();
        table.add(platform("COUT", 0xfded));
        let mut attrs = vec![Anattrib::default(); data.len()];
        jsr(&mut attrs, 0, 0xfded);
        let mut misc = BTreeMap::new();
        misc.insert(0, MiscFlags::DISREGARD_OPERAND_ADDRESS);
        generate_platform_symbol_refs(&mut attrs, &data, &map, &table, &misc, false);
        assert!(attrs[0].data_descriptor.is_none());
    }
}
