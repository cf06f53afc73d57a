//! Builds the symbol table from its sources.
//!
//! Sources are merged lowest precedence first, each overwriting what came
//! before on a label collision: platform files in load order, then project
//! symbols, then address-region pre-labels, then user labels.

use crate::core::address_map::AddressMap;
use crate::core::def_symbol::DefSymbol;
use crate::core::symbol::{Symbol, SymbolSource, SymbolType};
use crate::core::symbol_table::SymbolTable;
use crate::external::platform_symbols::{PlatformEntry, PlatformSymbolList};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Platform symbols in file order, then project symbols.
pub fn merge_platform_project_symbols(
    table: &mut SymbolTable,
    platform_lists: &[PlatformSymbolList],
    project_symbols: &BTreeMap<String, DefSymbol>,
) {
    for list in platform_lists {
        for entry in list.iter() {
            match entry {
                PlatformEntry::Define(def) => table.insert(def.clone()),
                PlatformEntry::Erase(label) => {
                    let erasable = table
                        .get_symbol(label)
                        .is_some_and(|sym| sym.source == SymbolSource::Platform);
                    if erasable {
                        debug!(label = %label, file = %list.file_ident, "Erasing platform symbol");
                        table.remove(label);
                    }
                }
            }
        }
    }
    for def in project_symbols.values() {
        table.insert(def.clone());
    }
}

/// Region pre-labels name the region's load address.
pub fn merge_address_pre_labels(table: &mut SymbolTable, addr_map: &AddressMap) {
    for region in addr_map.regions() {
        if !region.has_valid_pre_label() {
            continue;
        }
        let Some(address) = region.address else {
            continue;
        };
        if table
            .get_symbol(&region.pre_label)
            .is_some_and(|sym| sym.source == SymbolSource::AddrPreLabel)
        {
            warn!(offset = region.offset, label = %region.pre_label, "Duplicate pre-label ignored");
            continue;
        }
        table.insert(Symbol::new(
            &region.pre_label,
            address,
            SymbolSource::AddrPreLabel,
            SymbolType::ExternalAddr,
        ));
    }
}

/// Resynchronize user label values with the address map, then merge them.
/// Returns the number of labels whose value was corrected.
pub fn update_and_merge_user_labels(
    table: &mut SymbolTable,
    user_labels: &mut BTreeMap<usize, Symbol>,
    addr_map: &AddressMap,
) -> usize {
    let mut fixed = 0;
    for (&offset, sym) in user_labels.iter_mut() {
        if let Some(address) = addr_map.offset_to_address(offset) {
            if address != sym.value {
                info!(
                    offset,
                    label = %sym.label,
                    old = sym.value,
                    new = address,
                    "Fixing stale user label value"
                );
                *sym = sym.with_value(address);
                fixed += 1;
            }
        }
        table.insert(sym.clone());
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address_map::AddressMapEntry;
    use crate::core::format_descriptor::FormatSubType;

    fn def(label: &str, value: i32, source: SymbolSource) -> DefSymbol {
        DefSymbol::new(label, value, source, SymbolType::ExternalAddr, FormatSubType::Hex)
    }

    fn plat_list(ident: &str, entries: Vec<PlatformEntry>) -> PlatformSymbolList {
        let mut list = PlatformSymbolList::new(ident, 0);
        for e in entries {
            list.push(e);
        }
        list
    }

    #[test]
    fn test_priority_user_over_project_over_platform() {
        let mut table = SymbolTable::new();
        let lists = vec![
            plat_list(
                "a.sym65",
                vec![
                    PlatformEntry::Define(def("COUT", 0xfded, SymbolSource::Platform)),
                    PlatformEntry::Define(def("HOME", 0xfc58, SymbolSource::Platform)),
                    PlatformEntry::Define(def("BELL", 0xff3a, SymbolSource::Platform)),
                ],
            ),
            plat_list(
                "b.sym65",
                vec![PlatformEntry::Define(def("BELL", 0xfbdd, SymbolSource::Platform))],
            ),
        ];
        let mut project = BTreeMap::new();
        project.insert("HOME".to_string(), def("HOME", 0x1234, SymbolSource::Project));
        project.insert("COUT".to_string(), def("COUT", 0x2000, SymbolSource::Project));
        merge_platform_project_symbols(&mut table, &lists, &project);

        let map = AddressMap::new(0x10, 0x1000);
        let mut users = BTreeMap::new();
        users.insert(
            4,
            Symbol::new("COUT", 0x1004, SymbolSource::User, SymbolType::GlobalAddr),
        );
        update_and_merge_user_labels(&mut table, &mut users, &map);

        assert_eq!(table.get_symbol("COUT").unwrap().source, SymbolSource::User);
        assert_eq!(table.get_symbol("HOME").unwrap().source, SymbolSource::Project);
        assert_eq!(table.get_symbol("HOME").unwrap().value, 0x1234);
        // later platform file wins
        assert_eq!(table.get_symbol("BELL").unwrap().value, 0xfbdd);
    }

    #[test]
    fn test_erase() {
        let mut table = SymbolTable::new();
        let lists = vec![
            plat_list(
                "a.sym65",
                vec![PlatformEntry::Define(def("KBD", 0xc000, SymbolSource::Platform))],
            ),
            plat_list("b.sym65", vec![PlatformEntry::Erase("KBD".to_string())]),
        ];
        merge_platform_project_symbols(&mut table, &lists, &BTreeMap::new());
        assert!(table.is_empty());
    }

    #[test]
    fn test_stale_user_label_fixed() {
        let mut table = SymbolTable::new();
        let map = AddressMap::new(0x10, 0x2000);
        let mut users = BTreeMap::new();
        users.insert(
            2,
            Symbol::new("START", 0x1002, SymbolSource::User, SymbolType::LocalOrGlobalAddr),
        );
        assert_eq!(update_and_merge_user_labels(&mut table, &mut users, &map), 1);
        assert_eq!(users[&2].value, 0x2002);
        assert_eq!(table.get_symbol("START").unwrap().value, 0x2002);
        assert_eq!(update_and_merge_user_labels(&mut table, &mut users, &map), 0);
    }

    #[test]
    fn test_pre_labels() {
        let mut table = SymbolTable::new();
        let mut map = AddressMap::new(0x20, 0x1000);
        map.add_entry(AddressMapEntry::new(0x10, Some(0x4000)).with_pre_label("RELOC"))
            .unwrap();
        map.add_entry(AddressMapEntry::new(0x18, None).with_pre_label("NOPE"))
            .unwrap();
        merge_address_pre_labels(&mut table, &map);
        let sym = table.get_symbol("RELOC").unwrap();
        assert_eq!(sym.value, 0x4000);
        assert_eq!(sym.source, SymbolSource::AddrPreLabel);
        assert!(!table.contains("NOPE"));
    }
}
