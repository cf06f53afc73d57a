//! Local variable references.
//!
//! Walks the file in offset order with a `LocalVariableLookup`, adding every
//! visible variable to the symbol table and pointing unformatted direct-page
//! and stack-relative operands at the variable they touch.

use crate::core::anattrib::{Anattrib, OperandMode};
use crate::core::format_descriptor::FormatDescriptor;
use crate::core::local_variables::{LocalVariableLookup, LocalVariableTable};
use crate::core::messages::{MessageEntry, MessageKind, MessageList, Resolution, Severity};
use crate::core::symbol::SymbolType;
use crate::core::symbol_table::SymbolTable;
use crate::core::weak_ref::{LocalVariableType, Part, WeakSymbolRef};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Offsets of tables that don't sit on the start of an item.
pub fn hidden_table_offsets(
    anattribs: &[Anattrib],
    lv_tables: &BTreeMap<usize, LocalVariableTable>,
) -> BTreeSet<usize> {
    lv_tables
        .keys()
        .copied()
        .filter(|&off| anattribs.get(off).map_or(true, |a| !a.is_start()))
        .collect()
}

/// Build a lookup over `lv_tables`. Variables whose labels collide with a
/// non-variable symbol in `table` get renamed by the lookup.
pub fn create_lookup<'a>(
    anattribs: &[Anattrib],
    lv_tables: &'a BTreeMap<usize, LocalVariableTable>,
    table: &SymbolTable,
) -> LocalVariableLookup<'a> {
    let non_variable_labels: HashSet<String> = table
        .iter()
        .map(|e| e.symbol())
        .filter(|s| !s.is_variable())
        .map(|s| s.label.clone())
        .collect();
    LocalVariableLookup::new(
        lv_tables,
        hidden_table_offsets(anattribs, lv_tables),
        non_variable_labels,
    )
}

pub fn generate_variable_refs(
    anattribs: &mut [Anattrib],
    data: &[u8],
    lv_tables: &BTreeMap<usize, LocalVariableTable>,
    table: &mut SymbolTable,
    messages: &mut MessageList,
) {
    for offset in hidden_table_offsets(anattribs, lv_tables) {
        warn!(offset, "Local variable table is hidden");
        messages.add(MessageEntry::new(
            Severity::Warning,
            offset,
            MessageKind::HiddenLocalVariableTable,
            "",
            Resolution::LocalVariableTableIgnored,
        ));
    }

    let mut lookup = create_lookup(anattribs, lv_tables, table);
    let mut offset = 0;
    while offset < anattribs.len() {
        let defined = lookup.get_variables_defined_at_offset(offset).to_vec();
        for var in defined {
            if table.contains(var.label()) {
                debug!(offset, label = var.label(), "Variable label already in table");
                continue;
            }
            table.add(var);
        }

        let attr = &anattribs[offset];
        if attr.is_instruction_start() && attr.data_descriptor.is_none() {
            let operand = data.get(offset + 1).map(|&b| b as i32);
            let found = match (attr.instr.mode, operand) {
                (OperandMode::DirectPage, Some(value)) => lookup
                    .get_symbol(offset, value, SymbolType::ExternalAddr)
                    .map(|v| (v.label().to_string(), LocalVariableType::DpAddr)),
                (OperandMode::StackRelative, Some(value)) => lookup
                    .get_symbol(offset, value, SymbolType::Constant)
                    .map(|v| (v.label().to_string(), LocalVariableType::StackRelConst)),
                _ => None,
            };
            if let Some((label, var_type)) = found {
                let len = anattribs[offset].length();
                anattribs[offset].data_descriptor = Some(FormatDescriptor::with_symbol(
                    len,
                    WeakSymbolRef::new_variable(&label, Part::Low, var_type),
                    false,
                ));
            }
        }

        let attr = &anattribs[offset];
        if attr.is_data_start() || attr.is_inline_data_start() {
            offset += attr.length().max(1);
        } else {
            offset += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::def_symbol::{DefSymbol, DirectionFlags};
    use crate::core::format_descriptor::FormatSubType;
    use crate::core::symbol::{Symbol, SymbolSource};

    fn var(label: &str, value: i32, ty: SymbolType) -> DefSymbol {
        DefSymbol::with_width(
            label,
            value,
            SymbolSource::Variable,
            ty,
            FormatSubType::Hex,
            Some(1),
            "",
            DirectionFlags::READ_WRITE,
        )
    }

    fn instr(attrs: &mut [Anattrib], offset: usize, len: usize, mode: OperandMode) {
        attrs[offset].set_instruction_start(true);
        attrs[offset].set_length(len);
        attrs[offset].instr.mode = mode;
        for a in &mut attrs[offset + 1..offset + len] {
            a.set_instruction(true);
        }
    }

    #[test]
    fn test_dp_and_stack_relative_refs() {
        // LDA $10 ; LDA $03,S ; RTS
        let data = [0xa5, 0x10, 0xa3, 0x03, 0x60];
        let mut attrs = vec![Anattrib::default(); data.len()];
        instr(&mut attrs, 0, 2, OperandMode::DirectPage);
        instr(&mut attrs, 2, 2, OperandMode::StackRelative);
        instr(&mut attrs, 4, 1, OperandMode::Other);

        let mut lvt = LocalVariableTable::new();
        lvt.add_or_replace(var("PTR", 0x10, SymbolType::ExternalAddr));
        lvt.add_or_replace(var("ARG", 0x03, SymbolType::Constant));
        let mut tables = BTreeMap::new();
        tables.insert(0, lvt);

        let mut table = SymbolTable::new();
        let mut messages = MessageList::new();
        generate_variable_refs(&mut attrs, &data, &tables, &mut table, &mut messages);

        assert!(table.contains("PTR") && table.contains("ARG"));
        let wref = attrs[0].data_descriptor.as_ref().unwrap().symbol_ref.clone().unwrap();
        assert_eq!(wref.label, "PTR");
        assert_eq!(wref.var_type, LocalVariableType::DpAddr);
        let wref = attrs[2].data_descriptor.as_ref().unwrap().symbol_ref.clone().unwrap();
        assert_eq!(wref.var_type, LocalVariableType::StackRelConst);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_hidden_table_and_dup_label() {
        let data = [0xa5, 0x10, 0x60];
        let mut attrs = vec![Anattrib::default(); data.len()];
        instr(&mut attrs, 0, 2, OperandMode::DirectPage);
        instr(&mut attrs, 2, 1, OperandMode::Other);

        let mut first = LocalVariableTable::new();
        first.add_or_replace(var("COUT", 0x10, SymbolType::ExternalAddr));
        let mut hidden = LocalVariableTable::new();
        hidden.add_or_replace(var("TMP", 0x20, SymbolType::ExternalAddr));
        let mut tables = BTreeMap::new();
        tables.insert(0, first);
        tables.insert(1, hidden);

        let mut table = SymbolTable::new();
        table.add(Symbol::new(
            "COUT",
            0xfded,
            SymbolSource::User,
            SymbolType::LocalOrGlobalAddr,
        ));
        let mut messages = MessageList::new();
        generate_variable_refs(&mut attrs, &data, &tables, &mut table, &mut messages);

        assert_eq!(messages.count_of(MessageKind::HiddenLocalVariableTable), 1);
        assert!(!table.contains("TMP"));
        assert!(table.contains("COUT_DUP1"));
        let wref = attrs[0].data_descriptor.as_ref().unwrap().symbol_ref.clone().unwrap();
        assert_eq!(wref.label, "COUT_DUP1");
    }
}
