//! Read-only views of derived state.

use crate::analysis::ByteCounts;
use crate::change::change_set::ChangeSet;
use crate::change::merge::generate_format_merge_set;
use crate::core::anattrib::Anattrib;
use crate::core::def_symbol::DefSymbol;
use crate::core::format_descriptor::FormatDescriptor;
use crate::core::messages::MessageList;
use crate::core::symbol::SymbolSource;
use crate::core::symbol_table::SymbolTable;
use crate::core::xref::XrefSet;
use crate::project::DisasmProject;
use std::collections::BTreeMap;

impl DisasmProject {
    pub fn anattribs(&self) -> &[Anattrib] {
        &self.derived.anattribs
    }

    pub fn anattrib(&self, offset: usize) -> Option<&Anattrib> {
        self.derived.anattribs.get(offset)
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.derived.symbols
    }

    /// References to the item at `offset`.
    pub fn get_xref_set(&self, offset: usize) -> Option<&XrefSet> {
        self.derived.xrefs.get(&offset)
    }

    /// References to a project, platform or local variable symbol.
    pub fn get_def_xref_set(&self, label: &str) -> Option<&XrefSet> {
        self.derived.def_xrefs.get(label)
    }

    /// Project and platform symbols with at least one reference, by value.
    pub fn active_def_symbols(&self) -> &[DefSymbol] {
        &self.derived.active_defs
    }

    pub fn messages(&self) -> &MessageList {
        &self.derived.messages
    }

    pub fn byte_counts(&self) -> ByteCounts {
        self.derived.byte_counts
    }

    /// Offset of the in-file label `name`. User and auto labels are found
    /// through the attribute array, region pre-labels through the address
    /// map. Symbols that live outside the file give `None`.
    pub fn find_label_offset_by_name(&self, name: &str) -> Option<usize> {
        let sym = self.derived.symbols.get_symbol(name)?;
        if !sym.is_internal_label() {
            if sym.source == SymbolSource::AddrPreLabel {
                return self
                    .addr_map
                    .entries()
                    .iter()
                    .find(|e| e.pre_label == name)
                    .map(|e| e.offset);
            }
            return None;
        }
        self.derived
            .anattribs
            .iter()
            .position(|a| a.symbol.as_ref().is_some_and(|s| s.label == name))
    }

    /// Changes that apply `new_list` on top of the current operand formats.
    pub fn generate_format_merge_set(
        &self,
        new_list: &BTreeMap<usize, FormatDescriptor>,
    ) -> ChangeSet {
        generate_format_merge_set(&self.tables.operand_formats, new_list)
    }
}
