//! Local variable tables and the scoped lookup over them.
//!
//! A table defines variables (direct-page addresses or stack-relative
//! constants) that are visible from its offset until a later table replaces
//! or clears them. Tables at offsets that aren't the start of an item are
//! hidden and ignored.

use crate::core::def_symbol::DefSymbol;
use crate::core::symbol::SymbolType;
use crate::core::weak_ref::WeakSymbolRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariableTable {
    /// Sorted by label
    variables: Vec<DefSymbol>,
    /// Discard everything defined by earlier tables
    pub clear_previous: bool,
}

impl LocalVariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn clear(&mut self) {
        self.variables.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DefSymbol> + '_ {
        self.variables.iter()
    }

    /// Add a variable, first dropping any entry with the same label or an
    /// overlapping range of the same type.
    pub fn add_or_replace(&mut self, var: DefSymbol) {
        self.variables.retain(|old| {
            old.label() != var.label()
                && !old.check_overlap(var.value(), var.width(), var.symbol.symbol_type)
        });
        let idx = self
            .variables
            .partition_point(|v| v.label() < var.label());
        self.variables.insert(idx, var);
    }

    pub fn get_by_label(&self, label: &str) -> Option<&DefSymbol> {
        self.variables
            .binary_search_by(|v| v.label().cmp(label))
            .ok()
            .map(|idx| &self.variables[idx])
    }

    /// First variable of `symbol_type` whose range overlaps `[value, value + width)`.
    pub fn get_by_value_range(
        &self,
        value: i32,
        width: usize,
        symbol_type: SymbolType,
    ) -> Option<&DefSymbol> {
        self.variables
            .iter()
            .find(|v| v.check_overlap(value, width, symbol_type))
    }
}

/// Walks the tables in offset order, maintaining the set of variables in
/// scope. Queries are cheapest when made with ascending offsets; going
/// backward restarts the walk.
pub struct LocalVariableLookup<'a> {
    tables: &'a BTreeMap<usize, LocalVariableTable>,
    /// Offsets of tables that aren't at an item start
    hidden: BTreeSet<usize>,
    /// Labels of every non-variable symbol
    non_variable_labels: HashSet<String>,
    current: LocalVariableTable,
    dup_remap: HashMap<String, String>,
    recent_offset: Option<usize>,
    recent_symbols: Vec<DefSymbol>,
    /// Next table to merge, by offset
    next_offset: Option<usize>,
}

impl<'a> LocalVariableLookup<'a> {
    pub fn new(
        tables: &'a BTreeMap<usize, LocalVariableTable>,
        hidden: BTreeSet<usize>,
        non_variable_labels: HashSet<String>,
    ) -> Self {
        let mut lookup = Self {
            tables,
            hidden,
            non_variable_labels,
            current: LocalVariableTable::new(),
            dup_remap: HashMap::new(),
            recent_offset: None,
            recent_symbols: Vec::new(),
            next_offset: None,
        };
        lookup.reset();
        lookup
    }

    pub fn reset(&mut self) {
        self.current.clear();
        self.dup_remap.clear();
        self.recent_offset = None;
        self.recent_symbols.clear();
        self.next_offset = self.tables.keys().next().copied();
    }

    /// Variables defined by the table at exactly `offset`, after
    /// de-duplication. Empty if there's no visible table there.
    pub fn get_variables_defined_at_offset(&mut self, offset: usize) -> &[DefSymbol] {
        self.advance_to_offset(offset);
        if self.recent_offset == Some(offset) {
            &self.recent_symbols
        } else {
            &[]
        }
    }

    /// Variable in scope at `offset` covering `value`.
    pub fn get_symbol(
        &mut self,
        offset: usize,
        value: i32,
        symbol_type: SymbolType,
    ) -> Option<&DefSymbol> {
        self.advance_to_offset(offset);
        self.current.get_by_value_range(value, 1, symbol_type)
    }

    /// Variable in scope at `offset` named by `wref`. Renamed duplicates are
    /// found through their original label.
    pub fn get_symbol_by_ref(&mut self, offset: usize, wref: &WeakSymbolRef) -> Option<&DefSymbol> {
        self.advance_to_offset(offset);
        let label = self
            .dup_remap
            .get(&wref.label)
            .map(String::as_str)
            .unwrap_or(&wref.label);
        self.current.get_by_label(label)
    }

    fn advance_to_offset(&mut self, target: usize) {
        if let Some(recent) = self.recent_offset {
            if target < recent {
                self.reset();
            }
        }
        let tables = self.tables;
        while let Some(next) = self.next_offset.filter(|&n| n <= target) {
            if self.hidden.contains(&next) {
                debug!(offset = next, "Ignoring hidden local variable table");
            } else if let Some(lvt) = tables.get(&next) {
                self.merge_table(next, lvt);
            }
            self.next_offset = tables
                .range(next + 1..)
                .next()
                .map(|(off, _)| *off);
        }
    }

    fn merge_table(&mut self, offset: usize, lvt: &LocalVariableTable) {
        if lvt.clear_previous {
            self.current.clear();
        }
        self.recent_offset = Some(offset);
        self.recent_symbols.clear();

        for var in lvt.iter() {
            let mut var = var.clone();
            if self.non_variable_labels.contains(var.label()) {
                debug!(label = var.label(), offset, "Duplicate non-variable label");
                let new_label = self.generate_dedup_label(var.label());
                self.dup_remap
                    .insert(var.label().to_string(), new_label.clone());
                var = var.renamed(&new_label);
            }
            self.current.add_or_replace(var.clone());
            self.recent_symbols.push(var);
        }
    }

    fn generate_dedup_label(&self, base: &str) -> String {
        let mut counter = 1;
        loop {
            let label = format!("{base}_DUP{counter}");
            if !self.non_variable_labels.contains(&label) {
                return label;
            }
            counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::def_symbol::DirectionFlags;
    use crate::core::format_descriptor::FormatSubType;
    use crate::core::symbol::SymbolSource;
    use crate::core::weak_ref::{LocalVariableType, Part};

    fn dp_var(label: &str, value: i32, width: usize) -> DefSymbol {
        DefSymbol::with_width(
            label,
            value,
            SymbolSource::Variable,
            SymbolType::ExternalAddr,
            FormatSubType::Hex,
            Some(width),
            "",
            DirectionFlags::READ_WRITE,
        )
    }

    fn table(vars: &[DefSymbol], clear: bool) -> LocalVariableTable {
        let mut lvt = LocalVariableTable::new();
        lvt.clear_previous = clear;
        for v in vars {
            lvt.add_or_replace(v.clone());
        }
        lvt
    }

    #[test]
    fn test_add_or_replace_drops_clashes() {
        let mut lvt = LocalVariableTable::new();
        lvt.add_or_replace(dp_var("PTR", 0x10, 2));
        lvt.add_or_replace(dp_var("TMP", 0x11, 1));
        assert_eq!(lvt.len(), 1);
        assert!(lvt.get_by_label("PTR").is_none());
        lvt.add_or_replace(dp_var("TMP", 0x20, 1));
        assert_eq!(lvt.get_by_label("TMP").unwrap().value(), 0x20);
    }

    #[test]
    fn test_scope_and_clear_previous() {
        let mut tables = BTreeMap::new();
        tables.insert(0, table(&[dp_var("PTR", 0x10, 2)], false));
        tables.insert(10, table(&[dp_var("CNT", 0x20, 1)], false));
        tables.insert(20, table(&[dp_var("IDX", 0x30, 1)], true));
        let mut lookup = LocalVariableLookup::new(&tables, BTreeSet::new(), HashSet::new());

        assert_eq!(
            lookup
                .get_symbol(5, 0x11, SymbolType::ExternalAddr)
                .unwrap()
                .label(),
            "PTR"
        );
        assert!(lookup.get_symbol(12, 0x11, SymbolType::ExternalAddr).is_some());
        assert!(lookup.get_symbol(25, 0x11, SymbolType::ExternalAddr).is_none());
        // backward query restarts the walk
        assert!(lookup.get_symbol(3, 0x20, SymbolType::ExternalAddr).is_none());
        assert_eq!(lookup.get_variables_defined_at_offset(10).len(), 1);
        assert!(lookup.get_variables_defined_at_offset(11).is_empty());
    }

    #[test]
    fn test_hidden_table_ignored() {
        let mut tables = BTreeMap::new();
        tables.insert(4, table(&[dp_var("PTR", 0x10, 2)], false));
        let hidden: BTreeSet<usize> = [4].into_iter().collect();
        let mut lookup = LocalVariableLookup::new(&tables, hidden, HashSet::new());
        assert!(lookup.get_symbol(8, 0x10, SymbolType::ExternalAddr).is_none());
    }

    #[test]
    fn test_dedup_against_non_variables() {
        let mut tables = BTreeMap::new();
        tables.insert(0, table(&[dp_var("FOO", 0x10, 1)], false));
        let labels: HashSet<String> = ["FOO".to_string(), "FOO_DUP1".to_string()]
            .into_iter()
            .collect();
        let mut lookup = LocalVariableLookup::new(&tables, BTreeSet::new(), labels);
        let vars = lookup.get_variables_defined_at_offset(0);
        assert_eq!(vars[0].label(), "FOO_DUP2");
        let wref = WeakSymbolRef::new_variable("FOO", Part::Low, LocalVariableType::DpAddr);
        assert_eq!(lookup.get_symbol_by_ref(2, &wref).unwrap().label(), "FOO_DUP2");
    }
}
