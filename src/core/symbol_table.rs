//! Unified label to symbol namespace.
//!
//! The table is keyed by label and also indexed by (value, source, label) so
//! lookups by address find the highest-precedence symbol first. Entries are
//! either plain symbols (user, auto and pre-labels) or definition symbols
//! (platform, project, local variables) that carry a width and direction.

use crate::core::anattrib::MemoryEffect;
use crate::core::def_symbol::{DefSymbol, DirectionFlags};
use crate::core::symbol::{Symbol, SymbolSource, SymbolType};
use crate::error::{DisasmError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Widest range a definition symbol can cover, minus one.
const MAX_SPAN: i32 = 65535;

/// Highest uniqueness suffix tried when generating labels.
const MAX_RENAME: usize = 999;

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolEntry {
    Label(Symbol),
    Def(DefSymbol),
}

impl SymbolEntry {
    pub fn symbol(&self) -> &Symbol {
        match self {
            SymbolEntry::Label(sym) => sym,
            SymbolEntry::Def(def) => &def.symbol,
        }
    }

    pub fn as_def(&self) -> Option<&DefSymbol> {
        match self {
            SymbolEntry::Def(def) => Some(def),
            SymbolEntry::Label(_) => None,
        }
    }

    fn width(&self) -> i32 {
        match self {
            SymbolEntry::Label(_) => 1,
            SymbolEntry::Def(def) => def.width() as i32,
        }
    }

    /// Does the entry's I/O direction allow this kind of access?
    fn matches_direction(&self, effect: MemoryEffect) -> bool {
        let SymbolEntry::Def(def) = self else {
            return true;
        };
        match effect {
            MemoryEffect::Read => def.direction.contains(DirectionFlags::READ),
            MemoryEffect::Write => def.direction.contains(DirectionFlags::WRITE),
            _ => true,
        }
    }
}

impl From<Symbol> for SymbolEntry {
    fn from(sym: Symbol) -> Self {
        SymbolEntry::Label(sym)
    }
}

impl From<DefSymbol> for SymbolEntry {
    fn from(def: DefSymbol) -> Self {
        SymbolEntry::Def(def)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    by_label: BTreeMap<String, SymbolEntry>,
    by_value: BTreeSet<(i32, SymbolSource, String)>,
    change_serial: u64,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremented on every mutation.
    pub fn change_serial(&self) -> u64 {
        self.change_serial
    }

    pub fn clear(&mut self) {
        self.by_label.clear();
        self.by_value.clear();
        self.change_serial += 1;
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    fn value_key(sym: &Symbol) -> (i32, SymbolSource, String) {
        (sym.value, sym.source, sym.label.clone())
    }

    /// Add a symbol whose label isn't in the table yet.
    pub fn add(&mut self, entry: impl Into<SymbolEntry>) {
        let entry = entry.into();
        debug_assert!(
            !self.by_label.contains_key(&entry.symbol().label),
            "duplicate label {}",
            entry.symbol().label
        );
        self.insert(entry);
    }

    /// Add or replace by label.
    pub fn insert(&mut self, entry: impl Into<SymbolEntry>) {
        let entry = entry.into();
        let label = entry.symbol().label.clone();
        if let Some(old) = self.by_label.remove(&label) {
            self.by_value.remove(&Self::value_key(old.symbol()));
        }
        self.by_value.insert(Self::value_key(entry.symbol()));
        self.by_label.insert(label, entry);
        self.change_serial += 1;
    }

    pub fn get(&self, label: &str) -> Option<&SymbolEntry> {
        self.by_label.get(label)
    }

    pub fn get_symbol(&self, label: &str) -> Option<&Symbol> {
        self.by_label.get(label).map(|e| e.symbol())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.by_label.contains_key(label)
    }

    pub fn remove(&mut self, label: &str) -> Option<SymbolEntry> {
        let old = self.by_label.remove(label)?;
        self.by_value.remove(&Self::value_key(old.symbol()));
        self.change_serial += 1;
        Some(old)
    }

    /// Entries in label order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> + '_ {
        self.by_label.values()
    }

    /// First non-constant symbol with exactly this value, by precedence.
    pub fn find_address_by_value(&self, value: i32) -> Option<&Symbol> {
        self.by_value
            .range((value, SymbolSource::User, String::new())..)
            .take_while(|(v, _, _)| *v == value)
            .filter_map(|(_, _, label)| self.get_symbol(label))
            .find(|sym| !sym.is_constant())
    }

    /// Best non-variable address symbol whose range covers `addr` and whose
    /// direction allows `effect`. Ties go to precedence, then the closest
    /// start, then label order.
    pub fn find_non_variable_by_address(
        &self,
        addr: i32,
        effect: MemoryEffect,
    ) -> Option<&Symbol> {
        self.find_covering(addr, effect, |_| true)
    }

    /// Like `find_non_variable_by_address`, restricted to project, platform
    /// and address-region pre-label symbols.
    pub fn find_proj_plat_pre_by_address(
        &self,
        addr: i32,
        effect: MemoryEffect,
    ) -> Option<&Symbol> {
        self.find_covering(addr, effect, |src| {
            matches!(
                src,
                SymbolSource::Project | SymbolSource::Platform | SymbolSource::AddrPreLabel
            )
        })
    }

    fn find_covering(
        &self,
        addr: i32,
        effect: MemoryEffect,
        source_ok: impl Fn(SymbolSource) -> bool,
    ) -> Option<&Symbol> {
        let low = addr.saturating_sub(MAX_SPAN);
        let high = (addr, SymbolSource::Variable, String::from("\u{10ffff}"));
        let mut best: Option<(SymbolSource, i32, &str, &Symbol)> = None;

        for (value, source, label) in self.by_value.range((low, SymbolSource::User, String::new())..=high) {
            if !source_ok(*source) {
                continue;
            }
            let Some(entry) = self.by_label.get(label) else {
                continue;
            };
            let sym = entry.symbol();
            if sym.is_variable() || sym.symbol_type == SymbolType::Constant {
                continue;
            }
            if addr >= value + entry.width() {
                continue;
            }
            if !entry.matches_direction(effect) {
                continue;
            }
            let cand = (*source, addr - value, label.as_str(), sym);
            let better = match &best {
                None => true,
                Some((bs, bd, bl, _)) => (cand.0, cand.1, cand.2) < (*bs, *bd, *bl),
            };
            if better {
                best = Some(cand);
            }
        }
        best.map(|(_, _, _, sym)| sym)
    }

    /// Build an `Auto` label for `addr` that doesn't collide with anything in
    /// the table. Not added to the table.
    pub fn generate_unique_for_address(&self, addr: i32, prefix: &str) -> Result<Symbol> {
        let base = format!("{prefix}{addr:04X}");
        let mut label = base.clone();
        if self.contains(&label) {
            let free = (0..=MAX_RENAME)
                .map(|idx| format!("{base}_{idx}"))
                .find(|cand| !self.contains(cand));
            match free {
                Some(found) => label = found,
                None => {
                    return Err(DisasmError::Internal(
                        "Too many identical symbols".to_string(),
                    ))
                }
            }
        }
        Ok(Symbol::new(
            &label,
            addr,
            SymbolSource::Auto,
            SymbolType::LocalOrGlobalAddr,
        ))
    }
}
