//! Symbol type for named values.
//!
//! A Symbol binds a label to a numeric value (an address or a constant). The
//! source records who defined it, which also sets precedence when several
//! symbols share a value: variants are declared highest priority first.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest label accepted by the label syntax check.
pub const MAX_LABEL_LEN: usize = 32;

static LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]+$").unwrap_or_else(|e| panic!("bad label regex: {e}"))
});

/// Where a symbol came from, in descending order of precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SymbolSource {
    /// User-defined label
    User,
    /// Label attached to an address region start
    AddrPreLabel,
    /// From the project configuration
    Project,
    /// From a platform definition file
    Platform,
    /// Generated by the analyzer
    Auto,
    /// Local variable
    Variable,
}

impl fmt::Display for SymbolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolSource::User => write!(f, "User"),
            SymbolSource::AddrPreLabel => write!(f, "AddrPreLabel"),
            SymbolSource::Project => write!(f, "Project"),
            SymbolSource::Platform => write!(f, "Platform"),
            SymbolSource::Auto => write!(f, "Auto"),
            SymbolSource::Variable => write!(f, "Variable"),
        }
    }
}

/// What kind of value the symbol represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolType {
    /// Local symbol, may be promoted to global
    LocalOrGlobalAddr,
    /// User wants this to be a global symbol
    GlobalAddr,
    /// Global symbol that is exported to linkers
    GlobalAddrExport,
    /// Address outside the program (platform file, local variable)
    ExternalAddr,
    /// Constant value
    Constant,
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolType::LocalOrGlobalAddr => write!(f, "LocalOrGlobalAddr"),
            SymbolType::GlobalAddr => write!(f, "GlobalAddr"),
            SymbolType::GlobalAddrExport => write!(f, "GlobalAddrExport"),
            SymbolType::ExternalAddr => write!(f, "ExternalAddr"),
            SymbolType::Constant => write!(f, "Constant"),
        }
    }
}

/// Immutable label/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub label: String,
    pub value: i32,
    pub source: SymbolSource,
    pub symbol_type: SymbolType,
}

impl Symbol {
    pub fn new(label: &str, value: i32, source: SymbolSource, symbol_type: SymbolType) -> Self {
        debug_assert!(!label.is_empty());
        Self {
            label: label.to_string(),
            value,
            source,
            symbol_type,
        }
    }

    /// Same symbol with a different value. Used when a user label's cached
    /// address goes stale.
    pub fn with_value(&self, value: i32) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    /// Internal labels are the ones attached to offsets in the file.
    pub fn is_internal_label(&self) -> bool {
        matches!(self.source, SymbolSource::User | SymbolSource::Auto)
    }

    pub fn is_variable(&self) -> bool {
        self.source == SymbolSource::Variable
    }

    pub fn is_constant(&self) -> bool {
        self.symbol_type == SymbolType::Constant
    }

    /// Two-character source/type code, e.g. "UL" for a user local label.
    pub fn source_type_string(&self) -> String {
        let src = match self.source {
            SymbolSource::User => 'U',
            SymbolSource::AddrPreLabel => 'A',
            SymbolSource::Project => 'R',
            SymbolSource::Platform => 'P',
            SymbolSource::Auto => 'A',
            SymbolSource::Variable => 'V',
        };
        let ty = match self.symbol_type {
            SymbolType::LocalOrGlobalAddr => 'L',
            SymbolType::GlobalAddr => 'G',
            SymbolType::GlobalAddrExport => 'X',
            SymbolType::ExternalAddr => 'E',
            SymbolType::Constant => 'C',
        };
        format!("{src}{ty}")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{{{},{},val=${:04x}}}",
            self.label, self.source, self.symbol_type, self.value
        )
    }
}

/// Check label syntax: a letter or underscore followed by at least one more
/// word character, no longer than `MAX_LABEL_LEN`.
pub fn is_valid_label(label: &str) -> bool {
    label.len() <= MAX_LABEL_LEN && LABEL_REGEX.is_match(label)
}
