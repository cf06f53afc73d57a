//! Project configuration.
//!
//! Provides the project properties consumed by the analysis pipeline, with
//! sensible defaults and JSON round-tripping for callers and tests.

use crate::core::def_symbol::DefSymbol;
use crate::core::status_flags::StatusFlags;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Target CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CpuKind {
    #[default]
    Mos6502,
    Mos65C02,
    W65C816,
}

/// How auto-generated labels are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutoLabelStyle {
    /// `L1234`
    #[default]
    Simple,
    /// Prefix with the most significant reference kind, e.g. `S_1234`
    Annotated,
    /// Prefix with every reference kind, e.g. `BW_1234`
    FullyAnnotated,
}

/// Analyzer tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Run the data heuristics over bytes code analysis didn't claim
    pub analyze_uncategorized_data: bool,
    /// Match operand targets against labels a few bytes away
    pub seek_nearby_targets: bool,
    /// Shortest run of characters treated as a string
    pub min_chars_for_string: usize,
    /// Track PHP/PLP pairs when propagating flags
    pub smart_plp: bool,
    /// Track PHK/PLB pairs when propagating the data bank
    pub smart_plb: bool,
    /// Use relocation data from the loader, if any
    pub use_reloc_data: bool,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            analyze_uncategorized_data: true,
            seek_nearby_targets: false,
            min_chars_for_string: 4,
            smart_plp: false,
            smart_plb: true,
            use_reloc_data: false,
        }
    }
}

/// Master configuration for a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectProperties {
    pub cpu: CpuKind,
    /// Decode undocumented opcodes
    pub include_undocumented: bool,
    /// BRK takes a signature byte
    pub two_byte_brk: bool,
    /// Processor status at entry points
    pub entry_flags: StatusFlags,
    pub auto_label_style: AutoLabelStyle,
    pub analysis: AnalysisParams,
    /// Platform symbol files, in load order
    pub platform_symbol_files: Vec<String>,
    pub extension_scripts: Vec<String>,
    /// Project symbols, by label
    pub project_symbols: BTreeMap<String, DefSymbol>,
}

impl ProjectProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Did the set of external files change between `self` and `other`?
    pub fn external_files_differ(&self, other: &ProjectProperties) -> bool {
        self.platform_symbol_files != other.platform_symbol_files
            || self.extension_scripts != other.extension_scripts
    }
}
