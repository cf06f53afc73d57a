//! The reanalysis pipeline and its collaborators.
//!
//! Code and data analysis are pluggable through the `CodeAnalyzer` and
//! `DataAnalyzer` traits; `tracer` and `data_fill` provide small reference
//! implementations. The remaining modules are the pipeline stages that run
//! after them, sequenced by `pipeline`.

pub mod apply;
pub mod autolabel;
pub mod data_fill;
pub mod pipeline;
pub mod platform_refs;
pub mod symbol_merge;
pub mod tracer;
pub mod validate;
pub mod variable_refs;
pub mod xrefs;

use crate::config::{AnalysisParams, CpuKind};
use crate::core::address_map::AddressMap;
use crate::core::anattrib::Anattrib;
use crate::core::range_set::TypedRangeSet;
use crate::core::status_flags::StatusFlags;
use crate::core::symbol_table::SymbolTable;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// User hint that steers the code analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnalyzerTag {
    #[default]
    None,
    /// Start tracing code here
    Code,
    /// Stop tracing when execution reaches this byte
    Stop,
    /// Bytes are data embedded in the instruction stream
    InlineData,
}

/// Everything the code analyzer may look at. All of it is read-only.
pub struct CodeAnalysisInput<'a> {
    pub data: &'a [u8],
    pub addr_map: &'a AddressMap,
    pub analyzer_tags: &'a TypedRangeSet<AnalyzerTag>,
    pub status_overrides: &'a BTreeMap<usize, StatusFlags>,
    pub entry_flags: StatusFlags,
    pub params: &'a AnalysisParams,
    pub symbols: &'a SymbolTable,
    pub cpu: CpuKind,
    pub two_byte_brk: bool,
}

/// Classifies instruction bytes.
///
/// Receives a zeroed attribute array and must fill in addresses, instruction
/// starts and lengths, status flags and operand targets. Implementations must
/// be deterministic: the pipeline caches the result and reuses it for
/// data-only reanalysis.
pub trait CodeAnalyzer {
    fn analyze(&mut self, input: &CodeAnalysisInput<'_>, anattribs: &mut [Anattrib]);
}

pub struct DataAnalysisInput<'a> {
    pub data: &'a [u8],
    pub addr_map: &'a AddressMap,
    pub params: &'a AnalysisParams,
}

/// Classifies everything the code analyzer didn't claim.
pub trait DataAnalyzer {
    /// Give operands that point into the file a label to refer to.
    fn analyze_data_targets(
        &mut self,
        input: &DataAnalysisInput<'_>,
        anattribs: &mut [Anattrib],
        symbols: &mut SymbolTable,
    ) -> Result<()>;

    /// Turn every remaining unclassified byte into data.
    fn analyze_uncategorized(&mut self, input: &DataAnalysisInput<'_>, anattribs: &mut [Anattrib]);
}

/// Code, data and junk byte tallies, computed during xref generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCounts {
    pub code: usize,
    pub data: usize,
    pub junk: usize,
}

impl ByteCounts {
    pub fn total(&self) -> usize {
        self.code + self.data + self.junk
    }
}
