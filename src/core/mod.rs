//! Core data types for the disassembly analysis core.
//!
//! This module holds the data model shared by the pipeline and the change
//! engine: the address map, the per-offset attribute array, symbols and the
//! symbol table, format descriptors, cross-references and diagnostics.

pub mod address_map;
pub mod anattrib;
pub mod comment;
pub mod def_symbol;
pub mod file_image;
pub mod format_descriptor;
pub mod local_variables;
pub mod messages;
pub mod range_set;
pub mod report;
pub mod status_flags;
pub mod symbol;
pub mod symbol_table;
pub mod weak_ref;
pub mod xref;
