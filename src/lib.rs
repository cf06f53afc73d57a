//! Analysis core for an interactive 6502/65816 disassembler.
//!
//! A [`project::DisasmProject`] owns the file image and everything the user
//! has said about it (labels, operand formats, comments, address regions).
//! Edits are applied as reversible change sets, and after each edit the
//! reanalysis pipeline rebuilds the per-offset attribute array, the symbol
//! table and the cross-references at the cheapest scope the edit allows.

/// Error types
pub mod error;

/// Tracing setup and helper macros
pub mod logging;

/// Project properties
pub mod config;

/// Core data types module
pub mod core;

/// Reanalysis pipeline and collaborator traits
pub mod analysis;

/// Change records, undo and the apply engine
pub mod change;

/// Platform symbol files and extension scripts
pub mod external;

/// Project state owner
pub mod project;

pub use error::{DisasmError, Result};
pub use project::DisasmProject;
