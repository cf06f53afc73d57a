//! Error types for the disassembly analysis core.
//!
//! Only internal-consistency faults and caller mistakes surface as errors.
//! Anomalies in user data are reported through the project message list and
//! external-file problems through a load report.

use thiserror::Error;

/// Main error type for analysis and change-management operations.
#[derive(Debug, Error)]
pub enum DisasmError {
    /// Offset (or offset + length) outside the file image
    #[error("Invalid offset +{offset:06x} (len={len})")]
    InvalidOffset { offset: usize, len: usize },

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistent state did not match what a change record expected
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// Undo requested with nothing on the stack
    #[error("Can't undo")]
    NothingToUndo,

    /// Redo requested with nothing ahead of the stack pointer
    #[error("Can't redo")]
    NothingToRedo,

    /// Symbol resolution errors
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DisasmError {
    fn from(err: serde_json::Error) -> Self {
        DisasmError::Serialization(err.to_string())
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, DisasmError>;
