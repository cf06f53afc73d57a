//! Change records, the undo stack, and the engine that applies them.
//!
//! Every edit to persistent project state is expressed as a change record
//! carrying both old and new values, so any change set can be reversed.

pub mod apply;
pub mod change_set;
pub mod merge;
pub mod undo_stack;
pub mod undoable;

pub use apply::{apply_changes, ApplyOutcome};
pub use change_set::ChangeSet;
pub use merge::generate_format_merge_set;
pub use undo_stack::UndoStack;
pub use undoable::{ChangeKind, ReanalysisScope, UndoableChange};
