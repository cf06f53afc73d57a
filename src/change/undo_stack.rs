//! Undo/redo history.
//!
//! Change sets live in one list with a pointer: everything below `top` has
//! been applied, everything at or above it can be redone.

use crate::change::change_set::ChangeSet;
use crate::error::{DisasmError, Result};
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct UndoStack {
    list: Vec<ChangeSet>,
    top: usize,
    /// Value of `top` when the project was last saved, `None` if that state
    /// can no longer be reached
    save_index: Option<usize>,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoStack {
    pub fn new() -> Self {
        Self {
            list: Vec::new(),
            top: 0,
            save_index: Some(0),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.top > 0
    }

    pub fn can_redo(&self) -> bool {
        self.top < self.list.len()
    }

    /// True when the applied changes differ from the last save point.
    pub fn is_dirty(&self) -> bool {
        self.save_index != Some(self.top)
    }

    /// Mark the current position as saved.
    pub fn reset_dirty_flag(&mut self) {
        self.save_index = Some(self.top);
    }

    /// Most recently applied set.
    pub fn top_change(&self) -> Option<&ChangeSet> {
        self.top.checked_sub(1).and_then(|i| self.list.get(i))
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Record an applied change set. Discards anything that could have been
    /// redone.
    pub fn push(&mut self, cs: ChangeSet) {
        self.list.truncate(self.top);
        if self.save_index.is_some_and(|s| s > self.top) {
            self.save_index = None;
        }
        self.list.push(cs);
        self.top += 1;
    }

    /// Step back one set and return it so the caller can reverse it.
    pub fn pop_undo(&mut self) -> Result<&ChangeSet> {
        if !self.can_undo() {
            return Err(DisasmError::NothingToUndo);
        }
        self.top -= 1;
        Ok(&self.list[self.top])
    }

    /// Step forward one set and return it so the caller can re-apply it.
    pub fn pop_redo(&mut self) -> Result<&ChangeSet> {
        if !self.can_redo() {
            return Err(DisasmError::NothingToRedo);
        }
        self.top += 1;
        Ok(&self.list[self.top - 1])
    }

    /// One line per change record, with the stack pointer and save point
    /// marked. Debugging aid.
    pub fn history_string(&self) -> String {
        let mut out = String::new();
        for (i, cs) in self.list.iter().enumerate() {
            let top_mark = if i == self.top { "[ ]" } else { "   " };
            let save_mark = if self.save_index == Some(i) { "*" } else { " " };
            let _ = writeln!(out, "{top_mark}{save_mark}{i:3}: {} change(s)", cs.len());
            for uc in cs {
                let offset = uc
                    .offset
                    .map(|o| format!("+{o:06x}"))
                    .unwrap_or_else(|| "N/A".to_string());
                let _ = writeln!(
                    out,
                    "        type={} offset={offset} reReq={:?}",
                    uc.kind.name(),
                    uc.scope
                );
            }
        }
        if self.top == self.list.len() {
            let save_mark = if self.save_index == Some(self.top) { "*" } else { " " };
            let _ = writeln!(out, "[ - ]{save_mark}");
        }
        out
    }
}
