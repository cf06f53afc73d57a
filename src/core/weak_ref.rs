//! Symbol references by label text.
//!
//! Operand formats name the symbol they display instead of pointing at it, so
//! they survive the symbol being renamed or deleted. Resolution happens at
//! xref and render time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which part of the symbol's value the operand shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Part {
    /// Low byte (or the whole value)
    #[default]
    Low,
    /// Value shifted right 8
    High,
    /// Value shifted right 16
    Bank,
}

/// Local variable references need the addressing mode to pick the right table
/// entry: a direct-page address and a stack-relative constant may share a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LocalVariableType {
    #[default]
    NotVar,
    DpAddr,
    StackRelConst,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeakSymbolRef {
    pub label: String,
    pub part: Part,
    pub var_type: LocalVariableType,
}

impl WeakSymbolRef {
    pub fn new(label: &str, part: Part) -> Self {
        Self {
            label: label.to_string(),
            part,
            var_type: LocalVariableType::NotVar,
        }
    }

    pub fn new_variable(label: &str, part: Part, var_type: LocalVariableType) -> Self {
        Self {
            label: label.to_string(),
            part,
            var_type,
        }
    }

    pub fn is_variable(&self) -> bool {
        self.var_type != LocalVariableType::NotVar
    }

    /// Same reference pointing at a different label.
    pub fn relabeled(&self, label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for WeakSymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakSym: {}:{:?}", self.label, self.part)?;
        if self.is_variable() {
            write!(f, " var={:?}", self.var_type)?;
        }
        Ok(())
    }
}
