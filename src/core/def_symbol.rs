//! Symbols defined in configuration: platform files, project symbols and
//! local variables.
//!
//! These carry a width (so a single definition can cover a range of
//! addresses), a display format and an I/O direction.

use crate::core::format_descriptor::{FormatDescriptor, FormatSubType, FormatType};
use crate::core::symbol::{Symbol, SymbolSource, SymbolType};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub const MIN_WIDTH: usize = 1;
pub const MAX_WIDTH: usize = 65536;
const DEFAULT_WIDTH: usize = 1;

bitflags! {
    /// Memory-mapped I/O locations may behave differently on read and write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DirectionFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl Default for DirectionFlags {
    fn default() -> Self {
        DirectionFlags::READ_WRITE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefSymbol {
    pub symbol: Symbol,
    /// NumericLE descriptor; its length is the symbol width
    pub data_descriptor: FormatDescriptor,
    /// Width was given explicitly
    pub has_width: bool,
    pub comment: String,
    /// Grouping tag from platform files
    pub tag: String,
    pub direction: DirectionFlags,
    /// Load order of the defining platform file; later files win
    pub load_ordinal: usize,
    pub file_ident: String,
}

impl DefSymbol {
    /// Basic form: default width, read/write, no comment.
    pub fn new(
        label: &str,
        value: i32,
        source: SymbolSource,
        symbol_type: SymbolType,
        sub_type: FormatSubType,
    ) -> Self {
        Self::with_width(
            label,
            value,
            source,
            symbol_type,
            sub_type,
            None,
            "",
            DirectionFlags::READ_WRITE,
        )
    }

    /// General form. A width on a non-variable constant is ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn with_width(
        label: &str,
        value: i32,
        source: SymbolSource,
        symbol_type: SymbolType,
        sub_type: FormatSubType,
        width: Option<usize>,
        comment: &str,
        direction: DirectionFlags,
    ) -> Self {
        debug_assert!(matches!(
            source,
            SymbolSource::Platform | SymbolSource::Project | SymbolSource::Variable
        ));
        let width = if symbol_type == SymbolType::Constant && source != SymbolSource::Variable {
            if width.is_some() {
                debug!(label, "Overriding constant DefSymbol width");
            }
            None
        } else {
            width
        };
        let has_width = width.is_some();
        let width = width.unwrap_or(DEFAULT_WIDTH);
        debug_assert!((MIN_WIDTH..=MAX_WIDTH).contains(&width));

        Self {
            symbol: Symbol::new(label, value, source, symbol_type),
            data_descriptor: FormatDescriptor::new(width, FormatType::NumericLE, sub_type),
            has_width,
            comment: comment.to_string(),
            tag: String::new(),
            direction,
            load_ordinal: 0,
            file_ident: String::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.symbol.label
    }

    pub fn value(&self) -> i32 {
        self.symbol.value
    }

    pub fn width(&self) -> usize {
        self.data_descriptor.length()
    }

    /// Copy with a different label. Used for local variable de-duplication.
    pub fn renamed(&self, label: &str) -> Self {
        debug_assert!(self.symbol.is_variable());
        let mut copy = self.clone();
        copy.symbol.label = label.to_string();
        copy
    }

    /// True if `self` covers any of `[value, value + width)` and has the same
    /// type. Negative values never overlap.
    pub fn check_overlap(&self, value: i32, width: usize, symbol_type: SymbolType) -> bool {
        if self.width() == 0 || width == 0 {
            return false;
        }
        if self.value() < 0 || value < 0 {
            return false;
        }
        if self.symbol.symbol_type != symbol_type {
            return false;
        }
        let max_start = self.value().max(value) as i64;
        let min_end = (self.value() as i64 + self.width() as i64 - 1)
            .min(value as i64 + width as i64 - 1);
        max_start <= min_end
    }
}

impl fmt::Display for DefSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{};{} dir={:?}",
            self.symbol, self.data_descriptor, self.comment, self.direction
        )?;
        if !self.tag.is_empty() {
            write!(f, " [{}]", self.tag)?;
        }
        Ok(())
    }
}
