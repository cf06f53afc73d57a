//! Format descriptors for data items and instruction operands.
//!
//! A descriptor says how many bytes an item spans and how to interpret them.
//! Descriptors live in the persistent operand format table (keyed by offset)
//! and are copied into the attribute array during analysis.

use crate::core::weak_ref::{Part, WeakSymbolRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest numeric item: a 32-bit value or a 4-byte instruction.
pub const MAX_NUMERIC_LEN: usize = 4;

/// General data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatType {
    /// Only used by editors to request removal
    Remove,
    /// Unformatted; same as having no descriptor
    Default,
    NumericLE,
    NumericBE,
    StringGeneric,
    StringReverse,
    /// Terminated by a single `$00`
    StringNullTerm,
    /// 8-bit length prefix
    StringL8,
    /// 16-bit little-endian length prefix
    StringL16,
    /// Final byte has its high bit flipped
    StringDci,
    Dense,
    Fill,
    /// Storage with no meaningful initial value
    Uninit,
    Junk,
}

/// Additional detail, mostly affecting how the operand is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatSubType {
    None,
    /// Placeholder from legacy projects, refined to Ascii/HighAscii on load
    AsciiGeneric,
    Hex,
    Decimal,
    Binary,
    /// Wants to be an address, but no symbol defined
    Address,
    Symbol,
    Ascii,
    HighAscii,
    C64Petscii,
    C64Screen,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatDescriptor {
    length: usize,
    pub format_type: FormatType,
    pub sub_type: FormatSubType,
    pub symbol_ref: Option<WeakSymbolRef>,
}

impl FormatDescriptor {
    pub fn new(length: usize, format_type: FormatType, sub_type: FormatSubType) -> Self {
        debug_assert!(length > 0);
        debug_assert!(sub_type != FormatSubType::Symbol);
        Self {
            length,
            format_type,
            sub_type,
            symbol_ref: None,
        }
    }

    /// Numeric descriptor that displays a symbol.
    pub fn with_symbol(length: usize, symbol_ref: WeakSymbolRef, big_endian: bool) -> Self {
        debug_assert!(length > 0);
        Self {
            length,
            format_type: if big_endian {
                FormatType::NumericBE
            } else {
                FormatType::NumericLE
            },
            sub_type: FormatSubType::Symbol,
            symbol_ref: Some(symbol_ref),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_big_endian(&self) -> bool {
        self.format_type == FormatType::NumericBE
    }

    /// Instruction operands can only be unformatted or little-endian numbers.
    pub fn is_valid_for_instruction(&self) -> bool {
        matches!(self.format_type, FormatType::Default | FormatType::NumericLE)
    }

    pub fn has_symbol(&self) -> bool {
        self.symbol_ref.is_some()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.format_type, FormatType::NumericLE | FormatType::NumericBE)
    }

    pub fn is_string(&self) -> bool {
        matches!(
            self.format_type,
            FormatType::StringGeneric
                | FormatType::StringReverse
                | FormatType::StringNullTerm
                | FormatType::StringL8
                | FormatType::StringL16
                | FormatType::StringDci
        )
    }

    pub fn has_symbol_or_address(&self) -> bool {
        self.has_symbol() || self.sub_type == FormatSubType::Address
    }

    /// Same descriptor with the weak reference pointing at a new label.
    pub fn relabeled(&self, label: &str) -> Self {
        Self {
            symbol_ref: self.symbol_ref.as_ref().map(|r| r.relabeled(label)),
            ..self.clone()
        }
    }

    /// Same descriptor with a different sub-type.
    pub fn with_sub_type(&self, sub_type: FormatSubType) -> Self {
        Self {
            sub_type,
            ..self.clone()
        }
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[FmtDesc: len={} fmt={:?} sub={:?}",
            self.length, self.format_type, self.sub_type
        )?;
        if let Some(sym) = &self.symbol_ref {
            write!(f, " {sym}")?;
        }
        write!(f, "]")
    }
}

/// Read a 1-4 byte value. Out-of-range bytes read as zero.
pub fn read_word(data: &[u8], offset: usize, len: usize, big_endian: bool) -> i32 {
    debug_assert!((1..=MAX_NUMERIC_LEN).contains(&len));
    let mut val: u32 = 0;
    for i in 0..len {
        let idx = if big_endian { i } else { len - 1 - i };
        let byte = data.get(offset + idx).copied().unwrap_or(0);
        val = (val << 8) | byte as u32;
    }
    val as i32
}

/// Check string structure (not character encoding) for `len` bytes at
/// `offset`. On failure returns a short description of the problem.
pub fn verify_string_data(
    data: &[u8],
    offset: usize,
    len: usize,
    format_type: FormatType,
) -> Result<(), &'static str> {
    if len == 0 {
        return Err("string has zero length");
    }
    let Some(bytes) = offset.checked_add(len).and_then(|end| data.get(offset..end)) else {
        return Err("string runs off end of file");
    };
    match format_type {
        FormatType::StringGeneric | FormatType::StringReverse => Ok(()),
        FormatType::StringNullTerm => match bytes.iter().position(|&b| b == 0) {
            Some(pos) if Some(pos) == len.checked_sub(1) => Ok(()),
            Some(_) => Err("null byte found inside null-terminated string"),
            None => Err("null-terminated string doesn't end with null byte"),
        },
        FormatType::StringL8 => {
            if bytes.first().map(|&b| b as usize) != len.checked_sub(1) {
                return Err("string length doesn't match 8-bit length prefix");
            }
            Ok(())
        }
        FormatType::StringL16 => {
            if len < 2 || read_word(bytes, 0, 2, false) as usize != len - 2 {
                return Err("string length doesn't match 16-bit length prefix");
            }
            Ok(())
        }
        FormatType::StringDci => {
            if len < 2 {
                return Err("DCI string is too short");
            }
            let first = bytes[0] & 0x80;
            if bytes[1..len - 1].iter().any(|&b| b & 0x80 != first) {
                return Err("DCI string has mixed data");
            }
            if bytes[len - 1] & 0x80 == first {
                return Err("DCI string is not terminated");
            }
            Ok(())
        }
        _ => Err("not a string type"),
    }
}

/// Convenience for the common "symbol, low part" reference.
pub fn symbol_descriptor(length: usize, label: &str) -> FormatDescriptor {
    FormatDescriptor::with_symbol(length, WeakSymbolRef::new(label, Part::Low), false)
}
