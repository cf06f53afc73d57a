//! Per-offset analysis attributes.
//!
//! One `Anattrib` exists for every byte of the file. The array is rebuilt (or
//! restored from the post-code-analysis snapshot) on every reanalysis, so
//! nothing outside the pipeline should hold on to entries across an edit.

use crate::core::format_descriptor::FormatDescriptor;
use crate::core::status_flags::StatusFlags;
use crate::core::symbol::Symbol;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Classification and analyzer bookkeeping bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AttribFlags: u32 {
        /// First byte of an instruction
        const INSTR_START = 1 << 0;
        /// Part of an instruction
        const INSTRUCTION = 1 << 1;
        /// Inline data (data embedded in the instruction stream)
        const INLINE_DATA = 1 << 2;
        /// Plain data
        const DATA = 1 << 3;
        /// External code enters here
        const ENTRY_POINT = 1 << 8;
        /// Internal code branches here
        const BRANCH_TARGET = 1 << 9;
        /// Execution does not continue to the next instruction
        const NO_CONTINUE = 1 << 12;
        /// Analyzer has visited this byte
        const VISITED = 1 << 16;
        /// Affected by an analyzer tag
        const ATAGGED = 1 << 18;
        /// In a non-addressable region
        const NON_ADDRESSABLE = 1 << 20;
    }
}

bitflags! {
    /// How an instruction reaches its operand.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AccessFlags: u8 {
        const INDEXED = 1 << 0;
        const POINTER = 1 << 1;
    }
}

bitflags! {
    /// User-set per-offset flags that aren't formatting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MiscFlags: u8 {
        /// Don't match the operand address against platform/project symbols
        const DISREGARD_OPERAND_ADDRESS = 1 << 0;
    }
}

/// Control-flow role of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlowKind {
    #[default]
    None,
    SubCall,
    Branch,
}

/// Memory access performed by an instruction's operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MemoryEffect {
    None,
    Read,
    Write,
    ReadModifyWrite,
    #[default]
    Unknown,
}

impl MemoryEffect {
    pub fn as_str(&self) -> &str {
        match self {
            MemoryEffect::None => "none",
            MemoryEffect::Read => "read",
            MemoryEffect::Write => "write",
            MemoryEffect::ReadModifyWrite => "rmw",
            MemoryEffect::Unknown => "unknown",
        }
    }
}

/// Addressing mode families that local variable resolution cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OperandMode {
    #[default]
    Other,
    /// Zero page / direct page operand
    DirectPage,
    /// 65816 stack-relative operand
    StackRelative,
}

/// Instruction properties recorded by the code analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InstrInfo {
    pub flow: FlowKind,
    pub effect: MemoryEffect,
    pub access: AccessFlags,
    pub mode: OperandMode,
}

/// Analysis results for one byte.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Anattrib {
    pub(crate) flags: AttribFlags,
    pub(crate) length: usize,
    /// Resolved address, `None` when non-addressable
    pub address: Option<i32>,
    pub status_flags: StatusFlags,
    /// Address referenced by the operand, if any
    pub operand_address: Option<i32>,
    /// File offset of `operand_address`, when it falls inside the file
    pub operand_offset: Option<usize>,
    pub instr: InstrInfo,
    pub symbol: Option<Symbol>,
    pub data_descriptor: Option<FormatDescriptor>,
}

impl Anattrib {
    pub fn flags(&self) -> AttribFlags {
        self.flags
    }

    fn set_flag(&mut self, flag: AttribFlags, value: bool) {
        self.flags.set(flag, value);
    }

    pub fn is_instruction_start(&self) -> bool {
        self.flags.contains(AttribFlags::INSTR_START)
    }

    /// Marks (or unmarks) the first byte of an instruction. Also sets the
    /// instruction flag.
    pub fn set_instruction_start(&mut self, value: bool) {
        self.set_instruction(value);
        self.set_flag(AttribFlags::INSTR_START, value);
    }

    pub fn is_instruction(&self) -> bool {
        self.flags.contains(AttribFlags::INSTRUCTION)
    }

    pub fn set_instruction(&mut self, value: bool) {
        debug_assert!(
            !value
                || !self
                    .flags
                    .intersects(AttribFlags::INLINE_DATA | AttribFlags::DATA),
            "byte is already data"
        );
        self.set_flag(AttribFlags::INSTRUCTION, value);
    }

    pub fn is_inline_data(&self) -> bool {
        self.flags.contains(AttribFlags::INLINE_DATA)
    }

    pub fn set_inline_data(&mut self, value: bool) {
        debug_assert!(
            !value
                || !self
                    .flags
                    .intersects(AttribFlags::INSTRUCTION | AttribFlags::DATA),
            "byte is already code or data"
        );
        self.set_flag(AttribFlags::INLINE_DATA, value);
    }

    pub fn is_data(&self) -> bool {
        self.flags.contains(AttribFlags::DATA)
    }

    pub fn set_data(&mut self, value: bool) {
        debug_assert!(
            !value
                || !self
                    .flags
                    .intersects(AttribFlags::INSTRUCTION | AttribFlags::INLINE_DATA),
            "byte is already code or inline data"
        );
        self.set_flag(AttribFlags::DATA, value);
    }

    pub fn is_data_start(&self) -> bool {
        self.is_data() && self.data_descriptor.is_some()
    }

    pub fn is_inline_data_start(&self) -> bool {
        self.is_inline_data() && self.data_descriptor.is_some()
    }

    /// True for the first byte of an instruction, data item, or inline data item.
    pub fn is_start(&self) -> bool {
        self.is_instruction_start() || self.is_data_start() || self.is_inline_data_start()
    }

    /// Not yet classified as anything.
    pub fn is_untyped(&self) -> bool {
        !self.flags.intersects(
            AttribFlags::INSTRUCTION | AttribFlags::INLINE_DATA | AttribFlags::DATA,
        )
    }

    pub fn is_entry_point(&self) -> bool {
        self.flags.contains(AttribFlags::ENTRY_POINT)
    }

    pub fn set_entry_point(&mut self, value: bool) {
        self.set_flag(AttribFlags::ENTRY_POINT, value);
    }

    pub fn is_branch_target(&self) -> bool {
        self.flags.contains(AttribFlags::BRANCH_TARGET)
    }

    pub fn set_branch_target(&mut self, value: bool) {
        self.set_flag(AttribFlags::BRANCH_TARGET, value);
    }

    pub fn does_not_continue(&self) -> bool {
        self.flags.contains(AttribFlags::NO_CONTINUE)
    }

    pub fn set_no_continue(&mut self, value: bool) {
        self.set_flag(AttribFlags::NO_CONTINUE, value);
    }

    pub fn is_visited(&self) -> bool {
        self.flags.contains(AttribFlags::VISITED)
    }

    pub fn set_visited(&mut self, value: bool) {
        self.set_flag(AttribFlags::VISITED, value);
    }

    pub fn has_analyzer_tag(&self) -> bool {
        self.flags.contains(AttribFlags::ATAGGED)
    }

    pub fn set_analyzer_tag(&mut self, value: bool) {
        self.set_flag(AttribFlags::ATAGGED, value);
    }

    pub fn is_non_addressable(&self) -> bool {
        self.flags.contains(AttribFlags::NON_ADDRESSABLE)
    }

    pub fn set_non_addressable(&mut self, value: bool) {
        self.set_flag(AttribFlags::NON_ADDRESSABLE, value);
    }

    /// Length of the item starting here. Data and inline data take their
    /// length from the descriptor; bytes without one report zero.
    pub fn length(&self) -> usize {
        if self.is_data() || self.is_inline_data() {
            return self
                .data_descriptor
                .as_ref()
                .map(|d| d.length())
                .unwrap_or(0);
        }
        self.length
    }

    /// Sets the instruction length. Only meaningful for instruction bytes.
    pub fn set_length(&mut self, len: usize) {
        debug_assert!(!self.is_data());
        self.length = len;
    }
}

impl std::fmt::Display for Anattrib {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_instruction() {
            write!(f, "Inst")?;
        } else if self.is_data() {
            write!(f, "Data")?;
        } else if self.is_inline_data() {
            write!(f, "Inli")?;
        }
        if self.is_start() {
            write!(f, "Start")?;
        }
        write!(f, " len={}", self.length())
    }
}
