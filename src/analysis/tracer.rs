//! Reference code analyzer.
//!
//! `MiniTracer` follows execution through a subset of the 6502 instruction
//! set: enough to exercise the rest of the pipeline on small hand-built
//! images. It stops at anything it doesn't recognize.

use super::{AnalyzerTag, CodeAnalysisInput, CodeAnalyzer};
use crate::config::CpuKind;
use crate::core::anattrib::{
    AccessFlags, Anattrib, FlowKind, InstrInfo, MemoryEffect, OperandMode,
};
use crate::core::status_flags::StatusFlags;
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddrMode {
    Implied,
    Imm,
    Zp,
    ZpX,
    ZpY,
    Abs,
    AbsX,
    AbsY,
    ZpXInd,
    ZpIndY,
    AbsInd,
    Rel,
    StackRel,
}

impl AddrMode {
    fn len(self) -> usize {
        match self {
            AddrMode::Implied => 1,
            AddrMode::Abs | AddrMode::AbsX | AddrMode::AbsY | AddrMode::AbsInd => 3,
            _ => 2,
        }
    }

    fn operand_mode(self) -> OperandMode {
        match self {
            AddrMode::Zp | AddrMode::ZpX | AddrMode::ZpY | AddrMode::ZpXInd | AddrMode::ZpIndY => {
                OperandMode::DirectPage
            }
            AddrMode::StackRel => OperandMode::StackRelative,
            _ => OperandMode::Other,
        }
    }

    fn access(self) -> AccessFlags {
        match self {
            AddrMode::ZpX | AddrMode::ZpY | AddrMode::AbsX | AddrMode::AbsY => AccessFlags::INDEXED,
            AddrMode::ZpXInd | AddrMode::ZpIndY => AccessFlags::INDEXED | AccessFlags::POINTER,
            AddrMode::AbsInd => AccessFlags::POINTER,
            _ => AccessFlags::empty(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OpDef {
    mode: AddrMode,
    flow: FlowKind,
    effect: MemoryEffect,
    /// Execution never falls through to the next instruction
    stops: bool,
    /// Only the branch-always forms have no fall-through path
    conditional: bool,
}

impl OpDef {
    const fn data(mode: AddrMode, effect: MemoryEffect) -> Self {
        Self {
            mode,
            flow: FlowKind::None,
            effect,
            stops: false,
            conditional: false,
        }
    }

    const fn stop(mode: AddrMode) -> Self {
        Self {
            mode,
            flow: FlowKind::None,
            effect: MemoryEffect::None,
            stops: true,
            conditional: false,
        }
    }

    const fn branch(conditional: bool) -> Self {
        Self {
            mode: AddrMode::Rel,
            flow: FlowKind::Branch,
            effect: MemoryEffect::None,
            stops: !conditional,
            conditional,
        }
    }
}

fn lookup(opcode: u8, cpu: CpuKind) -> Option<OpDef> {
    use AddrMode::*;
    use MemoryEffect::{Read, ReadModifyWrite as Rmw, Write};

    let def = match opcode {
        0x00 => OpDef::stop(Implied),
        0xea => OpDef::data(Implied, MemoryEffect::None),
        0x40 | 0x60 => OpDef::stop(Implied),
        0x4c => OpDef {
            mode: Abs,
            flow: FlowKind::Branch,
            effect: MemoryEffect::None,
            stops: true,
            conditional: false,
        },
        0x6c => OpDef {
            mode: AbsInd,
            flow: FlowKind::None,
            effect: Read,
            stops: true,
            conditional: false,
        },
        0x20 => OpDef {
            mode: Abs,
            flow: FlowKind::SubCall,
            effect: MemoryEffect::None,
            stops: false,
            conditional: false,
        },
        0x10 | 0x30 | 0x50 | 0x70 | 0x90 | 0xb0 | 0xd0 | 0xf0 => OpDef::branch(true),
        0x80 if cpu != CpuKind::Mos6502 => OpDef::branch(false),

        // LDA
        0xa9 => OpDef::data(Imm, MemoryEffect::None),
        0xa5 => OpDef::data(Zp, Read),
        0xb5 => OpDef::data(ZpX, Read),
        0xad => OpDef::data(Abs, Read),
        0xbd => OpDef::data(AbsX, Read),
        0xb9 => OpDef::data(AbsY, Read),
        0xa1 => OpDef::data(ZpXInd, Read),
        0xb1 => OpDef::data(ZpIndY, Read),
        0xa3 if cpu == CpuKind::W65C816 => OpDef::data(StackRel, Read),
        // STA
        0x85 => OpDef::data(Zp, Write),
        0x95 => OpDef::data(ZpX, Write),
        0x8d => OpDef::data(Abs, Write),
        0x9d => OpDef::data(AbsX, Write),
        0x99 => OpDef::data(AbsY, Write),
        0x81 => OpDef::data(ZpXInd, Write),
        0x91 => OpDef::data(ZpIndY, Write),
        0x83 if cpu == CpuKind::W65C816 => OpDef::data(StackRel, Write),
        // LDX / LDY
        0xa2 | 0xa0 => OpDef::data(Imm, MemoryEffect::None),
        0xa6 | 0xa4 => OpDef::data(Zp, Read),
        0xb6 => OpDef::data(ZpY, Read),
        0xb4 => OpDef::data(ZpX, Read),
        0xae | 0xac => OpDef::data(Abs, Read),
        0xbe => OpDef::data(AbsY, Read),
        0xbc => OpDef::data(AbsX, Read),
        // INC / DEC
        0xe6 | 0xc6 => OpDef::data(Zp, Rmw),
        0xf6 | 0xd6 => OpDef::data(ZpX, Rmw),
        0xee | 0xce => OpDef::data(Abs, Rmw),
        0xfe | 0xde => OpDef::data(AbsX, Rmw),
        _ => return None,
    };
    Some(def)
}

/// Work-list tracer over the supported opcode subset.
#[derive(Debug, Default)]
pub struct MiniTracer {
    instructions: usize,
}

impl MiniTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions found by the most recent run.
    pub fn instruction_count(&self) -> usize {
        self.instructions
    }

    fn init_attribs(input: &CodeAnalysisInput<'_>, anattribs: &mut [Anattrib]) {
        for (offset, attr) in anattribs.iter_mut().enumerate() {
            attr.address = input.addr_map.offset_to_address(offset);
            attr.set_non_addressable(attr.address.is_none());
        }
        for (offset, tag) in input.analyzer_tags.iter() {
            let Some(attr) = anattribs.get_mut(offset) else {
                continue;
            };
            if *tag == AnalyzerTag::None {
                continue;
            }
            attr.set_analyzer_tag(true);
            if *tag == AnalyzerTag::InlineData {
                attr.set_inline_data(true);
            }
        }
    }

    fn seeds(input: &CodeAnalysisInput<'_>, file_len: usize) -> Vec<usize> {
        let mut seeds = Vec::new();
        if file_len > 0 {
            seeds.push(0);
        }
        for (range, tag) in input.analyzer_tags.ranges() {
            if tag == AnalyzerTag::Code && range.start != 0 {
                seeds.push(range.start);
            }
        }
        seeds
    }

    /// Decode and mark one instruction. Returns the definition and length,
    /// or `None` if tracing must stop here.
    fn mark_instruction(
        &mut self,
        input: &CodeAnalysisInput<'_>,
        anattribs: &mut [Anattrib],
        offset: usize,
        flags: StatusFlags,
    ) -> Option<(OpDef, usize)> {
        let data = input.data;
        let attr = &anattribs[offset];
        if !attr.is_untyped() || attr.is_non_addressable() {
            return None;
        }
        if matches!(
            input.analyzer_tags.get(offset),
            Some(AnalyzerTag::Stop) | Some(AnalyzerTag::InlineData)
        ) {
            trace!(offset, "Tracer hit stop tag");
            return None;
        }
        let opcode = data[offset];
        let Some(def) = lookup(opcode, input.cpu) else {
            debug!(offset, opcode, "Unknown opcode, stopping trace");
            return None;
        };
        let len = if opcode == 0x00 && input.two_byte_brk {
            2
        } else {
            def.mode.len()
        };
        if offset + len > data.len() {
            debug!(offset, len, "Instruction runs off end of file");
            return None;
        }
        if anattribs[offset + 1..offset + len]
            .iter()
            .any(|a| !a.is_untyped() || a.is_non_addressable())
        {
            debug!(offset, "Instruction overlaps classified bytes");
            return None;
        }

        let address = anattribs[offset].address?;
        let operand_address = match def.mode {
            AddrMode::Implied | AddrMode::Imm | AddrMode::StackRel => None,
            AddrMode::Zp | AddrMode::ZpX | AddrMode::ZpY | AddrMode::ZpXInd | AddrMode::ZpIndY => {
                Some(data[offset + 1] as i32)
            }
            AddrMode::Abs | AddrMode::AbsX | AddrMode::AbsY | AddrMode::AbsInd => {
                let word = data[offset + 1] as i32 | (data[offset + 2] as i32) << 8;
                Some((address & 0x7f_0000) | word)
            }
            AddrMode::Rel => {
                let rel = data[offset + 1] as i8 as i32;
                let target = (address + 2 + rel) & 0xffff;
                Some((address & 0x7f_0000) | target)
            }
        };

        let mut state = flags;
        if let Some(ovr) = input.status_overrides.get(&offset) {
            state.apply(ovr);
        }

        let attr = &mut anattribs[offset];
        attr.set_instruction_start(true);
        attr.set_length(len);
        attr.set_visited(true);
        attr.status_flags = state;
        attr.operand_address = operand_address;
        attr.operand_offset =
            operand_address.and_then(|addr| input.addr_map.address_to_offset(offset, addr));
        attr.instr = InstrInfo {
            flow: def.flow,
            effect: def.effect,
            access: def.mode.access(),
            mode: def.mode.operand_mode(),
        };
        if def.stops {
            attr.set_no_continue(true);
        }
        for byte in &mut anattribs[offset + 1..offset + len] {
            byte.set_instruction(true);
            byte.set_visited(true);
        }
        self.instructions += 1;
        Some((def, len))
    }
}

impl CodeAnalyzer for MiniTracer {
    fn analyze(&mut self, input: &CodeAnalysisInput<'_>, anattribs: &mut [Anattrib]) {
        debug_assert_eq!(input.data.len(), anattribs.len());
        self.instructions = 0;
        Self::init_attribs(input, anattribs);

        let mut queue: VecDeque<(usize, StatusFlags)> = VecDeque::new();
        for seed in Self::seeds(input, anattribs.len()) {
            anattribs[seed].set_entry_point(true);
            queue.push_back((seed, input.entry_flags));
        }

        while let Some((start, flags)) = queue.pop_front() {
            let mut offset = start;
            let mut flags = flags;
            while offset < anattribs.len() {
                let Some((def, len)) = self.mark_instruction(input, anattribs, offset, flags) else {
                    break;
                };
                flags = anattribs[offset].status_flags;

                if def.flow != FlowKind::None {
                    if let Some(target) = anattribs[offset].operand_offset {
                        anattribs[target].set_branch_target(true);
                        queue.push_back((target, flags));
                    }
                }
                if def.stops || (def.flow == FlowKind::Branch && !def.conditional) {
                    break;
                }
                offset += len;
            }
        }
        debug!(instructions = self.instructions, "Code trace complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisParams;
    use crate::core::address_map::AddressMap;
    use crate::core::range_set::TypedRangeSet;
    use crate::core::symbol_table::SymbolTable;
    use std::collections::BTreeMap;

    fn trace(data: &[u8], load: i32, tags: &TypedRangeSet<AnalyzerTag>, cpu: CpuKind) -> Vec<Anattrib> {
        let map = AddressMap::new(data.len(), load);
        let overrides = BTreeMap::new();
        let params = AnalysisParams::default();
        let symbols = SymbolTable::new();
        let input = CodeAnalysisInput {
            data,
            addr_map: &map,
            analyzer_tags: tags,
            status_overrides: &overrides,
            entry_flags: StatusFlags::DEFAULT,
            params: &params,
            symbols: &symbols,
            cpu,
            two_byte_brk: false,
        };
        let mut attrs = vec![Anattrib::default(); data.len()];
        MiniTracer::new().analyze(&input, &mut attrs);
        attrs
    }

    #[test]
    fn test_counts_and_visits() {
        // LDA #$00 ; RTS ; unreached
        let data = [0xa9, 0x00, 0x60, 0xea];
        let map = AddressMap::new(data.len(), 0x1000);
        let overrides = BTreeMap::new();
        let params = AnalysisParams::default();
        let symbols = SymbolTable::new();
        let tags = TypedRangeSet::new();
        let input = CodeAnalysisInput {
            data: &data,
            addr_map: &map,
            analyzer_tags: &tags,
            status_overrides: &overrides,
            entry_flags: StatusFlags::DEFAULT,
            params: &params,
            symbols: &symbols,
            cpu: CpuKind::Mos6502,
            two_byte_brk: false,
        };
        let mut attrs = vec![Anattrib::default(); data.len()];
        let mut tracer = MiniTracer::new();
        tracer.analyze(&input, &mut attrs);
        assert_eq!(tracer.instruction_count(), 2);
        assert!(attrs[0].is_visited() && attrs[1].is_visited());
        assert!(!attrs[3].is_visited());
    }

    #[test]
    fn test_jmp_to_self() {
        let attrs = trace(&[0x4c, 0x00, 0x10, 0xea], 0x1000, &TypedRangeSet::new(), CpuKind::Mos6502);
        assert!(attrs[0].is_instruction_start());
        assert_eq!(attrs[0].length(), 3);
        assert_eq!(attrs[0].operand_address, Some(0x1000));
        assert_eq!(attrs[0].operand_offset, Some(0));
        assert!(attrs[0].is_branch_target());
        assert!(attrs[1].is_instruction() && !attrs[1].is_instruction_start());
        // JMP doesn't continue
        assert!(attrs[3].is_untyped());
    }

    #[test]
    fn test_jmp_outside_file() {
        let attrs = trace(&[0x4c, 0x00, 0x20, 0xea], 0x1000, &TypedRangeSet::new(), CpuKind::Mos6502);
        assert_eq!(attrs[0].operand_address, Some(0x2000));
        assert_eq!(attrs[0].operand_offset, None);
    }

    #[test]
    fn test_branch_follows_both_paths() {
        // BNE +1 ; RTS ; NOP ; RTS
        let data = [0xd0, 0x01, 0x60, 0xea, 0x60];
        let attrs = trace(&data, 0x1000, &TypedRangeSet::new(), CpuKind::Mos6502);
        assert_eq!(attrs[0].instr.flow, FlowKind::Branch);
        assert_eq!(attrs[0].operand_offset, Some(3));
        assert!(attrs[2].is_instruction_start());
        assert!(attrs[3].is_instruction_start());
        assert!(attrs[3].is_branch_target());
        assert!(attrs[4].is_instruction_start());
    }

    #[test]
    fn test_operand_modes() {
        // LDA $12 ; STA $2000,X ; LDA ($20),Y ; RTS
        let data = [0xa5, 0x12, 0x9d, 0x00, 0x20, 0xb1, 0x20, 0x60];
        let attrs = trace(&data, 0x1000, &TypedRangeSet::new(), CpuKind::Mos6502);
        assert_eq!(attrs[0].instr.mode, OperandMode::DirectPage);
        assert_eq!(attrs[0].instr.effect, MemoryEffect::Read);
        assert_eq!(attrs[0].operand_address, Some(0x12));
        assert_eq!(attrs[2].instr.effect, MemoryEffect::Write);
        assert_eq!(attrs[2].instr.access, AccessFlags::INDEXED);
        assert!(attrs[5].instr.access.contains(AccessFlags::POINTER));
        assert!(attrs[7].does_not_continue());
    }

    #[test]
    fn test_stack_relative_needs_65816() {
        let data = [0xa3, 0x03, 0x60];
        let attrs = trace(&data, 0x1000, &TypedRangeSet::new(), CpuKind::Mos6502);
        assert!(attrs[0].is_untyped());
        let attrs = trace(&data, 0x1000, &TypedRangeSet::new(), CpuKind::W65C816);
        assert_eq!(attrs[0].instr.mode, OperandMode::StackRelative);
        assert_eq!(attrs[0].operand_address, None);
    }

    #[test]
    fn test_tags() {
        // NOP ; NOP ; NOP ; RTS, with a stop tag on the third byte and a code tag on the last
        let data = [0xea, 0xea, 0xea, 0x60];
        let mut tags = TypedRangeSet::new();
        tags.add(2, AnalyzerTag::Stop);
        tags.add(3, AnalyzerTag::Code);
        let attrs = trace(&data, 0x1000, &tags, CpuKind::Mos6502);
        assert!(attrs[1].is_instruction_start());
        assert!(attrs[2].is_untyped());
        assert!(attrs[2].has_analyzer_tag());
        assert!(attrs[3].is_instruction_start());
        assert!(attrs[3].is_entry_point());
    }
}
