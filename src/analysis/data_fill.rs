//! Reference data analyzer.
//!
//! Labels the targets of operands and address data items, then turns every
//! byte nobody claimed into data. Runs of identical bytes become fills when
//! uncategorized-data analysis is enabled.

use super::{DataAnalysisInput, DataAnalyzer};
use crate::core::anattrib::{Anattrib, FlowKind};
use crate::core::format_descriptor::{read_word, FormatDescriptor, FormatSubType, FormatType};
use crate::core::symbol::SymbolSource;
use crate::core::symbol_table::SymbolTable;
use crate::core::weak_ref::{Part, WeakSymbolRef};
use crate::error::Result;
use tracing::{debug, trace};

/// Shortest run of identical bytes formatted as a fill.
pub const MIN_FILL_RUN: usize = 8;

/// How far back a nearby-label search looks.
const NEARBY_BACK: usize = 3;

#[derive(Debug, Default)]
pub struct BasicDataAnalyzer;

impl BasicDataAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Look for a user label within a few bytes of `target`, in the same
    /// address run. Labels behind the target win over the one ahead.
    fn find_alternate_target(anattribs: &[Anattrib], target: usize) -> usize {
        if anattribs[target].is_instruction() {
            return target;
        }
        let Some(base) = anattribs[target].address else {
            return target;
        };
        let is_user_label = |off: usize| {
            anattribs[off]
                .symbol
                .as_ref()
                .is_some_and(|s| s.source == SymbolSource::User)
        };
        for back in 1..=NEARBY_BACK {
            let Some(off) = target.checked_sub(back) else {
                break;
            };
            if anattribs[off].address != Some(base - back as i32) {
                break;
            }
            if is_user_label(off) {
                return off;
            }
        }
        let ahead = target + 1;
        if ahead < anattribs.len() && anattribs[ahead].address == Some(base + 1) && is_user_label(ahead) {
            return ahead;
        }
        target
    }

    /// Move a target off the middle of an instruction or a formatted data
    /// item, so the label lands where an assembler can put it. No data item
    /// is longer than `max_item_len`, which bounds the search.
    fn align_target(anattribs: &[Anattrib], mut target: usize, max_item_len: usize) -> usize {
        if anattribs[target].is_instruction() && !anattribs[target].is_instruction_start() {
            while target > 0 && !anattribs[target].is_instruction_start() {
                target -= 1;
            }
        } else if !anattribs[target].is_instruction() && anattribs[target].data_descriptor.is_none() {
            let floor = target.saturating_sub(max_item_len.saturating_sub(1));
            for start in (floor..target).rev() {
                let attr = &anattribs[start];
                if attr.is_instruction() {
                    break;
                }
                if let Some(dfd) = &attr.data_descriptor {
                    if start + dfd.length() > target {
                        target = start;
                    }
                    break;
                }
            }
        }
        target
    }

    /// Length of the longest formatted data item.
    fn longest_data_item(anattribs: &[Anattrib]) -> usize {
        anattribs
            .iter()
            .filter(|a| !a.is_instruction())
            .filter_map(|a| a.data_descriptor.as_ref().map(|d| d.length()))
            .max()
            .unwrap_or(0)
    }

    fn set_data_target(
        &self,
        input: &DataAnalysisInput<'_>,
        anattribs: &mut [Anattrib],
        symbols: &mut SymbolTable,
        src: usize,
        target: usize,
        max_item_len: usize,
    ) -> Result<()> {
        let mut target = target;
        if anattribs[target].symbol.is_none() {
            // Branches and calls always go straight to their target.
            if input.params.seek_nearby_targets && anattribs[src].instr.flow == FlowKind::None {
                target = Self::find_alternate_target(anattribs, target);
            }
            target = Self::align_target(anattribs, target, max_item_len);
        }

        let label = match &anattribs[target].symbol {
            Some(sym) => sym.label.clone(),
            None => {
                let Some(addr) = anattribs[target].address else {
                    return Ok(());
                };
                let sym = symbols.generate_unique_for_address(addr, "L")?;
                let label = sym.label.clone();
                trace!(offset = target, label = %label, "Creating auto label");
                symbols.add(sym.clone());
                anattribs[target].symbol = Some(sym);
                label
            }
        };

        let src_attr = &mut anattribs[src];
        let (len, big_endian) = match &src_attr.data_descriptor {
            Some(dfd) => (dfd.length(), dfd.is_big_endian()),
            None => (src_attr.length(), false),
        };
        src_attr.data_descriptor = Some(FormatDescriptor::with_symbol(
            len,
            WeakSymbolRef::new(&label, Part::Low),
            big_endian,
        ));
        Ok(())
    }
}

impl DataAnalyzer for BasicDataAnalyzer {
    fn analyze_data_targets(
        &mut self,
        input: &DataAnalysisInput<'_>,
        anattribs: &mut [Anattrib],
        symbols: &mut SymbolTable,
    ) -> Result<()> {
        let max_item_len = Self::longest_data_item(anattribs);
        let mut offset = 0;
        while offset < anattribs.len() {
            let attr = &anattribs[offset];
            if attr.is_instruction_start() {
                if attr.data_descriptor.is_none() {
                    if let Some(target) = attr.operand_offset {
                        self.set_data_target(input, anattribs, symbols, offset, target, max_item_len)?;
                    }
                }
                offset += 1;
                continue;
            }
            let Some(dfd) = attr.data_descriptor.as_ref().filter(|_| !attr.is_instruction()) else {
                offset += 1;
                continue;
            };
            let len = dfd.length();
            if dfd.is_numeric() && dfd.sub_type == FormatSubType::Address {
                let addr = read_word(input.data, offset, len, dfd.is_big_endian());
                if let Some(target) = input.addr_map.address_to_offset(offset, addr) {
                    self.set_data_target(input, anattribs, symbols, offset, target, max_item_len)?;
                }
            }
            offset += len.max(1);
        }
        Ok(())
    }

    fn analyze_uncategorized(&mut self, input: &DataAnalysisInput<'_>, anattribs: &mut [Anattrib]) {
        let one_byte = FormatDescriptor::new(1, FormatType::Default, FormatSubType::None);

        // Positive identification for everything that isn't code.
        for attr in anattribs.iter_mut() {
            if !attr.is_inline_data() && !attr.is_instruction() {
                attr.set_data(true);
            }
        }

        let mut offset = 0;
        while offset < anattribs.len() {
            let attr = &anattribs[offset];
            if attr.is_instruction() {
                offset += 1;
                continue;
            }
            if let Some(len) = attr.data_descriptor.as_ref().map(|d| d.length()) {
                // Descriptors may not overlap; drop any inside this one.
                let end = (offset + len).min(anattribs.len());
                for inner in &mut anattribs[offset + 1..end] {
                    if inner.data_descriptor.take().is_some() {
                        debug!(offset, "Dropping descriptor inside data item");
                    }
                }
                offset = end;
                continue;
            }

            if attr.is_inline_data() {
                anattribs[offset].data_descriptor = Some(one_byte.clone());
                offset += 1;
                continue;
            }
            let run = if input.params.analyze_uncategorized_data {
                Self::fill_run(input, anattribs, offset)
            } else {
                1
            };
            if run >= MIN_FILL_RUN {
                trace!(offset, run, "Formatting fill");
                anattribs[offset].data_descriptor =
                    Some(FormatDescriptor::new(run, FormatType::Fill, FormatSubType::None));
                offset += run;
            } else {
                anattribs[offset].data_descriptor = Some(one_byte.clone());
                offset += 1;
            }
        }
    }
}

impl BasicDataAnalyzer {
    /// Length of the run of identical, unclaimed, unlabeled bytes at `start`
    /// that stays within one address region.
    fn fill_run(input: &DataAnalysisInput<'_>, anattribs: &[Anattrib], start: usize) -> usize {
        let value = input.data[start];
        let mut end = start + 1;
        while end < anattribs.len() {
            let attr = &anattribs[end];
            if input.data[end] != value
                || attr.is_instruction()
                || attr.is_inline_data()
                || attr.data_descriptor.is_some()
                || attr.symbol.is_some()
                || input.addr_map.is_region_start(end)
            {
                break;
            }
            end += 1;
        }
        end - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisParams;
    use crate::core::address_map::AddressMap;
    use crate::core::symbol::{Symbol, SymbolType};

    fn attrs_at(len: usize, load: i32) -> Vec<Anattrib> {
        (0..len)
            .map(|off| Anattrib {
                address: Some(load + off as i32),
                ..Anattrib::default()
            })
            .collect()
    }

    fn instr(attrs: &mut [Anattrib], offset: usize, len: usize, target: Option<usize>) {
        attrs[offset].set_instruction_start(true);
        attrs[offset].set_length(len);
        attrs[offset].operand_offset = target;
        attrs[offset].operand_address = target.map(|t| 0x1000 + t as i32);
        for a in &mut attrs[offset + 1..offset + len] {
            a.set_instruction(true);
        }
    }

    #[test]
    fn test_instruction_target_gets_auto_label() {
        let data = [0xad, 0x05, 0x10, 0x60, 0x00, 0x42];
        let map = AddressMap::new(data.len(), 0x1000);
        let params = AnalysisParams::default();
        let input = DataAnalysisInput {
            data: &data,
            addr_map: &map,
            params: &params,
        };
        let mut attrs = attrs_at(data.len(), 0x1000);
        instr(&mut attrs, 0, 3, Some(5));
        instr(&mut attrs, 3, 1, None);
        let mut symbols = SymbolTable::new();
        let mut da = BasicDataAnalyzer::new();
        da.analyze_data_targets(&input, &mut attrs, &mut symbols).unwrap();

        assert_eq!(attrs[5].symbol.as_ref().unwrap().label, "L1005");
        assert!(symbols.contains("L1005"));
        let wref = attrs[0].data_descriptor.as_ref().unwrap().symbol_ref.clone().unwrap();
        assert_eq!(wref.label, "L1005");

        da.analyze_uncategorized(&input, &mut attrs);
        assert!(attrs[4].is_data_start());
        assert!(attrs[5].is_data_start());
        assert_eq!(attrs[5].length(), 1);
    }

    #[test]
    fn test_mid_instruction_target_backs_up() {
        let data = [0xee, 0x01, 0x10, 0x60];
        let map = AddressMap::new(data.len(), 0x1000);
        let params = AnalysisParams::default();
        let input = DataAnalysisInput {
            data: &data,
            addr_map: &map,
            params: &params,
        };
        let mut attrs = attrs_at(data.len(), 0x1000);
        instr(&mut attrs, 0, 3, Some(1));
        instr(&mut attrs, 3, 1, None);
        let mut symbols = SymbolTable::new();
        BasicDataAnalyzer::new()
            .analyze_data_targets(&input, &mut attrs, &mut symbols)
            .unwrap();
        assert_eq!(attrs[0].symbol.as_ref().unwrap().label, "L1000");
        assert!(attrs[1].symbol.is_none());
    }

    #[test]
    fn test_target_inside_data_item_backs_up() {
        let mut attrs = attrs_at(24, 0x1000);
        instr(&mut attrs, 0, 3, Some(12));
        attrs[4].data_descriptor = Some(FormatDescriptor::new(2, FormatType::NumericLE, FormatSubType::Hex));
        attrs[8].data_descriptor =
            Some(FormatDescriptor::new(6, FormatType::StringGeneric, FormatSubType::Ascii));
        let longest = BasicDataAnalyzer::longest_data_item(&attrs);
        assert_eq!(longest, 6);

        assert_eq!(BasicDataAnalyzer::align_target(&attrs, 12, longest), 8);
        assert_eq!(BasicDataAnalyzer::align_target(&attrs, 13, longest), 8);
        // just past the string, and past the shorter item
        assert_eq!(BasicDataAnalyzer::align_target(&attrs, 14, longest), 14);
        assert_eq!(BasicDataAnalyzer::align_target(&attrs, 6, longest), 6);
        assert_eq!(BasicDataAnalyzer::align_target(&attrs, 5, longest), 4);
        // the search never looks further back than the longest item
        assert_eq!(BasicDataAnalyzer::align_target(&attrs, 20, longest), 20);
        assert_eq!(BasicDataAnalyzer::align_target(&attrs, 3, longest), 3);
        assert_eq!(BasicDataAnalyzer::align_target(&attrs, 1, longest), 0);
    }

    #[test]
    fn test_nearby_user_label() {
        let mut attrs = attrs_at(8, 0x1000);
        attrs[4].symbol = Some(Symbol::new(
            "TABLE",
            0x1004,
            SymbolSource::User,
            SymbolType::LocalOrGlobalAddr,
        ));
        assert_eq!(BasicDataAnalyzer::find_alternate_target(&attrs, 6), 4);
        assert_eq!(BasicDataAnalyzer::find_alternate_target(&attrs, 3), 4);
        assert_eq!(BasicDataAnalyzer::find_alternate_target(&attrs, 1), 1);
    }

    #[test]
    fn test_fill_runs() {
        let mut data = vec![0u8; 12];
        data[0] = 0x01;
        let map = AddressMap::new(data.len(), 0x1000);
        let params = AnalysisParams::default();
        let input = DataAnalysisInput {
            data: &data,
            addr_map: &map,
            params: &params,
        };
        let mut attrs = attrs_at(data.len(), 0x1000);
        BasicDataAnalyzer::new().analyze_uncategorized(&input, &mut attrs);
        assert_eq!(attrs[0].length(), 1);
        let fill = attrs[1].data_descriptor.as_ref().unwrap();
        assert_eq!(fill.format_type, FormatType::Fill);
        assert_eq!(fill.length(), 11);
        assert!(attrs.iter().all(|a| a.is_data()));
    }

    #[test]
    fn test_no_fill_when_disabled() {
        let data = vec![0u8; 10];
        let map = AddressMap::new(data.len(), 0x1000);
        let params = AnalysisParams {
            analyze_uncategorized_data: false,
            ..AnalysisParams::default()
        };
        let input = DataAnalysisInput {
            data: &data,
            addr_map: &map,
            params: &params,
        };
        let mut attrs = attrs_at(data.len(), 0x1000);
        BasicDataAnalyzer::new().analyze_uncategorized(&input, &mut attrs);
        assert!(attrs.iter().all(|a| a.is_data_start() && a.length() == 1));
    }
}
