//! Copies user labels and user format descriptors into the attribute array.
//!
//! Anything that doesn't fit the current analysis is skipped with a message.
//! The persistent tables are never modified here.

use crate::core::address_map::AddressMap;
use crate::core::anattrib::Anattrib;
use crate::core::format_descriptor::FormatDescriptor;
use crate::core::messages::{MessageEntry, MessageKind, MessageList, Resolution, Severity};
use crate::core::symbol::Symbol;
use crate::core::symbol_table::SymbolTable;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

pub fn apply_user_labels(anattribs: &mut [Anattrib], user_labels: &BTreeMap<usize, Symbol>) {
    for (&offset, label) in user_labels {
        let Some(attr) = anattribs.get_mut(offset) else {
            error!(offset, label = %label.label, "Invalid user label offset");
            continue;
        };
        if let Some(existing) = &attr.symbol {
            warn!(
                offset,
                existing = %existing.label,
                label = %label.label,
                "Multiple labels at offset"
            );
            continue;
        }
        attr.symbol = Some(label.clone());
    }
}

fn reject(
    messages: &mut MessageList,
    severity: Severity,
    offset: usize,
    kind: MessageKind,
    context: String,
) {
    warn!(offset, kind = ?kind, context = %context, "Ignoring format descriptor");
    messages.add(MessageEntry::new(
        severity,
        offset,
        kind,
        context,
        Resolution::FormatDescriptorIgnored,
    ));
}

pub fn apply_format_descriptors(
    anattribs: &mut [Anattrib],
    formats: &BTreeMap<usize, FormatDescriptor>,
    addr_map: &AddressMap,
    messages: &mut MessageList,
) {
    let file_len = anattribs.len();
    for (&offset, dfd) in formats {
        let len = dfd.length();
        if offset >= file_len {
            reject(
                messages,
                Severity::Error,
                offset,
                MessageKind::InvalidOffsetOrLength,
                format!("invalid offset (desc={dfd})"),
            );
            continue;
        }
        if len == 0 {
            reject(
                messages,
                Severity::Error,
                offset,
                MessageKind::InvalidOffsetOrLength,
                format!("zero-length descriptor (desc={dfd})"),
            );
            continue;
        }
        if offset + len > file_len {
            reject(
                messages,
                Severity::Error,
                offset,
                MessageKind::InvalidOffsetOrLength,
                format!("invalid offset+len: len={len} file={file_len}"),
            );
            continue;
        }
        if !addr_map.is_range_unbroken(offset, len) {
            reject(
                messages,
                Severity::Warning,
                offset,
                MessageKind::InvalidOffsetOrLength,
                format!("descriptor straddles address change; len={len}"),
            );
            continue;
        }

        let attr = &anattribs[offset];
        if attr.is_instruction_start() {
            if len != attr.length() {
                reject(
                    messages,
                    Severity::Warning,
                    offset,
                    MessageKind::InvalidOffsetOrLength,
                    format!(
                        "unexpected length on instr format descriptor ({} vs {})",
                        len,
                        attr.length()
                    ),
                );
                continue;
            }
            if len == 1 {
                reject(
                    messages,
                    Severity::Warning,
                    offset,
                    MessageKind::InvalidDescriptor,
                    "unexpected format descriptor on single-byte op".to_string(),
                );
                continue;
            }
            if !dfd.is_valid_for_instruction() {
                reject(
                    messages,
                    Severity::Warning,
                    offset,
                    MessageKind::InvalidDescriptor,
                    format!("descriptor not valid for instruction: {dfd}"),
                );
                continue;
            }
        } else if attr.is_instruction() {
            reject(
                messages,
                Severity::Warning,
                offset,
                MessageKind::InvalidDescriptor,
                "unexpected mid-instruction format descriptor".to_string(),
            );
            continue;
        } else if let Some(code_off) = (offset..offset + len).find(|&i| anattribs[i].is_instruction()) {
            reject(
                messages,
                Severity::Warning,
                offset,
                MessageKind::InvalidDescriptor,
                format!("data format descriptor overlaps code at +{code_off:06x}"),
            );
            continue;
        }

        anattribs[offset].data_descriptor = Some(dfd.clone());
    }
}

/// Strip user labels that ended up inside an instruction or data item from
/// the symbol table. They stay in the user label table.
pub fn remove_hidden_labels(
    anattribs: &[Anattrib],
    user_labels: &BTreeMap<usize, Symbol>,
    table: &mut SymbolTable,
    messages: &mut MessageList,
) {
    for (&offset, label) in user_labels {
        let hidden = anattribs.get(offset).map_or(true, |a| !a.is_start());
        if !hidden {
            continue;
        }
        debug!(offset, label = %label.label, "Stripping hidden label");
        table.remove(&label.label);
        messages.add(MessageEntry::new(
            Severity::Warning,
            offset,
            MessageKind::HiddenLabel,
            label.label.as_str(),
            Resolution::LabelIgnored,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format_descriptor::{symbol_descriptor, FormatSubType, FormatType};
    use crate::core::symbol::{SymbolSource, SymbolType};

    fn attrs() -> Vec<Anattrib> {
        // LDA $1234 ; NOP ; 4 bytes data
        let mut attrs: Vec<Anattrib> = (0..8)
            .map(|i| Anattrib {
                address: Some(0x1000 + i),
                ..Anattrib::default()
            })
            .collect();
        attrs[0].set_instruction_start(true);
        attrs[0].set_length(3);
        attrs[1].set_instruction(true);
        attrs[2].set_instruction(true);
        attrs[3].set_instruction_start(true);
        attrs[3].set_length(1);
        attrs
    }

    fn user(label: &str, value: i32) -> Symbol {
        Symbol::new(label, value, SymbolSource::User, SymbolType::LocalOrGlobalAddr)
    }

    #[test]
    fn test_first_label_wins() {
        let mut attrs = attrs();
        attrs[4].symbol = Some(user("AUTO", 0x1004));
        let mut labels = BTreeMap::new();
        labels.insert(0, user("START", 0x1000));
        labels.insert(4, user("DATA", 0x1004));
        labels.insert(99, user("GONE", 0));
        apply_user_labels(&mut attrs, &labels);
        assert_eq!(attrs[0].symbol.as_ref().unwrap().label, "START");
        assert_eq!(attrs[4].symbol.as_ref().unwrap().label, "AUTO");
    }

    #[test]
    fn test_format_rejections() {
        let mut attrs = attrs();
        let map = AddressMap::new(8, 0x1000);
        let mut formats = BTreeMap::new();
        formats.insert(0, symbol_descriptor(3, "FOO"));
        formats.insert(1, symbol_descriptor(2, "FOO"));
        formats.insert(3, symbol_descriptor(1, "FOO"));
        formats.insert(2, FormatDescriptor::new(2, FormatType::NumericLE, FormatSubType::Hex));
        formats.insert(6, FormatDescriptor::new(4, FormatType::NumericLE, FormatSubType::Hex));
        formats.insert(4, FormatDescriptor::new(2, FormatType::NumericLE, FormatSubType::Hex));
        let mut messages = MessageList::new();
        apply_format_descriptors(&mut attrs, &formats, &map, &mut messages);

        assert!(attrs[0].data_descriptor.is_some());
        assert!(attrs[4].data_descriptor.is_some());
        assert!(attrs[1].data_descriptor.is_none());
        assert!(attrs[3].data_descriptor.is_none());
        assert!(attrs[6].data_descriptor.is_none());
        assert_eq!(messages.len(), 4);
        assert_eq!(messages.count_of(MessageKind::InvalidOffsetOrLength), 1);
        assert_eq!(messages.count_of(MessageKind::InvalidDescriptor), 3);
        assert!(messages
            .iter()
            .all(|m| m.resolution == Resolution::FormatDescriptorIgnored));
    }

    #[test]
    fn test_data_overlapping_code() {
        let mut attrs = attrs();
        attrs[5].set_instruction_start(true);
        attrs[5].set_length(1);
        let map = AddressMap::new(8, 0x1000);
        let mut formats = BTreeMap::new();
        formats.insert(4, FormatDescriptor::new(3, FormatType::NumericLE, FormatSubType::Hex));
        let mut messages = MessageList::new();
        apply_format_descriptors(&mut attrs, &formats, &map, &mut messages);
        assert!(attrs[4].data_descriptor.is_none());
        let msg = messages.iter().next().unwrap();
        assert_eq!(msg.context, "data format descriptor overlaps code at +000005");
    }

    #[test]
    fn test_remove_hidden_labels() {
        let attrs = attrs();
        let mut labels = BTreeMap::new();
        labels.insert(0, user("START", 0x1000));
        labels.insert(1, user("MID", 0x1001));
        let mut table = SymbolTable::new();
        for sym in labels.values() {
            table.add(sym.clone());
        }
        let mut messages = MessageList::new();
        remove_hidden_labels(&attrs, &labels, &mut table, &mut messages);
        assert!(table.contains("START"));
        assert!(!table.contains("MID"));
        assert_eq!(labels.len(), 2);
        assert_eq!(messages.count_of(MessageKind::HiddenLabel), 1);
    }
}
