//! Post-load repair of deserialized project tables.
//!
//! Per-offset entries that fall outside the file are dropped. Older projects
//! stored character data with a generic "ASCII" sub-type that didn't say
//! whether the high bit was set; that's resolved here by looking at the file
//! bytes. Descriptors with impossible lengths and strings whose structure
//! doesn't match the data are dropped.

use crate::core::format_descriptor::{
    verify_string_data, FormatDescriptor, FormatSubType, FormatType, MAX_NUMERIC_LEN,
};
use crate::core::report::{FileLoadItemKind, FileLoadReport};
use crate::project::DisasmProject;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Remove every entry at or past `file_len`, with a report line for each.
fn drop_past_end<T>(
    map: &mut BTreeMap<usize, T>,
    file_len: usize,
    what: &str,
    report: &mut FileLoadReport,
) {
    let tail = map.split_off(&file_len);
    for offset in tail.keys() {
        warn!(offset, what, "Entry past end of file");
        report.add(
            FileLoadItemKind::Warning,
            format!("+{offset:06x}: {what} past end of file, removing"),
        );
    }
}

/// Pick Ascii or HighAscii for a legacy generic descriptor.
fn refine_generic_ascii(data: &[u8], offset: usize, dfd: &FormatDescriptor) -> FormatSubType {
    let len = dfd.length();
    let sample = if dfd.is_string() {
        match dfd.format_type {
            FormatType::StringL8 => offset + 1,
            FormatType::StringL16 => offset + 2,
            _ => offset,
        }
    } else if dfd.format_type == FormatType::NumericBE {
        offset + len.saturating_sub(1)
    } else if len < 2 || data.get(offset + 1) == Some(&0) {
        offset
    } else {
        offset + 1
    };
    match data.get(sample) {
        Some(&b) if b >= 0x80 => FormatSubType::HighAscii,
        _ => FormatSubType::Ascii,
    }
}

impl DisasmProject {
    /// Drop entries that don't fit the file, resolve legacy sub-types and
    /// discard malformed formats. Problems are returned as report items,
    /// never as errors.
    pub fn fix_and_validate(&mut self) -> FileLoadReport {
        let _span = crate::span_trace!("fix_and_validate").entered();
        let mut report = FileLoadReport::new(&self.image.name);
        let data = self.image.data();
        let mut refined = 0usize;

        let tables = &mut self.tables;
        let len = data.len();
        drop_past_end(&mut tables.user_labels, len, "label", &mut report);
        drop_past_end(&mut tables.comments, len, "comment", &mut report);
        drop_past_end(&mut tables.long_comments, len, "long comment", &mut report);
        drop_past_end(&mut tables.notes, len, "note", &mut report);
        drop_past_end(&mut tables.lv_tables, len, "local variable table", &mut report);
        drop_past_end(&mut tables.status_overrides, len, "status flag override", &mut report);
        drop_past_end(&mut tables.misc_flags, len, "misc flags", &mut report);
        let stray_tags: Vec<usize> = tables
            .analyzer_tags
            .iter()
            .map(|(offset, _)| offset)
            .filter(|&offset| offset >= len)
            .collect();
        for offset in stray_tags {
            tables.analyzer_tags.remove(offset);
            warn!(offset, "Analyzer tag past end of file");
            report.add(
                FileLoadItemKind::Warning,
                format!("+{offset:06x}: analyzer tag past end of file, removing"),
            );
        }

        tables.operand_formats.retain(|&offset, dfd| {
            let bad_len = dfd.length() == 0
                || (dfd.is_numeric() && dfd.length() > MAX_NUMERIC_LEN);
            if bad_len {
                warn!(offset, len = dfd.length(), "Bad format length");
                report.add(
                    FileLoadItemKind::Warning,
                    format!("+{offset:06x}: bad format length {}, removing", dfd.length()),
                );
                return false;
            }
            if offset + dfd.length() > data.len() {
                let msg = format!("+{offset:06x}: format runs past end of file, removing");
                warn!(offset, "Format runs past end of file");
                report.add(FileLoadItemKind::Warning, msg);
                return false;
            }
            if dfd.sub_type == FormatSubType::AsciiGeneric {
                *dfd = dfd.with_sub_type(refine_generic_ascii(data, offset, dfd));
                refined += 1;
            }
            if dfd.is_string() {
                if let Err(problem) = verify_string_data(data, offset, dfd.length(), dfd.format_type) {
                    warn!(offset, problem, "Removing malformed string descriptor");
                    report.add(
                        FileLoadItemKind::Warning,
                        format!("+{offset:06x}: {problem}, removing format"),
                    );
                    return false;
                }
            }
            true
        });

        debug!(refined, "Format table repaired");
        report
    }
}
