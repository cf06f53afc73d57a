//! Platform symbol files.
//!
//! A platform file defines addresses and constants for a target system, one
//! per line:
//!
//! ```text
//! NAME {@,=,<,>} VALUE [WIDTH] [;COMMENT]
//! ```
//!
//! `@` is a read/write address, `<` read-only, `>` write-only, `=` a
//! constant. An address of `ERASE` removes a symbol defined by an earlier
//! file. `*TAG` lines set a grouping tag for the symbols that follow.

use crate::core::def_symbol::{DefSymbol, DirectionFlags, MAX_WIDTH, MIN_WIDTH};
use crate::core::format_descriptor::FormatSubType;
use crate::core::report::{FileLoadItemKind, FileLoadReport};
use crate::core::symbol::{SymbolSource, SymbolType};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

pub const FILENAME_EXT: &str = ".sym65";

const ERASE_VALUE: &str = "ERASE";
const TAG_CMD: &str = "*TAG";

/// Groups: name, type/direction, value, width, comment.
static SYMBOL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]+)\s*([@=<>])\s*([^\s;]+)\s*([^\s;]+)?\s*(;.*)?$")
        .unwrap_or_else(|e| panic!("bad symbol regex: {e}"))
});

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEntry {
    Define(DefSymbol),
    /// Remove a same-named symbol defined by an earlier file
    Erase(String),
}

impl PlatformEntry {
    pub fn label(&self) -> &str {
        match self {
            PlatformEntry::Define(def) => def.label(),
            PlatformEntry::Erase(label) => label,
        }
    }
}

/// Symbols from one platform file, in label order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformSymbolList {
    pub file_ident: String,
    pub load_ordinal: usize,
    entries: BTreeMap<String, PlatformEntry>,
}

impl PlatformSymbolList {
    pub fn new(file_ident: &str, load_ordinal: usize) -> Self {
        Self {
            file_ident: file_ident.to_string(),
            load_ordinal,
            entries: BTreeMap::new(),
        }
    }

    /// Add an entry. A later definition of the same label replaces the earlier.
    pub fn push(&mut self, entry: PlatformEntry) {
        let label = entry.label().to_string();
        if self.entries.contains_key(&label) {
            debug!(label = %label, file = %self.file_ident, "Stomping previous definition");
        }
        self.entries.insert(label, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&PlatformEntry> {
        self.entries.get(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformEntry> + '_ {
        self.entries.values()
    }

    /// Parse file contents. Problems are recorded in `report`; bad lines are
    /// skipped.
    pub fn parse(
        text: &str,
        file_ident: &str,
        load_ordinal: usize,
        report: &mut FileLoadReport,
    ) -> Self {
        let mut list = Self::new(file_ident, load_ordinal);
        let mut tag = String::new();

        for (idx, line) in text.lines().enumerate() {
            let line_num = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') {
                continue;
            }
            if line.starts_with('*') {
                if let Some(rest) = line.strip_prefix(TAG_CMD) {
                    tag = rest.trim().to_string();
                } else {
                    debug!(line = line_num, "Ignoring command");
                }
                continue;
            }
            let Some(caps) = SYMBOL_REGEX.captures(line) else {
                report.add_line(line_num, FileLoadItemKind::Warning, "syntax error");
                continue;
            };
            match parse_definition(&caps, &tag, file_ident, load_ordinal) {
                Ok(entry) => list.push(entry),
                Err(msg) => report.add_line(line_num, FileLoadItemKind::Warning, msg),
            }
        }
        list
    }

    /// Load and parse a file. A file that can't be read yields an empty list
    /// and an error in the report.
    pub fn load_from_file(
        path: &Path,
        file_ident: &str,
        load_ordinal: usize,
    ) -> (Self, FileLoadReport) {
        let mut report = FileLoadReport::new(file_ident);
        let text = match std::fs::read_to_string(path)
            .with_context(|| format!("unable to read platform symbol file {}", path.display()))
        {
            Ok(text) => text,
            Err(err) => {
                warn!(file = %file_ident, error = %format!("{err:#}"), "Platform symbol load failed");
                report.add(FileLoadItemKind::Error, format!("{err:#}"));
                return (Self::new(file_ident, load_ordinal), report);
            }
        };
        let list = Self::parse(&text, file_ident, load_ordinal, &mut report);
        debug!(file = %file_ident, count = list.len(), "Loaded platform symbols");
        (list, report)
    }
}

fn parse_definition(
    caps: &regex::Captures<'_>,
    tag: &str,
    file_ident: &str,
    load_ordinal: usize,
) -> Result<PlatformEntry, &'static str> {
    let label = &caps[1];
    let type_char = &caps[2];
    let value_str = &caps[3];
    let is_const = type_char == "=";
    let direction = match type_char {
        "<" => DirectionFlags::READ,
        ">" => DirectionFlags::WRITE,
        _ => DirectionFlags::READ_WRITE,
    };

    let (value, sub_type) = if is_const {
        parse_number(value_str).ok_or("invalid numeric constant")?
    } else if value_str.eq_ignore_ascii_case(ERASE_VALUE) {
        return Ok(PlatformEntry::Erase(label.to_string()));
    } else {
        let addr = parse_address(value_str).ok_or("invalid address")?;
        (addr, FormatSubType::Hex)
    };

    let width = match caps.get(4) {
        Some(m) => {
            let (w, _) = parse_number(m.as_str()).ok_or("invalid numeric constant")?;
            let w = usize::try_from(w).map_err(|_| "invalid width")?;
            if !(MIN_WIDTH..=MAX_WIDTH).contains(&w) {
                return Err("invalid width");
            }
            Some(w)
        }
        None => None,
    };

    let comment = caps
        .get(5)
        .map(|m| m.as_str().trim_start_matches(';'))
        .unwrap_or("");
    let mut def = DefSymbol::with_width(
        label,
        value,
        SymbolSource::Platform,
        if is_const {
            SymbolType::Constant
        } else {
            SymbolType::ExternalAddr
        },
        sub_type,
        width,
        comment,
        direction,
    );
    def.tag = tag.to_string();
    def.load_ordinal = load_ordinal;
    def.file_ident = file_ident.to_string();
    Ok(PlatformEntry::Define(def))
}

/// Parse `$hex`, `0xhex`, `%binary` or decimal. Returns the value and the
/// sub-type matching the base it was written in.
pub fn parse_number(text: &str) -> Option<(i32, FormatSubType)> {
    let (neg, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (radix, digits, sub_type) = if let Some(hex) = body.strip_prefix('$') {
        (16, hex, FormatSubType::Hex)
    } else if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (16, hex, FormatSubType::Hex)
    } else if let Some(bin) = body.strip_prefix('%') {
        (2, bin, FormatSubType::Binary)
    } else {
        (10, body, FormatSubType::Decimal)
    };
    let value = i64::from_str_radix(digits, radix).ok()?;
    let value = if neg { -value } else { value };
    let value = i32::try_from(value).ok()?;
    Some((value, sub_type))
}

/// Parse a hex address, optionally with a leading `$` and a `BB/` bank prefix.
/// Limited to 24 bits.
pub fn parse_address(text: &str) -> Option<i32> {
    let text = text.strip_prefix('$').unwrap_or(text);
    let value = match text.split_once('/') {
        Some((bank, addr)) => {
            let bank = u32::from_str_radix(bank, 16).ok()?;
            let addr = u32::from_str_radix(addr, 16).ok()?;
            if bank > 0xff || addr > 0xffff {
                return None;
            }
            (bank << 16) | addr
        }
        None => u32::from_str_radix(text, 16).ok()?,
    };
    (value < 0x0100_0000).then_some(value as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
; Apple II monitor
*SYNOPSIS ignored
*TAG monitor
COUT    @ $FDED     ;char out
KBD     < C000 16
KBDSTRB > $C010
MAXLEN  = 40
BITS    = %1010
BAD     @ ZZZZ
WIDE    @ $2000 70000
what is this
";

    #[test]
    fn test_parse_sample() {
        let mut report = FileLoadReport::new("a2.sym65");
        let list = PlatformSymbolList::parse(SAMPLE, "a2.sym65", 3, &mut report);
        assert_eq!(list.len(), 5);

        let Some(PlatformEntry::Define(cout)) = list.get("COUT") else {
            panic!("COUT missing");
        };
        assert_eq!(cout.value(), 0xfded);
        assert_eq!(cout.comment, "char out");
        assert_eq!(cout.tag, "monitor");
        assert_eq!(cout.load_ordinal, 3);
        assert_eq!(cout.symbol.source, SymbolSource::Platform);

        let Some(PlatformEntry::Define(kbd)) = list.get("KBD") else {
            panic!("KBD missing");
        };
        assert_eq!(kbd.direction, DirectionFlags::READ);
        assert_eq!(kbd.width(), 16);

        let Some(PlatformEntry::Define(max)) = list.get("MAXLEN") else {
            panic!("MAXLEN missing");
        };
        assert!(max.symbol.is_constant());
        assert_eq!(max.data_descriptor.sub_type, FormatSubType::Decimal);

        // three bad lines: bad address, bad width, syntax
        assert_eq!(report.len(), 3);
        assert!(report.has_warnings());
        assert!(!report.has_errors());
        let lines: Vec<Option<usize>> = report.iter().map(|i| i.line).collect();
        assert_eq!(lines, vec![Some(9), Some(10), Some(11)]);
    }

    #[test]
    fn test_erase_entry() {
        let mut report = FileLoadReport::new("x");
        let list = PlatformSymbolList::parse("COUT @ ERASE\n", "x", 0, &mut report);
        assert_eq!(list.get("COUT"), Some(&PlatformEntry::Erase("COUT".to_string())));
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_number("$ff"), Some((255, FormatSubType::Hex)));
        assert_eq!(parse_number("0x10"), Some((16, FormatSubType::Hex)));
        assert_eq!(parse_number("%101"), Some((5, FormatSubType::Binary)));
        assert_eq!(parse_number("-3"), Some((-3, FormatSubType::Decimal)));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_address("e1/0010"), Some(0xe10010));
        assert_eq!(parse_address("$C000"), Some(0xc000));
        assert_eq!(parse_address("1000000"), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "HOME @ $FC58").unwrap();
        let (list, report) = PlatformSymbolList::load_from_file(file.path(), "home.sym65", 0);
        assert!(report.is_empty());
        assert_eq!(list.len(), 1);

        let (list, report) =
            PlatformSymbolList::load_from_file(Path::new("/nonexistent/x.sym65"), "x.sym65", 1);
        assert!(list.is_empty());
        assert!(report.has_errors());
    }
}
