//! File offset to target address mapping.
//!
//! The map is a list of entries, each starting a region at a file offset and
//! extending to the next entry (or the end of the file). An entry at offset
//! zero always exists, so every byte belongs to exactly one region.

use crate::error::{DisasmError, Result};
use serde::{Deserialize, Serialize};

/// Highest address representable on the 65816.
pub const MAX_ADDRESS: i32 = 0x00ff_ffff;

/// One region start in the address map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressMapEntry {
    /// File offset where the region starts
    pub offset: usize,
    /// Load address of the first byte, or `None` for non-addressable data
    pub address: Option<i32>,
    /// Optional label that names the region's load address
    pub pre_label: String,
    /// Emit the region start relative to the previous one
    pub is_relative: bool,
}

impl AddressMapEntry {
    pub fn new(offset: usize, address: Option<i32>) -> Self {
        Self {
            offset,
            address,
            pre_label: String::new(),
            is_relative: false,
        }
    }

    pub fn with_pre_label(mut self, label: &str) -> Self {
        self.pre_label = label.to_string();
        self
    }
}

/// A resolved region: an entry plus its computed length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRegion {
    pub offset: usize,
    pub length: usize,
    pub address: Option<i32>,
    pub pre_label: String,
    pub is_relative: bool,
}

impl AddressRegion {
    /// Pre-labels are only usable on addressable regions.
    pub fn has_valid_pre_label(&self) -> bool {
        !self.pre_label.is_empty() && self.address.is_some()
    }

    fn offset_for_address(&self, addr: i32) -> Option<usize> {
        let base = self.address?;
        if addr < base {
            return None;
        }
        let delta = (addr - base) as usize;
        (delta < self.length).then_some(self.offset + delta)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMap {
    file_len: usize,
    entries: Vec<AddressMapEntry>,
}

impl AddressMap {
    /// Create a map with a single region covering the whole file.
    pub fn new(file_len: usize, load_address: i32) -> Self {
        Self {
            file_len,
            entries: vec![AddressMapEntry::new(0, Some(load_address))],
        }
    }

    pub fn file_len(&self) -> usize {
        self.file_len
    }

    pub fn entries(&self) -> &[AddressMapEntry] {
        &self.entries
    }

    pub fn entry_at(&self, offset: usize) -> Option<&AddressMapEntry> {
        self.entries
            .binary_search_by_key(&offset, |e| e.offset)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Add a region start. Fails if the offset is outside the file or an entry
    /// already exists there.
    pub fn add_entry(&mut self, entry: AddressMapEntry) -> Result<()> {
        if entry.offset >= self.file_len {
            return Err(DisasmError::InvalidOffset {
                offset: entry.offset,
                len: 0,
            });
        }
        if let Some(addr) = entry.address {
            if !(0..=MAX_ADDRESS).contains(&addr) {
                return Err(DisasmError::InvalidInput(format!(
                    "address ${addr:x} out of range"
                )));
            }
        }
        match self.entries.binary_search_by_key(&entry.offset, |e| e.offset) {
            Ok(_) => Err(DisasmError::InvalidInput(format!(
                "address map entry already exists at +{:06x}",
                entry.offset
            ))),
            Err(idx) => {
                self.entries.insert(idx, entry);
                Ok(())
            }
        }
    }

    /// Remove the region start at `offset`. The entry at offset zero can't be
    /// removed.
    pub fn remove_entry(&mut self, offset: usize) -> Result<AddressMapEntry> {
        if offset == 0 {
            return Err(DisasmError::InvalidInput(
                "can't remove the initial address map entry".to_string(),
            ));
        }
        match self.entries.binary_search_by_key(&offset, |e| e.offset) {
            Ok(idx) => Ok(self.entries.remove(idx)),
            Err(_) => Err(DisasmError::InvalidOffset { offset, len: 0 }),
        }
    }

    /// Replace the entry at offset zero (or any existing entry) in place.
    pub fn replace_entry(&mut self, entry: AddressMapEntry) -> Result<AddressMapEntry> {
        match self.entries.binary_search_by_key(&entry.offset, |e| e.offset) {
            Ok(idx) => Ok(std::mem::replace(&mut self.entries[idx], entry)),
            Err(_) => Err(DisasmError::InvalidOffset {
                offset: entry.offset,
                len: 0,
            }),
        }
    }

    /// All regions with their lengths resolved.
    pub fn regions(&self) -> impl Iterator<Item = AddressRegion> + '_ {
        self.entries.iter().enumerate().map(move |(idx, ent)| {
            let end = self
                .entries
                .get(idx + 1)
                .map(|next| next.offset)
                .unwrap_or(self.file_len);
            AddressRegion {
                offset: ent.offset,
                length: end - ent.offset,
                address: ent.address,
                pre_label: ent.pre_label.clone(),
                is_relative: ent.is_relative,
            }
        })
    }

    fn region_index(&self, offset: usize) -> usize {
        match self.entries.binary_search_by_key(&offset, |e| e.offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    fn region_for_offset(&self, offset: usize) -> Option<AddressRegion> {
        if offset >= self.file_len {
            return None;
        }
        self.regions().nth(self.region_index(offset))
    }

    /// Translate a file offset to an address. Returns `None` for offsets in
    /// non-addressable regions or past the end of the file.
    pub fn offset_to_address(&self, offset: usize) -> Option<i32> {
        if offset >= self.file_len {
            return None;
        }
        let ent = &self.entries[self.region_index(offset)];
        ent.address.map(|base| base + (offset - ent.offset) as i32)
    }

    /// Translate an address to a file offset, as seen from `src_offset`.
    ///
    /// The region containing the source is checked first, so code that refers
    /// to its own region resolves locally even when another region overlaps
    /// the same address range.
    pub fn address_to_offset(&self, src_offset: usize, addr: i32) -> Option<usize> {
        if let Some(region) = self.region_for_offset(src_offset) {
            if let Some(off) = region.offset_for_address(addr) {
                return Some(off);
            }
        }
        self.regions().find_map(|r| r.offset_for_address(addr))
    }

    /// True if `[offset, offset + len)` lies entirely within one region.
    pub fn is_range_unbroken(&self, offset: usize, len: usize) -> bool {
        if len == 0 || offset + len > self.file_len {
            return false;
        }
        self.region_index(offset) == self.region_index(offset + len - 1)
    }

    /// True if `offset` is the first byte of a region.
    pub fn is_region_start(&self, offset: usize) -> bool {
        self.entry_at(offset).is_some()
    }

    /// Regions whose first and last addresses fall in different 64K banks.
    /// Returns (region, offset of first byte in the next bank).
    pub fn bank_overruns(&self) -> Vec<(AddressRegion, usize)> {
        self.regions()
            .filter_map(|r| {
                let addr = r.address?;
                let last = addr + r.length as i32 - 1;
                if (addr & 0xff_0000) == (last & 0xff_0000) {
                    return None;
                }
                let first_next = (addr & 0xff_0000) + 0x01_0000;
                let bad_offset = r.offset + (first_next - addr) as usize;
                Some((r, bad_offset))
            })
            .collect()
    }
}
