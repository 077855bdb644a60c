//! File allocation table entries

use super::constants::*;
use super::geometry::FsGeometry;

/// Meaning of a FAT entry value for the variant in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    /// Cluster is unused
    Free,
    /// Reserved value or bad-cluster marker
    Reserved,
    /// Next cluster of the chain
    Next(u32),
    /// Last cluster of the chain
    EndOfChain,
}

impl FatEntry {
    pub fn classify(value: u32, geometry: &FsGeometry) -> FatEntry {
        let end_of_chain = geometry.end_of_chain();
        match value {
            0 => FatEntry::Free,
            v if v >= end_of_chain => FatEntry::EndOfChain,
            v if v < FIRST_DATA_CLUSTER || v == end_of_chain - 1 => FatEntry::Reserved,
            v => FatEntry::Next(v),
        }
    }

    /// Returns true if this entry marks the end of a cluster chain
    pub fn is_end_of_chain(&self) -> bool {
        matches!(self, FatEntry::EndOfChain)
    }

    /// Returns true if this cluster is unused/free
    pub fn is_free(&self) -> bool {
        matches!(self, FatEntry::Free)
    }

    pub fn next(&self) -> Option<u32> {
        match self {
            FatEntry::Next(cluster) => Some(*cluster),
            _ => None,
        }
    }
}

/// Byte offset of entry `index` relative to the start of a FAT12 table
pub fn fat12_byte_offset(index: u32) -> u64 {
    index as u64 * 3 / 2
}

/// Extracts entry `index` from the two bytes read at [`fat12_byte_offset`]
///
/// Even entries own the low 12 bits, odd entries the high 12 bits.
pub fn unpack_fat12(raw: u16, index: u32) -> u32 {
    if index % 2 == 0 {
        (raw & FAT12_ENTRY_MASK) as u32
    } else {
        (raw >> 4) as u32
    }
}
