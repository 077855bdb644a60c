//! Volume geometry derived from the boot sector

use super::boot_sector::{BootSector, ExtendedInfo, FatType};
use super::constants::*;

/// Byte-level layout of a FAT volume, computed once per open volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsGeometry {
    /// Variant guessed from the boot sector
    pub fat_type: FatType,

    /// Whether the boot sector uses the FAT32 layout
    pub is_fat32: bool,

    /// Media descriptor the first FAT byte must repeat
    pub media_type: u8,

    /// Size of each cluster in bytes
    pub bytes_per_cluster: u32,

    /// Byte offset of the first FAT
    pub fat_table_offset: u64,

    /// Byte offset of the root directory (first data cluster on FAT32)
    pub root_directory_offset: u64,

    /// Capacity of the legacy root directory (0 on FAT32)
    pub max_root_entries: u16,

    /// First cluster of the FAT32 root directory
    pub root_cluster: u32,
}

impl FsGeometry {
    pub fn derive(boot: &BootSector, ext: &ExtendedInfo) -> FsGeometry {
        let bytes_per_sector = boot.bytes_per_sector as u64;
        let fat_size_bytes = match ext.sectors_per_fat_32() {
            Some(sectors) => sectors as u64 * bytes_per_sector,
            None => boot.sectors_per_fat as u64 * bytes_per_sector,
        };
        let fat_table_offset = bytes_per_sector * boot.reserved_sectors as u64;

        FsGeometry {
            fat_type: boot.guessed_type(),
            is_fat32: boot.is_fat32(),
            media_type: boot.media_type,
            bytes_per_cluster: boot.bytes_per_sector as u32 * boot.sectors_per_cluster as u32,
            fat_table_offset,
            root_directory_offset: fat_table_offset + fat_size_bytes * boot.fat_count as u64,
            max_root_entries: boot.root_dir_entries,
            root_cluster: ext.root_cluster().unwrap_or(ROOT_DIR_SENTINEL_CLUSTER),
        }
    }

    /// Size in bytes of the legacy root directory area
    pub fn root_dir_span(&self) -> u64 {
        if self.is_fat32 {
            0
        } else {
            self.max_root_entries as u64 * DIR_ENTRY_SIZE as u64
        }
    }

    /// Number of readable bytes behind `cluster`
    ///
    /// Clusters 0 and 1 address the fixed root area on FAT12/16.
    pub fn bytes_for_cluster(&self, cluster: u32) -> u32 {
        if self.is_fat32 || cluster >= FIRST_DATA_CLUSTER {
            self.bytes_per_cluster
        } else {
            self.max_root_entries as u32 * DIR_ENTRY_SIZE
        }
    }

    /// Absolute byte offset of `intra_offset` within `cluster`
    pub fn cluster_offset(&self, cluster: u32, intra_offset: u32) -> u64 {
        let base = if cluster >= FIRST_DATA_CLUSTER {
            self.root_directory_offset
                + self.root_dir_span()
                + (cluster - FIRST_DATA_CLUSTER) as u64 * self.bytes_per_cluster as u64
        } else {
            self.root_directory_offset
        };
        base + intra_offset as u64
    }

    /// Smallest FAT value that ends a chain for this variant
    pub fn end_of_chain(&self) -> u32 {
        match self.fat_type {
            FatType::Fat12 => FAT12_END_OF_CHAIN,
            FatType::Fat16 => FAT16_END_OF_CHAIN,
            FatType::Fat32 | FatType::Unsupported => FAT32_END_OF_CHAIN,
        }
    }

    pub fn is_end_of_chain(&self, value: u32) -> bool {
        value >= self.end_of_chain()
    }
}
