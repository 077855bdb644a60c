//! FAT on-disk constants

/// Size of a directory record (short entry or long-name fragment) in bytes
pub const DIR_ENTRY_SIZE: u32 = 32;

/// Length of the fixed 8.3 short name field
pub const SHORT_NAME_LENGTH: usize = 11;

/// Length of the name part of a short name
pub const SHORT_NAME_BASE_LENGTH: usize = 8;

/// First name byte of a deleted directory record
pub const DELETED_ENTRY_MARKER: u8 = 0xE5;

/// First name byte standing in for a real leading 0xE5 (Kanji lead byte)
pub const KANJI_ESCAPE_MARKER: u8 = 0x05;

/// First name byte of the record that ends a directory
pub const END_OF_DIRECTORY_MARKER: u8 = 0x00;

/// Path separator used by [`super::FatVolume::resolve`]
pub const PATH_SEPARATOR: char = '\\';
/// Path naming the root directory
pub const ROOT_PATH: &str = "\\";

/// Jump instruction opcodes checked in the boot sector (`EB xx 90`)
pub const JUMP_OPCODE: u8 = 0xEB;
pub const JUMP_NOP: u8 = 0x90;

/// Cluster-count thresholds of the variant heuristic
pub const FAT12_MAX_CLUSTERS: u32 = 4084;
pub const FAT16_MAX_CLUSTERS: u32 = 65524;

/// Minimum FAT values marking the end of a cluster chain
pub const FAT12_END_OF_CHAIN: u32 = 0x0FF8;
pub const FAT16_END_OF_CHAIN: u32 = 0xFFF8;
pub const FAT32_END_OF_CHAIN: u32 = 0x0FFF_FFF8;

/// FAT32 entries only use the low 28 bits
pub const FAT32_ENTRY_MASK: u32 = 0x0FFF_FFFF;

/// FAT12 entries are 12 bits wide
pub const FAT12_ENTRY_MASK: u16 = 0x0FFF;

/// Sentinel cluster number of the legacy FAT12/16 root directory area
pub const ROOT_DIR_SENTINEL_CLUSTER: u32 = 1;

/// First cluster number of the data region
pub const FIRST_DATA_CLUSTER: u32 = 2;

/// Long-name fragment layout
pub const LFN_ORDINAL_MASK: u8 = 0x1F;
pub const LFN_LAST_FRAGMENT: u8 = 0x40;
pub const LFN_UNITS_PER_FRAGMENT: usize = 13;

/// A 255 character name needs at most 20 fragments
pub const LFN_MAX_FRAGMENTS: usize = 20;
