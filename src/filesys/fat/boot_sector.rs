//! FAT boot sector and BIOS parameter block extension

use super::constants::*;
use crate::filesys::Structure;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};

/// FAT variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
    Unsupported,
}

impl FatType {
    pub fn name(&self) -> &'static str {
        match self {
            FatType::Fat12 => "FAT12",
            FatType::Fat16 => "FAT16",
            FatType::Fat32 => "FAT32",
            FatType::Unsupported => "unsupported",
        }
    }
}

/// Common header of every FAT boot sector: jump code, OEM name and the BPB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootSector {
    /// Jump instruction to boot code
    pub jump_boot: [u8; 3],

    /// Name of the system that formatted the volume
    pub oem_name: [u8; 8],

    /// Number of bytes per sector
    pub bytes_per_sector: u16,

    /// Number of sectors per cluster
    pub sectors_per_cluster: u8,

    /// Number of reserved sectors at start of volume, boot sector included
    pub reserved_sectors: u16,

    /// Number of FAT copies
    pub fat_count: u8,

    /// Maximum number of root directory entries (0 on FAT32)
    pub root_dir_entries: u16,

    /// Total number of sectors (16-bit), 0 when `total_sectors_32` is used
    pub total_sectors_16: u16,

    /// Media type descriptor, repeated in the first byte of the FAT
    pub media_type: u8,

    /// Sectors per FAT (16-bit), 0 on FAT32
    pub sectors_per_fat: u16,

    /// Sectors per track for interrupt 0x13
    pub sectors_per_track: u16,

    /// Number of heads for interrupt 0x13
    pub head_count: u16,

    /// Number of hidden sectors preceding the partition
    pub hidden_sectors: u32,

    /// Total number of sectors (32-bit)
    pub total_sectors_32: u32,
}

impl Structure for BootSector {
    const SIZE: usize = 36;

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut jump_boot = [0u8; 3];
        reader.read_exact(&mut jump_boot)?;
        let mut oem_name = [0u8; 8];
        reader.read_exact(&mut oem_name)?;

        Ok(BootSector {
            jump_boot,
            oem_name,
            bytes_per_sector: reader.read_u16::<LittleEndian>()?,
            sectors_per_cluster: reader.read_u8()?,
            reserved_sectors: reader.read_u16::<LittleEndian>()?,
            fat_count: reader.read_u8()?,
            root_dir_entries: reader.read_u16::<LittleEndian>()?,
            total_sectors_16: reader.read_u16::<LittleEndian>()?,
            media_type: reader.read_u8()?,
            sectors_per_fat: reader.read_u16::<LittleEndian>()?,
            sectors_per_track: reader.read_u16::<LittleEndian>()?,
            head_count: reader.read_u16::<LittleEndian>()?,
            hidden_sectors: reader.read_u32::<LittleEndian>()?,
            total_sectors_32: reader.read_u32::<LittleEndian>()?,
        })
    }
}

impl BootSector {
    /// Returns true if the jump code has the `EB xx 90` shape
    pub fn is_valid(&self) -> bool {
        self.jump_boot[0] == JUMP_OPCODE && self.jump_boot[2] == JUMP_NOP
    }

    /// Returns true if the 16-bit FAT size is zero, which signals FAT32 layout
    pub fn is_fat32(&self) -> bool {
        self.sectors_per_fat == 0
    }

    pub fn oem_name(&self) -> String {
        ascii_field(&self.oem_name)
    }

    /// Authoritative sector count: the 16-bit field if set, else the 32-bit one
    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 != 0 {
            self.total_sectors_16 as u32
        } else {
            self.total_sectors_32
        }
    }

    /// Sectors occupied by the legacy root directory, rounded up
    pub fn root_dir_sectors(&self) -> u32 {
        if self.bytes_per_sector == 0 {
            return 0;
        }
        (self.root_dir_entries as u32 * DIR_ENTRY_SIZE).div_ceil(self.bytes_per_sector as u32)
    }

    /// Cluster count used by the variant heuristic
    ///
    /// The root directory sectors are added, not subtracted. Existing
    /// classifications depend on this exact arithmetic.
    pub fn cluster_count(&self) -> u64 {
        if self.sectors_per_cluster == 0 {
            return 0;
        }
        let fat_sectors =
            self.reserved_sectors as u64 + self.fat_count as u64 * self.sectors_per_fat as u64;
        let data_sectors = (self.total_sectors() as u64).saturating_sub(fat_sectors)
            + self.root_dir_sectors() as u64;
        data_sectors / self.sectors_per_cluster as u64
    }

    /// Classifies the FAT variant from the cluster count
    pub fn guessed_type(&self) -> FatType {
        if !self.is_valid() || self.bytes_per_sector == 0 || self.sectors_per_cluster == 0 {
            return FatType::Unsupported;
        }
        if self.is_fat32() {
            return FatType::Fat32;
        }

        match self.cluster_count() {
            count if count <= FAT12_MAX_CLUSTERS as u64 => FatType::Fat12,
            count if count <= FAT16_MAX_CLUSTERS as u64 => FatType::Fat16,
            _ => FatType::Fat32,
        }
    }
}

/// Extended boot record fields shared by all variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BpbExtension {
    /// INT 13h drive number
    pub drive_number: u8,

    pub reserved1: u8,

    /// Extended boot signature
    pub boot_signature: u8,

    /// Volume serial number
    pub volume_id: u32,

    pub volume_label: [u8; 11],

    /// Filesystem type tag, e.g. `"FAT16   "`
    pub fs_type: [u8; 8],
}

impl Structure for BpbExtension {
    const SIZE: usize = 26;

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let drive_number = reader.read_u8()?;
        let reserved1 = reader.read_u8()?;
        let boot_signature = reader.read_u8()?;
        let volume_id = reader.read_u32::<LittleEndian>()?;
        let mut volume_label = [0u8; 11];
        reader.read_exact(&mut volume_label)?;
        let mut fs_type = [0u8; 8];
        reader.read_exact(&mut fs_type)?;

        Ok(BpbExtension {
            drive_number,
            reserved1,
            boot_signature,
            volume_id,
            volume_label,
            fs_type,
        })
    }
}

/// FAT32 extended BPB; its own fields precede the shared ones on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fat32Extension {
    /// Sectors per FAT (32-bit)
    pub sectors_per_fat_32: u32,

    pub ext_flags: u16,

    pub fs_version: u16,

    /// First cluster of the root directory
    pub root_cluster: u32,

    /// Sector of the FSInfo structure
    pub fs_info_sector: u16,

    /// Sector of the backup boot sector
    pub backup_boot_sector: u16,

    pub reserved: [u8; 12],

    pub common: BpbExtension,
}

impl Structure for Fat32Extension {
    const SIZE: usize = 28 + BpbExtension::SIZE;

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let sectors_per_fat_32 = reader.read_u32::<LittleEndian>()?;
        let ext_flags = reader.read_u16::<LittleEndian>()?;
        let fs_version = reader.read_u16::<LittleEndian>()?;
        let root_cluster = reader.read_u32::<LittleEndian>()?;
        let fs_info_sector = reader.read_u16::<LittleEndian>()?;
        let backup_boot_sector = reader.read_u16::<LittleEndian>()?;
        let mut reserved = [0u8; 12];
        reader.read_exact(&mut reserved)?;

        Ok(Fat32Extension {
            sectors_per_fat_32,
            ext_flags,
            fs_version,
            root_cluster,
            fs_info_sector,
            backup_boot_sector,
            reserved,
            common: BpbExtension::read_from(reader)?,
        })
    }
}

/// BPB extension block following the common header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendedInfo {
    Fat16(BpbExtension),
    Fat32(Fat32Extension),
}

impl ExtendedInfo {
    /// Reads the extension layout that matches `boot`, directly after its header
    pub fn read_for<R: Read>(boot: &BootSector, reader: &mut R) -> io::Result<Self> {
        if boot.is_fat32() {
            Ok(ExtendedInfo::Fat32(Fat32Extension::read_from(reader)?))
        } else {
            Ok(ExtendedInfo::Fat16(BpbExtension::read_from(reader)?))
        }
    }

    pub fn common(&self) -> &BpbExtension {
        match self {
            ExtendedInfo::Fat16(ext) => ext,
            ExtendedInfo::Fat32(ext) => &ext.common,
        }
    }

    pub fn volume_label(&self) -> String {
        ascii_field(&self.common().volume_label)
    }

    pub fn fs_type(&self) -> String {
        ascii_field(&self.common().fs_type)
    }

    pub fn volume_id(&self) -> u32 {
        self.common().volume_id
    }

    pub fn sectors_per_fat_32(&self) -> Option<u32> {
        match self {
            ExtendedInfo::Fat32(ext) => Some(ext.sectors_per_fat_32),
            ExtendedInfo::Fat16(_) => None,
        }
    }

    pub fn root_cluster(&self) -> Option<u32> {
        match self {
            ExtendedInfo::Fat32(ext) => Some(ext.root_cluster),
            ExtendedInfo::Fat16(_) => None,
        }
    }
}

/// Decodes a space-padded single-byte text field
pub(crate) fn ascii_field(bytes: &[u8]) -> String {
    let text: String = bytes.iter().map(|&b| b as char).collect();
    text.trim_end_matches([' ', '\0']).to_string()
}
