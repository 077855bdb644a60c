//! FAT directory records

use super::constants::*;
use super::lfn::LongNameFragment;
use crate::filesys::Structure;
use bitflags::bitflags;
use std::fmt;
use std::io::{self, Read};

bitflags! {
    /// Attribute byte of a directory record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        /// Combination reserved for long-name fragments
        const LONG_NAME = Self::READ_ONLY.bits()
            | Self::HIDDEN.bits()
            | Self::SYSTEM.bits()
            | Self::VOLUME_ID.bits();
    }
}

/// Undecoded 32-byte directory record
#[derive(Clone, Copy)]
pub struct RawDirRecord(pub [u8; 32]);

impl Structure for RawDirRecord {
    const SIZE: usize = DIR_ENTRY_SIZE as usize;

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut raw = [0u8; 32];
        reader.read_exact(&mut raw)?;
        Ok(RawDirRecord(raw))
    }
}

/// What a directory record turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirRecord {
    /// First name byte is zero; nothing follows in this directory
    EndOfDirectory,
    LongName(LongNameFragment),
    /// Deleted entry
    Free(DirectoryEntry),
    Entry(DirectoryEntry),
}

impl DirRecord {
    pub fn classify(raw: &RawDirRecord) -> DirRecord {
        let bytes = &raw.0;
        if bytes[0] == END_OF_DIRECTORY_MARKER {
            return DirRecord::EndOfDirectory;
        }
        if Attributes::from_bits_retain(bytes[11]).contains(Attributes::LONG_NAME) {
            return DirRecord::LongName(LongNameFragment::parse(bytes));
        }

        let entry = DirectoryEntry::from_bytes(bytes);
        if entry.is_free() {
            DirRecord::Free(entry)
        } else {
            DirRecord::Entry(entry)
        }
    }
}

/// Decoded DOS date and time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FatTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

impl FatTimestamp {
    /// Decodes a date/time pair; `None` when the date field was never set
    ///
    /// `tenths` is the creation-time refinement in 10 ms units (0..=199).
    pub fn from_dos(date: u16, time: u16, tenths: u8) -> Option<FatTimestamp> {
        if date == 0 {
            return None;
        }

        let extra_ms = tenths as u16 * 10;
        Some(FatTimestamp {
            year: 1980 + (date >> 9),
            month: ((date >> 5) & 0x0F) as u8,
            day: (date & 0x1F) as u8,
            hour: (time >> 11) as u8,
            minute: ((time >> 5) & 0x3F) as u8,
            second: ((time & 0x1F) * 2 + extra_ms / 1000) as u8,
            millisecond: extra_ms % 1000,
        })
    }
}

impl fmt::Display for FatTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// 8.3 directory entry, with the long name that preceded it if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Space-padded name (8) and extension (3)
    pub name: [u8; SHORT_NAME_LENGTH],

    pub attributes: Attributes,

    /// Reserved for Windows NT case flags
    pub reserved: u8,

    /// Creation time refinement in 10 ms units
    pub create_time_ms: u8,

    pub create_time: u16,

    pub create_date: u16,

    pub access_date: u16,

    /// High 16 bits of the first cluster (FAT32)
    pub cluster_high: u16,

    pub write_time: u16,

    pub write_date: u16,

    /// Low 16 bits of the first cluster
    pub cluster_low: u16,

    /// File size in bytes
    pub content_size: u32,

    long_name: Option<String>,
}

impl DirectoryEntry {
    /// Decodes a short-name record
    pub fn from_bytes(raw: &[u8; 32]) -> DirectoryEntry {
        let u16_at = |offset: usize| u16::from_le_bytes([raw[offset], raw[offset + 1]]);
        let mut name = [0u8; SHORT_NAME_LENGTH];
        name.copy_from_slice(&raw[..SHORT_NAME_LENGTH]);

        DirectoryEntry {
            name,
            attributes: Attributes::from_bits_retain(raw[11]),
            reserved: raw[12],
            create_time_ms: raw[13],
            create_time: u16_at(14),
            create_date: u16_at(16),
            access_date: u16_at(18),
            cluster_high: u16_at(20),
            write_time: u16_at(22),
            write_date: u16_at(24),
            cluster_low: u16_at(26),
            content_size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
            long_name: None,
        }
    }

    /// Synthetic entry standing for the root directory
    pub fn root(cluster: u32) -> DirectoryEntry {
        let mut name = [b' '; SHORT_NAME_LENGTH];
        name[0] = PATH_SEPARATOR as u8;

        DirectoryEntry {
            name,
            attributes: Attributes::DIRECTORY | Attributes::SYSTEM,
            reserved: 0,
            create_time_ms: 0,
            create_time: 0,
            create_date: 0,
            access_date: 0,
            cluster_high: (cluster >> 16) as u16,
            write_time: 0,
            write_date: 0,
            cluster_low: cluster as u16,
            content_size: 0,
            long_name: None,
        }
    }

    /// First cluster of the entry's data
    pub fn cluster(&self) -> u32 {
        (self.cluster_high as u32) << 16 | self.cluster_low as u32
    }

    /// Returns true if entry is marked as deleted
    pub fn is_free(&self) -> bool {
        self.name[0] == DELETED_ENTRY_MARKER
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    pub fn is_long_name_fragment(&self) -> bool {
        self.attributes.contains(Attributes::LONG_NAME)
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes.contains(Attributes::VOLUME_ID) && !self.is_long_name_fragment()
    }

    /// Returns true for the `.` and `..` entries of a subdirectory
    pub fn is_dot_entry(&self) -> bool {
        self.name[0] == b'.'
    }

    /// Returns true for the synthetic root entry
    pub fn is_root(&self) -> bool {
        self.name[0] == PATH_SEPARATOR as u8 && self.name[1..].iter().all(|&b| b == b' ')
    }

    /// Name bytes with the `0x05` escape undone
    fn raw_short_name(&self) -> [u8; SHORT_NAME_LENGTH] {
        let mut bytes = self.name;
        if bytes[0] == KANJI_ESCAPE_MARKER {
            bytes[0] = DELETED_ENTRY_MARKER;
        }
        bytes
    }

    /// Short name with trailing padding removed, extension still unseparated
    pub fn short_name(&self) -> String {
        decode_padded(&self.raw_short_name())
    }

    /// Short name formatted as `NAME.EXT`, or `NAME` without an extension
    ///
    /// Volume labels are a single 11 character field and are not split.
    pub fn display_short_name(&self) -> String {
        if self.is_volume_label() {
            return self.short_name();
        }

        let bytes = self.raw_short_name();
        let (base, ext) = bytes.split_at(SHORT_NAME_BASE_LENGTH);
        let (base, ext) = (decode_padded(base), decode_padded(ext));
        if ext.is_empty() {
            base
        } else {
            format!("{}.{}", base, ext)
        }
    }

    pub fn long_name(&self) -> Option<&str> {
        self.long_name.as_deref()
    }

    pub(crate) fn assign_long_name(&mut self, name: String) {
        self.long_name = Some(name);
    }

    /// Long name if one was recorded, else the formatted short name
    pub fn display_name(&self) -> String {
        match self.long_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.display_short_name(),
        }
    }

    /// Case-insensitive comparison against both the long and the short name
    pub fn matches_name(&self, segment: &str) -> bool {
        let long_matches = self
            .long_name
            .as_deref()
            .is_some_and(|name| eq_ignore_case(name, segment));
        long_matches || eq_ignore_case(&self.display_short_name(), segment)
    }

    pub fn created(&self) -> Option<FatTimestamp> {
        FatTimestamp::from_dos(self.create_date, self.create_time, self.create_time_ms)
    }

    pub fn modified(&self) -> Option<FatTimestamp> {
        FatTimestamp::from_dos(self.write_date, self.write_time, 0)
    }

    /// Last access carries no time of day
    pub fn accessed(&self) -> Option<FatTimestamp> {
        FatTimestamp::from_dos(self.access_date, 0, 0)
    }
}

/// Decodes a space-padded OEM name field one byte per character
fn decode_padded(field: &[u8]) -> String {
    let end = field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    field[..end].iter().map(|&b| b as char).collect()
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
