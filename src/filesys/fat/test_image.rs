//! In-memory FAT images for tests

use super::boot_sector::{BootSector, ExtendedInfo, FatType};
use super::constants::*;
use super::dir_entry::Attributes;
use super::lfn::short_name_checksum;
use crate::filesys::Structure;
use std::io::Cursor;

const BYTES_PER_SECTOR: usize = 512;
const FAT_COUNT: usize = 2;
const VOLUME_LABEL: &[u8; 11] = b"TESTVOLUME ";

/// 2021-03-14
const STAMP_DATE: u16 = (41 << 9) | (3 << 5) | 14;
/// 09:30:00
const CREATE_TIME: u16 = (9 << 11) | (30 << 5);
/// 15:26:52
const WRITE_TIME: u16 = (15 << 11) | (26 << 5) | 26;

/// Size parameters of a generated volume
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub kind: FatType,
    pub total_sectors: u32,
    pub reserved_sectors: u32,
    pub fat_sectors: u32,
    pub sectors_per_cluster: u8,
    pub root_entries: u16,
    pub media: u8,
}

impl Layout {
    /// Smallest convenient layout the variant heuristic classifies as `kind`
    pub fn for_type(kind: FatType) -> Layout {
        match kind {
            FatType::Fat12 => Layout {
                kind,
                total_sectors: 400,
                reserved_sectors: 1,
                fat_sectors: 2,
                sectors_per_cluster: 2,
                root_entries: 64,
                media: 0xF0,
            },
            FatType::Fat16 => Layout {
                kind,
                total_sectors: 4400,
                reserved_sectors: 1,
                fat_sectors: 18,
                sectors_per_cluster: 1,
                root_entries: 512,
                media: 0xF8,
            },
            FatType::Fat32 | FatType::Unsupported => Layout {
                kind: FatType::Fat32,
                total_sectors: 1200,
                reserved_sectors: 32,
                fat_sectors: 6,
                sectors_per_cluster: 2,
                root_entries: 0,
                media: 0xF8,
            },
        }
    }

    /// Parsed boot sector and extension of this layout
    pub fn headers(&self) -> (BootSector, ExtendedInfo) {
        let mut cursor = Cursor::new(self.boot_sector_bytes());
        let boot = BootSector::read_from(&mut cursor).unwrap();
        let ext = ExtendedInfo::read_for(&boot, &mut cursor).unwrap();
        (boot, ext)
    }

    fn is_fat32(&self) -> bool {
        self.kind == FatType::Fat32
    }

    pub fn bytes_per_cluster(&self) -> usize {
        BYTES_PER_SECTOR * self.sectors_per_cluster as usize
    }

    pub fn fat_offset(&self) -> usize {
        self.reserved_sectors as usize * BYTES_PER_SECTOR
    }

    fn fat_bytes(&self) -> usize {
        self.fat_sectors as usize * BYTES_PER_SECTOR
    }

    pub fn root_offset(&self) -> usize {
        self.fat_offset() + FAT_COUNT * self.fat_bytes()
    }

    fn data_offset(&self) -> usize {
        self.root_offset() + self.root_entries as usize * DIR_ENTRY_SIZE as usize
    }

    pub fn cluster_offset(&self, cluster: u32) -> usize {
        self.data_offset() + (cluster - FIRST_DATA_CLUSTER) as usize * self.bytes_per_cluster()
    }

    /// One past the highest cluster number that fits in the image
    fn cluster_limit(&self) -> u32 {
        let data_bytes = self.total_sectors as usize * BYTES_PER_SECTOR - self.data_offset();
        FIRST_DATA_CLUSTER + (data_bytes / self.bytes_per_cluster()) as u32
    }

    fn end_of_chain(&self) -> u32 {
        match self.kind {
            FatType::Fat12 => 0x0FFF,
            FatType::Fat16 => 0xFFFF,
            _ => FAT32_ENTRY_MASK,
        }
    }

    fn boot_sector_bytes(&self) -> Vec<u8> {
        let mut sector = vec![0u8; BYTES_PER_SECTOR];
        sector[0..3].copy_from_slice(&[JUMP_OPCODE, 0x3C, JUMP_NOP]);
        sector[3..11].copy_from_slice(b"MSWIN4.1");
        sector[11..13].copy_from_slice(&(BYTES_PER_SECTOR as u16).to_le_bytes());
        sector[13] = self.sectors_per_cluster;
        sector[14..16].copy_from_slice(&(self.reserved_sectors as u16).to_le_bytes());
        sector[16] = FAT_COUNT as u8;
        sector[17..19].copy_from_slice(&self.root_entries.to_le_bytes());
        if self.is_fat32() || self.total_sectors > u16::MAX as u32 {
            sector[32..36].copy_from_slice(&self.total_sectors.to_le_bytes());
        } else {
            sector[19..21].copy_from_slice(&(self.total_sectors as u16).to_le_bytes());
        }
        sector[21] = self.media;
        if !self.is_fat32() {
            sector[22..24].copy_from_slice(&(self.fat_sectors as u16).to_le_bytes());
        }
        sector[24..26].copy_from_slice(&63u16.to_le_bytes());
        sector[26..28].copy_from_slice(&255u16.to_le_bytes());

        let ext = if self.is_fat32() {
            sector[36..40].copy_from_slice(&self.fat_sectors.to_le_bytes());
            sector[44..48].copy_from_slice(&FIRST_DATA_CLUSTER.to_le_bytes());
            sector[48..50].copy_from_slice(&1u16.to_le_bytes());
            sector[50..52].copy_from_slice(&6u16.to_le_bytes());
            64
        } else {
            36
        };
        sector[ext] = 0x80;
        sector[ext + 2] = 0x29;
        sector[ext + 3..ext + 7].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        sector[ext + 7..ext + 18].copy_from_slice(VOLUME_LABEL);
        let fs_type = format!("{:<8}", self.kind.name());
        sector[ext + 18..ext + 26].copy_from_slice(fs_type.as_bytes());

        sector[510] = 0x55;
        sector[511] = 0xAA;
        sector
    }
}

/// Handle to a directory created by [`ImageBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirId(usize);

pub const ROOT: DirId = DirId(0);

struct Dir {
    /// Empty for the fixed FAT12/16 root area
    clusters: Vec<u32>,
    records: usize,
    short_names: Vec<[u8; SHORT_NAME_LENGTH]>,
}

/// Formats a blank volume and lays out files and directories on it
pub struct ImageBuilder {
    layout: Layout,
    image: Vec<u8>,
    dirs: Vec<Dir>,
    next_free: u32,
    /// Free clusters left between consecutive allocations
    gap: u32,
}

impl ImageBuilder {
    pub fn new(kind: FatType) -> ImageBuilder {
        ImageBuilder::with_layout(Layout::for_type(kind))
    }

    pub fn with_layout(layout: Layout) -> ImageBuilder {
        let mut image = vec![0u8; layout.total_sectors as usize * BYTES_PER_SECTOR];
        image[..BYTES_PER_SECTOR].copy_from_slice(&layout.boot_sector_bytes());

        let mut builder = ImageBuilder {
            layout,
            image,
            dirs: Vec::new(),
            next_free: FIRST_DATA_CLUSTER,
            gap: 0,
        };

        // first two FAT entries are reserved, the first one repeats the media byte
        let reserved = layout.end_of_chain() & !0xFF | layout.media as u32;
        builder.set_fat(0, reserved);
        builder.set_fat(1, layout.end_of_chain());

        let root_clusters = if layout.is_fat32() {
            builder.allocate(2)
        } else {
            Vec::new()
        };
        builder.dirs.push(Dir {
            clusters: root_clusters,
            records: 0,
            short_names: Vec::new(),
        });
        builder.push_record(ROOT, short_record(VOLUME_LABEL, Attributes::VOLUME_ID, 0, 0));
        builder
    }

    /// Leaves a free cluster after every allocated one from now on
    pub fn fragmented(mut self) -> ImageBuilder {
        self.gap = 1;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Writes `value` into every FAT copy
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        for copy in 0..FAT_COUNT {
            let base = self.layout.fat_offset() + copy * self.layout.fat_bytes();
            match self.layout.kind {
                FatType::Fat12 => {
                    let offset = base + cluster as usize * 3 / 2;
                    let old = u16::from_le_bytes([self.image[offset], self.image[offset + 1]]);
                    let value = (value & 0x0FFF) as u16;
                    let packed = if cluster % 2 == 0 {
                        (old & 0xF000) | value
                    } else {
                        (old & 0x000F) | (value << 4)
                    };
                    self.image[offset..offset + 2].copy_from_slice(&packed.to_le_bytes());
                }
                FatType::Fat16 => {
                    let offset = base + cluster as usize * 2;
                    self.image[offset..offset + 2].copy_from_slice(&(value as u16).to_le_bytes());
                }
                _ => {
                    let offset = base + cluster as usize * 4;
                    self.image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
    }

    fn allocate(&mut self, count: usize) -> Vec<u32> {
        let mut chain = Vec::with_capacity(count);
        for _ in 0..count {
            assert!(self.next_free < self.layout.cluster_limit(), "image is full");
            chain.push(self.next_free);
            self.next_free += 1 + self.gap;
        }

        for pair in chain.windows(2) {
            self.set_fat(pair[0], pair[1]);
        }
        if let Some(&last) = chain.last() {
            self.set_fat(last, self.layout.end_of_chain());
        }
        chain
    }

    fn push_record(&mut self, dir: DirId, record: [u8; 32]) {
        let layout = self.layout;
        let slot = &mut self.dirs[dir.0];
        let index = slot.records;

        let offset = if slot.clusters.is_empty() {
            assert!(index < layout.root_entries as usize, "root directory is full");
            layout.root_offset() + index * DIR_ENTRY_SIZE as usize
        } else {
            let per_cluster = layout.bytes_per_cluster() / DIR_ENTRY_SIZE as usize;
            let cluster = *slot
                .clusters
                .get(index / per_cluster)
                .expect("directory is full");
            layout.cluster_offset(cluster) + (index % per_cluster) * DIR_ENTRY_SIZE as usize
        };

        slot.records += 1;
        self.image[offset..offset + 32].copy_from_slice(&record);
    }

    /// Picks the 8.3 name for `name`, and the long name to store if needed
    fn short_name_for(&self, dir: DirId, name: &str) -> ([u8; SHORT_NAME_LENGTH], Option<String>) {
        let upper = name.to_ascii_uppercase();
        if let Some(short) = encode_8_3(&upper) {
            let long = (upper != name).then(|| name.to_string());
            return (short, long);
        }

        let clean = |part: &str| -> String {
            part.chars()
                .filter(char::is_ascii_alphanumeric)
                .map(|c| c.to_ascii_uppercase())
                .collect()
        };
        let (base, ext) = match name.rfind('.') {
            Some(dot) if dot > 0 => (clean(&name[..dot]), clean(&name[dot + 1..])),
            _ => (clean(name), String::new()),
        };
        let prefix: String = base.chars().take(6).collect();
        let ext: String = ext.chars().take(3).collect();

        let taken = &self.dirs[dir.0].short_names;
        let short = (1..)
            .map(|n| pack_short_name(&format!("{}~{}", prefix, n), &ext))
            .find(|candidate| !taken.contains(candidate))
            .unwrap();
        (short, Some(name.to_string()))
    }

    fn add_entry(&mut self, dir: DirId, name: &str, attributes: Attributes, cluster: u32, size: u32) {
        let (short, long) = self.short_name_for(dir, name);
        if let Some(long) = long {
            for record in long_name_records(&long, short_name_checksum(&short)) {
                self.push_record(dir, record);
            }
        }
        self.dirs[dir.0].short_names.push(short);
        self.push_record(dir, short_record(&short, attributes, cluster, size));
    }

    /// Stores `data` as a file; returns its cluster chain
    pub fn add_file(&mut self, dir: DirId, name: &str, data: &[u8]) -> Vec<u32> {
        let cluster_size = self.layout.bytes_per_cluster();
        let chain = self.allocate(data.len().div_ceil(cluster_size));

        for (&cluster, chunk) in chain.iter().zip(data.chunks(cluster_size)) {
            let offset = self.layout.cluster_offset(cluster);
            self.image[offset..offset + chunk.len()].copy_from_slice(chunk);
        }

        let first = chain.first().copied().unwrap_or(0);
        self.add_entry(dir, name, Attributes::ARCHIVE, first, data.len() as u32);
        chain
    }

    pub fn add_dir(&mut self, parent: DirId, name: &str) -> DirId {
        self.add_dir_with_clusters(parent, name, 1)
    }

    /// Creates a subdirectory with room for `clusters` clusters of records
    pub fn add_dir_with_clusters(&mut self, parent: DirId, name: &str, clusters: usize) -> DirId {
        let chain = self.allocate(clusters);
        let first = chain[0];
        let parent_cluster = if parent == ROOT {
            0
        } else {
            self.dir_cluster(parent)
        };

        let id = DirId(self.dirs.len());
        self.dirs.push(Dir {
            clusters: chain,
            records: 0,
            short_names: Vec::new(),
        });
        self.push_record(id, short_record(b".          ", Attributes::DIRECTORY, first, 0));
        self.push_record(
            id,
            short_record(b"..         ", Attributes::DIRECTORY, parent_cluster, 0),
        );

        self.add_entry(parent, name, Attributes::DIRECTORY, first, 0);
        id
    }

    /// Writes a deleted entry (and its long-name fragments) for `name`
    pub fn add_deleted(&mut self, dir: DirId, name: &str) {
        let (short, long) = self.short_name_for(dir, name);
        if let Some(long) = long {
            for mut record in long_name_records(&long, short_name_checksum(&short)) {
                record[0] = DELETED_ENTRY_MARKER;
                self.push_record(dir, record);
            }
        }

        let mut record = short_record(&short, Attributes::ARCHIVE, 0, 0);
        record[0] = DELETED_ENTRY_MARKER;
        self.push_record(dir, record);
    }

    /// First cluster of `dir`, or the root sentinel for a fixed root area
    pub fn dir_cluster(&self, dir: DirId) -> u32 {
        self.dirs[dir.0]
            .clusters
            .first()
            .copied()
            .unwrap_or(ROOT_DIR_SENTINEL_CLUSTER)
    }

    pub fn finish(self) -> Vec<u8> {
        self.image
    }
}

fn pack_short_name(base: &str, ext: &str) -> [u8; SHORT_NAME_LENGTH] {
    let mut name = [b' '; SHORT_NAME_LENGTH];
    name[..base.len()].copy_from_slice(base.as_bytes());
    name[SHORT_NAME_BASE_LENGTH..SHORT_NAME_BASE_LENGTH + ext.len()].copy_from_slice(ext.as_bytes());
    name
}

/// Packs an upper-case name that already is a legal 8.3 name
fn encode_8_3(name: &str) -> Option<[u8; SHORT_NAME_LENGTH]> {
    let (base, ext) = match name.split_once('.') {
        Some((base, ext)) => (base, ext),
        None => (name, ""),
    };
    let legal = |part: &str| {
        part.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || "!#$%&'()-@^_`{}~".contains(c))
    };

    let fits = (1..=SHORT_NAME_BASE_LENGTH).contains(&base.len())
        && ext.len() <= SHORT_NAME_LENGTH - SHORT_NAME_BASE_LENGTH;
    (fits && legal(base) && legal(ext)).then(|| pack_short_name(base, ext))
}

fn short_record(
    name: &[u8; SHORT_NAME_LENGTH],
    attributes: Attributes,
    cluster: u32,
    size: u32,
) -> [u8; 32] {
    let mut raw = [0u8; 32];
    raw[..SHORT_NAME_LENGTH].copy_from_slice(name);
    raw[11] = attributes.bits();
    raw[13] = 100;
    raw[14..16].copy_from_slice(&CREATE_TIME.to_le_bytes());
    raw[16..18].copy_from_slice(&STAMP_DATE.to_le_bytes());
    raw[18..20].copy_from_slice(&STAMP_DATE.to_le_bytes());
    raw[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    raw[22..24].copy_from_slice(&WRITE_TIME.to_le_bytes());
    raw[24..26].copy_from_slice(&STAMP_DATE.to_le_bytes());
    raw[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    raw[28..32].copy_from_slice(&size.to_le_bytes());
    raw
}

/// Long-name fragments for `name` in on-disk (descending) order
fn long_name_records(name: &str, checksum: u8) -> Vec<[u8; 32]> {
    let mut units: Vec<u16> = name.encode_utf16().collect();
    if units.len() % LFN_UNITS_PER_FRAGMENT != 0 {
        units.push(0);
    }
    while units.len() % LFN_UNITS_PER_FRAGMENT != 0 {
        units.push(0xFFFF);
    }

    let count = units.len() / LFN_UNITS_PER_FRAGMENT;
    (1..=count)
        .rev()
        .map(|ordinal| {
            let mut raw = [0u8; 32];
            raw[0] = ordinal as u8 | if ordinal == count { LFN_LAST_FRAGMENT } else { 0 };
            raw[11] = Attributes::LONG_NAME.bits();
            raw[13] = checksum;

            let start = (ordinal - 1) * LFN_UNITS_PER_FRAGMENT;
            for (i, unit) in units[start..start + LFN_UNITS_PER_FRAGMENT].iter().enumerate() {
                let offset = match i {
                    0..=4 => 1 + i * 2,
                    5..=10 => 14 + (i - 5) * 2,
                    _ => 28 + (i - 11) * 2,
                };
                raw[offset..offset + 2].copy_from_slice(&unit.to_le_bytes());
            }
            raw
        })
        .collect()
}
