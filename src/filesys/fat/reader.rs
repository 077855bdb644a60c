//! Random-access reader over a FAT image

use super::boot_sector::FatType;
use super::constants::*;
use super::fat_entry::{fat12_byte_offset, unpack_fat12, FatEntry};
use super::geometry::FsGeometry;
use crate::filesys::{FsError, Structure};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

/// Owns the byte source and knows how to address clusters and the FAT
pub struct ImageReader<R> {
    /// Underlying image
    source: R,
    /// Layout of the volume inside `source`
    geometry: FsGeometry,
}

impl<R: Read + Seek> ImageReader<R> {
    /// Attaches `geometry` to `source` and checks that the first FAT byte
    /// repeats the boot sector media descriptor
    pub fn new(mut source: R, geometry: FsGeometry) -> Result<Self, FsError> {
        source.seek(SeekFrom::Start(geometry.fat_table_offset))?;
        let fat_media = source.read_u8()?;

        if fat_media != geometry.media_type {
            crate::error!(
                "FAT media byte {:#04x} does not match boot sector media {:#04x}",
                fat_media,
                geometry.media_type
            );
            return Err(FsError::CorruptVolume(format!(
                "FAT media byte {:#04x} does not match boot sector media {:#04x}",
                fat_media, geometry.media_type
            )));
        }

        Ok(ImageReader { source, geometry })
    }

    pub fn geometry(&self) -> &FsGeometry {
        &self.geometry
    }

    /// Deserializes `T` at the current position
    pub fn read_structure<T: Structure>(&mut self) -> Result<T, FsError> {
        Ok(T::read_from(&mut self.source)?)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), FsError> {
        Ok(self.source.read_exact(buf)?)
    }

    pub fn position(&mut self) -> Result<u64, FsError> {
        Ok(self.source.stream_position()?)
    }

    /// Moves to an absolute byte offset
    pub fn seek(&mut self, offset: u64) -> Result<u64, FsError> {
        Ok(self.source.seek(SeekFrom::Start(offset))?)
    }

    /// Moves to `intra_offset` bytes into `cluster`
    ///
    /// Clusters 0 and 1 address the legacy root area on FAT12/16 and the
    /// first data cluster on FAT32.
    pub fn seek_cluster(&mut self, cluster: u32, intra_offset: u32) -> Result<u64, FsError> {
        let offset = self.geometry.cluster_offset(cluster, intra_offset);
        crate::trace!("seek cluster {} + {} -> {:#x}", cluster, intra_offset, offset);
        self.seek(offset)
    }

    /// Reads the raw FAT value stored for `index`, keeping the stream position
    pub fn lookup_fat_entry(&mut self, index: u32) -> Result<u32, FsError> {
        let saved = self.source.stream_position()?;
        let value = self.read_fat_value(index);
        self.source.seek(SeekFrom::Start(saved))?;

        let value = value?;
        crate::trace!("FAT[{}] = {:#x}", index, value);
        Ok(value)
    }

    fn read_fat_value(&mut self, index: u32) -> Result<u32, FsError> {
        let table = self.geometry.fat_table_offset;
        match self.geometry.fat_type {
            FatType::Fat12 => {
                self.seek(table + fat12_byte_offset(index))?;
                let raw = self.source.read_u16::<LittleEndian>()?;
                Ok(unpack_fat12(raw, index))
            }
            FatType::Fat16 => {
                self.seek(table + index as u64 * 2)?;
                Ok(self.source.read_u16::<LittleEndian>()? as u32)
            }
            FatType::Fat32 | FatType::Unsupported => {
                self.seek(table + index as u64 * 4)?;
                Ok(self.source.read_u32::<LittleEndian>()? & FAT32_ENTRY_MASK)
            }
        }
    }

    /// Looks up and classifies the successor of `cluster`
    pub fn next_cluster(&mut self, cluster: u32) -> Result<FatEntry, FsError> {
        let value = self.lookup_fat_entry(cluster)?;
        Ok(FatEntry::classify(value, &self.geometry))
    }

    /// Follows the chain after `start`, collecting at most `count` successors
    ///
    /// Stops early at the end-of-chain marker or a free/reserved entry. The
    /// stream position is preserved.
    pub fn read_chain(&mut self, start: u32, count: usize) -> Result<Vec<u32>, FsError> {
        let mut chain = Vec::with_capacity(count);
        let mut current = start;

        while chain.len() < count {
            match self.next_cluster(current)?.next() {
                Some(next) => {
                    chain.push(next);
                    current = next;
                }
                None => break,
            }
        }

        Ok(chain)
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}
