//! FAT12/FAT16/FAT32 read-only filesystem implementation

use super::{File, FsError, Structure};
use std::cell::RefCell;
use std::fs;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

mod boot_sector;
mod constants;
mod dir_entry;
mod dir_iter;
mod fat_entry;
mod file;
mod geometry;
mod lfn;
mod reader;

#[cfg(test)]
mod test_image;

pub use boot_sector::{BootSector, BpbExtension, ExtendedInfo, Fat32Extension, FatType};
use constants::*;
pub use dir_entry::{Attributes, DirRecord, DirectoryEntry, FatTimestamp, RawDirRecord};
pub use dir_iter::DirEntries;
pub use fat_entry::FatEntry;
pub use file::FileContentStream;
pub use geometry::FsGeometry;
pub use lfn::{assemble_long_name, LongNameFragment};
pub use reader::ImageReader;

/// An opened FAT image
///
/// Directory iterators and file streams borrow the volume and share its
/// reader; each of them repositions the reader before every access, so they
/// may be interleaved freely on one thread.
pub struct FatVolume<R> {
    /// Reader over the image, shared with iterators and streams
    reader: RefCell<ImageReader<R>>,
    /// Boot sector containing filesystem parameters
    boot_sector: BootSector,
    extended_info: ExtendedInfo,
    geometry: FsGeometry,
}

impl FatVolume<BufReader<fs::File>> {
    /// Opens the image file at `path`
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, FsError> {
        let path = path.as_ref();
        crate::debug!("Opening image {}", path.display());
        let file = fs::File::open(path)?;
        FatVolume::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> FatVolume<R> {
    /// Parses the boot sector, derives the geometry and checks the FAT media byte
    pub fn open(mut source: R) -> Result<Self, FsError> {
        source.seek(SeekFrom::Start(0))?;
        let boot_sector = BootSector::read_from(&mut source).map_err(truncated_header)?;
        if !boot_sector.is_valid() {
            crate::warn!("Boot sector jump code {:02x?} is not EB xx 90", boot_sector.jump_boot);
            return Err(FsError::Format("missing boot sector jump instruction"));
        }

        let extended_info =
            ExtendedInfo::read_for(&boot_sector, &mut source).map_err(truncated_header)?;
        let fat_type = boot_sector.guessed_type();
        if fat_type == FatType::Unsupported {
            crate::warn!(
                "Cannot classify volume: {} bytes per sector, {} sectors per cluster",
                boot_sector.bytes_per_sector,
                boot_sector.sectors_per_cluster
            );
            return Err(FsError::UnsupportedVariant);
        }

        let geometry = FsGeometry::derive(&boot_sector, &extended_info);
        crate::debug!("Derived geometry {:?}", geometry);
        let reader = ImageReader::new(source, geometry)?;

        crate::info!(
            "Opened {} volume '{}' formatted by {} ({} bytes per cluster)",
            fat_type.name(),
            extended_info.volume_label(),
            boot_sector.oem_name(),
            geometry.bytes_per_cluster
        );

        Ok(FatVolume {
            reader: RefCell::new(reader),
            boot_sector,
            extended_info,
            geometry,
        })
    }

    pub fn fat_type(&self) -> FatType {
        self.geometry.fat_type
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.boot_sector
    }

    pub fn extended_info(&self) -> &ExtendedInfo {
        &self.extended_info
    }

    pub fn geometry(&self) -> &FsGeometry {
        &self.geometry
    }

    /// Volume label recorded in the extended boot record
    pub fn volume_label(&self) -> String {
        self.extended_info.volume_label()
    }

    /// Synthetic entry for the root directory
    pub fn root(&self) -> DirectoryEntry {
        if self.geometry.is_fat32 {
            DirectoryEntry::root(self.geometry.root_cluster)
        } else {
            DirectoryEntry::root(ROOT_DIR_SENTINEL_CLUSTER)
        }
    }

    /// Looks up a `\`-separated path, ignoring case
    ///
    /// Each segment matches either the long or the short name of an entry.
    /// Returns `Ok(None)` if any segment is missing. Only `\` itself names the
    /// root; a path with no segments left after trimming is `InvalidPath`,
    /// and descending into a file is `NotADirectory`.
    pub fn resolve(&self, path: &str) -> Result<Option<DirectoryEntry>, FsError> {
        if path == ROOT_PATH {
            return Ok(Some(self.root()));
        }

        let trimmed = path.trim_matches(PATH_SEPARATOR);
        let segments: Vec<&str> = trimmed
            .split(PATH_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .collect();
        if segments.is_empty() || trimmed.trim().is_empty() {
            return Err(FsError::InvalidPath);
        }

        let mut current = self.root();
        for (depth, segment) in segments.iter().enumerate() {
            let Some(entry) = self.find_in(&current, segment)? else {
                crate::debug!("{:?} not found while resolving {:?}", segment, path);
                return Ok(None);
            };

            if depth + 1 == segments.len() {
                return Ok(Some(entry));
            }
            current = entry;
        }

        Ok(Some(current))
    }

    fn find_in(
        &self,
        directory: &DirectoryEntry,
        name: &str,
    ) -> Result<Option<DirectoryEntry>, FsError> {
        for entry in self.enumerate(directory)? {
            let entry = entry?;
            if entry.is_free() || entry.is_volume_label() {
                continue;
            }
            if entry.matches_name(name) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Lists the entries of `directory`
    ///
    /// A cluster of 0 or 1 (as in the root entry or a `..` entry pointing at
    /// the root) enumerates the root directory.
    pub fn enumerate(&self, directory: &DirectoryEntry) -> Result<DirEntries<'_, R>, FsError> {
        if !directory.is_directory() {
            return Err(FsError::NotADirectory);
        }

        let cluster = match directory.cluster() {
            c if c >= FIRST_DATA_CLUSTER => c,
            _ if self.geometry.is_fat32 => self.geometry.root_cluster,
            _ => ROOT_DIR_SENTINEL_CLUSTER,
        };
        crate::trace!("Enumerating {:?} at cluster {}", directory.display_name(), cluster);

        Ok(DirEntries::new(&self.reader, cluster))
    }

    /// Opens a seekable read-only stream over the contents of `entry`
    pub fn open_file(&self, entry: &DirectoryEntry) -> Result<FileContentStream<'_, R>, FsError> {
        if entry.is_directory() {
            return Err(FsError::IsADirectory);
        }
        FileContentStream::new(&self.reader, entry.cluster(), entry.content_size as u64)
    }

    /// Reads the whole file at `path`
    pub fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, FsError> {
        let Some(entry) = self.resolve(path)? else {
            return Ok(None);
        };

        let mut stream = self.open_file(&entry)?;
        let mut data = vec![0u8; stream.len() as usize];
        let mut filled = 0;
        while filled < data.len() {
            let n = File::read(&mut stream, &mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);

        Ok(Some(data))
    }

    /// Gives back the byte source
    pub fn into_inner(self) -> R {
        self.reader.into_inner().into_inner()
    }
}

fn truncated_header(err: io::Error) -> FsError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        FsError::Format("image too small for a boot sector")
    } else {
        FsError::Io(err)
    }
}
