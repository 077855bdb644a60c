#![cfg_attr(feature = "strict", deny(warnings))]
//! Read-only driver for FAT12, FAT16 and FAT32 filesystem images.
//!
//! Open an image with [`FatVolume::open`], resolve `\`-separated paths with
//! [`FatVolume::resolve`], list directories with [`FatVolume::enumerate`] and
//! read file contents through the seekable [`FileContentStream`].

pub mod filesys;
pub mod logging;

pub use filesys::fat::{
    BootSector, DirEntries, DirectoryEntry, ExtendedInfo, FatType, FatVolume, FileContentStream,
    FsGeometry,
};
pub use filesys::{File, FsError};

pub mod prelude {
    pub use crate::filesys::fat::{DirectoryEntry, FatVolume};
    pub use crate::filesys::{File, FsError};
    pub use std::io::SeekFrom;
}
