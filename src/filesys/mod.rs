use std::fmt;
use std::io::{self, Read, SeekFrom};

pub mod fat;

/// Errors raised by filesystem operations
#[derive(Debug)]
pub enum FsError {
    /// The byte source failed (short read, read past end, OS error)
    Io(io::Error),
    /// The boot sector is not a FAT boot sector
    Format(&'static str),
    /// The FAT variant could not be classified
    UnsupportedVariant,
    /// On-disk structures contradict each other
    CorruptVolume(String),
    NotADirectory,
    IsADirectory,
    /// The path is empty after separators are trimmed
    InvalidPath,
    /// Write or length mutation on a read-only object
    UnsupportedOperation,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Io(err) => write!(f, "I/O error: {}", err),
            FsError::Format(reason) => write!(f, "Not a FAT image: {}", reason),
            FsError::UnsupportedVariant => write!(f, "Unsupported FAT variant"),
            FsError::CorruptVolume(reason) => write!(f, "Corrupt volume: {}", reason),
            FsError::NotADirectory => write!(f, "Entry is not a directory"),
            FsError::IsADirectory => write!(f, "Entry is a directory"),
            FsError::InvalidPath => write!(f, "The path is empty"),
            FsError::UnsupportedOperation => write!(f, "Operation not supported on read-only data"),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        FsError::Io(err)
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Io(inner) => inner,
            FsError::UnsupportedOperation => io::Error::new(io::ErrorKind::Unsupported, err),
            FsError::InvalidPath => io::Error::new(io::ErrorKind::InvalidInput, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Fixed-layout on-disk structure that can be deserialized sequentially
pub trait Structure: Sized {
    /// Size of the structure on disk in bytes
    const SIZE: usize;

    /// Reads the structure from the current position, advancing it by `SIZE`
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self>;
}

/// Represents an open file in the filesystem
pub trait File {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError>;
    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError>;
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError>;
    fn set_len(&mut self, len: u64) -> Result<(), FsError>;
    fn flush(&mut self) -> Result<(), FsError>;
    fn size(&self) -> u64;
    fn position(&self) -> u64;
}
