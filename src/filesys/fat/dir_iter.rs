//! Lazy directory enumeration

use super::constants::*;
use super::dir_entry::{DirRecord, DirectoryEntry, RawDirRecord};
use super::fat_entry::FatEntry;
use super::lfn::{assemble_long_name, short_name_checksum, LongNameFragment};
use super::reader::ImageReader;
use crate::filesys::FsError;
use arrayvec::ArrayVec;
use std::cell::RefCell;
use std::io::{Read, Seek};

/// Forward-only iterator over the entries of one directory
///
/// Long-name fragments are folded into the entry that follows them and are
/// never yielded themselves. Iteration ends at the first end-of-directory
/// record, at the end of the cluster chain, or after the first error.
pub struct DirEntries<'a, R> {
    reader: &'a RefCell<ImageReader<R>>,
    /// Cluster currently being read
    cluster: u32,
    /// Byte offset of the next record inside `cluster`
    offset: u32,
    fragments: ArrayVec<LongNameFragment, LFN_MAX_FRAGMENTS>,
    finished: bool,
}

impl<'a, R: Read + Seek> DirEntries<'a, R> {
    pub(crate) fn new(reader: &'a RefCell<ImageReader<R>>, cluster: u32) -> Self {
        DirEntries {
            reader,
            cluster,
            offset: 0,
            fragments: ArrayVec::new(),
            finished: false,
        }
    }

    fn next_entry(&mut self) -> Result<Option<DirectoryEntry>, FsError> {
        let cell = self.reader;
        let mut reader = cell.borrow_mut();

        loop {
            let geometry = *reader.geometry();
            if self.offset >= geometry.bytes_for_cluster(self.cluster) {
                if !geometry.is_fat32 && self.cluster < FIRST_DATA_CLUSTER {
                    return Ok(None);
                }
                match reader.next_cluster(self.cluster)? {
                    FatEntry::Next(next) => {
                        crate::trace!("directory continues at cluster {}", next);
                        self.cluster = next;
                        self.offset = 0;
                    }
                    _ => return Ok(None),
                }
            }

            reader.seek_cluster(self.cluster, self.offset)?;
            let raw: RawDirRecord = reader.read_structure()?;
            self.offset += DIR_ENTRY_SIZE;

            match DirRecord::classify(&raw) {
                DirRecord::EndOfDirectory => return Ok(None),
                DirRecord::LongName(fragment) => {
                    if let Err(overflow) = self.fragments.try_push(fragment) {
                        crate::warn!(
                            "more than {} long-name fragments in a row, discarding them",
                            LFN_MAX_FRAGMENTS
                        );
                        self.fragments.clear();
                        self.fragments.push(overflow.element());
                    }
                }
                DirRecord::Free(entry) | DirRecord::Entry(entry) => {
                    return Ok(Some(self.attach_long_name(entry)));
                }
            }
        }
    }

    fn attach_long_name(&mut self, mut entry: DirectoryEntry) -> DirectoryEntry {
        if self.fragments.is_empty() {
            return entry;
        }

        let checksum = short_name_checksum(&entry.name);
        if self.fragments.iter().any(|f| f.checksum != checksum) {
            crate::debug!(
                "long-name checksum mismatch for {:?}",
                entry.display_short_name()
            );
        }

        entry.assign_long_name(assemble_long_name(&self.fragments));
        self.fragments.clear();
        entry
    }
}

impl<R: Read + Seek> Iterator for DirEntries<'_, R> {
    type Item = Result<DirectoryEntry, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
