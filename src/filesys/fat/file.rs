//! Seekable read-only stream over a file's cluster chain

use super::constants::*;
use super::reader::ImageReader;
use crate::filesys::{File, FsError};
use std::cell::RefCell;
use std::cmp::min;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Represents an open file on a FAT volume
///
/// Clusters are resolved from the FAT only as far as reads and seeks reach.
pub struct FileContentStream<'a, R> {
    /// Reader shared with the owning volume
    reader: &'a RefCell<ImageReader<R>>,

    /// Size of each cluster in bytes
    cluster_size: u32,

    /// Total file size in bytes
    size: u64,

    /// Current position in file
    position: u64,

    /// Cluster numbers resolved so far, indexed by position in the file
    clusters: Vec<u32>,

    /// Cluster touched by the last read or seek
    current_cluster: u32,
}

impl<'a, R: Read + Seek> FileContentStream<'a, R> {
    pub(crate) fn new(
        reader: &'a RefCell<ImageReader<R>>,
        start_cluster: u32,
        size: u64,
    ) -> Result<Self, FsError> {
        if size > 0 && start_cluster < FIRST_DATA_CLUSTER {
            return Err(FsError::CorruptVolume(format!(
                "file of {} bytes starts at cluster {}",
                size, start_cluster
            )));
        }

        let cluster_size = reader.borrow().geometry().bytes_per_cluster;
        crate::debug!("Opened file at cluster {} ({} bytes)", start_cluster, size);

        Ok(FileContentStream {
            reader,
            cluster_size,
            size,
            position: 0,
            clusters: vec![start_cluster],
            current_cluster: start_cluster,
        })
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Clusters of the chain resolved so far, starting with the first one
    pub fn resolved_clusters(&self) -> &[u32] {
        &self.clusters
    }

    pub fn current_cluster(&self) -> u32 {
        self.current_cluster
    }

    /// Returns the cluster at `index` in the chain, walking the FAT past the
    /// last resolved cluster if needed
    fn cluster_at(
        &mut self,
        reader: &mut ImageReader<R>,
        index: usize,
    ) -> Result<u32, FsError> {
        if let Some(&cluster) = self.clusters.get(index) {
            return Ok(cluster);
        }

        let needed = index + 1 - self.clusters.len();
        let last = self.clusters[self.clusters.len() - 1];
        let more = reader.read_chain(last, needed)?;
        crate::trace!("resolved {} more clusters after {}", more.len(), last);

        if more.len() < needed {
            crate::error!(
                "cluster chain ends after {} clusters, file needs {}",
                self.clusters.len() + more.len(),
                index + 1
            );
            return Err(FsError::CorruptVolume(format!(
                "cluster chain shorter than file size ({} bytes)",
                self.size
            )));
        }

        self.clusters.extend(more);
        Ok(self.clusters[index])
    }

    /// Fills `chunk` from cluster `index` of the chain, starting `offset`
    /// bytes into it
    fn read_chunk(
        &mut self,
        reader: &mut ImageReader<R>,
        index: usize,
        offset: u32,
        chunk: &mut [u8],
    ) -> Result<u32, FsError> {
        let cluster = self.cluster_at(reader, index)?;
        reader.seek_cluster(cluster, offset)?;
        reader.read_exact(chunk)?;
        Ok(cluster)
    }

    fn locate(&self, position: u64) -> (usize, u32) {
        let cluster_size = self.cluster_size as u64;
        ((position / cluster_size) as usize, (position % cluster_size) as u32)
    }
}

impl<R: Read + Seek> File for FileContentStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        if self.position >= self.size {
            return Ok(0);
        }

        let cell = self.reader;
        let mut reader = cell.borrow_mut();
        let bytes_to_read = min(buf.len() as u64, self.size - self.position) as usize;
        let mut bytes_read = 0;

        while bytes_read < bytes_to_read {
            let (index, cluster_offset) = self.locate(self.position);
            let bytes_left_in_cluster = (self.cluster_size - cluster_offset) as usize;
            let chunk_size = min(bytes_left_in_cluster, bytes_to_read - bytes_read);

            let chunk = &mut buf[bytes_read..bytes_read + chunk_size];
            // bytes already copied are returned; the next call reports the error
            let cluster = match self.read_chunk(&mut reader, index, cluster_offset, chunk) {
                Ok(cluster) => cluster,
                Err(_) if bytes_read > 0 => break,
                Err(err) => return Err(err),
            };

            bytes_read += chunk_size;
            self.position += chunk_size as u64;
            self.current_cluster = cluster;
        }

        Ok(bytes_read)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, FsError> {
        Err(FsError::UnsupportedOperation)
    }

    /// Positions outside `0..=size` are clamped rather than rejected
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
            SeekFrom::End(offset) => self.size as i128 + offset as i128,
        };
        let position = target.clamp(0, self.size as i128) as u64;

        if position < self.size {
            let (index, _) = self.locate(position);
            let cell = self.reader;
            let mut reader = cell.borrow_mut();
            self.current_cluster = self.cluster_at(&mut reader, index)?;
        }

        self.position = position;
        Ok(position)
    }

    fn set_len(&mut self, _len: u64) -> Result<(), FsError> {
        Err(FsError::UnsupportedOperation)
    }

    fn flush(&mut self) -> Result<(), FsError> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read + Seek> Read for FileContentStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(File::read(self, buf)?)
    }
}

impl<R: Read + Seek> Seek for FileContentStream<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(File::seek(self, pos)?)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

impl<R: Read + Seek> Write for FileContentStream<'_, R> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(File::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(File::flush(self)?)
    }
}
