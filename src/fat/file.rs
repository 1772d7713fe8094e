//! The open-file object: buffered read/write/seek/close over a cluster
//! chain, and the directory-entry rewrite a close performs after a
//! write grew (or a truncate shrank) the file.

use super::dir::{self, ResolvedEntry};
use super::table;
use super::volume::MountedVolume;
use crate::error::{FsError, FsResult};
use crate::storage::Storage;

/// Where a [`OpenFile::seek`] is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    Start(u32),
    Current(i32),
    End(i32),
}

/// The open-mode flag set (RDONLY/WRONLY/RDWR/APPEND/TRUNC/CREAT),
/// decoupled from the syscall facade's POSIX `O_*` integer encoding so
/// `fat::file` stays agnostic of that ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    /// Reserved: file creation is not implemented by this core.
    /// Recorded only so the facade can log the request.
    pub creat: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self { read: true, ..Self::default() }
    }

    pub fn write_only() -> Self {
        Self { write: true, ..Self::default() }
    }

    pub fn read_write() -> Self {
        Self { read: true, write: true, ..Self::default() }
    }

    pub fn with_append(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn with_truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    pub fn with_creat(mut self) -> Self {
        self.creat = true;
        self
    }
}

/// A file opened for reading and/or writing.
///
/// Reads and writes go through one cluster-sized buffer, loaded lazily
/// and written back only when dirty — the same buffered-sector
/// discipline `fat::table::SectorCursor` uses one level down, applied
/// here to whole clusters instead of FAT sectors.
pub struct OpenFile {
    dir_cluster: u32,
    slot_index: u32,
    first_cluster: u32,
    size: u32,
    position: u32,
    readable: bool,
    writable: bool,
    append: bool,

    buffer: alloc::vec::Vec<u8>,
    /// Cluster number `buffer` currently mirrors; `0` means invalid.
    buffer_cluster: u32,
    dirty: bool,
}

impl OpenFile {
    /// Resolves `path` and opens it per `flags`. A write-mode request
    /// against a read-only entry fails `BadHandle`; `TRUNC` resets
    /// `size` to 0 immediately but leaves the old cluster chain alone —
    /// freeing it is deferred to `close`, once the final size is known,
    /// so a short post-truncate write can reuse the old first cluster
    /// in place instead of allocating a new one. `CREAT` is accepted
    /// but has no effect — file creation is not implemented.
    pub fn open<S: Storage>(
        vol: &mut MountedVolume,
        storage: &mut S,
        path: &str,
        flags: OpenFlags,
    ) -> FsResult<Self> {
        if flags.creat {
            log::warn!("open({:?}): O_CREAT requested but file creation is not implemented", path);
        }
        if flags.truncate && !flags.write {
            return Err(FsError::BadHandle);
        }

        let found = dir::resolve_path(vol, storage, path)?;
        let mut file = Self::from_resolved(vol, found, flags)?;

        if flags.truncate {
            // The cluster chain isn't freed here: `first_cluster` is kept
            // around so the next write can reuse it in place. `close`
            // already walks to the cluster the final size actually needs
            // and truncates everything past it, which reclaims the old
            // chain's tail (or, if nothing was ever written, all of it).
            file.size = 0;
        }

        Ok(file)
    }

    fn from_resolved(vol: &MountedVolume, found: ResolvedEntry, flags: OpenFlags) -> FsResult<Self> {
        if found.entry.is_directory() {
            return Err(FsError::IsADirectory);
        }
        if flags.write && found.entry.is_read_only() {
            return Err(FsError::BadHandle);
        }

        Ok(Self {
            dir_cluster: found.dir_cluster,
            slot_index: found.slot_index,
            first_cluster: found.entry.first_cluster(),
            size: found.entry.size,
            position: 0,
            readable: flags.read,
            writable: flags.write,
            append: flags.append,
            buffer: vol.new_cluster_buffer(),
            buffer_cluster: 0,
            dirty: false,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    /// Computes the requested offset and rejects anything outside
    /// `[0, size]` — seeking to exactly `size` is allowed, seeking past
    /// it is not, since write-past-end is not supported.
    pub fn seek(&mut self, from: SeekFrom) -> FsResult<u32> {
        let base: i64 = match from {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(d) => self.position as i64 + d as i64,
            SeekFrom::End(d) => self.size as i64 + d as i64,
        };
        if base < 0 || base > self.size as i64 {
            return Err(FsError::Invalid);
        }
        self.position = base as u32;
        Ok(self.position)
    }

    fn cluster_index_and_offset(&self, vol: &MountedVolume, pos: u32) -> (u32, u32) {
        (pos / vol.bytes_per_cluster, pos % vol.bytes_per_cluster)
    }

    /// Walks (and, if `allow_allocate`, extends) the chain `index`
    /// clusters past the first, returning the cluster number found
    /// there. Every read and write goes through this.
    ///
    /// When `!allow_allocate` and the chain ends before `index`, that's
    /// a structural inconsistency — `size` promised more data than the
    /// chain actually holds — and is surfaced as `Io`.
    fn ensure_cluster<S: Storage>(
        &mut self,
        vol: &mut MountedVolume,
        storage: &mut S,
        index: u32,
        allow_allocate: bool,
    ) -> FsResult<u32> {
        if self.first_cluster == 0 {
            if !allow_allocate {
                return Err(FsError::Io);
            }
            self.first_cluster = table::allocate(vol, storage)?;
        }

        let mut cluster = self.first_cluster;
        for _ in 0..index {
            let next = table::next_cluster(vol, storage, cluster)?;
            cluster = if next != 0 {
                next
            } else if allow_allocate {
                table::extend(vol, storage, cluster)?
            } else {
                return Err(FsError::Io);
            };
        }
        Ok(cluster)
    }

    fn flush_buffer<S: Storage>(&mut self, vol: &MountedVolume, storage: &mut S) -> FsResult<()> {
        if self.dirty {
            vol.transfer_cluster(storage, self.buffer_cluster, 1, &mut self.buffer, true)?;
            self.dirty = false;
        }
        Ok(())
    }

    fn load_buffer<S: Storage>(
        &mut self,
        vol: &MountedVolume,
        storage: &mut S,
        cluster: u32,
    ) -> FsResult<()> {
        if self.buffer_cluster == cluster {
            return Ok(());
        }
        self.flush_buffer(vol, storage)?;
        vol.transfer_cluster(storage, cluster, 1, &mut self.buffer, false)?;
        self.buffer_cluster = cluster;
        Ok(())
    }

    /// Reads up to `out.len()` bytes starting at the current position.
    ///
    /// A single call never spans two clusters — the caller loops to
    /// read across a cluster boundary; the syscall façade reissues to
    /// drain a request larger than one cluster. Returns `0` at
    /// end-of-file without treating it as an error.
    pub fn read<S: Storage>(
        &mut self,
        vol: &mut MountedVolume,
        storage: &mut S,
        out: &mut [u8],
    ) -> FsResult<usize> {
        if !self.readable {
            return Err(FsError::BadHandle);
        }
        if self.position >= self.size || out.is_empty() {
            return Ok(0);
        }

        let (index, offset) = self.cluster_index_and_offset(vol, self.position);
        let cluster = self.ensure_cluster(vol, storage, index, false)?;
        self.load_buffer(vol, storage, cluster)?;

        let in_cluster = (vol.bytes_per_cluster - offset) as usize;
        let in_file = (self.size - self.position) as usize;
        let n = in_cluster.min(in_file).min(out.len());

        out[..n].copy_from_slice(&self.buffer[offset as usize..offset as usize + n]);
        self.position += n as u32;
        Ok(n)
    }

    /// Writes `data` at the current position, extending the cluster
    /// chain (and the file's size) as needed.
    ///
    /// A single call never spans two clusters, the same rule `read`
    /// follows — the caller loops to drain a write larger than one
    /// cluster. Returns the number of bytes actually written, which can
    /// be less than `data.len()`.
    pub fn write<S: Storage>(
        &mut self,
        vol: &mut MountedVolume,
        storage: &mut S,
        data: &[u8],
    ) -> FsResult<usize> {
        if !self.writable {
            return Err(FsError::BadHandle);
        }
        if self.append {
            self.position = self.size;
        }
        if data.is_empty() {
            return Ok(0);
        }

        let (index, offset) = self.cluster_index_and_offset(vol, self.position);
        let cluster = self.ensure_cluster(vol, storage, index, true)?;
        self.load_buffer(vol, storage, cluster)?;

        let in_cluster = (vol.bytes_per_cluster - offset) as usize;
        let n = in_cluster.min(data.len());

        self.buffer[offset as usize..offset as usize + n].copy_from_slice(&data[..n]);
        self.dirty = true;

        self.position += n as u32;
        if self.position > self.size {
            self.size = self.position;
        }
        Ok(n)
    }

    /// Flushes the buffer, trims any clusters past what `size` needs,
    /// and rewrites the directory entry. Consumes `self` — a closed
    /// file cannot be read or written again.
    ///
    /// A flush or directory-rewrite failure here is logged, not
    /// propagated: the caller has already committed to discarding this
    /// handle, and the alternative — leaking it because close failed —
    /// is worse on a system with a 32-slot handle table and no way to
    /// force-reclaim one.
    pub fn close<S: Storage>(mut self, vol: &mut MountedVolume, storage: &mut S) -> FsResult<()> {
        if let Err(e) = self.flush_buffer(vol, storage) {
            log::error!("close: failed to flush dirty cluster buffer: {}", e);
        }

        if self.size > 0 {
            let last_index = (self.size - 1) / vol.bytes_per_cluster;
            match self.ensure_cluster(vol, storage, last_index, false) {
                Ok(last_cluster) => match table::next_cluster(vol, storage, last_cluster) {
                    Ok(next) if next != 0 => {
                        if let Err(e) = table::truncate(vol, storage, last_cluster, false) {
                            log::error!("close: failed to truncate trailing clusters: {}", e);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("close: failed to inspect chain tail: {}", e),
                },
                Err(e) => log::error!("close: failed to locate file's last cluster: {}", e),
            }
        } else if self.first_cluster != 0 {
            if let Err(e) = table::truncate(vol, storage, self.first_cluster, true) {
                log::error!("close: failed to free cluster chain: {}", e);
            }
            self.first_cluster = 0;
        }

        if let Err(e) =
            dir::update_entry(vol, storage, self.dir_cluster, self.slot_index, self.size, self.first_cluster)
        {
            log::error!("close: failed to rewrite directory entry: {}", e);
        }

        Ok(())
    }
}
