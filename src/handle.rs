//! The fixed-size open-file handle table.
//!
//! Free-slot tracking reuses `util::bitmap::BitMap`, a const-generic-
//! length bit vector — exactly the structure a 32-slot allocate/release
//! table needs, just applied to handles instead of cache slots.

use crate::error::{FsError, FsResult};
use crate::fat::{MountedVolume, OpenFile};
use crate::storage::Storage;
use crate::util::BitMap;
use crate::fat::file::OpenFlags;

use alloc::vec::Vec;
use typenum::consts::U32;

/// This core only ever has this many files open at once.
pub const MAX_HANDLES: usize = 32;

/// Maps small integer handles (as the syscall facade's `fd`s) to open
/// files. A handle is only ever valid between `allocate` and `release`.
pub struct HandleTable {
    slots: Vec<Option<OpenFile>>,
    in_use: BitMap<U32>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_HANDLES).map(|_| None).collect(),
            in_use: BitMap::new(),
        }
    }

    /// Claims the lowest free slot for `file`, returning its handle.
    pub fn allocate(&mut self, file: OpenFile) -> FsResult<u32> {
        let idx = self.in_use.next_empty_bit().map_err(|_| FsError::NoFreeHandle)?;
        self.in_use.set(idx, true).map_err(|_| FsError::NoFreeHandle)?;
        self.slots[idx] = Some(file);
        Ok(idx as u32)
    }

    pub fn get_mut(&mut self, handle: u32) -> FsResult<&mut OpenFile> {
        self.slots
            .get_mut(handle as usize)
            .and_then(Option::as_mut)
            .ok_or(FsError::BadHandle)
    }

    /// Removes `handle` from the table and closes the file it named,
    /// flushing any dirty buffer and rewriting its directory entry.
    pub fn release<S: Storage>(
        &mut self,
        vol: &mut MountedVolume,
        storage: &mut S,
        handle: u32,
    ) -> FsResult<()> {
        let slot = self.slots.get_mut(handle as usize).ok_or(FsError::BadHandle)?;
        let file = slot.take().ok_or(FsError::BadHandle)?;
        self.in_use
            .set(handle as usize, false)
            .map_err(|_| FsError::BadHandle)?;
        file.close(vol, storage)
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
