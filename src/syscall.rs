//! The system-call facade: `open/close/read/write/lseek/fstat/isatty`
//! over the handle table and open-file layer, with file descriptors
//! 0–2 reserved for the console.
//!
//! A single mounted filesystem, a fixed-size handle table, and fds
//! shifted by [`CONSOLE_FDS`] so the handle table never has to know
//! about the console streams above it. Every entry point branches on
//! `fd < CONSOLE_FDS` before ever touching the file layer, the newlib
//! convention a libc's `_fstat`/`_isatty`/`_lseek`/`_read`/`_write`
//! stubs would follow when bridging to this facade.

use crate::error::{Errno, FsError, FsResult};
use crate::fat::{MountedVolume, OpenFlags};
use crate::handle::HandleTable;
use crate::storage::Storage;

use alloc::string::String;

/// fds below this are the console; fds at or above it map to
/// `handle - CONSOLE_FDS` in the handle table.
pub const CONSOLE_FDS: u32 = 3;

pub const O_RDONLY: u32 = 0o0;
pub const O_WRONLY: u32 = 0o1;
pub const O_RDWR: u32 = 0o2;
pub const O_CREAT: u32 = 0o100;
pub const O_TRUNC: u32 = 0o1000;
pub const O_APPEND: u32 = 0o2000;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

/// `S_IFCHR`/`S_IFREG`, the two `st_mode` values this facade ever
/// reports — every console fd is a character device, every open file a
/// regular one.
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFREG: u32 = 0o100000;

/// The subset of `struct stat` the facade fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileStat {
    pub st_mode: u32,
    pub st_size: u32,
}

fn decode_flags(flags: u32) -> FsResult<OpenFlags> {
    let mut f = match flags & 0o3 {
        x if x == O_RDONLY => OpenFlags::read_only(),
        x if x == O_WRONLY => OpenFlags::write_only(),
        x if x == O_RDWR => OpenFlags::read_write(),
        _ => return Err(FsError::Invalid),
    };
    if flags & O_APPEND != 0 {
        f = f.with_append();
    }
    if flags & O_TRUNC != 0 {
        f = f.with_truncate();
    }
    if flags & O_CREAT != 0 {
        f = f.with_creat();
    }
    Ok(f)
}

/// One mounted filesystem plus its handle table — the process-wide
/// singleton this crate is built around: no global mutable sharing
/// beyond this single owner.
pub struct FileSystem<S: Storage> {
    storage: S,
    volume: MountedVolume,
    handles: HandleTable,
}

impl<S: Storage> FileSystem<S> {
    pub fn mount(mut storage: S) -> FsResult<Self> {
        let volume = MountedVolume::mount(&mut storage)?;
        Ok(Self {
            storage,
            volume,
            handles: HandleTable::new(),
        })
    }

    /// Resolves `path`, opens it per the POSIX `O_*` bits in `flags`,
    /// and returns a facade-level fd (shifted by [`CONSOLE_FDS`]).
    /// Paths whose first (post-leading-slash) component is `disk...`
    /// are reserved for future multi-device support and always fail
    /// `NoDevice`, matching `fs_open`'s `strncmp(name, "disk", 4)` check.
    pub fn open(&mut self, path: &str, flags: u32) -> FsResult<u32> {
        let stripped = path.strip_prefix('/').unwrap_or(path);
        if stripped.starts_with("disk") {
            log::warn!("open({:?}): non-boot storage devices are not implemented", path);
            return Err(FsError::NoDevice);
        }

        let open_flags = decode_flags(flags)?;
        let file = crate::fat::OpenFile::open(&mut self.volume, &mut self.storage, path, open_flags)?;
        let handle = self.handles.allocate(file)?;
        Ok(handle + CONSOLE_FDS)
    }

    pub fn close(&mut self, fd: u32) -> FsResult<()> {
        if fd < CONSOLE_FDS {
            return Err(FsError::BadHandle);
        }
        self.handles.release(&mut self.volume, &mut self.storage, fd - CONSOLE_FDS)
    }

    /// `read(0, ...)` is the console's job, not this crate's — callers
    /// outside this facade own stdin. Any other console fd (1, 2) is a
    /// write-only stream, so reading it fails `BadHandle`.
    pub fn read(&mut self, fd: u32, buf: &mut [u8]) -> FsResult<usize> {
        if fd < CONSOLE_FDS {
            return Err(FsError::BadHandle);
        }
        let file = self.handles.get_mut(fd - CONSOLE_FDS)?;
        file.read(&mut self.volume, &mut self.storage, buf)
    }

    /// `write` to a console fd has no UART collaborator here, so it
    /// just reports the byte count accepted without touching storage.
    pub fn write(&mut self, fd: u32, buf: &[u8]) -> FsResult<usize> {
        if fd < CONSOLE_FDS {
            return Ok(buf.len());
        }
        let file = self.handles.get_mut(fd - CONSOLE_FDS)?;
        file.write(&mut self.volume, &mut self.storage, buf)
    }

    /// Console fds have no seek position; `lseek` on one of them is
    /// `BadHandle`.
    pub fn lseek(&mut self, fd: u32, offset: i32, whence: i32) -> FsResult<u32> {
        if fd < CONSOLE_FDS {
            return Err(FsError::BadHandle);
        }
        let file = self.handles.get_mut(fd - CONSOLE_FDS)?;
        let from = match whence {
            SEEK_SET => crate::fat::SeekFrom::Start(offset as u32),
            SEEK_CUR => crate::fat::SeekFrom::Current(offset),
            SEEK_END => crate::fat::SeekFrom::End(offset),
            _ => return Err(FsError::Invalid),
        };
        file.seek(from)
    }

    /// Console fds report `S_IFCHR`; open files report `S_IFREG` with
    /// their current size.
    pub fn fstat(&mut self, fd: u32) -> FsResult<FileStat> {
        if fd < CONSOLE_FDS {
            return Ok(FileStat { st_mode: S_IFCHR, st_size: 0 });
        }
        let file = self.handles.get_mut(fd - CONSOLE_FDS)?;
        Ok(FileStat { st_mode: S_IFREG, st_size: file.size() })
    }

    /// `true` for the console fds, `false` for every open file.
    pub fn isatty(&mut self, fd: u32) -> FsResult<bool> {
        if fd < CONSOLE_FDS {
            return Ok(true);
        }
        self.handles.get_mut(fd - CONSOLE_FDS)?;
        Ok(false)
    }
}

/// Converts a facade result to the C ABI's `-1`-on-error convention,
/// stashing the POSIX errno-equivalent in `errno_out`.
pub fn to_posix_result(result: FsResult<i64>, errno_out: &mut i32) -> i64 {
    match result {
        Ok(v) => v,
        Err(e) => {
            *errno_out = Errno::from(e) as i32;
            -1
        }
    }
}

/// Helper used by callers that need an owned path (the newlib stubs
/// pass a raw `*const c_char`; `bindings` does the conversion before
/// calling into here).
pub fn normalize_path(path: &str) -> String {
    String::from(path)
}
