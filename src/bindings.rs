//! C bindings for this crate: the `extern "C"` surface a kernel links
//! against, wrapping [`crate::syscall::FileSystem`] behind a
//! process-wide singleton guarded by [`crate::mutex::Mutex`].
//!
//! One `fs_open`/`fs_close`/... singleton, populated once at boot by
//! [`bmfat_init`] rather than lazily, since the `external_mutex`/
//! `bare_metal` mutex impls need a real function call (not a const
//! initializer) to stand up their locking primitive. Callers on the
//! libc side (newlib-style stubs) are responsible for the `+3` fd shift
//! documented on [`crate::syscall::CONSOLE_FDS`] and for translating
//! their own `O_*`/`SEEK_*` constants to the ones this module exports —
//! those stubs live outside this crate.

use crate::error::Errno;
use crate::mutex::MutexInterface;
use crate::syscall::FileSystem;

use core::ffi::{c_char, CStr};
use core::slice;

static mut FS: Option<crate::mutex::Mutex<FileSystem<edisk::EDiskStorage>>> = None;

fn with_fs<R>(f: impl FnOnce(&mut FileSystem<edisk::EDiskStorage>) -> R) -> Option<R> {
    unsafe { FS.as_ref() }.map(|m| m.cs(f))
}

unsafe fn path_from_raw<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    CStr::from_ptr(name).to_str().ok()
}

/// Mounts the FAT32 partition on the eDisk-backed drive `drive_num` and
/// installs it as the singleton every other `bmfat_*` call operates on.
/// Returns `0` on success, `-1` if the mount failed (logged via `log`).
#[no_mangle]
pub extern "C" fn bmfat_init(drive_num: u8, size_in_sectors: u64) -> i32 {
    let storage = edisk::EDiskStorage { drive_num, size_in_sectors };
    match FileSystem::mount(storage) {
        Ok(fs) => {
            unsafe { FS = Some(crate::mutex::Mutex::new(fs)) };
            0
        }
        Err(e) => {
            log::error!("bmfat_init: mount failed: {}", e);
            -1
        }
    }
}

/// `open(2)`-alike. `name` must be a NUL-terminated path; `flags` is
/// the `O_*` bitmask from `crate::syscall`. Returns a facade-level fd
/// (already shifted past `CONSOLE_FDS`) or `-1` with `*errno` set.
#[no_mangle]
pub unsafe extern "C" fn bmfat_open(name: *const c_char, flags: u32, errno: *mut i32) -> i64 {
    let path = match path_from_raw(name) {
        Some(p) => p,
        None => {
            if !errno.is_null() {
                *errno = Errno::Einval as i32;
            }
            return -1;
        }
    };

    let mut err = 0;
    let result = with_fs(|fs| fs.open(path, flags)).unwrap_or(Err(crate::error::FsError::NoDevice));
    let rc = crate::syscall::to_posix_result(result.map(|fd| fd as i64), &mut err);
    if !errno.is_null() {
        *errno = err;
    }
    rc
}

#[no_mangle]
pub extern "C" fn bmfat_close(fd: u32, errno: *mut i32) -> i32 {
    let mut err = 0;
    let result = with_fs(|fs| fs.close(fd)).unwrap_or(Err(crate::error::FsError::NoDevice));
    let rc = crate::syscall::to_posix_result(result.map(|_| 0i64), &mut err);
    if !errno.is_null() {
        unsafe { *errno = err };
    }
    rc as i32
}

#[no_mangle]
pub unsafe extern "C" fn bmfat_read(fd: u32, buf: *mut u8, len: usize, errno: *mut i32) -> i64 {
    let slice = slice::from_raw_parts_mut(buf, len);
    let mut err = 0;
    let result = with_fs(|fs| fs.read(fd, slice)).unwrap_or(Err(crate::error::FsError::NoDevice));
    let rc = crate::syscall::to_posix_result(result.map(|n| n as i64), &mut err);
    if !errno.is_null() {
        *errno = err;
    }
    rc
}

#[no_mangle]
pub unsafe extern "C" fn bmfat_write(fd: u32, buf: *const u8, len: usize, errno: *mut i32) -> i64 {
    let slice = slice::from_raw_parts(buf, len);
    let mut err = 0;
    let result = with_fs(|fs| fs.write(fd, slice)).unwrap_or(Err(crate::error::FsError::NoDevice));
    let rc = crate::syscall::to_posix_result(result.map(|n| n as i64), &mut err);
    if !errno.is_null() {
        *errno = err;
    }
    rc
}

#[no_mangle]
pub extern "C" fn bmfat_lseek(fd: u32, offset: i32, whence: i32, errno: *mut i32) -> i64 {
    let mut err = 0;
    let result = with_fs(|fs| fs.lseek(fd, offset, whence)).unwrap_or(Err(crate::error::FsError::NoDevice));
    let rc = crate::syscall::to_posix_result(result.map(|pos| pos as i64), &mut err);
    if !errno.is_null() {
        unsafe { *errno = err };
    }
    rc
}

#[repr(C)]
pub struct CFileStat {
    pub st_mode: u32,
    pub st_size: u32,
}

#[no_mangle]
pub unsafe extern "C" fn bmfat_fstat(fd: u32, out: *mut CFileStat, errno: *mut i32) -> i32 {
    let mut err = 0;
    let result = with_fs(|fs| fs.fstat(fd)).unwrap_or(Err(crate::error::FsError::NoDevice));
    match result {
        Ok(st) => {
            if !out.is_null() {
                (*out).st_mode = st.st_mode;
                (*out).st_size = st.st_size;
            }
            0
        }
        Err(e) => {
            if !errno.is_null() {
                *errno = Errno::from(e) as i32;
            }
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn bmfat_isatty(fd: u32) -> i32 {
    with_fs(|fs| fs.isatty(fd)).and_then(Result::ok).map_or(0, |b| b as i32)
}

pub mod edisk {
    //! A `crate::storage::Storage` impl backed by the TI eDisk driver's
    //! `extern "C"` block-transfer entry points — the only concrete
    //! hardware `Storage` implementation this crate ships.

    use crate::storage::{Storage, SECTOR_SIZE};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum DResult {
        ResOk = 0,
        ResError = 1,
        ResWrPrt = 2,
        ResNotRdy = 3,
        ResParErr = 4,
    }

    extern "C" {
        fn eDisk_Read(drv: u8, buff: *mut u8, sector: u32, count: u32) -> DResult;
        fn eDisk_Write(drv: u8, buff: *const u8, sector: u32, count: u32) -> DResult;
    }

    #[repr(C)]
    pub struct EDiskStorage {
        pub drive_num: u8,
        pub size_in_sectors: u64,
    }

    impl Storage for EDiskStorage {
        type Error = DResult;

        fn transfer(
            &mut self,
            lba: u32,
            count: u32,
            buffer: &mut [u8],
            write: bool,
        ) -> Result<(), DResult> {
            debug_assert_eq!(buffer.len(), count as usize * SECTOR_SIZE);
            let result = if write {
                unsafe { eDisk_Write(self.drive_num, buffer.as_ptr(), lba, count) }
            } else {
                unsafe { eDisk_Read(self.drive_num, buffer.as_mut_ptr(), lba, count) }
            };
            match result {
                DResult::ResOk => Ok(()),
                e => Err(e),
            }
        }

        fn sector_count(&self) -> u64 {
            self.size_in_sectors
        }
    }
}
