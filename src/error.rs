//! The error taxonomy shared by every layer of the file system core.
//!
//! Separates transport failures from filesystem-semantic ones: one
//! variant per failure mode, a `Display` impl for logging, and `From`
//! conversions at the boundary where a lower layer's error gets folded
//! into ours.

use core::fmt::{self, Display, Formatter};

/// Every error this crate can surface, from mount time through the
/// syscall facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Block-transport failure, or a structural FAT inconsistency (a
    /// cluster chain ended before `size` said it should).
    Io,
    /// Unknown handle, or a handle used in a mode it wasn't opened for.
    BadHandle,
    /// Seek out of range, or another malformed parameter.
    Invalid,
    /// The handle table has no free slots.
    NoFreeHandle,
    /// The FAT has no free cluster to allocate.
    NoSpace,
    /// Path resolution did not find the named entry.
    NotFound,
    /// Path resolution expected a file but found a directory.
    IsADirectory,
    /// Path resolution expected a directory but found a file partway
    /// through a multi-component path.
    NotADirectory,
    /// Sector 0 lacks the 0x55/0xAA MBR signature.
    BadMbr,
    /// Partition entry 1 is not a FAT32-LBA (0x0C) partition.
    UnsupportedPartition,
    /// The BPB describes something this core cannot mount (e.g.
    /// `bytes_per_sector != 512`).
    UnsupportedFs,
    /// `open` was asked to resolve a path under a non-boot storage
    /// device (`/disk...`); multi-device support is not implemented.
    NoDevice,
}

impl Display for FsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => f.write_str("I/O error or corrupt FAT chain"),
            Self::BadHandle => f.write_str("unknown or wrongly-moded handle"),
            Self::Invalid => f.write_str("invalid argument"),
            Self::NoFreeHandle => f.write_str("no free file handles"),
            Self::NoSpace => f.write_str("no free clusters"),
            Self::NotFound => f.write_str("no such file or directory"),
            Self::IsADirectory => f.write_str("is a directory"),
            Self::NotADirectory => f.write_str("not a directory"),
            Self::BadMbr => f.write_str("sector 0 is not a valid MBR"),
            Self::UnsupportedPartition => f.write_str("partition 1 is not FAT32 LBA"),
            Self::UnsupportedFs => f.write_str("unsupported filesystem parameters"),
            Self::NoDevice => f.write_str("no such storage device"),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// The POSIX-style errno-equivalents the syscall facade surfaces.
///
/// Mirrors the subset of `errno.h` a libc expects (`ENOENT`, `ENOTDIR`,
/// etc.) so the facade can return `-1` and set the equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Errno {
    Enoent = 2,
    Eio = 5,
    Ebadf = 9,
    Enomem = 12,
    Eacces = 13,
    Enodev = 19,
    Enotdir = 20,
    Eisdir = 21,
    Einval = 22,
    Enfile = 23,
    Enospc = 28,
}

impl From<FsError> for Errno {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Io => Errno::Eio,
            FsError::BadHandle => Errno::Ebadf,
            FsError::Invalid => Errno::Einval,
            FsError::NoFreeHandle => Errno::Enfile,
            FsError::NoSpace => Errno::Enospc,
            FsError::NotFound => Errno::Enoent,
            FsError::IsADirectory => Errno::Eisdir,
            FsError::NotADirectory => Errno::Enotdir,
            FsError::BadMbr | FsError::UnsupportedPartition | FsError::UnsupportedFs => {
                Errno::Eacces
            }
            FsError::NoDevice => Errno::Enodev,
        }
    }
}
