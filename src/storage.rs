//! The block transport contract: an external collaborator every board
//! supplies its own driver for.
//!
//! Real boards plug in a driver for their SD/eMMC/USB controller; this
//! crate only depends on the `Storage` trait below. Sectors are always
//! 512 bytes — the BPB is rejected at mount time otherwise (see
//! `fat::volume::mount`).

use core::fmt::Debug;

/// Bytes in one logical sector. Hardcoded — `MountedVolume` rejects any
/// BPB that disagrees.
pub const SECTOR_SIZE: usize = 512;

/// A synchronous block device exposing whole-sector transfers.
///
/// Implementations should never panic; errors propagate to the caller
/// and are folded into [`crate::error::FsError::Io`] at the file-layer
/// boundary.
pub trait Storage {
    type Error: Debug;

    /// Transfers `count` consecutive 512-byte sectors starting at `lba`
    /// between the device and `buffer` (`buffer.len() == count *
    /// SECTOR_SIZE`). `write == false` reads device -> buffer; `write ==
    /// true` writes buffer -> device.
    fn transfer(
        &mut self,
        lba: u32,
        count: u32,
        buffer: &mut [u8],
        write: bool,
    ) -> Result<(), Self::Error>;

    /// Total number of 512-byte sectors backing this device.
    fn sector_count(&self) -> u64;

    #[inline]
    fn read_sector(&mut self, lba: u32, buffer: &mut [u8; SECTOR_SIZE]) -> Result<(), Self::Error> {
        self.transfer(lba, 1, buffer, false)
    }

    #[inline]
    fn write_sector(&mut self, lba: u32, buffer: &[u8; SECTOR_SIZE]) -> Result<(), Self::Error> {
        let mut tmp = *buffer;
        self.transfer(lba, 1, &mut tmp, true)
    }
}

#[cfg(any(feature = "std", test))]
pub mod mem {
    //! An in-memory [`Storage`] used by this crate's own test suite.
    //!
    //! A `std`-only medium good enough to mount and drive a synthetic
    //! FAT32 image end to end, without shipping a real disk-image
    //! fixture.

    use super::{Storage, SECTOR_SIZE};
    use std::fmt;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OutOfRange;

    impl fmt::Display for OutOfRange {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("sector index out of range")
        }
    }

    impl std::error::Error for OutOfRange {}

    /// A disk image held entirely in memory.
    pub struct MemStorage {
        sectors: Vec<u8>,
    }

    impl MemStorage {
        pub fn with_sector_count(count: u64) -> Self {
            Self {
                sectors: vec![0u8; (count as usize) * SECTOR_SIZE],
            }
        }

        pub fn as_bytes(&self) -> &[u8] {
            &self.sectors
        }

        pub fn as_bytes_mut(&mut self) -> &mut [u8] {
            &mut self.sectors
        }
    }

    impl Storage for MemStorage {
        type Error = OutOfRange;

        fn transfer(
            &mut self,
            lba: u32,
            count: u32,
            buffer: &mut [u8],
            write: bool,
        ) -> Result<(), OutOfRange> {
            let start = (lba as usize) * SECTOR_SIZE;
            let len = (count as usize) * SECTOR_SIZE;
            let end = start.checked_add(len).ok_or(OutOfRange)?;

            if end > self.sectors.len() || buffer.len() < len {
                return Err(OutOfRange);
            }

            if write {
                self.sectors[start..end].copy_from_slice(&buffer[..len]);
            } else {
                buffer[..len].copy_from_slice(&self.sectors[start..end]);
            }

            Ok(())
        }

        fn sector_count(&self) -> u64 {
            (self.sectors.len() / SECTOR_SIZE) as u64
        }
    }
}
