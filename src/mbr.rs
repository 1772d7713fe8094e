//! Partition locator.
//!
//! Reads LBA 0, validates the MBR signature, and extracts partition
//! entry 1's start/size — refusing anything but a FAT32-LBA (`0x0C`)
//! partition. Other partition entries are never consulted.

use crate::error::{FsError, FsResult};
use crate::storage::{Storage, SECTOR_SIZE};

const SIG_OFFSET: usize = 0x1FE;
const PARTITION1_TYPE_OFFSET: usize = 0x1C2;
const PARTITION1_START_OFFSET: usize = 0x1C6;
const PARTITION1_SIZE_OFFSET: usize = 0x1CA;
const FAT32_LBA_TYPE: u8 = 0x0C;

/// The first partition's geometry, in 512-byte logical sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub start_lba: u32,
    pub size_lba: u32,
}

fn le32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Reads sector 0 and locates partition entry 1.
///
/// Fails with [`FsError::Io`] if the transfer itself fails,
/// [`FsError::BadMbr`] if the 0x55/0xAA signature is missing, or
/// [`FsError::UnsupportedPartition`] if the entry's type byte isn't
/// `0x0C`.
pub fn locate_partition<S: Storage>(storage: &mut S) -> FsResult<Partition> {
    let mut sector = [0u8; SECTOR_SIZE];
    storage
        .transfer(0, 1, &mut sector, false)
        .map_err(|_| FsError::Io)?;

    if sector[SIG_OFFSET] != 0x55 || sector[SIG_OFFSET + 1] != 0xAA {
        log::error!("sector 0 did not have MBR magic bytes");
        return Err(FsError::BadMbr);
    }

    if sector[PARTITION1_TYPE_OFFSET] != FAT32_LBA_TYPE {
        log::error!(
            "first partition type 0x{:02X} is not FAT32 LBA",
            sector[PARTITION1_TYPE_OFFSET]
        );
        return Err(FsError::UnsupportedPartition);
    }

    let start_lba = le32(&sector, PARTITION1_START_OFFSET);
    let size_lba = le32(&sector, PARTITION1_SIZE_OFFSET);
    log::info!(
        "fat32 partition starting sector, size: {}, {}",
        start_lba,
        size_lba
    );

    Ok(Partition { start_lba, size_lba })
}
