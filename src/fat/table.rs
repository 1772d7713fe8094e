//! FAT entry access, cluster-chain walk/allocate/truncate, continued
//! from `fat::volume`.

use super::volume::MountedVolume;
use crate::error::{FsError, FsResult};
use crate::storage::{Storage, SECTOR_SIZE};

use alloc::vec;

/// 32-bit FAT entries only use the low 28 bits; the top nibble is reserved.
pub const CLUSTER_MASK: u32 = 0x0FFF_FFFF;
/// Any value `>=` this is an end-of-chain marker on read.
pub const END_OF_CHAIN_MIN: u32 = 0x0FFF_FFF8;
/// The canonical end-of-chain marker this core writes.
pub const END_OF_CHAIN: u32 = 0x0FFF_FFFF;
/// A free (unallocated) FAT entry.
pub const FREE: u32 = 0x0000_0000;

const ENTRIES_PER_SECTOR: u32 = (SECTOR_SIZE / 4) as u32;

#[inline]
fn fat_sector_and_index(cluster: u32) -> (u32, usize) {
    (cluster / ENTRIES_PER_SECTOR, (cluster % ENTRIES_PER_SECTOR) as usize)
}

/// True for any raw FAT value that denotes "no next cluster": reserved
/// (`< 2`) or end-of-chain (`>= 0x0FFFFFF8`).
#[inline]
pub fn is_end_of_chain(entry: u32) -> bool {
    entry < 2 || entry >= END_OF_CHAIN_MIN
}

fn read_sector<S: Storage>(
    vol: &MountedVolume,
    storage: &mut S,
    fat_sector: u32,
) -> FsResult<[u8; SECTOR_SIZE]> {
    let mut buf = [0u8; SECTOR_SIZE];
    storage
        .transfer(vol.fat_start_lba + fat_sector, 1, &mut buf, false)
        .map_err(|_| FsError::Io)?;
    Ok(buf)
}

/// Reads a single FAT entry, one sector transfer per call. Used by
/// `next_cluster`, which does not need a cached cursor.
pub fn read_entry<S: Storage>(vol: &MountedVolume, storage: &mut S, cluster: u32) -> FsResult<u32> {
    let (sector, index) = fat_sector_and_index(cluster);
    let buf = read_sector(vol, storage, sector)?;
    let raw = u32::from_le_bytes([
        buf[index * 4],
        buf[index * 4 + 1],
        buf[index * 4 + 2],
        buf[index * 4 + 3],
    ]);
    Ok(raw & CLUSTER_MASK)
}

fn write_entry_in_sector(buf: &mut [u8; SECTOR_SIZE], index: usize, value: u32) {
    let bytes = value.to_le_bytes();
    buf[index * 4..index * 4 + 4].copy_from_slice(&bytes);
}

pub fn write_entry<S: Storage>(
    vol: &MountedVolume,
    storage: &mut S,
    cluster: u32,
    value: u32,
) -> FsResult<()> {
    let (sector, index) = fat_sector_and_index(cluster);
    let mut buf = read_sector(vol, storage, sector)?;
    write_entry_in_sector(&mut buf, index, value);
    storage
        .transfer(vol.fat_start_lba + sector, 1, &mut buf, true)
        .map_err(|_| FsError::Io)
}

/// `next_cluster(c)`: returns the next cluster in `c`'s chain, or `0`
/// for end-of-chain / an invalid entry.
pub fn next_cluster<S: Storage>(vol: &MountedVolume, storage: &mut S, cluster: u32) -> FsResult<u32> {
    let raw = read_entry(vol, storage, cluster)?;
    if is_end_of_chain(raw) {
        Ok(0)
    } else {
        Ok(raw)
    }
}

/// A one-sector read/write-back cache used while walking several
/// consecutive FAT entries (`extend`, `truncate`) without reloading the
/// FAT sector for every single cluster step.
struct SectorCursor<'s, S: Storage> {
    storage: &'s mut S,
    fat_start_lba: u32,
    cached: Option<(u32, [u8; SECTOR_SIZE])>,
    dirty: bool,
}

impl<'s, S: Storage> SectorCursor<'s, S> {
    fn new(storage: &'s mut S, fat_start_lba: u32) -> Self {
        Self { storage, fat_start_lba, cached: None, dirty: false }
    }

    fn flush(&mut self) -> FsResult<()> {
        if self.dirty {
            if let Some((sector, buf)) = &self.cached {
                let mut out = *buf;
                self.storage
                    .transfer(self.fat_start_lba + sector, 1, &mut out, true)
                    .map_err(|_| FsError::Io)?;
            }
            self.dirty = false;
        }
        Ok(())
    }

    fn load(&mut self, sector: u32) -> FsResult<()> {
        if matches!(&self.cached, Some((s, _)) if *s == sector) {
            return Ok(());
        }
        self.flush()?;
        let mut buf = [0u8; SECTOR_SIZE];
        self.storage
            .transfer(self.fat_start_lba + sector, 1, &mut buf, false)
            .map_err(|_| FsError::Io)?;
        self.cached = Some((sector, buf));
        Ok(())
    }

    fn get(&mut self, cluster: u32) -> FsResult<u32> {
        let (sector, index) = fat_sector_and_index(cluster);
        self.load(sector)?;
        let buf = &self.cached.as_ref().unwrap().1;
        Ok(u32::from_le_bytes([
            buf[index * 4],
            buf[index * 4 + 1],
            buf[index * 4 + 2],
            buf[index * 4 + 3],
        ]) & CLUSTER_MASK)
    }

    fn set(&mut self, cluster: u32, value: u32) -> FsResult<()> {
        let (sector, index) = fat_sector_and_index(cluster);
        self.load(sector)?;
        let buf = &mut self.cached.as_mut().unwrap().1;
        write_entry_in_sector(buf, index, value);
        self.dirty = true;
        Ok(())
    }
}

/// Scans the FAT, starting at `start_cluster`'s own sector and
/// wrapping around to sector 0, for the first `FREE` entry. Clusters 0
/// and 1 are never considered, even when the wraparound passes over
/// them.
fn scan_free_cluster<S: Storage>(
    vol: &MountedVolume,
    storage: &mut S,
    start_cluster: u32,
) -> FsResult<u32> {
    let total_sectors = vol.sectors_per_fat;
    let start_sector = start_cluster / ENTRIES_PER_SECTOR;
    let start_entry = start_cluster % ENTRIES_PER_SECTOR;

    let mut cursor = SectorCursor::new(storage, vol.fat_start_lba);

    for (n, sector) in (start_sector..total_sectors).chain(0..start_sector).enumerate() {
        cursor.load(sector)?;

        let first_entry = if n == 0 {
            start_entry
        } else if sector == 0 {
            2 // clusters 0 and 1 are reserved, never allocatable
        } else {
            0
        };

        for entry in first_entry..ENTRIES_PER_SECTOR {
            let cluster = sector * ENTRIES_PER_SECTOR + entry;
            if cursor.get(cluster)? == FREE {
                cursor.flush()?;
                return Ok(cluster);
            }
        }
    }

    cursor.flush()?;
    log::warn!("fat has no free clusters");
    Err(FsError::NoSpace)
}

fn claim_cluster<S: Storage>(vol: &MountedVolume, storage: &mut S, cluster: u32) -> FsResult<()> {
    write_entry(vol, storage, cluster, END_OF_CHAIN)?;

    let lba = vol.cluster_to_lba(cluster)?;
    let mut zeros = vec![0u8; vol.bytes_per_cluster as usize];
    storage
        .transfer(lba, vol.sectors_per_cluster as u32, &mut zeros, true)
        .map_err(|_| FsError::Io)
}

/// Allocates a new, zeroed, chain-less cluster — used to give a file
/// its first cluster, where there is no predecessor to link from.
pub fn allocate<S: Storage>(vol: &MountedVolume, storage: &mut S) -> FsResult<u32> {
    let free_cluster = scan_free_cluster(vol, storage, 2)?;
    claim_cluster(vol, storage, free_cluster)?;
    log::trace!("allocated cluster {} (first cluster of a chain)", free_cluster);
    Ok(free_cluster)
}

/// `extend(prev_end_cluster)`: allocates one new cluster and appends it
/// to the chain ending at `prev_end_cluster`.
///
/// The new end-of-chain marker is written before the predecessor's
/// pointer, so a crash mid-allocation leaves at worst an orphan
/// cluster — never a dangling successor pointer.
pub fn extend<S: Storage>(
    vol: &MountedVolume,
    storage: &mut S,
    prev_end_cluster: u32,
) -> FsResult<u32> {
    let prev_value = read_entry(vol, storage, prev_end_cluster)?;
    if !is_end_of_chain(prev_value) {
        return Err(FsError::Invalid);
    }

    let free_cluster = scan_free_cluster(vol, storage, prev_end_cluster)?;
    claim_cluster(vol, storage, free_cluster)?;
    write_entry(vol, storage, prev_end_cluster, free_cluster)?;

    log::trace!("allocated cluster {} after {}", free_cluster, prev_end_cluster);
    Ok(free_cluster)
}

/// `truncate(keep_last, delete_flag)`: marks `keep_last` as the new end
/// of its chain (or frees it too, when `delete_flag`) and frees every
/// cluster after it.
pub fn truncate<S: Storage>(
    vol: &MountedVolume,
    storage: &mut S,
    keep_last: u32,
    delete_flag: bool,
) -> FsResult<()> {
    let mut cursor = SectorCursor::new(storage, vol.fat_start_lba);

    let mut next = cursor.get(keep_last)?;
    cursor.set(keep_last, if delete_flag { FREE } else { END_OF_CHAIN })?;

    while !is_end_of_chain(next) && next != FREE {
        let after = cursor.get(next)?;
        cursor.set(next, FREE)?;
        log::trace!("truncated cluster {}", next);
        next = after;
    }

    cursor.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fat::volume::MountedVolume;
    use crate::storage::mem::MemStorage;

    fn test_volume() -> (MountedVolume, MemStorage) {
        // fat_start_lba = 0, data_start_lba = 8, sectors_per_fat = 1
        // (small, just enough entries for these tests).
        let vol = MountedVolume {
            partition_start_lba: 0,
            partition_size_lba: 20000,
            fat_start_lba: 0,
            data_start_lba: 8,
            sectors_per_cluster: 8,
            bytes_per_cluster: 8 * SECTOR_SIZE as u32,
            sectors_per_fat: 1,
            fat_count: 1,
            root_dir_start_cluster: 2,
            scratch: vec![0u8; 8 * SECTOR_SIZE],
        };
        let storage = MemStorage::with_sector_count(64);
        (vol, storage)
    }

    #[test]
    fn chain_walk_and_extend() {
        let (vol, mut storage) = test_volume();
        write_entry(&vol, &mut storage, 2, END_OF_CHAIN).unwrap();

        assert_eq!(next_cluster(&vol, &mut storage, 2).unwrap(), 0);

        let new_cluster = extend(&vol, &mut storage, 2).unwrap();
        assert_eq!(new_cluster, 3);
        assert_eq!(next_cluster(&vol, &mut storage, 2).unwrap(), 3);
        assert_eq!(next_cluster(&vol, &mut storage, 3).unwrap(), 0);
    }

    #[test]
    fn extend_reports_no_space_when_fat_is_full() {
        let (vol, mut storage) = test_volume();
        write_entry(&vol, &mut storage, 2, END_OF_CHAIN).unwrap();
        for c in 3..ENTRIES_PER_SECTOR {
            write_entry(&vol, &mut storage, c, END_OF_CHAIN).unwrap();
        }

        assert_eq!(extend(&vol, &mut storage, 2).unwrap_err(), FsError::NoSpace);
    }

    #[test]
    fn truncate_frees_tail() {
        let (vol, mut storage) = test_volume();
        write_entry(&vol, &mut storage, 2, 3).unwrap();
        write_entry(&vol, &mut storage, 3, 4).unwrap();
        write_entry(&vol, &mut storage, 4, END_OF_CHAIN).unwrap();

        truncate(&vol, &mut storage, 2, false).unwrap();

        assert_eq!(read_entry(&vol, &mut storage, 2).unwrap(), END_OF_CHAIN);
        assert_eq!(read_entry(&vol, &mut storage, 3).unwrap(), FREE);
        assert_eq!(read_entry(&vol, &mut storage, 4).unwrap(), FREE);
    }

    #[test]
    fn truncate_with_delete_flag_frees_keep_last_too() {
        let (vol, mut storage) = test_volume();
        write_entry(&vol, &mut storage, 2, END_OF_CHAIN).unwrap();

        truncate(&vol, &mut storage, 2, true).unwrap();

        assert_eq!(read_entry(&vol, &mut storage, 2).unwrap(), FREE);
    }
}
