//! The mounted FAT32 volume: BPB-derived mount state, cluster↔LBA
//! translation, and raw cluster transfer. Chain walk/allocate/truncate
//! live in [`super::table`]; path resolution lives in [`super::dir`].

use super::boot_sector::BiosParameterBlock;
use crate::error::{FsError, FsResult};
use crate::mbr;
use crate::storage::{Storage, SECTOR_SIZE};

use alloc::vec;
use alloc::vec::Vec;

/// Mount state for the one FAT32 partition this core ever has open.
///
/// Carries a single scratch buffer, sized to one cluster, owned by the
/// volume and used only by the directory walker (`fat::dir`) — never
/// held across a call out of that module.
#[derive(Debug)]
pub struct MountedVolume {
    pub partition_start_lba: u32,
    pub partition_size_lba: u32,
    pub fat_start_lba: u32,
    pub data_start_lba: u32,
    pub sectors_per_cluster: u8,
    pub bytes_per_cluster: u32,
    pub sectors_per_fat: u32,
    pub fat_count: u8,
    pub root_dir_start_cluster: u32,

    /// The one scratch buffer `fat::dir` reads directory clusters into.
    /// Never borrowed across a call outside that module.
    pub(crate) scratch: Vec<u8>,
}

impl MountedVolume {
    /// Locates the FAT32 partition via the MBR and parses its BPB.
    pub fn mount<S: Storage>(storage: &mut S) -> FsResult<Self> {
        let partition = mbr::locate_partition(storage)?;

        let mut sector = [0u8; SECTOR_SIZE];
        storage
            .transfer(partition.start_lba, 1, &mut sector, false)
            .map_err(|_| FsError::Io)?;

        let bpb = BiosParameterBlock::read(&sector)?;

        let fat_start_lba = partition.start_lba + bpb.reserved_sectors as u32;
        let data_start_lba = fat_start_lba + bpb.sectors_per_fat * bpb.fat_count as u32;
        let bytes_per_cluster = SECTOR_SIZE as u32 * bpb.sectors_per_cluster as u32;

        log::info!(
            "mounted fat32 volume: fat_start={} data_start={} bytes_per_cluster={} root_cluster={}",
            fat_start_lba,
            data_start_lba,
            bytes_per_cluster,
            bpb.root_dir_start_cluster,
        );

        Ok(Self {
            partition_start_lba: partition.start_lba,
            partition_size_lba: partition.size_lba,
            fat_start_lba,
            data_start_lba,
            sectors_per_cluster: bpb.sectors_per_cluster,
            bytes_per_cluster,
            sectors_per_fat: bpb.sectors_per_fat,
            fat_count: bpb.fat_count,
            root_dir_start_cluster: bpb.root_dir_start_cluster,
            scratch: vec![0u8; bytes_per_cluster as usize],
        })
    }

    /// Allocates a fresh cluster-sized buffer, zeroed. Used by file I/O
    /// (`fat::file`), which needs a buffer it can hold onto across
    /// reads/writes rather than the walker's transient scratch space.
    pub fn new_cluster_buffer(&self) -> Vec<u8> {
        vec![0u8; self.bytes_per_cluster as usize]
    }

    /// Reads one whole cluster into the volume's scratch buffer. Used
    /// only by `fat::dir`.
    pub(crate) fn read_cluster_into_scratch<S: Storage>(
        &mut self,
        storage: &mut S,
        cluster: u32,
    ) -> FsResult<()> {
        let lba = self.cluster_to_lba(cluster)?;
        let sectors = self.sectors_per_cluster as u32;
        storage
            .transfer(lba, sectors, &mut self.scratch, false)
            .map_err(|_| FsError::Io)
    }

    /// Writes the scratch buffer back out to `cluster`.
    pub(crate) fn write_scratch_to_cluster<S: Storage>(
        &mut self,
        storage: &mut S,
        cluster: u32,
    ) -> FsResult<()> {
        let lba = self.cluster_to_lba(cluster)?;
        let sectors = self.sectors_per_cluster as u32;
        storage
            .transfer(lba, sectors, &mut self.scratch, true)
            .map_err(|_| FsError::Io)
    }

    /// `cluster_to_lba(c) = data_start_lba + (c - 2) * sectors_per_cluster`.
    pub fn cluster_to_lba(&self, cluster: u32) -> FsResult<u32> {
        if cluster < 2 {
            return Err(FsError::Invalid);
        }
        Ok(self.data_start_lba + (cluster - 2) * self.sectors_per_cluster as u32)
    }

    /// `transfer_cluster(c, count, buffer, write)`: translates to a raw
    /// block transfer over `count` whole clusters starting at `c`.
    pub fn transfer_cluster<S: Storage>(
        &self,
        storage: &mut S,
        cluster: u32,
        count: u32,
        buffer: &mut [u8],
        write: bool,
    ) -> FsResult<()> {
        if cluster < 2 || count < 1 {
            return Err(FsError::Invalid);
        }
        let lba = self.cluster_to_lba(cluster)?;
        storage
            .transfer(lba, count * self.sectors_per_cluster as u32, buffer, write)
            .map_err(|_| FsError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mem::MemStorage;

    fn write_mbr(storage: &mut MemStorage, start: u32) {
        let buf = storage.as_bytes_mut();
        buf[0x1C2] = 0x0C;
        buf[0x1C6..0x1CA].copy_from_slice(&start.to_le_bytes());
        buf[0x1CA..0x1CE].copy_from_slice(&204800u32.to_le_bytes());
        buf[0x1FE] = 0x55;
        buf[0x1FF] = 0xAA;
    }

    fn write_bpb(storage: &mut MemStorage, partition_start: u32) {
        let offset = (partition_start as usize) * SECTOR_SIZE;
        let buf = &mut storage.as_bytes_mut()[offset..offset + SECTOR_SIZE];
        buf[0x00B..0x00D].copy_from_slice(&512u16.to_le_bytes());
        buf[0x00D] = 8; // sectors per cluster
        buf[0x00E..0x010].copy_from_slice(&32u16.to_le_bytes()); // reserved
        buf[0x010] = 2; // fat count
        buf[0x024..0x028].copy_from_slice(&1000u32.to_le_bytes()); // sectors per fat
        buf[0x02C..0x030].copy_from_slice(&2u32.to_le_bytes()); // root cluster
    }

    #[test]
    fn mount_computes_layout() {
        let mut storage = MemStorage::with_sector_count(10_000);
        write_mbr(&mut storage, 2048);
        write_bpb(&mut storage, 2048);

        let vol = MountedVolume::mount(&mut storage).unwrap();
        assert_eq!(vol.fat_start_lba, 2048 + 32);
        assert_eq!(vol.data_start_lba, 2048 + 32 + 1000 * 2);
        assert_eq!(vol.bytes_per_cluster, 512 * 8);
        assert_eq!(vol.root_dir_start_cluster, 2);
    }

    #[test]
    fn cluster_to_lba_matches_formula() {
        let mut storage = MemStorage::with_sector_count(10_000);
        write_mbr(&mut storage, 2048);
        write_bpb(&mut storage, 2048);
        let vol = MountedVolume::mount(&mut storage).unwrap();

        assert_eq!(vol.cluster_to_lba(2).unwrap(), vol.data_start_lba);
        assert_eq!(vol.cluster_to_lba(3).unwrap(), vol.data_start_lba + 8);
        assert_eq!(vol.cluster_to_lba(1).unwrap_err(), FsError::Invalid);
    }
}
