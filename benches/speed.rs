//! Cluster-chain walk and buffered read/write throughput benchmarks.
//!
//! No disk-image fixture ships with this crate, so the image is a
//! synthetic one built in memory with
//! [`bmfat::storage::mem::MemStorage`], the same harness
//! `tests/file_backed.rs` uses. Requires the `std` feature:
//! `cargo bench --no-default-features --features std,bindings`.

extern crate criterion;

use criterion::{
    criterion_group, criterion_main, AxisScale, BatchSize, BenchmarkId, Criterion,
    PlotConfiguration, Throughput,
};

use bmfat::storage::mem::MemStorage;
use bmfat::storage::SECTOR_SIZE;
use bmfat::syscall::{FileSystem, O_RDONLY, O_WRONLY};

const SECTORS_PER_CLUSTER: u32 = 8;
const BYTES_PER_CLUSTER: u32 = SECTOR_SIZE as u32 * SECTORS_PER_CLUSTER;
const PARTITION_START: u32 = 1;
const RESERVED_SECTORS: u32 = 1;
const FAT_COUNT: u32 = 1;

fn fat_start_lba() -> u32 {
    PARTITION_START + RESERVED_SECTORS
}

fn data_start_lba(sectors_per_fat: u32) -> u32 {
    fat_start_lba() + sectors_per_fat * FAT_COUNT
}

fn cluster_to_lba(cluster: u32, sectors_per_fat: u32) -> u32 {
    data_start_lba(sectors_per_fat) + (cluster - 2) * SECTORS_PER_CLUSTER
}

fn write_mbr(storage: &mut MemStorage, partition_size_lba: u32) {
    let buf = storage.as_bytes_mut();
    buf[0x1C2] = 0x0C;
    buf[0x1C6..0x1CA].copy_from_slice(&PARTITION_START.to_le_bytes());
    buf[0x1CA..0x1CE].copy_from_slice(&partition_size_lba.to_le_bytes());
    buf[0x1FE] = 0x55;
    buf[0x1FF] = 0xAA;
}

fn write_bpb(storage: &mut MemStorage, sectors_per_fat: u32) {
    let offset = PARTITION_START as usize * SECTOR_SIZE;
    let buf = &mut storage.as_bytes_mut()[offset..offset + SECTOR_SIZE];
    buf[0x00B..0x00D].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
    buf[0x00D] = SECTORS_PER_CLUSTER as u8;
    buf[0x00E..0x010].copy_from_slice(&(RESERVED_SECTORS as u16).to_le_bytes());
    buf[0x010] = FAT_COUNT as u8;
    buf[0x024..0x028].copy_from_slice(&sectors_per_fat.to_le_bytes());
    buf[0x02C..0x030].copy_from_slice(&2u32.to_le_bytes());
}

fn write_short_entry(buf: &mut [u8], slot: usize, name8_3: &str, cluster: u32, size: u32) {
    let off = slot * 32;
    let (base, ext) = name8_3.split_once('.').unwrap_or((name8_3, ""));
    let mut name = [b' '; 8];
    for (i, c) in base.bytes().enumerate().take(8) {
        name[i] = c;
    }
    let mut e = [b' '; 3];
    for (i, c) in ext.bytes().enumerate().take(3) {
        e[i] = c;
    }
    buf[off..off + 8].copy_from_slice(&name);
    buf[off + 8..off + 11].copy_from_slice(&e);
    buf[off + 0x14..off + 0x16].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    buf[off + 0x1A..off + 0x1C].copy_from_slice(&((cluster & 0xFFFF) as u16).to_le_bytes());
    buf[off + 0x1C..off + 0x20].copy_from_slice(&size.to_le_bytes());
}

fn set_fat_entry(storage: &mut MemStorage, cluster: u32, value: u32) {
    let byte_off = fat_start_lba() as usize * SECTOR_SIZE + cluster as usize * 4;
    storage.as_bytes_mut()[byte_off..byte_off + 4]
        .copy_from_slice(&(value & 0x0FFF_FFFF).to_le_bytes());
}

/// Builds an in-memory image containing one `READ.BIN` file of
/// `size_clusters` clusters, all prefilled with a repeating pattern.
fn image_with_file(size_clusters: u32) -> (MemStorage, usize) {
    let sectors_per_fat = size_clusters + 8;
    let total_sectors = data_start_lba(sectors_per_fat) + size_clusters * SECTORS_PER_CLUSTER + 8;

    let mut storage = MemStorage::with_sector_count(total_sectors as u64);
    write_mbr(&mut storage, total_sectors - PARTITION_START);
    write_bpb(&mut storage, sectors_per_fat);

    let root_off = cluster_to_lba(2, sectors_per_fat) as usize * SECTOR_SIZE;
    let file_size = size_clusters * BYTES_PER_CLUSTER;
    {
        let buf = &mut storage.as_bytes_mut()[root_off..root_off + BYTES_PER_CLUSTER as usize];
        write_short_entry(buf, 0, "READ.BIN", 4, file_size);
    }

    let chain = alloc_free_vec(size_clusters);
    for w in chain.windows(2) {
        set_fat_entry(&mut storage, w[0], w[1]);
    }
    set_fat_entry(&mut storage, *chain.last().unwrap(), 0x0FFF_FFFF);
    for &c in &chain {
        let lba = cluster_to_lba(c, sectors_per_fat) as usize * SECTOR_SIZE;
        let buf = &mut storage.as_bytes_mut()[lba..lba + BYTES_PER_CLUSTER as usize];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
    }

    (storage, file_size as usize)
}

fn alloc_free_vec(size_clusters: u32) -> Vec<u32> {
    (0..size_clusters).map(|i| 4 + i).collect()
}

fn bench_read_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster chain read throughput");
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);
    group.plot_config(plot_config);

    for &clusters in &[1u32, 8, 64, 256] {
        let (storage, file_size) = image_with_file(clusters);
        group.throughput(Throughput::Bytes(file_size as u64));

        group.bench_with_input(
            BenchmarkId::new("sequential read", file_size),
            &storage,
            |b, storage| {
                b.iter_batched(
                    || {
                        let mut fs = FileSystem::mount(clone_storage(storage)).unwrap();
                        let fd = fs.open("/read.bin", O_RDONLY).unwrap();
                        (fs, fd)
                    },
                    |(mut fs, fd)| {
                        let mut buf = [0u8; BYTES_PER_CLUSTER as usize];
                        let mut total = 0usize;
                        loop {
                            let n = fs.read(fd, &mut buf).unwrap();
                            if n == 0 {
                                break;
                            }
                            total += n;
                        }
                        assert_eq!(total, file_size);
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_write_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster chain write throughput");

    for &clusters in &[1u32, 8, 64] {
        let size = clusters * BYTES_PER_CLUSTER;
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("sequential write", size), &clusters, |b, &clusters| {
            b.iter_batched(
                || {
                    let sectors_per_fat = clusters + 8;
                    let total_sectors =
                        data_start_lba(sectors_per_fat) + clusters * SECTORS_PER_CLUSTER + 8;
                    let mut storage = MemStorage::with_sector_count(total_sectors as u64);
                    write_mbr(&mut storage, total_sectors - PARTITION_START);
                    write_bpb(&mut storage, sectors_per_fat);
                    let root_off = cluster_to_lba(2, sectors_per_fat) as usize * SECTOR_SIZE;
                    {
                        let buf = &mut storage.as_bytes_mut()[root_off..root_off + BYTES_PER_CLUSTER as usize];
                        write_short_entry(buf, 0, "WRITE.BIN", 0, 0);
                    }
                    let mut fs = FileSystem::mount(storage).unwrap();
                    let fd = fs.open("/write.bin", O_WRONLY).unwrap();
                    let data = vec![0xA5u8; BYTES_PER_CLUSTER as usize];
                    (fs, fd, data)
                },
                |(mut fs, fd, data)| {
                    for _ in 0..clusters {
                        let mut written = 0;
                        while written < data.len() {
                            written += fs.write(fd, &data[written..]).unwrap();
                        }
                    }
                    fs.close(fd).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn clone_storage(storage: &MemStorage) -> MemStorage {
    let mut clone = MemStorage::with_sector_count(storage.as_bytes().len() as u64 / SECTOR_SIZE as u64);
    clone.as_bytes_mut().copy_from_slice(storage.as_bytes());
    clone
}

criterion_group!(benches, bench_read_speed, bench_write_speed);
criterion_main!(benches);
