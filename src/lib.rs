//! `bmfat` — the FAT32 file system core for a single-address-space
//! bare-metal environment: MBR partition discovery, FAT32 mount, 8.3/LFN
//! path resolution, cluster-chain management, buffered per-file I/O, a
//! fixed-size handle table, and the syscall facade layered on top.
//!
//! This crate is `no_std` + `alloc` by default (see the `no_std`
//! feature); enabling `std` additionally pulls in [`storage::mem`], an
//! in-memory [`storage::Storage`] used by this crate's own test suite.

// Mark the crate as no_std if the feature is enabled (and only)
#![cfg_attr(all(feature = "no_std", not(test)), no_std)]

#[allow(unused_extern_crates)]
extern crate core; // makes rls actually look into the standard library (hack)

extern crate alloc;

// Gotta do this since we're a staticlib:
// (it'd be nicer to be able to use `panic_halt` or its ilk, but alas)
#[cfg_attr(target_os = "none", panic_handler)]
#[cfg(target_os = "none")]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

pub mod error;
pub mod mbr;
pub mod storage;
pub mod mutex;

pub mod fat;
pub mod handle;
pub mod syscall;

pub mod util;

#[cfg(feature = "bindings")]
pub mod bindings;
