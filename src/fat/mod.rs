//! FAT32 filesystem things!

pub mod boot_sector;
pub mod dir;
pub mod file;
pub mod table;
pub mod volume;

pub use file::{OpenFile, OpenFlags, SeekFrom};
pub use volume::MountedVolume;
