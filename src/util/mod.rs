//! Small bit-level helpers shared by the handle table and the
//! directory walker's attribute checks.

pub mod bitmap;
pub mod bits;

pub use bitmap::{BitMap, BitMapLen};
pub use bits::Bits;
