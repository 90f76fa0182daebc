//! Base types for the structure of a WZ file.

use binrw::BinRead;
use derive_more::derive::Constructor;

/// WZ file header
///
/// Every `.wz` file opens with the ASCII magic "PKG1", its own size, and the
/// offset at which the encrypted version checksum and root directory begin.
/// All data is stored in little endian format.
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(magic = b"PKG1", little)]
pub struct WzHeader {
    /// Total size of the file in bytes, as recorded by the packer
    pub file_size: u64,

    /// Offset of the encrypted version checksum; the root directory follows
    pub start: u32,
}

/// A 2D point stored by `Shape2D#Vector2D` nodes.
#[derive(Constructor, Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Vector {
    pub x: i32,
    pub y: i32,
}
