//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// the canvas format value is not one this library knows
    #[error("unknown canvas format {0}")]
    UnknownFormat(i32),

    /// the pixel payload does not match the canvas dimensions
    #[error("pixel payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// bytes the format requires for the canvas dimensions
        expected: usize,
        /// bytes actually supplied
        actual: usize,
    },

    /// the canvas dimensions overflow the addressable buffer size
    #[error("canvas dimensions {width}x{height} are out of range")]
    DimensionsOutOfRange {
        /// declared width
        width: u32,
        /// declared height
        height: u32,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
