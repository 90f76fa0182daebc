//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// the file does not start with the PKG1 magic
    #[error("not a wz archive (bad magic)")]
    InvalidMagic,

    /// the stored checksum does not match the declared archive version
    #[error("archive version checksum mismatch")]
    InvalidVersion,

    /// the initialization vector string could not be understood
    #[error("invalid initialization vector {0:?}")]
    InvalidIv(String),

    /// an image body announced an unknown root kind
    #[error("unknown image tag {0:?}")]
    InvalidTag(String),

    /// a string reference carried an unknown key byte
    #[error("invalid string key 0x{0:02X}")]
    InvalidUolKey(u8),

    /// a directory entry carried an unknown element type
    #[error("invalid directory element type {0}")]
    InvalidElementType(u8),

    /// a property carried an unknown variant type
    #[error("invalid property variant type 0x{0:02X}")]
    InvalidVariantType(u8),

    /// an embedded image did not consume exactly its advertised size
    #[error("embedded image did not end at its advertised size")]
    PayloadLengthMismatch,

    /// the source ended in the middle of a structure
    #[error("unexpected end of data")]
    Truncated,

    /// the reserved field of a canvas structure was non-zero
    #[error("canvas structure has a non-zero reserved field")]
    InvalidCanvasStruct,

    /// the sound media header declared a wave format this library cannot read
    #[error("unsupported sound header")]
    UnsupportedSoundHeader,

    /// a chain of symbolic links never reached a concrete node
    #[error("symbolic link chain exceeded {0} hops")]
    CyclicUol(usize),

    /// a `.ini` sidecar file was malformed or incomplete
    #[error("invalid archive config: {0}")]
    InvalidConfig(String),

    /// a canvas or sound payload failed to inflate
    #[error("zlib inflate failed")]
    Zlib(#[source] std::io::Error),

    /// Transparent wrapper for [`wz_image::Error`]
    #[error(transparent)]
    Image(#[from] wz_image::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRw(#[from] binrw::Error),

    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
