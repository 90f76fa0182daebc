//! Pixel codecs for the canvas formats stored in WZ archives.
//!
//! A WZ canvas carries its pixels in one of seven storage formats. After the
//! container layer has inflated the payload, the raw buffer is handed to
//! [`CanvasFormat::decode`], which produces a plain RGBA image regardless of
//! the on-disk layout.
//!
//! | Value | Format       | Layout                                        |
//! |-------|--------------|-----------------------------------------------|
//! | 1     | BGRA4444     | 2 bytes/pixel, packed nibbles                 |
//! | 2     | BGRA8888     | 4 bytes/pixel, B G R A order                  |
//! | 3     | Gray         | decoded through the DXT3 path                 |
//! | 257   | ARGB1555     | 2 bytes/pixel, 1-bit alpha                    |
//! | 513   | RGB565       | 2 bytes/pixel, opaque                         |
//! | 517   | RGB565Thumb  | RGB565 at 1/16 resolution per axis            |
//! | 1026  | DXT3         | 16-byte blocks over 4x4 tiles, explicit alpha |
//! | 2050  | DXT5         | 16-byte blocks over 4x4 tiles, interpolated alpha |
//!
//! Two compatibility quirks of the reference client are preserved: `Gray`
//! canvases are decompressed as DXT3, and the DXT color table uses the
//! DXT1-style `c0 > c1` branch even for DXT3 blocks.

pub mod bgra;
pub mod dxt;
pub mod error;
pub mod rgb;

pub use error::{Error, Result};

use image::RgbaImage;

/// Storage format of a canvas pixel payload.
///
/// The discriminants are the raw `fmt1 + fmt2` values found in the archive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CanvasFormat {
    Bgra4444 = 1,
    Bgra8888 = 2,
    /// Decoded as DXT3 by the reference client.
    Gray = 3,
    Argb1555 = 257,
    Rgb565 = 513,
    /// RGB565 stored at `(width/16, height/16)` and point-sampled back up.
    Rgb565Thumb = 517,
    Dxt3 = 1026,
    Dxt5 = 2050,
}

impl CanvasFormat {
    /// Maps a raw format value from the archive to a known format.
    pub fn from_raw(value: i32) -> Result<Self> {
        Ok(match value {
            1 => CanvasFormat::Bgra4444,
            2 => CanvasFormat::Bgra8888,
            3 => CanvasFormat::Gray,
            257 => CanvasFormat::Argb1555,
            513 => CanvasFormat::Rgb565,
            517 => CanvasFormat::Rgb565Thumb,
            1026 => CanvasFormat::Dxt3,
            2050 => CanvasFormat::Dxt5,
            other => return Err(Error::UnknownFormat(other)),
        })
    }

    /// Raw value as stored in the archive.
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Payload length the format requires for a `width` x `height` canvas.
    ///
    /// Linear formats need `width * height * bpp`; the thumb variant stores a
    /// `(width/16, height/16)` buffer; the block formats round each axis up
    /// to whole 4x4 tiles.
    pub fn expected_len(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            CanvasFormat::Bgra4444 | CanvasFormat::Argb1555 | CanvasFormat::Rgb565 => w * h * 2,
            CanvasFormat::Bgra8888 => w * h * 4,
            CanvasFormat::Rgb565Thumb => (w / 16) * (h / 16) * 2,
            CanvasFormat::Gray | CanvasFormat::Dxt3 | CanvasFormat::Dxt5 => {
                w.div_ceil(4) * h.div_ceil(4) * 16
            }
        }
    }

    /// Decodes an inflated pixel payload into an RGBA image.
    pub fn decode(self, width: u32, height: u32, data: &[u8]) -> Result<RgbaImage> {
        match self {
            CanvasFormat::Bgra4444 => bgra::decode_bgra4444(width, height, data),
            CanvasFormat::Bgra8888 => bgra::decode_bgra8888(width, height, data),
            CanvasFormat::Gray | CanvasFormat::Dxt3 => dxt::decode_dxt3(width, height, data),
            CanvasFormat::Argb1555 => rgb::decode_argb1555(width, height, data),
            CanvasFormat::Rgb565 => rgb::decode_rgb565(width, height, data),
            CanvasFormat::Rgb565Thumb => rgb::decode_rgb565_thumb(width, height, data),
            CanvasFormat::Dxt5 => dxt::decode_dxt5(width, height, data),
        }
    }
}

impl std::fmt::Display for CanvasFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CanvasFormat::Bgra4444 => "BGRA4444",
            CanvasFormat::Bgra8888 => "BGRA8888",
            CanvasFormat::Gray => "Gray",
            CanvasFormat::Argb1555 => "ARGB1555",
            CanvasFormat::Rgb565 => "RGB565",
            CanvasFormat::Rgb565Thumb => "RGB565Thumb",
            CanvasFormat::Dxt3 => "DXT3",
            CanvasFormat::Dxt5 => "DXT5",
        })
    }
}

pub(crate) fn new_canvas(width: u32, height: u32) -> Result<RgbaImage> {
    // RgbaImage::new would silently accept sizes whose buffer overflows
    // usize on 32-bit targets; reject them up front.
    let pixels = (width as u64).checked_mul(height as u64);
    match pixels {
        Some(n) if n.checked_mul(4).is_some_and(|b| b <= usize::MAX as u64) => {
            Ok(RgbaImage::new(width, height))
        }
        _ => Err(Error::DimensionsOutOfRange { width, height }),
    }
}

/// Fails unless the payload is at least `expected` bytes.
pub(crate) fn require_len(expected: usize, data: &[u8]) -> Result<()> {
    if data.len() < expected {
        return Err(Error::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Fails unless the payload is exactly `expected` bytes.
pub(crate) fn require_exact_len(expected: usize, data: &[u8]) -> Result<()> {
    if data.len() != expected {
        return Err(Error::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
