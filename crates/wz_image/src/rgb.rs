//! ARGB1555, RGB565 and RGB565Thumb decoders.

use byteorder::{ByteOrder, LittleEndian};
use image::{Rgba, RgbaImage};

use crate::{new_canvas, require_len, Result};

/// Decodes a 2-byte-per-pixel buffer with a 1-bit alpha and 5-bit channels.
///
/// The 5-bit channels are widened with low-bit replication, so `0x1F` maps
/// to a full `0xFF`.
pub fn decode_argb1555(width: u32, height: u32, data: &[u8]) -> Result<RgbaImage> {
    require_len(width as usize * height as usize * 2, data)?;

    let mut img = new_canvas(width, height)?;
    for (i, px) in img.pixels_mut().enumerate() {
        let c = LittleEndian::read_u16(&data[i * 2..]);
        let a = (((c >> 15) & 0x1) * 0xFF) as u8;
        *px = Rgba([
            expand5((c >> 10) & 0x1F),
            expand5((c >> 5) & 0x1F),
            expand5(c & 0x1F),
            a,
        ]);
    }
    Ok(img)
}

/// Decodes a 2-byte-per-pixel RGB565 buffer. Always opaque.
///
/// Channels are widened by plain shifts (no replication), matching the
/// reference client; pure red therefore decodes to `(248, 0, 0)`.
pub fn decode_rgb565(width: u32, height: u32, data: &[u8]) -> Result<RgbaImage> {
    require_len(width as usize * height as usize * 2, data)?;

    let mut img = new_canvas(width, height)?;
    for (i, px) in img.pixels_mut().enumerate() {
        *px = rgb565_pixel(LittleEndian::read_u16(&data[i * 2..]));
    }
    Ok(img)
}

/// Decodes an RGB565 buffer stored at `(width/16, height/16)`, point-sampling
/// each stored pixel back over a 16x16 cell.
pub fn decode_rgb565_thumb(width: u32, height: u32, data: &[u8]) -> Result<RgbaImage> {
    let tw = (width / 16) as usize;
    let th = (height / 16) as usize;
    require_len(tw * th * 2, data)?;

    let mut img = new_canvas(width, height)?;
    for (x, y, px) in img.enumerate_pixels_mut() {
        let tx = (x / 16) as usize;
        let ty = (y / 16) as usize;
        if tx < tw && ty < th {
            *px = rgb565_pixel(LittleEndian::read_u16(&data[(ty * tw + tx) * 2..]));
        }
    }
    Ok(img)
}

pub(crate) fn rgb565_pixel(c: u16) -> Rgba<u8> {
    let [r, g, b] = rgb565_channels(c);
    Rgba([r, g, b, 0xFF])
}

/// Widens an RGB565 word into 8-bit channels by plain shifts.
pub(crate) fn rgb565_channels(c: u16) -> [u8; 3] {
    [
        (((c >> 11) & 0x1F) << 3) as u8,
        (((c >> 5) & 0x3F) << 2) as u8,
        ((c & 0x1F) << 3) as u8,
    ]
}

fn expand5(v: u16) -> u8 {
    ((v << 3) | (v >> 2)) as u8
}
