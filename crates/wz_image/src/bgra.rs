//! BGRA8888 and BGRA4444 decoders.

use image::{Rgba, RgbaImage};

use crate::{new_canvas, require_len, Result};

/// Decodes a 4-byte-per-pixel buffer in B, G, R, A channel order.
pub fn decode_bgra8888(width: u32, height: u32, data: &[u8]) -> Result<RgbaImage> {
    require_len(width as usize * height as usize * 4, data)?;

    let mut img = new_canvas(width, height)?;
    for (i, px) in img.pixels_mut().enumerate() {
        let p = &data[i * 4..i * 4 + 4];
        *px = Rgba([p[2], p[1], p[0], p[3]]);
    }
    Ok(img)
}

/// Decodes a 2-byte-per-pixel buffer of packed nibbles: byte 0 holds
/// `(G << 4) | B`, byte 1 holds `(A << 4) | R`.
pub fn decode_bgra4444(width: u32, height: u32, data: &[u8]) -> Result<RgbaImage> {
    require_len(width as usize * height as usize * 2, data)?;

    let mut img = new_canvas(width, height)?;
    for (i, px) in img.pixels_mut().enumerate() {
        let bg = data[i * 2];
        let ra = data[i * 2 + 1];
        *px = Rgba([
            expand_nibble(ra & 0x0F),
            expand_nibble((bg >> 4) & 0x0F),
            expand_nibble(bg & 0x0F),
            expand_nibble((ra >> 4) & 0x0F),
        ]);
    }
    Ok(img)
}

fn expand_nibble(v: u8) -> u8 {
    v | (v << 4)
}
