//! DXT3 / DXT5 block decompression.
//!
//! Both formats pack 4x4 pixel tiles into 16-byte blocks: an alpha half
//! (explicit nibbles for DXT3, a two-endpoint interpolation table for DXT5)
//! followed by two RGB565 reference colors and sixteen 2-bit color indices.
//!
//! Two quirks of the reference client are kept intact rather than corrected:
//! the color table takes the DXT1-style branch on `c0 > c1` (real DXT3/5
//! always interpolate four colors), and the block offset is computed as
//! `x*4 + y*width` while scanning tiles.

use byteorder::{ByteOrder, LittleEndian};
use image::{Rgba, RgbaImage};

use crate::rgb::rgb565_channels;
use crate::{new_canvas, require_exact_len, Result};

/// Decodes a DXT3 payload: 4-bit explicit alpha per pixel.
pub fn decode_dxt3(width: u32, height: u32, data: &[u8]) -> Result<RgbaImage> {
    require_exact_len(block_len(width, height), data)?;
    decode_blocks(width, height, data, dxt3_alphas)
}

/// Decodes a DXT5 payload: interpolated 3-bit-indexed alpha per pixel.
pub fn decode_dxt5(width: u32, height: u32, data: &[u8]) -> Result<RgbaImage> {
    require_exact_len(block_len(width, height), data)?;
    decode_blocks(width, height, data, dxt5_alphas)
}

fn block_len(width: u32, height: u32) -> usize {
    (width as usize).div_ceil(4) * (height as usize).div_ceil(4) * 16
}

fn decode_blocks(
    width: u32,
    height: u32,
    data: &[u8],
    alphas: impl Fn(&[u8]) -> [u8; 16],
) -> Result<RgbaImage> {
    let mut img = new_canvas(width, height)?;

    for y in (0..height).step_by(4) {
        for x in (0..width).step_by(4) {
            let offset = (x as usize) * 4 + (y as usize) * width as usize;
            // the offset quirk can land past the buffer for widths that are
            // not multiples of 4; such tiles stay transparent
            let Some(block) = data.get(offset..offset + 16) else {
                continue;
            };

            let alpha = alphas(&block[..8]);
            let c0 = LittleEndian::read_u16(&block[8..10]);
            let c1 = LittleEndian::read_u16(&block[10..12]);
            let colors = color_table(c0, c1);
            let indices = color_indices(&block[12..16]);

            for py in 0..4u32 {
                for px in 0..4u32 {
                    if x + px < width && y + py < height {
                        let i = (py * 4 + px) as usize;
                        let [r, g, b] = colors[indices[i] as usize];
                        img.put_pixel(x + px, y + py, Rgba([r, g, b, alpha[i]]));
                    }
                }
            }
        }
    }
    Ok(img)
}

/// Expands the sixteen explicit DXT3 alpha nibbles.
fn dxt3_alphas(half: &[u8]) -> [u8; 16] {
    let mut alphas = [0u8; 16];
    for (i, slot) in alphas.iter_mut().enumerate() {
        let n = if i % 2 == 0 {
            half[i / 2] & 0x0F
        } else {
            half[i / 2] >> 4
        };
        *slot = n | (n << 4);
    }
    alphas
}

/// Resolves the sixteen DXT5 alphas through the interpolation table.
fn dxt5_alphas(half: &[u8]) -> [u8; 16] {
    let table = alpha_table(half[0], half[1]);
    let indices = alpha_indices(&half[2..8]);

    let mut alphas = [0u8; 16];
    for (slot, index) in alphas.iter_mut().zip(indices) {
        *slot = table[index as usize];
    }
    alphas
}

/// Builds the 4-entry color table from the two RGB565 endpoints.
fn color_table(c0: u16, c1: u16) -> [[u8; 3]; 4] {
    let a = rgb565_channels(c0);
    let b = rgb565_channels(c1);

    let mut table = [a, b, [0; 3], [0; 3]];
    for ch in 0..3 {
        let (ca, cb) = (u16::from(a[ch]), u16::from(b[ch]));
        if c0 > c1 {
            table[2][ch] = ((ca * 2 + cb + 1) / 3) as u8;
            table[3][ch] = ((ca + cb * 2 + 1) / 3) as u8;
        } else {
            table[2][ch] = ((ca + cb) / 2) as u8;
            // table[3] stays opaque black
        }
    }
    table
}

/// Unpacks the sixteen 2-bit color indices from the tail of a block.
fn color_indices(data: &[u8]) -> [u8; 16] {
    let mut indices = [0u8; 16];
    for (i, slot) in indices.iter_mut().enumerate() {
        *slot = (data[i / 4] >> ((i % 4) * 2)) & 0x03;
    }
    indices
}

/// Builds the 8-entry DXT5 alpha table from its two endpoints.
fn alpha_table(a0: u8, a1: u8) -> [u8; 8] {
    let mut table = [0u8; 8];
    table[0] = a0;
    table[1] = a1;
    let (a0, a1) = (i32::from(a0), i32::from(a1));
    if a0 > a1 {
        for i in 2..8 {
            table[i] = (((8 - i as i32) * a0 + (i as i32 - 1) * a1 + 3) / 7) as u8;
        }
    } else {
        for i in 2..6 {
            table[i] = (((6 - i as i32) * a0 + (i as i32 - 1) * a1 + 2) / 5) as u8;
        }
        table[6] = 0;
        table[7] = 0xFF;
    }
    table
}

/// Unpacks the sixteen 3-bit alpha indices, LSB-first within each 24-bit half.
fn alpha_indices(data: &[u8]) -> [u8; 16] {
    let mut indices = [0u8; 16];
    for half in 0..2 {
        let flags = u32::from(data[half * 3])
            | u32::from(data[half * 3 + 1]) << 8
            | u32::from(data[half * 3 + 2]) << 16;
        for j in 0..8 {
            indices[half * 8 + j] = ((flags >> (3 * j)) & 0x07) as u8;
        }
    }
    indices
}
