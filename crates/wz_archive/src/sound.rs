//! Sound nodes: DirectShow-style media headers and the byte stream behind
//! them.
//!
//! The header block conflates several client generations. The media type is
//! fixed-size; the wave-format block that follows is length-prefixed and is
//! sometimes stored XORed with the archive keystream — a non-zero
//! `ExtraSize` field before decryption is the tell.

use std::io::{Cursor, SeekFrom};
use std::rc::Rc;
use std::time::Duration;

use binrw::BinRead;
use byteorder::{ByteOrder, LittleEndian};

use crate::blob::Blob;
use crate::error::{Error, Result};
use crate::file::WzFile;

/// PCM wave data; wrapped in a RIFF header on output.
pub const FORMAT_TAG_PCM: u16 = 1;
/// MPEG layer-3 data; passed through untouched.
pub const FORMAT_TAG_MP3: u16 = 85;

/// The fixed DirectShow `AM_MEDIA_TYPE`-shaped header of a sound body.
#[derive(BinRead, Debug, Clone, PartialEq, Eq)]
#[br(little)]
pub struct MediaType {
    pub sound_type: u8,
    pub major_type: [u8; 16],
    pub sub_type: [u8; 16],
    pub reserved1: u8,
    pub reserved2: u8,
    pub format_type: [u8; 16],
}

/// `WAVEFORMATEX`, little-endian.
#[derive(BinRead, Debug, Clone, Default, PartialEq, Eq)]
#[br(little)]
pub struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub samples_per_sec: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub extra_size: u16,
}

/// A sound-bearing node. The payload stays in the source until
/// [`Sound::stream`] is called.
pub struct Sound {
    file: Rc<WzFile>,
    media: MediaType,
    format: WaveFormat,
    extra: Vec<u8>,
    duration_ms: i32,
    payload_offset: u64,
    payload_size: i32,
}

impl Sound {
    /// Decodes the sound structure; the cursor sits just past the
    /// "Sound_DX8" tag string.
    pub(crate) fn parse(file: &Rc<WzFile>, blob: &mut Blob) -> Result<Sound> {
        blob.read_u8()?; // reserved

        let payload_size = blob.read_compressed_i32()?;
        let duration_ms = blob.read_compressed_i32()?;

        let media = MediaType::read(blob.reader()?)?;

        // a length-prefixed wave-format block only follows when reserved1 is
        // clear; otherwise the payload starts right after the media header
        let mut format = WaveFormat::default();
        let mut extra = Vec::new();
        if media.reserved1 == 0 {
            let header_len = blob.read_u8()?;
            if header_len < 18 {
                return Err(Error::UnsupportedSoundHeader);
            }
            let mut header = blob.read_vec(header_len as usize)?;
            // a sane ExtraSize is zero here; anything else means the block
            // was stored encrypted
            if LittleEndian::read_u16(&header[16..18]) != 0 {
                file.shared.provider.transform(&mut header);
            }
            format = WaveFormat::read(&mut Cursor::new(&header))?;
            extra = header[18..].to_vec();
        }

        let payload_offset = blob.position()?;
        blob.seek(SeekFrom::Current(i64::from(payload_size)))?;

        Ok(Sound {
            file: file.clone(),
            media,
            format,
            extra,
            duration_ms,
            payload_offset,
            payload_size,
        })
    }

    /// Play length as declared by the archive.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms.max(0) as u64)
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media
    }

    pub fn wave_format(&self) -> &WaveFormat {
        &self.format
    }

    /// Bytes of the wave-format block beyond the fixed 18.
    pub fn extra(&self) -> &[u8] {
        &self.extra
    }

    /// The sound bytes. PCM data gets a synthesized RIFF/WAVE header unless
    /// `raw` is set; every other format tag passes through unchanged.
    pub fn stream(&self, raw: bool) -> Result<Vec<u8>> {
        let payload = {
            let mut blob = self.file.blob.borrow_mut();
            blob.seek(SeekFrom::Start(self.payload_offset))?;
            blob.read_vec(self.payload_size.max(0) as usize)?
        };

        if self.format.format_tag == FORMAT_TAG_PCM && !raw {
            Ok(wrap_riff(&self.format, &payload))
        } else {
            Ok(payload)
        }
    }
}

/// Prepends a minimal RIFF/WAVE header to raw PCM data.
fn wrap_riff(format: &WaveFormat, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() as u32;
    let byte_rate =
        format.samples_per_sec * u32::from(format.channels) * u32::from(format.bits_per_sample) / 8;
    let frame_size = format.channels * format.bits_per_sample / 8;

    let mut out = Vec::with_capacity(44 + payload.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(size + 36).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&format.format_tag.to_le_bytes());
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.samples_per_sec.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&frame_size.to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(payload);
    out
}
