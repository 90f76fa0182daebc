//! Shared fixtures: a minimal WZ composer that synthesizes archives for the
//! suites to read back. Every encoding here is the inverse of the library's
//! decoder; strings and payload blocks go through a real [`Cryptor`] so the
//! encrypted paths are exercised end to end.
//!
//! The keystream is indexed from zero by every transform, so unrelated
//! pieces can be encoded with independent cryptors and concatenated.

#![allow(dead_code)] // not every suite uses every helper

use std::io::Write as _;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use wz_archive::crypto::{CryptProvider, Cryptor, Iv};

pub const VERSION: i32 = 95;

/// Byte writer with the archive's string, integer and offset encodings.
pub struct Writer {
    pub buf: Vec<u8>,
    iv: Iv,
    hash: u32,
    start: u32,
}

impl Writer {
    /// Writer for a standalone image body (no header, no offset scrambling).
    pub fn body(iv: Iv) -> Writer {
        Writer {
            buf: Vec::new(),
            iv,
            hash: 0,
            start: 0,
        }
    }

    /// Writer for a whole `.wz` file: header, padding, version checksum.
    /// The root directory follows; call [`Writer::finish`] to patch the
    /// file size.
    pub fn file(version: i32, iv: Iv) -> Writer {
        let start = 20u32;
        let hash = CryptProvider::new(version, iv).hash();
        let mut checksum = 0xFFu16;
        for i in 0..4 {
            checksum ^= ((hash >> (i * 8)) & 0xFF) as u16;
        }

        let mut buf = Vec::new();
        buf.extend_from_slice(b"PKG1");
        buf.extend_from_slice(&0u64.to_le_bytes()); // patched by finish()
        buf.extend_from_slice(&start.to_le_bytes());
        buf.extend_from_slice(b"pad!"); // 16..20, unused by readers
        buf.extend_from_slice(&checksum.to_le_bytes());

        Writer {
            buf,
            iv,
            hash,
            start,
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        let size = self.buf.len() as u64;
        self.buf[4..12].copy_from_slice(&size.to_le_bytes());
        self.buf
    }

    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn compressed_i32(&mut self, v: i32) {
        if (-127..=127).contains(&v) {
            self.u8(v as i8 as u8);
        } else {
            self.u8(0x80);
            self.i32(v);
        }
    }

    pub fn compressed_i64(&mut self, v: i64) {
        if (-127..=127).contains(&v) {
            self.u8(v as i8 as u8);
        } else {
            self.u8(0x80);
            self.i64(v);
        }
    }

    /// Variant-length encrypted string, UTF-8 form (negative length header).
    pub fn enc_string(&mut self, s: &str) {
        let raw = s.as_bytes();
        if raw.is_empty() {
            self.u8(0);
            return;
        }
        if raw.len() <= 127 {
            self.u8((-(raw.len() as i32)) as i8 as u8);
        } else {
            self.u8(0x80);
            self.i32(raw.len() as i32);
        }

        let mut data = raw.to_vec();
        let mut mask = 0xAAu8;
        for b in &mut data {
            *b ^= mask;
            mask = mask.wrapping_add(1);
        }
        Cryptor::new(self.iv).transform(&mut data);
        self.bytes(&data);
    }

    /// Variant-length encrypted string, UTF-16 form (positive length header).
    pub fn enc_string_utf16(&mut self, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        if units.is_empty() {
            self.u8(0);
            return;
        }
        if units.len() <= 126 {
            self.u8(units.len() as u8);
        } else {
            self.u8(127);
            self.i32(units.len() as i32);
        }

        let mut cryptor = Cryptor::new(self.iv);
        cryptor.expand(units.len() * 2);
        let keystream = cryptor.keystream();
        let mut mask = 0xAAAAu16;
        for (i, &unit) in units.iter().enumerate() {
            let k = u16::from_le_bytes([keystream[i * 2], keystream[i * 2 + 1]]);
            self.u16(unit ^ mask ^ k);
            mask = mask.wrapping_add(1);
        }
    }

    /// Inline tagged string (key 0x00).
    pub fn tag(&mut self, name: &str) {
        self.u8(0x00);
        self.enc_string(name);
    }

    /// Tagged string reference (key 0x01) to `rel` past the image base.
    pub fn string_ref(&mut self, rel: i32) {
        self.u8(0x01);
        self.i32(rel);
    }

    /// Reserves a scrambled-offset field, to be patched once the target
    /// position is known.
    pub fn offset_placeholder(&mut self) -> usize {
        let at = self.pos();
        self.u32(0);
        at
    }

    /// Scrambles `target` for the field at `at`, inverting the reader's
    /// descrambler.
    pub fn patch_offset(&mut self, at: usize, target: u32) {
        let x = ((at as u32).wrapping_sub(self.start) ^ 0xFFFF_FFFF)
            .wrapping_mul(self.hash)
            .wrapping_sub(0x581C_3F6D);
        let x = x.rotate_left(x & 0x1F);
        let stored = x ^ target.wrapping_sub(self.start << 1);
        self.buf[at..at + 4].copy_from_slice(&stored.to_le_bytes());
    }

    /// Canvas payload: length prefix, separator, then a bare zlib stream.
    pub fn canvas_payload_plain(&mut self, pixels: &[u8]) {
        let compressed = deflate(pixels);
        self.i32((compressed.len() + 1) as i32);
        self.u8(0);
        self.bytes(&compressed);
    }

    /// Canvas payload split into keystream-encrypted blocks.
    pub fn canvas_payload_chunked(&mut self, pixels: &[u8], chunk_len: usize) {
        let compressed = deflate(pixels);
        let chunks: Vec<&[u8]> = compressed.chunks(chunk_len).collect();

        let total = 1 + chunks.iter().map(|c| 4 + c.len()).sum::<usize>();
        self.i32(total as i32);
        self.u8(0);
        for chunk in chunks {
            let mut block = chunk.to_vec();
            Cryptor::new(self.iv).transform(&mut block);
            self.u32(block.len() as u32);
            self.bytes(&block);
        }
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// One directory entry of a synthesized file.
pub enum Entry {
    Dir(Vec<(String, Entry)>),
    Image(Vec<u8>),
}

impl Entry {
    pub fn dir(children: Vec<(&str, Entry)>) -> Entry {
        Entry::Dir(
            children
                .into_iter()
                .map(|(name, entry)| (name.to_string(), entry))
                .collect(),
        )
    }
}

/// Builds a complete `.wz` file around the given root directory.
pub fn build_file(version: i32, iv: Iv, root: Vec<(&str, Entry)>) -> Vec<u8> {
    let mut writer = Writer::file(version, iv);
    let root: Vec<(String, Entry)> = root
        .into_iter()
        .map(|(name, entry)| (name.to_string(), entry))
        .collect();
    write_directory(&mut writer, &root);
    writer.finish()
}

fn write_directory(writer: &mut Writer, entries: &[(String, Entry)]) {
    writer.compressed_i32(entries.len() as i32);

    let mut fixups = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        match entry {
            Entry::Dir(_) => writer.u8(3),
            Entry::Image(_) => writer.u8(4),
        }
        writer.enc_string(name);
        let size = match entry {
            Entry::Image(body) => body.len() as i32,
            Entry::Dir(_) => 0,
        };
        writer.compressed_i32(size);
        writer.compressed_i32(0); // checksum, carried but unverified
        fixups.push(writer.offset_placeholder());
    }

    for ((_, entry), fixup) in entries.iter().zip(fixups) {
        let target = writer.pos() as u32;
        writer.patch_offset(fixup, target);
        match entry {
            Entry::Image(body) => writer.bytes(body),
            Entry::Dir(children) => write_directory(writer, children),
        }
    }
}

// ---- prefabricated image bodies ----

/// Accumulates `(name, variant)` pairs for a property block.
pub struct PropertyWriter {
    iv: Iv,
    count: i32,
    entries: Vec<u8>,
}

impl PropertyWriter {
    fn push(&mut self, f: impl FnOnce(&mut Writer)) {
        let mut writer = Writer::body(self.iv);
        f(&mut writer);
        self.entries.extend_from_slice(&writer.buf);
        self.count += 1;
    }

    pub fn nil(&mut self, name: &str) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x00);
        });
    }

    pub fn int16(&mut self, name: &str, value: i16) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x02);
            w.i16(value);
        });
    }

    pub fn int32(&mut self, name: &str, value: i32) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x03);
            w.compressed_i32(value);
        });
    }

    pub fn int64(&mut self, name: &str, value: i64) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x14);
            w.compressed_i64(value);
        });
    }

    pub fn float32(&mut self, name: &str, value: f32) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x04);
            if value == 0.0 {
                w.u8(0x00);
            } else {
                w.u8(0x80);
                w.f32(value);
            }
        });
    }

    pub fn float64(&mut self, name: &str, value: f64) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x05);
            w.f64(value);
        });
    }

    pub fn string(&mut self, name: &str, value: &str) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x08);
            w.tag(value);
        });
    }

    pub fn string_utf16(&mut self, name: &str, value: &str) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x08);
            w.u8(0x00);
            w.enc_string_utf16(value);
        });
    }

    /// Embeds a pre-built image body with its advertised size.
    pub fn image(&mut self, name: &str, body: &[u8]) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x09);
            w.i32(body.len() as i32);
            w.bytes(body);
        });
    }

    /// Embeds an image body while lying about its size.
    pub fn image_with_size(&mut self, name: &str, body: &[u8], advertised: i32) {
        self.push(|w| {
            w.tag(name);
            w.u8(0x09);
            w.i32(advertised);
            w.bytes(body);
        });
    }
}

fn property_block(iv: Iv, build: impl FnOnce(&mut PropertyWriter)) -> Vec<u8> {
    let mut props = PropertyWriter {
        iv,
        count: 0,
        entries: Vec::new(),
    };
    build(&mut props);

    let mut writer = Writer::body(iv);
    writer.u16(0); // reserved
    writer.compressed_i32(props.count);
    writer.bytes(&props.entries);
    writer.buf
}

/// `Property` image body.
pub fn property_body(iv: Iv, build: impl FnOnce(&mut PropertyWriter)) -> Vec<u8> {
    let mut writer = Writer::body(iv);
    writer.tag("Property");
    writer.bytes(&property_block(iv, build));
    writer.buf
}

/// `Shape2D#Vector2D` image body.
pub fn vector_body(iv: Iv, x: i32, y: i32) -> Vec<u8> {
    let mut writer = Writer::body(iv);
    writer.tag("Shape2D#Vector2D");
    writer.compressed_i32(x);
    writer.compressed_i32(y);
    writer.buf
}

/// `UOL` image body.
pub fn uol_body(iv: Iv, target: &str) -> Vec<u8> {
    let mut writer = Writer::body(iv);
    writer.tag("UOL");
    writer.u8(0);
    writer.tag(target);
    writer.buf
}

/// `Shape2D#Convex2D` image body from pre-built sub-image bodies.
pub fn convex_body(iv: Iv, items: &[Vec<u8>]) -> Vec<u8> {
    let mut writer = Writer::body(iv);
    writer.tag("Shape2D#Convex2D");
    writer.compressed_i32(items.len() as i32);
    for item in items {
        writer.bytes(item);
    }
    writer.buf
}

/// `Canvas` image body; `chunked` selects the keystream-encrypted payload
/// layout.
pub fn canvas_body(
    iv: Iv,
    (width, height): (i32, i32),
    format: i32,
    pixels: &[u8],
    chunked: bool,
    property: Option<&dyn Fn(&mut PropertyWriter)>,
) -> Vec<u8> {
    let mut writer = Writer::body(iv);
    writer.tag("Canvas");
    writer.u8(0);
    match property {
        Some(build) => {
            writer.u8(1);
            let block = property_block(iv, build);
            writer.bytes(&block);
        }
        None => writer.u8(0),
    }
    writer.compressed_i32(width);
    writer.compressed_i32(height);
    writer.compressed_i32(format);
    writer.u8(0);
    writer.i32(0); // reserved, must be zero
    if chunked {
        writer.canvas_payload_chunked(pixels, 7);
    } else {
        writer.canvas_payload_plain(pixels);
    }
    writer.buf
}

/// Parameters for a synthesized `Sound_DX8` body.
pub struct SoundSpec {
    pub format_tag: u16,
    pub channels: u16,
    pub samples_per_sec: u32,
    pub bits_per_sample: u16,
    pub duration_ms: i32,
    /// Store the wave-format block XORed with the keystream.
    pub encrypted: bool,
    /// Non-zero drops the wave-format block: the payload follows the fixed
    /// media header directly.
    pub reserved1: u8,
}

/// Builds a `Sound_DX8` body; returns it with the `ExtraSize` the reader
/// should report.
pub fn sound_body(iv: Iv, spec: &SoundSpec, payload: &[u8]) -> (Vec<u8>, u16) {
    let mut writer = Writer::body(iv);
    writer.tag("Sound_DX8");
    writer.u8(0); // reserved
    writer.compressed_i32(payload.len() as i32);
    writer.compressed_i32(spec.duration_ms);

    // AM_MEDIA_TYPE-shaped header
    writer.u8(2);
    writer.bytes(&[0x11; 16]); // major type
    writer.bytes(&[0x22; 16]); // sub type
    writer.u8(spec.reserved1);
    writer.u8(0);
    writer.bytes(&[0x33; 16]); // format type

    if spec.reserved1 != 0 {
        writer.bytes(payload);
        return (writer.buf, 0);
    }

    // the reader decrypts the wave block when its stored ExtraSize word is
    // non-zero; pick an extra size whose stored form cannot be zero
    let extra_size: u16 = if spec.encrypted {
        let mut probe = Cryptor::new(iv);
        probe.expand(18);
        let k = u16::from_le_bytes([probe.keystream()[16], probe.keystream()[17]]);
        if k == 2 {
            4
        } else {
            2
        }
    } else {
        0
    };

    let mut wave = Vec::new();
    wave.extend_from_slice(&spec.format_tag.to_le_bytes());
    wave.extend_from_slice(&spec.channels.to_le_bytes());
    wave.extend_from_slice(&spec.samples_per_sec.to_le_bytes());
    let byte_rate =
        spec.samples_per_sec * u32::from(spec.channels) * u32::from(spec.bits_per_sample) / 8;
    wave.extend_from_slice(&byte_rate.to_le_bytes());
    let block_align = spec.channels * spec.bits_per_sample / 8;
    wave.extend_from_slice(&block_align.to_le_bytes());
    wave.extend_from_slice(&spec.bits_per_sample.to_le_bytes());
    wave.extend_from_slice(&extra_size.to_le_bytes());
    wave.extend(std::iter::repeat(0xEE).take(extra_size as usize));

    if spec.encrypted {
        Cryptor::new(iv).transform(&mut wave);
    }
    writer.u8(wave.len() as u8);
    writer.bytes(&wave);

    writer.bytes(payload);
    (writer.buf, extra_size)
}
