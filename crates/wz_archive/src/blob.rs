//! Positioned binary reader over a mounted source.
//!
//! Everything in a WZ file is little-endian. On top of the fixed-width
//! scalars the format leans on two compressed integer encodings and a family
//! of obfuscated string layouts, all of which live here so the parsers above
//! can stay declarative.

use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use widestring::U16String;

use crate::crypto::CryptProvider;
use crate::error::{Error, Result};

/// A mounted random-access byte source.
pub(crate) trait Source: Read + Seek {}

impl<T: Read + Seek> Source for T {}

/// Reader over one mounted source, sharing the archive's cryptor.
pub(crate) struct Blob {
    reader: Option<Box<dyn Source>>,
    len: u64,
    provider: Rc<CryptProvider>,
}

impl Blob {
    pub fn new(reader: Box<dyn Source>, len: u64, provider: Rc<CryptProvider>) -> Blob {
        Blob {
            reader: Some(reader),
            len,
            provider,
        }
    }

    /// Drops the underlying source; every later read fails.
    pub fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }

    pub fn reader(&mut self) -> Result<&mut Box<dyn Source>> {
        self.reader.as_mut().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "read on a closed archive source",
            ))
        })
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.reader()?.stream_position().map_err(map_io)?)
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        // seeks relative to the end use the recorded source length, so they
        // behave the same for files and in-memory sources
        let pos = match pos {
            SeekFrom::End(delta) => SeekFrom::Start(
                self.len
                    .checked_add_signed(delta)
                    .ok_or_else(negative_seek)?,
            ),
            other => other,
        };
        Ok(self.reader()?.seek(pos).map_err(map_io)?)
    }

    /// Runs `f` and restores the cursor afterwards, whether or not it failed.
    pub fn peek<T>(&mut self, f: impl FnOnce(&mut Blob) -> Result<T>) -> Result<T> {
        let saved = self.position()?;
        let out = f(self);
        let restored = self.seek(SeekFrom::Start(saved));
        match (out, restored) {
            (Ok(value), Ok(_)) => Ok(value),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        }
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader()?.read_exact(buf).map_err(map_io)
    }

    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.reader()?.read_u8().map_err(map_io)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.reader()?.read_i8().map_err(map_io)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.reader()?.read_u16::<LittleEndian>().map_err(map_io)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.reader()?.read_i16::<LittleEndian>().map_err(map_io)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.reader()?.read_u32::<LittleEndian>().map_err(map_io)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.reader()?.read_i32::<LittleEndian>().map_err(map_io)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.reader()?.read_i64::<LittleEndian>().map_err(map_io)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.reader()?.read_f32::<LittleEndian>().map_err(map_io)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.reader()?.read_f64::<LittleEndian>().map_err(map_io)
    }

    /// One byte if it fits in `[-127, 127]`, otherwise a `-128` marker
    /// followed by a full little-endian `i32`.
    pub fn read_compressed_i32(&mut self) -> Result<i32> {
        let flag = self.read_i8()?;
        if flag == -128 {
            self.read_i32()
        } else {
            Ok(i32::from(flag))
        }
    }

    /// Like [`Blob::read_compressed_i32`] with an `i64` wide form.
    pub fn read_compressed_i64(&mut self) -> Result<i64> {
        let flag = self.read_i8()?;
        if flag == -128 {
            self.read_i64()
        } else {
            Ok(i64::from(flag))
        }
    }

    /// `len` masked UTF-8 bytes: rolling XOR mask starting at 0xAA, then the
    /// archive keystream.
    pub fn read_utf8_string(&mut self, len: usize) -> Result<String> {
        let mut buf = self.read_vec(len)?;
        let mut mask = 0xAAu8;
        for b in &mut buf {
            *b ^= mask;
            mask = mask.wrapping_add(1);
        }
        self.provider.transform(&mut buf);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// `units` masked UTF-16LE code units: per-unit rolling mask starting at
    /// 0xAAAA XORed against the keystream read as little-endian words.
    pub fn read_utf16_string(&mut self, units: usize) -> Result<String> {
        let size = units * 2;
        let buf = self.read_vec(size)?;

        let decoded = self.provider.with_keystream(size, |keystream| {
            let mut mask = 0xAAAAu16;
            let mut code_units = Vec::with_capacity(units);
            for i in (0..size).step_by(2) {
                code_units.push(
                    LittleEndian::read_u16(&buf[i..])
                        ^ mask
                        ^ LittleEndian::read_u16(&keystream[i..]),
                );
                mask = mask.wrapping_add(1);
            }
            U16String::from_vec(code_units).to_string_lossy()
        });
        Ok(decoded)
    }

    /// Variant-length encrypted string: the sign of the length byte selects
    /// UTF-16 (positive) or UTF-8 (negative); `-128` and `127` spill the real
    /// length into an `i32`.
    pub fn read_encrypted_string(&mut self) -> Result<String> {
        let flag = self.read_i8()?;
        let unicode = flag > 0;

        let mut len = i32::from(flag);
        if len == -128 || len == 127 {
            len = self.read_i32()?;
        }
        if len == 0 {
            return Ok(String::new());
        }

        if unicode {
            let units = usize::try_from(len).map_err(|_| Error::Truncated)?;
            self.read_utf16_string(units)
        } else {
            self.read_utf8_string(len.unsigned_abs() as usize)
        }
    }

    /// A string that is either inline or a reference to an earlier string
    /// interned at `base_offset + rel` within the same image.
    pub fn read_uol_string(&mut self, base_offset: u64) -> Result<String> {
        match self.read_u8()? {
            0x00 | 0x73 => self.read_encrypted_string(),
            0x01 | 0x1B => {
                let rel = self.read_i32()?;
                let target = u64::try_from(base_offset as i64 + i64::from(rel))
                    .map_err(|_| negative_seek())
                    .map_err(Error::Io)?;
                self.peek(|blob| {
                    blob.seek(SeekFrom::Start(target))?;
                    blob.read_encrypted_string()
                })
            }
            key => Err(Error::InvalidUolKey(key)),
        }
    }
}

fn map_io(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated
    } else {
        Error::Io(e)
    }
}

fn negative_seek() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "seek before start of source")
}
