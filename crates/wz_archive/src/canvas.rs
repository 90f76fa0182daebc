//! Canvas nodes: dimensions, storage format, and on-demand pixel decoding.

use std::io::{self, Read, SeekFrom};
use std::rc::Rc;

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use image::RgbaImage;
use tracing::trace;
use wz_image::CanvasFormat;

use crate::blob::Blob;
use crate::error::{Error, Result};
use crate::file::WzFile;
use crate::node::{parse_property, Node, NodeRef};
use crate::types::Vector;

/// Little-endian u16 values that open a bare zlib stream.
const ZLIB_HEADERS: [u16; 4] = [0x9C78, 0xDA78, 0x0178, 0x5E78];

/// An image-bearing node. Pixels stay compressed in the source until
/// [`Canvas::image`] is called.
pub struct Canvas {
    file: Rc<WzFile>,
    property: Option<NodeRef>,
    width: i32,
    height: i32,
    format: CanvasFormat,
    payload_offset: u64,
    payload_size: i32,
}

impl Canvas {
    /// Decodes the canvas structure; the cursor sits just past the "Canvas"
    /// tag string.
    pub(crate) fn parse(file: &Rc<WzFile>, base_offset: u64, blob: &mut Blob) -> Result<Canvas> {
        blob.seek(SeekFrom::Current(1))?;

        let has_property = blob.read_u8()?;
        let property = if has_property > 0 {
            let offset = blob.position()?;
            let body = parse_property(file, base_offset, blob)?;
            Some(Node::parsed(file.clone(), offset, base_offset, body))
        } else {
            None
        };

        let width = blob.read_compressed_i32()?;
        let height = blob.read_compressed_i32()?;
        let fmt1 = blob.read_compressed_i32()?;
        let fmt2 = blob.read_u8()?;
        let format = CanvasFormat::from_raw(fmt1 + i32::from(fmt2))?;

        if blob.read_i32()? != 0 {
            return Err(Error::InvalidCanvasStruct);
        }

        let payload_size = blob.read_i32()?;
        let payload_offset = blob.position()?;
        blob.seek(SeekFrom::Current(i64::from(payload_size)))?;

        Ok(Canvas {
            file: file.clone(),
            property,
            width,
            height,
            format,
            payload_offset,
            payload_size,
        })
    }

    /// Dimensions in pixels.
    pub fn size(&self) -> Vector {
        Vector::new(self.width, self.height)
    }

    /// On-disk pixel storage format.
    pub fn format(&self) -> CanvasFormat {
        self.format
    }

    /// The property subtree attached to the canvas, if any. Holds things
    /// like origin vectors and frame delays.
    pub fn property(&self) -> Option<&NodeRef> {
        self.property.as_ref()
    }

    /// Reads, decrypts, inflates and decodes the pixel payload.
    pub fn image(&self) -> Result<RgbaImage> {
        let inflated = self.inflated_payload()?;
        let width = self.width.max(0) as u32;
        let height = self.height.max(0) as u32;
        trace!(width, height, format = %self.format, "decoding canvas");
        Ok(self.format.decode(width, height, &inflated)?)
    }

    fn inflated_payload(&self) -> Result<Vec<u8>> {
        if self.payload_size < 1 {
            return Err(Error::Truncated);
        }

        // the first payload byte is a separator
        let data = {
            let mut blob = self.file.blob.borrow_mut();
            blob.seek(SeekFrom::Start(self.payload_offset + 1))?;
            blob.read_vec(self.payload_size as usize - 1)?
        };
        if data.len() < 2 {
            return Err(Error::Truncated);
        }

        let header = LittleEndian::read_u16(&data);
        if ZLIB_HEADERS.contains(&header) {
            inflate(&data)
        } else {
            // a sequence of length-prefixed blocks, each XORed with the
            // archive keystream
            let mut joined = Vec::with_capacity(data.len());
            let mut rest = &data[..];
            while !rest.is_empty() {
                if rest.len() < 4 {
                    return Err(Error::Truncated);
                }
                let block_len = LittleEndian::read_u32(rest) as usize;
                rest = &rest[4..];
                if block_len > rest.len() {
                    return Err(Error::Truncated);
                }
                let mut block = rest[..block_len].to_vec();
                self.file.shared.provider.transform(&mut block);
                joined.extend_from_slice(&block);
                rest = &rest[block_len..];
            }
            inflate(&joined)
        }
    }
}

/// Inflates a zlib stream, tolerating a truncated tail the way the
/// reference client does.
fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Error::Zlib(e)),
        }
    }
    Ok(out)
}
