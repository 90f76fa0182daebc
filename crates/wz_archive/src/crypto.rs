//! Keystream cryptor and archive version hashing.
//!
//! WZ archives obfuscate strings and some payload blocks by XORing them
//! against a table derived from AES. The table is grown on demand: each
//! 16-byte extension encrypts the current IV in ECB mode and the ciphertext
//! becomes the next IV. Every transform indexes the table from zero — it is
//! a shared decoding table for the whole archive, not an advancing stream
//! cipher.

use std::cell::RefCell;

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;

use crate::error::{Error, Result};

/// The AES key every known client generation ships with.
const KEY: [u8; 32] = [
    0x13, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, //
    0x06, 0x00, 0x00, 0x00, 0xB4, 0x00, 0x00, 0x00, //
    0x1B, 0x00, 0x00, 0x00, 0x0F, 0x00, 0x00, 0x00, //
    0x33, 0x00, 0x00, 0x00, 0x52, 0x00, 0x00, 0x00, //
];

/// A 4-byte keystream initialization vector.
///
/// The all-zero IV disables string and payload decryption entirely, which is
/// how region-free and server-side archives are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv(pub [u8; 4]);

impl Iv {
    /// IV used by the global-service client generation.
    pub const GMS: Iv = Iv([0x4D, 0x23, 0xC7, 0x2B]);
    /// IV used by the European-service client generation.
    pub const EMS: Iv = Iv([0xB9, 0x7D, 0x63, 0xE9]);
    /// No encryption.
    pub const EMPTY: Iv = Iv([0x00, 0x00, 0x00, 0x00]);

    /// Parses a well-known name (`gms`, `ems`, `none`) or eight hex digits.
    pub fn parse(s: &str) -> Result<Iv> {
        match s.to_ascii_lowercase().as_str() {
            "gms" => return Ok(Iv::GMS),
            "ems" => return Ok(Iv::EMS),
            "none" | "empty" => return Ok(Iv::EMPTY),
            _ => {}
        }

        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 8 || !digits.is_ascii() {
            return Err(Error::InvalidIv(s.to_string()));
        }
        let mut iv = [0u8; 4];
        for (i, chunk) in iv.iter_mut().enumerate() {
            *chunk = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidIv(s.to_string()))?;
        }
        Ok(Iv(iv))
    }

    /// Whether this IV disables encryption.
    pub fn is_empty(self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

/// The lazily-grown XOR table shared by every source of an archive.
pub struct Cryptor {
    iv: [u8; 16],
    cipher: Option<Aes256>,
    xor: Vec<u8>,
}

impl Cryptor {
    pub fn new(iv: Iv) -> Cryptor {
        let mut repeated = [0u8; 16];
        for chunk in repeated.chunks_exact_mut(4) {
            chunk.copy_from_slice(&iv.0);
        }
        Cryptor {
            iv: repeated,
            cipher: (!iv.is_empty()).then(|| Aes256::new(&KEY.into())),
            xor: Vec::new(),
        }
    }

    /// Grows the table to at least `size` bytes, in whole 16-byte blocks.
    ///
    /// Without a cipher the appended blocks are zero; masked UTF-16 reads
    /// index the table unconditionally and rely on this.
    pub fn expand(&mut self, size: usize) {
        if size < self.xor.len() {
            return;
        }

        let blocks = (size - self.xor.len()).div_ceil(16);
        self.xor.reserve(blocks * 16);
        for _ in 0..blocks {
            // without a cipher the IV is all zero and stays that way, so the
            // table grows as zeros
            if let Some(cipher) = &self.cipher {
                let mut block = self.iv.into();
                cipher.encrypt_block(&mut block);
                self.iv.copy_from_slice(&block);
            }
            self.xor.extend_from_slice(&self.iv[..]);
        }
    }

    /// XORs `data` against the table, growing it as needed. No-op without a
    /// cipher.
    pub fn transform(&mut self, data: &mut [u8]) {
        if self.cipher.is_none() {
            return;
        }
        self.expand(data.len());
        for (b, k) in data.iter_mut().zip(&self.xor) {
            *b ^= k;
        }
    }

    /// The table built so far.
    pub fn keystream(&self) -> &[u8] {
        &self.xor
    }
}

/// Couples the keystream with the declared-version hash of an archive.
pub struct CryptProvider {
    hash: u32,
    cryptor: RefCell<Cryptor>,
}

impl CryptProvider {
    pub fn new(version: i32, iv: Iv) -> CryptProvider {
        let mut hash = 0u32;
        for digit in version.to_string().bytes() {
            hash = (hash << 5).wrapping_add(u32::from(digit) + 1);
        }
        CryptProvider {
            hash,
            cryptor: RefCell::new(Cryptor::new(iv)),
        }
    }

    /// The 32-bit offset-mixing constant derived from the version.
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Checks the archive's stored version checksum against the hash.
    pub fn verify(&self, stored: u16) -> Result<()> {
        let mut value = 0xFFu16;
        for i in 0..4 {
            value ^= ((self.hash >> (i << 3)) & 0xFF) as u16;
        }
        if value != stored {
            return Err(Error::InvalidVersion);
        }
        Ok(())
    }

    pub fn transform(&self, data: &mut [u8]) {
        self.cryptor.borrow_mut().transform(data);
    }

    /// Runs `f` over a keystream of at least `size` bytes.
    pub fn with_keystream<T>(&self, size: usize, f: impl FnOnce(&[u8]) -> T) -> T {
        let mut cryptor = self.cryptor.borrow_mut();
        cryptor.expand(size);
        f(cryptor.keystream())
    }
}
