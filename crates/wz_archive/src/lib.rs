//! This library reads **WZ** archives, the asset container used by a family
//! of 2D game clients.
//!
//! # WZ Archive Format Documentation
//!
//! A WZ archive bundles a game's assets — images, sounds, and game-data
//! trees — under one logical directory tree, split across one or more
//! obfuscated `.wz` files. This crate opens such archives, lazily walks the
//! tree by path, and materializes leaves as typed values.
//!
//! ## File Structure
//!
//! Every `.wz` file starts with a fixed header, followed at `start` by an
//! encrypted version checksum and the root directory.
//!
//! | Offset (bytes) | Field            | Description                                  |
//! |----------------|------------------|----------------------------------------------|
//! | 0x0000         | Magic number     | 4 bytes: 0x31474B50 ("PKG1")                 |
//! | 0x0004         | File size        | 8 bytes: total size of the file              |
//! | 0x000C         | Start            | 4 bytes: offset of the version checksum      |
//! | `start`        | Version checksum | 2 bytes: derived from the declared version   |
//! | `start` + 2    | Root directory   | element count, then one entry per element    |
//!
//! ## Obfuscation
//!
//! Strings and some payload blocks are XORed against a keystream grown from
//! AES-ECB encryptions of a rolling IV ([`crypto`]). Directory data offsets
//! are scrambled with a constant derived from the declared client version
//! and the field's own position. Opening an archive therefore requires the
//! matching version number and IV; two well-known IVs ([`Iv::GMS`],
//! [`Iv::EMS`]) plus the no-op [`Iv::EMPTY`] cover the known clients.
//!
//! ## Directory Tree
//!
//! Directory entries name either nested directories or *images*: embedded
//! blobs holding a property tree, a canvas (pixel data), a convex (sequence
//! of sub-images), a 2D vector, a symbolic link ("UOL"), or a sound.
//! Bodies are decoded on first access and cached for the archive's
//! lifetime. Lookups take slash-separated paths and resolve symbolic links
//! automatically:
//!
//! ```no_run
//! use wz_archive::{Archive, Iv, OpenOptions};
//!
//! fn mob_icon(folder: &str) -> wz_archive::Result<()> {
//!     let archive = Archive::open(folder, OpenOptions::builder().version(95).iv(Iv::GMS).build())?;
//!
//!     if let Some(node) = archive.get("Mob/8800000/move/0")? {
//!         if let Some(canvas) = node.canvas()? {
//!             let pixels = canvas.image()?;
//!             println!("{}x{} {}", pixels.width(), pixels.height(), canvas.format());
//!         }
//!     }
//!     archive.close()
//! }
//! ```
//!
//! ## Multi-file Archives
//!
//! Newer clients split the archive into an indexed family per top-level
//! directory (`Base/Base_-001.wz`, `Base_000.wz`, …) described by a
//! `key|value` sidecar (`Base/Base.ini`, key `LastWzIndex`). [`Archive::open`]
//! detects and composes both layouts; [`Archive::open_file`] mounts a single
//! file directly.
//!
//! ## Concurrency
//!
//! The library is single-threaded by contract: sources carry a mutable
//! cursor and the keystream is shared per archive. Mount independent
//! archives for parallel workloads.

pub mod archive;
pub mod canvas;
pub mod crypto;
pub mod error;
pub mod node;
pub mod sound;
pub mod types;

mod blob;
mod config;
mod file;

pub use archive::{Archive, OpenOptions};
pub use canvas::Canvas;
pub use crypto::Iv;
pub use error::{Error, Result};
pub use node::{Node, NodeKind, NodeRef};
pub use sound::{MediaType, Sound, WaveFormat};
pub use types::Vector;
pub use wz_image::CanvasFormat;
