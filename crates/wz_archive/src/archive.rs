//! Mounting archives and the top-level lookup surface.

use std::io::{Read, Seek, SeekFrom};
use std::ops::ControlFlow;
use std::path::Path;
use std::rc::Rc;

use bon::Builder;
use tracing::{debug, instrument};

use crate::crypto::{CryptProvider, Iv};
use crate::error::{Error, Result};
use crate::file::{mount_group, MountMode, Shared, WzFile};
use crate::node::{Body, Node, NodeRef};

/// How to interpret an archive: its declared version and keystream IV.
///
/// ```
/// use wz_archive::{Iv, OpenOptions};
///
/// let options = OpenOptions::builder().version(95).iv(Iv::GMS).build();
/// # let _ = options;
/// ```
#[derive(Debug, Clone, Copy, Builder)]
pub struct OpenOptions {
    /// The client version the archive was packed for; drives the offset
    /// hash and the stored checksum.
    pub version: i32,

    /// Keystream initialization vector.
    #[builder(default = Iv::EMPTY)]
    pub iv: Iv,
}

/// A mounted WZ archive: one logical directory tree over one or more
/// sources.
///
/// ```no_run
/// use std::ops::ControlFlow;
/// use wz_archive::{Archive, Iv, OpenOptions};
///
/// fn list_mobs(folder: &str) -> wz_archive::Result<()> {
///     let archive = Archive::open(folder, OpenOptions::builder().version(95).iv(Iv::GMS).build())?;
///
///     if let Some(mobs) = archive.get("Mob")? {
///         mobs.each(|name, _| {
///             println!("{name}");
///             ControlFlow::Continue(())
///         })?;
///     }
///
///     archive.close()
/// }
/// ```
pub struct Archive {
    root: NodeRef,
    shared: Rc<Shared>,
}

impl Archive {
    /// Opens the archive rooted at `folder`.
    ///
    /// A `<folder>/Base/` directory selects the indexed-group layout driven
    /// by `Base/Base.ini`; otherwise the single file `<folder>/Base.wz` is
    /// mounted and its top-level directories resolve to sibling `.wz`
    /// files.
    #[instrument(skip_all, err)]
    pub fn open(folder: impl AsRef<Path>, options: OpenOptions) -> Result<Archive> {
        let folder = folder.as_ref();
        debug!(folder = %folder.display(), version = options.version, "opening archive");
        let shared = Shared::new(CryptProvider::new(options.version, options.iv));

        let base_dir = folder.join("Base");
        let root = if base_dir.is_dir() {
            let members = mount_group(&shared, &base_dir, true)?;
            let file = members
                .first()
                .map(|member| member.backing_file().clone())
                .ok_or_else(|| Error::InvalidConfig("base group has no members".into()))?;
            Node::parsed(file, 0, 0, Body::Group(members))
        } else {
            WzFile::open(&shared, folder.join("Base.wz"), MountMode::Siblings)?
        };

        Ok(Archive { root, shared })
    }

    /// Mounts a single `.wz` file; its directories are all plain nodes.
    pub fn open_file(path: impl AsRef<Path>, options: OpenOptions) -> Result<Archive> {
        let shared = Shared::new(CryptProvider::new(options.version, options.iv));
        let root = WzFile::open(&shared, path.as_ref().to_path_buf(), MountMode::Plain)?;
        Ok(Archive { root, shared })
    }

    /// Mounts an in-memory or otherwise non-file source.
    pub fn from_reader(
        mut reader: impl Read + Seek + 'static,
        options: OpenOptions,
    ) -> Result<Archive> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let shared = Shared::new(CryptProvider::new(options.version, options.iv));
        let root = WzFile::from_source(&shared, Box::new(reader), len, None, MountMode::Plain)?;
        Ok(Archive { root, shared })
    }

    /// The root directory.
    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    /// Resolves a slash-separated path from the root, following symbolic
    /// links. See [`Node::get`].
    pub fn get(&self, path: &str) -> Result<Option<NodeRef>> {
        self.root.get(path)
    }

    /// Visits the root's children. See [`Node::each`].
    pub fn each<F>(&self, visitor: F) -> Result<()>
    where
        F: FnMut(&str, &NodeRef) -> ControlFlow<()>,
    {
        self.root.each(visitor)
    }

    /// Number of node bodies parsed so far. Diagnostic; lookups never parse
    /// a body twice.
    pub fn parse_count(&self) -> usize {
        self.shared.parsed.get()
    }

    /// Closes every mounted source in reverse mount order. Nodes of this
    /// archive fail on their next read afterwards.
    ///
    /// All sources are closed even if one fails; the first error wins.
    pub fn close(&self) -> Result<()> {
        let mounts = self.shared.mounts.borrow();
        let mut first_error = None;
        for mount in mounts.iter().rev() {
            if let Some(file) = mount.upgrade() {
                if let Err(e) = file.blob.borrow_mut().close() {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
