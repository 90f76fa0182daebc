//! Mounted `.wz` sources and the offset descrambling tied to them.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use binrw::BinRead;
use tracing::debug;

use crate::blob::{Blob, Source};
use crate::config;
use crate::crypto::CryptProvider;
use crate::error::{Error, Result};
use crate::node::{Node, NodeRef, ParseAs};
use crate::types::WzHeader;

/// State shared by every source mounted under one archive.
pub(crate) struct Shared {
    pub provider: Rc<CryptProvider>,
    /// Mounted sources in mount order, for close-time bookkeeping.
    pub mounts: RefCell<Vec<Weak<WzFile>>>,
    /// Diagnostic count of node bodies parsed so far.
    pub parsed: Cell<usize>,
}

impl Shared {
    pub fn new(provider: CryptProvider) -> Rc<Shared> {
        Rc::new(Shared {
            provider: Rc::new(provider),
            mounts: RefCell::new(Vec::new()),
            parsed: Cell::new(0),
        })
    }
}

/// How subdirectory entries of a file's root directory are resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum MountMode {
    /// Subdirectories are plain lazy nodes within the same file.
    Plain,
    /// Root of a single `Base.wz`: subdirectories open sibling `<name>.wz`
    /// files.
    Siblings,
    /// Member of an indexed group: subdirectories mount `<folder>/<name>/`
    /// groups, or `<folder>/../<name>/` when this member belongs to the base
    /// group itself.
    Group { base: bool },
}

/// One mounted `.wz` source.
pub(crate) struct WzFile {
    pub path: Option<PathBuf>,
    pub blob: RefCell<Blob>,
    pub start: u64,
    pub mount: MountMode,
    pub shared: Rc<Shared>,
}

impl WzFile {
    /// Opens a `.wz` file from disk and returns its lazy root directory.
    pub fn open(shared: &Rc<Shared>, path: PathBuf, mount: MountMode) -> Result<NodeRef> {
        debug!(path = %path.display(), "mounting wz file");
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Self::from_source(shared, Box::new(file), len, Some(path), mount)
    }

    /// Mounts an arbitrary source: validates the header, verifies the
    /// version checksum, and returns the lazy root directory.
    pub fn from_source(
        shared: &Rc<Shared>,
        source: Box<dyn Source>,
        len: u64,
        path: Option<PathBuf>,
        mount: MountMode,
    ) -> Result<NodeRef> {
        let mut blob = Blob::new(source, len, shared.provider.clone());

        let header = WzHeader::read(blob.reader()?).map_err(|e| match e {
            binrw::Error::BadMagic { .. } => Error::InvalidMagic,
            other => Error::from(other),
        })?;
        let start = u64::from(header.start);

        blob.seek(SeekFrom::Start(start))?;
        let stored = blob.read_u16()?;
        shared.provider.verify(stored)?;
        let root_offset = blob.position()?;

        let file = Rc::new(WzFile {
            path,
            blob: RefCell::new(blob),
            start,
            mount,
            shared: shared.clone(),
        });
        shared.mounts.borrow_mut().push(Rc::downgrade(&file));

        Ok(Node::lazy(
            file,
            ParseAs::Directory,
            root_offset,
            root_offset,
            0,
            0,
            true,
        ))
    }

    /// Directory of the backing file, for resolving sibling mounts.
    pub fn folder(&self) -> Result<&Path> {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .ok_or_else(|| Error::InvalidConfig("mounted source has no backing path".into()))
    }

    /// Reads one scrambled 32-bit data offset and reconstructs the absolute
    /// file offset it hides.
    ///
    /// The mixing constant is derived from the field's own position, the
    /// file's start offset, and the version hash, so the field can only be
    /// decoded in place.
    pub fn read_offset(&self, blob: &mut Blob) -> Result<u32> {
        let pos = blob.position()?;
        let x = ((pos.wrapping_sub(self.start) as u32) ^ 0xFFFF_FFFF)
            .wrapping_mul(self.shared.provider.hash())
            .wrapping_sub(0x581C_3F6D);
        let stored = blob.read_u32()?;
        Ok((x.rotate_left(x & 0x1F) ^ stored).wrapping_add((self.start as u32) << 1))
    }
}

/// Mounts an indexed family `<folder>/<name>_-001.wz ..= <name>_NNN.wz`
/// as listed by the folder's `.ini` sidecar.
pub(crate) fn mount_group(shared: &Rc<Shared>, folder: &Path, base: bool) -> Result<Vec<NodeRef>> {
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidConfig(format!("{} has no base name", folder.display())))?;

    let sidecar = config::read_ini(&folder.join(format!("{name}.ini")))?;
    let last = config::last_wz_index(&sidecar)?;
    if last < -1 {
        return Err(Error::InvalidConfig(format!(
            "LastWzIndex {last} is out of range"
        )));
    }

    debug!(folder = %folder.display(), last, "mounting wz group");
    (-1..=last)
        .map(|index| {
            WzFile::open(
                shared,
                folder.join(member_name(&name, index)),
                MountMode::Group { base },
            )
        })
        .collect()
}

/// `name_-001.wz` for index −1, `name_NNN.wz` (zero-padded to 3 digits)
/// otherwise.
pub(crate) fn member_name(name: &str, index: i32) -> String {
    if index < 0 {
        format!("{name}_-{:03}.wz", -index)
    } else {
        format!("{name}_{index:03}.wz")
    }
}
