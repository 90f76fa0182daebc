//! The archive tree: lazily parsed nodes and path navigation.
//!
//! Directory children are allocated with nothing but their kind and body
//! offset; the body is decoded on first access and kept for the archive's
//! lifetime. Everything inside an image body (properties, variants, nested
//! images) is decoded in one pass so the advertised-size invariants can be
//! checked while the cursor is live.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::io::SeekFrom;
use std::ops::ControlFlow;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::blob::Blob;
use crate::canvas::Canvas;
use crate::error::{Error, Result};
use crate::file::{mount_group, MountMode, WzFile};
use crate::sound::Sound;
use crate::types::Vector;

/// Symbolic links may chain; give up after this many hops.
const MAX_UOL_HOPS: usize = 64;

/// A shared handle to a node of the archive tree.
pub type NodeRef = Rc<Node>;

/// Kind of a parsed node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    Property,
    Canvas,
    Convex,
    Vector,
    Uol,
    Sound,
    Nil,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What an unparsed node's body will decode as.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ParseAs {
    Directory,
    Image,
}

/// Decoded body of a node.
pub(crate) enum Body {
    Directory(IndexMap<String, NodeRef>),
    /// A directory backed by an indexed family of sibling files.
    Group(Vec<NodeRef>),
    Property(Vec<(String, NodeRef)>),
    Convex(Vec<NodeRef>),
    Canvas(Rc<Canvas>),
    Vector(Vector),
    Uol(String),
    Sound(Rc<Sound>),
    Nil,
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
}

impl Body {
    fn kind(&self) -> NodeKind {
        match self {
            Body::Directory(_) | Body::Group(_) => NodeKind::Directory,
            Body::Property(_) => NodeKind::Property,
            Body::Canvas(_) => NodeKind::Canvas,
            Body::Convex(_) => NodeKind::Convex,
            Body::Vector(_) => NodeKind::Vector,
            Body::Uol(_) => NodeKind::Uol,
            Body::Sound(_) => NodeKind::Sound,
            Body::Nil => NodeKind::Nil,
            Body::Int16(_) => NodeKind::Int16,
            Body::Int32(_) => NodeKind::Int32,
            Body::Int64(_) => NodeKind::Int64,
            Body::Float32(_) => NodeKind::Float32,
            Body::Float64(_) => NodeKind::Float64,
            Body::String(_) => NodeKind::String,
        }
    }
}

/// One element of the archive tree.
pub struct Node {
    file: Rc<WzFile>,
    parse_as: ParseAs,
    offset: u64,
    base_offset: u64,
    #[allow(dead_code)]
    size: i32,
    #[allow(dead_code)]
    checksum: i32,
    /// Whether this is the root directory of its file, where mount modes
    /// apply.
    root: bool,
    state: RefCell<Option<Body>>,
}

impl Node {
    pub(crate) fn lazy(
        file: Rc<WzFile>,
        parse_as: ParseAs,
        offset: u64,
        base_offset: u64,
        size: i32,
        checksum: i32,
        root: bool,
    ) -> NodeRef {
        Rc::new(Node {
            file,
            parse_as,
            offset,
            base_offset,
            size,
            checksum,
            root,
            state: RefCell::new(None),
        })
    }

    pub(crate) fn parsed(file: Rc<WzFile>, offset: u64, base_offset: u64, body: Body) -> NodeRef {
        Rc::new(Node {
            file,
            parse_as: ParseAs::Image,
            offset,
            base_offset,
            size: 0,
            checksum: 0,
            root: false,
            state: RefCell::new(Some(body)),
        })
    }

    /// The decoded body, parsing it on first access.
    ///
    /// A failed parse stores nothing, so a later access starts over.
    pub(crate) fn body(&self) -> Result<Ref<'_, Body>> {
        if self.state.borrow().is_none() {
            let body = self.parse()?;
            *self.state.borrow_mut() = Some(body);
            self.file.shared.parsed.set(self.file.shared.parsed.get() + 1);
        }
        Ok(Ref::map(self.state.borrow(), |state| {
            state.as_ref().expect("node body was just stored")
        }))
    }

    fn parse(&self) -> Result<Body> {
        trace!(offset = self.offset, kind = ?self.parse_as, "parsing node body");
        let mut blob = self.file.blob.borrow_mut();
        match self.parse_as {
            ParseAs::Directory => {
                blob.seek(SeekFrom::Start(self.offset))?;
                parse_directory(&self.file, self.root, &mut blob)
            }
            ParseAs::Image => parse_image(&self.file, self.offset, self.base_offset, &mut blob),
        }
    }

    /// Kind of this node, parsing the body if necessary.
    pub fn kind(&self) -> Result<NodeKind> {
        Ok(self.body()?.kind())
    }

    pub(crate) fn backing_file(&self) -> &Rc<WzFile> {
        &self.file
    }

    /// Looks up a direct child by name. Leaves and misses yield `None`.
    pub fn child(&self, name: &str) -> Result<Option<NodeRef>> {
        match &*self.body()? {
            Body::Directory(children) => Ok(children.get(name).cloned()),
            Body::Group(members) => {
                for member in members {
                    if let Some(found) = member.child(name)? {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
            Body::Property(pairs) => Ok(pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())),
            Body::Convex(items) => Ok(items
                .iter()
                .enumerate()
                .find(|(index, _)| index.to_string() == name)
                .map(|(_, value)| value.clone())),
            Body::Canvas(canvas) => match canvas.property() {
                Some(property) => property.child(name),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Resolves a slash-separated path from this node, following symbolic
    /// links.
    ///
    /// A link's target is spliced into the consumed path in place of the
    /// link itself and re-resolved from this node, so links are relative to
    /// the node the lookup started at. Links that climb above it resolve to
    /// whatever the partial path reaches, or `None`.
    pub fn get(self: &Rc<Self>, path: &str) -> Result<Option<NodeRef>> {
        let mut segments = normalize(path.split('/'), Vec::new());

        for _ in 0..MAX_UOL_HOPS {
            let mut current = self.clone();
            for segment in &segments {
                match current.child(segment)? {
                    Some(next) => current = next,
                    None => return Ok(None),
                }
            }

            let link = match &*current.body()? {
                Body::Uol(target) => Some(target.clone()),
                _ => None,
            };
            let link = match link {
                Some(link) => link,
                None => return Ok(Some(current)),
            };
            segments.pop();
            segments = normalize(link.split('/'), segments);
        }
        Err(Error::CyclicUol(MAX_UOL_HOPS))
    }

    /// Visits the `(name, node)` pairs of a container in stored order.
    ///
    /// Canvas nodes expose their embedded property subtree; leaves have
    /// nothing to visit.
    pub fn each<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&str, &NodeRef) -> ControlFlow<()>,
    {
        self.each_inner(&mut visitor).map(|_| ())
    }

    fn each_inner(
        &self,
        visitor: &mut dyn FnMut(&str, &NodeRef) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>> {
        match &*self.body()? {
            Body::Directory(children) => {
                for (name, child) in children {
                    if visitor(name, child).is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
            Body::Group(members) => {
                for member in members {
                    if member.each_inner(visitor)?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
            Body::Property(pairs) => {
                for (name, child) in pairs {
                    if visitor(name, child).is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
            Body::Convex(items) => {
                for (index, child) in items.iter().enumerate() {
                    if visitor(&index.to_string(), child).is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
            Body::Canvas(canvas) => {
                if let Some(property) = canvas.property() {
                    return property.each_inner(visitor);
                }
            }
            _ => {}
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Children addressed by decimal keys, sorted numerically. Convex nodes
    /// and frame-style property trees use this.
    pub fn array(&self) -> Result<Vec<NodeRef>> {
        let mut keyed: Vec<(i64, NodeRef)> = Vec::new();
        self.each(|name, node| {
            if let Ok(key) = name.parse::<i64>() {
                keyed.push((key, node.clone()));
            }
            ControlFlow::Continue(())
        })?;
        keyed.sort_by_key(|(key, _)| *key);
        Ok(keyed.into_iter().map(|(_, node)| node).collect())
    }

    pub fn int16(&self) -> Result<Option<i16>> {
        Ok(match &*self.body()? {
            Body::Int16(value) => Some(*value),
            _ => None,
        })
    }

    pub fn int32(&self) -> Result<Option<i32>> {
        Ok(match &*self.body()? {
            Body::Int32(value) => Some(*value),
            _ => None,
        })
    }

    pub fn int64(&self) -> Result<Option<i64>> {
        Ok(match &*self.body()? {
            Body::Int64(value) => Some(*value),
            _ => None,
        })
    }

    pub fn float32(&self) -> Result<Option<f32>> {
        Ok(match &*self.body()? {
            Body::Float32(value) => Some(*value),
            _ => None,
        })
    }

    pub fn float64(&self) -> Result<Option<f64>> {
        Ok(match &*self.body()? {
            Body::Float64(value) => Some(*value),
            _ => None,
        })
    }

    pub fn string(&self) -> Result<Option<String>> {
        Ok(match &*self.body()? {
            Body::String(value) => Some(value.clone()),
            _ => None,
        })
    }

    /// The target path of a symbolic link node.
    pub fn uol(&self) -> Result<Option<String>> {
        Ok(match &*self.body()? {
            Body::Uol(target) => Some(target.clone()),
            _ => None,
        })
    }

    pub fn vector(&self) -> Result<Option<Vector>> {
        Ok(match &*self.body()? {
            Body::Vector(value) => Some(*value),
            _ => None,
        })
    }

    pub fn canvas(&self) -> Result<Option<Rc<Canvas>>> {
        Ok(match &*self.body()? {
            Body::Canvas(canvas) => Some(canvas.clone()),
            _ => None,
        })
    }

    pub fn sound(&self) -> Result<Option<Rc<Sound>>> {
        Ok(match &*self.body()? {
            Body::Sound(sound) => Some(sound.clone()),
            _ => None,
        })
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.borrow().as_ref() {
            None => f.write_str(match self.parse_as {
                ParseAs::Directory => "<Directory>",
                ParseAs::Image => "<Image>",
            }),
            Some(body) => match body {
                Body::Directory(_) | Body::Group(_) => f.write_str("<Directory>"),
                Body::Property(_) => f.write_str("<Properties>"),
                Body::Canvas(_) => f.write_str("<Canvas>"),
                Body::Convex(_) => f.write_str("<Convex>"),
                Body::Sound(_) => f.write_str("<Sound>"),
                Body::Vector(v) => write!(f, "<X: {} Y: {}>", v.x, v.y),
                Body::Nil => f.write_str("<nil>"),
                Body::Int16(v) => write!(f, "{v}"),
                Body::Int32(v) => write!(f, "{v}"),
                Body::Int64(v) => write!(f, "{v}"),
                Body::Float32(v) => write!(f, "{v}"),
                Body::Float64(v) => write!(f, "{v}"),
                Body::String(s) | Body::Uol(s) => f.write_str(s),
            },
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({self})")
    }
}

/// Lexical path normalization: drops empty and `.` segments, folds `..`
/// into its parent where one exists.
fn normalize<'a>(segments: impl Iterator<Item = &'a str>, mut out: Vec<String>) -> Vec<String> {
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|last| last != "..") {
                    out.pop();
                } else {
                    out.push("..".to_string());
                }
            }
            other => out.push(other.to_string()),
        }
    }
    out
}

fn parse_directory(file: &Rc<WzFile>, root: bool, blob: &mut Blob) -> Result<Body> {
    let count = blob.read_compressed_i32()?;
    let mut children = IndexMap::new();

    for _ in 0..count {
        let mut tag = blob.read_u8()?;
        let mut name = match tag {
            1 => {
                // reserved entry, 10 bytes of unknown content
                blob.seek(SeekFrom::Current(10))?;
                continue;
            }
            2 => {
                // aliased entry: the real tag and name live elsewhere
                let target = u64::from(blob.read_u32()?) + file.start;
                let (real_tag, name) = blob.peek(|blob| {
                    blob.seek(SeekFrom::Start(target))?;
                    Ok((blob.read_u8()?, blob.read_encrypted_string()?))
                })?;
                tag = real_tag;
                name
            }
            3 | 4 => blob.read_encrypted_string()?,
            other => return Err(Error::InvalidElementType(other)),
        };

        let size = blob.read_compressed_i32()?;
        let checksum = blob.read_compressed_i32()?;
        let data_offset = u64::from(file.read_offset(blob)?);

        let child = if tag == 3 {
            let mode = if root { file.mount } else { MountMode::Plain };
            match mode {
                MountMode::Plain => Node::lazy(
                    file.clone(),
                    ParseAs::Directory,
                    data_offset,
                    data_offset,
                    size,
                    checksum,
                    false,
                ),
                MountMode::Siblings => WzFile::open(
                    &file.shared,
                    file.folder()?.join(format!("{name}.wz")),
                    MountMode::Plain,
                )?,
                MountMode::Group { base } => {
                    let folder = if base {
                        file.folder()?.join("..").join(&name)
                    } else {
                        file.folder()?.join(&name)
                    };
                    let members = mount_group(&file.shared, &folder, false)?;
                    Node::parsed(file.clone(), data_offset, data_offset, Body::Group(members))
                }
            }
        } else {
            if let Some(stripped) = name.strip_suffix(".img") {
                name = stripped.to_string();
            }
            Node::lazy(
                file.clone(),
                ParseAs::Image,
                data_offset,
                data_offset,
                size,
                checksum,
                false,
            )
        };
        children.insert(name, child);
    }
    Ok(Body::Directory(children))
}

/// Decodes an image body at `offset`: a tag string naming the root kind,
/// then the kind-specific structure.
pub(crate) fn parse_image(
    file: &Rc<WzFile>,
    offset: u64,
    base_offset: u64,
    blob: &mut Blob,
) -> Result<Body> {
    blob.seek(SeekFrom::Start(offset))?;
    let tag = blob.read_uol_string(base_offset)?;

    match tag.as_str() {
        "Property" => parse_property(file, base_offset, blob),
        "Canvas" => Ok(Body::Canvas(Rc::new(Canvas::parse(
            file,
            base_offset,
            blob,
        )?))),
        "Shape2D#Convex2D" => parse_convex(file, base_offset, blob),
        "Shape2D#Vector2D" => {
            let x = blob.read_compressed_i32()?;
            let y = blob.read_compressed_i32()?;
            Ok(Body::Vector(Vector::new(x, y)))
        }
        "UOL" => {
            blob.seek(SeekFrom::Current(1))?;
            Ok(Body::Uol(blob.read_uol_string(base_offset)?))
        }
        "Sound_DX8" => Ok(Body::Sound(Rc::new(Sound::parse(file, blob)?))),
        _ => Err(Error::InvalidTag(tag)),
    }
}

/// Decodes an ordered `(name, variant)` list.
pub(crate) fn parse_property(
    file: &Rc<WzFile>,
    base_offset: u64,
    blob: &mut Blob,
) -> Result<Body> {
    blob.seek(SeekFrom::Current(2))?;
    let count = blob.read_compressed_i32()?;

    let mut pairs = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let name = blob.read_uol_string(base_offset)?;
        let value = parse_variant(file, base_offset, blob)?;
        pairs.push((name, value));
    }
    Ok(Body::Property(pairs))
}

fn parse_convex(file: &Rc<WzFile>, base_offset: u64, blob: &mut Blob) -> Result<Body> {
    let count = blob.read_compressed_i32()?;

    let mut items = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let offset = blob.position()?;
        let body = parse_image(file, offset, base_offset, blob)?;
        items.push(Node::parsed(file.clone(), offset, base_offset, body));
    }
    Ok(Body::Convex(items))
}

fn parse_variant(file: &Rc<WzFile>, base_offset: u64, blob: &mut Blob) -> Result<NodeRef> {
    let offset = blob.position()?;
    let body = match blob.read_u8()? {
        0x00 => Body::Nil,
        0x02 | 0x0B => Body::Int16(blob.read_i16()?),
        0x03 | 0x13 => Body::Int32(blob.read_compressed_i32()?),
        0x14 => Body::Int64(blob.read_compressed_i64()?),
        0x04 => {
            // only an explicit 0x80 prefix carries a payload; anything else
            // means +0.0
            if blob.read_u8()? == 0x80 {
                Body::Float32(blob.read_f32()?)
            } else {
                Body::Float32(0.0)
            }
        }
        0x05 => Body::Float64(blob.read_f64()?),
        0x08 => Body::String(blob.read_uol_string(base_offset)?),
        0x09 => {
            let size = blob.read_i32()?;
            let start = blob.position()?;
            let end = start as i64 + i64::from(size);
            let body = parse_image(file, start, base_offset, blob)?;
            if blob.position()? as i64 != end {
                return Err(Error::PayloadLengthMismatch);
            }
            return Ok(Node::parsed(file.clone(), start, base_offset, body));
        }
        other => return Err(Error::InvalidVariantType(other)),
    };
    Ok(Node::parsed(file.clone(), offset, base_offset, body))
}
