//! Namespace nodes and their type-specific contents.

use crate::errno::Result;
use crate::ids::{Dev, MountId, NodeId};
use crate::mode::{FileType, Mode};
use crate::store::{LazyFile, MemFile};
use indexmap::IndexMap;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespec {
    pub secs: i64,
    pub nanos: u32,
}

impl Timespec {
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }

    pub fn as_millis(self) -> i64 {
        self.secs * 1000 + i64::from(self.nanos / 1_000_000)
    }
}

impl From<SystemTime> for Timespec {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self {
                secs: since.as_secs() as i64,
                nanos: since.subsec_nanos(),
            },
            Err(before) => Self {
                secs: -(before.duration().as_secs() as i64),
                nanos: 0,
            },
        }
    }
}

/// Byte-level access shared by eager and lazily fetched file contents.
pub trait FileOps {
    fn size(&self) -> u64;
    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> Result<usize>;
    fn write_at(&mut self, position: u64, buf: &[u8]) -> Result<usize>;
    /// Truncates or zero-extends to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> Result<()>;
    /// Guarantees storage for `offset..offset + len`, growing the size if needed.
    fn allocate(&mut self, offset: u64, len: u64) -> Result<()>;
    /// Copies `len` bytes starting at `position`; bytes past the end read as zero.
    fn snapshot(&mut self, position: u64, len: usize) -> Result<Vec<u8>>;
}

/// Children of a directory, in insertion order.
#[derive(Debug, Default)]
pub struct Directory {
    entries: IndexMap<String, NodeId>,
}

impl Directory {
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub(crate) fn insert(&mut self, name: &str, id: NodeId) {
        self.entries.insert(name.to_string(), id);
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<NodeId> {
        self.entries.shift_remove(name)
    }
}

/// What a node holds. The variant always agrees with the node's type bits.
#[derive(Debug)]
pub enum NodeContent {
    Directory(Directory),
    File(MemFile),
    Lazy(LazyFile),
    Symlink(String),
    /// Character device; the driver is found through the node's `rdev`.
    Device,
}

impl NodeContent {
    pub fn file_type(&self) -> FileType {
        match self {
            NodeContent::Directory(_) => FileType::Directory,
            NodeContent::File(_) | NodeContent::Lazy(_) => FileType::RegularFile,
            NodeContent::Symlink(_) => FileType::Symlink,
            NodeContent::Device => FileType::CharDevice,
        }
    }

    pub(crate) fn as_file_mut(&mut self) -> Option<&mut dyn FileOps> {
        match self {
            NodeContent::File(file) => Some(file),
            NodeContent::Lazy(lazy) => Some(lazy),
            _ => None,
        }
    }

    pub(crate) fn as_dir(&self) -> Option<&Directory> {
        match self {
            NodeContent::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    pub(crate) fn as_dir_mut(&mut self) -> Option<&mut Directory> {
        match self {
            NodeContent::Directory(dir) => Some(dir),
            _ => None,
        }
    }
}

/// A single namespace entry.
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    /// The containing directory; a mount root is its own parent.
    pub(crate) parent: NodeId,
    pub(crate) name: String,
    pub(crate) mode: Mode,
    pub(crate) rdev: Dev,
    pub(crate) mount: MountId,
    /// Set while another mount is attached on top of this directory.
    pub(crate) mounted: Option<MountId>,
    pub(crate) uid: u32,
    pub(crate) gid: u32,
    pub(crate) atime: Timespec,
    pub(crate) mtime: Timespec,
    pub(crate) ctime: Timespec,
    pub(crate) content: NodeContent,
    /// Open file descriptions referring to this node.
    pub(crate) open_streams: u32,
    /// Cleared once the node is unlinked; it then lives until its last close.
    pub(crate) linked: bool,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn rdev(&self) -> Dev {
        self.rdev
    }

    pub fn mount(&self) -> MountId {
        self.mount
    }

    pub fn mounted(&self) -> Option<MountId> {
        self.mounted
    }

    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    pub fn is_root(&self) -> bool {
        self.parent == self.id
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.content, NodeContent::Directory(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self.content, NodeContent::File(_) | NodeContent::Lazy(_))
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.content, NodeContent::Symlink(_))
    }

    pub fn is_device(&self) -> bool {
        matches!(self.content, NodeContent::Device)
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn open_streams(&self) -> u32 {
        self.open_streams
    }

    /// Size as reported by `stat`.
    pub fn size(&self) -> u64 {
        match &self.content {
            NodeContent::Directory(_) => 4096,
            NodeContent::File(file) => file.size(),
            NodeContent::Lazy(lazy) => lazy.size(),
            NodeContent::Symlink(target) => target.len() as u64,
            NodeContent::Device => 0,
        }
    }

    pub(crate) fn touch_modified(&mut self, now: Timespec) {
        self.mtime = now;
        self.ctime = now;
    }
}
