//! Pluggable stores ("filesystem types") that back a mount.
//!
//! A store decides what a freshly created node holds and may expose nodes
//! that already exist elsewhere; the namespace itself (names, parents,
//! mounts) is always owned by [`Filesystem`](crate::Filesystem).

mod lazy;
mod mem;
mod remote;

pub use lazy::{ContentSource, LazyFile};
pub use mem::{MemFile, MemFs};
pub use remote::{RemoteEntry, RemoteFs, RemoteSource};

use crate::errno::{Errno, Result};
use crate::mode::{FileType, Mode};
use crate::node::{Directory, NodeContent};
use std::fmt;

/// A node the store knows about but the namespace has not seen yet.
#[derive(Debug)]
pub struct NodeSeed {
    pub mode: Mode,
    pub content: NodeContent,
}

/// Per-mount behavior of a store.
pub trait Backend: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Contents for a node being created by `mknod`, `mkdir`, `symlink` and
    /// friends. The default keeps everything in memory and refuses block
    /// devices, FIFOs and sockets.
    fn create_node(&self, file_type: FileType, link_target: Option<&str>) -> Result<NodeContent> {
        memory_content(file_type, link_target)
    }

    /// Finds `name` in the directory at `dir` (a path relative to the mount
    /// root) when the namespace has no entry for it.
    fn lookup(&self, _dir: &str, _name: &str) -> Result<NodeSeed> {
        Err(Errno::Noent)
    }

    /// Names under `dir` the store can materialize on lookup.
    fn list(&self, _dir: &str) -> Vec<String> {
        Vec::new()
    }
}

pub fn memory_content(file_type: FileType, link_target: Option<&str>) -> Result<NodeContent> {
    match file_type {
        FileType::Directory => Ok(NodeContent::Directory(Directory::default())),
        FileType::RegularFile => Ok(NodeContent::File(MemFile::new())),
        FileType::Symlink => Ok(NodeContent::Symlink(
            link_target.ok_or(Errno::Inval)?.to_string(),
        )),
        FileType::CharDevice => Ok(NodeContent::Device),
        FileType::BlockDevice | FileType::Fifo | FileType::Socket => Err(Errno::Perm),
    }
}
