//! Open file descriptions and the descriptor table.
//!
//! A [`Stream`] is an open file description: position, flags and pushed
//! back bytes. Descriptors index into the table and several of them may
//! share one description after `dup`.

use crate::errno::{Errno, Result};
use crate::flags::OpenFlags;
use crate::ids::{Fd, NodeId};
use crate::mode::FileType;
use slab::Slab;
use std::collections::VecDeque;

/// One entry produced by `getdents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub ino: u64,
    pub file_type: FileType,
}

#[derive(Debug)]
pub struct Stream {
    pub(crate) node: NodeId,
    pub(crate) path: String,
    pub(crate) flags: OpenFlags,
    pub(crate) position: u64,
    pub(crate) seekable: bool,
    pub(crate) ungotten: VecDeque<u8>,
    /// Directory listing captured by the first `getdents`; the position
    /// indexes into it.
    pub(crate) listing: Option<Vec<DirEntry>>,
    refs: usize,
}

impl Stream {
    pub(crate) fn new(node: NodeId, path: String, flags: OpenFlags, seekable: bool) -> Self {
        Self {
            node,
            path,
            flags,
            position: 0,
            seekable,
            ungotten: VecDeque::new(),
            listing: None,
            refs: 1,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Path of the node at open time.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    /// Descriptors sharing this description.
    pub fn ref_count(&self) -> usize {
        self.refs
    }
}

#[derive(Debug, Default)]
pub(crate) struct StreamTable {
    fds: Vec<Option<usize>>,
    descriptions: Slab<Stream>,
}

impl StreamTable {
    /// Lowest free descriptor below `max`.
    pub(crate) fn next_fd(&self, max: usize) -> Result<Fd> {
        let free = self
            .fds
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.fds.len());
        if free >= max {
            return Err(Errno::Mfile);
        }
        Fd::try_from(free).map_err(|_| Errno::Mfile)
    }

    pub(crate) fn insert(&mut self, stream: Stream, max: usize) -> Result<Fd> {
        let fd = self.next_fd(max)?;
        let key = self.descriptions.insert(stream);
        self.install(fd, key);
        Ok(fd)
    }

    fn install(&mut self, fd: Fd, key: usize) {
        let slot = fd as usize;
        if slot >= self.fds.len() {
            self.fds.resize(slot + 1, None);
        }
        self.fds[slot] = Some(key);
    }

    fn key(&self, fd: Fd) -> Result<usize> {
        self.fds
            .get(fd as usize)
            .copied()
            .flatten()
            .ok_or(Errno::Badf)
    }

    pub(crate) fn get(&self, fd: Fd) -> Result<&Stream> {
        let key = self.key(fd)?;
        self.descriptions.get(key).ok_or(Errno::Badf)
    }

    pub(crate) fn get_mut(&mut self, fd: Fd) -> Result<&mut Stream> {
        let key = self.key(fd)?;
        self.descriptions.get_mut(key).ok_or(Errno::Badf)
    }

    pub(crate) fn is_open(&self, fd: Fd) -> bool {
        self.key(fd).is_ok()
    }

    /// Makes `new_fd` share the description behind `fd`. `new_fd` must be
    /// free.
    pub(crate) fn share(&mut self, fd: Fd, new_fd: Fd) -> Result<()> {
        let key = self.key(fd)?;
        if self.is_open(new_fd) {
            return Err(Errno::Busy);
        }
        if let Some(stream) = self.descriptions.get_mut(key) {
            stream.refs += 1;
        }
        self.install(new_fd, key);
        Ok(())
    }

    /// Frees `fd`. Returns the description once its last descriptor is gone.
    pub(crate) fn remove(&mut self, fd: Fd) -> Result<Option<Stream>> {
        let key = self.key(fd)?;
        self.fds[fd as usize] = None;
        while matches!(self.fds.last(), Some(None)) {
            self.fds.pop();
        }
        let Some(stream) = self.descriptions.get_mut(key) else {
            return Err(Errno::Badf);
        };
        stream.refs -= 1;
        if stream.refs > 0 {
            return Ok(None);
        }
        Ok(self.descriptions.try_remove(key))
    }

    /// Open descriptors in ascending order.
    pub(crate) fn open_fds(&self) -> Vec<Fd> {
        self.fds
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .filter_map(|(fd, _)| Fd::try_from(fd).ok())
            .collect()
    }
}
