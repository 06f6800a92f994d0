//! Operations on open streams.

use super::{Filesystem, LookupOptions, Stat};
use crate::device::{IoctlReply, IoctlRequest};
use crate::errno::{Errno, Result};
use crate::flags::{AccessMode, MmapFlags, MmapProt, OpenFlags, Whence};
use crate::ids::{Dev, Fd, NodeId};
use crate::mode::{PERMISSION_MASK, S_IFREG};
use crate::node::{FileOps, Timespec};
use crate::stream::{DirEntry, Stream};
use tracing::{debug, instrument, trace};

/// A private copy of a file range produced by `mmap`.
///
/// Changes to `data` reach the file only through
/// [`msync`](Filesystem::msync) or [`munmap`](Filesystem::munmap), and
/// only for shared mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub data: Vec<u8>,
    node: NodeId,
    offset: u64,
    prot: MmapProt,
    flags: MmapFlags,
}

impl Mapping {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_shared(&self) -> bool {
        !self.flags.contains(MmapFlags::PRIVATE)
    }
}

impl Filesystem {
    /// ### `open()`
    /// Opens (and with `CREAT` possibly creates) `path`.
    /// Inputs:
    /// - `flags`
    ///     Access mode plus creation and status flags
    /// - `mode`
    ///     Permission bits for a newly created file
    #[instrument(level = "trace", skip_all, fields(%path, flags = flags.bits()), ret)]
    pub fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Fd> {
        if path.is_empty() {
            return Err(Errno::Noent);
        }
        let options = LookupOptions {
            follow: !flags.contains(OpenFlags::NOFOLLOW),
            ..LookupOptions::default()
        };
        let existing = match self.lookup_path(path, options) {
            Ok(lookup) => Some(lookup.node),
            Err(Errno::Noent) => None,
            Err(err) => return Err(err),
        };

        let (node, created) = match existing {
            Some(_) if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) => {
                return Err(Errno::Exist);
            }
            Some(node) => (node, false),
            None if flags.contains(OpenFlags::CREAT) => {
                let mode = (mode & PERMISSION_MASK) | S_IFREG;
                (self.mknod(path, mode, Dev::NONE)?, true)
            }
            None => return Err(Errno::Noent),
        };
        self.open_node_with(node, flags, created)
    }

    /// Opens an already resolved node.
    pub fn open_node(&mut self, node: NodeId, flags: OpenFlags) -> Result<Fd> {
        self.open_node_with(node, flags, false)
    }

    fn open_node_with(&mut self, id: NodeId, mut flags: OpenFlags, created: bool) -> Result<Fd> {
        let node = self.node_ref(id)?;
        let (is_device, is_dir, rdev) = (node.is_device(), node.is_dir(), node.rdev);
        if is_device {
            flags.remove(OpenFlags::TRUNC);
        }
        if flags.contains(OpenFlags::DIRECTORY) && !is_dir {
            return Err(Errno::Notdir);
        }
        if !created {
            self.may_open(id, flags)?;
        }
        // Reserve the descriptor before any side effect happens.
        self.streams.next_fd(self.config.max_open_fds)?;
        if flags.contains(OpenFlags::TRUNC) && !created {
            self.truncate_node(id, 0)?;
        }
        flags.remove(OpenFlags::CREAT | OpenFlags::EXCL | OpenFlags::TRUNC | OpenFlags::NOFOLLOW);

        let seekable = if is_device {
            let device = self.devices.get_mut(rdev)?;
            device.open()?;
            device.is_seekable()
        } else {
            true
        };
        let path = self.path_of(id)?;
        let fd = self
            .streams
            .insert(Stream::new(id, path, flags, seekable), self.config.max_open_fds)?;
        self.node_mut(id)?.open_streams += 1;
        debug!(%fd, node = %id, "opened stream");
        Ok(fd)
    }

    /// Frees `fd`. The description, and the node's stream reference, go
    /// away with the last descriptor sharing it.
    #[instrument(level = "trace", skip_all, fields(%fd), ret)]
    pub fn close(&mut self, fd: Fd) -> Result<()> {
        let Some(stream) = self.streams.remove(fd)? else {
            return Ok(());
        };
        let mut result = Ok(());
        if let Some(node) = self.nodes.get(&stream.node) {
            if node.is_device() {
                let rdev = node.rdev;
                result = self.devices.get_mut(rdev).and_then(|device| device.close());
            }
        }
        self.release_stream_ref(stream.node);
        trace!(%fd, node = %stream.node, "closed stream");
        result
    }

    /// Node behind `fd`, with `Badf` if it has been reclaimed.
    fn stream_node(&self, fd: Fd) -> Result<NodeId> {
        let node = self.streams.get(fd)?.node;
        if self.nodes.contains_key(&node) {
            Ok(node)
        } else {
            Err(Errno::Badf)
        }
    }

    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        self.read_at(fd, buf, None)
    }

    /// Reads at `offset` without moving the stream position.
    pub fn pread(&mut self, fd: Fd, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.read_at(fd, buf, Some(offset))
    }

    #[instrument(level = "trace", skip_all, fields(%fd, len = buf.len(), ?position), ret)]
    fn read_at(&mut self, fd: Fd, buf: &mut [u8], position: Option<u64>) -> Result<usize> {
        let node = self.stream_node(fd)?;
        if self.node_ref(node)?.is_dir() {
            return Err(Errno::Isdir);
        }
        let stream = self.streams.get_mut(fd)?;
        if !stream.flags.is_readable() {
            return Err(Errno::Badf);
        }
        if position.is_some() && !stream.seekable {
            return Err(Errno::Spipe);
        }
        let offset = position.unwrap_or(stream.position);

        let mut filled = 0;
        if position.is_none() {
            while filled < buf.len() {
                let Some(byte) = stream.ungotten.pop_front() else {
                    break;
                };
                buf[filled] = byte;
                filled += 1;
            }
        }
        if filled == buf.len() {
            return Ok(filled);
        }

        let count = match self.read_node(node, &mut buf[filled..], offset) {
            Ok(count) => count,
            Err(_) if filled > 0 => 0,
            Err(err) => return Err(err),
        };
        if position.is_none() {
            self.streams.get_mut(fd)?.position += count as u64;
        }
        Ok(filled + count)
    }

    fn read_node(&mut self, id: NodeId, buf: &mut [u8], position: u64) -> Result<usize> {
        let node = self.nodes.get_mut(&id).ok_or(Errno::Badf)?;
        if node.is_device() {
            let rdev = node.rdev;
            let count = self.devices.get_mut(rdev)?.read(buf, position)?;
            if count > 0 {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.atime = Timespec::now();
                }
            }
            return Ok(count);
        }
        let is_dir = node.is_dir();
        match node.content.as_file_mut() {
            Some(file) => file.read_at(position, buf),
            None if is_dir => Err(Errno::Isdir),
            None => Err(Errno::Inval),
        }
    }

    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize> {
        self.write_at(fd, buf, None)
    }

    /// Writes at `offset` without moving the stream position.
    pub fn pwrite(&mut self, fd: Fd, buf: &[u8], offset: u64) -> Result<usize> {
        self.write_at(fd, buf, Some(offset))
    }

    #[instrument(level = "trace", skip_all, fields(%fd, len = buf.len(), ?position), ret)]
    fn write_at(&mut self, fd: Fd, buf: &[u8], position: Option<u64>) -> Result<usize> {
        let node = self.stream_node(fd)?;
        let stream = self.streams.get(fd)?;
        if !stream.flags.is_writable() {
            return Err(Errno::Badf);
        }
        let (seekable, append, current) = (
            stream.seekable,
            stream.flags.contains(OpenFlags::APPEND),
            stream.position,
        );
        if self.node_ref(node)?.is_dir() {
            return Err(Errno::Isdir);
        }
        if position.is_some() && !seekable {
            return Err(Errno::Spipe);
        }
        let current = if seekable && append {
            self.llseek(fd, 0, Whence::End)?
        } else {
            current
        };
        let offset = position.unwrap_or(current);
        if position.is_none() && offset.checked_add(buf.len() as u64).is_none() {
            return Err(Errno::Overflow);
        }

        let count = self.write_node(node, buf, offset)?;
        if position.is_none() {
            self.streams.get_mut(fd)?.position = offset + count as u64;
        }
        Ok(count)
    }

    fn write_node(&mut self, id: NodeId, buf: &[u8], position: u64) -> Result<usize> {
        let node = self.nodes.get_mut(&id).ok_or(Errno::Badf)?;
        let count = if node.is_device() {
            let rdev = node.rdev;
            self.devices.get_mut(rdev)?.write(buf, position)?
        } else {
            let is_dir = node.is_dir();
            match node.content.as_file_mut() {
                Some(file) => file.write_at(position, buf)?,
                None if is_dir => return Err(Errno::Isdir),
                None => return Err(Errno::Inval),
            }
        };
        if count > 0 {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.touch_modified(Timespec::now());
            }
        }
        Ok(count)
    }

    /// Repositions the stream and drops any pushed back bytes.
    #[instrument(level = "trace", skip_all, fields(%fd, %offset, ?whence), ret)]
    pub fn llseek(&mut self, fd: Fd, offset: i64, whence: Whence) -> Result<u64> {
        let node_id = self.stream_node(fd)?;
        let stream = self.streams.get(fd)?;
        if !stream.seekable {
            return Err(Errno::Spipe);
        }
        let position = stream.position;
        let node = self.node_ref(node_id)?;
        let (is_device, is_file, rdev, size) =
            (node.is_device(), node.is_file(), node.rdev, node.size());

        let new_position = if is_device {
            self.devices.get_mut(rdev)?.llseek(offset, whence, position)?
        } else {
            let base = match whence {
                Whence::Set => 0,
                Whence::Cur => position,
                Whence::End if is_file => size,
                Whence::End => 0,
            };
            let target = i128::from(base) + i128::from(offset);
            if target < 0 {
                return Err(Errno::Inval);
            }
            u64::try_from(target).map_err(|_| Errno::Overflow)?
        };

        let stream = self.streams.get_mut(fd)?;
        stream.position = new_position;
        stream.ungotten.clear();
        if new_position == 0 {
            stream.listing = None;
        }
        Ok(new_position)
    }

    /// Duplicates `fd` onto the lowest free descriptor; both share one
    /// description.
    pub fn dup(&mut self, fd: Fd) -> Result<Fd> {
        self.streams.get(fd)?;
        let new_fd = self.streams.next_fd(self.config.max_open_fds)?;
        self.streams.share(fd, new_fd)?;
        Ok(new_fd)
    }

    /// Duplicates `fd` onto `new_fd`, closing whatever `new_fd` held.
    pub fn dup2(&mut self, fd: Fd, new_fd: Fd) -> Result<Fd> {
        self.streams.get(fd)?;
        if fd == new_fd {
            return Ok(fd);
        }
        if new_fd as usize >= self.config.max_open_fds {
            return Err(Errno::Badf);
        }
        if self.streams.is_open(new_fd) {
            self.close(new_fd)?;
        }
        self.streams.share(fd, new_fd)?;
        Ok(new_fd)
    }

    /// Next directory entries of a directory stream, at most `max`.
    ///
    /// The listing is captured on the first call and the stream position
    /// counts entries already returned; seeking to zero recaptures it.
    pub fn getdents(&mut self, fd: Fd, max: usize) -> Result<Vec<DirEntry>> {
        let dir = self.stream_node(fd)?;
        if !self.node_ref(dir)?.is_dir() {
            return Err(Errno::Notdir);
        }
        if self.streams.get(fd)?.listing.is_none() {
            let listing = self.list_entries(dir)?;
            self.streams.get_mut(fd)?.listing = Some(listing);
        }
        let stream = self.streams.get_mut(fd)?;
        let start = usize::try_from(stream.position).map_err(|_| Errno::Overflow)?;
        let entries: Vec<DirEntry> = stream
            .listing
            .as_deref()
            .unwrap_or_default()
            .iter()
            .skip(start)
            .take(max)
            .cloned()
            .collect();
        stream.position += entries.len() as u64;
        Ok(entries)
    }

    fn list_entries(&mut self, dir: NodeId) -> Result<Vec<DirEntry>> {
        let names = self.readdir_node(dir)?;
        let parent = self.node_ref(dir)?.parent;
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let id = match name.as_str() {
                "." => dir,
                ".." => parent,
                _ => self.lookup_node(dir, &name)?,
            };
            let node = self.node_ref(id)?;
            entries.push(DirEntry {
                ino: node.id.get(),
                file_type: node.content.file_type(),
                name,
            });
        }
        Ok(entries)
    }

    /// ### `allocate()`
    /// Makes sure `offset..offset + len` is backed by storage.
    /// Inputs:
    /// - `len`
    ///     Must be non-zero
    #[instrument(level = "trace", skip_all, fields(%fd, %offset, %len), ret)]
    pub fn allocate(&mut self, fd: Fd, offset: u64, len: u64) -> Result<()> {
        let node = self.stream_node(fd)?;
        if len == 0 {
            return Err(Errno::Inval);
        }
        if self.streams.get(fd)?.flags.access_mode() == AccessMode::ReadOnly {
            return Err(Errno::Badf);
        }
        let node = self.node_mut(node)?;
        if node.is_dir() {
            return Err(Errno::Notsup);
        }
        node.content
            .as_file_mut()
            .ok_or(Errno::Nodev)?
            .allocate(offset, len)?;
        node.touch_modified(Timespec::now());
        Ok(())
    }

    /// ### `mmap()`
    /// Maps `len` bytes of the file at `offset` into a fresh buffer.
    /// Inputs:
    /// - `prot`
    ///     Writable mappings need a read-write stream unless private
    /// - `flags`
    ///     `PRIVATE` mappings are never written back
    #[instrument(level = "trace", skip_all, fields(%fd, %len, %offset), err)]
    pub fn mmap(
        &mut self,
        fd: Fd,
        len: usize,
        offset: u64,
        prot: MmapProt,
        flags: MmapFlags,
    ) -> Result<Mapping> {
        let node = self.stream_node(fd)?;
        let access = self.streams.get(fd)?.flags.access_mode();
        if prot.contains(MmapProt::WRITE)
            && !flags.contains(MmapFlags::PRIVATE)
            && access != AccessMode::ReadWrite
        {
            return Err(Errno::Access);
        }
        if access == AccessMode::WriteOnly {
            return Err(Errno::Access);
        }
        let file = self
            .node_mut(node)?
            .content
            .as_file_mut()
            .ok_or(Errno::Nodev)?;
        if len == 0 {
            return Err(Errno::Inval);
        }
        let data = file.snapshot(offset, len)?;
        Ok(Mapping {
            data,
            node,
            offset,
            prot,
            flags,
        })
    }

    /// Writes a shared, writable mapping back to its file. The write never
    /// extends the file. Private or read-only mappings are left alone.
    pub fn msync(&mut self, mapping: &Mapping) -> Result<()> {
        if !mapping.is_shared() || !mapping.prot.contains(MmapProt::WRITE) {
            return Ok(());
        }
        let node = self.node_mut(mapping.node).map_err(|_| Errno::Nodev)?;
        let file = node.content.as_file_mut().ok_or(Errno::Nodev)?;
        let size = file.size();
        if mapping.offset >= size {
            return Ok(());
        }
        let room = usize::try_from(size - mapping.offset).unwrap_or(usize::MAX);
        let end = mapping.data.len().min(room);
        file.write_at(mapping.offset, &mapping.data[..end])?;
        node.touch_modified(Timespec::now());
        Ok(())
    }

    /// Releases a mapping, syncing it first.
    pub fn munmap(&mut self, mapping: Mapping) -> Result<()> {
        self.msync(&mapping)
    }

    #[instrument(level = "trace", skip_all, fields(%fd, ?request), ret)]
    pub fn ioctl(&mut self, fd: Fd, request: IoctlRequest) -> Result<IoctlReply> {
        let node = self.node_ref(self.stream_node(fd)?)?;
        if !node.is_device() {
            return Err(Errno::Notty);
        }
        let rdev = node.rdev;
        self.devices.get_mut(rdev)?.ioctl(request)
    }

    pub fn isatty(&mut self, fd: Fd) -> Result<bool> {
        let node = self.node_ref(self.stream_node(fd)?)?;
        if !node.is_device() {
            return Ok(false);
        }
        let rdev = node.rdev;
        Ok(self.devices.get_mut(rdev).is_ok_and(|device| device.is_tty()))
    }

    /// Flushes buffered device output; a no-op for memory-backed nodes.
    pub fn fsync(&mut self, fd: Fd) -> Result<()> {
        let node = self.node_ref(self.stream_node(fd)?)?;
        if !node.is_device() {
            return Ok(());
        }
        let rdev = node.rdev;
        self.devices.get_mut(rdev)?.fsync()
    }

    pub fn fstat(&self, fd: Fd) -> Result<Stat> {
        self.stat_node(self.stream_node(fd)?)
    }

    pub fn fchmod(&mut self, fd: Fd, mode: u32) -> Result<()> {
        let node = self.stream_node(fd)?;
        self.chmod_node(node, mode)
    }

    pub fn fchown(&mut self, fd: Fd, uid: u32, gid: u32) -> Result<()> {
        let node = self.stream_node(fd)?;
        self.chown_node(node, uid, gid)
    }

    pub fn ftruncate(&mut self, fd: Fd, len: u64) -> Result<()> {
        let node = self.stream_node(fd)?;
        if !self.streams.get(fd)?.flags.is_writable() {
            return Err(Errno::Inval);
        }
        self.truncate_node(node, len)
    }

    pub fn fchdir(&mut self, fd: Fd) -> Result<()> {
        let node = self.stream_node(fd)?;
        if !self.node_ref(node)?.is_dir() {
            return Err(Errno::Notdir);
        }
        self.cwd = self.path_of(node)?;
        Ok(())
    }

    /// Pushes `bytes` back so the next plain `read` returns them first.
    pub fn unread(&mut self, fd: Fd, bytes: &[u8]) -> Result<()> {
        let stream = self.streams.get_mut(fd)?;
        for &byte in bytes.iter().rev() {
            stream.ungotten.push_front(byte);
        }
        Ok(())
    }

    /// Closes every open descriptor, flushing terminals. Keeps going after
    /// a failure and reports the first one.
    pub fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;
        for fd in self.streams.open_fds() {
            if let Err(err) = self.close(fd) {
                first_error.get_or_insert(err);
            }
        }
        debug!("filesystem shut down");
        first_error.map_or(Ok(()), Err)
    }
}
