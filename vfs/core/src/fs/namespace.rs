//! Operations on names: creation, removal, renaming, listing and
//! attributes.

use super::{Filesystem, LookupOptions};
use crate::errno::{Errno, Result};
use crate::flags::{OpenFlags, Permissions};
use crate::ids::{Dev, Fd, NodeId};
use crate::mode::{FileType, Mode, PERMISSION_MASK, S_IFCHR, S_IFDIR, S_IFREG};
use crate::node::{FileOps, NodeContent, Timespec};
use crate::path;
use crate::store::{ContentSource, LazyFile, MemFile};
use tracing::{debug, instrument};

const BLOCK_SIZE: u32 = 4096;

/// Attributes reported by `stat`, `lstat` and `fstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub dev: u64,
    pub ino: u64,
    pub mode: Mode,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u32,
    pub blocks: u64,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
}

impl Filesystem {
    /// ### `mknod()`
    /// Creates a node of the type encoded in `mode`.
    /// Inputs:
    /// - `path`
    ///     Where to create it; every parent must exist
    /// - `mode`
    ///     Type bits plus permission bits
    /// - `dev`
    ///     Device number for character devices, [`Dev::NONE`] otherwise
    #[instrument(level = "trace", skip_all, fields(%path, mode = mode), ret)]
    pub fn mknod(&mut self, path: &str, mode: u32, dev: Dev) -> Result<NodeId> {
        let lookup = self.lookup_path(path, LookupOptions::parent())?;
        let name = path::basename(&path::resolve(&self.cwd, &[path]));
        self.check_new_name(&name)?;
        self.may_create(lookup.node, &name)?;
        self.create_node(lookup.node, &name, Mode::new(mode), dev, None)
    }

    fn check_new_name(&self, name: &str) -> Result<()> {
        match name {
            "/" => Err(Errno::Exist),
            "" | "." | ".." => Err(Errno::Inval),
            name if name.len() > self.config.max_name_len => Err(Errno::Nametoolong),
            _ => Ok(()),
        }
    }

    /// Creates a regular file. Only the permission bits of `mode` are used.
    pub fn create(&mut self, path: &str, mode: u32) -> Result<NodeId> {
        self.mknod(path, (mode & PERMISSION_MASK) | S_IFREG, Dev::NONE)
    }

    pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<NodeId> {
        self.mknod(path, (mode & 0o1777) | S_IFDIR, Dev::NONE)
    }

    /// Creates every missing directory along `path`.
    pub fn mkdir_tree(&mut self, path: &str, mode: u32) -> Result<()> {
        let absolute = path::is_absolute(path);
        let mut prefix = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !prefix.is_empty() || absolute {
                prefix.push('/');
            }
            prefix.push_str(part);
            match self.mkdir(&prefix, mode) {
                Ok(_) | Err(Errno::Exist) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Creates a character device node bound to `dev`.
    pub fn mkdev(&mut self, path: &str, mode: u32, dev: Dev) -> Result<NodeId> {
        self.mknod(path, (mode & PERMISSION_MASK) | S_IFCHR, dev)
    }

    #[instrument(level = "trace", skip_all, fields(%target, %link_path), ret)]
    pub fn symlink(&mut self, target: &str, link_path: &str) -> Result<NodeId> {
        if path::resolve(&self.cwd, &[target]).is_empty() {
            return Err(Errno::Noent);
        }
        let lookup = self.lookup_path(link_path, LookupOptions::parent())?;
        let name = path::basename(&path::resolve(&self.cwd, &[link_path]));
        self.check_new_name(&name)?;
        self.may_create(lookup.node, &name)?;
        self.create_node(
            lookup.node,
            &name,
            Mode::from_parts(FileType::Symlink, 0o777),
            Dev::NONE,
            Some(target),
        )
    }

    pub fn readlink(&mut self, path: &str) -> Result<String> {
        let lookup = self.lookup_path(path, LookupOptions::default())?;
        self.read_link_node(lookup.node)
    }

    /// ### `rename()`
    /// Moves `old_path` to `new_path`, replacing whatever was there.
    ///
    /// Every check runs before anything changes, so on error both
    /// directories and the name index are untouched.
    #[instrument(level = "trace", skip_all, fields(%old_path, %new_path), ret)]
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        let old_abs = path::resolve(&self.cwd, &[old_path]);
        let new_abs = path::resolve(&self.cwd, &[new_path]);
        if old_abs.is_empty() || new_abs.is_empty() {
            return Err(Errno::Noent);
        }
        let old_name = path::basename(&old_abs);
        let new_name = path::basename(&new_abs);
        if old_name == "/" || new_name == "/" {
            return Err(Errno::Busy);
        }

        let old_dir = self.lookup_path(&old_abs, LookupOptions::parent())?.node;
        let new_dir = self.lookup_path(&new_abs, LookupOptions::parent())?.node;
        if self.node_ref(old_dir)?.mount != self.node_ref(new_dir)?.mount {
            return Err(Errno::Xdev);
        }
        self.check_new_name(&new_name)?;

        let old_node = self.lookup_node(old_dir, &old_name)?;
        let new_node = self.lookup_node(new_dir, &new_name).ok();
        if new_node == Some(old_node) {
            return Ok(());
        }
        // Ancestry is checked on resolved nodes so a symlinked or
        // dot-dotted path cannot sneak a directory under itself.
        if self.is_ancestor(old_node, new_dir)? {
            return Err(Errno::Inval);
        }
        if let Some(target) = new_node {
            if self.is_ancestor(target, old_dir)? {
                return Err(Errno::Notempty);
            }
        }

        let is_dir = self.node_ref(old_node)?.is_dir();
        self.may_delete(old_dir, &old_name, is_dir)?;
        match new_node {
            Some(_) => {
                self.may_delete(new_dir, &new_name, is_dir)?;
            }
            None => self.may_create(new_dir, &new_name)?,
        }
        if self.node_ref(old_node)?.mounted.is_some() {
            return Err(Errno::Busy);
        }
        if let Some(target) = new_node {
            if self.node_ref(target)?.mounted.is_some() {
                return Err(Errno::Busy);
            }
        }
        if new_dir != old_dir {
            self.node_permissions(old_dir, Permissions::WRITE)?;
        }
        if let Some(target) = new_node {
            let target_dir = self.node_ref(target)?.content.as_dir();
            if target_dir.is_some_and(|dir| !dir.is_empty()) {
                return Err(Errno::Notempty);
            }
        }

        let now = Timespec::now();
        if let Some(target) = new_node {
            self.unlink_node(new_dir, &new_name, target)?;
        }
        self.names.remove(old_dir, &old_name, old_node);
        if let Some(dir) = self.node_mut(old_dir)?.content.as_dir_mut() {
            dir.remove(&old_name);
        }
        if let Some(dir) = self.node_mut(new_dir)?.content.as_dir_mut() {
            dir.insert(&new_name, old_node);
        }
        self.names.insert(new_dir, &new_name, old_node);
        let node = self.node_mut(old_node)?;
        node.parent = new_dir;
        node.name = new_name;
        node.ctime = now;
        self.node_mut(old_dir)?.touch_modified(now);
        self.node_mut(new_dir)?.touch_modified(now);
        if is_dir {
            self.refresh_mountpoints()?;
        }
        debug!(%old_node, old = %old_abs, new = %new_abs, "renamed");
        Ok(())
    }

    #[instrument(level = "trace", skip_all, fields(%path), ret)]
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.split_parent(path)?;
        let id = self.may_delete(parent, &name, false)?;
        if self.node_ref(id)?.mounted.is_some() {
            return Err(Errno::Busy);
        }
        self.unlink_node(parent, &name, id)?;
        debug!(%id, path, "unlinked");
        Ok(())
    }

    #[instrument(level = "trace", skip_all, fields(%path), ret)]
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.split_parent(path)?;
        let id = self.may_delete(parent, &name, true)?;
        let node = self.node_ref(id)?;
        if node.mounted.is_some() {
            return Err(Errno::Busy);
        }
        if node.content.as_dir().is_some_and(|dir| !dir.is_empty()) {
            return Err(Errno::Notempty);
        }
        self.unlink_node(parent, &name, id)?;
        debug!(%id, path, "removed directory");
        Ok(())
    }

    /// Parent directory and final name of `path`.
    fn split_parent(&mut self, path: &str) -> Result<(NodeId, String)> {
        let parent = self.lookup_path(path, LookupOptions::parent())?.node;
        let name = path::basename(&path::resolve(&self.cwd, &[path]));
        if name == "/" {
            return Err(Errno::Busy);
        }
        Ok((parent, name))
    }

    /// Entry names of a directory: `.` and `..` first, then insertion order.
    pub fn readdir(&mut self, path: &str) -> Result<Vec<String>> {
        let lookup = self.lookup_path(path, LookupOptions::follow())?;
        self.readdir_node(lookup.node)
    }

    pub(crate) fn readdir_node(&self, id: NodeId) -> Result<Vec<String>> {
        let node = self.node_ref(id)?;
        let dir = node.content.as_dir().ok_or(Errno::Notdir)?;
        let mut names = vec![".".to_string(), "..".to_string()];
        names.extend(dir.iter().map(|(name, _)| name.to_string()));

        // Entries the store can still materialize.
        let backend = &self.mounts.get(node.mount)?.backend;
        let remote = backend.list(&self.mount_relative_path(id)?);
        for name in remote {
            if dir.get(&name).is_none() {
                names.push(name);
            }
        }
        Ok(names)
    }

    pub(crate) fn stat_node(&self, id: NodeId) -> Result<Stat> {
        let node = self.node_ref(id)?;
        let size = node.size();
        Ok(Stat {
            dev: if node.is_device() { node.id.get() } else { 1 },
            ino: node.id.get(),
            mode: node.mode,
            nlink: if node.is_dir() { 2 } else { 1 },
            uid: node.uid,
            gid: node.gid,
            rdev: node.rdev.raw(),
            size,
            blksize: BLOCK_SIZE,
            blocks: size.div_ceil(u64::from(BLOCK_SIZE)),
            atime: node.atime,
            mtime: node.mtime,
            ctime: node.ctime,
        })
    }

    pub fn stat(&mut self, path: &str) -> Result<Stat> {
        let lookup = self.lookup_path(path, LookupOptions::follow())?;
        self.stat_node(lookup.node)
    }

    /// Like [`stat`](Self::stat) but reports a final symlink itself.
    pub fn lstat(&mut self, path: &str) -> Result<Stat> {
        let lookup = self.lookup_path(path, LookupOptions::default())?;
        self.stat_node(lookup.node)
    }

    pub(crate) fn chmod_node(&mut self, id: NodeId, mode: u32) -> Result<()> {
        self.check_mount_writable(id)?;
        let node = self.node_mut(id)?;
        node.mode = node.mode.with_permissions(mode);
        node.ctime = Timespec::now();
        Ok(())
    }

    pub(crate) fn chown_node(&mut self, id: NodeId, uid: u32, gid: u32) -> Result<()> {
        self.check_mount_writable(id)?;
        let node = self.node_mut(id)?;
        node.uid = uid;
        node.gid = gid;
        node.ctime = Timespec::now();
        Ok(())
    }

    pub fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let lookup = self.lookup_path(path, LookupOptions::follow())?;
        self.chmod_node(lookup.node, mode)
    }

    pub fn lchmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let lookup = self.lookup_path(path, LookupOptions::default())?;
        self.chmod_node(lookup.node, mode)
    }

    pub fn chown(&mut self, path: &str, uid: u32, gid: u32) -> Result<()> {
        let lookup = self.lookup_path(path, LookupOptions::follow())?;
        self.chown_node(lookup.node, uid, gid)
    }

    pub fn lchown(&mut self, path: &str, uid: u32, gid: u32) -> Result<()> {
        let lookup = self.lookup_path(path, LookupOptions::default())?;
        self.chown_node(lookup.node, uid, gid)
    }

    pub fn utime(&mut self, path: &str, atime: Timespec, mtime: Timespec) -> Result<()> {
        let lookup = self.lookup_path(path, LookupOptions::follow())?;
        self.check_mount_writable(lookup.node)?;
        let node = self.node_mut(lookup.node)?;
        node.atime = atime;
        node.mtime = mtime;
        node.ctime = Timespec::now();
        Ok(())
    }

    pub(crate) fn truncate_node(&mut self, id: NodeId, len: u64) -> Result<()> {
        let node = self.node_ref(id)?;
        if node.is_dir() {
            return Err(Errno::Isdir);
        }
        if !node.is_file() {
            return Err(Errno::Inval);
        }
        self.node_permissions(id, Permissions::WRITE)?;
        self.check_mount_writable(id)?;
        let node = self.node_mut(id)?;
        node.content.as_file_mut().ok_or(Errno::Inval)?.set_len(len)?;
        node.touch_modified(Timespec::now());
        Ok(())
    }

    #[instrument(level = "trace", skip_all, fields(%path, %len), ret)]
    pub fn truncate(&mut self, path: &str, len: u64) -> Result<()> {
        let lookup = self.lookup_path(path, LookupOptions::follow())?;
        self.truncate_node(lookup.node, len)
    }

    /// Checks `perms` against the node; an empty set only tests existence.
    pub fn access(&mut self, path: &str, perms: Permissions) -> Result<()> {
        let lookup = self.lookup_path(path, LookupOptions::follow())?;
        if perms.is_empty() {
            return Ok(());
        }
        self.node_permissions(lookup.node, perms)
    }

    pub fn chdir(&mut self, path: &str) -> Result<()> {
        let lookup = self.lookup_path(path, LookupOptions::follow())?;
        if !self.node_ref(lookup.node)?.is_dir() {
            return Err(Errno::Notdir);
        }
        self.node_permissions(lookup.node, Permissions::EXEC)?;
        debug!(cwd = %lookup.path, "changed directory");
        self.cwd = lookup.path;
        Ok(())
    }

    /// Canonical absolute path with every symlink expanded.
    pub fn realpath(&mut self, path: &str) -> Result<String> {
        let lookup = self.lookup_path(path, LookupOptions::follow())?;
        self.path_of(lookup.node)
    }

    /// Creates each directory of `path` below `parent` and returns the
    /// deepest path. Components that already exist as directories are
    /// kept.
    pub fn create_path(&mut self, parent: &str, path: &str) -> Result<String> {
        let mut current = parent.to_string();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let next = path::join2(&current, part);
            match self.mkdir(&next, 0o777) {
                Ok(_) => {}
                Err(Errno::Exist) => {
                    if !self.stat(&next)?.mode.is_dir() {
                        return Err(Errno::Notdir);
                    }
                }
                Err(e) => return Err(e),
            }
            current = next;
        }
        Ok(current)
    }

    /// Replaces the contents of `path`, creating it if needed.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let fd = self.open(
            path,
            OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC,
            0o666,
        )?;
        let mut written = 0;
        let result = loop {
            if written == data.len() {
                break Ok(());
            }
            match self.write(fd, &data[written..]) {
                Ok(0) => break Err(Errno::Io),
                Ok(count) => written += count,
                Err(err) => break Err(err),
            }
        };
        let closed = self.close(fd);
        result.and(closed)
    }

    /// Reads all of `path`. Devices are read up to their reported size.
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let fd = self.open(path, OpenFlags::empty(), 0)?;
        let result = self.read_to_end(fd);
        let closed = self.close(fd);
        let data = result?;
        closed?;
        Ok(data)
    }

    fn read_to_end(&mut self, fd: Fd) -> Result<Vec<u8>> {
        let stat = self.fstat(fd)?;
        let is_file = stat.mode.is_file();
        let mut data = vec![0u8; usize::try_from(stat.size).map_err(|_| Errno::Fbig)?];
        let mut filled = 0;
        loop {
            if filled == data.len() {
                if !is_file {
                    break;
                }
                data.resize(data.len() + BLOCK_SIZE as usize, 0);
            }
            let count = self.read(fd, &mut data[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        data.truncate(filled);
        Ok(data)
    }

    /// Creates a file holding `data`, taking ownership of the buffer.
    ///
    /// With `name` the file is `parent/name`, otherwise `parent` itself.
    pub fn create_data_file(
        &mut self,
        parent: &str,
        name: Option<&str>,
        data: Vec<u8>,
        readable: bool,
        writable: bool,
    ) -> Result<NodeId> {
        let path = match name {
            Some(name) => path::join2(parent, name),
            None => parent.to_string(),
        };
        let id = self.create(&path, Mode::for_access(readable, writable))?;
        let len = data.len();
        let node = self.node_mut(id)?;
        node.content = NodeContent::File(MemFile::from_vec(data));
        node.touch_modified(Timespec::now());
        debug!(%id, %path, len, "created data file");
        Ok(id)
    }

    /// Creates a file whose contents are fetched from `source` on first
    /// access.
    pub fn create_lazy_file(
        &mut self,
        parent: &str,
        name: &str,
        source: impl ContentSource + 'static,
        readable: bool,
        writable: bool,
    ) -> Result<NodeId> {
        let path = path::join2(parent, name);
        let id = self.create(&path, Mode::for_access(readable, writable))?;
        self.node_mut(id)?.content = NodeContent::Lazy(LazyFile::new(source));
        Ok(id)
    }
}
