//! The filesystem: namespace, mount table, device registry and
//! descriptor table behind one owner.
//!
//! Every syscall-level operation is a method on [`Filesystem`] and reports
//! failure as an [`Errno`]. A failed operation leaves the namespace exactly
//! as it found it.

mod io;
mod lookup;
mod mount;
mod namespace;
mod setup;

pub use self::io::Mapping;
pub use lookup::{Lookup, LookupOptions};
pub use namespace::Stat;
pub use setup::{DEV_NULL, DEV_TTY, DEV_TTY1, FilesystemBuilder};

use crate::config::FsConfig;
use crate::device::{DeviceOps, DeviceRegistry};
use crate::errno::{Errno, Result};
use crate::flags::{OpenFlags, Permissions};
use crate::ids::{Dev, Fd, MountId, NodeId};
use crate::mode::{FileType, Mode};
use crate::mount::{Mount, MountOptions, MountTable};
use crate::name_table::NameTable;
use crate::node::{Node, NodeContent, Timespec};
use crate::store::{Backend, MemFs};
use crate::stream::{Stream, StreamTable};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct Filesystem {
    config: FsConfig,
    nodes: HashMap<NodeId, Node>,
    names: NameTable,
    mounts: MountTable,
    streams: StreamTable,
    devices: DeviceRegistry,
    root: NodeId,
    cwd: String,
    next_ino: u64,
}

impl Filesystem {
    /// A filesystem with the default directory tree, devices and standard
    /// streams wired to the host terminal.
    pub fn new() -> Result<Self> {
        FilesystemBuilder::new().build()
    }

    pub fn builder() -> FilesystemBuilder {
        FilesystemBuilder::new()
    }

    /// Only an empty in-memory root: no directories, devices or streams.
    pub fn bare(config: FsConfig) -> Result<Self> {
        let mut fs = Self {
            config,
            nodes: HashMap::new(),
            names: NameTable::default(),
            mounts: MountTable::default(),
            streams: StreamTable::default(),
            devices: DeviceRegistry::new(),
            root: NodeId::new(0),
            cwd: String::from("/"),
            next_ino: 1,
        };
        let root_mount =
            fs.attach_mount(Arc::new(MemFs), MountOptions::default(), "/".to_string(), None, None)?;
        fs.root = fs.mounts.get(root_mount)?.root;
        Ok(fs)
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The working directory, always absolute and normalized.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Live nodes, including unlinked ones that are still open.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Entries in the `(parent, name)` index.
    pub fn indexed_names(&self) -> usize {
        self.names.len()
    }

    pub fn mounts(&self) -> impl Iterator<Item = &Mount> {
        self.mounts.iter()
    }

    pub fn mount_info(&self, id: MountId) -> Option<&Mount> {
        self.mounts.get(id).ok()
    }

    pub fn stream(&self, fd: Fd) -> Result<&Stream> {
        self.streams.get(fd)
    }

    /// Open descriptors in ascending order.
    pub fn open_fds(&self) -> Vec<Fd> {
        self.streams.open_fds()
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Installs a driver for `dev`, replacing any previous one.
    pub fn register_device(&mut self, dev: Dev, ops: Box<dyn DeviceOps>) {
        self.devices.register(dev, ops);
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(Errno::Noent)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(Errno::Noent)
    }

    fn alloc_ino(&mut self) -> NodeId {
        let id = NodeId::new(self.next_ino);
        self.next_ino += 1;
        id
    }

    /// Absolute path of a node, walking parents up through mount points.
    ///
    /// At a mount root the walk continues from the directory the mount
    /// covers, so the result follows renames of any ancestor.
    pub fn path_of(&self, id: NodeId) -> Result<String> {
        let mut names: Vec<&str> = Vec::new();
        for step in self.ancestry(id) {
            let node = self.node_ref(step?)?;
            if !node.is_root() {
                names.push(&node.name);
            }
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }

    /// `id` followed by each directory above it up to the global root,
    /// stepping from a mount root to the directory it covers. Fails with
    /// `ELOOP` rather than cycling if the parent links ever form a loop.
    fn ancestry(&self, id: NodeId) -> impl Iterator<Item = Result<NodeId>> + '_ {
        let mut next = Some(Ok(id));
        let mut budget = self.nodes.len() + 1;
        std::iter::from_fn(move || {
            let current = next.take()?;
            let Ok(id) = current else {
                return Some(current);
            };
            if budget == 0 {
                return Some(Err(Errno::Loop));
            }
            budget -= 1;
            next = self.step_up(id).transpose();
            Some(Ok(id))
        })
    }

    /// The directory above `id`, or `None` at the global root.
    fn step_up(&self, id: NodeId) -> Result<Option<NodeId>> {
        let node = self.node_ref(id)?;
        if !node.is_root() {
            return Ok(Some(node.parent));
        }
        Ok(self.mounts.get(node.mount)?.covered)
    }

    /// Whether `ancestor` is `id` itself or any directory above it.
    pub(crate) fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> Result<bool> {
        for step in self.ancestry(id) {
            if step? == ancestor {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Recomputes the stored mountpoint of every mount after a rename
    /// moved one of the directories they hang under.
    fn refresh_mountpoints(&mut self) -> Result<()> {
        let covered: Vec<(MountId, NodeId)> = self
            .mounts
            .iter()
            .filter_map(|mount| mount.covered.map(|node| (mount.id, node)))
            .collect();
        for (id, node) in covered {
            let path = self.path_of(node)?;
            self.mounts.get_mut(id)?.mountpoint = path;
        }
        Ok(())
    }

    /// Path of a node relative to the root of its own mount, as the store
    /// sees it.
    pub(crate) fn mount_relative_path(&self, id: NodeId) -> Result<String> {
        let mut names: Vec<&str> = Vec::new();
        let mut node = self.node_ref(id)?;
        while !node.is_root() {
            names.push(&node.name);
            node = self.node_ref(node.parent)?;
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }

    fn attach_mount(
        &mut self,
        backend: Arc<dyn Backend>,
        options: MountOptions,
        mountpoint: String,
        covered: Option<NodeId>,
        parent: Option<MountId>,
    ) -> Result<MountId> {
        let content = backend.create_node(FileType::Directory, None)?;
        let root = self.alloc_ino();
        let mode = Mode::from_parts(FileType::Directory, options.root_mode.unwrap_or(0o777));
        let mount = self.mounts.insert_with(|id| Mount {
            id,
            backend,
            options,
            mountpoint,
            root,
            covered,
            parent,
            children: Vec::new(),
        })?;
        let now = Timespec::now();
        self.nodes.insert(
            root,
            Node {
                id: root,
                parent: root,
                name: String::from("/"),
                mode,
                rdev: Dev::NONE,
                mount,
                mounted: None,
                uid: 0,
                gid: 0,
                atime: now,
                mtime: now,
                ctime: now,
                content,
                open_streams: 0,
                linked: true,
            },
        );
        Ok(mount)
    }

    /// Links a new node under `parent`. Parent timestamps are left alone.
    fn attach_node(
        &mut self,
        parent: NodeId,
        name: &str,
        mode: Mode,
        rdev: Dev,
        content: NodeContent,
    ) -> Result<NodeId> {
        let mount = self.node_ref(parent)?.mount;
        let id = self.alloc_ino();
        let now = Timespec::now();
        self.node_mut(parent)?
            .content
            .as_dir_mut()
            .ok_or(Errno::Notdir)?
            .insert(name, id);
        self.names.insert(parent, name, id);
        self.nodes.insert(
            id,
            Node {
                id,
                parent,
                name: name.to_string(),
                mode,
                rdev,
                mount,
                mounted: None,
                uid: 0,
                gid: 0,
                atime: now,
                mtime: now,
                ctime: now,
                content,
                open_streams: 0,
                linked: true,
            },
        );
        Ok(id)
    }

    /// Asks the mount's store for the contents, then links the node.
    fn create_node(
        &mut self,
        parent: NodeId,
        name: &str,
        mode: Mode,
        rdev: Dev,
        link_target: Option<&str>,
    ) -> Result<NodeId> {
        let file_type = mode.file_type().ok_or(Errno::Inval)?;
        let mount = self.node_ref(parent)?.mount;
        let content = self
            .mounts
            .get(mount)?
            .backend
            .create_node(file_type, link_target)?;
        let id = self.attach_node(parent, name, mode, rdev, content)?;
        self.node_mut(parent)?.touch_modified(Timespec::now());
        debug!(%parent, name, ?mode, %id, "created node");
        Ok(id)
    }

    /// Removes `name` from `parent` and drops the node unless a stream
    /// still refers to it.
    fn unlink_node(&mut self, parent: NodeId, name: &str, id: NodeId) -> Result<()> {
        if let Some(dir) = self.node_mut(parent)?.content.as_dir_mut() {
            dir.remove(name);
        }
        self.names.remove(parent, name, id);
        self.node_mut(parent)?.touch_modified(Timespec::now());
        self.release_node(id);
        Ok(())
    }

    fn release_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.linked = false;
        if node.open_streams == 0 {
            self.nodes.remove(&id);
            trace!(%id, "destroyed node");
        } else {
            debug!(%id, streams = node.open_streams, "unlinked node kept alive by open streams");
        }
    }

    /// Drops one stream reference, reclaiming an unlinked node on the last.
    fn release_stream_ref(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.open_streams = node.open_streams.saturating_sub(1);
        if node.open_streams == 0 && !node.linked {
            self.nodes.remove(&id);
            debug!(%id, "reclaimed unlinked node on last close");
        }
    }

    pub(crate) fn node_permissions(&self, id: NodeId, perms: Permissions) -> Result<()> {
        if !self.config.enforce_permissions {
            return Ok(());
        }
        let mode = self.node_ref(id)?.mode;
        if mode.grants(
            perms.contains(Permissions::READ),
            perms.contains(Permissions::WRITE),
            perms.contains(Permissions::EXEC),
        ) {
            Ok(())
        } else {
            Err(Errno::Access)
        }
    }

    fn check_mount_writable(&self, id: NodeId) -> Result<()> {
        let mount = self.node_ref(id)?.mount;
        if self.mounts.get(mount)?.options.read_only {
            return Err(Errno::Rofs);
        }
        Ok(())
    }

    fn may_lookup(&self, dir: NodeId) -> Result<()> {
        if !self.node_ref(dir)?.is_dir() {
            return Err(Errno::Notdir);
        }
        self.node_permissions(dir, Permissions::EXEC)
    }

    fn may_create(&mut self, dir: NodeId, name: &str) -> Result<()> {
        if !self.node_ref(dir)?.is_dir() {
            return Err(Errno::Notdir);
        }
        if self.lookup_node(dir, name).is_ok() {
            return Err(Errno::Exist);
        }
        self.check_mount_writable(dir)?;
        self.node_permissions(dir, Permissions::WRITE | Permissions::EXEC)
    }

    /// Validates removing `name` from `dir` and returns the victim.
    fn may_delete(&mut self, dir: NodeId, name: &str, is_dir: bool) -> Result<NodeId> {
        let id = self.lookup_node(dir, name)?;
        self.node_permissions(dir, Permissions::WRITE | Permissions::EXEC)?;
        let node = self.node_ref(id)?;
        if is_dir {
            if !node.is_dir() {
                return Err(Errno::Notdir);
            }
            if node.is_root() || self.path_of(id)? == self.cwd {
                return Err(Errno::Busy);
            }
        } else if node.is_dir() {
            return Err(Errno::Isdir);
        }
        self.check_mount_writable(dir)?;
        Ok(id)
    }

    fn may_open(&self, id: NodeId, flags: OpenFlags) -> Result<()> {
        let node = self.node_ref(id)?;
        if node.is_symlink() {
            return Err(Errno::Loop);
        }
        if node.is_dir() && (flags.is_writable() || flags.contains(OpenFlags::TRUNC)) {
            return Err(Errno::Isdir);
        }
        if flags.is_writable() || flags.contains(OpenFlags::TRUNC) {
            self.check_mount_writable(id)?;
        }
        self.node_permissions(id, flags.required_permissions())
    }
}
