//! The mount table.

use crate::errno::{Errno, Result};
use crate::ids::{MountId, NodeId};
use crate::store::Backend;
use slab::Slab;
use std::sync::Arc;

/// Options accepted when attaching a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Refuse every mutation inside the mount with `EROFS`.
    pub read_only: bool,
    /// Permission bits of the mount's root directory (default `0o777`).
    pub root_mode: Option<u32>,
}

impl MountOptions {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct Mount {
    pub(crate) id: MountId,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) options: MountOptions,
    /// Absolute path the mount is attached at.
    pub(crate) mountpoint: String,
    pub(crate) root: NodeId,
    /// The directory this mount covers; `None` for the root mount.
    pub(crate) covered: Option<NodeId>,
    pub(crate) parent: Option<MountId>,
    pub(crate) children: Vec<MountId>,
}

impl Mount {
    pub fn id(&self) -> MountId {
        self.id
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn options(&self) -> &MountOptions {
        &self.options
    }

    pub fn mountpoint(&self) -> &str {
        &self.mountpoint
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The directory hidden by this mount.
    pub fn covered(&self) -> Option<NodeId> {
        self.covered
    }

    pub fn children(&self) -> &[MountId] {
        &self.children
    }
}

#[derive(Debug, Default)]
pub(crate) struct MountTable {
    mounts: Slab<Mount>,
}

impl MountTable {
    /// Reserves the next id; `build` receives it and produces the entry.
    pub(crate) fn insert_with(&mut self, build: impl FnOnce(MountId) -> Mount) -> Result<MountId> {
        let entry = self.mounts.vacant_entry();
        let id = MountId::from_index(entry.key()).ok_or(Errno::Nospc)?;
        entry.insert(build(id));
        Ok(id)
    }

    pub(crate) fn get(&self, id: MountId) -> Result<&Mount> {
        self.mounts.get(id.index()).ok_or(Errno::Inval)
    }

    pub(crate) fn get_mut(&mut self, id: MountId) -> Result<&mut Mount> {
        self.mounts.get_mut(id.index()).ok_or(Errno::Inval)
    }

    pub(crate) fn remove(&mut self, id: MountId) -> Option<Mount> {
        self.mounts.try_remove(id.index())
    }

    /// `id` followed by every mount nested below it, parents first.
    pub(crate) fn subtree(&self, id: MountId) -> Vec<MountId> {
        let mut out = vec![id];
        let mut next = 0;
        while next < out.len() {
            if let Ok(mount) = self.get(out[next]) {
                out.extend(mount.children.iter().copied());
            }
            next += 1;
        }
        out
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Mount> {
        self.mounts.iter().map(|(_, mount)| mount)
    }
}
