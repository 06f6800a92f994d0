//! Attaching and detaching stores.

use super::{Filesystem, LookupOptions};
use crate::errno::{Errno, Result};
use crate::ids::{MountId, NodeId};
use crate::mount::MountOptions;
use crate::store::Backend;
use std::sync::Arc;
use tracing::{debug, instrument};

impl Filesystem {
    /// Attaches `backend` on the directory at `mountpoint`, hiding its
    /// contents until the mount is detached again.
    #[instrument(level = "trace", skip_all, fields(%mountpoint, store = backend.name()), ret)]
    pub fn mount(
        &mut self,
        backend: impl Backend + 'static,
        options: MountOptions,
        mountpoint: &str,
    ) -> Result<MountId> {
        self.mount_shared(Arc::new(backend), options, mountpoint)
    }

    /// Like [`mount`](Self::mount) for a store shared with other mounts.
    pub fn mount_shared(
        &mut self,
        backend: Arc<dyn Backend>,
        options: MountOptions,
        mountpoint: &str,
    ) -> Result<MountId> {
        let lookup = self.lookup_path(mountpoint, LookupOptions::mountpoint())?;
        let node = self.node_ref(lookup.node)?;
        if node.mounted.is_some() || node.is_root() {
            return Err(Errno::Busy);
        }
        if !node.is_dir() {
            return Err(Errno::Notdir);
        }
        let parent_mount = node.mount;
        let store = backend.name();
        let id = self.attach_mount(
            backend,
            options,
            lookup.path.clone(),
            Some(lookup.node),
            Some(parent_mount),
        )?;
        self.node_mut(lookup.node)?.mounted = Some(id);
        self.mounts.get_mut(parent_mount)?.children.push(id);
        debug!(%id, mountpoint = %lookup.path, store, "mounted");
        Ok(id)
    }

    /// Detaches the mount at `mountpoint` together with every mount nested
    /// inside it.
    ///
    /// Fails with `EINVAL` if nothing is mounted there and with `EBUSY` if
    /// any node of the affected mounts still has an open stream.
    #[instrument(level = "trace", skip_all, fields(%mountpoint), ret)]
    pub fn unmount(&mut self, mountpoint: &str) -> Result<()> {
        let lookup = self.lookup_path(mountpoint, LookupOptions::mountpoint())?;
        let covered = lookup.node;
        let mount = self.node_ref(covered)?.mounted.ok_or(Errno::Inval)?;

        let doomed_mounts = self.mounts.subtree(mount);
        let doomed_nodes: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| doomed_mounts.contains(&node.mount))
            .map(|node| node.id)
            .collect();
        let busy = doomed_nodes
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .any(|node| node.open_streams > 0);
        if busy {
            return Err(Errno::Busy);
        }

        for id in &doomed_nodes {
            if let Some(node) = self.nodes.remove(id) {
                if !node.is_root() {
                    self.names.remove(node.parent, &node.name, node.id);
                }
            }
        }
        let parent = self.mounts.get(mount)?.parent;
        for id in &doomed_mounts {
            self.mounts.remove(*id);
        }
        self.node_mut(covered)?.mounted = None;
        if let Some(parent) = parent {
            self.mounts.get_mut(parent)?.children.retain(|child| *child != mount);
        }
        debug!(%mount, mountpoint = %lookup.path, nodes = doomed_nodes.len(), "unmounted");
        Ok(())
    }
}
