//! Path resolution.
//!
//! A path is first joined to the working directory and normalized, so `.`
//! and `..` never reach the walker. The walker then follows components
//! through the name index (asking the mount's store on a miss), crosses
//! mount points and expands symlinks.

use super::Filesystem;
use crate::errno::{Errno, Result};
use crate::ids::{Dev, NodeId};
use crate::node::NodeContent;
use crate::path;
use smallvec::SmallVec;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupOptions {
    /// Expand a symlink in the final component.
    pub follow: bool,
    /// Stop at the parent of the final component.
    pub parent: bool,
    /// Enter a mount attached at the final component.
    pub follow_mount: bool,
    pub(crate) depth: u32,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            follow: false,
            parent: false,
            follow_mount: true,
            depth: 0,
        }
    }
}

impl LookupOptions {
    pub fn follow() -> Self {
        Self {
            follow: true,
            ..Self::default()
        }
    }

    pub fn parent() -> Self {
        Self {
            parent: true,
            ..Self::default()
        }
    }

    /// Stop on the covered directory instead of the mounted root.
    pub fn mountpoint() -> Self {
        Self {
            follow_mount: false,
            ..Self::default()
        }
    }
}

/// Outcome of resolving a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lookup {
    /// The normalized path of `node`; after a followed symlink this is the
    /// link's target path.
    pub path: String,
    pub node: NodeId,
}

impl Filesystem {
    pub fn lookup_path(&mut self, path: &str, options: LookupOptions) -> Result<Lookup> {
        if path.is_empty() {
            return Err(Errno::Noent);
        }
        if options.depth > self.config.max_resolve_depth {
            return Err(Errno::Loop);
        }
        let resolved = path::resolve(&self.cwd, &[path]);
        trace!(path = %resolved, depth = options.depth, "resolving");

        let parts: SmallVec<[&str; 16]> = resolved.split('/').filter(|p| !p.is_empty()).collect();
        let mut current = self.root;
        let mut current_path = String::from("/");

        for (index, part) in parts.iter().enumerate() {
            let is_last = index + 1 == parts.len();
            if is_last && options.parent {
                break;
            }
            if part.len() > self.config.max_name_len {
                return Err(Errno::Nametoolong);
            }

            current = self.lookup_node(current, part)?;
            current_path = path::join2(&current_path, part);

            if !is_last || options.follow_mount {
                while let Some(mount) = self.node_ref(current)?.mounted {
                    current = self.mounts.get(mount)?.root;
                }
            }

            if !is_last || options.follow {
                let mut hops = 0;
                while self.node_ref(current)?.is_symlink() {
                    let target = self.read_link_node(current)?;
                    let link_dir = path::dirname(&current_path).to_string();
                    let target_path =
                        path::resolve(&self.cwd, &[link_dir.as_str(), target.as_str()]);
                    let next = self.lookup_path(
                        &target_path,
                        LookupOptions {
                            depth: options.depth + 1,
                            ..LookupOptions::default()
                        },
                    )?;
                    current = next.node;
                    current_path = next.path;
                    hops += 1;
                    if hops > self.config.max_symlink_hops {
                        return Err(Errno::Loop);
                    }
                }
            }
        }

        Ok(Lookup {
            path: current_path,
            node: current,
        })
    }

    /// Finds `name` directly under `parent`, materializing it from the
    /// mount's store if the namespace has not seen it yet.
    pub fn lookup_node(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.may_lookup(parent)?;
        if let Some(child) = self.names.lookup(parent, name) {
            return Ok(child);
        }
        let mount = self.node_ref(parent)?.mount;
        let backend = self.mounts.get(mount)?.backend.clone();
        let dir = self.mount_relative_path(parent)?;
        let seed = backend.lookup(&dir, name)?;
        trace!(%parent, name, store = backend.name(), "materialized node from store");
        self.attach_node(parent, name, seed.mode, Dev::NONE, seed.content)
    }

    pub(crate) fn read_link_node(&self, id: NodeId) -> Result<String> {
        match &self.node_ref(id)?.content {
            NodeContent::Symlink(target) => Ok(target.clone()),
            _ => Err(Errno::Inval),
        }
    }
}
