//! Filesystem limits and policy knobs.

/// Configuration for a [`Filesystem`](crate::Filesystem).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsConfig {
    /// Size of the descriptor table. Opening beyond it fails with `EMFILE`.
    pub max_open_fds: usize,
    /// Symlink hops tolerated while resolving a single component.
    pub max_symlink_hops: u32,
    /// Nested resolutions (a symlink target re-entering the resolver)
    /// tolerated before failing with `ELOOP`.
    pub max_resolve_depth: u32,
    /// Longest accepted name for a single directory entry.
    pub max_name_len: usize,
    /// When false every permission check passes, which is what the
    /// single-user runtime this filesystem serves expects.
    pub enforce_permissions: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            max_open_fds: 4096,
            max_symlink_hops: 40,
            max_resolve_depth: 8,
            max_name_len: 255,
            enforce_permissions: false,
        }
    }
}

impl FsConfig {
    pub fn with_max_open_fds(mut self, max_open_fds: usize) -> Self {
        self.max_open_fds = max_open_fds;
        self
    }

    pub fn with_max_symlink_hops(mut self, hops: u32) -> Self {
        self.max_symlink_hops = hops;
        self
    }

    pub fn with_max_resolve_depth(mut self, depth: u32) -> Self {
        self.max_resolve_depth = depth;
        self
    }

    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    pub fn with_permissions_enforced(mut self, enforce: bool) -> Self {
        self.enforce_permissions = enforce;
        self
    }
}
