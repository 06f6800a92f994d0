//! Identifier newtypes shared by the namespace, the mount table and the
//! descriptor table.

use std::fmt;
use std::num::NonZeroU32;

/// A file descriptor: an index into the descriptor table.
pub type Fd = u32;

/// Stable identity of a node for its whole lifetime.
///
/// Ids are handed out from a monotonic counter and never reused, so a
/// stale id held by a caller can only ever miss, never alias a newer node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The inode number reported by `stat`.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a mount table entry.
///
/// This is the slab slot plus one so that `Option<MountId>` stays small.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountId(NonZeroU32);

impl MountId {
    pub(crate) fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(Self)
    }

    pub(crate) fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A device number, split into the driver (`major`) and the unit (`minor`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dev {
    pub major: u32,
    pub minor: u32,
}

impl Dev {
    /// The device number of nodes that are not devices.
    pub const NONE: Dev = Dev { major: 0, minor: 0 };

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Packs the pair the way `makedev` does for `st_rdev`.
    pub const fn raw(self) -> u64 {
        ((self.major as u64) << 8) | self.minor as u64
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self {
            major: (raw >> 8) as u32,
            minor: (raw & 0xff) as u32,
        }
    }
}

impl fmt::Display for Dev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}
