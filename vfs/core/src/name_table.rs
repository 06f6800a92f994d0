//! Index from `(parent, name)` to the child node.
//!
//! Directory contents stay authoritative; this index only makes component
//! lookup cheap and must be updated on every link and unlink.

use crate::ids::NodeId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

#[derive(Debug, Default)]
pub(crate) struct NameTable {
    by_parent: HashMap<NodeId, HashMap<Box<str>, NodeId>>,
    len: usize,
}

impl NameTable {
    pub(crate) fn insert(&mut self, parent: NodeId, name: &str, child: NodeId) {
        let previous = self
            .by_parent
            .entry(parent)
            .or_default()
            .insert(name.into(), child);
        if previous.is_none() {
            self.len += 1;
        }
    }

    /// Removes the entry only while it still points at `child`.
    pub(crate) fn remove(&mut self, parent: NodeId, name: &str, child: NodeId) -> bool {
        let Entry::Occupied(mut slot) = self.by_parent.entry(parent) else {
            return false;
        };
        if slot.get().get(name) != Some(&child) {
            return false;
        }
        slot.get_mut().remove(name);
        if slot.get().is_empty() {
            slot.remove();
        }
        self.len -= 1;
        true
    }

    pub(crate) fn lookup(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.by_parent.get(&parent)?.get(name).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lookup_remove() {
        let mut table = NameTable::default();
        let root = NodeId::new(1);
        table.insert(root, "tmp", NodeId::new(2));
        table.insert(root, "home", NodeId::new(3));
        assert_eq!(table.lookup(root, "tmp"), Some(NodeId::new(2)));
        assert_eq!(table.lookup(NodeId::new(2), "tmp"), None);
        assert_eq!(table.len(), 2);

        assert!(!table.remove(root, "tmp", NodeId::new(3)), "wrong child is kept");
        assert!(table.remove(root, "tmp", NodeId::new(2)));
        assert_eq!(table.lookup(root, "tmp"), None);
        assert_eq!(table.len(), 1);
    }
}
