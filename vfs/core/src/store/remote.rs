//! A read-mostly store whose files come from an external source.
//!
//! Entries appear in the namespace the first time they are looked up;
//! file bytes are fetched on first read through a [`LazyFile`].

use super::{Backend, ContentSource, LazyFile, NodeSeed};
use crate::errno::{Errno, Result};
use crate::mode::{FileType, Mode};
use crate::node::{Directory, NodeContent};
use crate::path;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteEntry {
    Directory,
    File { size: u64 },
}

/// Catalog and byte source behind a [`RemoteFs`]. Paths are absolute
/// within the mount, e.g. `"/assets/a.png"`.
pub trait RemoteSource {
    fn stat(&self, path: &str) -> Option<RemoteEntry>;
    fn list(&self, dir: &str) -> Vec<String>;
    fn fetch(&self, path: &str) -> io::Result<Vec<u8>>;
}

pub struct RemoteFs {
    source: Arc<dyn RemoteSource>,
}

impl RemoteFs {
    pub fn new(source: impl RemoteSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }
}

impl fmt::Debug for RemoteFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFs").finish_non_exhaustive()
    }
}

struct RemoteFetch {
    source: Arc<dyn RemoteSource>,
    path: String,
    size: u64,
}

impl ContentSource for RemoteFetch {
    fn size_hint(&self) -> Option<u64> {
        Some(self.size)
    }

    fn fetch(&mut self) -> io::Result<Vec<u8>> {
        self.source.fetch(&self.path)
    }
}

impl Backend for RemoteFs {
    fn name(&self) -> &'static str {
        "remotefs"
    }

    fn lookup(&self, dir: &str, name: &str) -> Result<NodeSeed> {
        let full = path::join2(dir, name);
        trace!(path = %full, "remote lookup");
        match self.source.stat(&full).ok_or(Errno::Noent)? {
            RemoteEntry::Directory => Ok(NodeSeed {
                mode: Mode::from_parts(FileType::Directory, 0o555),
                content: NodeContent::Directory(Directory::default()),
            }),
            RemoteEntry::File { size } => Ok(NodeSeed {
                mode: Mode::from_parts(FileType::RegularFile, 0o444),
                content: NodeContent::Lazy(LazyFile::new(RemoteFetch {
                    source: self.source.clone(),
                    path: full,
                    size,
                })),
            }),
        }
    }

    fn list(&self, dir: &str) -> Vec<String> {
        self.source.list(dir)
    }
}
