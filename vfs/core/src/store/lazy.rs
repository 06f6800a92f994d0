//! Files whose bytes are fetched from somewhere else on first access.

use super::MemFile;
use crate::errno::{Errno, Result};
use crate::node::FileOps;
use std::fmt;
use std::io;
use tracing::{debug, warn};

/// Supplies the contents of a lazily loaded file.
pub trait ContentSource {
    /// Size reported before the contents have been fetched.
    fn size_hint(&self) -> Option<u64> {
        None
    }

    fn fetch(&mut self) -> io::Result<Vec<u8>>;
}

impl<F> ContentSource for F
where
    F: FnMut() -> io::Result<Vec<u8>>,
{
    fn fetch(&mut self) -> io::Result<Vec<u8>> {
        self()
    }
}

/// A regular file that materializes into a [`MemFile`] the first time its
/// bytes are needed. A failed fetch leaves it unmaterialized so a later
/// access retries.
pub struct LazyFile {
    source: Option<Box<dyn ContentSource>>,
    file: Option<MemFile>,
}

impl LazyFile {
    pub fn new(source: impl ContentSource + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            file: None,
        }
    }

    pub fn is_materialized(&self) -> bool {
        self.file.is_some()
    }

    fn materialize(&mut self) -> Result<&mut MemFile> {
        if self.file.is_none() {
            let source = self.source.as_mut().ok_or(Errno::Io)?;
            let data = source.fetch().map_err(|err| {
                warn!(error = %err, "lazy file fetch failed");
                Errno::Io
            })?;
            debug!(len = data.len(), "lazy file materialized");
            self.file = Some(MemFile::from_vec(data));
            self.source = None;
        }
        self.file.as_mut().ok_or(Errno::Io)
    }
}

impl fmt::Debug for LazyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFile")
            .field("materialized", &self.is_materialized())
            .field("size", &self.size())
            .finish()
    }
}

impl FileOps for LazyFile {
    fn size(&self) -> u64 {
        match (&self.file, &self.source) {
            (Some(file), _) => file.size(),
            (None, Some(source)) => source.size_hint().unwrap_or(0),
            (None, None) => 0,
        }
    }

    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> Result<usize> {
        self.materialize()?.read_at(position, buf)
    }

    fn write_at(&mut self, position: u64, buf: &[u8]) -> Result<usize> {
        self.materialize()?.write_at(position, buf)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        if len == 0 {
            // Nothing of the old contents survives, so skip the fetch.
            self.file = Some(MemFile::new());
            self.source = None;
            return Ok(());
        }
        self.materialize()?.set_len(len)
    }

    fn allocate(&mut self, offset: u64, len: u64) -> Result<()> {
        self.materialize()?.allocate(offset, len)
    }

    fn snapshot(&mut self, position: u64, len: usize) -> Result<Vec<u8>> {
        self.materialize()?.snapshot(position, len)
    }
}
