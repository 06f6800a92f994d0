//! The in-memory store: a growable byte buffer per regular file.

use super::Backend;
use crate::errno::{Errno, Result};
use crate::node::FileOps;

/// Below this capacity a full buffer doubles; above it grows by an eighth.
const CAPACITY_DOUBLING_MAX: usize = 1024 * 1024;
/// Smallest capacity a non-empty buffer is grown to.
const MIN_GROWN_CAPACITY: usize = 256;

/// Contents of a regular file.
///
/// `contents.len()` is the reserved capacity and `used` the logical size.
/// Bytes in `used..capacity` are slack and never observable.
#[derive(Debug, Default, Clone)]
pub struct MemFile {
    contents: Vec<u8>,
    used: usize,
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Errno::Fbig)
}

impl MemFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `data` without copying it.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let used = data.len();
        Self {
            contents: data,
            used,
        }
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn capacity(&self) -> usize {
        self.contents.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.contents[..self.used]
    }

    /// Grows the reserved capacity to at least `wanted`, amortized.
    fn expand(&mut self, wanted: usize) -> Result<()> {
        let previous = self.contents.len();
        if previous >= wanted {
            return Ok(());
        }
        let grown = if previous < CAPACITY_DOUBLING_MAX {
            previous.saturating_mul(2)
        } else {
            previous.saturating_add(previous / 8)
        };
        let mut capacity = wanted.max(grown);
        if previous != 0 {
            capacity = capacity.max(MIN_GROWN_CAPACITY);
        }
        self.contents
            .try_reserve_exact(capacity - previous)
            .map_err(|_| Errno::Nomem)?;
        self.contents.resize(capacity, 0);
        Ok(())
    }

    /// Sets the logical size exactly, releasing slack. Growth zero-fills.
    pub fn resize(&mut self, new_size: usize) -> Result<()> {
        if new_size == self.used {
            return Ok(());
        }
        if new_size == 0 {
            self.contents = Vec::new();
            self.used = 0;
            return Ok(());
        }
        if new_size > self.used {
            let end = new_size.min(self.contents.len());
            self.contents[self.used..end].fill(0);
            self.contents
                .try_reserve_exact(new_size.saturating_sub(self.contents.len()))
                .map_err(|_| Errno::Nomem)?;
        }
        self.contents.resize(new_size, 0);
        self.contents.shrink_to_fit();
        self.used = new_size;
        Ok(())
    }

    /// Replaces the contents with `data`, taking ownership.
    pub fn replace(&mut self, data: Vec<u8>) {
        *self = Self::from_vec(data);
    }
}

impl FileOps for MemFile {
    fn size(&self) -> u64 {
        self.used as u64
    }

    fn read_at(&mut self, position: u64, buf: &mut [u8]) -> Result<usize> {
        let Ok(position) = usize::try_from(position) else {
            return Ok(0);
        };
        if position >= self.used {
            return Ok(0);
        }
        let count = buf.len().min(self.used - position);
        buf[..count].copy_from_slice(&self.contents[position..position + count]);
        Ok(count)
    }

    fn write_at(&mut self, position: u64, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let position = to_usize(position)?;
        let end = position.checked_add(buf.len()).ok_or(Errno::Fbig)?;

        // A write at offset zero into an empty file adopts the caller's bytes.
        if self.used == 0 && position == 0 {
            self.contents = buf.to_vec();
            self.used = buf.len();
            return Ok(buf.len());
        }
        if end <= self.used {
            self.contents[position..end].copy_from_slice(buf);
            return Ok(buf.len());
        }

        self.expand(end)?;
        if position > self.used {
            self.contents[self.used..position].fill(0);
        }
        self.contents[position..end].copy_from_slice(buf);
        self.used = self.used.max(end);
        Ok(buf.len())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.resize(to_usize(len)?)
    }

    fn allocate(&mut self, offset: u64, len: u64) -> Result<()> {
        let end = to_usize(offset.checked_add(len).ok_or(Errno::Fbig)?)?;
        self.expand(end)?;
        if end > self.used {
            self.contents[self.used..end].fill(0);
            self.used = end;
        }
        Ok(())
    }

    fn snapshot(&mut self, position: u64, len: usize) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| Errno::Nomem)?;
        data.resize(len, 0);
        self.read_at(position, &mut data)?;
        Ok(data)
    }
}

/// The default store: nodes live entirely in memory and nothing exists
/// until it is created.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemFs;

impl Backend for MemFs {
    fn name(&self) -> &'static str {
        "memfs"
    }
}
