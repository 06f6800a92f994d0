//! Character device drivers and the registry that maps device numbers to
//! them.

mod tty;

pub use tty::{MemoryTerminal, StdTerminal, Termios, TerminalBuffer, Tty, TtyHost, WinSize};

use crate::errno::{Errno, Result};
use crate::flags::Whence;
use crate::ids::Dev;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// First major number handed out to devices registered at runtime.
pub const DYNAMIC_MAJOR_BASE: u32 = 64;

/// Requests understood by `ioctl`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoctlRequest {
    /// `TCGETS`
    GetAttributes,
    /// `TCSETS`, `TCSETSW` and `TCSETSF`
    SetAttributes(Termios),
    /// `TIOCGWINSZ`
    GetWindowSize,
    /// `TIOCSWINSZ`
    SetWindowSize(WinSize),
    /// `TIOCGPGRP`
    GetProcessGroup,
    /// `TIOCSPGRP`
    SetProcessGroup(i32),
    /// Anything else, by raw request number.
    Other(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoctlReply {
    Done,
    Attributes(Termios),
    WindowSize(WinSize),
    ProcessGroup(i32),
}

/// Operations a character device driver provides to the streams opened on
/// it. Positions are the stream's current position; unseekable drivers
/// simply ignore them.
pub trait DeviceOps {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn is_tty(&self) -> bool {
        false
    }

    fn read(&mut self, buf: &mut [u8], position: u64) -> Result<usize>;

    fn write(&mut self, buf: &[u8], position: u64) -> Result<usize>;

    fn llseek(&mut self, _offset: i64, _whence: Whence, _position: u64) -> Result<u64> {
        Err(Errno::Spipe)
    }

    fn fsync(&mut self) -> Result<()> {
        Ok(())
    }

    fn ioctl(&mut self, _request: IoctlRequest) -> Result<IoctlReply> {
        Err(Errno::Notty)
    }
}

/// `/dev/null`: reads hit end of file, writes are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDevice;

impl DeviceOps for NullDevice {
    fn read(&mut self, _buf: &mut [u8], _position: u64) -> Result<usize> {
        Ok(0)
    }

    fn write(&mut self, buf: &[u8], _position: u64) -> Result<usize> {
        Ok(buf.len())
    }

    fn llseek(&mut self, _offset: i64, _whence: Whence, _position: u64) -> Result<u64> {
        Ok(0)
    }
}

/// `/dev/random` and `/dev/urandom`, backed by the host's entropy source.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDevice;

impl DeviceOps for RandomDevice {
    fn is_seekable(&self) -> bool {
        false
    }

    fn read(&mut self, buf: &mut [u8], _position: u64) -> Result<usize> {
        getrandom::getrandom(buf).map_err(|err| {
            warn!(error = %err, "entropy source failed");
            Errno::Io
        })?;
        Ok(buf.len())
    }

    fn write(&mut self, buf: &[u8], _position: u64) -> Result<usize> {
        Ok(buf.len())
    }
}

pub type InputCallback = Box<dyn FnMut() -> std::io::Result<Option<u8>>>;
pub type OutputCallback = Box<dyn FnMut(u8) -> std::io::Result<()>>;

/// A device driven by byte-at-a-time host callbacks.
///
/// The input callback returns `Ok(None)` at end of input and a
/// `WouldBlock` error when no byte is ready yet.
pub struct CallbackDevice {
    input: Option<InputCallback>,
    output: Option<OutputCallback>,
}

impl CallbackDevice {
    pub fn new(input: Option<InputCallback>, output: Option<OutputCallback>) -> Self {
        Self { input, output }
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }
}

impl fmt::Debug for CallbackDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackDevice")
            .field("input", &self.has_input())
            .field("output", &self.has_output())
            .finish()
    }
}

impl DeviceOps for CallbackDevice {
    fn is_seekable(&self) -> bool {
        false
    }

    fn read(&mut self, buf: &mut [u8], _position: u64) -> Result<usize> {
        let input = self.input.as_mut().ok_or(Errno::Io)?;
        let mut count = 0;
        while count < buf.len() {
            match input() {
                Ok(Some(byte)) => {
                    buf[count] = byte;
                    count += 1;
                }
                Ok(None) => break,
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    if count == 0 {
                        return Err(Errno::Again);
                    }
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "device input callback failed");
                    return Err(Errno::Io);
                }
            }
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8], _position: u64) -> Result<usize> {
        let output = self.output.as_mut().ok_or(Errno::Io)?;
        for &byte in buf {
            output(byte).map_err(|err| {
                warn!(error = %err, "device output callback failed");
                Errno::Io
            })?;
        }
        Ok(buf.len())
    }
}

/// Device number to driver.
#[derive(Default)]
pub struct DeviceRegistry {
    drivers: HashMap<Dev, Box<dyn DeviceOps>>,
    next_major: u32,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
            next_major: DYNAMIC_MAJOR_BASE,
        }
    }

    /// Installs `ops` for `dev`, replacing any previous driver.
    pub fn register(&mut self, dev: Dev, ops: Box<dyn DeviceOps>) {
        debug!(%dev, "registering device");
        self.drivers.insert(dev, ops);
    }

    /// Picks an unused major number for a runtime-created device.
    pub fn allocate(&mut self) -> Dev {
        self.next_major = self.next_major.max(DYNAMIC_MAJOR_BASE);
        while self.drivers.contains_key(&Dev::new(self.next_major, 0)) {
            self.next_major += 1;
        }
        let dev = Dev::new(self.next_major, 0);
        self.next_major += 1;
        dev
    }

    pub fn get_mut(&mut self, dev: Dev) -> Result<&mut dyn DeviceOps> {
        match self.drivers.get_mut(&dev) {
            Some(ops) => Ok(ops.as_mut()),
            None => Err(Errno::Nodev),
        }
    }

    pub fn unregister(&mut self, dev: Dev) -> Option<Box<dyn DeviceOps>> {
        self.drivers.remove(&dev)
    }

    pub fn contains(&self, dev: Dev) -> bool {
        self.drivers.contains_key(&dev)
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut devs: Vec<_> = self.drivers.keys().copied().collect();
        devs.sort();
        f.debug_struct("DeviceRegistry").field("devices", &devs).finish()
    }
}
