//! Line-buffered terminal devices.

use super::{DeviceOps, IoctlReply, IoctlRequest};
use crate::errno::{Errno, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::warn;

/// Terminal attributes exchanged by `TCGETS` and `TCSETS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Termios {
    pub c_iflag: u32,
    pub c_oflag: u32,
    pub c_cflag: u32,
    pub c_lflag: u32,
    pub c_cc: [u8; 32],
}

impl Default for Termios {
    fn default() -> Self {
        Self {
            c_iflag: 0x6500,
            c_oflag: 0x5,
            c_cflag: 0xbf,
            c_lflag: 0x8a3b,
            c_cc: [
                0x03, 0x1c, 0x7f, 0x15, 0x04, 0x00, 0x01, 0x00, 0x11, 0x13, 0x1a, 0x00, 0x12, 0x0f,
                0x17, 0x16, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00,
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WinSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for WinSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// The host side of a terminal.
pub trait TtyHost {
    /// Next input byte. `Ok(None)` is end of input and a `WouldBlock`
    /// error means nothing is available yet.
    fn get_char(&mut self) -> io::Result<Option<u8>>;

    /// Receives one completed output line, without its newline.
    fn put_line(&mut self, line: &[u8]) -> io::Result<()>;
}

/// A terminal device: output is buffered until a newline or an explicit
/// flush, input is pulled from the host one byte at a time.
pub struct Tty {
    host: Box<dyn TtyHost>,
    output: Vec<u8>,
    termios: Termios,
    winsize: WinSize,
    pgrp: i32,
}

impl Tty {
    pub fn new(host: impl TtyHost + 'static) -> Self {
        Self::from_boxed(Box::new(host))
    }

    pub fn from_boxed(host: Box<dyn TtyHost>) -> Self {
        Self {
            host,
            output: Vec::new(),
            termios: Termios::default(),
            winsize: WinSize::default(),
            pgrp: 0,
        }
    }

    /// Bytes written since the last completed line.
    pub fn pending_output(&self) -> &[u8] {
        &self.output
    }

    fn put_char(&mut self, byte: u8) -> Result<()> {
        match byte {
            0 => Ok(()),
            b'\n' => self.flush_line(),
            byte => {
                self.output.push(byte);
                Ok(())
            }
        }
    }

    fn flush_line(&mut self) -> Result<()> {
        let line = std::mem::take(&mut self.output);
        self.host.put_line(&line).map_err(|err| {
            warn!(error = %err, "terminal output failed");
            Errno::Io
        })
    }
}

impl fmt::Debug for Tty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tty")
            .field("pending", &self.output.len())
            .field("winsize", &self.winsize)
            .finish_non_exhaustive()
    }
}

impl DeviceOps for Tty {
    fn is_seekable(&self) -> bool {
        false
    }

    fn is_tty(&self) -> bool {
        true
    }

    fn read(&mut self, buf: &mut [u8], _position: u64) -> Result<usize> {
        let mut count = 0;
        while count < buf.len() {
            match self.host.get_char() {
                Ok(Some(byte)) => {
                    buf[count] = byte;
                    count += 1;
                }
                Ok(None) => break,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if count == 0 {
                        return Err(Errno::Again);
                    }
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "terminal input failed");
                    return Err(Errno::Io);
                }
            }
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8], _position: u64) -> Result<usize> {
        for &byte in buf {
            self.put_char(byte)?;
        }
        Ok(buf.len())
    }

    fn close(&mut self) -> Result<()> {
        self.fsync()
    }

    fn fsync(&mut self) -> Result<()> {
        if self.output.is_empty() {
            return Ok(());
        }
        self.flush_line()
    }

    fn ioctl(&mut self, request: IoctlRequest) -> Result<IoctlReply> {
        match request {
            IoctlRequest::GetAttributes => Ok(IoctlReply::Attributes(self.termios)),
            IoctlRequest::SetAttributes(termios) => {
                self.termios = termios;
                Ok(IoctlReply::Done)
            }
            IoctlRequest::GetWindowSize => Ok(IoctlReply::WindowSize(self.winsize)),
            IoctlRequest::SetWindowSize(winsize) => {
                self.winsize = winsize;
                Ok(IoctlReply::Done)
            }
            IoctlRequest::GetProcessGroup => Ok(IoctlReply::ProcessGroup(self.pgrp)),
            IoctlRequest::SetProcessGroup(pgrp) => {
                self.pgrp = pgrp;
                Ok(IoctlReply::Done)
            }
            IoctlRequest::Other(_) => Err(Errno::Inval),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StdSink {
    Stdout,
    Stderr,
}

/// Terminal host wired to the process's own stdin and stdout or stderr.
#[derive(Debug)]
pub struct StdTerminal {
    sink: StdSink,
    pending: VecDeque<u8>,
    eof: bool,
}

impl StdTerminal {
    pub fn stdout() -> Self {
        Self {
            sink: StdSink::Stdout,
            pending: VecDeque::new(),
            eof: false,
        }
    }

    pub fn stderr() -> Self {
        Self {
            sink: StdSink::Stderr,
            ..Self::stdout()
        }
    }
}

impl TtyHost for StdTerminal {
    fn get_char(&mut self) -> io::Result<Option<u8>> {
        if self.pending.is_empty() && !self.eof {
            let mut line = Vec::new();
            if io::stdin().lock().read_until(b'\n', &mut line)? == 0 {
                self.eof = true;
            }
            self.pending.extend(line);
        }
        Ok(self.pending.pop_front())
    }

    fn put_line(&mut self, line: &[u8]) -> io::Result<()> {
        match self.sink {
            StdSink::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(line)?;
                out.write_all(b"\n")
            }
            StdSink::Stderr => {
                let mut out = io::stderr().lock();
                out.write_all(line)?;
                out.write_all(b"\n")
            }
        }
    }
}

/// Shared state behind a [`MemoryTerminal`].
#[derive(Debug, Default)]
pub struct TerminalBuffer {
    pub input: VecDeque<u8>,
    pub lines: Vec<Vec<u8>>,
    /// Report `WouldBlock` instead of end of input once `input` runs dry.
    pub blocking: bool,
}

/// A terminal host backed by memory, for embedding and tests. Clones share
/// the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryTerminal {
    buffer: Arc<Mutex<TerminalBuffer>>,
}

impl MemoryTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_input(&self, bytes: &[u8]) {
        self.buffer.lock().input.extend(bytes.iter().copied());
    }

    pub fn set_blocking(&self, blocking: bool) {
        self.buffer.lock().blocking = blocking;
    }

    /// Completed output lines, drained.
    pub fn take_lines(&self) -> Vec<String> {
        self.buffer
            .lock()
            .lines
            .drain(..)
            .map(|line| String::from_utf8_lossy(&line).into_owned())
            .collect()
    }
}

impl TtyHost for MemoryTerminal {
    fn get_char(&mut self) -> io::Result<Option<u8>> {
        let mut buffer = self.buffer.lock();
        match buffer.input.pop_front() {
            Some(byte) => Ok(Some(byte)),
            None if buffer.blocking => Err(io::ErrorKind::WouldBlock.into()),
            None => Ok(None),
        }
    }

    fn put_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.buffer.lock().lines.push(line.to_vec());
        Ok(())
    }
}
