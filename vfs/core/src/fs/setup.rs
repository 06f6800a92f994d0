//! Building a ready-to-use filesystem: default directories, devices and
//! the three standard streams.

use super::Filesystem;
use crate::config::FsConfig;
use crate::device::{
    CallbackDevice, DeviceOps, InputCallback, NullDevice, OutputCallback, RandomDevice,
    StdTerminal, Tty, TtyHost,
};
use crate::errno::{Errno, Result};
use crate::flags::OpenFlags;
use crate::ids::{Dev, Fd};
use crate::mode::Mode;
use crate::path;
use std::io;
use tracing::{debug, warn};

pub const DEV_NULL: Dev = Dev::new(1, 3);
pub const DEV_TTY: Dev = Dev::new(5, 0);
pub const DEV_TTY1: Dev = Dev::new(6, 0);

/// Builder for a [`Filesystem`] with the standard layout.
///
/// Standard streams without a callback are symlinks to the terminals:
/// stdin and stdout to `/dev/tty`, stderr to `/dev/tty1`.
pub struct FilesystemBuilder {
    config: FsConfig,
    stdin: Option<InputCallback>,
    stdout: Option<OutputCallback>,
    stderr: Option<OutputCallback>,
    terminal: Option<Box<dyn TtyHost>>,
    error_terminal: Option<Box<dyn TtyHost>>,
}

impl Default for FilesystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FilesystemBuilder {
    pub fn new() -> Self {
        Self {
            config: FsConfig::default(),
            stdin: None,
            stdout: None,
            stderr: None,
            terminal: None,
            error_terminal: None,
        }
    }

    pub fn with_config(mut self, config: FsConfig) -> Self {
        self.config = config;
        self
    }

    /// Byte source for `/dev/stdin`: `Ok(None)` is end of input.
    pub fn with_stdin(mut self, input: impl FnMut() -> io::Result<Option<u8>> + 'static) -> Self {
        self.stdin = Some(Box::new(input));
        self
    }

    pub fn with_stdout(mut self, output: impl FnMut(u8) -> io::Result<()> + 'static) -> Self {
        self.stdout = Some(Box::new(output));
        self
    }

    pub fn with_stderr(mut self, output: impl FnMut(u8) -> io::Result<()> + 'static) -> Self {
        self.stderr = Some(Box::new(output));
        self
    }

    /// Host behind `/dev/tty`. Defaults to the process's stdin and stdout.
    pub fn with_terminal(mut self, host: impl TtyHost + 'static) -> Self {
        self.terminal = Some(Box::new(host));
        self
    }

    /// Host behind `/dev/tty1`. Defaults to the process's stdin and stderr.
    pub fn with_error_terminal(mut self, host: impl TtyHost + 'static) -> Self {
        self.error_terminal = Some(Box::new(host));
        self
    }

    pub fn build(self) -> Result<Filesystem> {
        let mut fs = Filesystem::bare(self.config)?;
        fs.create_default_directories()?;

        let terminal = self
            .terminal
            .unwrap_or_else(|| Box::new(StdTerminal::stdout()) as Box<dyn TtyHost>);
        let error_terminal = self
            .error_terminal
            .unwrap_or_else(|| Box::new(StdTerminal::stderr()) as Box<dyn TtyHost>);
        fs.create_default_devices(terminal, error_terminal)?;
        fs.create_standard_streams(self.stdin, self.stdout, self.stderr)?;
        debug!(nodes = fs.node_count(), "filesystem ready");
        Ok(fs)
    }
}

impl Filesystem {
    fn create_default_directories(&mut self) -> Result<()> {
        self.mkdir("/tmp", 0o777)?;
        self.mkdir("/home", 0o777)?;
        self.mkdir("/home/web_user", 0o777)?;
        Ok(())
    }

    fn create_default_devices(
        &mut self,
        terminal: Box<dyn TtyHost>,
        error_terminal: Box<dyn TtyHost>,
    ) -> Result<()> {
        self.mkdir("/dev", 0o777)?;

        self.register_device(DEV_NULL, Box::new(NullDevice));
        self.mkdev("/dev/null", 0o666, DEV_NULL)?;

        self.register_device(DEV_TTY, Box::new(Tty::from_boxed(terminal)));
        self.mkdev("/dev/tty", 0o666, DEV_TTY)?;
        self.register_device(DEV_TTY1, Box::new(Tty::from_boxed(error_terminal)));
        self.mkdev("/dev/tty1", 0o666, DEV_TTY1)?;

        self.create_device("/dev", "random", Box::new(RandomDevice), true, false)?;
        self.create_device("/dev", "urandom", Box::new(RandomDevice), true, false)?;

        self.mkdir("/dev/shm", 0o777)?;
        self.mkdir("/dev/shm/tmp", 0o777)?;
        Ok(())
    }

    fn create_standard_streams(
        &mut self,
        stdin: Option<InputCallback>,
        stdout: Option<OutputCallback>,
        stderr: Option<OutputCallback>,
    ) -> Result<()> {
        match stdin {
            Some(input) => {
                self.create_callback_device("/dev", "stdin", Some(input), None)?;
            }
            None => {
                self.symlink("/dev/tty", "/dev/stdin")?;
            }
        }
        match stdout {
            Some(output) => {
                self.create_callback_device("/dev", "stdout", None, Some(output))?;
            }
            None => {
                self.symlink("/dev/tty", "/dev/stdout")?;
            }
        }
        match stderr {
            Some(output) => {
                self.create_callback_device("/dev", "stderr", None, Some(output))?;
            }
            None => {
                self.symlink("/dev/tty1", "/dev/stderr")?;
            }
        }

        let expected: [(&str, OpenFlags, Fd); 3] = [
            ("/dev/stdin", OpenFlags::empty(), 0),
            ("/dev/stdout", OpenFlags::WRONLY, 1),
            ("/dev/stderr", OpenFlags::WRONLY, 2),
        ];
        for (path, flags, want) in expected {
            let fd = self.open(path, flags, 0)?;
            if fd != want {
                warn!(path, fd, want, "standard stream landed on the wrong descriptor");
                return Err(Errno::Badf);
            }
        }
        Ok(())
    }

    /// Creates `parent/name` as a device driven by `ops`, under a freshly
    /// allocated device number.
    pub fn create_device(
        &mut self,
        parent: &str,
        name: &str,
        ops: Box<dyn DeviceOps>,
        readable: bool,
        writable: bool,
    ) -> Result<Dev> {
        let path = path::join2(parent, name);
        let dev = self.devices.allocate();
        self.devices.register(dev, ops);
        if let Err(err) = self.mkdev(&path, Mode::for_access(readable, writable), dev) {
            self.devices.unregister(dev);
            return Err(err);
        }
        Ok(dev)
    }

    /// Creates a device whose reads and writes go through byte callbacks.
    pub fn create_callback_device(
        &mut self,
        parent: &str,
        name: &str,
        input: Option<InputCallback>,
        output: Option<OutputCallback>,
    ) -> Result<Dev> {
        let (readable, writable) = (input.is_some(), output.is_some());
        let device = CallbackDevice::new(input, output);
        self.create_device(parent, name, Box::new(device), readable, writable)
    }
}
