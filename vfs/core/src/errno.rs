//! Error numbers reported by every filesystem operation.
//!
//! The numeric values follow the WASI errno table, which is what the
//! C library linked against this filesystem expects to see negated in
//! syscall return values.

use std::io;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = Errno> = std::result::Result<T, E>;

/// An errno value produced by a failed operation.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Errno {
    /// Permission bits deny the requested access.
    #[error("permission denied")]
    Access = 2,
    /// The operation would block and no data is available yet.
    #[error("resource temporarily unavailable")]
    Again = 6,
    /// The descriptor is not open, or not open in the required mode.
    #[error("bad file descriptor")]
    Badf = 8,
    /// The target is a mount point, the root, or still in use.
    #[error("device or resource busy")]
    Busy = 10,
    /// An entry with this name already exists.
    #[error("file exists")]
    Exist = 20,
    /// The resulting file would be too large to address.
    #[error("file too large")]
    Fbig = 22,
    /// An argument was invalid.
    #[error("invalid argument")]
    Inval = 28,
    /// A host callback or lazy fetch failed.
    #[error("i/o error")]
    Io = 29,
    /// The operation does not apply to a directory.
    #[error("is a directory")]
    Isdir = 31,
    /// Too many levels of symbolic links.
    #[error("too many levels of symbolic links")]
    Loop = 32,
    /// The descriptor table is full.
    #[error("too many open files")]
    Mfile = 33,
    /// A path component is longer than the configured maximum.
    #[error("file name too long")]
    Nametoolong = 37,
    /// No device driver is registered for the node.
    #[error("no such device")]
    Nodev = 43,
    /// No such file or directory.
    #[error("no such file or directory")]
    Noent = 44,
    /// Memory could not be reserved for file contents.
    #[error("out of memory")]
    Nomem = 48,
    /// No space left in the store.
    #[error("no space left on device")]
    Nospc = 51,
    /// The operation is not implemented.
    #[error("function not implemented")]
    Nosys = 52,
    /// A path component is not a directory.
    #[error("not a directory")]
    Notdir = 54,
    /// The directory still has entries.
    #[error("directory not empty")]
    Notempty = 55,
    /// The descriptor does not refer to a terminal.
    #[error("inappropriate ioctl for device")]
    Notty = 59,
    /// No such device or address.
    #[error("no such device or address")]
    Nxio = 60,
    /// A value does not fit the destination type.
    #[error("value too large for defined data type")]
    Overflow = 61,
    /// The store refuses to create this kind of node.
    #[error("operation not permitted")]
    Perm = 63,
    /// The result does not fit the supplied buffer.
    #[error("result out of range")]
    Range = 68,
    /// The mount is read-only.
    #[error("read-only file system")]
    Rofs = 69,
    /// The stream cannot be repositioned.
    #[error("illegal seek")]
    Spipe = 70,
    /// Source and destination live on different mounts.
    #[error("cross-device link")]
    Xdev = 75,
    /// The node type does not support the operation.
    #[error("operation not supported")]
    Notsup = 138,
}

impl Errno {
    /// Every errno, in ascending numeric order.
    pub const ALL: [Errno; 28] = [
        Errno::Access,
        Errno::Again,
        Errno::Badf,
        Errno::Busy,
        Errno::Exist,
        Errno::Fbig,
        Errno::Inval,
        Errno::Io,
        Errno::Isdir,
        Errno::Loop,
        Errno::Mfile,
        Errno::Nametoolong,
        Errno::Nodev,
        Errno::Noent,
        Errno::Nomem,
        Errno::Nospc,
        Errno::Nosys,
        Errno::Notdir,
        Errno::Notempty,
        Errno::Notty,
        Errno::Nxio,
        Errno::Overflow,
        Errno::Perm,
        Errno::Range,
        Errno::Rofs,
        Errno::Spipe,
        Errno::Xdev,
        Errno::Notsup,
    ];

    /// The positive errno number.
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|errno| errno.code() == code)
    }

    /// Stable upper-case symbol, e.g. `"ENOENT"` (logging only).
    pub const fn name(self) -> &'static str {
        match self {
            Errno::Access => "EACCES",
            Errno::Again => "EAGAIN",
            Errno::Badf => "EBADF",
            Errno::Busy => "EBUSY",
            Errno::Exist => "EEXIST",
            Errno::Fbig => "EFBIG",
            Errno::Inval => "EINVAL",
            Errno::Io => "EIO",
            Errno::Isdir => "EISDIR",
            Errno::Loop => "ELOOP",
            Errno::Mfile => "EMFILE",
            Errno::Nametoolong => "ENAMETOOLONG",
            Errno::Nodev => "ENODEV",
            Errno::Noent => "ENOENT",
            Errno::Nomem => "ENOMEM",
            Errno::Nospc => "ENOSPC",
            Errno::Nosys => "ENOSYS",
            Errno::Notdir => "ENOTDIR",
            Errno::Notempty => "ENOTEMPTY",
            Errno::Notty => "ENOTTY",
            Errno::Nxio => "ENXIO",
            Errno::Overflow => "EOVERFLOW",
            Errno::Perm => "EPERM",
            Errno::Range => "ERANGE",
            Errno::Rofs => "EROFS",
            Errno::Spipe => "ESPIPE",
            Errno::Xdev => "EXDEV",
            Errno::Notsup => "ENOTSUP",
        }
    }
}

impl From<io::Error> for Errno {
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::NotFound => Errno::Noent,
            io::ErrorKind::PermissionDenied => Errno::Access,
            io::ErrorKind::AlreadyExists => Errno::Exist,
            io::ErrorKind::WouldBlock => Errno::Again,
            io::ErrorKind::InvalidInput => Errno::Inval,
            io::ErrorKind::OutOfMemory => Errno::Nomem,
            io::ErrorKind::Unsupported => Errno::Notsup,
            io::ErrorKind::NotADirectory => Errno::Notdir,
            io::ErrorKind::IsADirectory => Errno::Isdir,
            io::ErrorKind::DirectoryNotEmpty => Errno::Notempty,
            io::ErrorKind::ReadOnlyFilesystem => Errno::Rofs,
            io::ErrorKind::ResourceBusy => Errno::Busy,
            io::ErrorKind::CrossesDevices => Errno::Xdev,
            io::ErrorKind::NotSeekable => Errno::Spipe,
            io::ErrorKind::FileTooLarge => Errno::Fbig,
            io::ErrorKind::StorageFull => Errno::Nospc,
            io::ErrorKind::InvalidFilename => Errno::Nametoolong,
            _ => Errno::Io,
        }
    }
}

impl From<Errno> for io::Error {
    fn from(errno: Errno) -> Self {
        let kind = match errno {
            Errno::Noent => io::ErrorKind::NotFound,
            Errno::Access | Errno::Perm => io::ErrorKind::PermissionDenied,
            Errno::Exist => io::ErrorKind::AlreadyExists,
            Errno::Again => io::ErrorKind::WouldBlock,
            Errno::Inval => io::ErrorKind::InvalidInput,
            Errno::Nomem => io::ErrorKind::OutOfMemory,
            Errno::Notsup | Errno::Nosys => io::ErrorKind::Unsupported,
            Errno::Notdir => io::ErrorKind::NotADirectory,
            Errno::Isdir => io::ErrorKind::IsADirectory,
            Errno::Notempty => io::ErrorKind::DirectoryNotEmpty,
            Errno::Rofs => io::ErrorKind::ReadOnlyFilesystem,
            Errno::Busy => io::ErrorKind::ResourceBusy,
            Errno::Xdev => io::ErrorKind::CrossesDevices,
            Errno::Spipe => io::ErrorKind::NotSeekable,
            Errno::Fbig => io::ErrorKind::FileTooLarge,
            Errno::Nospc => io::ErrorKind::StorageFull,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, errno)
    }
}
