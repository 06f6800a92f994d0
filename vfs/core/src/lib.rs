//! `memvfs-core` is an in-memory, POSIX-style virtual filesystem.
//!
//! It keeps a single hierarchical namespace of nodes (directories, regular
//! files, symlinks and character devices), attaches pluggable stores at
//! mount points and exposes syscall-level operations that fail with
//! [`Errno`] values:
//!
//! ```
//! use memvfs_core::{Filesystem, FsConfig, OpenFlags};
//!
//! let mut fs = Filesystem::bare(FsConfig::default()).unwrap();
//! fs.mkdir("/data", 0o755).unwrap();
//! fs.write_file("/data/hello.txt", b"hello").unwrap();
//!
//! let fd = fs.open("/data/hello.txt", OpenFlags::empty(), 0).unwrap();
//! let mut buf = [0u8; 5];
//! assert_eq!(fs.read(fd, &mut buf), Ok(5));
//! assert_eq!(&buf, b"hello");
//! fs.close(fd).unwrap();
//! ```

pub mod config;
pub mod device;
pub mod errno;
pub mod flags;
mod fs;
pub mod ids;
pub mod mode;
pub mod mount;
mod name_table;
pub mod node;
pub mod path;
pub mod store;
pub mod stream;

pub use config::FsConfig;
pub use device::{
    DeviceOps, DeviceRegistry, IoctlReply, IoctlRequest, MemoryTerminal, Termios, TtyHost, WinSize,
};
pub use errno::{Errno, Result};
pub use flags::{AccessMode, MmapFlags, MmapProt, OpenFlags, Permissions, Whence};
pub use fs::{
    DEV_NULL, DEV_TTY, DEV_TTY1, Filesystem, FilesystemBuilder, Lookup, LookupOptions, Mapping,
    Stat,
};
pub use ids::{Dev, Fd, MountId, NodeId};
pub use mode::{FileType, Mode};
pub use mount::MountOptions;
pub use node::{Node, NodeContent, Timespec};
pub use store::{Backend, ContentSource, MemFs, RemoteEntry, RemoteFs, RemoteSource};
pub use stream::DirEntry;
