//! The raw, C-facing side of `memvfs-core`.
//!
//! Integer open flags and `fopen` mode strings are converted to
//! [`OpenFlags`](memvfs_core::OpenFlags), results come back as
//! non-negative values or negated errnos, and `stat`, `termios`,
//! `winsize` and `dirent64` use the layouts a C library expects.

pub mod errno;
pub mod open_flags;
pub mod syscalls;

pub use errno::{errno_kind_str, errno_to_return, result_to_return, return_to_errno};
pub use open_flags::{mode_string_to_flags, raw_open_flags};
pub use syscalls::{StatBuf, TimeSpec};
