//! Errno → raw syscall return translation.
//!
//! This is the single place that turns a `memvfs-core` error into the
//! negative integer a C caller sees. Callers must not negate codes
//! themselves.

use memvfs_core::{Errno, Result};

/// Negated errno, as returned from a failing syscall.
pub fn errno_to_return(err: Errno) -> i32 {
    -i32::from(err.code())
}

/// `Ok(n)` becomes `n`, an error becomes its negated errno.
pub fn result_to_return(result: Result<i32>) -> i32 {
    result.unwrap_or_else(errno_to_return)
}

/// Wide variant of [`result_to_return`] for offsets.
pub fn result_to_return_i64(result: Result<i64>) -> i64 {
    result.unwrap_or_else(|err| i64::from(errno_to_return(err)))
}

/// Recovers the errno from a syscall return value, if it signals one.
pub fn return_to_errno(ret: i64) -> Option<Errno> {
    if ret >= 0 {
        return None;
    }
    u16::try_from(-ret).ok().and_then(Errno::from_code)
}

/// Stable string name for an errno (logging only).
pub fn errno_kind_str(err: Errno) -> &'static str {
    match err {
        Errno::Access => "permission_denied",
        Errno::Again => "would_block",
        Errno::Badf => "bad_handle",
        Errno::Busy => "busy",
        Errno::Exist => "already_exists",
        Errno::Fbig => "file_too_large",
        Errno::Inval => "invalid_input",
        Errno::Io => "io",
        Errno::Isdir => "is_dir",
        Errno::Loop => "too_many_symlinks",
        Errno::Mfile => "too_many_open_files",
        Errno::Nametoolong => "name_too_long",
        Errno::Nodev => "no_device",
        Errno::Noent => "not_found",
        Errno::Nomem => "no_memory",
        Errno::Nospc => "no_space",
        Errno::Nosys => "not_implemented",
        Errno::Notdir => "not_dir",
        Errno::Notempty => "dir_not_empty",
        Errno::Notty => "not_a_tty",
        Errno::Nxio => "no_address",
        Errno::Overflow => "overflow",
        Errno::Perm => "operation_not_permitted",
        Errno::Range => "range",
        Errno::Rofs => "read_only_fs",
        Errno::Spipe => "not_seekable",
        Errno::Xdev => "cross_device",
        Errno::Notsup => "not_supported",
    }
}
