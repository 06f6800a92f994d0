//! Raw `open` flags and `fopen` mode strings → [`OpenFlags`].
//!
//! This module is the only place that should interpret integer open
//! flags coming from a C caller.

use memvfs_core::{Errno, OpenFlags, Result};

/// Converts the `flags` argument of `open(2)`. Bits the filesystem does
/// not know about are dropped.
pub fn raw_open_flags(raw: i32) -> OpenFlags {
    OpenFlags::from_bits_truncate(raw as u32)
}

/// Converts an `fopen`-style mode string (`"r"`, `"w+"`, ...).
///
/// A trailing `b` is accepted and ignored; anything else is `EINVAL`.
pub fn mode_string_to_flags(mode: &str) -> Result<OpenFlags> {
    let mode = mode.strip_suffix('b').unwrap_or(mode);
    let mode = match mode {
        "rb+" => "r+",
        "wb+" => "w+",
        "ab+" => "a+",
        other => other,
    };
    let flags = match mode {
        "r" => OpenFlags::empty(),
        "r+" => OpenFlags::RDWR,
        "w" => OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC,
        "w+" => OpenFlags::RDWR | OpenFlags::CREAT | OpenFlags::TRUNC,
        "a" => OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::APPEND,
        "a+" => OpenFlags::RDWR | OpenFlags::CREAT | OpenFlags::APPEND,
        _ => return Err(Errno::Inval),
    };
    Ok(flags)
}
