//! Open, access and mapping flags.
//!
//! Bit values are the ones the C library uses, so a raw `int` from a
//! syscall can be converted with `from_bits_truncate`.

use bitflags::bitflags;

bitflags! {
    /// Flags accepted by `open`. `O_RDONLY` is the empty set.
    pub struct OpenFlags: u32 {
        const WRONLY = 0o1;
        const RDWR = 0o2;
        const CREAT = 0o100;
        const EXCL = 0o200;
        const NOCTTY = 0o400;
        const TRUNC = 0o1000;
        const APPEND = 0o2000;
        const NONBLOCK = 0o4000;
        const DSYNC = 0o10000;
        const DIRECTORY = 0o200000;
        const NOFOLLOW = 0o400000;
        const CLOEXEC = 0o2000000;

        const ACCMODE = Self::WRONLY.bits | Self::RDWR.bits;
    }
}

/// The access mode encoded in the low bits of [`OpenFlags`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenFlags {
    pub fn access_mode(self) -> AccessMode {
        if self.contains(OpenFlags::RDWR) {
            AccessMode::ReadWrite
        } else if self.contains(OpenFlags::WRONLY) {
            AccessMode::WriteOnly
        } else {
            AccessMode::ReadOnly
        }
    }

    pub fn is_readable(self) -> bool {
        self.access_mode() != AccessMode::WriteOnly
    }

    pub fn is_writable(self) -> bool {
        self.access_mode() != AccessMode::ReadOnly
    }

    /// Permissions the caller needs on the node to open it with these flags.
    pub(crate) fn required_permissions(self) -> Permissions {
        let mut perms = match self.access_mode() {
            AccessMode::ReadOnly => Permissions::READ,
            AccessMode::WriteOnly => Permissions::WRITE,
            AccessMode::ReadWrite => Permissions::READ | Permissions::WRITE,
        };
        if self.contains(OpenFlags::TRUNC) {
            perms |= Permissions::WRITE;
        }
        perms
    }
}

bitflags! {
    /// Permission classes checked against a node's mode. The values
    /// double as the `amode` bits of `access(2)`.
    pub struct Permissions: u32 {
        const EXEC = 1;
        const WRITE = 2;
        const READ = 4;
    }
}

bitflags! {
    pub struct MmapProt: u32 {
        const READ = 1;
        const WRITE = 2;
        const EXEC = 4;
    }
}

bitflags! {
    pub struct MmapFlags: u32 {
        const SHARED = 1;
        const PRIVATE = 2;
        const FIXED = 0x10;
        const ANONYMOUS = 0x20;
    }
}

/// Reference point for `llseek`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl Whence {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Whence::Set),
            1 => Some(Whence::Cur),
            2 => Some(Whence::End),
            _ => None,
        }
    }
}
