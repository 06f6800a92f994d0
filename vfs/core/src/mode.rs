//! File type and permission bits.

use std::fmt;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;

/// Permission and special bits (`rwx` triples plus setuid, setgid, sticky).
pub const PERMISSION_MASK: u32 = 0o7777;

const READ_BITS: u32 = 0o444;
const WRITE_BITS: u32 = 0o222;
const EXEC_BITS: u32 = 0o111;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileType {
    Directory,
    RegularFile,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
}

impl FileType {
    pub const fn bits(self) -> u32 {
        match self {
            FileType::Directory => S_IFDIR,
            FileType::RegularFile => S_IFREG,
            FileType::Symlink => S_IFLNK,
            FileType::CharDevice => S_IFCHR,
            FileType::BlockDevice => S_IFBLK,
            FileType::Fifo => S_IFIFO,
            FileType::Socket => S_IFSOCK,
        }
    }

    pub const fn from_mode(bits: u32) -> Option<Self> {
        match bits & S_IFMT {
            S_IFDIR => Some(FileType::Directory),
            S_IFREG => Some(FileType::RegularFile),
            S_IFLNK => Some(FileType::Symlink),
            S_IFCHR => Some(FileType::CharDevice),
            S_IFBLK => Some(FileType::BlockDevice),
            S_IFIFO => Some(FileType::Fifo),
            S_IFSOCK => Some(FileType::Socket),
            _ => None,
        }
    }

    /// The `d_type` value reported by `getdents`.
    pub const fn dirent_type(self) -> u8 {
        match self {
            FileType::Fifo => 1,
            FileType::CharDevice => 2,
            FileType::Directory => 4,
            FileType::BlockDevice => 6,
            FileType::RegularFile => 8,
            FileType::Symlink => 10,
            FileType::Socket => 12,
        }
    }
}

/// A full `st_mode` value: type bits plus permission bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mode(u32);

impl Mode {
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn from_parts(file_type: FileType, permissions: u32) -> Self {
        Self(file_type.bits() | (permissions & PERMISSION_MASK))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn file_type(self) -> Option<FileType> {
        FileType::from_mode(self.0)
    }

    pub const fn permissions(self) -> u32 {
        self.0 & PERMISSION_MASK
    }

    /// Replaces the permission bits, keeping the type bits.
    pub const fn with_permissions(self, permissions: u32) -> Self {
        Self((self.0 & !PERMISSION_MASK) | (permissions & PERMISSION_MASK))
    }

    pub const fn is_dir(self) -> bool {
        self.0 & S_IFMT == S_IFDIR
    }

    pub const fn is_file(self) -> bool {
        self.0 & S_IFMT == S_IFREG
    }

    pub const fn is_symlink(self) -> bool {
        self.0 & S_IFMT == S_IFLNK
    }

    pub const fn is_char_device(self) -> bool {
        self.0 & S_IFMT == S_IFCHR
    }

    /// Permission bits for a node that may be read and/or written, with
    /// execute granted alongside read.
    pub const fn for_access(readable: bool, writable: bool) -> u32 {
        let mut mode = 0;
        if readable {
            mode |= READ_BITS | EXEC_BITS;
        }
        if writable {
            mode |= WRITE_BITS;
        }
        mode
    }

    /// Owner, group or other grants every requested bit class.
    pub(crate) const fn grants(self, read: bool, write: bool, exec: bool) -> bool {
        !(read && self.0 & READ_BITS == 0)
            && !(write && self.0 & WRITE_BITS == 0)
            && !(exec && self.0 & EXEC_BITS == 0)
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mode({:#o})", self.0)
    }
}

impl From<u32> for Mode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}
