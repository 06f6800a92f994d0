//! The syscall layer: raw integers in, raw integers out.
//!
//! Each `sys_*` function takes the arguments a C library passes to the
//! corresponding syscall, runs the operation on a [`Filesystem`] and
//! returns either a non-negative result or a negated errno. Pointer
//! arguments are byte slices owned by the caller.

use crate::errno::{errno_to_return, result_to_return, result_to_return_i64};
use crate::open_flags::{mode_string_to_flags, raw_open_flags};
use memvfs_core::{
    Backend, Dev, Errno, Fd, Filesystem, IoctlReply, IoctlRequest, Mapping, MmapFlags, MmapProt,
    MountOptions, Permissions, Result, Stat, Termios, Timespec, Whence, WinSize,
};
use tracing::{debug, instrument, trace};

pub const TCGETS: u32 = 0x5401;
pub const TCSETS: u32 = 0x5402;
pub const TCSETSW: u32 = 0x5403;
pub const TCSETSF: u32 = 0x5404;
pub const TIOCGPGRP: u32 = 0x540F;
pub const TIOCSPGRP: u32 = 0x5410;
pub const TIOCGWINSZ: u32 = 0x5413;
pub const TIOCSWINSZ: u32 = 0x5414;
pub const FIONREAD: u32 = 0x541B;

pub const MS_ASYNC: i32 = 1;
pub const MS_INVALIDATE: i32 = 2;
pub const MS_SYNC: i32 = 4;

/// The only `mount(2)` flag the filesystem honors.
pub const MS_RDONLY: u64 = 1;

/// Size of `struct termios` as the C library lays it out.
pub const TERMIOS_SIZE: usize = 60;
const TERMIOS_CC_OFFSET: usize = 17;
const WINSIZE_SIZE: usize = 8;

/// `struct timespec` inside [`StatBuf`].
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpec {
    pub tv_sec: i64,
    pub tv_nsec: i64,
}

impl From<Timespec> for TimeSpec {
    fn from(time: Timespec) -> Self {
        Self {
            tv_sec: time.secs,
            tv_nsec: i64::from(time.nanos),
        }
    }
}

/// `struct stat` as filled in by `stat`, `lstat` and `fstat`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatBuf {
    pub st_dev: u64,
    pub st_mode: u32,
    pub st_nlink: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_rdev: u64,
    pub st_size: i64,
    pub st_blksize: i32,
    pub st_blocks: i64,
    pub st_atim: TimeSpec,
    pub st_mtim: TimeSpec,
    pub st_ctim: TimeSpec,
    pub st_ino: u64,
}

impl From<Stat> for StatBuf {
    fn from(stat: Stat) -> Self {
        Self {
            st_dev: stat.dev,
            st_mode: stat.mode.bits(),
            st_nlink: stat.nlink,
            st_uid: stat.uid,
            st_gid: stat.gid,
            st_rdev: stat.rdev,
            st_size: i64::try_from(stat.size).unwrap_or(i64::MAX),
            st_blksize: i32::try_from(stat.blksize).unwrap_or(i32::MAX),
            st_blocks: i64::try_from(stat.blocks).unwrap_or(i64::MAX),
            st_atim: stat.atime.into(),
            st_mtim: stat.mtime.into(),
            st_ctim: stat.ctime.into(),
            st_ino: stat.ino,
        }
    }
}

fn fd_from_raw(fd: i32) -> Result<Fd> {
    Fd::try_from(fd).map_err(|_| Errno::Badf)
}

fn offset_from_raw(offset: i64) -> Result<u64> {
    u64::try_from(offset).map_err(|_| Errno::Inval)
}

fn count_to_return(count: usize) -> Result<i32> {
    i32::try_from(count).map_err(|_| Errno::Overflow)
}

/// ### `sys_open()`
/// Opens `path` and returns the new descriptor.
/// Inputs:
/// - `flags`
///     `O_*` bits as the C library passes them
/// - `mode`
///     Permission bits for a file created by `O_CREAT`
#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_open(fs: &mut Filesystem, path: &str, flags: i32, mode: u32) -> i32 {
    debug!("memvfs::sys_open {path} flags={flags:#o} mode={mode:#o}");
    result_to_return(
        fs.open(path, raw_open_flags(flags), mode)
            .and_then(|fd| i32::try_from(fd).map_err(|_| Errno::Mfile)),
    )
}

/// Opens with an `fopen`-style mode string such as `"w+"`.
#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_open_mode(fs: &mut Filesystem, path: &str, mode: &str, perms: u32) -> i32 {
    debug!("memvfs::sys_open_mode {path} {mode}");
    result_to_return(mode_string_to_flags(mode).and_then(|flags| {
        let fd = fs.open(path, flags, perms)?;
        i32::try_from(fd).map_err(|_| Errno::Mfile)
    }))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_close(fs: &mut Filesystem, fd: i32) -> i32 {
    result_to_return(fd_from_raw(fd).and_then(|fd| fs.close(fd)).map(|()| 0))
}

#[instrument(level = "trace", skip(fs, buf), fields(len = buf.len()), ret)]
pub fn sys_read(fs: &mut Filesystem, fd: i32, buf: &mut [u8]) -> i32 {
    result_to_return(
        fd_from_raw(fd)
            .and_then(|fd| fs.read(fd, buf))
            .and_then(count_to_return),
    )
}

#[instrument(level = "trace", skip(fs, buf), fields(len = buf.len()), ret)]
pub fn sys_pread(fs: &mut Filesystem, fd: i32, buf: &mut [u8], offset: i64) -> i32 {
    result_to_return(pread_internal(fs, fd, buf, offset))
}

fn pread_internal(fs: &mut Filesystem, fd: i32, buf: &mut [u8], offset: i64) -> Result<i32> {
    let fd = fd_from_raw(fd)?;
    let offset = offset_from_raw(offset)?;
    count_to_return(fs.pread(fd, buf, offset)?)
}

#[instrument(level = "trace", skip(fs, buf), fields(len = buf.len()), ret)]
pub fn sys_write(fs: &mut Filesystem, fd: i32, buf: &[u8]) -> i32 {
    result_to_return(
        fd_from_raw(fd)
            .and_then(|fd| fs.write(fd, buf))
            .and_then(count_to_return),
    )
}

#[instrument(level = "trace", skip(fs, buf), fields(len = buf.len()), ret)]
pub fn sys_pwrite(fs: &mut Filesystem, fd: i32, buf: &[u8], offset: i64) -> i32 {
    result_to_return(pwrite_internal(fs, fd, buf, offset))
}

fn pwrite_internal(fs: &mut Filesystem, fd: i32, buf: &[u8], offset: i64) -> Result<i32> {
    let fd = fd_from_raw(fd)?;
    let offset = offset_from_raw(offset)?;
    count_to_return(fs.pwrite(fd, buf, offset)?)
}

/// ### `sys_lseek()`
/// Moves the stream position and returns the new one.
/// Inputs:
/// - `whence`
///     `SEEK_SET`, `SEEK_CUR` or `SEEK_END`; anything else is `EINVAL`
#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_lseek(fs: &mut Filesystem, fd: i32, offset: i64, whence: i32) -> i64 {
    result_to_return_i64(lseek_internal(fs, fd, offset, whence))
}

fn lseek_internal(fs: &mut Filesystem, fd: i32, offset: i64, whence: i32) -> Result<i64> {
    let fd = fd_from_raw(fd)?;
    let whence = Whence::from_raw(whence).ok_or(Errno::Inval)?;
    let position = fs.llseek(fd, offset, whence)?;
    i64::try_from(position).map_err(|_| Errno::Overflow)
}

fn fill_stat(result: Result<Stat>, out: &mut StatBuf) -> Result<i32> {
    *out = StatBuf::from(result?);
    Ok(0)
}

#[instrument(level = "trace", skip(fs, out), ret)]
pub fn sys_stat(fs: &mut Filesystem, path: &str, out: &mut StatBuf) -> i32 {
    result_to_return(fill_stat(fs.stat(path), out))
}

#[instrument(level = "trace", skip(fs, out), ret)]
pub fn sys_lstat(fs: &mut Filesystem, path: &str, out: &mut StatBuf) -> i32 {
    result_to_return(fill_stat(fs.lstat(path), out))
}

#[instrument(level = "trace", skip(fs, out), ret)]
pub fn sys_fstat(fs: &mut Filesystem, fd: i32, out: &mut StatBuf) -> i32 {
    let stat = fd_from_raw(fd).and_then(|fd| fs.fstat(fd));
    result_to_return(fill_stat(stat, out))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_mkdir(fs: &mut Filesystem, path: &str, mode: u32) -> i32 {
    result_to_return(fs.mkdir(path, mode).map(|_| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_mknod(fs: &mut Filesystem, path: &str, mode: u32, dev: u64) -> i32 {
    result_to_return(fs.mknod(path, mode, Dev::from_raw(dev)).map(|_| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_rmdir(fs: &mut Filesystem, path: &str) -> i32 {
    result_to_return(fs.rmdir(path).map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_unlink(fs: &mut Filesystem, path: &str) -> i32 {
    debug!("memvfs::sys_unlink {path}");
    result_to_return(fs.unlink(path).map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_rename(fs: &mut Filesystem, old_path: &str, new_path: &str) -> i32 {
    debug!("memvfs::sys_rename {old_path} -> {new_path}");
    result_to_return(fs.rename(old_path, new_path).map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_symlink(fs: &mut Filesystem, target: &str, link_path: &str) -> i32 {
    result_to_return(fs.symlink(target, link_path).map(|_| 0))
}

/// Copies the link target into `buf` without a terminating NUL,
/// truncating it if `buf` is too small, and returns the bytes copied.
#[instrument(level = "trace", skip(fs, buf), fields(len = buf.len()), ret)]
pub fn sys_readlink(fs: &mut Filesystem, path: &str, buf: &mut [u8]) -> i32 {
    let copied = fs.readlink(path).and_then(|target| {
        let count = target.len().min(buf.len());
        buf[..count].copy_from_slice(&target.as_bytes()[..count]);
        count_to_return(count)
    });
    result_to_return(copied)
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_chmod(fs: &mut Filesystem, path: &str, mode: u32) -> i32 {
    result_to_return(fs.chmod(path, mode).map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_fchmod(fs: &mut Filesystem, fd: i32, mode: u32) -> i32 {
    result_to_return(fd_from_raw(fd).and_then(|fd| fs.fchmod(fd, mode)).map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_chown(fs: &mut Filesystem, path: &str, uid: u32, gid: u32) -> i32 {
    result_to_return(fs.chown(path, uid, gid).map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_lchown(fs: &mut Filesystem, path: &str, uid: u32, gid: u32) -> i32 {
    result_to_return(fs.lchown(path, uid, gid).map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_fchown(fs: &mut Filesystem, fd: i32, uid: u32, gid: u32) -> i32 {
    result_to_return(
        fd_from_raw(fd)
            .and_then(|fd| fs.fchown(fd, uid, gid))
            .map(|()| 0),
    )
}

/// Sets access and modification times, in whole seconds.
#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_utime(fs: &mut Filesystem, path: &str, atime: i64, mtime: i64) -> i32 {
    result_to_return(
        fs.utime(path, Timespec::from_secs(atime), Timespec::from_secs(mtime))
            .map(|()| 0),
    )
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_truncate(fs: &mut Filesystem, path: &str, len: i64) -> i32 {
    let truncated = offset_from_raw(len).and_then(|len| fs.truncate(path, len));
    result_to_return(truncated.map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_ftruncate(fs: &mut Filesystem, fd: i32, len: i64) -> i32 {
    result_to_return(ftruncate_internal(fs, fd, len).map(|()| 0))
}

fn ftruncate_internal(fs: &mut Filesystem, fd: i32, len: i64) -> Result<()> {
    let fd = fd_from_raw(fd)?;
    let len = offset_from_raw(len)?;
    fs.ftruncate(fd, len)
}

/// ### `sys_fallocate()`
/// Inputs:
/// - `mode`
///     Only `0` (plain allocation) is supported
#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_fallocate(fs: &mut Filesystem, fd: i32, mode: i32, offset: i64, len: i64) -> i32 {
    result_to_return(fallocate_internal(fs, fd, mode, offset, len).map(|()| 0))
}

fn fallocate_internal(
    fs: &mut Filesystem,
    fd: i32,
    mode: i32,
    offset: i64,
    len: i64,
) -> Result<()> {
    let fd = fd_from_raw(fd)?;
    if mode != 0 {
        return Err(Errno::Notsup);
    }
    fs.allocate(fd, offset_from_raw(offset)?, offset_from_raw(len)?)
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_fsync(fs: &mut Filesystem, fd: i32) -> i32 {
    result_to_return(fd_from_raw(fd).and_then(|fd| fs.fsync(fd)).map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_dup(fs: &mut Filesystem, fd: i32) -> i32 {
    let new_fd = fd_from_raw(fd).and_then(|fd| fs.dup(fd));
    result_to_return(new_fd.and_then(|fd| i32::try_from(fd).map_err(|_| Errno::Mfile)))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_dup2(fs: &mut Filesystem, fd: i32, new_fd: i32) -> i32 {
    let (fd, new_fd) = match (fd_from_raw(fd), fd_from_raw(new_fd)) {
        (Ok(fd), Ok(new_fd)) => (fd, new_fd),
        _ => return errno_to_return(Errno::Badf),
    };
    result_to_return(fs.dup2(fd, new_fd).map(|_| new_fd as i32))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_chdir(fs: &mut Filesystem, path: &str) -> i32 {
    result_to_return(fs.chdir(path).map(|()| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_fchdir(fs: &mut Filesystem, fd: i32) -> i32 {
    result_to_return(fd_from_raw(fd).and_then(|fd| fs.fchdir(fd)).map(|()| 0))
}

/// Writes the working directory plus a NUL into `buf` and returns the
/// bytes used. `ERANGE` if it does not fit.
#[instrument(level = "trace", skip(fs, buf), fields(len = buf.len()), ret)]
pub fn sys_getcwd(fs: &mut Filesystem, buf: &mut [u8]) -> i32 {
    let cwd = fs.cwd().as_bytes();
    let needed = cwd.len() + 1;
    if buf.len() < needed {
        return errno_to_return(Errno::Range);
    }
    buf[..cwd.len()].copy_from_slice(cwd);
    buf[cwd.len()] = 0;
    result_to_return(count_to_return(needed))
}

/// ### `sys_access()`
/// Inputs:
/// - `amode`
///     `F_OK` (0) or any of `R_OK` (4), `W_OK` (2), `X_OK` (1)
#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_access(fs: &mut Filesystem, path: &str, amode: i32) -> i32 {
    if amode & !0o7 != 0 {
        return errno_to_return(Errno::Inval);
    }
    let perms = Permissions::from_bits_truncate(amode as u32);
    result_to_return(fs.access(path, perms).map(|()| 0))
}

/// `1` for a terminal, `0` otherwise.
#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_isatty(fs: &mut Filesystem, fd: i32) -> i32 {
    result_to_return(
        fd_from_raw(fd)
            .and_then(|fd| fs.isatty(fd))
            .map(i32::from),
    )
}

/// Fills `buf` with `struct dirent64` records and returns the bytes used;
/// `0` at the end of the directory.
///
/// An entry that does not fit is left for the next call.
#[instrument(level = "trace", skip(fs, buf), fields(len = buf.len()), ret)]
pub fn sys_getdents64(fs: &mut Filesystem, fd: i32, buf: &mut [u8]) -> i32 {
    result_to_return(fd_from_raw(fd).and_then(|fd| getdents64_internal(fs, fd, buf)))
}

fn getdents64_internal(fs: &mut Filesystem, fd: Fd, buf: &mut [u8]) -> Result<i32> {
    let mut used = 0;
    while let Some(entry) = fs.getdents(fd, 1)?.pop() {
        // ino, off, reclen, type, name, NUL, padded to 8 bytes
        let reclen = (8 + 8 + 2 + 1 + entry.name.len() + 1).next_multiple_of(8);
        let position = fs.stream(fd)?.position();
        if used + reclen > buf.len() {
            let back = i64::try_from(position - 1).map_err(|_| Errno::Overflow)?;
            fs.llseek(fd, back, Whence::Set)?;
            if used == 0 {
                return Err(Errno::Inval);
            }
            break;
        }
        let record = &mut buf[used..used + reclen];
        record.fill(0);
        record[0..8].copy_from_slice(&entry.ino.to_le_bytes());
        record[8..16].copy_from_slice(&position.to_le_bytes());
        record[16..18].copy_from_slice(&(reclen as u16).to_le_bytes());
        record[18] = entry.file_type.dirent_type();
        record[19..19 + entry.name.len()].copy_from_slice(entry.name.as_bytes());
        used += reclen;
    }
    trace!(fd, used, "filled dirent buffer");
    count_to_return(used)
}

/// `PROT_*` bits as an [`MmapProt`]; `EINVAL` for unknown bits.
pub fn mmap_prot_from_raw(prot: i32) -> Result<MmapProt> {
    u32::try_from(prot)
        .ok()
        .and_then(MmapProt::from_bits)
        .ok_or(Errno::Inval)
}

/// `MAP_*` bits as an [`MmapFlags`]. Exactly one of `MAP_SHARED` and
/// `MAP_PRIVATE` must be set, and anonymous mappings never reach a file.
pub fn mmap_flags_from_raw(flags: i32) -> Result<MmapFlags> {
    let flags = u32::try_from(flags)
        .ok()
        .and_then(MmapFlags::from_bits)
        .ok_or(Errno::Inval)?;
    if flags.contains(MmapFlags::ANONYMOUS) {
        return Err(Errno::Notsup);
    }
    let sharing = flags & (MmapFlags::SHARED | MmapFlags::PRIVATE);
    if sharing != MmapFlags::SHARED && sharing != MmapFlags::PRIVATE {
        return Err(Errno::Inval);
    }
    Ok(flags)
}

/// ### `sys_mmap()`
/// Maps `len` bytes of `fd` starting at `offset` into `out` and returns
/// `0`. The caller owns the bytes until it hands the mapping back to
/// [`sys_munmap`].
/// Inputs:
/// - `prot`
///     `PROT_READ`, `PROT_WRITE` and `PROT_EXEC` bits
/// - `flags`
///     `MAP_SHARED` or `MAP_PRIVATE`, optionally with `MAP_FIXED`
#[instrument(level = "trace", skip(fs, out), ret)]
pub fn sys_mmap(
    fs: &mut Filesystem,
    len: usize,
    prot: i32,
    flags: i32,
    fd: i32,
    offset: i64,
    out: &mut Option<Mapping>,
) -> i32 {
    debug!("memvfs::sys_mmap fd={fd} len={len} prot={prot:#x} flags={flags:#x}");
    result_to_return(mmap_internal(fs, len, prot, flags, fd, offset).map(|mapping| {
        *out = Some(mapping);
        0
    }))
}

fn mmap_internal(
    fs: &mut Filesystem,
    len: usize,
    prot: i32,
    flags: i32,
    fd: i32,
    offset: i64,
) -> Result<Mapping> {
    let prot = mmap_prot_from_raw(prot)?;
    let flags = mmap_flags_from_raw(flags)?;
    fs.mmap(fd_from_raw(fd)?, len, offset_from_raw(offset)?, prot, flags)
}

/// Writes a shared, writable mapping back to its file.
///
/// `flags` takes `MS_ASYNC`, `MS_SYNC` and `MS_INVALIDATE`; asking for
/// both `MS_ASYNC` and `MS_SYNC` is `EINVAL`.
#[instrument(level = "trace", skip(fs, mapping), fields(len = mapping.len()), ret)]
pub fn sys_msync(fs: &mut Filesystem, mapping: &Mapping, flags: i32) -> i32 {
    if flags & !(MS_ASYNC | MS_SYNC | MS_INVALIDATE) != 0
        || flags & (MS_ASYNC | MS_SYNC) == MS_ASYNC | MS_SYNC
    {
        return errno_to_return(Errno::Inval);
    }
    result_to_return(fs.msync(mapping).map(|()| 0))
}

#[instrument(level = "trace", skip(fs, mapping), fields(len = mapping.len()), ret)]
pub fn sys_munmap(fs: &mut Filesystem, mapping: Mapping) -> i32 {
    result_to_return(fs.munmap(mapping).map(|()| 0))
}

/// ### `sys_mount()`
/// Attaches `backend` at `target`.
/// Inputs:
/// - `flags`
///     `MS_RDONLY` or `0`; any other bit is `EINVAL`
#[instrument(level = "trace", skip(fs, backend), ret)]
pub fn sys_mount(
    fs: &mut Filesystem,
    backend: impl Backend + 'static,
    target: &str,
    flags: u64,
) -> i32 {
    debug!("memvfs::sys_mount {target} store={} flags={flags:#x}", backend.name());
    if flags & !MS_RDONLY != 0 {
        return errno_to_return(Errno::Inval);
    }
    let options = if flags & MS_RDONLY != 0 {
        MountOptions::read_only()
    } else {
        MountOptions::default()
    };
    result_to_return(fs.mount(backend, options, target).map(|_| 0))
}

#[instrument(level = "trace", skip(fs), ret)]
pub fn sys_umount(fs: &mut Filesystem, target: &str) -> i32 {
    debug!("memvfs::sys_umount {target}");
    result_to_return(fs.unmount(target).map(|()| 0))
}

/// ### `sys_ioctl()`
/// Runs a terminal request, reading and writing its argument through
/// `argp` in the C layout.
/// Inputs:
/// - `request`
///     `TCGETS`, `TCSETS*`, `TIOCGWINSZ`, `TIOCSWINSZ`, `TIOCGPGRP` or
///     `TIOCSPGRP`; other numbers are handed to the device as is
#[instrument(level = "trace", skip(fs, argp), ret)]
pub fn sys_ioctl(fs: &mut Filesystem, fd: i32, request: u32, argp: &mut [u8]) -> i32 {
    debug!("memvfs::sys_ioctl fd={fd} request={request:#x}");
    result_to_return(ioctl_internal(fs, fd, request, argp).map(|()| 0))
}

fn ioctl_internal(fs: &mut Filesystem, fd: i32, request: u32, argp: &mut [u8]) -> Result<()> {
    let fd = fd_from_raw(fd)?;
    let request = match request {
        TCGETS => IoctlRequest::GetAttributes,
        TCSETS | TCSETSW | TCSETSF => IoctlRequest::SetAttributes(decode_termios(argp)?),
        TIOCGWINSZ => IoctlRequest::GetWindowSize,
        TIOCSWINSZ => IoctlRequest::SetWindowSize(decode_winsize(argp)?),
        TIOCGPGRP => IoctlRequest::GetProcessGroup,
        TIOCSPGRP => IoctlRequest::SetProcessGroup(i32::from_le_bytes(read_array(argp, 0)?)),
        other => IoctlRequest::Other(other),
    };
    match fs.ioctl(fd, request)? {
        IoctlReply::Done => Ok(()),
        IoctlReply::Attributes(termios) => encode_termios(&termios, argp),
        IoctlReply::WindowSize(winsize) => encode_winsize(winsize, argp),
        IoctlReply::ProcessGroup(pgrp) => write_bytes(argp, 0, &pgrp.to_le_bytes()),
    }
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    buf.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(Errno::Inval)
}

fn write_bytes(buf: &mut [u8], offset: usize, bytes: &[u8]) -> Result<()> {
    buf.get_mut(offset..offset + bytes.len())
        .ok_or(Errno::Inval)?
        .copy_from_slice(bytes);
    Ok(())
}

pub fn decode_termios(buf: &[u8]) -> Result<Termios> {
    if buf.len() < TERMIOS_SIZE {
        return Err(Errno::Inval);
    }
    Ok(Termios {
        c_iflag: u32::from_le_bytes(read_array(buf, 0)?),
        c_oflag: u32::from_le_bytes(read_array(buf, 4)?),
        c_cflag: u32::from_le_bytes(read_array(buf, 8)?),
        c_lflag: u32::from_le_bytes(read_array(buf, 12)?),
        c_cc: read_array(buf, TERMIOS_CC_OFFSET)?,
    })
}

pub fn encode_termios(termios: &Termios, buf: &mut [u8]) -> Result<()> {
    let out = buf.get_mut(..TERMIOS_SIZE).ok_or(Errno::Inval)?;
    out.fill(0);
    write_bytes(out, 0, &termios.c_iflag.to_le_bytes())?;
    write_bytes(out, 4, &termios.c_oflag.to_le_bytes())?;
    write_bytes(out, 8, &termios.c_cflag.to_le_bytes())?;
    write_bytes(out, 12, &termios.c_lflag.to_le_bytes())?;
    write_bytes(out, TERMIOS_CC_OFFSET, &termios.c_cc)
}

pub fn decode_winsize(buf: &[u8]) -> Result<WinSize> {
    Ok(WinSize {
        rows: u16::from_le_bytes(read_array(buf, 0)?),
        cols: u16::from_le_bytes(read_array(buf, 2)?),
    })
}

pub fn encode_winsize(winsize: WinSize, buf: &mut [u8]) -> Result<()> {
    let out = buf.get_mut(..WINSIZE_SIZE).ok_or(Errno::Inval)?;
    out.fill(0);
    write_bytes(out, 0, &winsize.rows.to_le_bytes())?;
    write_bytes(out, 2, &winsize.cols.to_le_bytes())
}
