use memvfs_core::{
    DEV_NULL, DEV_TTY, Dev, DeviceOps, Errno, Filesystem, IoctlReply, IoctlRequest,
    MemoryTerminal, OpenFlags, Result, Termios, Whence, WinSize,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

struct Terminals {
    fs: Filesystem,
    out: MemoryTerminal,
    err: MemoryTerminal,
}

fn with_terminals() -> Terminals {
    let out = MemoryTerminal::new();
    let err = MemoryTerminal::new();
    let fs = Filesystem::builder()
        .with_terminal(out.clone())
        .with_error_terminal(err.clone())
        .build()
        .expect("default filesystem");
    Terminals { fs, out, err }
}

/// Counts up from zero and remembers the last byte written.
#[derive(Debug, Default)]
struct Counter {
    next: u8,
    last_written: Option<u8>,
}

impl DeviceOps for Counter {
    fn read(&mut self, buf: &mut [u8], _position: u64) -> Result<usize> {
        for byte in buf.iter_mut() {
            *byte = self.next;
            self.next = self.next.wrapping_add(1);
        }
        Ok(buf.len())
    }

    fn write(&mut self, buf: &[u8], _position: u64) -> Result<usize> {
        self.last_written = buf.last().copied();
        Ok(buf.len())
    }
}

/// A seekable device whose end sits at the top of the offset range.
#[derive(Debug, Default)]
struct Tape;

impl DeviceOps for Tape {
    fn read(&mut self, _buf: &mut [u8], _position: u64) -> Result<usize> {
        Ok(0)
    }

    fn write(&mut self, buf: &[u8], _position: u64) -> Result<usize> {
        Ok(buf.len())
    }

    fn llseek(&mut self, offset: i64, whence: Whence, position: u64) -> Result<u64> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => position,
            Whence::End => u64::MAX,
        };
        base.checked_add_signed(offset).ok_or(Errno::Inval)
    }
}

#[test]
fn default_layout() {
    let Terminals { mut fs, .. } = with_terminals();

    assert_eq!(fs.open_fds(), vec![0, 1, 2]);
    assert_eq!(fs.readdir("/").unwrap(), vec![".", "..", "tmp", "home", "dev"]);
    assert_eq!(
        fs.readdir("/dev").unwrap(),
        vec![
            ".", "..", "null", "tty", "tty1", "random", "urandom", "shm", "stdin", "stdout",
            "stderr"
        ]
    );
    assert!(fs.stat("/home/web_user").unwrap().mode.is_dir());
    assert!(fs.stat("/dev/shm/tmp").unwrap().mode.is_dir());
    assert_eq!(fs.readlink("/dev/stdin").unwrap(), "/dev/tty");
    assert_eq!(fs.readlink("/dev/stderr").unwrap(), "/dev/tty1");
    assert_eq!(fs.stream(1).unwrap().path(), "/dev/tty");

    let null = fs.stat("/dev/null").unwrap();
    assert!(null.mode.is_char_device());
    assert_eq!(null.rdev, DEV_NULL.raw());
    assert_eq!(Dev::from_raw(fs.stat("/dev/random").unwrap().rdev).major, 64);
    assert_eq!(Dev::from_raw(fs.stat("/dev/urandom").unwrap().rdev).major, 65);
}

#[test_log::test]
fn terminal_output_is_line_buffered() {
    let Terminals { mut fs, out, err } = with_terminals();

    assert_eq!(fs.write(1, b"hello\nwor"), Ok(9));
    assert_eq!(out.take_lines(), vec!["hello"]);
    fs.write(1, b"ld\n").unwrap();
    assert_eq!(out.take_lines(), vec!["world"]);

    fs.write(2, b"oops\n").unwrap();
    assert_eq!(err.take_lines(), vec!["oops"]);
    assert!(out.take_lines().is_empty());

    fs.write(1, b"partial").unwrap();
    fs.fsync(1).unwrap();
    assert_eq!(out.take_lines(), vec!["partial"]);
}

#[test]
fn terminal_input() {
    let Terminals { mut fs, out, .. } = with_terminals();
    out.push_input(b"abc");

    let mut buf = [0u8; 8];
    assert_eq!(fs.read(0, &mut buf), Ok(3));
    assert_eq!(&buf[..3], b"abc");
    assert_eq!(fs.read(0, &mut buf), Ok(0));

    out.set_blocking(true);
    assert_eq!(fs.read(0, &mut buf), Err(Errno::Again));
    out.push_input(b"z");
    assert_eq!(fs.read(0, &mut buf), Ok(1));
}

#[test]
fn terminals_are_not_seekable() {
    let Terminals { mut fs, .. } = with_terminals();
    let mut buf = [0u8; 1];

    assert_eq!(fs.llseek(1, 0, Whence::Set), Err(Errno::Spipe));
    assert_eq!(fs.pread(0, &mut buf, 0), Err(Errno::Spipe));
    assert_eq!(fs.pwrite(1, b"x", 0), Err(Errno::Spipe));
    assert!(!fs.stream(0).unwrap().is_seekable());
}

#[test]
fn terminal_ioctls() {
    let Terminals { mut fs, .. } = with_terminals();

    assert!(fs.isatty(0).unwrap());
    assert!(fs.isatty(2).unwrap());
    assert_eq!(
        fs.ioctl(1, IoctlRequest::GetWindowSize),
        Ok(IoctlReply::WindowSize(WinSize { rows: 24, cols: 80 }))
    );

    let size = WinSize { rows: 50, cols: 132 };
    assert_eq!(fs.ioctl(1, IoctlRequest::SetWindowSize(size)), Ok(IoctlReply::Done));
    assert_eq!(
        fs.ioctl(1, IoctlRequest::GetWindowSize),
        Ok(IoctlReply::WindowSize(size))
    );
    // stdin shares the terminal with stdout
    assert_eq!(
        fs.ioctl(0, IoctlRequest::GetWindowSize),
        Ok(IoctlReply::WindowSize(size))
    );
    assert_eq!(
        fs.ioctl(2, IoctlRequest::GetWindowSize),
        Ok(IoctlReply::WindowSize(WinSize::default()))
    );

    let mut termios = Termios::default();
    assert_eq!(termios.c_lflag, 0x8a3b);
    termios.c_lflag &= !0o10;
    fs.ioctl(1, IoctlRequest::SetAttributes(termios)).unwrap();
    assert_eq!(
        fs.ioctl(1, IoctlRequest::GetAttributes),
        Ok(IoctlReply::Attributes(termios))
    );

    fs.ioctl(1, IoctlRequest::SetProcessGroup(42)).unwrap();
    assert_eq!(
        fs.ioctl(1, IoctlRequest::GetProcessGroup),
        Ok(IoctlReply::ProcessGroup(42))
    );
    assert_eq!(fs.ioctl(1, IoctlRequest::Other(0x1234)), Err(Errno::Inval));

    let null = fs.open("/dev/null", OpenFlags::RDWR, 0).unwrap();
    assert!(!fs.isatty(null).unwrap());
    assert_eq!(fs.ioctl(null, IoctlRequest::GetWindowSize), Err(Errno::Notty));
}

#[test]
fn null_and_random() {
    let Terminals { mut fs, .. } = with_terminals();

    fs.write_file("/dev/null", b"discarded").unwrap();
    assert_eq!(fs.read_file("/dev/null").unwrap(), b"");
    let null = fs.open("/dev/null", OpenFlags::RDWR, 0).unwrap();
    assert_eq!(fs.llseek(null, 100, Whence::Set), Ok(0));

    let random = fs.open("/dev/urandom", OpenFlags::empty(), 0).unwrap();
    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    assert_eq!(fs.read(random, &mut first), Ok(32));
    assert_eq!(fs.read(random, &mut second), Ok(32));
    assert_ne!(first, second);
    assert_eq!(fs.llseek(random, 0, Whence::Set), Err(Errno::Spipe));
}

#[test]
fn devices_without_a_driver() {
    let Terminals { mut fs, .. } = with_terminals();
    let ghost = Dev::new(200, 0);
    fs.mkdev("/dev/ghost", 0o666, ghost).unwrap();

    assert!(!fs.devices().contains(ghost));
    assert_eq!(fs.open("/dev/ghost", OpenFlags::empty(), 0).err(), Some(Errno::Nodev));

    fs.register_device(ghost, Box::new(Counter::default()));
    let fd = fs.open("/dev/ghost", OpenFlags::RDWR, 0).unwrap();
    let mut buf = [0u8; 4];
    fs.read(fd, &mut buf).unwrap();
    assert_eq!(buf, [0, 1, 2, 3]);
    assert_eq!(fs.llseek(fd, 0, Whence::Set), Err(Errno::Spipe));
}

#[test]
fn runtime_devices_get_fresh_majors() {
    let Terminals { mut fs, .. } = with_terminals();

    let dev = fs
        .create_device("/dev", "counter", Box::new(Counter::default()), true, true)
        .unwrap();
    assert_eq!(dev, Dev::new(66, 0));
    assert_eq!(fs.stat("/dev/counter").unwrap().mode.permissions(), 0o777);

    let fd = fs.open("/dev/counter", OpenFlags::RDWR, 0).unwrap();
    assert_eq!(fs.write(fd, b"xyz"), Ok(3));
    let mut buf = [0u8; 2];
    fs.read(fd, &mut buf).unwrap();
    assert_eq!(buf, [0, 1]);

    assert_eq!(
        fs.create_device("/dev", "counter", Box::new(Counter::default()), true, false)
            .err(),
        Some(Errno::Exist)
    );
    assert!(!fs.devices().contains(Dev::new(67, 0)));
}

#[test]
fn writes_cannot_push_the_position_past_the_offset_range() {
    let Terminals { mut fs, .. } = with_terminals();
    fs.create_device("/dev", "tape", Box::new(Tape), true, true)
        .unwrap();
    let fd = fs.open("/dev/tape", OpenFlags::WRONLY, 0).unwrap();

    assert_eq!(fs.llseek(fd, -2, Whence::End), Ok(u64::MAX - 2));
    assert_eq!(fs.write(fd, b"abc"), Err(Errno::Overflow));
    assert_eq!(fs.llseek(fd, 0, Whence::Cur), Ok(u64::MAX - 2));
    assert_eq!(fs.write(fd, b"ab"), Ok(2));
    assert_eq!(fs.llseek(fd, 0, Whence::Cur), Ok(u64::MAX));
    assert_eq!(fs.write(fd, b"a"), Err(Errno::Overflow));
    assert_eq!(fs.pwrite(fd, b"a", 0), Ok(1));
}

#[test]
fn callback_streams() {
    let input: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(b"in".to_vec()));
    let output = Rc::new(RefCell::new(Vec::new()));
    let source = input.clone();
    let sink = output.clone();
    let term = MemoryTerminal::new();

    let mut fs = Filesystem::builder()
        .with_terminal(term.clone())
        .with_error_terminal(term.clone())
        .with_stdin(move || {
            let mut input = source.borrow_mut();
            Ok(if input.is_empty() {
                None
            } else {
                Some(input.remove(0))
            })
        })
        .with_stdout(move |byte| {
            sink.borrow_mut().push(byte);
            Ok(())
        })
        .build()
        .unwrap();

    assert_eq!(fs.open_fds(), vec![0, 1, 2]);
    assert!(fs.stat("/dev/stdin").unwrap().mode.is_char_device());
    assert_eq!(Dev::from_raw(fs.stat("/dev/stdin").unwrap().rdev).major, 66);
    assert_eq!(fs.readlink("/dev/stderr").unwrap(), "/dev/tty1");

    fs.write(1, b"no buffering").unwrap();
    assert_eq!(output.borrow().as_slice(), b"no buffering");
    assert!(term.take_lines().is_empty());

    let mut buf = [0u8; 4];
    assert_eq!(fs.read(0, &mut buf), Ok(2));
    assert_eq!(&buf[..2], b"in");
    assert!(!fs.isatty(1).unwrap());
    assert_eq!(fs.stat("/dev/stdout").unwrap().mode.permissions(), 0o222);
}

#[test]
fn shutdown_flushes_terminals() {
    let Terminals { mut fs, out, err } = with_terminals();
    fs.write(1, b"pending").unwrap();
    fs.write(2, b"also pending").unwrap();

    fs.shutdown().unwrap();
    assert_eq!(out.take_lines(), vec!["pending"]);
    assert_eq!(err.take_lines(), vec!["also pending"]);
    assert!(fs.open_fds().is_empty());
}

#[test]
fn tty_device_numbers() {
    let Terminals { mut fs, .. } = with_terminals();
    assert_eq!(fs.stat("/dev/tty").unwrap().rdev, DEV_TTY.raw());
    assert!(fs.devices().contains(DEV_TTY));
}
