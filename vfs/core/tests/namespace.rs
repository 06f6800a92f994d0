use memvfs_core::mode::{S_IFDIR, S_IFIFO, S_IFREG};
use memvfs_core::{
    Dev, Errno, FileType, Filesystem, FsConfig, OpenFlags, Permissions, Timespec,
};
use pretty_assertions::assert_eq;

fn new_fs() -> Filesystem {
    Filesystem::bare(FsConfig::default()).expect("bare filesystem")
}

#[test]
fn create_and_list_entries() {
    let mut fs = new_fs();
    assert!(fs.mkdir("/a", 0o755).is_ok(), "creating a directory");
    assert!(fs.create("/a/f", 0o644).is_ok(), "creating a file");
    assert!(fs.mkdir("/a/sub", 0o755).is_ok(), "creating a nested directory");

    assert_eq!(fs.readdir("/a").unwrap(), vec![".", "..", "f", "sub"]);
    assert_eq!(fs.readdir("/").unwrap(), vec![".", "..", "a"]);
    assert_eq!(fs.readdir("/a/f").err(), Some(Errno::Notdir));
}

#[test]
fn creation_errors() {
    let mut fs = new_fs();
    fs.mkdir("/a", 0o755).unwrap();
    fs.create("/a/f", 0o644).unwrap();

    assert_eq!(fs.mkdir("/a", 0o755).err(), Some(Errno::Exist));
    assert_eq!(fs.create("/a/f", 0o644).err(), Some(Errno::Exist));
    assert_eq!(fs.mkdir("/missing/x", 0o755).err(), Some(Errno::Noent));
    assert_eq!(fs.mkdir("/a/f/x", 0o755).err(), Some(Errno::Notdir));
    assert_eq!(fs.mkdir("/", 0o755).err(), Some(Errno::Exist));
    assert_eq!(fs.mkdir("", 0o755).err(), Some(Errno::Noent));

    let long = format!("/{}", "x".repeat(256));
    assert_eq!(fs.mkdir(&long, 0o755).err(), Some(Errno::Nametoolong));
    assert_eq!(
        fs.stat(&format!("{long}/y")).err(),
        Some(Errno::Nametoolong)
    );
}

#[test]
fn memory_store_refuses_special_node_types() {
    let mut fs = new_fs();
    assert_eq!(
        fs.mknod("/fifo", S_IFIFO | 0o644, Dev::NONE).err(),
        Some(Errno::Perm)
    );
    assert_eq!(fs.mknod("/typeless", 0o644, Dev::NONE).err(), Some(Errno::Inval));
    assert!(fs.mknod("/plain", S_IFREG | 0o600, Dev::NONE).is_ok());
}

#[test]
fn stat_reports_type_size_and_links() {
    let mut fs = new_fs();
    fs.mkdir("/d", 0o755).unwrap();
    fs.write_file("/d/f", b"hello").unwrap();

    let dir = fs.stat("/d").unwrap();
    assert_eq!(dir.mode.bits(), S_IFDIR | 0o755);
    assert_eq!(dir.size, 4096);
    assert_eq!(dir.nlink, 2);

    let file = fs.stat("/d/f").unwrap();
    assert_eq!(file.mode.file_type(), Some(FileType::RegularFile));
    assert_eq!(file.mode.permissions(), 0o666);
    assert_eq!(file.size, 5);
    assert_eq!(file.nlink, 1);
    assert_eq!(file.blocks, 1);
    assert_ne!(file.ino, dir.ino);
}

#[test]
fn unlink_and_rmdir_check_node_types() {
    let mut fs = new_fs();
    fs.mkdir("/a", 0o755).unwrap();
    fs.create("/a/f", 0o644).unwrap();
    fs.mkdir("/a/sub", 0o755).unwrap();

    assert_eq!(fs.unlink("/a/sub"), Err(Errno::Isdir));
    assert_eq!(fs.rmdir("/a/f"), Err(Errno::Notdir));
    assert_eq!(fs.rmdir("/a"), Err(Errno::Notempty));
    assert_eq!(fs.unlink("/a/missing"), Err(Errno::Noent));
    assert_eq!(fs.rmdir("/"), Err(Errno::Busy));

    assert_eq!(fs.unlink("/a/f"), Ok(()));
    assert_eq!(fs.rmdir("/a/sub"), Ok(()));
    assert_eq!(fs.rmdir("/a"), Ok(()));
    assert_eq!(fs.readdir("/").unwrap(), vec![".", ".."]);
}

#[test]
fn removing_the_working_directory_is_busy() {
    let mut fs = new_fs();
    fs.mkdir("/w", 0o755).unwrap();
    fs.chdir("/w").unwrap();
    assert_eq!(fs.rmdir("/w"), Err(Errno::Busy));
    fs.chdir("/").unwrap();
    assert_eq!(fs.rmdir("/w"), Ok(()));
}

#[test]
fn create_then_delete_leaves_no_trace() {
    let mut fs = new_fs();
    let before = (fs.node_count(), fs.indexed_names());

    fs.mkdir("/x", 0o777).unwrap();
    fs.rmdir("/x").unwrap();
    assert_eq!((fs.node_count(), fs.indexed_names()), before);

    fs.create("/y", 0o644).unwrap();
    fs.unlink("/y").unwrap();
    assert_eq!((fs.node_count(), fs.indexed_names()), before);

    fs.symlink("/target", "/z").unwrap();
    fs.unlink("/z").unwrap();
    assert_eq!((fs.node_count(), fs.indexed_names()), before);
}

#[test]
fn attributes_change_without_touching_the_type() {
    let mut fs = new_fs();
    fs.create("/f", 0o644).unwrap();

    fs.chmod("/f", 0o4600).unwrap();
    assert_eq!(fs.stat("/f").unwrap().mode.bits(), S_IFREG | 0o4600);

    fs.chown("/f", 1000, 100).unwrap();
    let stat = fs.stat("/f").unwrap();
    assert_eq!((stat.uid, stat.gid), (1000, 100));

    fs.utime("/f", Timespec::from_secs(10), Timespec::from_secs(20))
        .unwrap();
    let stat = fs.stat("/f").unwrap();
    assert_eq!(stat.atime, Timespec::from_secs(10));
    assert_eq!(stat.mtime, Timespec::from_secs(20));
    assert_eq!(stat.mtime.as_millis(), 20_000);
}

#[test]
fn truncate_shrinks_and_zero_extends() {
    let mut fs = new_fs();
    fs.write_file("/t", b"hello world").unwrap();

    fs.truncate("/t", 5).unwrap();
    assert_eq!(fs.read_file("/t").unwrap(), b"hello");
    fs.truncate("/t", 8).unwrap();
    assert_eq!(fs.read_file("/t").unwrap(), b"hello\0\0\0");

    fs.mkdir("/d", 0o755).unwrap();
    assert_eq!(fs.truncate("/d", 0), Err(Errno::Isdir));
    assert_eq!(fs.truncate("/missing", 0), Err(Errno::Noent));
}

#[test]
fn permissions_are_ignored_by_default() {
    let mut fs = new_fs();
    fs.create("/locked", 0o000).unwrap();
    assert_eq!(fs.access("/locked", Permissions::READ | Permissions::WRITE), Ok(()));
    assert!(fs.open("/locked", OpenFlags::RDWR, 0).is_ok());
    assert_eq!(fs.access("/missing", Permissions::empty()), Err(Errno::Noent));
}

#[test]
fn permissions_are_checked_when_enforced() {
    let mut fs = Filesystem::bare(FsConfig::default().with_permissions_enforced(true)).unwrap();
    fs.create("/locked", 0o000).unwrap();

    assert_eq!(fs.access("/locked", Permissions::READ), Err(Errno::Access));
    assert_eq!(fs.access("/locked", Permissions::empty()), Ok(()));
    assert_eq!(
        fs.open("/locked", OpenFlags::empty(), 0).err(),
        Some(Errno::Access)
    );

    fs.chmod("/locked", 0o444).unwrap();
    assert!(fs.open("/locked", OpenFlags::empty(), 0).is_ok());
    assert_eq!(
        fs.open("/locked", OpenFlags::WRONLY, 0).err(),
        Some(Errno::Access)
    );

    fs.mkdir("/ro", 0o555).unwrap();
    assert_eq!(fs.mkdir("/ro/x", 0o755).err(), Some(Errno::Access));
}

#[test]
fn relative_paths_follow_the_working_directory() {
    let mut fs = new_fs();
    fs.mkdir_tree("/a/b/c", 0o777).unwrap();
    fs.mkdir_tree("/a/b/c", 0o777).unwrap();

    fs.chdir("/a/b").unwrap();
    assert_eq!(fs.cwd(), "/a/b");
    fs.create("c/file", 0o644).unwrap();
    assert!(fs.stat("/a/b/c/file").is_ok());

    fs.chdir("..").unwrap();
    assert_eq!(fs.cwd(), "/a");
    assert_eq!(fs.realpath("b/c/../c/file").unwrap(), "/a/b/c/file");
    assert_eq!(fs.chdir("/a/b/c/file"), Err(Errno::Notdir));
    assert_eq!(fs.chdir("/nowhere"), Err(Errno::Noent));
}

#[test]
fn dotdot_above_root_stays_at_root() {
    let mut fs = new_fs();
    fs.mkdir("/a", 0o755).unwrap();
    assert_eq!(fs.realpath("/../../a").unwrap(), "/a");
    assert_eq!(fs.realpath("/a/..").unwrap(), "/");
}

#[test]
fn helper_constructors() {
    let mut fs = new_fs();
    assert_eq!(fs.create_path("/", "x/y/z"), Ok("/x/y/z".to_string()));
    assert!(fs.stat("/x/y/z").unwrap().mode.is_dir());
    assert_eq!(fs.create_path("/x", "y/w"), Ok("/x/y/w".to_string()));

    fs.write_file("/x/file", b"").unwrap();
    assert_eq!(fs.create_path("/x", "file/deeper"), Err(Errno::Notdir));
    assert_eq!(fs.create_path("/x", "file"), Err(Errno::Notdir));
    assert_eq!(fs.create_path("/missing", "a"), Err(Errno::Noent));

    fs.mkdir("/assets", 0o755).unwrap();
    let id = fs
        .create_data_file("/assets", Some("a.bin"), vec![1, 2, 3], true, false)
        .unwrap();
    assert_eq!(fs.read_file("/assets/a.bin").unwrap(), vec![1, 2, 3]);
    assert_eq!(fs.stat("/assets/a.bin").unwrap().mode.permissions(), 0o555);
    assert_eq!(fs.stat("/assets/a.bin").unwrap().ino, id.get());
    assert_eq!(
        fs.create_data_file("/assets", Some("a.bin"), Vec::new(), true, true)
            .err(),
        Some(Errno::Exist)
    );

    fs.create_data_file("/assets/b.txt", None, b"bee".to_vec(), true, true)
        .unwrap();
    assert_eq!(fs.read_file("/assets/b.txt").unwrap(), b"bee");
}

#[test]
fn lazy_files_fetch_on_first_read() {
    let mut fs = new_fs();
    let fetch = || -> std::io::Result<Vec<u8>> { Ok(b"fetched".to_vec()) };
    fs.create_lazy_file("/", "lazy", fetch, true, false).unwrap();
    assert_eq!(fs.stat("/lazy").unwrap().size, 0);
    assert_eq!(fs.read_file("/lazy").unwrap(), b"fetched");
    assert_eq!(fs.stat("/lazy").unwrap().size, 7);

    let offline = || -> std::io::Result<Vec<u8>> { Err(std::io::Error::other("offline")) };
    fs.create_lazy_file("/", "broken", offline, true, false)
        .unwrap();
    assert_eq!(fs.read_file("/broken").err(), Some(Errno::Io));
}
