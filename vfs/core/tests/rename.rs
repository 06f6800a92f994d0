use memvfs_core::{Errno, Filesystem, FsConfig, LookupOptions, MemFs, MountOptions, OpenFlags};
use pretty_assertions::assert_eq;

fn new_fs() -> Filesystem {
    let mut fs = Filesystem::bare(FsConfig::default()).expect("bare filesystem");
    fs.mkdir_tree("/a/sub", 0o755).unwrap();
    fs.mkdir("/b", 0o755).unwrap();
    fs.write_file("/a/f", b"contents").unwrap();
    fs
}

#[test]
fn rename_within_a_directory() {
    let mut fs = new_fs();
    let before = fs.stat("/a/f").unwrap().ino;

    fs.rename("/a/f", "/a/g").unwrap();
    assert_eq!(fs.readdir("/a").unwrap(), vec![".", "..", "sub", "g"]);
    assert_eq!(fs.stat("/a/f").err(), Some(Errno::Noent));
    assert_eq!(fs.stat("/a/g").unwrap().ino, before);
    assert_eq!(fs.read_file("/a/g").unwrap(), b"contents");
}

#[test]
fn rename_across_directories() {
    let mut fs = new_fs();
    fs.rename("/a/f", "/b/f").unwrap();
    fs.rename("/a/sub", "/b/moved").unwrap();

    assert_eq!(fs.readdir("/a").unwrap(), vec![".", ".."]);
    assert_eq!(fs.readdir("/b").unwrap(), vec![".", "..", "f", "moved"]);
    assert_eq!(fs.realpath("/b/moved").unwrap(), "/b/moved");
}

#[test]
fn renaming_onto_itself_is_a_no_op() {
    let mut fs = new_fs();
    assert_eq!(fs.rename("/a/f", "/a/f"), Ok(()));
    assert_eq!(fs.rename("/a", "/a"), Ok(()));
    assert_eq!(fs.read_file("/a/f").unwrap(), b"contents");
}

#[test]
fn a_directory_cannot_move_below_itself() {
    let mut fs = new_fs();
    assert_eq!(fs.rename("/a", "/a/sub/inner"), Err(Errno::Inval));
    assert_eq!(fs.rename("/a", "/a/inner"), Err(Errno::Inval));
}

#[test]
fn an_ancestor_cannot_be_the_destination() {
    let mut fs = new_fs();
    fs.mkdir("/a/sub/x", 0o755).unwrap();
    assert_eq!(fs.rename("/a/sub/x", "/a"), Err(Errno::Notempty));
    assert_eq!(fs.rename("/a/sub/x", "/a/sub"), Err(Errno::Notempty));
}

#[test]
fn replacing_an_existing_target() {
    let mut fs = new_fs();
    fs.write_file("/b/old", b"old").unwrap();
    let nodes = fs.node_count();

    fs.rename("/a/f", "/b/old").unwrap();
    assert_eq!(fs.read_file("/b/old").unwrap(), b"contents");
    assert_eq!(fs.node_count(), nodes - 1);

    fs.mkdir("/b/empty", 0o755).unwrap();
    fs.rename("/a/sub", "/b/empty").unwrap();
    assert_eq!(fs.readdir("/a").unwrap(), vec![".", ".."]);
}

#[test]
fn target_type_must_match() {
    let mut fs = new_fs();
    fs.mkdir("/b/dir", 0o755).unwrap();
    fs.write_file("/b/file", b"").unwrap();

    assert_eq!(fs.rename("/a/f", "/b/dir"), Err(Errno::Isdir));
    assert_eq!(fs.rename("/a/sub", "/b/file"), Err(Errno::Notdir));

    fs.write_file("/b/dir/inside", b"").unwrap();
    fs.mkdir("/c", 0o755).unwrap();
    assert_eq!(fs.rename("/c", "/b/dir"), Err(Errno::Notempty));
}

#[test]
fn missing_paths() {
    let mut fs = new_fs();
    assert_eq!(fs.rename("/a/missing", "/b/x"), Err(Errno::Noent));
    assert_eq!(fs.rename("/a/f", "/nowhere/x"), Err(Errno::Noent));
    assert_eq!(fs.rename("/", "/b/root"), Err(Errno::Busy));
    assert_eq!(fs.rename("/a", "/"), Err(Errno::Busy));
}

#[test]
fn failures_leave_the_tree_untouched() {
    let mut fs = new_fs();
    fs.mkdir("/b/dir", 0o755).unwrap();
    let snapshot = (
        fs.node_count(),
        fs.indexed_names(),
        fs.readdir("/a").unwrap(),
        fs.readdir("/b").unwrap(),
    );

    assert!(fs.rename("/a/f", "/b/dir").is_err());
    assert!(fs.rename("/a", "/a/sub/x").is_err());
    assert!(fs.rename("/a/missing", "/b/x").is_err());

    assert_eq!(
        (
            fs.node_count(),
            fs.indexed_names(),
            fs.readdir("/a").unwrap(),
            fs.readdir("/b").unwrap(),
        ),
        snapshot
    );
}

#[test]
fn mounts_are_not_crossed_or_moved() {
    let mut fs = new_fs();
    fs.mkdir("/mnt", 0o755).unwrap();
    fs.mount(MemFs, MountOptions::default(), "/mnt").unwrap();
    fs.write_file("/mnt/inner", b"").unwrap();

    assert_eq!(fs.rename("/a/f", "/mnt/f"), Err(Errno::Xdev));
    assert_eq!(fs.rename("/mnt/inner", "/a/inner"), Err(Errno::Xdev));
    assert_eq!(fs.rename("/mnt", "/b/mnt"), Err(Errno::Busy));
    assert_eq!(fs.rename("/b", "/mnt"), Err(Errno::Busy));

    assert_eq!(fs.rename("/mnt/inner", "/mnt/renamed"), Ok(()));
}

#[test]
fn open_streams_follow_the_node() {
    let mut fs = new_fs();
    let fd = fs.open("/a/f", OpenFlags::RDWR, 0).unwrap();
    fs.rename("/a/f", "/b/g").unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(fs.read(fd, &mut buf), Ok(8));
    assert_eq!(&buf, b"contents");
    assert_eq!(fs.write(fd, b"!"), Ok(1));
    fs.close(fd).unwrap();
    assert_eq!(fs.read_file("/b/g").unwrap(), b"contents!");
}

#[test]
fn ancestry_compares_whole_components() {
    let mut fs = new_fs();
    fs.mkdir("/a/.hidden", 0o755).unwrap();
    assert_eq!(fs.rename("/a", "/a/.hidden/a"), Err(Errno::Inval));

    fs.rename("/a/sub", "/ab").unwrap();
    fs.rename("/ab", "/a/sub").unwrap();
    assert_eq!(fs.readdir("/a").unwrap(), vec![".", "..", "f", ".hidden", "sub"]);
}

#[test]
fn a_symlinked_destination_cannot_hide_a_cycle() {
    let mut fs = new_fs();
    fs.symlink("/a", "/l").unwrap();

    assert_eq!(fs.rename("/a", "/l/sub/moved"), Err(Errno::Inval));
    assert_eq!(fs.rename("/a", "/l/moved"), Err(Errno::Inval));
    assert_eq!(fs.rename("/a/sub", "/l/sub/../sub/x"), Err(Errno::Inval));
    assert!(fs.stat("/a").is_ok());
    assert_eq!(fs.realpath("/l/sub").unwrap(), "/a/sub");

    fs.mkdir("/a/sub/x", 0o755).unwrap();
    fs.symlink("/a/sub", "/s").unwrap();
    assert_eq!(fs.rename("/s/x", "/a"), Err(Errno::Notempty));
    assert!(fs.stat("/a/sub/x").is_ok());
}

#[test]
fn mountpoints_follow_a_renamed_ancestor() {
    let mut fs = new_fs();
    fs.mkdir("/a/m", 0o755).unwrap();
    let mount = fs.mount(MemFs, MountOptions::default(), "/a/m").unwrap();
    fs.write_file("/a/m/f", b"inner").unwrap();
    let file = fs.lookup_path("/a/m/f", LookupOptions::default()).unwrap().node;

    fs.rename("/a", "/c").unwrap();

    assert_eq!(fs.path_of(file).unwrap(), "/c/m/f");
    assert_eq!(fs.mount_info(mount).unwrap().mountpoint(), "/c/m");
    assert_eq!(fs.read_file("/c/m/f").unwrap(), b"inner");
    assert_eq!(fs.stat("/a/m/f").err(), Some(Errno::Noent));
}
