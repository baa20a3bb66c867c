use std::fs;

use vdir_core::{
    BackendCapabilities, BaseDirectory, DirErrorKind, Directory, DirectoryConfig,
    StorageBackendExt,
};
use vdir_host::{HostStorage, HostStorageConfig};

fn host_dir(root: &std::path::Path) -> BaseDirectory<HostStorage> {
    HostStorage::new(HostStorageConfig::new(root))
        .expect("host storage")
        .into_directory(DirectoryConfig::default())
        .expect("host directory")
}

fn write_file(dir: &dyn Directory, name: &str, data: &[u8]) {
    let mut out = dir.create_output(name).expect("create output");
    out.write_bytes(data).expect("write");
    out.close().expect("close output");
}

fn read_file(dir: &dyn Directory, name: &str) -> Vec<u8> {
    let mut input = dir.open_input(name).expect("open input");
    let mut buf = vec![0u8; input.length() as usize];
    input.read_bytes(&mut buf).expect("read");
    buf
}

#[test_log::test]
fn files_survive_reopening_the_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    {
        let dir = host_dir(temp.path());
        write_file(&dir, "_0.cfs", b"segment bytes");
        dir.sync(&["_0.cfs"]).expect("sync");
        dir.sync_metadata().expect("sync metadata");
        dir.close().expect("close");
    }

    let dir = host_dir(temp.path());
    assert_eq!(dir.list_all().expect("list"), vec!["_0.cfs"]);
    assert_eq!(dir.file_length("_0.cfs").expect("length"), 13);
    assert_eq!(read_file(&dir, "_0.cfs"), b"segment bytes");
    assert_eq!(
        fs::read(temp.path().join("_0.cfs")).expect("raw read"),
        b"segment bytes"
    );
}

#[test]
fn listing_skips_subdirectories() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir(temp.path().join("nested")).expect("mkdir");
    let dir = host_dir(temp.path());
    write_file(&dir, "b", b"1");
    write_file(&dir, "a", b"2");
    assert_eq!(dir.list_all().expect("list"), vec!["a", "b"]);
}

#[test]
fn create_is_exclusive() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = host_dir(temp.path());
    write_file(&dir, "a", b"1");
    assert_eq!(
        dir.create_output("a").expect_err("exists").kind(),
        DirErrorKind::AlreadyExists
    );
}

#[test]
fn reads_while_writing_see_flushed_bytes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = host_dir(temp.path());
    assert!(
        dir.capabilities()
            .contains(BackendCapabilities::READ_WHILE_WRITING)
    );
    let mut out = dir.create_output("a").expect("create");
    out.write_bytes(b"abc").expect("write");
    out.flush().expect("flush");

    let mut input = dir.open_input("a").expect("open while writing");
    assert_eq!(input.length(), 3);
    let mut buf = [0u8; 3];
    input.read_bytes(&mut buf).expect("read");
    assert_eq!(&buf, b"abc");
    out.close().expect("close");
}

#[test]
fn rename_replaces_dest() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = host_dir(temp.path());
    write_file(&dir, "pending_segments_2", b"new");
    write_file(&dir, "segments_2", b"old");
    dir.rename("pending_segments_2", "segments_2").expect("rename");
    assert_eq!(dir.list_all().expect("list"), vec!["segments_2"]);
    assert_eq!(read_file(&dir, "segments_2"), b"new");
}

#[test]
fn deleted_open_file_stays_readable_until_closed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = host_dir(temp.path());
    write_file(&dir, "a", b"hello");

    let mut input = dir.open_input("a").expect("open");
    dir.delete_file("a").expect("deferred delete");
    assert!(dir.pending_deletions().expect("pending").contains("a"));
    assert!(dir.list_all().expect("list").is_empty());
    assert!(temp.path().join("a").exists());

    let mut buf = [0u8; 5];
    input.read_bytes(&mut buf).expect("read");
    assert_eq!(&buf, b"hello");
    input.close().expect("close");

    let report = dir.delete_pending_files().expect("sweep");
    assert_eq!(report.deleted, vec!["a".to_string()]);
    assert!(!temp.path().join("a").exists());
}

#[test]
fn lock_excludes_a_second_instance() {
    let temp = tempfile::tempdir().expect("tempdir");
    let first = host_dir(temp.path());
    let second = host_dir(temp.path());

    let mut lock = first.obtain_lock("write.lock").expect("lock");
    let err = second.obtain_lock("write.lock").expect_err("held");
    assert_eq!(err.kind(), DirErrorKind::LockHeld);

    lock.close().expect("release");
    second
        .obtain_lock("write.lock")
        .expect("lock after release");
}

#[test]
fn replaced_lock_file_is_detected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = host_dir(temp.path());
    let lock = dir.obtain_lock("write.lock").expect("lock");
    lock.ensure_valid().expect("valid");

    let path = temp.path().join("write.lock");
    fs::remove_file(&path).expect("remove lock file");
    assert_eq!(
        lock.ensure_valid().expect_err("removed").kind(),
        DirErrorKind::LockLost
    );
    assert!(lock.is_stale());
}

#[test]
fn close_releases_locks() {
    let temp = tempfile::tempdir().expect("tempdir");
    let first = host_dir(temp.path());
    let _lock = first.obtain_lock("write.lock").expect("lock");
    first.close().expect("close");

    let second = host_dir(temp.path());
    second.obtain_lock("write.lock").expect("lock after close");
}

#[test]
fn missing_root_without_create_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut config = HostStorageConfig::new(temp.path().join("missing"));
    config.create = false;
    let err = HostStorage::new(config).expect_err("missing root");
    assert_eq!(err.kind(), DirErrorKind::NotFound);
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = HostStorageConfig::new("/tmp");
    config.write_buffer_size = 0;
    assert_eq!(
        HostStorage::new(config).expect_err("invalid").kind(),
        DirErrorKind::InvalidInput
    );
}

#[test]
fn copy_between_directories() {
    let source_root = tempfile::tempdir().expect("tempdir");
    let dest_root = tempfile::tempdir().expect("tempdir");
    let source = host_dir(source_root.path());
    let dest = host_dir(dest_root.path());
    write_file(&source, "a", b"copy me");
    dest.copy_from(&source, "a", "b").expect("copy");
    assert_eq!(read_file(&dest, "b"), b"copy me");
}
