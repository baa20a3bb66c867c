use std::sync::Arc;
use std::time::Duration;

use vdir_core::{
    BaseDirectory, DirErrorKind, Directory, DirectoryConfig, LockLossPolicy, StorageBackendExt,
};
use vdir_remote::{MemoryObjectStore, RemoteStorage, RemoteStorageConfig, StoreOp};

fn remote_dir_with(
    store: &Arc<MemoryObjectStore>,
    config: RemoteStorageConfig,
    dir_config: DirectoryConfig,
) -> BaseDirectory<RemoteStorage> {
    RemoteStorage::new(store.clone(), config)
        .expect("remote storage")
        .into_directory(dir_config)
        .expect("remote directory")
}

fn remote_dir(store: &Arc<MemoryObjectStore>) -> BaseDirectory<RemoteStorage> {
    remote_dir_with(
        store,
        RemoteStorageConfig::new("indices/logs/0"),
        DirectoryConfig::default(),
    )
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
fn objects_are_uploaded_on_close() {
    let store = Arc::new(MemoryObjectStore::new());
    let dir = remote_dir(&store);

    let mut out = dir.create_output("_0.cfs").expect("create");
    out.write_bytes(b"remote bytes").expect("write");
    out.flush().expect("flush");
    assert!(dir.list_all().expect("list").is_empty());
    assert_eq!(
        dir.open_input("_0.cfs").expect_err("still writing").kind(),
        DirErrorKind::Busy
    );

    out.close().expect("upload");
    assert_eq!(dir.list_all().expect("list"), vec!["_0.cfs"]);
    assert_eq!(dir.file_length("_0.cfs").expect("length"), 12);
    assert_eq!(read_file(&dir, "_0.cfs"), b"remote bytes");
    assert_eq!(store.object_keys(), vec!["indices/logs/0/data/_0.cfs"]);
    dir.sync(&["_0.cfs"]).expect("sync");
    dir.sync_metadata().expect("sync metadata");
}

#[test]
fn directories_with_different_roots_are_isolated() {
    let store = Arc::new(MemoryObjectStore::new());
    let first = remote_dir(&store);
    let second = remote_dir_with(
        &store,
        RemoteStorageConfig::new("indices/logs/1"),
        DirectoryConfig::default(),
    );
    write_file(&first, "a", b"1");
    assert!(second.list_all().expect("list").is_empty());
    write_file(&second, "a", b"2");
    assert_eq!(read_file(&first, "a"), b"1");
}

#[test]
fn concurrent_creators_conflict_on_upload() {
    let store = Arc::new(MemoryObjectStore::new());
    let first = remote_dir(&store);
    let second = remote_dir(&store);

    let mut a = first.create_output("segments_1").expect("create");
    let mut b = second.create_output("segments_1").expect("create");
    a.write_bytes(b"first").expect("write");
    b.write_bytes(b"second").expect("write");
    a.close().expect("first upload wins");
    assert_eq!(
        b.close().expect_err("second upload").kind(),
        DirErrorKind::AlreadyExists
    );
    assert_eq!(read_file(&second, "segments_1"), b"first");
}

#[test]
fn rename_copies_then_deletes() {
    let store = Arc::new(MemoryObjectStore::new());
    let dir = remote_dir(&store);
    write_file(&dir, "pending_segments_1", b"commit");
    write_file(&dir, "segments_1", b"old");

    dir.rename("pending_segments_1", "segments_1").expect("rename");
    assert_eq!(dir.list_all().expect("list"), vec!["segments_1"]);
    assert_eq!(read_file(&dir, "segments_1"), b"commit");
}

#[test]
fn rename_onto_itself_keeps_the_object() {
    let store = Arc::new(MemoryObjectStore::new());
    let dir = remote_dir(&store);
    write_file(&dir, "a", b"payload");

    dir.rename("a", "a").expect("self rename");
    assert_eq!(dir.list_all().expect("list"), vec!["a"]);
    assert_eq!(read_file(&dir, "a"), b"payload");
    assert_eq!(store.object_keys(), vec!["indices/logs/0/data/a"]);
}

#[test_log::test]
fn rename_completes_when_source_cleanup_fails() {
    let store = Arc::new(MemoryObjectStore::new());
    let dir = remote_dir(&store);
    write_file(&dir, "pending_segments_1", b"commit");

    store.fail_operation(StoreOp::Delete, true);
    dir.rename("pending_segments_1", "segments_1")
        .expect("copy committed the rename");
    assert_eq!(dir.list_all().expect("list"), vec!["segments_1"]);
    assert_eq!(read_file(&dir, "segments_1"), b"commit");
    assert!(
        dir.pending_deletions()
            .expect("pending")
            .contains("pending_segments_1")
    );
    assert_eq!(store.object_keys().len(), 2);

    store.fail_operation(StoreOp::Delete, false);
    let report = dir.delete_pending_files().expect("sweep");
    assert_eq!(report.deleted, vec!["pending_segments_1"]);
    assert_eq!(
        store.object_keys(),
        vec!["indices/logs/0/data/segments_1"]
    );
}

#[test]
fn rename_onto_file_being_written_wins_over_the_writer() {
    let store = Arc::new(MemoryObjectStore::new());
    let dir = remote_dir(&store);
    write_file(&dir, "a", b"renamed");

    let mut writer = dir.create_output("b").expect("create");
    writer.write_bytes(b"late").expect("write");
    dir.rename("a", "b").expect("rename");

    assert_eq!(
        writer.close().expect_err("dest already exists").kind(),
        DirErrorKind::AlreadyExists
    );
    assert_eq!(dir.list_all().expect("list"), vec!["b"]);
    assert_eq!(read_file(&dir, "b"), b"renamed");
}

#[test]
fn downloaded_input_survives_deletion() {
    let store = Arc::new(MemoryObjectStore::new());
    let dir = remote_dir(&store);
    write_file(&dir, "a", b"abc");

    let mut input = dir.open_input("a").expect("open");
    dir.delete_file("a").expect("deferred");
    assert_eq!(store.object_keys().len(), 1);

    let mut buf = [0u8; 3];
    input.read_bytes(&mut buf).expect("read");
    assert_eq!(&buf, b"abc");
    input.close().expect("close");

    dir.delete_pending_files().expect("sweep");
    assert!(store.object_keys().is_empty());
}

#[test_log::test]
fn slow_store_times_out() {
    let store = Arc::new(MemoryObjectStore::new());
    let mut config = RemoteStorageConfig::new("slow");
    config.op_timeout = Duration::from_millis(50);
    let dir = remote_dir_with(&store, config, DirectoryConfig::default());
    write_file(&dir, "a", b"1");

    store.set_latency(Duration::from_millis(500));
    let err = dir.list_all().expect_err("timeout");
    assert_eq!(err.kind(), DirErrorKind::TimedOut);
    assert!(err.is_io_failure());
    assert!(err.is_timeout());

    store.set_latency(Duration::ZERO);
    assert_eq!(dir.list_all().expect("list"), vec!["a"]);
}

#[test]
fn outages_surface_as_io_failures() {
    let store = Arc::new(MemoryObjectStore::new());
    let dir = remote_dir(&store);
    store.set_unavailable(true);
    let err = dir.file_length("a").expect_err("outage");
    assert_eq!(err.kind(), DirErrorKind::Io);
    assert!(!err.is_timeout());
    store.set_unavailable(false);
}

#[test]
fn lease_excludes_other_instances() {
    let store = Arc::new(MemoryObjectStore::new());
    let first = remote_dir(&store);
    let second = remote_dir(&store);

    let mut lock = first.obtain_lock("write.lock").expect("lock");
    assert_eq!(
        store.object_keys(),
        vec!["indices/logs/0/locks/write.lock"]
    );
    assert_eq!(
        second.obtain_lock("write.lock").expect_err("held").kind(),
        DirErrorKind::LockHeld
    );
    lock.ensure_valid().expect("renew");

    lock.close().expect("release");
    assert!(store.object_keys().is_empty());
    second.obtain_lock("write.lock").expect("lock after release");
}

#[test_log::test]
fn expired_lease_is_taken_over() {
    let store = Arc::new(MemoryObjectStore::new());
    let mut config = RemoteStorageConfig::new("indices/logs/0");
    config.lease_duration = Duration::from_millis(50);
    let first = remote_dir_with(&store, config.clone(), DirectoryConfig::default());
    let second = remote_dir_with(&store, config, DirectoryConfig::default());

    let lock = first.obtain_lock("write.lock").expect("lock");
    std::thread::sleep(Duration::from_millis(150));

    let _taken = second.obtain_lock("write.lock").expect("steal expired lease");
    assert_eq!(
        lock.ensure_valid().expect_err("taken over").kind(),
        DirErrorKind::LockLost
    );
    assert!(lock.is_stale());

    // releasing the old lock leaves the new holder's lease alone
    drop(lock);
    assert_eq!(
        store.object_keys(),
        vec!["indices/logs/0/locks/write.lock"]
    );
}

#[test_log::test]
fn lost_lease_aborts_writes() {
    let store = Arc::new(MemoryObjectStore::new());
    let dir = remote_dir_with(
        &store,
        RemoteStorageConfig::new("indices/logs/0"),
        DirectoryConfig {
            lock_loss_policy: LockLossPolicy::AbortWrites,
            ..Default::default()
        },
    );
    let lock = dir.obtain_lock("write.lock").expect("lock");
    write_file(&dir, "a", b"1");

    store.insert_raw(
        "indices/logs/0/locks/write.lock",
        r#"{"token":"intruder","expires_at_ms":99999999999999}"#,
    );
    let err = dir.create_output("b").expect_err("lock lost");
    assert_eq!(err.kind(), DirErrorKind::LockLost);
    assert_eq!(
        dir.delete_file("a").expect_err("lock lost").kind(),
        DirErrorKind::LockLost
    );
    assert!(lock.is_stale());
    assert_eq!(read_file(&dir, "a"), b"1");
}

#[test]
fn invalid_config_is_rejected() {
    let store: Arc<MemoryObjectStore> = Arc::new(MemoryObjectStore::new());
    for root in ["", "/abs", "trailing/"] {
        let err = RemoteStorage::new(store.clone(), RemoteStorageConfig::new(root))
            .expect_err("invalid root");
        assert_eq!(err.kind(), DirErrorKind::InvalidInput);
    }
    let mut config = RemoteStorageConfig::new("ok");
    config.io_threads = 0;
    assert_eq!(
        RemoteStorage::new(store, config)
            .expect_err("no threads")
            .kind(),
        DirErrorKind::InvalidInput
    );
}
