use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use vdir_core::{DirErrorKind, Directory, DirectoryConfig, StorageBackendExt};
use vdir_mem::MemStorage;

fn shared_dir() -> Arc<dyn Directory> {
    Arc::new(
        MemStorage::new()
            .into_directory(DirectoryConfig::default())
            .expect("mem directory"),
    )
}

#[test]
fn only_one_thread_wins_the_lock() {
    let dir = shared_dir();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let dir = dir.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                dir.obtain_lock("write.lock")
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.join().expect("thread") {
            Ok(lock) => winners.push(lock),
            Err(err) => assert_eq!(err.kind(), DirErrorKind::LockHeld),
        }
    }
    assert_eq!(winners.len(), 1);
}

#[test]
fn listings_never_see_both_or_neither_name() {
    let dir = shared_dir();
    let mut out = dir.create_output("a").expect("create");
    out.write_bytes(b"payload").expect("write");
    out.close().expect("close");

    let stop = Arc::new(AtomicBool::new(false));
    let renamer = {
        let dir = dir.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            for i in 0..500 {
                let (from, to) = if i % 2 == 0 { ("a", "b") } else { ("b", "a") };
                dir.rename(from, to).expect("rename");
            }
            stop.store(true, Ordering::SeqCst);
        })
    };

    while !stop.load(Ordering::SeqCst) {
        let names = dir.list_all().expect("list");
        assert_eq!(names.len(), 1, "saw {names:?}");
    }
    renamer.join().expect("renamer");
}

#[test]
fn concurrent_temp_outputs_do_not_collide() {
    let dir = shared_dir();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let dir = dir.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let mut out = dir.create_temp_output("merge", ".tmp").expect("temp");
                    out.write_byte(t).expect("write");
                    out.close().expect("close");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }
    assert_eq!(dir.list_all().expect("list").len(), 100);
}

#[test]
fn readers_and_deleters_race_safely() {
    let dir = shared_dir();
    for i in 0..20 {
        let mut out = dir.create_output(&format!("f{i}")).expect("create");
        out.write_bytes(&[i as u8; 16]).expect("write");
        out.close().expect("close");
    }

    let reader = {
        let dir = dir.clone();
        thread::spawn(move || {
            for i in 0..20 {
                match dir.open_input(&format!("f{i}")) {
                    Ok(mut input) => {
                        let mut buf = [0u8; 16];
                        input.read_bytes(&mut buf).expect("read open handle");
                        assert_eq!(buf, [i as u8; 16]);
                    }
                    Err(err) => assert_eq!(err.kind(), DirErrorKind::NotFound),
                }
            }
        })
    };
    for i in 0..20 {
        dir.delete_file(&format!("f{i}")).expect("delete");
    }
    reader.join().expect("reader");

    dir.delete_pending_files().expect("sweep");
    assert!(dir.pending_deletions().expect("pending").is_empty());
    assert!(dir.list_all().expect("list").is_empty());
}

#[test]
fn handles_opened_while_closing_are_revoked() {
    let dir = shared_dir();
    let mut seed = dir.create_output("seed").expect("create");
    seed.write_bytes(b"seed").expect("write");
    seed.close().expect("close");

    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads + 1));
    let workers: Vec<_> = (0..threads)
        .map(|t| {
            let dir = dir.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut outputs = Vec::new();
                let mut inputs = Vec::new();
                for n in 0.. {
                    match dir.create_output(&format!("t{t}_{n}")) {
                        Ok(out) => outputs.push(out),
                        Err(err) => {
                            assert_eq!(err.kind(), DirErrorKind::Closed);
                            break;
                        }
                    }
                    match dir.open_input("seed") {
                        Ok(input) => inputs.push(input),
                        Err(err) => {
                            assert_eq!(err.kind(), DirErrorKind::Closed);
                            break;
                        }
                    }
                }
                (outputs, inputs)
            })
        })
        .collect();

    barrier.wait();
    thread::sleep(Duration::from_millis(5));
    dir.close().expect("close");

    for worker in workers {
        let (outputs, inputs) = worker.join().expect("worker");
        for mut out in outputs {
            assert_eq!(
                out.write_byte(1).expect_err("revoked").kind(),
                DirErrorKind::Closed
            );
        }
        for mut input in inputs {
            assert_eq!(
                input.read_byte().expect_err("revoked").kind(),
                DirErrorKind::Closed
            );
        }
    }
}
