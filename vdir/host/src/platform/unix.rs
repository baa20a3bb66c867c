use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// An exclusive `flock` on a lock file.
///
/// `flock` locks belong to the open file description, so a second open of
/// the same file conflicts even inside this process.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    dev: u64,
    ino: u64,
}

pub fn try_lock(path: &Path) -> io::Result<FileLock> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if res < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, err));
        }
        return Err(err);
    }
    let meta = file.metadata()?;
    Ok(FileLock {
        file,
        path: path.to_path_buf(),
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

impl FileLock {
    /// False once the lock file was removed or replaced by another file.
    pub fn is_valid(&self) -> io::Result<bool> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.dev() == self.dev && meta.ino() == self.ino),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn unlock(&mut self) -> io::Result<()> {
        let res = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

pub fn sync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

pub fn open_for_sync(path: &Path) -> io::Result<File> {
    File::open(path)
}
