use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Lock held by the existence of an exclusively created lock file.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
    released: bool,
}

pub fn try_lock(path: &Path) -> io::Result<FileLock> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, err));
        }
        Err(err) => return Err(err),
    };
    Ok(FileLock {
        _file: file,
        path: path.to_path_buf(),
        released: false,
    })
}

impl FileLock {
    pub fn is_valid(&self) -> io::Result<bool> {
        Ok(!self.released && self.path.exists())
    }

    pub fn unlock(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

pub fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

pub fn open_for_sync(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).open(path)
}
