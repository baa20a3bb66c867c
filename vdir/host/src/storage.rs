use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use vdir_core::{
    BackendCapabilities, BackendLock, DirError, DirErrorKind, DirResult, InputSource,
    OutputSink, RenameOutcome, StorageBackend,
};

use crate::config::HostStorageConfig;
use crate::handle::{HostInput, HostOutput};
use crate::platform::{self, FileLock};

/// Files stored directly inside one directory of the local filesystem.
#[derive(Debug)]
pub struct HostStorage {
    root: PathBuf,
    config: HostStorageConfig,
}

impl HostStorage {
    pub fn new(config: HostStorageConfig) -> DirResult<Self> {
        config.validate()?;
        if config.create {
            crate::io_result("host.new.create_dir", fs::create_dir_all(&config.root))?;
        }
        let root = crate::io_result("host.new.canonicalize", fs::canonicalize(&config.root))?;
        let meta = crate::io_result("host.new.stat", fs::metadata(&root))?;
        if !meta.is_dir() {
            return Err(DirError::with_detail(
                DirErrorKind::InvalidInput,
                "host.new",
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl StorageBackend for HostStorage {
    fn kind(&self) -> &'static str {
        "host"
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::READ_WHILE_WRITING
    }

    fn list(&self) -> DirResult<Vec<String>> {
        let entries = crate::io_result("host.list", fs::read_dir(&self.root))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = crate::io_result("host.list.entry", entry)?;
            let file_type = crate::io_result("host.list.file_type", entry.file_type())?;
            if !file_type.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::debug!(name = ?raw, "skipping non UTF-8 file name"),
            }
        }
        Ok(names)
    }

    fn exists(&self, name: &str) -> DirResult<bool> {
        match fs::symlink_metadata(self.path(name)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(crate::map_io_error("host.exists", err)),
        }
    }

    fn len(&self, name: &str) -> DirResult<u64> {
        let meta = crate::io_result("host.len", fs::metadata(self.path(name)))
            .map_err(|err| err.detail_with(name))?;
        Ok(meta.len())
    }

    fn create(&self, name: &str) -> DirResult<Box<dyn OutputSink>> {
        let file = crate::io_result(
            "host.create",
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.path(name)),
        )
        .map_err(|err| err.detail_with(name))?;
        Ok(Box::new(HostOutput::new(
            name,
            file,
            self.config.write_buffer_size,
        )))
    }

    fn open(&self, name: &str) -> DirResult<Arc<dyn InputSource>> {
        let file = crate::io_result("host.open", fs::File::open(self.path(name)))
            .map_err(|err| err.detail_with(name))?;
        Ok(Arc::new(HostInput::new(file)?))
    }

    fn remove(&self, name: &str) -> DirResult<()> {
        crate::io_result("host.remove", fs::remove_file(self.path(name)))
            .map_err(|err| err.detail_with(name))
    }

    fn rename(&self, source: &str, dest: &str) -> DirResult<RenameOutcome> {
        crate::io_result(
            "host.rename",
            fs::rename(self.path(source), self.path(dest)),
        )
        .map(|()| RenameOutcome::Moved)
        .map_err(|err| err.detail_with(source))
    }

    fn sync(&self, name: &str) -> DirResult<()> {
        let file = crate::io_result("host.sync.open", platform::open_for_sync(&self.path(name)))
            .map_err(|err| err.detail_with(name))?;
        crate::io_result("host.sync", file.sync_all())
    }

    fn sync_metadata(&self) -> DirResult<()> {
        if !self.config.fsync_directory {
            return Ok(());
        }
        crate::io_result("host.sync_metadata", platform::sync_dir(&self.root))
    }

    fn lock(&self, name: &str) -> DirResult<Box<dyn BackendLock>> {
        match platform::try_lock(&self.path(name)) {
            Ok(lock) => Ok(Box::new(HostLock {
                name: name.to_string(),
                lock,
            })),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Err(DirError::with_source(
                DirErrorKind::LockHeld,
                "host.lock",
                err,
            )
            .detail_with(name)),
            Err(err) => Err(crate::map_io_error("host.lock", err).detail_with(name)),
        }
    }
}

struct HostLock {
    name: String,
    lock: FileLock,
}

impl BackendLock for HostLock {
    fn ensure_valid(&self) -> DirResult<()> {
        if crate::io_result("host.lock.validate", self.lock.is_valid())? {
            Ok(())
        } else {
            Err(DirError::with_detail(
                DirErrorKind::LockLost,
                "host.lock.validate",
                format!("{} was removed or replaced", self.name),
            ))
        }
    }

    fn release(&mut self) -> DirResult<()> {
        crate::io_result("host.lock.release", self.lock.unlock())
    }
}
