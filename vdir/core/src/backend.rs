//! Backend traits implemented once per physical medium.
//!
//! A backend only knows how to move bytes and names around. Handle
//! bookkeeping, deferred deletion, lock exclusivity inside the process and
//! name validation live in [`crate::BaseDirectory`], which turns any backend
//! into a full [`crate::Directory`].

use crate::{BaseDirectory, DirResult, DirectoryConfig};
use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BackendCapabilities: u32 {
        /// A file may be opened for reading while its writer is still open.
        const READ_WHILE_WRITING = 1 << 0;
        /// `create` replaces an existing file instead of failing.
        const OVERWRITE = 1 << 1;
    }
}

/// Write side of one file. Bytes are only ever appended.
pub trait OutputSink: Send {
    fn write_all(&mut self, buf: &[u8]) -> DirResult<()>;

    /// Push buffered bytes to the backend. Durability still requires a sync.
    fn flush(&mut self) -> DirResult<()>;

    /// Finish the file. Called at most once.
    fn close(&mut self) -> DirResult<()>;
}

/// Read side of one file, shared by every cursor opened over it.
pub trait InputSource: Send + Sync {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads up to `buf.len()` bytes at `offset`. Returns 0 only at the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> DirResult<usize>;
}

/// Backend half of a directory lock.
pub trait BackendLock: Send + Sync {
    /// Fails with `LockLost` if the backend no longer considers us the holder.
    fn ensure_valid(&self) -> DirResult<()>;

    fn release(&mut self) -> DirResult<()>;
}

/// Lock for backends whose directories cannot be shared outside the process.
#[derive(Debug, Default)]
pub struct ProcessLocalLock;

impl BackendLock for ProcessLocalLock {
    fn ensure_valid(&self) -> DirResult<()> {
        Ok(())
    }

    fn release(&mut self) -> DirResult<()> {
        Ok(())
    }
}

pub trait StorageBackend: Send + Sync + 'static {
    /// Short backend tag used in logs, e.g. `"host"`.
    fn kind(&self) -> &'static str;

    /// Backend specific description of the directory root.
    fn location(&self) -> String;

    fn capabilities(&self) -> BackendCapabilities;

    /// Every file name currently stored, in any order.
    fn list(&self) -> DirResult<Vec<String>>;

    fn exists(&self, name: &str) -> DirResult<bool>;

    fn len(&self, name: &str) -> DirResult<u64>;

    /// Creates `name`. Fails with `AlreadyExists` unless the backend
    /// advertises [`BackendCapabilities::OVERWRITE`].
    fn create(&self, name: &str) -> DirResult<Box<dyn OutputSink>>;

    fn open(&self, name: &str) -> DirResult<std::sync::Arc<dyn InputSource>>;

    /// Removes `name`. A backend that cannot remove the file right now
    /// reports `Busy`; the directory then defers the deletion.
    fn remove(&self, name: &str) -> DirResult<()>;

    /// Atomically moves `source` over `dest`. Once `dest` holds the new
    /// bytes the rename counts as done, even if `source` could not be
    /// removed afterwards.
    fn rename(&self, source: &str, dest: &str) -> DirResult<RenameOutcome>;

    fn sync(&self, name: &str) -> DirResult<()>;

    fn sync_metadata(&self) -> DirResult<()>;

    /// Takes the backend side of a lock. Exclusivity inside one directory
    /// instance is already guaranteed by the caller.
    fn lock(&self, name: &str) -> DirResult<Box<dyn BackendLock>>;

    fn close(&self) -> DirResult<()> {
        Ok(())
    }
}

/// Result of a backend rename that reached `dest`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenameOutcome {
    Moved,
    /// `dest` is complete but `source` is still present; the directory
    /// deletes it later.
    SourceRetained(String),
}

pub trait StorageBackendExt: StorageBackend + Sized {
    fn into_directory(self, config: DirectoryConfig) -> DirResult<BaseDirectory<Self>> {
        BaseDirectory::new(self, config)
    }
}

impl<B: StorageBackend> StorageBackendExt for B {}
