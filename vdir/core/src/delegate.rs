//! A directory tagged with the owner it belongs to.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::{DirResult, Directory, DirectoryLock, IndexInput, IndexOutput, SweepReport};

/// Forwards every operation to `inner` unchanged and remembers which owner
/// the directory was created for.
pub struct DelegatingDirectory<K> {
    owner: K,
    inner: Arc<dyn Directory>,
}

impl<K> DelegatingDirectory<K> {
    pub fn new(owner: K, inner: Arc<dyn Directory>) -> Self {
        Self { owner, inner }
    }

    pub fn owner_key(&self) -> &K {
        &self.owner
    }

    pub fn inner(&self) -> &Arc<dyn Directory> {
        &self.inner
    }
}

impl<K> Directory for DelegatingDirectory<K>
where
    K: fmt::Debug + Send + Sync + 'static,
{
    fn list_all(&self) -> DirResult<Vec<String>> {
        self.inner.list_all()
    }

    fn file_length(&self, name: &str) -> DirResult<u64> {
        self.inner.file_length(name)
    }

    fn create_output(&self, name: &str) -> DirResult<IndexOutput> {
        self.inner.create_output(name)
    }

    fn create_temp_output(&self, prefix: &str, suffix: &str) -> DirResult<IndexOutput> {
        self.inner.create_temp_output(prefix, suffix)
    }

    fn open_input(&self, name: &str) -> DirResult<IndexInput> {
        self.inner.open_input(name)
    }

    fn delete_file(&self, name: &str) -> DirResult<()> {
        self.inner.delete_file(name)
    }

    fn rename(&self, source: &str, dest: &str) -> DirResult<()> {
        self.inner.rename(source, dest)
    }

    fn sync(&self, names: &[&str]) -> DirResult<()> {
        self.inner.sync(names)
    }

    fn sync_metadata(&self) -> DirResult<()> {
        self.inner.sync_metadata()
    }

    fn obtain_lock(&self, name: &str) -> DirResult<DirectoryLock> {
        self.inner.obtain_lock(name)
    }

    fn pending_deletions(&self) -> DirResult<BTreeSet<String>> {
        self.inner.pending_deletions()
    }

    fn delete_pending_files(&self) -> DirResult<SweepReport> {
        self.inner.delete_pending_files()
    }

    fn close(&self) -> DirResult<()> {
        self.inner.close()
    }

    fn copy_from(&self, from: &dyn Directory, src: &str, dest: &str) -> DirResult<()> {
        self.inner.copy_from(from, src, dest)
    }
}

impl<K: fmt::Debug> fmt::Debug for DelegatingDirectory<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatingDirectory")
            .field("owner", &self.owner)
            .field("inner", &self.inner)
            .finish()
    }
}

impl<K: fmt::Display> fmt::Display for DelegatingDirectory<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.owner, self.inner)
    }
}
