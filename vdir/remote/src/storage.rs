use std::fmt;
use std::sync::Arc;

use vdir_core::{
    BackendCapabilities, BackendLock, DirError, DirErrorKind, DirResult, InputSource,
    OutputSink, RenameOutcome, StorageBackend,
};

use crate::config::RemoteStorageConfig;
use crate::executor::Executor;
use crate::handle::{RemoteInput, RemoteOutput};
use crate::lease::RemoteLock;
use crate::ObjectStore;

/// A directory rooted at a key prefix of an [`ObjectStore`].
pub struct RemoteStorage {
    store: Arc<dyn ObjectStore>,
    config: RemoteStorageConfig,
    exec: Executor,
}

impl RemoteStorage {
    pub fn new(store: Arc<dyn ObjectStore>, config: RemoteStorageConfig) -> DirResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.io_threads)
            .thread_name("vdir-remote-io")
            .enable_time()
            .build()
            .map_err(|err| DirError::from_io("remote.runtime", err))?;
        let exec = Executor::new(runtime, config.op_timeout);
        Ok(Self {
            store,
            config,
            exec,
        })
    }

    pub fn config(&self) -> &RemoteStorageConfig {
        &self.config
    }

    fn data_prefix(&self) -> String {
        format!("{}/data/", self.config.root)
    }

    fn data_key(&self, name: &str) -> String {
        format!("{}/data/{name}", self.config.root)
    }

    fn lock_key(&self, name: &str) -> String {
        format!("{}/locks/{name}", self.config.root)
    }
}

impl StorageBackend for RemoteStorage {
    fn kind(&self) -> &'static str {
        "remote"
    }

    fn location(&self) -> String {
        self.config.root.clone()
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::empty()
    }

    fn list(&self) -> DirResult<Vec<String>> {
        let prefix = self.data_prefix();
        let objects = self.exec.block("remote.list", self.store.list(&prefix))?;
        Ok(objects
            .into_iter()
            .filter_map(|meta| {
                let name = meta.key.strip_prefix(&prefix)?;
                (!name.is_empty() && !name.contains('/')).then(|| name.to_string())
            })
            .collect())
    }

    fn exists(&self, name: &str) -> DirResult<bool> {
        match self
            .exec
            .block("remote.exists", self.store.head(&self.data_key(name)))
        {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == DirErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn len(&self, name: &str) -> DirResult<u64> {
        let meta = self
            .exec
            .block("remote.len", self.store.head(&self.data_key(name)))
            .map_err(|err| err.detail_with(name))?;
        Ok(meta.size)
    }

    fn create(&self, name: &str) -> DirResult<Box<dyn OutputSink>> {
        Ok(Box::new(RemoteOutput {
            exec: self.exec.clone(),
            store: self.store.clone(),
            key: self.data_key(name),
            name: name.to_string(),
            buffer: Vec::new(),
        }))
    }

    fn open(&self, name: &str) -> DirResult<Arc<dyn InputSource>> {
        let (_, data) = self
            .exec
            .block("remote.download", self.store.get(&self.data_key(name)))
            .map_err(|err| err.detail_with(name))?;
        tracing::trace!(%name, size = data.len(), "downloaded object");
        Ok(Arc::new(RemoteInput { data }))
    }

    fn remove(&self, name: &str) -> DirResult<()> {
        self.exec
            .block("remote.remove", self.store.delete(&self.data_key(name)))
            .map_err(|err| err.detail_with(name))
    }

    /// Copy then delete: after a crash both names may exist, never neither,
    /// and `dest` is always complete. The rename is committed by the copy; a
    /// failed delete leaves `source` for the directory to remove later.
    fn rename(&self, source: &str, dest: &str) -> DirResult<RenameOutcome> {
        let source_key = self.data_key(source);
        self.exec
            .block(
                "remote.rename.copy",
                self.store.copy(&source_key, &self.data_key(dest)),
            )
            .map_err(|err| err.detail_with(source))?;
        match self
            .exec
            .block("remote.rename.delete", self.store.delete(&source_key))
        {
            Err(err) if err.kind() != DirErrorKind::NotFound => {
                Ok(RenameOutcome::SourceRetained(err.to_string()))
            }
            _ => Ok(RenameOutcome::Moved),
        }
    }

    /// Uploaded objects are already durable; only checks existence.
    fn sync(&self, name: &str) -> DirResult<()> {
        self.exec
            .block("remote.sync", self.store.head(&self.data_key(name)))
            .map(drop)
            .map_err(|err| err.detail_with(name))
    }

    fn sync_metadata(&self) -> DirResult<()> {
        Ok(())
    }

    fn lock(&self, name: &str) -> DirResult<Box<dyn BackendLock>> {
        let lock = RemoteLock::acquire(
            self.exec.clone(),
            self.store.clone(),
            self.lock_key(name),
            name,
            self.config.lease_duration,
        )?;
        Ok(Box::new(lock))
    }
}

impl fmt::Debug for RemoteStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStorage")
            .field("root", &self.config.root)
            .field("op_timeout", &self.config.op_timeout)
            .finish()
    }
}
