use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use vdir_core::{
    BackendCapabilities, BackendLock, DirError, DirErrorKind, DirResult, InputSource,
    OutputSink, RenameOutcome, StorageBackend,
};

use crate::MemStorageConfig;
use crate::handle::{MemInput, MemOutput};

pub(crate) struct MemEntry {
    /// Distinguishes a file from a later file created under the same name.
    pub(crate) id: u64,
    pub(crate) data: Bytes,
}

#[derive(Default)]
pub(crate) struct MemState {
    pub(crate) files: BTreeMap<String, MemEntry>,
    locks: HashMap<String, u64>,
    next_id: u64,
}

impl MemState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn used_bytes_except(&self, name: &str) -> u64 {
        self.files
            .iter()
            .filter(|(other, _)| other.as_str() != name)
            .map(|(_, entry)| entry.data.len() as u64)
            .sum()
    }
}

pub(crate) type SharedState = Arc<Mutex<MemState>>;

/// In-memory storage. Clones share the same files and locks, so two
/// directories built from clones behave like two instances on one root.
#[derive(Clone)]
pub struct MemStorage {
    state: SharedState,
    config: Arc<MemStorageConfig>,
}

impl Default for MemStorage {
    fn default() -> Self {
        Self {
            state: SharedState::default(),
            config: Arc::new(MemStorageConfig::default()),
        }
    }
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemStorageConfig) -> DirResult<Self> {
        config.validate()?;
        Ok(Self {
            state: SharedState::default(),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &MemStorageConfig {
        &self.config
    }

    /// Bytes currently published across all files.
    pub fn total_bytes(&self) -> u64 {
        self.state.lock().used_bytes_except("")
    }

    /// Drops the lock record for `name` as if another holder had broken it.
    /// Returns whether a lock was held.
    pub fn break_lock(&self, name: &str) -> bool {
        let broken = self.state.lock().locks.remove(name).is_some();
        if broken {
            tracing::warn!(%name, "memory lock broken");
        }
        broken
    }

    fn not_found(context: &'static str, name: &str) -> DirError {
        DirError::with_detail(DirErrorKind::NotFound, context, name.to_string())
    }
}

impl StorageBackend for MemStorage {
    fn kind(&self) -> &'static str {
        "mem"
    }

    fn location(&self) -> String {
        format!("memory:{:p}", Arc::as_ptr(&self.state))
    }

    fn capabilities(&self) -> BackendCapabilities {
        let mut caps = BackendCapabilities::READ_WHILE_WRITING;
        if self.config.allow_overwrite {
            caps |= BackendCapabilities::OVERWRITE;
        }
        caps
    }

    fn list(&self) -> DirResult<Vec<String>> {
        Ok(self.state.lock().files.keys().cloned().collect())
    }

    fn exists(&self, name: &str) -> DirResult<bool> {
        Ok(self.state.lock().files.contains_key(name))
    }

    fn len(&self, name: &str) -> DirResult<u64> {
        self.state
            .lock()
            .files
            .get(name)
            .map(|entry| entry.data.len() as u64)
            .ok_or_else(|| Self::not_found("mem.len", name))
    }

    fn create(&self, name: &str) -> DirResult<Box<dyn OutputSink>> {
        let mut state = self.state.lock();
        let exists = state.files.contains_key(name);
        if exists && !self.config.allow_overwrite {
            return Err(DirError::with_detail(
                DirErrorKind::AlreadyExists,
                "mem.create",
                name.to_string(),
            ));
        }
        if !exists
            && let Some(limit) = self.config.max_files
            && state.files.len() >= limit
        {
            return Err(DirError::with_detail(
                DirErrorKind::Io,
                "mem.create",
                format!("memory storage limit of {limit} files reached"),
            ));
        }
        let id = state.next_id();
        state.files.insert(
            name.to_string(),
            MemEntry {
                id,
                data: Bytes::new(),
            },
        );
        Ok(Box::new(MemOutput {
            state: self.state.clone(),
            name: name.to_string(),
            id,
            max_bytes: self.config.max_bytes,
            buffer: Vec::new(),
            published: 0,
        }))
    }

    fn open(&self, name: &str) -> DirResult<Arc<dyn InputSource>> {
        let state = self.state.lock();
        let entry = state
            .files
            .get(name)
            .ok_or_else(|| Self::not_found("mem.open", name))?;
        Ok(MemInput::shared(entry.data.clone()))
    }

    fn remove(&self, name: &str) -> DirResult<()> {
        self.state
            .lock()
            .files
            .remove(name)
            .map(drop)
            .ok_or_else(|| Self::not_found("mem.remove", name))
    }

    fn rename(&self, source: &str, dest: &str) -> DirResult<RenameOutcome> {
        let mut state = self.state.lock();
        let entry = state
            .files
            .remove(source)
            .ok_or_else(|| Self::not_found("mem.rename", source))?;
        state.files.insert(dest.to_string(), entry);
        Ok(RenameOutcome::Moved)
    }

    fn sync(&self, name: &str) -> DirResult<()> {
        if self.state.lock().files.contains_key(name) {
            Ok(())
        } else {
            Err(Self::not_found("mem.sync", name))
        }
    }

    fn sync_metadata(&self) -> DirResult<()> {
        Ok(())
    }

    fn lock(&self, name: &str) -> DirResult<Box<dyn BackendLock>> {
        let mut state = self.state.lock();
        if state.locks.contains_key(name) {
            return Err(DirError::with_detail(
                DirErrorKind::LockHeld,
                "mem.lock",
                name.to_string(),
            ));
        }
        let token = state.next_id();
        state.locks.insert(name.to_string(), token);
        Ok(Box::new(MemLock {
            state: self.state.clone(),
            name: name.to_string(),
            token,
        }))
    }
}

impl fmt::Debug for MemStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemStorage")
            .field("files", &state.files.len())
            .field("locks", &state.locks.len())
            .finish()
    }
}

struct MemLock {
    state: SharedState,
    name: String,
    token: u64,
}

impl BackendLock for MemLock {
    fn ensure_valid(&self) -> DirResult<()> {
        if self.state.lock().locks.get(&self.name) == Some(&self.token) {
            Ok(())
        } else {
            Err(DirError::with_detail(
                DirErrorKind::LockLost,
                "mem.lock",
                self.name.clone(),
            ))
        }
    }

    fn release(&mut self) -> DirResult<()> {
        let mut state = self.state.lock();
        if state.locks.get(&self.name) == Some(&self.token) {
            state.locks.remove(&self.name);
        }
        Ok(())
    }
}
