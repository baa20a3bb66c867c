//! Exclusive, name-scoped directory locks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::backend::BackendLock;
use crate::{DirError, DirErrorKind, DirResult};

type LockTable = Mutex<HashMap<String, Arc<LockState>>>;

struct LockState {
    name: String,
    backend: Mutex<Option<Box<dyn BackendLock>>>,
    released: AtomicBool,
    stale: AtomicBool,
}

impl LockState {
    fn release(&self) -> DirResult<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.backend.lock().take() {
            Some(mut backend) => backend.release(),
            None => Ok(()),
        }
    }

    fn ensure_valid(&self) -> DirResult<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(DirError::with_detail(
                DirErrorKind::LockLost,
                "lock.ensure_valid",
                format!("{} was released", self.name),
            ));
        }
        let backend = self.backend.lock();
        let Some(backend) = backend.as_ref() else {
            return Err(DirError::with_detail(
                DirErrorKind::LockLost,
                "lock.ensure_valid",
                self.name.clone(),
            ));
        };
        backend.ensure_valid().inspect_err(|err| {
            // an I/O failure during validation means the lock is possibly lost
            self.stale.store(true, Ordering::Release);
            tracing::warn!(name = %self.name, error = %err, "lock validation failed");
        })
    }
}

/// Hands out at most one [`DirectoryLock`] per name.
#[derive(Default)]
pub struct LockManager {
    held: Arc<LockTable>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-and-set: fails with `LockHeld` if `name` is already held here,
    /// otherwise runs `acquire` to take the backend side of the lock.
    pub fn obtain(
        &self,
        name: &str,
        acquire: impl FnOnce() -> DirResult<Box<dyn BackendLock>>,
    ) -> DirResult<DirectoryLock> {
        let mut held = self.held.lock();
        if held.contains_key(name) {
            return Err(DirError::with_detail(
                DirErrorKind::LockHeld,
                "lock.obtain",
                name.to_string(),
            ));
        }
        let backend = acquire()?;
        let state = Arc::new(LockState {
            name: name.to_string(),
            backend: Mutex::new(Some(backend)),
            released: AtomicBool::new(false),
            stale: AtomicBool::new(false),
        });
        held.insert(name.to_string(), state.clone());
        tracing::debug!(%name, "lock obtained");
        Ok(DirectoryLock {
            state,
            table: Arc::downgrade(&self.held),
        })
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held.lock().contains_key(name)
    }

    pub fn held_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.held.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Validates every held lock, stopping at the first failure.
    pub fn validate_all(&self) -> DirResult<()> {
        let states: Vec<Arc<LockState>> = self.held.lock().values().cloned().collect();
        for state in states {
            state.ensure_valid()?;
        }
        Ok(())
    }

    /// Releases every held lock. All locks are released even if some fail;
    /// the first failure is returned.
    pub fn release_all(&self) -> DirResult<()> {
        let states: Vec<Arc<LockState>> = self.held.lock().drain().map(|(_, s)| s).collect();
        let mut first_err = None;
        for state in states {
            if let Err(err) = state.release() {
                tracing::warn!(name = %state.name, error = %err, "failed to release lock");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A held lock. Dropping it releases the lock.
pub struct DirectoryLock {
    state: Arc<LockState>,
    table: Weak<LockTable>,
}

impl DirectoryLock {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Checks that the lock is still held. Any failure marks the lock stale.
    pub fn ensure_valid(&self) -> DirResult<()> {
        self.state.ensure_valid()
    }

    /// True once a validation failed or the lock was released.
    pub fn is_stale(&self) -> bool {
        self.state.stale.load(Ordering::Acquire) || self.state.released.load(Ordering::Acquire)
    }

    pub fn close(&mut self) -> DirResult<()> {
        if let Some(table) = self.table.upgrade() {
            let mut held = table.lock();
            if held
                .get(&self.state.name)
                .is_some_and(|s| Arc::ptr_eq(s, &self.state))
            {
                held.remove(&self.state.name);
            }
        }
        self.state.release()
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(name = %self.state.name, error = %err, "failed to release lock on drop");
        }
    }
}

impl fmt::Debug for DirectoryLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryLock")
            .field("name", &self.state.name)
            .field("stale", &self.is_stale())
            .finish()
    }
}
