//! Table of handles currently open through one directory instance.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandleMode {
    Read,
    Write,
}

struct OpenEntry {
    name: String,
    mode: HandleMode,
    revoked: Arc<AtomicBool>,
}

#[derive(Default)]
struct OpenFilesInner {
    next_id: u64,
    handles: HashMap<u64, OpenEntry>,
}

#[derive(Default)]
pub(crate) struct OpenFiles {
    inner: Mutex<OpenFilesInner>,
}

impl OpenFiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>, name: &str, mode: HandleMode) -> HandleLease {
        let revoked = Arc::new(AtomicBool::new(false));
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handles.insert(
            id,
            OpenEntry {
                name: name.to_string(),
                mode,
                revoked: revoked.clone(),
            },
        );
        HandleLease {
            id,
            table: Arc::downgrade(self),
            revoked,
        }
    }

    pub fn open_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .handles
            .values()
            .filter(|entry| entry.name == name)
            .count()
    }

    pub fn has_writer(&self, name: &str) -> bool {
        self.inner
            .lock()
            .handles
            .values()
            .any(|entry| entry.name == name && entry.mode == HandleMode::Write)
    }

    /// Handles follow their file to its new name.
    pub fn rename(&self, source: &str, dest: &str) {
        let mut inner = self.inner.lock();
        for entry in inner.handles.values_mut() {
            if entry.name == source {
                entry.name = dest.to_string();
            }
        }
    }

    /// Marks every open handle closed and forgets them. Returns how many
    /// handles were still open.
    pub fn revoke_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.handles.len();
        for (_, entry) in inner.handles.drain() {
            entry.revoked.store(true, Ordering::Release);
        }
        count
    }

    fn unregister(&self, id: u64) {
        self.inner.lock().handles.remove(&id);
    }
}

/// Registration of one open handle; dropping it unregisters the handle.
pub(crate) struct HandleLease {
    id: u64,
    table: Weak<OpenFiles>,
    revoked: Arc<AtomicBool>,
}

impl HandleLease {
    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Registers another handle on the same file with the same mode.
    /// Returns `None` once the table is gone or this lease was revoked.
    pub fn duplicate(&self) -> Option<HandleLease> {
        if self.is_revoked() {
            return None;
        }
        let table = self.table.upgrade()?;
        let (name, mode) = {
            let inner = table.inner.lock();
            let entry = inner.handles.get(&self.id)?;
            (entry.name.clone(), entry.mode)
        };
        Some(table.register(&name, mode))
    }
}

impl Drop for HandleLease {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            table.unregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_leases() {
        let table = OpenFiles::new();
        let a = table.register("a", HandleMode::Read);
        let b = table.register("a", HandleMode::Write);
        assert_eq!(table.open_count("a"), 2);
        assert!(table.has_writer("a"));

        drop(b);
        assert_eq!(table.open_count("a"), 1);
        assert!(!table.has_writer("a"));

        drop(a);
        assert_eq!(table.open_count("a"), 0);
    }

    #[test]
    fn rename_moves_open_handles() {
        let table = OpenFiles::new();
        let _lease = table.register("tmp", HandleMode::Read);
        table.rename("tmp", "final");
        assert_eq!(table.open_count("tmp"), 0);
        assert_eq!(table.open_count("final"), 1);
    }

    #[test]
    fn duplicate_registers_a_second_handle() {
        let table = OpenFiles::new();
        let lease = table.register("a", HandleMode::Read);
        let copy = lease.duplicate().expect("table alive");
        assert_eq!(table.open_count("a"), 2);
        drop(lease);
        assert_eq!(table.open_count("a"), 1);
        drop(copy);
        assert_eq!(table.open_count("a"), 0);
    }

    #[test]
    fn revoke_all_flags_every_lease() {
        let table = OpenFiles::new();
        let lease = table.register("a", HandleMode::Read);
        assert!(!lease.is_revoked());
        assert_eq!(table.revoke_all(), 1);
        assert!(lease.is_revoked());
        assert_eq!(table.open_count("a"), 0);
    }
}
