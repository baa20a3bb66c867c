//! Owner key to directory bindings.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::{DirError, DirErrorKind, DirResult, Directory};

/// Binds each owner key to at most one live directory.
///
/// The registry never opens or closes directories; whoever detaches a
/// directory decides when to close it.
pub struct DirectoryRegistry<K> {
    directories: RwLock<HashMap<K, Arc<dyn Directory>>>,
}

impl<K> Default for DirectoryRegistry<K> {
    fn default() -> Self {
        Self {
            directories: RwLock::new(HashMap::new()),
        }
    }
}

impl<K> DirectoryRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, owner: K, directory: Arc<dyn Directory>) -> DirResult<()> {
        let mut directories = self.directories.write();
        if directories.contains_key(&owner) {
            return Err(DirError::with_detail(
                DirErrorKind::AlreadyAttached,
                "registry.attach",
                format!("{owner:?}"),
            ));
        }
        tracing::debug!(?owner, ?directory, "attached directory");
        directories.insert(owner, directory);
        Ok(())
    }

    pub fn lookup(&self, owner: &K) -> DirResult<Arc<dyn Directory>> {
        self.directories.read().get(owner).cloned().ok_or_else(|| {
            DirError::with_detail(DirErrorKind::NotFound, "registry.lookup", format!("{owner:?}"))
        })
    }

    /// Removes the binding and hands the directory back without closing it.
    pub fn detach(&self, owner: &K) -> DirResult<Arc<dyn Directory>> {
        let directory = self.directories.write().remove(owner).ok_or_else(|| {
            DirError::with_detail(DirErrorKind::NotFound, "registry.detach", format!("{owner:?}"))
        })?;
        tracing::debug!(?owner, "detached directory");
        Ok(directory)
    }

    pub fn contains(&self, owner: &K) -> bool {
        self.directories.read().contains_key(owner)
    }

    pub fn owners(&self) -> Vec<K> {
        self.directories.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.directories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.read().is_empty()
    }

    /// Detaches every binding, e.g. on engine shutdown.
    pub fn drain(&self) -> Vec<(K, Arc<dyn Directory>)> {
        self.directories.write().drain().collect()
    }
}

impl<K: Debug> Debug for DirectoryRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryRegistry")
            .field("owners", &self.directories.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
