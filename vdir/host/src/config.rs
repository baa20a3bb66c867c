use std::path::PathBuf;

use vdir_core::{DirError, DirErrorKind, DirResult};

#[derive(Clone, Debug)]
pub struct HostStorageConfig {
    pub root: PathBuf,
    /// Create `root` (and its parents) if it does not exist.
    pub create: bool,
    /// fsync the directory itself on `sync_metadata`.
    pub fsync_directory: bool,
    pub write_buffer_size: usize,
}

impl HostStorageConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create: true,
            fsync_directory: true,
            write_buffer_size: 8 * 1024,
        }
    }

    pub fn validate(&self) -> DirResult<()> {
        if self.root.as_os_str().is_empty() {
            return Err(DirError::with_detail(
                DirErrorKind::InvalidInput,
                "host.config",
                "root must not be empty",
            ));
        }
        if self.write_buffer_size == 0 {
            return Err(DirError::with_detail(
                DirErrorKind::InvalidInput,
                "host.config",
                "write_buffer_size must be at least 1",
            ));
        }
        Ok(())
    }
}
