use vdir_core::{DirError, DirErrorKind, DirResult};

#[derive(Clone, Debug)]
pub struct MemStorageConfig {
    /// Optional max number of files stored at once.
    pub max_files: Option<usize>,
    /// Optional max bytes allowed for all published file data.
    pub max_bytes: Option<u64>,
    /// If true, creating an existing file replaces it.
    pub allow_overwrite: bool,
}

impl Default for MemStorageConfig {
    fn default() -> Self {
        Self {
            max_files: None,
            max_bytes: None,
            allow_overwrite: false,
        }
    }
}

impl MemStorageConfig {
    pub fn validate(&self) -> DirResult<()> {
        if self.max_files == Some(0) {
            return Err(DirError::with_detail(
                DirErrorKind::InvalidInput,
                "mem.config",
                "max_files must be at least 1",
            ));
        }
        Ok(())
    }
}
