use crate::{DirError, DirErrorKind, DirResult};

/// What a directory does when one of its locks turns out to be lost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockLossPolicy {
    /// Only mark the lock stale; holders call `DirectoryLock::ensure_valid`.
    #[default]
    Flag,
    /// Validate every held lock before each mutating operation and fail the
    /// operation with `LockLost` if any of them is gone.
    AbortWrites,
}

#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    /// Compute a running xxh64 checksum on every handle.
    pub checksums: bool,
    pub lock_loss_policy: LockLossPolicy,
    /// Retry pending deletions after every successful `delete_file`.
    pub sweep_on_delete: bool,
    /// Upper bound on name generation attempts in `create_temp_output`.
    pub max_temp_name_attempts: u32,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            checksums: true,
            lock_loss_policy: LockLossPolicy::Flag,
            sweep_on_delete: true,
            max_temp_name_attempts: 1024,
        }
    }
}

impl DirectoryConfig {
    pub fn validate(&self) -> DirResult<()> {
        if self.max_temp_name_attempts == 0 {
            return Err(DirError::with_detail(
                DirErrorKind::InvalidInput,
                "directory.config",
                "max_temp_name_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}
