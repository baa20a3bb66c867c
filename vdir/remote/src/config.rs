use std::time::Duration;

use vdir_core::{DirError, DirErrorKind, DirResult};

#[derive(Clone, Debug)]
pub struct RemoteStorageConfig {
    /// Key prefix of the directory, without leading or trailing `/`.
    pub root: String,
    /// Upper bound for every single store call.
    pub op_timeout: Duration,
    /// How long a lock lease stays valid without renewal.
    pub lease_duration: Duration,
    /// Worker threads of the runtime driving store calls.
    pub io_threads: usize,
}

impl RemoteStorageConfig {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            op_timeout: Duration::from_secs(30),
            lease_duration: Duration::from_secs(60),
            io_threads: 2,
        }
    }

    pub fn validate(&self) -> DirResult<()> {
        if self.root.is_empty() || self.root.starts_with('/') || self.root.ends_with('/') {
            return Err(DirError::with_detail(
                DirErrorKind::InvalidInput,
                "remote.config",
                format!("invalid root {:?}", self.root),
            ));
        }
        if self.op_timeout.is_zero() || self.lease_duration.is_zero() {
            return Err(DirError::with_detail(
                DirErrorKind::InvalidInput,
                "remote.config",
                "op_timeout and lease_duration must be positive",
            ));
        }
        if self.io_threads == 0 {
            return Err(DirError::with_detail(
                DirErrorKind::InvalidInput,
                "remote.config",
                "io_threads must be at least 1",
            ));
        }
        Ok(())
    }
}
