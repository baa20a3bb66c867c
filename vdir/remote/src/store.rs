use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use vdir_core::{DirError, DirErrorKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    /// Changes on every write of the key.
    pub generation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutCondition {
    None,
    /// Fail with `PreconditionFailed` if the key exists.
    IfAbsent,
    /// Fail with `PreconditionFailed` unless the key exists with this generation.
    IfGenerationMatch(u64),
}

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object {0} not found")]
    NotFound(String),
    #[error("precondition failed for {0}")]
    PreconditionFailed(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl ObjectStoreError {
    pub(crate) fn into_dir_error(self, context: &'static str) -> DirError {
        let kind = match &self {
            ObjectStoreError::NotFound(_) => DirErrorKind::NotFound,
            ObjectStoreError::PreconditionFailed(_) => DirErrorKind::AlreadyExists,
            ObjectStoreError::Transport(_) => DirErrorKind::Io,
        };
        DirError::with_source(kind, context, self)
    }
}

/// Minimal object store surface needed by [`crate::RemoteStorage`].
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError>;

    async fn get(&self, key: &str) -> Result<(ObjectMeta, Bytes), ObjectStoreError>;

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        condition: PutCondition,
    ) -> Result<ObjectMeta, ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Every object whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, ObjectStoreError>;

    /// Server side copy; replaces `dest`.
    async fn copy(&self, source: &str, dest: &str) -> Result<ObjectMeta, ObjectStoreError>;
}
