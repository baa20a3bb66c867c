//! Core contracts of the virtual storage directory layer.
//!
//! A storage engine talks to [`Directory`]; each physical medium implements
//! the much smaller [`StorageBackend`] and gets the full contract from
//! [`BaseDirectory`].

pub mod backend;
pub mod base;
pub mod config;
pub mod delegate;
pub mod directory;
pub mod error;
pub mod handle;
pub mod lock;
pub mod name;
mod open_files;
pub mod owner;
pub mod pending;
pub mod registry;

pub use backend::{
    BackendCapabilities, BackendLock, InputSource, OutputSink, ProcessLocalLock, RenameOutcome,
    StorageBackend, StorageBackendExt,
};
pub use base::BaseDirectory;
pub use config::{DirectoryConfig, LockLossPolicy};
pub use delegate::DelegatingDirectory;
pub use directory::Directory;
pub use error::{DirError, DirErrorKind, DirResult, io_error_kind};
pub use handle::{IndexInput, IndexOutput};
pub use lock::{DirectoryLock, LockManager};
pub use name::{MAX_NAME_LEN, validate_name};
pub use owner::ShardId;
pub use pending::{PendingDeletions, PendingReason, SweepReport};
pub use registry::DirectoryRegistry;
