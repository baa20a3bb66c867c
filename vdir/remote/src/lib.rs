//! Directories stored in a remote object store.
//!
//! Every file is one object under `<root>/data/`; locks are lease objects
//! under `<root>/locks/`. The store is reached through the async
//! [`ObjectStore`] trait and driven from a runtime owned by
//! [`RemoteStorage`], so directory calls block the calling thread. They must
//! not be made from inside another tokio runtime.

mod config;
mod executor;
mod handle;
mod lease;
mod memory;
mod storage;
mod store;

pub use config::RemoteStorageConfig;
pub use memory::{MemoryObjectStore, StoreOp};
pub use storage::RemoteStorage;
pub use store::{ObjectMeta, ObjectStore, ObjectStoreError, PutCondition};
