mod config;
mod handle;
mod storage;

pub use config::MemStorageConfig;
pub use storage::MemStorage;
