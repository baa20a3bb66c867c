mod config;
mod handle;
mod platform;
mod storage;

pub use config::HostStorageConfig;
pub use storage::HostStorage;

use vdir_core::{DirError, DirErrorKind, DirResult};

pub(crate) fn map_io_error(context: &'static str, err: std::io::Error) -> DirError {
    let kind = io_error_kind(&err);
    DirError::with_source(kind, context, err)
}

pub(crate) fn io_result<T>(context: &'static str, result: std::io::Result<T>) -> DirResult<T> {
    result.map_err(|err| map_io_error(context, err))
}

#[cfg(unix)]
fn io_error_kind(err: &std::io::Error) -> DirErrorKind {
    match err.raw_os_error() {
        Some(libc::EBUSY) | Some(libc::ETXTBSY) => DirErrorKind::Busy,
        _ => vdir_core::io_error_kind(err),
    }
}

#[cfg(not(unix))]
fn io_error_kind(err: &std::io::Error) -> DirErrorKind {
    // ERROR_SHARING_VIOLATION and ERROR_LOCK_VIOLATION: the file is open elsewhere
    match err.raw_os_error() {
        Some(32) | Some(33) => DirErrorKind::Busy,
        _ => vdir_core::io_error_kind(err),
    }
}
