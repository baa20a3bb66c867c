//! Error type shared by every directory operation.

use std::fmt;
use std::io;
use thiserror::Error;

pub type DirResult<T> = Result<T, DirError>;

/// Classification of a [`DirError`].
///
/// Backends must map their native failures onto these kinds; callers match on
/// the kind and never on the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirErrorKind {
    /// The file, lock or owner binding does not exist.
    NotFound,
    /// The name is already present and the backend does not overwrite.
    AlreadyExists,
    /// The owner key is already bound in a registry.
    AlreadyAttached,
    /// The lock is held by another holder (possibly the caller itself).
    LockHeld,
    /// A previously obtained lock is no longer valid.
    LockLost,
    /// The file is in a state that forbids the operation right now.
    Busy,
    /// A read or seek went past the end of the file.
    EndOfFile,
    /// Backend I/O failed.
    Io,
    /// Backend I/O did not complete in time.
    TimedOut,
    /// The directory or handle was closed.
    Closed,
    /// The caller passed an invalid name or configuration.
    InvalidInput,
}

impl DirErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            DirErrorKind::NotFound => "not found",
            DirErrorKind::AlreadyExists => "already exists",
            DirErrorKind::AlreadyAttached => "already attached",
            DirErrorKind::LockHeld => "lock held",
            DirErrorKind::LockLost => "lock lost",
            DirErrorKind::Busy => "busy",
            DirErrorKind::EndOfFile => "end of file",
            DirErrorKind::Io => "i/o failure",
            DirErrorKind::TimedOut => "i/o timed out",
            DirErrorKind::Closed => "closed",
            DirErrorKind::InvalidInput => "invalid input",
        }
    }
}

impl fmt::Display for DirErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{context}: {kind}{}", fmt_detail(.detail))]
pub struct DirError {
    kind: DirErrorKind,
    context: &'static str,
    detail: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

fn fmt_detail(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" ({detail})"),
        None => String::new(),
    }
}

impl DirError {
    pub fn new(kind: DirErrorKind, context: &'static str) -> Self {
        Self {
            kind,
            context,
            detail: None,
            source: None,
        }
    }

    pub fn with_detail(kind: DirErrorKind, context: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            context,
            detail: Some(detail.into()),
            source: None,
        }
    }

    pub fn with_source<E>(kind: DirErrorKind, context: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            context,
            detail: None,
            source: Some(Box::new(source)),
        }
    }

    /// Maps an OS error onto the directory error kinds.
    pub fn from_io(context: &'static str, err: io::Error) -> Self {
        let kind = io_error_kind(&err);
        Self::with_source(kind, context, err)
    }

    /// Attaches a human readable reason, typically the file name involved.
    pub fn detail_with(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> DirErrorKind {
        self.kind
    }

    pub fn context(&self) -> &'static str {
        self.context
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// True for the `IOFailure` family: plain I/O errors and timeouts.
    pub fn is_io_failure(&self) -> bool {
        matches!(self.kind, DirErrorKind::Io | DirErrorKind::TimedOut)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == DirErrorKind::TimedOut
    }
}

pub fn io_error_kind(err: &io::Error) -> DirErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => DirErrorKind::NotFound,
        io::ErrorKind::AlreadyExists => DirErrorKind::AlreadyExists,
        io::ErrorKind::UnexpectedEof => DirErrorKind::EndOfFile,
        io::ErrorKind::TimedOut => DirErrorKind::TimedOut,
        io::ErrorKind::WouldBlock => DirErrorKind::Busy,
        io::ErrorKind::InvalidInput => DirErrorKind::InvalidInput,
        _ => DirErrorKind::Io,
    }
}

impl From<DirError> for io::Error {
    fn from(err: DirError) -> Self {
        let kind = match err.kind() {
            DirErrorKind::NotFound => io::ErrorKind::NotFound,
            DirErrorKind::AlreadyExists => io::ErrorKind::AlreadyExists,
            DirErrorKind::EndOfFile => io::ErrorKind::UnexpectedEof,
            DirErrorKind::TimedOut => io::ErrorKind::TimedOut,
            DirErrorKind::Busy | DirErrorKind::LockHeld => io::ErrorKind::WouldBlock,
            DirErrorKind::InvalidInput => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context_kind_and_detail() {
        let err = DirError::with_detail(DirErrorKind::NotFound, "dir.open_input", "_0.cfs");
        assert_eq!(err.to_string(), "dir.open_input: not found (_0.cfs)");

        let err = DirError::new(DirErrorKind::Closed, "dir.list_all");
        assert_eq!(err.to_string(), "dir.list_all: closed");
    }

    #[test]
    fn io_errors_map_by_kind() {
        let err = DirError::from_io("host.open", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind(), DirErrorKind::NotFound);
        assert!(std::error::Error::source(&err).is_some());

        let err = DirError::from_io("host.open", io::Error::other("disk on fire"));
        assert_eq!(err.kind(), DirErrorKind::Io);
        assert!(err.is_io_failure());
        assert!(!err.is_timeout());
    }

    #[test]
    fn timeouts_are_io_failures() {
        let err = DirError::new(DirErrorKind::TimedOut, "remote.list");
        assert!(err.is_io_failure());
        assert!(err.is_timeout());
    }

    #[test]
    fn converts_back_into_io_error() {
        let err: io::Error = DirError::new(DirErrorKind::EndOfFile, "input.read").into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
