//! The directory contract shared by every backend.

use std::collections::BTreeSet;
use std::fmt;

use crate::{DirErrorKind, DirResult, DirectoryLock, IndexInput, IndexOutput, SweepReport};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A named collection of append-only, random-access files.
///
/// Implementations are shared between threads; handles returned from them
/// are owned by one caller at a time.
pub trait Directory: fmt::Debug + Send + Sync + 'static {
    /// Committed file names in lexicographic order. Names pending deletion
    /// are not listed.
    fn list_all(&self) -> DirResult<Vec<String>>;

    fn file_length(&self, name: &str) -> DirResult<u64>;

    /// Creates a new file. The returned output is owned by the caller until
    /// closed.
    fn create_output(&self, name: &str) -> DirResult<IndexOutput>;

    /// Creates a file under a generated name `prefix_<n>suffix` that did not
    /// exist before.
    fn create_temp_output(&self, prefix: &str, suffix: &str) -> DirResult<IndexOutput>;

    fn open_input(&self, name: &str) -> DirResult<IndexInput>;

    /// Deletes a file. If handles are still open on it the deletion is
    /// deferred and the call still succeeds.
    fn delete_file(&self, name: &str) -> DirResult<()>;

    /// Atomically moves `source` to `dest`, replacing `dest`.
    fn rename(&self, source: &str, dest: &str) -> DirResult<()>;

    /// Makes the bytes of each named file durable, in order.
    fn sync(&self, names: &[&str]) -> DirResult<()>;

    /// Makes the directory listing durable.
    fn sync_metadata(&self) -> DirResult<()>;

    fn obtain_lock(&self, name: &str) -> DirResult<DirectoryLock>;

    fn pending_deletions(&self) -> DirResult<BTreeSet<String>>;

    /// Retries every deferred deletion whose file is no longer open.
    fn delete_pending_files(&self) -> DirResult<SweepReport>;

    /// Releases locks, revokes open handles and closes the backend.
    /// Closing twice is a no-op.
    fn close(&self) -> DirResult<()>;

    /// Copies `src` from another directory into `dest` here. A partially
    /// written `dest` is removed when the copy fails.
    fn copy_from(&self, from: &dyn Directory, src: &str, dest: &str) -> DirResult<()> {
        let mut input = from.open_input(src)?;
        let mut output = self.create_output(dest)?;
        let copied = copy_bytes(&mut input, &mut output);
        if let Err(err) = input.close() {
            tracing::warn!(%src, error = %err, "failed to close copy source");
        }
        let result = match copied {
            Ok(()) => output.close(),
            Err(err) => {
                if let Err(close) = output.close() {
                    tracing::warn!(%dest, error = %close, "failed to close partial copy");
                }
                Err(err)
            }
        };
        if let Err(err) = result {
            if let Err(cleanup) = self.delete_file(dest)
                && cleanup.kind() != DirErrorKind::NotFound
            {
                tracing::warn!(%dest, error = %cleanup, "failed to remove partial copy");
            }
            return Err(err);
        }
        Ok(())
    }
}

fn copy_bytes(input: &mut IndexInput, output: &mut IndexOutput) -> DirResult<()> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    while input.remaining() > 0 {
        let chunk = usize::try_from(input.remaining())
            .unwrap_or(usize::MAX)
            .min(buf.len());
        input.read_bytes(&mut buf[..chunk])?;
        output.write_bytes(&buf[..chunk])?;
    }
    Ok(())
}
