//! [`Directory`] implemented once over any [`StorageBackend`].

use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::backend::{BackendCapabilities, RenameOutcome, StorageBackend};
use crate::config::LockLossPolicy;
use crate::name::validate_name;
use crate::open_files::{HandleMode, OpenFiles};
use crate::pending::{PendingDeletions, PendingReason};
use crate::{
    DirError, DirErrorKind, DirResult, Directory, DirectoryConfig, DirectoryLock, IndexInput,
    IndexOutput, LockManager, SweepReport,
};

/// Directory bookkeeping on top of a backend: name validation, open handle
/// tracking, deferred deletion, in-process lock exclusivity and close.
///
/// Namespace mutations (create, delete, rename, sweep) hold the namespace
/// lock exclusively; listings, opens, length queries and syncs share it.
pub struct BaseDirectory<B> {
    backend: B,
    config: DirectoryConfig,
    namespace: RwLock<()>,
    open_files: Arc<OpenFiles>,
    pending: PendingDeletions,
    locks: LockManager,
    temp_counter: AtomicU64,
    closed: AtomicBool,
}

impl<B: StorageBackend> BaseDirectory<B> {
    pub fn new(backend: B, config: DirectoryConfig) -> DirResult<Self> {
        config.validate()?;
        tracing::debug!(
            kind = backend.kind(),
            location = %backend.location(),
            "opened directory"
        );
        Ok(Self {
            backend,
            config,
            namespace: RwLock::new(()),
            open_files: OpenFiles::new(),
            pending: PendingDeletions::new(),
            locks: LockManager::new(),
            temp_counter: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend.capabilities()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self, context: &'static str) -> DirResult<()> {
        if self.is_closed() {
            return Err(DirError::with_detail(
                DirErrorKind::Closed,
                context,
                self.backend.location(),
            ));
        }
        Ok(())
    }

    fn check_locks(&self, context: &'static str) -> DirResult<()> {
        if self.config.lock_loss_policy != LockLossPolicy::AbortWrites {
            return Ok(());
        }
        self.locks.validate_all().map_err(|err| {
            if err.kind() == DirErrorKind::LockLost {
                err
            } else {
                DirError::with_source(DirErrorKind::LockLost, context, err)
            }
        })
    }

    fn not_found(context: &'static str, name: &str) -> DirError {
        DirError::with_detail(DirErrorKind::NotFound, context, name.to_string())
    }

    fn sweep(&self) -> SweepReport {
        let _namespace = self.namespace.write();
        self.sweep_locked()
    }

    fn sweep_locked(&self) -> SweepReport {
        let report = self.pending.sweep(
            |name| self.open_files.open_count(name),
            |name| self.backend.remove(name),
        );
        if !report.deleted.is_empty() {
            tracing::debug!(deleted = ?report.deleted, "removed pending deletions");
        }
        report
    }

    fn sweep_if_pending(&self) {
        if !self.pending.is_empty() {
            self.sweep();
        }
    }

    /// Creates `name` with the namespace lock already held exclusively.
    fn create_locked(&self, name: &str, context: &'static str) -> DirResult<IndexOutput> {
        // close may have run while we waited for the namespace lock
        self.ensure_open(context)?;
        if self.pending.contains(name) {
            return Err(DirError::with_detail(
                DirErrorKind::Busy,
                context,
                format!("{name} is pending deletion"),
            ));
        }
        if self.open_files.has_writer(name) {
            return Err(DirError::with_detail(
                DirErrorKind::AlreadyExists,
                context,
                format!("{name} is being written"),
            ));
        }
        if !self.capabilities().contains(BackendCapabilities::OVERWRITE)
            && self.backend.exists(name)?
        {
            return Err(DirError::with_detail(
                DirErrorKind::AlreadyExists,
                context,
                name.to_string(),
            ));
        }

        let sink = self.backend.create(name)?;
        let lease = self.open_files.register(name, HandleMode::Write);
        tracing::trace!(%name, "created output");
        Ok(IndexOutput::new(name, sink, self.config.checksums).with_lease(lease))
    }
}

impl<B: StorageBackend> Directory for BaseDirectory<B> {
    fn list_all(&self) -> DirResult<Vec<String>> {
        self.ensure_open("dir.list_all")?;
        let _namespace = self.namespace.read();
        let mut names: Vec<String> = self
            .backend
            .list()?
            .into_iter()
            .filter(|name| !self.pending.contains(name))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn file_length(&self, name: &str) -> DirResult<u64> {
        validate_name(name, "dir.file_length")?;
        self.ensure_open("dir.file_length")?;
        let _namespace = self.namespace.read();
        if self.pending.contains(name) {
            return Err(Self::not_found("dir.file_length", name));
        }
        self.backend.len(name)
    }

    fn create_output(&self, name: &str) -> DirResult<IndexOutput> {
        validate_name(name, "dir.create_output")?;
        self.ensure_open("dir.create_output")?;
        self.check_locks("dir.create_output")?;
        self.sweep_if_pending();
        let _namespace = self.namespace.write();
        self.create_locked(name, "dir.create_output")
    }

    fn create_temp_output(&self, prefix: &str, suffix: &str) -> DirResult<IndexOutput> {
        self.ensure_open("dir.create_temp_output")?;
        self.check_locks("dir.create_temp_output")?;
        let _namespace = self.namespace.write();
        for _ in 0..self.config.max_temp_name_attempts {
            let counter = self.temp_counter.fetch_add(1, Ordering::Relaxed);
            let name = format!("{prefix}_{}{suffix}", to_base36(counter));
            validate_name(&name, "dir.create_temp_output")?;
            if self.pending.contains(&name) || self.open_files.has_writer(&name) {
                continue;
            }
            match self.create_locked(&name, "dir.create_temp_output") {
                Ok(output) => return Ok(output),
                Err(err) if err.kind() == DirErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
        Err(DirError::with_detail(
            DirErrorKind::AlreadyExists,
            "dir.create_temp_output",
            format!(
                "no free name for {prefix}_*{suffix} after {} attempts",
                self.config.max_temp_name_attempts
            ),
        ))
    }

    fn open_input(&self, name: &str) -> DirResult<IndexInput> {
        validate_name(name, "dir.open_input")?;
        self.ensure_open("dir.open_input")?;
        let _namespace = self.namespace.read();
        self.ensure_open("dir.open_input")?;
        if self.pending.contains(name) {
            return Err(Self::not_found("dir.open_input", name));
        }
        if self.open_files.has_writer(name)
            && !self
                .capabilities()
                .contains(BackendCapabilities::READ_WHILE_WRITING)
        {
            return Err(DirError::with_detail(
                DirErrorKind::Busy,
                "dir.open_input",
                format!("{name} is still being written"),
            ));
        }
        let source = self.backend.open(name)?;
        let lease = self.open_files.register(name, HandleMode::Read);
        tracing::trace!(%name, length = source.len(), "opened input");
        Ok(IndexInput::new(name, source, self.config.checksums).with_lease(lease))
    }

    fn delete_file(&self, name: &str) -> DirResult<()> {
        validate_name(name, "dir.delete_file")?;
        self.ensure_open("dir.delete_file")?;
        self.check_locks("dir.delete_file")?;
        {
            let _namespace = self.namespace.write();
            if self.pending.contains(name) {
                return Err(Self::not_found("dir.delete_file", name));
            }
            let open = self.open_files.open_count(name);
            if open > 0 {
                tracing::debug!(%name, open, "deferring deletion of open file");
                self.pending.record(name, PendingReason::OpenHandles(open));
                return Ok(());
            }
            match self.backend.remove(name) {
                Ok(()) => tracing::debug!(%name, "deleted file"),
                Err(err) if err.kind() == DirErrorKind::Busy => {
                    tracing::debug!(%name, error = %err, "backend refused deletion, deferring");
                    self.pending
                        .record(name, PendingReason::BackendRefused(err.to_string()));
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        if self.config.sweep_on_delete {
            self.sweep_if_pending();
        }
        Ok(())
    }

    fn rename(&self, source: &str, dest: &str) -> DirResult<()> {
        validate_name(source, "dir.rename")?;
        validate_name(dest, "dir.rename")?;
        self.ensure_open("dir.rename")?;
        self.check_locks("dir.rename")?;
        let _namespace = self.namespace.write();
        if self.pending.contains(source) {
            return Err(Self::not_found("dir.rename", source));
        }
        if self.open_files.has_writer(source) {
            return Err(DirError::with_detail(
                DirErrorKind::Busy,
                "dir.rename",
                format!("{source} is still being written"),
            ));
        }
        if source == dest {
            if !self.backend.exists(source)? {
                return Err(Self::not_found("dir.rename", source));
            }
            return Ok(());
        }
        let outcome = self.backend.rename(source, dest)?;
        if self.pending.remove(dest) {
            tracing::debug!(%dest, "rename replaced a file pending deletion");
        }
        self.open_files.rename(source, dest);
        if let RenameOutcome::SourceRetained(reason) = outcome {
            tracing::warn!(%source, %dest, %reason, "renamed file, source left behind");
            self.pending.record(source, PendingReason::BackendRefused(reason));
            return Ok(());
        }
        tracing::debug!(%source, %dest, "renamed file");
        Ok(())
    }

    fn sync(&self, names: &[&str]) -> DirResult<()> {
        self.ensure_open("dir.sync")?;
        self.check_locks("dir.sync")?;
        let _namespace = self.namespace.read();
        for name in names {
            validate_name(name, "dir.sync")?;
            if self.pending.contains(name) {
                return Err(Self::not_found("dir.sync", name));
            }
            self.backend.sync(name)?;
        }
        Ok(())
    }

    fn sync_metadata(&self) -> DirResult<()> {
        self.ensure_open("dir.sync_metadata")?;
        self.check_locks("dir.sync_metadata")?;
        let _namespace = self.namespace.read();
        self.backend.sync_metadata()
    }

    fn obtain_lock(&self, name: &str) -> DirResult<DirectoryLock> {
        validate_name(name, "dir.obtain_lock")?;
        self.ensure_open("dir.obtain_lock")?;
        self.locks.obtain(name, || self.backend.lock(name))
    }

    fn pending_deletions(&self) -> DirResult<BTreeSet<String>> {
        self.ensure_open("dir.pending_deletions")?;
        Ok(self.pending.names())
    }

    fn delete_pending_files(&self) -> DirResult<SweepReport> {
        self.ensure_open("dir.delete_pending_files")?;
        Ok(self.sweep())
    }

    fn close(&self) -> DirResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _namespace = self.namespace.write();
        let locks = self.locks.release_all();
        let revoked = self.open_files.revoke_all();
        if revoked > 0 {
            tracing::debug!(revoked, "revoked handles still open at close");
        }
        let report = self.sweep_locked();
        if !report.is_clean() {
            tracing::warn!(retained = ?report.retained, "pending deletions left after close");
        }
        let backend = self.backend.close();
        tracing::debug!(
            kind = self.backend.kind(),
            location = %self.backend.location(),
            "closed directory"
        );
        locks.and(backend)
    }
}

impl<B: StorageBackend> fmt::Debug for BaseDirectory<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseDirectory")
            .field("kind", &self.backend.kind())
            .field("location", &self.backend.location())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    digits.iter().rev().collect()
}
