//! Deletions that could not run when they were requested.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{DirErrorKind, DirResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingReason {
    /// Handles were still open on the file.
    OpenHandles(usize),
    /// The backend refused the removal.
    BackendRefused(String),
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingReason::OpenHandles(count) => write!(f, "{count} open handle(s)"),
            PendingReason::BackendRefused(reason) => write!(f, "backend refused: {reason}"),
        }
    }
}

/// Outcome of one sweep over the pending deletions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub retained: Vec<String>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.retained.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PendingDeletions {
    entries: Mutex<BTreeMap<String, PendingReason>>,
}

impl PendingDeletions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, reason: PendingReason) {
        self.entries.lock().insert(name.to_string(), reason);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entries.lock().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    pub fn reason(&self, name: &str) -> Option<PendingReason> {
        self.entries.lock().get(name).cloned()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Retries every pending deletion.
    ///
    /// `open_count` reports the handles still open on a name; names with open
    /// handles are skipped. `remove` performs the physical deletion; a
    /// `NotFound` result counts as deleted. Other failures keep the entry and
    /// are logged, never returned.
    pub fn sweep(
        &self,
        open_count: impl Fn(&str) -> usize,
        remove: impl Fn(&str) -> DirResult<()>,
    ) -> SweepReport {
        let mut report = SweepReport::default();
        let mut entries = self.entries.lock();
        let names: Vec<String> = entries.keys().cloned().collect();
        for name in names {
            let open = open_count(&name);
            if open > 0 {
                entries.insert(name.clone(), PendingReason::OpenHandles(open));
                report.retained.push(name);
                continue;
            }
            match remove(&name) {
                Ok(()) => {
                    entries.remove(&name);
                    report.deleted.push(name);
                }
                Err(err) if err.kind() == DirErrorKind::NotFound => {
                    entries.remove(&name);
                    report.deleted.push(name);
                }
                Err(err) => {
                    tracing::warn!(%name, error = %err, "pending deletion failed again");
                    entries.insert(name.clone(), PendingReason::BackendRefused(err.to_string()));
                    report.retained.push(name);
                }
            }
        }
        report
    }
}
