//! Lock leases stored as objects.
//!
//! A lease body is a JSON record of the holder token and the expiry in unix
//! millis. Every write of a lease is conditional on the generation last seen,
//! so two holders can never both believe they renewed the same lease.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use vdir_core::{BackendLock, DirError, DirErrorKind, DirResult};

use crate::executor::Executor;
use crate::{ObjectStore, PutCondition};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Lease {
    pub token: String,
    pub expires_at_ms: u64,
}

impl Lease {
    fn new(token: &str, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self {
            token: token.to_string(),
            expires_at_ms: now_ms().saturating_add(millis),
        }
    }

    fn encode(&self) -> DirResult<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|err| DirError::with_source(DirErrorKind::Io, "remote.lock.encode", err))
    }

    fn decode(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    fn is_expired(&self) -> bool {
        self.expires_at_ms <= now_ms()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

fn lock_held(name: &str) -> DirError {
    DirError::with_detail(DirErrorKind::LockHeld, "remote.lock", name.to_string())
}

pub(crate) struct RemoteLock {
    exec: Executor,
    store: Arc<dyn ObjectStore>,
    key: String,
    name: String,
    token: String,
    lease_duration: Duration,
    generation: Mutex<u64>,
}

impl RemoteLock {
    /// Writes a fresh lease, taking over an existing one only if it expired.
    pub fn acquire(
        exec: Executor,
        store: Arc<dyn ObjectStore>,
        key: String,
        name: &str,
        lease_duration: Duration,
    ) -> DirResult<Self> {
        let token = Uuid::new_v4().to_string();
        let body = Lease::new(&token, lease_duration).encode()?;

        let created = exec.block(
            "remote.lock",
            store.put(&key, body.clone(), PutCondition::IfAbsent),
        );
        let meta = match created {
            Ok(meta) => meta,
            Err(err) if err.kind() == DirErrorKind::AlreadyExists => {
                let (existing, current) = match exec.block("remote.lock.read", store.get(&key)) {
                    Ok(found) => found,
                    // released between our put and get; the next attempt may win
                    Err(err) if err.kind() == DirErrorKind::NotFound => {
                        return Err(lock_held(name));
                    }
                    Err(err) => return Err(err),
                };
                let Some(lease) = Lease::decode(&current) else {
                    tracing::warn!(%name, "unreadable lease, treating the lock as held");
                    return Err(lock_held(name));
                };
                if !lease.is_expired() {
                    return Err(lock_held(name));
                }
                let stolen = exec.block(
                    "remote.lock.steal",
                    store.put(
                        &key,
                        body,
                        PutCondition::IfGenerationMatch(existing.generation),
                    ),
                );
                match stolen {
                    Ok(meta) => {
                        tracing::warn!(
                            %name,
                            previous = %lease.token,
                            "took over expired lease"
                        );
                        meta
                    }
                    Err(err) if err.kind() == DirErrorKind::AlreadyExists => {
                        return Err(lock_held(name));
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            exec,
            store,
            key,
            name: name.to_string(),
            token,
            lease_duration,
            generation: Mutex::new(meta.generation),
        })
    }

    fn lost(&self, source: DirError) -> DirError {
        DirError::with_source(DirErrorKind::LockLost, "remote.lock.renew", source)
            .detail_with(self.name.clone())
    }
}

impl BackendLock for RemoteLock {
    /// Renews the lease. Fails with `LockLost` if it was deleted or rewritten
    /// by anyone else.
    fn ensure_valid(&self) -> DirResult<()> {
        let mut generation = self.generation.lock();
        let body = Lease::new(&self.token, self.lease_duration).encode()?;
        let renewed = self.exec.block(
            "remote.lock.renew",
            self.store.put(
                &self.key,
                body,
                PutCondition::IfGenerationMatch(*generation),
            ),
        );
        match renewed {
            Ok(meta) => {
                *generation = meta.generation;
                Ok(())
            }
            Err(err) if matches!(err.kind(), DirErrorKind::AlreadyExists | DirErrorKind::NotFound) => {
                Err(self.lost(err))
            }
            Err(err) => Err(err),
        }
    }

    fn release(&mut self) -> DirResult<()> {
        let generation = *self.generation.lock();
        match self.exec.block("remote.lock.release", self.store.head(&self.key)) {
            Ok(meta) if meta.generation == generation => {}
            Ok(_) => return Ok(()),
            Err(err) if err.kind() == DirErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        }
        match self
            .exec
            .block("remote.lock.release", self.store.delete(&self.key))
        {
            Err(err) if err.kind() != DirErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}
