use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::{ObjectMeta, ObjectStore, ObjectStoreError, PutCondition};

/// Object store calls, for targeted fault injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Head,
    Get,
    Put,
    Delete,
    List,
    Copy,
}

struct StoredObject {
    generation: u64,
    body: Bytes,
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<String, StoredObject>,
    next_generation: u64,
    latency: Duration,
    unavailable: bool,
    failing: HashSet<StoreOp>,
}

impl MemoryState {
    fn meta(key: &str, object: &StoredObject) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: object.body.len() as u64,
            generation: object.generation,
        }
    }

    fn store(&mut self, key: &str, body: Bytes) -> ObjectMeta {
        self.next_generation += 1;
        let object = StoredObject {
            generation: self.next_generation,
            body,
        };
        let meta = Self::meta(key, &object);
        self.objects.insert(key.to_string(), object);
        meta
    }
}

/// In-process [`ObjectStore`] with injectable latency and outages.
#[derive(Default)]
pub struct MemoryObjectStore {
    state: Mutex<MemoryState>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied before every call.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// While unavailable every call fails with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Makes every `op` call fail with a transport error until cleared.
    pub fn fail_operation(&self, op: StoreOp, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing.insert(op);
        } else {
            state.failing.remove(&op);
        }
    }

    /// Writes an object directly, bypassing conditions and latency.
    pub fn insert_raw(&self, key: &str, body: impl Into<Bytes>) -> ObjectMeta {
        self.state.lock().store(key, body.into())
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.state.lock().objects.keys().cloned().collect()
    }

    async fn enter(&self, op: StoreOp) -> Result<(), ObjectStoreError> {
        let (latency, unavailable, failing) = {
            let state = self.state.lock();
            (state.latency, state.unavailable, state.failing.contains(&op))
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if unavailable {
            return Err(ObjectStoreError::Transport("store unavailable".to_string()));
        }
        if failing {
            return Err(ObjectStoreError::Transport(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        self.enter(StoreOp::Head).await?;
        let state = self.state.lock();
        state
            .objects
            .get(key)
            .map(|object| MemoryState::meta(key, object))
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn get(&self, key: &str) -> Result<(ObjectMeta, Bytes), ObjectStoreError> {
        self.enter(StoreOp::Get).await?;
        let state = self.state.lock();
        state
            .objects
            .get(key)
            .map(|object| (MemoryState::meta(key, object), object.body.clone()))
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        condition: PutCondition,
    ) -> Result<ObjectMeta, ObjectStoreError> {
        self.enter(StoreOp::Put).await?;
        let mut state = self.state.lock();
        let current = state.objects.get(key).map(|object| object.generation);
        let allowed = match condition {
            PutCondition::None => true,
            PutCondition::IfAbsent => current.is_none(),
            PutCondition::IfGenerationMatch(generation) => current == Some(generation),
        };
        if !allowed {
            return Err(ObjectStoreError::PreconditionFailed(key.to_string()));
        }
        Ok(state.store(key, body))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.enter(StoreOp::Delete).await?;
        self.state
            .lock()
            .objects
            .remove(key)
            .map(drop)
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, ObjectStoreError> {
        self.enter(StoreOp::List).await?;
        let state = self.state.lock();
        Ok(state
            .objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| MemoryState::meta(key, object))
            .collect())
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<ObjectMeta, ObjectStoreError> {
        self.enter(StoreOp::Copy).await?;
        let mut state = self.state.lock();
        let body = state
            .objects
            .get(source)
            .map(|object| object.body.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(source.to_string()))?;
        Ok(state.store(dest, body))
    }
}
