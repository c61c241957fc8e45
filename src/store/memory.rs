//! In-memory instance store.
//!
//! Reference implementation of the [`InstanceStore`] contract backed by a
//! concurrent map of serialized rows. Every instance handed out has gone
//! through a real disconnect/serialize/deserialize/reconnect cycle, so this
//! store exercises the same round-trip guarantees a durable backend must
//! provide, which also makes it the standard test double.

use super::{Connector, Disconnector, InstanceStore, StoreResult};
use crate::task::TaskInstance;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct InMemoryInstanceStore {
    records: DashMap<Uuid, String>,
    connector: Arc<dyn Connector>,
    disconnector: Arc<dyn Disconnector>,
}

impl InMemoryInstanceStore {
    pub fn new(connector: Arc<dyn Connector>, disconnector: Arc<dyn Disconnector>) -> Self {
        Self {
            records: DashMap::new(),
            connector,
            disconnector,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn persist(&self, instance: TaskInstance) -> StoreResult<TaskInstance> {
        let id = instance.id();
        let detached = self.disconnector.disconnect(instance);
        let row = serde_json::to_string(&detached)?;
        self.records.insert(id, row);
        self.connector.reconnect(detached)
    }

    fn revive(&self, id: Uuid, row: &str) -> Option<TaskInstance> {
        let detached: TaskInstance = match serde_json::from_str(row) {
            Ok(instance) => instance,
            Err(error) => {
                warn!(task_id = %id, %error, "corrupt instance row, treating as absent");
                return None;
            }
        };
        match self.connector.reconnect(detached) {
            Ok(instance) => Some(instance),
            Err(error) => {
                warn!(task_id = %id, %error, "instance cannot be reconnected, treating as absent");
                None
            }
        }
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn find_by_id(&self, id: Uuid) -> Option<TaskInstance> {
        let row = self.records.get(&id)?.value().clone();
        self.revive(id, &row)
    }

    async fn exists(&self, id: Uuid) -> bool {
        self.records.contains_key(&id)
    }

    async fn create(&self, instance: TaskInstance) -> StoreResult<TaskInstance> {
        debug!(task_id = %instance.id(), "persisting new task instance");
        self.persist(instance)
    }

    async fn update(&self, instance: TaskInstance) -> StoreResult<TaskInstance> {
        self.persist(instance)
    }

    async fn remove(&self, id: Uuid) -> Option<TaskInstance> {
        let (_, row) = self.records.remove(&id)?;
        debug!(task_id = %id, "removed task instance");
        self.revive(id, &row)
    }
}
