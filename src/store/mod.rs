//! # Instance Store
//!
//! Abstraction over task-instance persistence with a disconnect/reconnect
//! contract.
//!
//! ## Overview
//!
//! Instances are persisted in detached form (runtime bindings stripped) and
//! every instance handed back to a caller is reconnected first, so it is
//! immediately usable. The [`Connector`] and [`Disconnector`] strategies
//! are injected at store construction; the store itself stays fully
//! decoupled from the running engine.

pub mod memory;

pub use memory::InMemoryInstanceStore;

use crate::task::TaskInstance;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Error types for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cannot reconnect instance: task definition '{definition_id}' is not registered")]
    UnknownDefinition { definition_id: String },

    #[error("store backend failed: {reason}")]
    Backend { reason: String },
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Restores runtime-only state (definition reference, lifecycle, a fresh
/// event support with the configured listener set) on an instance loaded
/// from persistence.
pub trait Connector: Send + Sync {
    fn reconnect(&self, instance: TaskInstance) -> StoreResult<TaskInstance>;
}

/// Strips runtime-only state before persistence.
pub trait Disconnector: Send + Sync {
    fn disconnect(&self, instance: TaskInstance) -> TaskInstance;
}

/// Persistence contract for task instances.
///
/// Every instance returned by `find_by_id`, `create`, `update` or `remove`
/// is reconnected. Corrupted rows are swallowed to `None` rather than
/// raised: the store is allowed to be eventually consistent with
/// best-effort deserialization.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Option<TaskInstance>;

    async fn exists(&self, id: Uuid) -> bool;

    /// Persist the disconnected form of a new instance and return the
    /// reconnected form.
    async fn create(&self, instance: TaskInstance) -> StoreResult<TaskInstance>;

    /// Persist the current state; does not change connection status of
    /// anything the caller holds.
    async fn update(&self, instance: TaskInstance) -> StoreResult<TaskInstance>;

    /// Delete and return the last reconnected state, or `None` if absent.
    async fn remove(&self, id: Uuid) -> Option<TaskInstance>;
}
