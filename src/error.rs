//! Crate-wide error taxonomy.
//!
//! Module-level errors ([`crate::lifecycle::LifeCycleError`],
//! [`crate::events::ListenerError`], [`crate::store::StoreError`],
//! [`crate::scheduler::SchedulerError`]) convert into [`UserTaskError`] so
//! façade callers handle one type. Recovery guidance per variant:
//! invalid transitions are recoverable (re-query allowed transitions),
//! unauthorized and missing-data are surfaced to the caller, configuration
//! errors are fatal at instance-creation time, and store/scheduler failures
//! pass through unmodified with no automatic retry in the core.

use crate::events::ListenerError;
use crate::lifecycle::LifeCycleError;
use crate::scheduler::SchedulerError;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum UserTaskError {
    #[error(transparent)]
    LifeCycle(#[from] LifeCycleError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("task instance {task_id} is detached from its runtime")]
    Detached { task_id: Uuid },

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Result type alias for engine operations
pub type UserTaskResult<T> = Result<T, UserTaskError>;

/// Helper to create not-found errors
pub fn not_found(kind: &'static str, id: impl ToString) -> UserTaskError {
    UserTaskError::NotFound {
        kind,
        id: id.to_string(),
    }
}

/// Helper to create configuration errors
pub fn configuration_error(reason: impl Into<String>) -> UserTaskError {
    UserTaskError::Configuration {
        reason: reason.into(),
    }
}
