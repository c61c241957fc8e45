//! Jobs-service collaborator contract.
//!
//! The engine registers a deadline by submitting
//! `(instance_id, deadline_id, fire_at)`; the scheduler later calls back
//! into [`crate::service::TaskService::apply_deadline`] with the same pair.
//! Transport is out of scope; only the callback shape is fixed. Delivery is
//! assumed at-least-once, which is safe because deadline application is
//! idempotent on the instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Error types for scheduler interactions
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("scheduler backend failed: {reason}")]
    Backend { reason: String },
}

/// Result type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// External job scheduler that fires registered deadlines
#[async_trait]
pub trait JobsService: Send + Sync {
    /// Register a job; returns the backend's job id for later cancellation.
    async fn schedule(
        &self,
        instance_id: Uuid,
        deadline_id: Uuid,
        fire_at: DateTime<Utc>,
    ) -> SchedulerResult<String>;

    /// Cancel a previously scheduled job. Cancelling an already-fired job
    /// is a no-op.
    async fn cancel(&self, job_id: &str) -> SchedulerResult<()>;
}

/// One registered job, as seen by the recording scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
    pub job_id: String,
    pub instance_id: Uuid,
    pub deadline_id: Uuid,
    pub fire_at: DateTime<Utc>,
}

/// Scheduler that records registrations and cancellations without firing
/// anything. Useful for tests and for deployments that poll deadlines out
/// of band.
#[derive(Default)]
pub struct RecordingJobsService {
    scheduled: Mutex<Vec<ScheduledJob>>,
    cancelled: Mutex<Vec<String>>,
}

impl RecordingJobsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<ScheduledJob> {
        self.scheduled.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }
}

#[async_trait]
impl JobsService for RecordingJobsService {
    async fn schedule(
        &self,
        instance_id: Uuid,
        deadline_id: Uuid,
        fire_at: DateTime<Utc>,
    ) -> SchedulerResult<String> {
        let job_id = format!("job-{deadline_id}");
        self.scheduled.lock().push(ScheduledJob {
            job_id: job_id.clone(),
            instance_id,
            deadline_id,
            fire_at,
        });
        Ok(job_id)
    }

    async fn cancel(&self, job_id: &str) -> SchedulerResult<()> {
        self.cancelled.lock().push(job_id.to_string());
        Ok(())
    }
}
