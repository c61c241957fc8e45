use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

/// Which lifecycle phase a timer guards against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlinePhase {
    /// Fires if the task has not been started by the deadline
    NotStarted,
    /// Fires if the task has not been completed by the deadline
    NotCompleted,
}

/// What kind of escalation a timer carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Deadline,
    Reassignment,
}

/// When a timer fires: at an absolute instant or relative to creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TimerExpiration {
    At(DateTime<Utc>),
    InSeconds(i64),
}

impl TimerExpiration {
    /// Resolve the absolute firing instant, relative expressions anchored
    /// at `now`
    pub fn fire_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::At(instant) => *instant,
            Self::InSeconds(seconds) => now + Duration::seconds(*seconds),
        }
    }

    /// Relative expirations must lie in the future; absolute ones are
    /// accepted as-is since a definition may be loaded after its deadline.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::At(_) => true,
            Self::InSeconds(seconds) => *seconds > 0,
        }
    }
}

/// Payload delivered when a timer fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerPayload {
    /// Free-form notification content handed to listeners
    Notification { content: Value },
    /// New candidate sets applied to the instance
    Reassignment {
        potential_users: HashSet<String>,
        potential_groups: HashSet<String>,
    },
}

/// One pending deadline or reassignment on a task instance.
///
/// Flat tagged record: the kind is derived from the payload, the phase
/// decides which pending set holds it, and `job_id` ties it to the external
/// scheduler job that will fire it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub id: Uuid,
    pub job_id: Option<String>,
    pub phase: DeadlinePhase,
    pub expiration: TimerExpiration,
    pub payload: TimerPayload,
}

impl TimerRecord {
    pub fn kind(&self) -> TimerKind {
        match self.payload {
            TimerPayload::Notification { .. } => TimerKind::Deadline,
            TimerPayload::Reassignment { .. } => TimerKind::Reassignment,
        }
    }
}

/// Timer template on a task definition; instantiated into a fresh
/// [`TimerRecord`] for every created instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerTemplate {
    pub phase: DeadlinePhase,
    pub expiration: TimerExpiration,
    pub payload: TimerPayload,
}

impl TimerTemplate {
    /// Convenience constructor for a relative notification deadline
    pub fn notification(phase: DeadlinePhase, seconds: i64, content: Value) -> Self {
        Self {
            phase,
            expiration: TimerExpiration::InSeconds(seconds),
            payload: TimerPayload::Notification { content },
        }
    }

    /// Convenience constructor for a relative reassignment
    pub fn reassignment<I, S>(phase: DeadlinePhase, seconds: i64, potential_users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phase,
            expiration: TimerExpiration::InSeconds(seconds),
            payload: TimerPayload::Reassignment {
                potential_users: potential_users.into_iter().map(Into::into).collect(),
                potential_groups: HashSet::new(),
            },
        }
    }

    pub(crate) fn instantiate(&self) -> TimerRecord {
        TimerRecord {
            id: Uuid::new_v4(),
            job_id: None,
            phase: self.phase,
            expiration: self.expiration,
            payload: self.payload.clone(),
        }
    }
}
