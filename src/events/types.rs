use crate::lifecycle::TaskStatus;
use crate::task::{Attachment, Comment, TimerRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Shared envelope for every event: which instance, who acted, when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    pub instance_id: Uuid,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

impl EventMeta {
    pub fn new(instance_id: Uuid, actor: impl Into<String>) -> Self {
        Self {
            instance_id,
            actor: actor.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Before/after pairing for mutating operations. Single-shot events
/// (comment-added, deadline firings) carry no phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    Before,
    After,
}

/// Which half of the task model a variable write touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    Input,
    Output,
}

/// Events delivered to registered listeners for every observable change on
/// a task instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UserTaskEvent {
    /// Fired as a before/after pair around every successful transition
    StateChanged {
        meta: EventMeta,
        phase: EventPhase,
        transition: String,
        old_status: TaskStatus,
        new_status: TaskStatus,
    },
    /// Fired as a before/after pair when the potential-user set or actual
    /// owner is recomputed (reassignment deadlines)
    AssignmentChanged {
        meta: EventMeta,
        phase: EventPhase,
        old_potential_users: Vec<String>,
        new_potential_users: Vec<String>,
        actual_owner: Option<String>,
    },
    /// Fired as a before/after pair around input/output writes; `old_value`
    /// is `None` on first set, and old == new is delivered rather than
    /// suppressed
    VariableChanged {
        meta: EventMeta,
        phase: EventPhase,
        scope: VariableScope,
        name: String,
        old_value: Option<Value>,
        new_value: Value,
    },
    /// Single-shot: there is no pre-existence state worth observing
    CommentAdded { meta: EventMeta, comment: Comment },
    CommentUpdated {
        meta: EventMeta,
        phase: EventPhase,
        comment: Comment,
    },
    CommentDeleted {
        meta: EventMeta,
        phase: EventPhase,
        comment: Comment,
    },
    /// Single-shot, symmetric to `CommentAdded`
    AttachmentAdded {
        meta: EventMeta,
        attachment: Attachment,
    },
    AttachmentUpdated {
        meta: EventMeta,
        phase: EventPhase,
        attachment: Attachment,
    },
    AttachmentDeleted {
        meta: EventMeta,
        phase: EventPhase,
        attachment: Attachment,
    },
    /// A not-started deadline fired; single-shot and idempotent at the
    /// instance level
    NotStartedDeadline { meta: EventMeta, timer: TimerRecord },
    /// A not-completed deadline fired
    NotCompletedDeadline { meta: EventMeta, timer: TimerRecord },
}

impl UserTaskEvent {
    /// String name of the event family for logging and test assertions
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::AssignmentChanged { .. } => "assignment_changed",
            Self::VariableChanged { .. } => "variable_changed",
            Self::CommentAdded { .. } => "comment_added",
            Self::CommentUpdated { .. } => "comment_updated",
            Self::CommentDeleted { .. } => "comment_deleted",
            Self::AttachmentAdded { .. } => "attachment_added",
            Self::AttachmentUpdated { .. } => "attachment_updated",
            Self::AttachmentDeleted { .. } => "attachment_deleted",
            Self::NotStartedDeadline { .. } => "not_started_deadline",
            Self::NotCompletedDeadline { .. } => "not_completed_deadline",
        }
    }

    pub fn meta(&self) -> &EventMeta {
        match self {
            Self::StateChanged { meta, .. }
            | Self::AssignmentChanged { meta, .. }
            | Self::VariableChanged { meta, .. }
            | Self::CommentAdded { meta, .. }
            | Self::CommentUpdated { meta, .. }
            | Self::CommentDeleted { meta, .. }
            | Self::AttachmentAdded { meta, .. }
            | Self::AttachmentUpdated { meta, .. }
            | Self::AttachmentDeleted { meta, .. }
            | Self::NotStartedDeadline { meta, .. }
            | Self::NotCompletedDeadline { meta, .. } => meta,
        }
    }

    /// Phase of the event, `None` for single-shot families
    pub fn phase(&self) -> Option<EventPhase> {
        match self {
            Self::StateChanged { phase, .. }
            | Self::AssignmentChanged { phase, .. }
            | Self::VariableChanged { phase, .. }
            | Self::CommentUpdated { phase, .. }
            | Self::CommentDeleted { phase, .. }
            | Self::AttachmentUpdated { phase, .. }
            | Self::AttachmentDeleted { phase, .. } => Some(*phase),
            Self::CommentAdded { .. }
            | Self::AttachmentAdded { .. }
            | Self::NotStartedDeadline { .. }
            | Self::NotCompletedDeadline { .. } => None,
        }
    }
}
