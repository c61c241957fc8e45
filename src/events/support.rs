//! # Event Support
//!
//! Ordered listener registry and typed event fan-out, scoped to one
//! reconnected task instance.
//!
//! ## Overview
//!
//! `EventSupport` delivers every event to all registered listeners in
//! registration order. Fan-out iterates over a snapshot of the registry, so
//! a listener added or removed mid-delivery never races the iteration.
//! Listener failures are not swallowed here: the first error aborts the
//! remaining deliveries and propagates to the caller, which decides policy
//! (a unit-of-work listener failure should abort the operation, a telemetry
//! listener should be wrapped with [`IsolatingListener`] instead).
//!
//! `EventSupport` is rebuilt, never restored, on every reconnect: listener
//! identity and in-memory listener state are process-local and must not be
//! serialized with the task data.

use super::types::{
    EventMeta, EventPhase, UserTaskEvent, VariableScope,
};
use crate::lifecycle::TaskStatus;
use crate::task::{Attachment, Comment, TimerRecord};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Error raised by a listener during fan-out
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("listener '{listener}' rejected event '{event_type}': {reason}")]
    Rejected {
        listener: String,
        event_type: String,
        reason: String,
    },

    #[error("listener '{listener}' failed")]
    Failed {
        listener: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Result type alias for listener callbacks
pub type ListenerResult = Result<(), ListenerError>;

/// Observer of user-task events
#[async_trait]
pub trait UserTaskEventListener: Send + Sync {
    /// Handle one event. Returning an error aborts the fan-out; wrap the
    /// listener in [`IsolatingListener`] if its failures should not affect
    /// the triggering operation.
    async fn on_event(&self, event: &UserTaskEvent) -> ListenerResult;

    /// Listener name for logging and error reporting
    fn listener_name(&self) -> &str {
        "unnamed_listener"
    }
}

/// Ordered listener registry with snapshot-on-iterate fan-out.
///
/// One instance per reconnected [`crate::task::TaskInstance`]; never a
/// process-wide singleton.
#[derive(Default)]
pub struct EventSupport {
    listeners: RwLock<Vec<Arc<dyn UserTaskEventListener>>>,
}

impl std::fmt::Debug for EventSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSupport")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventSupport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Idempotent: re-adding the same listener
    /// instance is a no-op, so reconnect wiring can be repeated safely.
    pub fn add_event_listener(&self, listener: Arc<dyn UserTaskEventListener>) {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            debug!(
                listener = listener.listener_name(),
                "listener already registered, skipping"
            );
            return;
        }
        listeners.push(listener);
    }

    pub fn remove_event_listener(&self, listener: &Arc<dyn UserTaskEventListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Drop all listeners. Called when an instance is torn down or
    /// disconnected, so bindings never leak into a detached instance.
    pub fn reset(&self) {
        self.listeners.write().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to all listeners in registration order. Stops at
    /// the first listener error and propagates it.
    async fn dispatch(&self, event: UserTaskEvent) -> ListenerResult {
        let snapshot: Vec<Arc<dyn UserTaskEventListener>> = self.listeners.read().clone();
        for listener in snapshot {
            listener.on_event(&event).await?;
        }
        Ok(())
    }

    pub async fn fire_state_changed(
        &self,
        meta: EventMeta,
        phase: EventPhase,
        transition: &str,
        old_status: TaskStatus,
        new_status: TaskStatus,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::StateChanged {
            meta,
            phase,
            transition: transition.to_string(),
            old_status,
            new_status,
        })
        .await
    }

    pub async fn fire_assignment_changed(
        &self,
        meta: EventMeta,
        phase: EventPhase,
        old_potential_users: Vec<String>,
        new_potential_users: Vec<String>,
        actual_owner: Option<String>,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::AssignmentChanged {
            meta,
            phase,
            old_potential_users,
            new_potential_users,
            actual_owner,
        })
        .await
    }

    pub async fn fire_variable_changed(
        &self,
        meta: EventMeta,
        phase: EventPhase,
        scope: VariableScope,
        name: &str,
        old_value: Option<Value>,
        new_value: Value,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::VariableChanged {
            meta,
            phase,
            scope,
            name: name.to_string(),
            old_value,
            new_value,
        })
        .await
    }

    pub async fn fire_comment_added(&self, meta: EventMeta, comment: Comment) -> ListenerResult {
        self.dispatch(UserTaskEvent::CommentAdded { meta, comment })
            .await
    }

    pub async fn fire_comment_updated(
        &self,
        meta: EventMeta,
        phase: EventPhase,
        comment: Comment,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::CommentUpdated {
            meta,
            phase,
            comment,
        })
        .await
    }

    pub async fn fire_comment_deleted(
        &self,
        meta: EventMeta,
        phase: EventPhase,
        comment: Comment,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::CommentDeleted {
            meta,
            phase,
            comment,
        })
        .await
    }

    pub async fn fire_attachment_added(
        &self,
        meta: EventMeta,
        attachment: Attachment,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::AttachmentAdded { meta, attachment })
            .await
    }

    pub async fn fire_attachment_updated(
        &self,
        meta: EventMeta,
        phase: EventPhase,
        attachment: Attachment,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::AttachmentUpdated {
            meta,
            phase,
            attachment,
        })
        .await
    }

    pub async fn fire_attachment_deleted(
        &self,
        meta: EventMeta,
        phase: EventPhase,
        attachment: Attachment,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::AttachmentDeleted {
            meta,
            phase,
            attachment,
        })
        .await
    }

    pub async fn fire_not_started_deadline(
        &self,
        meta: EventMeta,
        timer: TimerRecord,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::NotStartedDeadline { meta, timer })
            .await
    }

    pub async fn fire_not_completed_deadline(
        &self,
        meta: EventMeta,
        timer: TimerRecord,
    ) -> ListenerResult {
        self.dispatch(UserTaskEvent::NotCompletedDeadline { meta, timer })
            .await
    }
}

/// Listener that queues events during an operation and delivers them to a
/// sink exactly once on commit, or drops them on rollback.
///
/// This is the listener the reconnecting façade registers so that event
/// delivery follows the surrounding unit of work: its own failure (on
/// commit) should abort the unit of work, which is why it is not wrapped in
/// [`IsolatingListener`].
pub struct UnitOfWorkListener {
    sink: Arc<dyn UserTaskEventListener>,
    queued: Mutex<Vec<UserTaskEvent>>,
}

impl UnitOfWorkListener {
    pub fn new(sink: Arc<dyn UserTaskEventListener>) -> Self {
        Self {
            sink,
            queued: Mutex::new(Vec::new()),
        }
    }

    /// Deliver all queued events to the sink in order. The queue is drained
    /// first, so a partially failed commit never redelivers.
    pub async fn commit(&self) -> ListenerResult {
        let drained: Vec<UserTaskEvent> = std::mem::take(&mut *self.queued.lock());
        for event in &drained {
            self.sink.on_event(event).await?;
        }
        Ok(())
    }

    /// Drop all queued events without delivering them.
    pub fn rollback(&self) {
        self.queued.lock().clear();
    }

    pub fn pending(&self) -> usize {
        self.queued.lock().len()
    }
}

#[async_trait]
impl UserTaskEventListener for UnitOfWorkListener {
    async fn on_event(&self, event: &UserTaskEvent) -> ListenerResult {
        self.queued.lock().push(event.clone());
        Ok(())
    }

    fn listener_name(&self) -> &str {
        "unit_of_work_listener"
    }
}

/// Wrapper that isolates a listener's failures: errors are logged and
/// swallowed so a telemetry listener can never abort the triggering
/// operation.
pub struct IsolatingListener {
    inner: Arc<dyn UserTaskEventListener>,
}

impl IsolatingListener {
    pub fn new(inner: Arc<dyn UserTaskEventListener>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl UserTaskEventListener for IsolatingListener {
    async fn on_event(&self, event: &UserTaskEvent) -> ListenerResult {
        if let Err(error) = self.inner.on_event(event).await {
            warn!(
                listener = self.inner.listener_name(),
                event_type = event.event_type(),
                %error,
                "isolated listener failure"
            );
        }
        Ok(())
    }

    fn listener_name(&self) -> &str {
        "isolating_listener"
    }
}

/// Listener that records the events it sees, in order. Useful for tests
/// and diagnostics.
#[derive(Default)]
pub struct RecordingListener {
    name: String,
    events: Mutex<Vec<UserTaskEvent>>,
}

impl RecordingListener {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<UserTaskEvent> {
        self.events.lock().clone()
    }

    /// Event-type names in delivery order, the usual test assertion shape
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(UserTaskEvent::event_type).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl UserTaskEventListener for RecordingListener {
    async fn on_event(&self, event: &UserTaskEvent) -> ListenerResult {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn listener_name(&self) -> &str {
        &self.name
    }
}
