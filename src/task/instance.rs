//! # Task Instance
//!
//! The mutable aggregate for one live occurrence of a task definition:
//! status, owner, candidate sets, input/output model, comments, attachments
//! and pending deadline/reassignment timers.
//!
//! ## Overview
//!
//! All persistent state is plain serde data. Runtime-only bindings (the
//! definition `Arc`, the shared [`LifeCycle`] and the per-instance
//! [`EventSupport`]) live in a serde-skipped slot that is stripped on
//! disconnect and rebuilt on reconnect; a detached instance round-trips
//! losslessly through any serializer while its operations report
//! [`UserTaskError::Detached`] until a store connector re-attaches it.

use super::definition::TaskDefinition;
use super::timers::{DeadlinePhase, TimerPayload, TimerRecord};
use crate::error::{not_found, UserTaskError, UserTaskResult};
use crate::events::{EventMeta, EventPhase, EventSupport, VariableScope};
use crate::identity::Identity;
use crate::lifecycle::{LifeCycle, TaskStatus, Transition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Named input/output values plus free-form metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskModel {
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
}

/// A comment on a task instance, exclusively owned by it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Assigned when the comment is added; `None` only for unattached
    /// comment values
    pub id: Option<Uuid>,
    pub content: String,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// An attachment on a task instance; the content itself lives behind the
/// URI in an external document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Option<Uuid>,
    pub name: String,
    pub uri: String,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Runtime-only bindings restored by a store connector on reconnect.
/// Never serialized with the task data.
#[derive(Clone)]
pub struct RuntimeBindings {
    pub definition: Arc<TaskDefinition>,
    pub lifecycle: Arc<LifeCycle>,
    pub events: Arc<EventSupport>,
}

impl std::fmt::Debug for RuntimeBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBindings")
            .field("definition", &self.definition.id)
            .field("events", &self.events)
            .finish()
    }
}

/// One live occurrence of a task definition within a process instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    id: Uuid,
    definition_id: String,
    status: TaskStatus,
    actual_owner: Option<String>,
    potential_users: HashSet<String>,
    potential_groups: HashSet<String>,
    admin_users: HashSet<String>,
    admin_groups: HashSet<String>,
    excluded_users: HashSet<String>,
    skippable: bool,
    model: TaskModel,
    comments: Vec<Comment>,
    attachments: Vec<Attachment>,
    not_started_timers: Vec<TimerRecord>,
    not_completed_timers: Vec<TimerRecord>,
    /// Status to restore on resume; only set while suspended
    resume_target: Option<TaskStatus>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    runtime: Option<RuntimeBindings>,
}

impl TaskInstance {
    pub(crate) fn from_definition(definition: &TaskDefinition) -> Self {
        let now = Utc::now();
        let (not_started_timers, not_completed_timers) = definition
            .timers
            .iter()
            .map(super::timers::TimerTemplate::instantiate)
            .partition(|timer| timer.phase == DeadlinePhase::NotStarted);

        Self {
            id: Uuid::new_v4(),
            definition_id: definition.id.clone(),
            status: TaskStatus::default(),
            actual_owner: None,
            potential_users: definition.potential_users.clone(),
            potential_groups: definition.potential_groups.clone(),
            admin_users: definition.admin_users.clone(),
            admin_groups: definition.admin_groups.clone(),
            excluded_users: definition.excluded_users.clone(),
            skippable: definition.skippable,
            model: TaskModel::default(),
            comments: Vec::new(),
            attachments: Vec::new(),
            not_started_timers,
            not_completed_timers,
            resume_target: None,
            created_at: now,
            updated_at: now,
            runtime: None,
        }
    }

    // ----- accessors -----

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn definition_id(&self) -> &str {
        &self.definition_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn actual_owner(&self) -> Option<&str> {
        self.actual_owner.as_deref()
    }

    pub fn potential_users(&self) -> &HashSet<String> {
        &self.potential_users
    }

    pub fn potential_groups(&self) -> &HashSet<String> {
        &self.potential_groups
    }

    pub fn admin_users(&self) -> &HashSet<String> {
        &self.admin_users
    }

    pub fn admin_groups(&self) -> &HashSet<String> {
        &self.admin_groups
    }

    pub fn excluded_users(&self) -> &HashSet<String> {
        &self.excluded_users
    }

    pub fn skippable(&self) -> bool {
        self.skippable
    }

    pub fn model(&self) -> &TaskModel {
        &self.model
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn not_started_timers(&self) -> &[TimerRecord] {
        &self.not_started_timers
    }

    pub fn not_completed_timers(&self) -> &[TimerRecord] {
        &self.not_completed_timers
    }

    pub fn resume_target(&self) -> Option<TaskStatus> {
        self.resume_target
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The definition this instance was created from, when connected
    pub fn definition(&self) -> Option<Arc<TaskDefinition>> {
        self.runtime.as_ref().map(|rt| Arc::clone(&rt.definition))
    }

    // ----- connection lifecycle -----

    pub fn is_connected(&self) -> bool {
        self.runtime.is_some()
    }

    /// Attach runtime bindings; called by a store connector on reconnect.
    pub fn attach(&mut self, runtime: RuntimeBindings) {
        self.runtime = Some(runtime);
    }

    /// Strip runtime bindings; called by a store disconnector before
    /// serialization. Returns the old bindings so the caller can reset the
    /// event support.
    pub fn detach(&mut self) -> Option<RuntimeBindings> {
        self.runtime.take()
    }

    fn runtime(&self) -> UserTaskResult<&RuntimeBindings> {
        self.runtime
            .as_ref()
            .ok_or(UserTaskError::Detached { task_id: self.id })
    }

    fn events(&self) -> UserTaskResult<Arc<EventSupport>> {
        Ok(Arc::clone(&self.runtime()?.events))
    }

    // ----- authorization standing -----

    /// Admin standing: member of the admin-user set or of an admin group
    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.admin_users.contains(&identity.user_id)
            || identity.roles.iter().any(|role| self.admin_groups.contains(role))
    }

    /// Potential-owner standing: a non-excluded member of the potential
    /// user set or of a potential group
    pub fn is_potential_owner(&self, identity: &Identity) -> bool {
        if self.excluded_users.contains(&identity.user_id) {
            return false;
        }
        self.potential_users.contains(&identity.user_id)
            || identity
                .roles
                .iter()
                .any(|role| self.potential_groups.contains(role))
    }

    pub fn is_owner(&self, identity: &Identity) -> bool {
        self.actual_owner.as_deref() == Some(identity.user_id.as_str())
    }

    // ----- lifecycle operations -----

    /// Apply a named transition; see [`LifeCycle::transition`].
    pub async fn transition(
        &mut self,
        transition_id: &str,
        data: Option<Value>,
        identity: &Identity,
    ) -> UserTaskResult<TaskStatus> {
        let runtime = self.runtime()?.clone();
        let status = runtime
            .lifecycle
            .transition(self, &runtime.events, transition_id, data, identity)
            .await?;
        Ok(status)
    }

    /// Transitions the identity may currently request; empty when detached,
    /// terminal, or without standing.
    pub fn allowed_transitions(&self, identity: &Identity) -> Vec<Transition> {
        match &self.runtime {
            Some(runtime) => runtime.lifecycle.allowed_transitions(self, identity),
            None => Vec::new(),
        }
    }

    // ----- variables -----

    /// Replace-if-present input write. Fires a before/after variable-change
    /// event pair; a no-op set (old == new) is still delivered, since
    /// old == new is itself informative to listeners.
    pub async fn set_input(
        &mut self,
        name: &str,
        value: Value,
        identity: &Identity,
    ) -> UserTaskResult<()> {
        self.set_variable(VariableScope::Input, name, value, identity)
            .await
    }

    /// Replace-if-present output write, symmetric to [`Self::set_input`].
    pub async fn set_output(
        &mut self,
        name: &str,
        value: Value,
        identity: &Identity,
    ) -> UserTaskResult<()> {
        self.set_variable(VariableScope::Output, name, value, identity)
            .await
    }

    async fn set_variable(
        &mut self,
        scope: VariableScope,
        name: &str,
        value: Value,
        identity: &Identity,
    ) -> UserTaskResult<()> {
        let events = self.events()?;
        let meta = self.meta(identity);
        let old_value = match scope {
            VariableScope::Input => self.model.inputs.get(name).cloned(),
            VariableScope::Output => self.model.outputs.get(name).cloned(),
        };

        events
            .fire_variable_changed(
                meta.clone(),
                EventPhase::Before,
                scope,
                name,
                old_value.clone(),
                value.clone(),
            )
            .await?;

        match scope {
            VariableScope::Input => self.model.inputs.insert(name.to_string(), value.clone()),
            VariableScope::Output => self.model.outputs.insert(name.to_string(), value.clone()),
        };
        self.touch();

        events
            .fire_variable_changed(meta, EventPhase::After, scope, name, old_value, value)
            .await?;
        Ok(())
    }

    // ----- comments -----

    /// Append a comment, assigning it a fresh id. Fires the single-shot
    /// comment-added event.
    pub async fn add_comment(
        &mut self,
        content: &str,
        identity: &Identity,
    ) -> UserTaskResult<Comment> {
        let events = self.events()?;
        let comment = Comment {
            id: Some(Uuid::new_v4()),
            content: content.to_string(),
            updated_by: identity.user_id.clone(),
            updated_at: Utc::now(),
        };
        self.comments.push(comment.clone());
        self.touch();

        events
            .fire_comment_added(self.meta(identity), comment.clone())
            .await?;
        Ok(comment)
    }

    /// Update an existing comment's content. Fires a before/after pair;
    /// the before event carries the old comment, the after event the new.
    pub async fn update_comment(
        &mut self,
        comment_id: Uuid,
        content: &str,
        identity: &Identity,
    ) -> UserTaskResult<Comment> {
        let events = self.events()?;
        let index = self
            .comments
            .iter()
            .position(|c| c.id == Some(comment_id))
            .ok_or_else(|| not_found("comment", comment_id))?;

        let meta = self.meta(identity);
        let old = self.comments[index].clone();
        events
            .fire_comment_updated(meta.clone(), EventPhase::Before, old)
            .await?;

        let comment = &mut self.comments[index];
        comment.content = content.to_string();
        comment.updated_by = identity.user_id.clone();
        comment.updated_at = Utc::now();
        let updated = comment.clone();
        self.touch();

        events
            .fire_comment_updated(meta, EventPhase::After, updated.clone())
            .await?;
        Ok(updated)
    }

    /// Remove a comment by id. Fires a before/after deleted pair.
    pub async fn remove_comment(
        &mut self,
        comment_id: Uuid,
        identity: &Identity,
    ) -> UserTaskResult<Comment> {
        let events = self.events()?;
        let index = self
            .comments
            .iter()
            .position(|c| c.id == Some(comment_id))
            .ok_or_else(|| not_found("comment", comment_id))?;

        let meta = self.meta(identity);
        events
            .fire_comment_deleted(meta.clone(), EventPhase::Before, self.comments[index].clone())
            .await?;

        let removed = self.comments.remove(index);
        self.touch();

        events
            .fire_comment_deleted(meta, EventPhase::After, removed.clone())
            .await?;
        Ok(removed)
    }

    /// Lookup by id; absence is not an error.
    pub fn find_comment_by_id(&self, comment_id: Uuid) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == Some(comment_id))
    }

    // ----- attachments -----

    /// Append an attachment, assigning it a fresh id. Single-shot event,
    /// symmetric to comments.
    pub async fn add_attachment(
        &mut self,
        name: &str,
        uri: &str,
        identity: &Identity,
    ) -> UserTaskResult<Attachment> {
        let events = self.events()?;
        let attachment = Attachment {
            id: Some(Uuid::new_v4()),
            name: name.to_string(),
            uri: uri.to_string(),
            updated_by: identity.user_id.clone(),
            updated_at: Utc::now(),
        };
        self.attachments.push(attachment.clone());
        self.touch();

        events
            .fire_attachment_added(self.meta(identity), attachment.clone())
            .await?;
        Ok(attachment)
    }

    pub async fn update_attachment(
        &mut self,
        attachment_id: Uuid,
        name: &str,
        uri: &str,
        identity: &Identity,
    ) -> UserTaskResult<Attachment> {
        let events = self.events()?;
        let index = self
            .attachments
            .iter()
            .position(|a| a.id == Some(attachment_id))
            .ok_or_else(|| not_found("attachment", attachment_id))?;

        let meta = self.meta(identity);
        let old = self.attachments[index].clone();
        events
            .fire_attachment_updated(meta.clone(), EventPhase::Before, old)
            .await?;

        let attachment = &mut self.attachments[index];
        attachment.name = name.to_string();
        attachment.uri = uri.to_string();
        attachment.updated_by = identity.user_id.clone();
        attachment.updated_at = Utc::now();
        let updated = attachment.clone();
        self.touch();

        events
            .fire_attachment_updated(meta, EventPhase::After, updated.clone())
            .await?;
        Ok(updated)
    }

    pub async fn remove_attachment(
        &mut self,
        attachment_id: Uuid,
        identity: &Identity,
    ) -> UserTaskResult<Attachment> {
        let events = self.events()?;
        let index = self
            .attachments
            .iter()
            .position(|a| a.id == Some(attachment_id))
            .ok_or_else(|| not_found("attachment", attachment_id))?;

        let meta = self.meta(identity);
        events
            .fire_attachment_deleted(
                meta.clone(),
                EventPhase::Before,
                self.attachments[index].clone(),
            )
            .await?;

        let removed = self.attachments.remove(index);
        self.touch();

        events
            .fire_attachment_deleted(meta, EventPhase::After, removed.clone())
            .await?;
        Ok(removed)
    }

    pub fn find_attachment_by_id(&self, attachment_id: Uuid) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.id == Some(attachment_id))
    }

    // ----- deadlines -----

    /// Apply a fired deadline by id, called back by the external scheduler.
    ///
    /// Removing the timer from its pending set is the idempotence guard:
    /// redelivery from an at-least-once scheduler finds nothing pending and
    /// is a no-op, not an error. Returns whether the timer actually fired.
    pub async fn apply_deadline(&mut self, deadline_id: Uuid) -> UserTaskResult<bool> {
        let events = self.events()?;
        let meta = self.meta(&Identity::system());

        if let Some(index) = self
            .not_started_timers
            .iter()
            .position(|t| t.id == deadline_id)
        {
            let timer = self.not_started_timers.remove(index);
            self.touch();
            events
                .fire_not_started_deadline(meta.clone(), timer.clone())
                .await?;
            self.apply_timer_payload(&events, meta, timer).await?;
            return Ok(true);
        }

        if let Some(index) = self
            .not_completed_timers
            .iter()
            .position(|t| t.id == deadline_id)
        {
            let timer = self.not_completed_timers.remove(index);
            self.touch();
            events
                .fire_not_completed_deadline(meta.clone(), timer.clone())
                .await?;
            self.apply_timer_payload(&events, meta, timer).await?;
            return Ok(true);
        }

        debug!(
            task_id = %self.id,
            deadline_id = %deadline_id,
            "deadline already applied or unknown, ignoring redelivery"
        );
        Ok(false)
    }

    /// Reassignment timers swap the potential-user sets and announce the
    /// change as a before/after assignment event pair.
    async fn apply_timer_payload(
        &mut self,
        events: &EventSupport,
        meta: EventMeta,
        timer: TimerRecord,
    ) -> UserTaskResult<()> {
        if let TimerPayload::Reassignment {
            potential_users,
            potential_groups,
        } = timer.payload
        {
            let old: Vec<String> = sorted(&self.potential_users);
            let new: Vec<String> = sorted(&potential_users);

            events
                .fire_assignment_changed(
                    meta.clone(),
                    EventPhase::Before,
                    old.clone(),
                    new.clone(),
                    self.actual_owner.clone(),
                )
                .await?;

            self.potential_users = potential_users;
            self.potential_groups = potential_groups;
            self.touch();

            events
                .fire_assignment_changed(meta, EventPhase::After, old, new, self.actual_owner.clone())
                .await?;
        }
        Ok(())
    }

    // ----- crate-internal mutators used by the lifecycle and service -----

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub(crate) fn set_owner(&mut self, owner: Option<String>) {
        self.actual_owner = owner;
    }

    pub(crate) fn set_resume_target(&mut self, target: Option<TaskStatus>) {
        self.resume_target = target;
    }

    pub(crate) fn set_inputs(&mut self, inputs: HashMap<String, Value>) {
        self.model.inputs = inputs;
    }

    /// Fold a completion/failure payload into the output model. Objects
    /// merge key-by-key; anything else lands under the transition name.
    pub(crate) fn merge_outputs(&mut self, transition_id: &str, value: Value) {
        match value {
            Value::Object(map) => {
                for (key, entry) in map {
                    self.model.outputs.insert(key, entry);
                }
            }
            other => {
                self.model.outputs.insert(transition_id.to_string(), other);
            }
        }
    }

    pub(crate) fn assign_job_id(&mut self, timer_id: Uuid, job_id: String) {
        for timer in self
            .not_started_timers
            .iter_mut()
            .chain(self.not_completed_timers.iter_mut())
        {
            if timer.id == timer_id {
                timer.job_id = Some(job_id);
                return;
            }
        }
    }

    pub(crate) fn drain_not_started_timers(&mut self) -> Vec<TimerRecord> {
        std::mem::take(&mut self.not_started_timers)
    }

    pub(crate) fn drain_not_completed_timers(&mut self) -> Vec<TimerRecord> {
        std::mem::take(&mut self.not_completed_timers)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn meta(&self, identity: &Identity) -> EventMeta {
        EventMeta::new(self.id, &identity.user_id)
    }
}

fn sorted(set: &HashSet<String>) -> Vec<String> {
    let mut values: Vec<String> = set.iter().cloned().collect();
    values.sort();
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RecordingListener, UserTaskEvent};
    use crate::lifecycle::transitions::{CLAIM, COMPLETE, FAIL, RESUME, START, SUSPEND};
    use crate::task::timers::{DeadlinePhase, TimerTemplate};
    use serde_json::json;

    fn connected_instance(definition: &TaskDefinition) -> (TaskInstance, Arc<RecordingListener>) {
        let mut instance = TaskInstance::from_definition(definition);
        let listener = Arc::new(RecordingListener::new("recorder"));
        let events = Arc::new(EventSupport::new());
        events.add_event_listener(listener.clone());
        instance.attach(RuntimeBindings {
            definition: Arc::new(definition.clone()),
            lifecycle: Arc::new(LifeCycle::new()),
            events,
        });
        (instance, listener)
    }

    fn approve_definition() -> TaskDefinition {
        TaskDefinition::new("approve-order", "Approve order", "1")
            .with_potential_users(["alice"])
            .with_admin_users(["root"])
    }

    #[tokio::test]
    async fn test_claim_by_potential_user_reserves_and_assigns_owner() {
        let definition = approve_definition();
        let (mut instance, listener) = connected_instance(&definition);

        let status = instance
            .transition(CLAIM, None, &Identity::new("alice"))
            .await
            .unwrap();

        assert_eq!(status, TaskStatus::Reserved);
        assert_eq!(instance.actual_owner(), Some("alice"));
        assert_eq!(
            listener.event_types(),
            vec!["state_changed", "state_changed"]
        );
    }

    #[tokio::test]
    async fn test_claim_without_standing_is_unauthorized_and_fires_nothing() {
        let definition = approve_definition();
        let (mut instance, listener) = connected_instance(&definition);

        let result = instance.transition(CLAIM, None, &Identity::new("bob")).await;

        assert!(matches!(
            result,
            Err(UserTaskError::LifeCycle(
                crate::lifecycle::LifeCycleError::Unauthorized { .. }
            ))
        ));
        assert_eq!(instance.status(), TaskStatus::Created);
        assert!(instance.actual_owner().is_none());
        assert!(listener.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_excluded_user_cannot_claim() {
        let definition = approve_definition().with_excluded_users(["alice"]);
        let (mut instance, _listener) = connected_instance(&definition);

        let result = instance.transition(CLAIM, None, &Identity::new("alice")).await;
        assert!(matches!(result, Err(UserTaskError::LifeCycle(_))));
    }

    #[tokio::test]
    async fn test_fail_requires_error_payload() {
        let definition = approve_definition();
        let (mut instance, listener) = connected_instance(&definition);
        let alice = Identity::new("alice");

        instance.transition(CLAIM, None, &alice).await.unwrap();
        instance.transition(START, None, &alice).await.unwrap();
        listener.clear();

        let result = instance.transition(FAIL, None, &alice).await;
        assert!(matches!(
            result,
            Err(UserTaskError::LifeCycle(
                crate::lifecycle::LifeCycleError::MissingData { .. }
            ))
        ));
        assert_eq!(instance.status(), TaskStatus::InProgress);
        assert!(listener.recorded().is_empty());

        let status = instance
            .transition(FAIL, Some(json!({"error": "boom"})), &alice)
            .await
            .unwrap();
        assert_eq!(status, TaskStatus::Failed);
        assert_eq!(instance.model().outputs.get("error"), Some(&json!("boom")));
    }

    #[tokio::test]
    async fn test_complete_merges_outputs() {
        let definition = approve_definition();
        let (mut instance, _listener) = connected_instance(&definition);
        let alice = Identity::new("alice");

        instance.transition(CLAIM, None, &alice).await.unwrap();
        instance.transition(START, None, &alice).await.unwrap();
        let status = instance
            .transition(COMPLETE, Some(json!({"approved": true})), &alice)
            .await
            .unwrap();

        assert_eq!(status, TaskStatus::Completed);
        assert_eq!(
            instance.model().outputs.get("approved"),
            Some(&json!(true))
        );
    }

    #[tokio::test]
    async fn test_suspend_resume_restores_previous_status() {
        let definition = approve_definition();
        let (mut instance, _listener) = connected_instance(&definition);
        let alice = Identity::new("alice");
        let root = Identity::new("root");

        instance.transition(CLAIM, None, &alice).await.unwrap();
        instance.transition(START, None, &alice).await.unwrap();
        instance.transition(SUSPEND, None, &root).await.unwrap();
        assert_eq!(instance.status(), TaskStatus::Suspended);
        assert_eq!(instance.resume_target(), Some(TaskStatus::InProgress));

        let status = instance.transition(RESUME, None, &root).await.unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        assert_eq!(instance.resume_target(), None);
    }

    #[tokio::test]
    async fn test_skip_is_rejected_unless_skippable() {
        let definition = approve_definition();
        let (mut instance, _listener) = connected_instance(&definition);

        let result = instance
            .transition("skip", None, &Identity::new("alice"))
            .await;
        assert!(matches!(result, Err(UserTaskError::LifeCycle(_))));

        let skippable = approve_definition().with_skippable(true);
        let (mut instance, _listener) = connected_instance(&skippable);
        let status = instance
            .transition("skip", None, &Identity::new("alice"))
            .await
            .unwrap();
        assert_eq!(status, TaskStatus::Obsolete);
    }

    #[tokio::test]
    async fn test_allowed_transitions_for_potential_user_and_stranger() {
        let definition = approve_definition();
        let (instance, _listener) = connected_instance(&definition);

        let alice_allowed: Vec<String> = instance
            .allowed_transitions(&Identity::new("alice"))
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert!(alice_allowed.contains(&"claim".to_string()));
        assert!(!alice_allowed.contains(&"exit".to_string()));

        assert!(instance
            .allowed_transitions(&Identity::new("mallory"))
            .is_empty());

        let root_allowed: Vec<String> = instance
            .allowed_transitions(&Identity::new("root"))
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert!(root_allowed.contains(&"exit".to_string()));
        assert!(root_allowed.contains(&"activate".to_string()));
    }

    #[tokio::test]
    async fn test_allowed_transitions_empty_on_terminal_instance() {
        let definition = approve_definition();
        let (mut instance, _listener) = connected_instance(&definition);
        let alice = Identity::new("alice");

        instance.transition(CLAIM, None, &alice).await.unwrap();
        instance.transition(START, None, &alice).await.unwrap();
        instance
            .transition(COMPLETE, None, &alice)
            .await
            .unwrap();

        assert!(instance.allowed_transitions(&alice).is_empty());
        assert!(instance
            .allowed_transitions(&Identity::new("root"))
            .is_empty());
    }

    #[tokio::test]
    async fn test_variable_change_fires_pair_with_old_value() {
        let definition = approve_definition();
        let (mut instance, listener) = connected_instance(&definition);
        let alice = Identity::new("alice");

        instance
            .set_output("decision", json!("approved"), &alice)
            .await
            .unwrap();
        instance
            .set_output("decision", json!("rejected"), &alice)
            .await
            .unwrap();

        let recorded = listener.recorded();
        assert_eq!(recorded.len(), 4);
        match &recorded[2] {
            UserTaskEvent::VariableChanged {
                phase,
                old_value,
                new_value,
                ..
            } => {
                assert_eq!(*phase, EventPhase::Before);
                assert_eq!(old_value, &Some(json!("approved")));
                assert_eq!(new_value, &json!("rejected"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_comment_add_and_remove_events() {
        let definition = approve_definition();
        let (mut instance, listener) = connected_instance(&definition);
        let alice = Identity::new("alice");

        let comment = instance.add_comment("hello", &alice).await.unwrap();
        assert_eq!(instance.comments().len(), 1);
        assert!(comment.id.is_some());
        assert_eq!(comment.updated_by, "alice");

        let comment_id = comment.id.unwrap();
        assert!(instance.find_comment_by_id(comment_id).is_some());

        instance.remove_comment(comment_id, &alice).await.unwrap();
        assert!(instance.comments().is_empty());
        assert!(instance.find_comment_by_id(comment_id).is_none());

        let deleted_after = listener
            .recorded()
            .iter()
            .filter(|e| {
                e.event_type() == "comment_deleted" && e.phase() == Some(EventPhase::After)
            })
            .count();
        assert_eq!(deleted_after, 1);
    }

    #[tokio::test]
    async fn test_update_missing_comment_is_not_found() {
        let definition = approve_definition();
        let (mut instance, _listener) = connected_instance(&definition);

        let result = instance
            .update_comment(Uuid::new_v4(), "nope", &Identity::new("alice"))
            .await;
        assert!(matches!(result, Err(UserTaskError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_attachment_round_trip() {
        let definition = approve_definition();
        let (mut instance, listener) = connected_instance(&definition);
        let alice = Identity::new("alice");

        let attachment = instance
            .add_attachment("contract", "docs://contract.pdf", &alice)
            .await
            .unwrap();
        let id = attachment.id.unwrap();

        instance
            .update_attachment(id, "contract-v2", "docs://contract-v2.pdf", &alice)
            .await
            .unwrap();
        assert_eq!(
            instance.find_attachment_by_id(id).unwrap().name,
            "contract-v2"
        );

        instance.remove_attachment(id, &alice).await.unwrap();
        assert!(instance.attachments().is_empty());

        let types = listener.event_types();
        assert!(types.contains(&"attachment_added"));
        assert!(types.contains(&"attachment_updated"));
        assert!(types.contains(&"attachment_deleted"));
    }

    #[tokio::test]
    async fn test_apply_deadline_is_idempotent() {
        let definition = approve_definition().with_timer(TimerTemplate::notification(
            DeadlinePhase::NotStarted,
            60,
            json!({"subject": "task waiting"}),
        ));
        let (mut instance, listener) = connected_instance(&definition);
        let deadline_id = instance.not_started_timers()[0].id;

        assert!(instance.apply_deadline(deadline_id).await.unwrap());
        assert!(instance.not_started_timers().is_empty());

        // At-least-once redelivery: second call is a no-op, not an error.
        assert!(!instance.apply_deadline(deadline_id).await.unwrap());

        let fired = listener
            .recorded()
            .iter()
            .filter(|e| e.event_type() == "not_started_deadline")
            .count();
        assert_eq!(fired, 1);
    }

    #[tokio::test]
    async fn test_reassignment_deadline_swaps_potential_users() {
        let definition = approve_definition().with_timer(TimerTemplate::reassignment(
            DeadlinePhase::NotCompleted,
            60,
            ["carol", "dave"],
        ));
        let (mut instance, listener) = connected_instance(&definition);
        let deadline_id = instance.not_completed_timers()[0].id;

        instance.apply_deadline(deadline_id).await.unwrap();

        assert!(instance.potential_users().contains("carol"));
        assert!(instance.potential_users().contains("dave"));
        assert!(!instance.potential_users().contains("alice"));

        let types = listener.event_types();
        assert!(types.contains(&"not_completed_deadline"));
        assert_eq!(
            types
                .iter()
                .filter(|t| **t == "assignment_changed")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_detached_instance_rejects_operations() {
        let definition = approve_definition();
        let instance = TaskInstance::from_definition(&definition);
        assert!(!instance.is_connected());

        let mut detached = instance;
        let result = detached
            .transition(CLAIM, None, &Identity::new("alice"))
            .await;
        assert!(matches!(result, Err(UserTaskError::Detached { .. })));
        assert!(detached
            .allowed_transitions(&Identity::new("alice"))
            .is_empty());
    }
}
