//! # Task Lifecycle
//!
//! The finite transition table for user-task statuses and the driver that
//! validates every requested transition against the current status and the
//! requesting identity's standing on the instance.
//!
//! ## Overview
//!
//! Transitions follow validate-then-mutate-then-notify: a request that fails
//! validation leaves the instance untouched and fires no events; a request
//! that passes fires exactly one before/after state-change event pair around
//! the mutation.

pub mod errors;
pub mod states;
pub mod transitions;

pub use errors::{LifeCycleError, LifeCycleResult};
pub use states::TaskStatus;
pub use transitions::{Transition, TransitionPolicy};

use crate::events::{EventMeta, EventPhase, EventSupport};
use crate::identity::Identity;
use crate::task::TaskInstance;
use errors::{invalid_transition, missing_data, unauthorized};
use serde_json::Value;
use tracing::{debug, info};
use transitions::{RuleTarget, TransitionRule, COMPLETE, FAIL, RESUME, SKIP, TRANSITION_TABLE};

/// Stateless driver over the user-task transition table.
///
/// One `LifeCycle` is shared (via `Arc`) by every reconnected instance; it
/// carries no per-instance state.
#[derive(Debug, Default)]
pub struct LifeCycle;

impl LifeCycle {
    pub fn new() -> Self {
        Self
    }

    /// List the transitions the given identity may currently request.
    ///
    /// Never errors: returns an empty list when the instance is terminal or
    /// the identity has no owner/potential-user/admin standing.
    pub fn allowed_transitions(
        &self,
        instance: &TaskInstance,
        identity: &Identity,
    ) -> Vec<Transition> {
        let current = instance.status();
        if current.is_terminal() {
            return Vec::new();
        }

        TRANSITION_TABLE
            .iter()
            .filter(|rule| rule.source == current)
            .filter(|rule| rule.id != SKIP || instance.skippable())
            .filter(|rule| self.authorized(rule, instance, identity))
            .map(|rule| Transition {
                id: rule.id.to_string(),
                source: rule.source,
                target: self.resolve_target(rule, instance),
                policy: rule.policy,
            })
            .collect()
    }

    /// Apply a named transition to the instance.
    ///
    /// Validates existence, authorization and required payload before any
    /// mutation. On success the status (and, for claim/start/release, the
    /// actual owner) changes and one before/after state-change event pair is
    /// delivered through `events`. On failure nothing changes and nothing
    /// fires.
    pub async fn transition(
        &self,
        instance: &mut TaskInstance,
        events: &EventSupport,
        transition_id: &str,
        data: Option<Value>,
        identity: &Identity,
    ) -> LifeCycleResult<TaskStatus> {
        let current = instance.status();

        let rule = TRANSITION_TABLE
            .iter()
            .find(|rule| rule.id == transition_id && rule.source == current)
            .ok_or_else(|| invalid_transition(transition_id, current))?;

        if rule.id == SKIP && !instance.skippable() {
            return Err(invalid_transition(transition_id, current));
        }

        if !self.authorized(rule, instance, identity) {
            return Err(unauthorized(&identity.user_id, transition_id));
        }

        if rule.id == FAIL && data.as_ref().map_or(true, Value::is_null) {
            return Err(missing_data(FAIL, "error"));
        }

        let target = self.resolve_target(rule, instance);
        let meta = EventMeta::new(instance.id(), &identity.user_id);

        events
            .fire_state_changed(
                meta.clone(),
                EventPhase::Before,
                transition_id,
                current,
                target,
            )
            .await?;

        self.apply(instance, rule, current, target, data, identity);

        events
            .fire_state_changed(meta, EventPhase::After, transition_id, current, target)
            .await?;

        info!(
            task_id = %instance.id(),
            transition = transition_id,
            from = %current,
            to = %target,
            actor = %identity.user_id,
            "task transition applied"
        );

        Ok(target)
    }

    /// Mutate the instance for an already-validated transition.
    fn apply(
        &self,
        instance: &mut TaskInstance,
        rule: &TransitionRule,
        current: TaskStatus,
        target: TaskStatus,
        data: Option<Value>,
        identity: &Identity,
    ) {
        match rule.id {
            transitions::CLAIM => instance.set_owner(Some(identity.user_id.clone())),
            transitions::START if current == TaskStatus::Ready => {
                instance.set_owner(Some(identity.user_id.clone()));
            }
            transitions::RELEASE | transitions::REASSIGN => instance.set_owner(None),
            _ => {}
        }

        match rule.id {
            transitions::SUSPEND => instance.set_resume_target(Some(current)),
            RESUME => instance.set_resume_target(None),
            _ => {}
        }

        if rule.id == COMPLETE || rule.id == FAIL {
            if let Some(value) = data {
                instance.merge_outputs(rule.id, value);
            }
        }

        instance.set_status(target);
        instance.touch();
    }

    fn resolve_target(&self, rule: &TransitionRule, instance: &TaskInstance) -> TaskStatus {
        match rule.target {
            RuleTarget::Fixed(status) => status,
            // Resume is only reachable from Suspended, which records its
            // origin; Ready is the fallback for legacy serialized instances.
            RuleTarget::ResumePrevious => instance.resume_target().unwrap_or(TaskStatus::Ready),
        }
    }

    fn authorized(&self, rule: &TransitionRule, instance: &TaskInstance, identity: &Identity) -> bool {
        if instance.is_admin(identity) {
            return true;
        }
        let granted = match rule.policy {
            TransitionPolicy::Admin => false,
            TransitionPolicy::Owner => instance.is_owner(identity),
            TransitionPolicy::PotentialOwner => instance.is_potential_owner(identity),
        };
        if !granted {
            debug!(
                task_id = %instance.id(),
                transition = rule.id,
                user = %identity.user_id,
                "identity lacks standing for transition"
            );
        }
        granted
    }
}
