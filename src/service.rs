//! # Task Service
//!
//! The engine façade: creates task instances from registered definitions,
//! drives lifecycle transitions, persists every change through the instance
//! store, and keeps the external deadline scheduler in sync with the
//! instance's pending timers.
//!
//! ## Overview
//!
//! The service owns the disconnect/reconnect wiring: instances leave the
//! store detached and come back with runtime bindings restored by
//! [`EngineConnector`], so callers always hold a usable instance. Instance
//! mutations (transitions, variables, comments, attachments, deadlines) go
//! through the service so the store stays authoritative; holding an
//! instance returned earlier and mutating it directly changes a stale copy.

use crate::config::EngineConfig;
use crate::assignment::StrategyRegistry;
use crate::error::{not_found, UserTaskResult};
use crate::events::{EventSupport, UserTaskEventListener};
use crate::identity::{Identity, IdentityProvider};
use crate::lifecycle::transitions::{
    CLAIM, COMPLETE, EXIT, FAIL, REASSIGN, RELEASE, RESUME, SKIP, START, SUSPEND,
};
use crate::lifecycle::{LifeCycle, TaskStatus, Transition};
use crate::scheduler::JobsService;
use crate::store::{
    Connector, Disconnector, InMemoryInstanceStore, InstanceStore, StoreError, StoreResult,
};
use crate::task::{
    Attachment, Comment, DefinitionRegistry, RuntimeBindings, TaskDefinition, TaskInstance,
    TimerKind, TimerRecord,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Store connector that restores runtime bindings from the engine's
/// registries: the definition by id, the shared lifecycle, and a fresh
/// [`EventSupport`] carrying the configured listener set.
pub struct EngineConnector {
    definitions: Arc<DefinitionRegistry>,
    lifecycle: Arc<LifeCycle>,
    listeners: Vec<Arc<dyn UserTaskEventListener>>,
}

impl EngineConnector {
    pub fn new(
        definitions: Arc<DefinitionRegistry>,
        lifecycle: Arc<LifeCycle>,
        listeners: Vec<Arc<dyn UserTaskEventListener>>,
    ) -> Self {
        Self {
            definitions,
            lifecycle,
            listeners,
        }
    }
}

impl Connector for EngineConnector {
    fn reconnect(&self, mut instance: TaskInstance) -> StoreResult<TaskInstance> {
        if instance.is_connected() {
            return Ok(instance);
        }
        let definition = self
            .definitions
            .get(instance.definition_id())
            .ok_or_else(|| StoreError::UnknownDefinition {
                definition_id: instance.definition_id().to_string(),
            })?;

        // Listener registration and in-memory listener state are
        // process-local; the event support is rebuilt, never restored.
        let events = Arc::new(EventSupport::new());
        for listener in &self.listeners {
            events.add_event_listener(Arc::clone(listener));
        }

        instance.attach(RuntimeBindings {
            definition,
            lifecycle: Arc::clone(&self.lifecycle),
            events,
        });
        Ok(instance)
    }
}

/// Store disconnector that strips runtime bindings and clears the event
/// support so no listener handle leaks into a detached instance.
pub struct EngineDisconnector;

impl Disconnector for EngineDisconnector {
    fn disconnect(&self, mut instance: TaskInstance) -> TaskInstance {
        if let Some(bindings) = instance.detach() {
            bindings.events.reset();
        }
        instance
    }
}

/// Engine façade over definitions, lifecycle, store and scheduler.
pub struct TaskService {
    store: Arc<dyn InstanceStore>,
    definitions: Arc<DefinitionRegistry>,
    strategies: Arc<StrategyRegistry>,
    jobs: Arc<dyn JobsService>,
    identity_provider: Arc<dyn IdentityProvider>,
    config: EngineConfig,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        definitions: Arc<DefinitionRegistry>,
        strategies: Arc<StrategyRegistry>,
        jobs: Arc<dyn JobsService>,
        identity_provider: Arc<dyn IdentityProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            definitions,
            strategies,
            jobs,
            identity_provider,
            config,
        }
    }

    /// Build a service over an [`InMemoryInstanceStore`] wired with the
    /// engine connector/disconnector pair and the given listener set.
    pub fn in_memory(
        definitions: Arc<DefinitionRegistry>,
        strategies: Arc<StrategyRegistry>,
        jobs: Arc<dyn JobsService>,
        identity_provider: Arc<dyn IdentityProvider>,
        listeners: Vec<Arc<dyn UserTaskEventListener>>,
        config: EngineConfig,
    ) -> Self {
        let lifecycle = Arc::new(LifeCycle::new());
        let connector = Arc::new(EngineConnector::new(
            Arc::clone(&definitions),
            lifecycle,
            listeners,
        ));
        let store = Arc::new(InMemoryInstanceStore::new(
            connector,
            Arc::new(EngineDisconnector),
        ));
        Self::new(
            store,
            definitions,
            strategies,
            jobs,
            identity_provider,
            config,
        )
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }

    /// Register a task definition for use by [`Self::create`].
    pub fn register_definition(&self, definition: TaskDefinition) -> Arc<TaskDefinition> {
        self.definitions.register(definition)
    }

    // ----- instance creation -----

    /// Create, persist and activate a new instance of a registered
    /// definition.
    ///
    /// All deadline and reassignment timers are registered with the jobs
    /// service, and the definition's assignment strategy is consulted once:
    /// if it proposes an owner the instance is claimed on their behalf,
    /// otherwise it stays unassigned for a potential owner to claim.
    pub async fn create(
        &self,
        definition_id: &str,
        inputs: HashMap<String, Value>,
    ) -> UserTaskResult<TaskInstance> {
        let definition = self
            .definitions
            .get(definition_id)
            .ok_or_else(|| not_found("task definition", definition_id))?;

        let mut instance = definition
            .create_instance(&self.strategies, &self.config.default_assignment_strategy)?;
        instance.set_inputs(inputs);

        let mut instance = self.store.create(instance).await?;
        self.schedule_timers(&mut instance).await?;
        self.reapply_assignment(&mut instance, None).await?;

        let instance = self.store.update(instance).await?;
        info!(
            task_id = %instance.id(),
            definition_id = %definition_id,
            status = %instance.status(),
            "created task instance"
        );
        Ok(instance)
    }

    /// Consult the definition's assignment strategy and claim on the
    /// proposed owner's behalf. `releasing_user` suppresses proposing the
    /// user who just gave the task back, so a release is not undone on the
    /// spot.
    async fn reapply_assignment(
        &self,
        instance: &mut TaskInstance,
        releasing_user: Option<&str>,
    ) -> UserTaskResult<()> {
        let Some(definition) = instance.definition() else {
            return Ok(());
        };
        let strategy_name = definition
            .strategy_name(&self.config.default_assignment_strategy)
            .to_string();
        let strategy = self.strategies.resolve(&strategy_name)?;

        if let Some(owner) =
            strategy.compute_assignment(instance, self.identity_provider.as_ref())
        {
            if releasing_user == Some(owner.as_str()) {
                return Ok(());
            }
            info!(
                task_id = %instance.id(),
                owner = %owner,
                strategy = %strategy_name,
                "auto-assigning task to computed owner"
            );
            instance.transition(CLAIM, None, &Identity::new(owner)).await?;
        }
        Ok(())
    }

    async fn schedule_timers(&self, instance: &mut TaskInstance) -> UserTaskResult<()> {
        let now = Utc::now();
        let pending: Vec<TimerRecord> = instance
            .not_started_timers()
            .iter()
            .chain(instance.not_completed_timers().iter())
            .cloned()
            .collect();

        for timer in pending {
            let fire_at = timer.expiration.fire_at(now);
            let job_id = self.jobs.schedule(instance.id(), timer.id, fire_at).await?;
            instance.assign_job_id(timer.id, job_id);
        }
        Ok(())
    }

    // ----- lifecycle -----

    /// Apply a named transition and persist the outcome.
    ///
    /// Reaching `InProgress` cancels the pending not-started timers;
    /// reaching a terminal status cancels all remaining timers and removes
    /// the instance from the store. The returned instance reflects the final
    /// state either way.
    pub async fn transition(
        &self,
        task_id: Uuid,
        transition_id: &str,
        data: Option<Value>,
        identity: &Identity,
    ) -> UserTaskResult<TaskInstance> {
        let mut instance = self.load(task_id).await?;
        let status = instance.transition(transition_id, data, identity).await?;

        // A task back in the pool gets its assignment strategy re-evaluated,
        // minus the user who just released it.
        if (transition_id == RELEASE || transition_id == REASSIGN)
            && instance.status().is_claimable()
        {
            let releasing = (transition_id == RELEASE).then_some(identity.user_id.as_str());
            self.reapply_assignment(&mut instance, releasing).await?;
        }

        if status == TaskStatus::InProgress {
            let obsolete = instance.drain_not_started_timers();
            self.cancel_jobs(&obsolete).await?;
        }

        if status.is_terminal() {
            let mut obsolete = instance.drain_not_started_timers();
            obsolete.extend(instance.drain_not_completed_timers());
            self.cancel_jobs(&obsolete).await?;
            let _ = self.store.remove(task_id).await;
            debug!(task_id = %task_id, status = %status, "terminal instance removed from store");
            return Ok(instance);
        }

        Ok(self.store.update(instance).await?)
    }

    async fn cancel_jobs(&self, timers: &[TimerRecord]) -> UserTaskResult<()> {
        for timer in timers {
            if let Some(job_id) = &timer.job_id {
                self.jobs.cancel(job_id).await?;
            }
        }
        Ok(())
    }

    pub async fn claim(&self, task_id: Uuid, identity: &Identity) -> UserTaskResult<TaskInstance> {
        self.transition(task_id, CLAIM, None, identity).await
    }

    pub async fn start(&self, task_id: Uuid, identity: &Identity) -> UserTaskResult<TaskInstance> {
        self.transition(task_id, START, None, identity).await
    }

    pub async fn release(
        &self,
        task_id: Uuid,
        identity: &Identity,
    ) -> UserTaskResult<TaskInstance> {
        self.transition(task_id, RELEASE, None, identity).await
    }

    pub async fn complete(
        &self,
        task_id: Uuid,
        data: Option<Value>,
        identity: &Identity,
    ) -> UserTaskResult<TaskInstance> {
        self.transition(task_id, COMPLETE, data, identity).await
    }

    pub async fn fail(
        &self,
        task_id: Uuid,
        data: Value,
        identity: &Identity,
    ) -> UserTaskResult<TaskInstance> {
        self.transition(task_id, FAIL, Some(data), identity).await
    }

    pub async fn skip(&self, task_id: Uuid, identity: &Identity) -> UserTaskResult<TaskInstance> {
        self.transition(task_id, SKIP, None, identity).await
    }

    pub async fn suspend(
        &self,
        task_id: Uuid,
        identity: &Identity,
    ) -> UserTaskResult<TaskInstance> {
        self.transition(task_id, SUSPEND, None, identity).await
    }

    pub async fn resume(
        &self,
        task_id: Uuid,
        identity: &Identity,
    ) -> UserTaskResult<TaskInstance> {
        self.transition(task_id, RESUME, None, identity).await
    }

    /// Administrative abort: exits the task from any non-terminal status.
    pub async fn abort(&self, task_id: Uuid, identity: &Identity) -> UserTaskResult<TaskInstance> {
        self.transition(task_id, EXIT, None, identity).await
    }

    /// Transitions the identity may currently request on the instance.
    pub async fn allowed_transitions(
        &self,
        task_id: Uuid,
        identity: &Identity,
    ) -> UserTaskResult<Vec<Transition>> {
        let instance = self.load(task_id).await?;
        Ok(instance.allowed_transitions(identity))
    }

    // ----- variables -----

    pub async fn set_input(
        &self,
        task_id: Uuid,
        name: &str,
        value: Value,
    ) -> UserTaskResult<TaskInstance> {
        let identity = self.identity_provider.identity();
        let mut instance = self.load(task_id).await?;
        instance.set_input(name, value, &identity).await?;
        Ok(self.store.update(instance).await?)
    }

    pub async fn set_output(
        &self,
        task_id: Uuid,
        name: &str,
        value: Value,
    ) -> UserTaskResult<TaskInstance> {
        let identity = self.identity_provider.identity();
        let mut instance = self.load(task_id).await?;
        instance.set_output(name, value, &identity).await?;
        Ok(self.store.update(instance).await?)
    }

    // ----- comments -----

    pub async fn add_comment(&self, task_id: Uuid, content: &str) -> UserTaskResult<Comment> {
        let identity = self.identity_provider.identity();
        let mut instance = self.load(task_id).await?;
        let comment = instance.add_comment(content, &identity).await?;
        self.store.update(instance).await?;
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        task_id: Uuid,
        comment_id: Uuid,
        content: &str,
    ) -> UserTaskResult<Comment> {
        let identity = self.identity_provider.identity();
        let mut instance = self.load(task_id).await?;
        let comment = instance.update_comment(comment_id, content, &identity).await?;
        self.store.update(instance).await?;
        Ok(comment)
    }

    pub async fn remove_comment(&self, task_id: Uuid, comment_id: Uuid) -> UserTaskResult<Comment> {
        let identity = self.identity_provider.identity();
        let mut instance = self.load(task_id).await?;
        let comment = instance.remove_comment(comment_id, &identity).await?;
        self.store.update(instance).await?;
        Ok(comment)
    }

    pub async fn find_comment_by_id(
        &self,
        task_id: Uuid,
        comment_id: Uuid,
    ) -> UserTaskResult<Option<Comment>> {
        let instance = self.load(task_id).await?;
        Ok(instance.find_comment_by_id(comment_id).cloned())
    }

    // ----- attachments -----

    pub async fn add_attachment(
        &self,
        task_id: Uuid,
        name: &str,
        uri: &str,
    ) -> UserTaskResult<Attachment> {
        let identity = self.identity_provider.identity();
        let mut instance = self.load(task_id).await?;
        let attachment = instance.add_attachment(name, uri, &identity).await?;
        self.store.update(instance).await?;
        Ok(attachment)
    }

    pub async fn update_attachment(
        &self,
        task_id: Uuid,
        attachment_id: Uuid,
        name: &str,
        uri: &str,
    ) -> UserTaskResult<Attachment> {
        let identity = self.identity_provider.identity();
        let mut instance = self.load(task_id).await?;
        let attachment = instance
            .update_attachment(attachment_id, name, uri, &identity)
            .await?;
        self.store.update(instance).await?;
        Ok(attachment)
    }

    pub async fn remove_attachment(
        &self,
        task_id: Uuid,
        attachment_id: Uuid,
    ) -> UserTaskResult<Attachment> {
        let identity = self.identity_provider.identity();
        let mut instance = self.load(task_id).await?;
        let attachment = instance.remove_attachment(attachment_id, &identity).await?;
        self.store.update(instance).await?;
        Ok(attachment)
    }

    pub async fn find_attachment_by_id(
        &self,
        task_id: Uuid,
        attachment_id: Uuid,
    ) -> UserTaskResult<Option<Attachment>> {
        let instance = self.load(task_id).await?;
        Ok(instance.find_attachment_by_id(attachment_id).cloned())
    }

    // ----- deadlines -----

    /// Scheduler callback: apply a fired deadline to its instance.
    ///
    /// Tolerates at-least-once delivery and races with completion: a missing
    /// instance or an already-applied deadline is logged and ignored.
    pub async fn apply_deadline(&self, task_id: Uuid, deadline_id: Uuid) -> UserTaskResult<()> {
        let Some(mut instance) = self.store.find_by_id(task_id).await else {
            warn!(
                task_id = %task_id,
                deadline_id = %deadline_id,
                "deadline fired for unknown or already-removed instance, ignoring"
            );
            return Ok(());
        };

        let was_reassignment = instance
            .not_started_timers()
            .iter()
            .chain(instance.not_completed_timers().iter())
            .find(|t| t.id == deadline_id)
            .map(|t| t.kind() == TimerKind::Reassignment)
            .unwrap_or(false);

        if instance.apply_deadline(deadline_id).await? {
            if was_reassignment && instance.status().is_claimable() {
                self.reapply_assignment(&mut instance, None).await?;
            }
            self.store.update(instance).await?;
        }
        Ok(())
    }

    // ----- lookup -----

    pub async fn find_by_id(&self, task_id: Uuid) -> Option<TaskInstance> {
        self.store.find_by_id(task_id).await
    }

    pub async fn exists(&self, task_id: Uuid) -> bool {
        self.store.exists(task_id).await
    }

    async fn load(&self, task_id: Uuid) -> UserTaskResult<TaskInstance> {
        self.store
            .find_by_id(task_id)
            .await
            .ok_or_else(|| not_found("task instance", task_id))
    }
}
