//! # Task Definition
//!
//! Immutable template describing a human task node: identity, display
//! metadata, default candidate sets, and deadline/reassignment templates.
//! Created at process-definition load time and shared read-only (via `Arc`)
//! by every instance of that definition.

use super::instance::TaskInstance;
use super::timers::TimerTemplate;
use crate::assignment::StrategyRegistry;
use crate::error::{configuration_error, UserTaskResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Immutable template for a user task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub name: String,
    pub version: String,
    pub potential_users: HashSet<String>,
    pub potential_groups: HashSet<String>,
    pub admin_users: HashSet<String>,
    pub admin_groups: HashSet<String>,
    pub excluded_users: HashSet<String>,
    pub skippable: bool,
    /// Ordered deadline/reassignment templates instantiated per instance
    pub timers: Vec<TimerTemplate>,
    /// Named assignment policy; `None` selects the engine default
    pub assignment_strategy: Option<String>,
}

impl TaskDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            potential_users: HashSet::new(),
            potential_groups: HashSet::new(),
            admin_users: HashSet::new(),
            admin_groups: HashSet::new(),
            excluded_users: HashSet::new(),
            skippable: false,
            timers: Vec::new(),
            assignment_strategy: None,
        }
    }

    pub fn with_potential_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.potential_users = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_admin_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_users = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excluded_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_users = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timer(mut self, timer: TimerTemplate) -> Self {
        self.timers.push(timer);
        self
    }

    pub fn with_assignment_strategy(mut self, name: impl Into<String>) -> Self {
        self.assignment_strategy = Some(name.into());
        self
    }

    pub fn with_skippable(mut self, skippable: bool) -> Self {
        self.skippable = skippable;
        self
    }

    /// Name of the strategy this definition selects, or the engine default.
    pub fn strategy_name<'a>(&'a self, default_strategy: &'a str) -> &'a str {
        self.assignment_strategy.as_deref().unwrap_or(default_strategy)
    }

    /// Create a new detached instance of this definition.
    ///
    /// Fails fast with a configuration error when the selected assignment
    /// strategy is not registered or a timer template is malformed; neither
    /// problem is recoverable at runtime.
    pub fn create_instance(
        &self,
        strategies: &StrategyRegistry,
        default_strategy: &str,
    ) -> UserTaskResult<TaskInstance> {
        let strategy_name = self.strategy_name(default_strategy);
        strategies.resolve(strategy_name)?;
        self.validate_timers()?;
        Ok(TaskInstance::from_definition(self))
    }

    fn validate_timers(&self) -> UserTaskResult<()> {
        for (index, timer) in self.timers.iter().enumerate() {
            if !timer.expiration.is_well_formed() {
                return Err(configuration_error(format!(
                    "malformed timer template {index} on definition '{}': relative expiration must be positive",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UserTaskError;
    use crate::lifecycle::TaskStatus;
    use crate::task::timers::{DeadlinePhase, TimerTemplate};
    use serde_json::json;

    #[test]
    fn test_create_instance_seeds_candidate_sets() {
        let definition = TaskDefinition::new("approve-order", "Approve order", "1")
            .with_potential_users(["alice", "bob"])
            .with_admin_users(["root"])
            .with_skippable(true);
        let strategies = StrategyRegistry::default();

        let instance = definition.create_instance(&strategies, "basic").unwrap();
        assert_eq!(instance.status(), TaskStatus::Created);
        assert_eq!(instance.definition_id(), "approve-order");
        assert!(instance.potential_users().contains("alice"));
        assert!(instance.potential_users().contains("bob"));
        assert!(instance.admin_users().contains("root"));
        assert!(instance.skippable());
        assert!(instance.actual_owner().is_none());
    }

    #[test]
    fn test_unregistered_strategy_is_a_configuration_error() {
        let definition = TaskDefinition::new("approve-order", "Approve order", "1")
            .with_assignment_strategy("round-robin");
        let strategies = StrategyRegistry::default();

        let result = definition.create_instance(&strategies, "basic");
        assert!(matches!(
            result,
            Err(UserTaskError::Configuration { .. })
        ));
    }

    #[test]
    fn test_malformed_timer_template_is_a_configuration_error() {
        let definition = TaskDefinition::new("approve-order", "Approve order", "1").with_timer(
            TimerTemplate::notification(DeadlinePhase::NotStarted, 0, json!("too late")),
        );
        let strategies = StrategyRegistry::default();

        let result = definition.create_instance(&strategies, "basic");
        assert!(matches!(
            result,
            Err(UserTaskError::Configuration { .. })
        ));
    }

    #[test]
    fn test_instances_get_distinct_ids_and_timer_ids() {
        let definition = TaskDefinition::new("approve-order", "Approve order", "1").with_timer(
            TimerTemplate::notification(DeadlinePhase::NotStarted, 60, json!("remind")),
        );
        let strategies = StrategyRegistry::default();

        let first = definition.create_instance(&strategies, "basic").unwrap();
        let second = definition.create_instance(&strategies, "basic").unwrap();
        assert_ne!(first.id(), second.id());
        assert_ne!(
            first.not_started_timers()[0].id,
            second.not_started_timers()[0].id
        );
    }
}
