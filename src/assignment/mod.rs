//! # Assignment Strategies
//!
//! Pluggable policies that compute a candidate owner for a task with no
//! forced owner, plus the name-keyed registry that task definitions select
//! them from.
//!
//! ## Overview
//!
//! A strategy is a pure function over the instance's candidate sets; it
//! proposes an owner or abstains. Strategies are registered by name and
//! resolved at task-instance-creation time; an unregistered name is a
//! configuration error, never a silent fallback.

use crate::error::{configuration_error, UserTaskResult};
use crate::identity::IdentityProvider;
use crate::task::TaskInstance;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the default strategy, always registered
pub const BASIC_STRATEGY: &str = "basic";

/// Policy computing an actual owner from the candidate sets
pub trait AssignmentStrategy: Send + Sync {
    /// Registered name of this strategy
    fn name(&self) -> &str;

    /// Propose an owner for the instance, or abstain with `None`.
    /// Implementations must only propose members of
    /// `potential_users − excluded_users`; administrator-forced assignment
    /// bypasses strategies entirely.
    fn compute_assignment(
        &self,
        instance: &TaskInstance,
        identity_provider: &dyn IdentityProvider,
    ) -> Option<String>;
}

/// Default strategy: assign only when the choice is unambiguous.
///
/// Returns the single remaining candidate when
/// `potential_users − excluded_users` has exactly one element; abstains for
/// zero or more than one.
#[derive(Debug, Default)]
pub struct BasicAssignmentStrategy;

impl AssignmentStrategy for BasicAssignmentStrategy {
    fn name(&self) -> &str {
        BASIC_STRATEGY
    }

    fn compute_assignment(
        &self,
        instance: &TaskInstance,
        _identity_provider: &dyn IdentityProvider,
    ) -> Option<String> {
        let mut candidates = instance
            .potential_users()
            .iter()
            .filter(|user| !instance.excluded_users().contains(*user));

        let first = candidates.next()?;
        if candidates.next().is_some() {
            debug!(
                task_id = %instance.id(),
                "multiple candidates remain, not auto-assigning"
            );
            return None;
        }
        Some(first.clone())
    }
}

/// Name-keyed lookup of assignment strategies.
///
/// `Default` seeds the registry with [`BasicAssignmentStrategy`].
pub struct StrategyRegistry {
    strategies: RwLock<HashMap<String, Arc<dyn AssignmentStrategy>>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let registry = Self {
            strategies: RwLock::new(HashMap::new()),
        };
        registry.register(Arc::new(BasicAssignmentStrategy));
        registry
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy under its own name, replacing any previous one.
    pub fn register(&self, strategy: Arc<dyn AssignmentStrategy>) {
        let name = strategy.name().to_string();
        self.strategies.write().insert(name.clone(), strategy);
        info!(strategy = %name, "registered assignment strategy");
    }

    /// Resolve a strategy by name; unknown names are configuration errors
    /// surfaced at task-instance-creation time.
    pub fn resolve(&self, name: &str) -> UserTaskResult<Arc<dyn AssignmentStrategy>> {
        self.strategies.read().get(name).cloned().ok_or_else(|| {
            configuration_error(format!("assignment strategy '{name}' is not registered"))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.read().contains_key(name)
    }
}
