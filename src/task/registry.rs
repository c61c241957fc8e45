//! # Definition Registry
//!
//! Name-keyed registry of loaded task definitions. The registry is what
//! store connectors consult to restore a reconnected instance's definition
//! reference, so it must outlive every store handing out instances.

use super::definition::TaskDefinition;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Shared lookup of immutable task definitions by id
#[derive(Default)]
pub struct DefinitionRegistry {
    definitions: RwLock<HashMap<String, Arc<TaskDefinition>>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous version under the
    /// same id. Returns the shared handle.
    pub fn register(&self, definition: TaskDefinition) -> Arc<TaskDefinition> {
        let id = definition.id.clone();
        let shared = Arc::new(definition);
        self.definitions.write().insert(id.clone(), Arc::clone(&shared));
        info!(definition_id = %id, "registered task definition");
        shared
    }

    pub fn get(&self, definition_id: &str) -> Option<Arc<TaskDefinition>> {
        self.definitions.read().get(definition_id).cloned()
    }

    pub fn contains(&self, definition_id: &str) -> bool {
        self.definitions.read().contains_key(definition_id)
    }

    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = DefinitionRegistry::new();
        assert!(registry.is_empty());

        registry.register(TaskDefinition::new("approve-order", "Approve order", "1"));
        assert!(registry.contains("approve-order"));
        assert_eq!(registry.len(), 1);

        let definition = registry.get("approve-order").unwrap();
        assert_eq!(definition.name, "Approve order");
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = DefinitionRegistry::new();
        registry.register(TaskDefinition::new("approve-order", "Approve order", "1"));
        registry.register(TaskDefinition::new("approve-order", "Approve order", "2"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("approve-order").unwrap().version, "2");
    }
}
