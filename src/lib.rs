//! # usertask-core
//!
//! Core engine for human-task lifecycle management: a finite transition
//! table over task statuses, pluggable assignment strategies, typed event
//! fan-out with before/after pairs, deadline and reassignment timers driven
//! by an external scheduler, and a persistence contract built around
//! disconnect/reconnect of runtime bindings.
//!
//! ## Architecture
//!
//! - **lifecycle**: statuses, the transition table, and the stateless
//!   driver that validates status, standing and payload before mutating
//! - **task**: definitions (immutable templates), instances (the mutable
//!   aggregate), timers, and the definition registry
//! - **assignment**: strategies proposing an owner from the candidate sets
//! - **events**: per-instance listener registry and typed fan-out
//! - **store**: instance persistence with connector/disconnector hooks
//! - **scheduler**: the jobs-service contract for firing deadlines
//! - **service**: the façade tying all of it together
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use usertask_core::assignment::StrategyRegistry;
//! use usertask_core::config::EngineConfig;
//! use usertask_core::identity::{Identity, StaticIdentityProvider};
//! use usertask_core::scheduler::RecordingJobsService;
//! use usertask_core::service::TaskService;
//! use usertask_core::task::{DefinitionRegistry, TaskDefinition};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TaskService::in_memory(
//!     Arc::new(DefinitionRegistry::new()),
//!     Arc::new(StrategyRegistry::default()),
//!     Arc::new(RecordingJobsService::new()),
//!     Arc::new(StaticIdentityProvider::new(Identity::new("system"))),
//!     Vec::new(),
//!     EngineConfig::default(),
//! );
//!
//! service.register_definition(
//!     TaskDefinition::new("approve-order", "Approve order", "1")
//!         .with_potential_users(["alice", "bob"]),
//! );
//!
//! let alice = Identity::new("alice");
//! let task = service.create("approve-order", HashMap::new()).await?;
//! service.claim(task.id(), &alice).await?;
//! service.start(task.id(), &alice).await?;
//! service
//!     .complete(task.id(), Some(serde_json::json!({"approved": true})), &alice)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod assignment;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod lifecycle;
pub mod logging;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod task;

// Re-export the main API surface at the crate root
pub use config::EngineConfig;
pub use error::{UserTaskError, UserTaskResult};
pub use events::{EventPhase, UserTaskEvent, UserTaskEventListener};
pub use identity::{Identity, IdentityProvider};
pub use lifecycle::{LifeCycle, TaskStatus, Transition};
pub use service::TaskService;
pub use task::{TaskDefinition, TaskInstance};
