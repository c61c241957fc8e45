pub mod definition;
pub mod instance;
pub mod registry;
pub mod timers;

// Re-export main types for convenient access
pub use definition::TaskDefinition;
pub use instance::{Attachment, Comment, RuntimeBindings, TaskInstance, TaskModel};
pub use registry::DefinitionRegistry;
pub use timers::{
    DeadlinePhase, TimerExpiration, TimerKind, TimerPayload, TimerRecord, TimerTemplate,
};
