pub mod support;
pub mod types;

// Re-export key types for convenience
pub use support::{
    EventSupport, IsolatingListener, ListenerError, ListenerResult, RecordingListener,
    UnitOfWorkListener, UserTaskEventListener,
};
pub use types::{EventMeta, EventPhase, UserTaskEvent, VariableScope};
