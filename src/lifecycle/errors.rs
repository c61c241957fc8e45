use super::states::TaskStatus;
use crate::events::ListenerError;
use thiserror::Error;

/// Error types for lifecycle transition validation and execution
#[derive(Error, Debug)]
pub enum LifeCycleError {
    #[error("invalid transition '{transition}' from status '{from}'")]
    InvalidTransition { transition: String, from: TaskStatus },

    #[error("user '{user}' is not authorized to perform '{transition}'")]
    Unauthorized { user: String, transition: String },

    #[error("transition '{transition}' requires data field '{field}'")]
    MissingData { transition: String, field: String },

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Result type alias for lifecycle operations
pub type LifeCycleResult<T> = Result<T, LifeCycleError>;

/// Helper to create invalid-transition errors
pub fn invalid_transition(transition: impl Into<String>, from: TaskStatus) -> LifeCycleError {
    LifeCycleError::InvalidTransition {
        transition: transition.into(),
        from,
    }
}

/// Helper to create unauthorized errors
pub fn unauthorized(user: impl Into<String>, transition: impl Into<String>) -> LifeCycleError {
    LifeCycleError::Unauthorized {
        user: user.into(),
        transition: transition.into(),
    }
}

/// Helper to create missing-data errors
pub fn missing_data(transition: impl Into<String>, field: impl Into<String>) -> LifeCycleError {
    LifeCycleError::MissingData {
        transition: transition.into(),
        field: field.into(),
    }
}
