use serde::{Deserialize, Serialize};
use std::fmt;

/// User-task status definitions for the human-task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial status when the instance is created
    Created,
    /// Task is claimable by any potential owner
    Ready,
    /// Task has an actual owner but work has not started
    Reserved,
    /// Task is actively being worked on by its owner
    InProgress,
    /// Task is paused; resumes to its pre-suspend status
    Suspended,
    /// Task finished successfully
    Completed,
    /// Task finished with an error payload
    Failed,
    /// Task was skipped and will never run
    Obsolete,
    /// Task was force-exited by an administrator
    Exited,
}

impl TaskStatus {
    /// Check if this is a terminal status (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Obsolete | Self::Exited
        )
    }

    /// Check if this is an active status (task is being worked on)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Check if the task currently has claimable standing for potential owners
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Created | Self::Ready)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Ready => write!(f, "ready"),
            Self::Reserved => write!(f, "reserved"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Suspended => write!(f, "suspended"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Obsolete => write!(f, "obsolete"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "ready" => Ok(Self::Ready),
            "reserved" => Ok(Self::Reserved),
            "in_progress" => Ok(Self::InProgress),
            "suspended" => Ok(Self::Suspended),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "obsolete" => Ok(Self::Obsolete),
            "exited" => Ok(Self::Exited),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// Default status for new task instances
impl Default for TaskStatus {
    fn default() -> Self {
        Self::Created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Obsolete.is_terminal());
        assert!(TaskStatus::Exited.is_terminal());
        assert!(!TaskStatus::Created.is_terminal());
        assert!(!TaskStatus::Ready.is_terminal());
        assert!(!TaskStatus::Reserved.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::Suspended.is_terminal());
    }

    #[test]
    fn test_claimable_statuses() {
        assert!(TaskStatus::Created.is_claimable());
        assert!(TaskStatus::Ready.is_claimable());
        assert!(!TaskStatus::Reserved.is_claimable());
        assert!(!TaskStatus::Completed.is_claimable());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            "reserved".parse::<TaskStatus>().unwrap(),
            TaskStatus::Reserved
        );
        assert!("bogus".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let status = TaskStatus::InProgress;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let parsed: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }
}
