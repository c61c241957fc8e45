use super::states::TaskStatus;
use serde::{Deserialize, Serialize};

/// Transition identifiers understood by the lifecycle
pub const ACTIVATE: &str = "activate";
pub const CLAIM: &str = "claim";
pub const RELEASE: &str = "release";
pub const START: &str = "start";
pub const STOP: &str = "stop";
pub const COMPLETE: &str = "complete";
pub const FAIL: &str = "fail";
pub const SKIP: &str = "skip";
pub const SUSPEND: &str = "suspend";
pub const RESUME: &str = "resume";
pub const REASSIGN: &str = "reassign";
pub const EXIT: &str = "exit";

/// Who may request a transition. Administrators satisfy every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Only the actual owner (self-service transitions)
    Owner,
    /// Any non-excluded potential user or group member
    PotentialOwner,
    /// Administrators only (forced transitions)
    Admin,
}

/// A requested or allowed move between task statuses. Stateless value
/// object, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub source: TaskStatus,
    pub target: TaskStatus,
    pub policy: TransitionPolicy,
}

/// Target of a transition rule. `resume` restores whatever status the
/// instance held before it was suspended, so its target is dynamic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuleTarget {
    Fixed(TaskStatus),
    ResumePrevious,
}

/// One row of the transition table
#[derive(Debug, Clone, Copy)]
pub(crate) struct TransitionRule {
    pub id: &'static str,
    pub source: TaskStatus,
    pub target: RuleTarget,
    pub policy: TransitionPolicy,
}

/// The directed transition table for the user-task lifecycle:
/// `Created → Ready → Reserved → InProgress → {Completed | Failed |
/// Obsolete | Exited}`, with `Suspended` reachable from `Reserved` and
/// `InProgress`.
pub(crate) const TRANSITION_TABLE: &[TransitionRule] = &[
    TransitionRule {
        id: ACTIVATE,
        source: TaskStatus::Created,
        target: RuleTarget::Fixed(TaskStatus::Ready),
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: CLAIM,
        source: TaskStatus::Created,
        target: RuleTarget::Fixed(TaskStatus::Reserved),
        policy: TransitionPolicy::PotentialOwner,
    },
    TransitionRule {
        id: CLAIM,
        source: TaskStatus::Ready,
        target: RuleTarget::Fixed(TaskStatus::Reserved),
        policy: TransitionPolicy::PotentialOwner,
    },
    TransitionRule {
        id: RELEASE,
        source: TaskStatus::Reserved,
        target: RuleTarget::Fixed(TaskStatus::Ready),
        policy: TransitionPolicy::Owner,
    },
    TransitionRule {
        id: START,
        source: TaskStatus::Ready,
        target: RuleTarget::Fixed(TaskStatus::InProgress),
        policy: TransitionPolicy::PotentialOwner,
    },
    TransitionRule {
        id: START,
        source: TaskStatus::Reserved,
        target: RuleTarget::Fixed(TaskStatus::InProgress),
        policy: TransitionPolicy::Owner,
    },
    TransitionRule {
        id: STOP,
        source: TaskStatus::InProgress,
        target: RuleTarget::Fixed(TaskStatus::Reserved),
        policy: TransitionPolicy::Owner,
    },
    TransitionRule {
        id: COMPLETE,
        source: TaskStatus::InProgress,
        target: RuleTarget::Fixed(TaskStatus::Completed),
        policy: TransitionPolicy::Owner,
    },
    TransitionRule {
        id: FAIL,
        source: TaskStatus::InProgress,
        target: RuleTarget::Fixed(TaskStatus::Failed),
        policy: TransitionPolicy::Owner,
    },
    // Skip is only legal when the definition marked the task skippable;
    // the lifecycle checks that flag before honoring these rows.
    TransitionRule {
        id: SKIP,
        source: TaskStatus::Created,
        target: RuleTarget::Fixed(TaskStatus::Obsolete),
        policy: TransitionPolicy::PotentialOwner,
    },
    TransitionRule {
        id: SKIP,
        source: TaskStatus::Ready,
        target: RuleTarget::Fixed(TaskStatus::Obsolete),
        policy: TransitionPolicy::PotentialOwner,
    },
    TransitionRule {
        id: SKIP,
        source: TaskStatus::Reserved,
        target: RuleTarget::Fixed(TaskStatus::Obsolete),
        policy: TransitionPolicy::Owner,
    },
    TransitionRule {
        id: SKIP,
        source: TaskStatus::InProgress,
        target: RuleTarget::Fixed(TaskStatus::Obsolete),
        policy: TransitionPolicy::Owner,
    },
    TransitionRule {
        id: SUSPEND,
        source: TaskStatus::Reserved,
        target: RuleTarget::Fixed(TaskStatus::Suspended),
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: SUSPEND,
        source: TaskStatus::InProgress,
        target: RuleTarget::Fixed(TaskStatus::Suspended),
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: RESUME,
        source: TaskStatus::Suspended,
        target: RuleTarget::ResumePrevious,
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: REASSIGN,
        source: TaskStatus::Ready,
        target: RuleTarget::Fixed(TaskStatus::Ready),
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: REASSIGN,
        source: TaskStatus::Reserved,
        target: RuleTarget::Fixed(TaskStatus::Ready),
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: EXIT,
        source: TaskStatus::Created,
        target: RuleTarget::Fixed(TaskStatus::Exited),
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: EXIT,
        source: TaskStatus::Ready,
        target: RuleTarget::Fixed(TaskStatus::Exited),
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: EXIT,
        source: TaskStatus::Reserved,
        target: RuleTarget::Fixed(TaskStatus::Exited),
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: EXIT,
        source: TaskStatus::InProgress,
        target: RuleTarget::Fixed(TaskStatus::Exited),
        policy: TransitionPolicy::Admin,
    },
    TransitionRule {
        id: EXIT,
        source: TaskStatus::Suspended,
        target: RuleTarget::Fixed(TaskStatus::Exited),
        policy: TransitionPolicy::Admin,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sources_are_never_terminal() {
        for rule in TRANSITION_TABLE {
            assert!(
                !rule.source.is_terminal(),
                "rule '{}' starts from terminal status {}",
                rule.id,
                rule.source
            );
        }
    }

    #[test]
    fn test_forced_transitions_are_admin_only() {
        for rule in TRANSITION_TABLE {
            if rule.id == EXIT || rule.id == SUSPEND || rule.id == RESUME || rule.id == REASSIGN {
                assert_eq!(rule.policy, TransitionPolicy::Admin, "rule '{}'", rule.id);
            }
        }
    }

    #[test]
    fn test_resume_is_the_only_dynamic_target() {
        for rule in TRANSITION_TABLE {
            if rule.id == RESUME {
                assert_eq!(rule.target, RuleTarget::ResumePrevious);
            } else {
                assert!(matches!(rule.target, RuleTarget::Fixed(_)));
            }
        }
    }
}
