//! # Engine Configuration
//!
//! Explicit, validated configuration for the user-task engine. No silent
//! fallbacks: an invalid configuration fails at construction time, before
//! any task instance exists.

use crate::error::{configuration_error, UserTaskResult};
use crate::assignment::BASIC_STRATEGY;
use serde::{Deserialize, Serialize};

/// Engine-level knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deployment environment, used for log-level selection
    pub environment: String,
    /// Strategy applied when a definition names none
    pub default_assignment_strategy: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: detect_environment(),
            default_assignment_strategy: BASIC_STRATEGY.to_string(),
        }
    }
}

impl EngineConfig {
    /// Build from the process environment and validate.
    /// `USERTASK_DEFAULT_STRATEGY` overrides the default assignment
    /// strategy name.
    pub fn from_env() -> UserTaskResult<Self> {
        let mut config = Self::default();
        if let Ok(strategy) = std::env::var("USERTASK_DEFAULT_STRATEGY") {
            config.default_assignment_strategy = strategy;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> UserTaskResult<()> {
        if self.default_assignment_strategy.trim().is_empty() {
            return Err(configuration_error(
                "default_assignment_strategy must not be empty",
            ));
        }
        if self.environment.trim().is_empty() {
            return Err(configuration_error("environment must not be empty"));
        }
        Ok(())
    }
}

/// Detect the current environment from environment variables
pub fn detect_environment() -> String {
    std::env::var("USERTASK_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_assignment_strategy, BASIC_STRATEGY);
    }

    #[test]
    fn test_empty_strategy_name_is_rejected() {
        let config = EngineConfig {
            environment: "test".to_string(),
            default_assignment_strategy: "  ".to_string(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_honors_strategy_override() {
        // One test owns this variable to avoid races between parallel tests.
        std::env::set_var("USERTASK_DEFAULT_STRATEGY", "round-robin");
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.default_assignment_strategy, "round-robin");

        std::env::set_var("USERTASK_DEFAULT_STRATEGY", "   ");
        assert!(EngineConfig::from_env().is_err());

        std::env::remove_var("USERTASK_DEFAULT_STRATEGY");
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.default_assignment_strategy, BASIC_STRATEGY);
    }

    #[test]
    fn test_config_deserializes_from_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"environment": "production", "default_assignment_strategy": "basic"}"#,
        )
        .unwrap();
        assert_eq!(config.environment, "production");
        assert!(config.validate().is_ok());
    }
}
