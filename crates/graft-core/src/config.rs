//! # Engine Configuration
//!
//! Tunables shared by the schema and task engines. Every section has a
//! default, so an empty document is a valid configuration. Unknown keys are
//! rejected to catch typos early.
//!
//! ```yaml
//! search:
//!   max_depth: 32
//! scheduler:
//!   max_depth: 64
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default depth limit for alias searches through the object tree.
pub const DEFAULT_SEARCH_DEPTH: usize = 32;

/// Default nesting limit for task trees.
pub const DEFAULT_SCHEDULER_DEPTH: usize = 64;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Limits for alias searches through the object tree. Schema chains
    /// pick these up only when built with `library::search_with`.
    pub search: SearchConfig,
    /// Limits for the task scheduler.
    pub scheduler: SchedulerConfig,
}

/// Limits for the `search` schema helper.
///
/// Schemas are plain objects with no engine handle, so the limit is fixed
/// when the chain function is built: `library::search_with(.., &config.search)`
/// applies a loaded value, while `library::search` uses the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Maximum number of hops upward or downward from the target.
    pub max_depth: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_SEARCH_DEPTH,
        }
    }
}

/// Limits for the task scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Maximum task nesting depth before a run is aborted.
    pub max_depth: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_SCHEDULER_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML configuration document.
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = if source.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(source)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a configuration from a JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the engines unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.max_depth == 0 {
            return Err(ConfigError::OutOfRange {
                key: "search.max_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scheduler.max_depth == 0 {
            return Err(ConfigError::OutOfRange {
                key: "scheduler.max_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
