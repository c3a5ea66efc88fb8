//! # Unified Configuration System
//!
//! Configuration for the frame scheduler and the application that hosts it.
//! Both structures are serializable and can be loaded from TOML or RON via
//! the [`Config`] trait.
//!
//! ## Recognized options
//!
//! - `fixed_delta_time`: seconds per fixed step (default 1/50)
//! - `target_frame_rate`: pacing hint for the host driver (default 60)
//! - `max_fixed_steps_per_frame`: catch-up cap (default 5)
//! - `initial_pool_capacity`: pre-warm size for entity pools, overridable per
//!   pool name through `pool_capacities`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::foundation::collections::EntityId;

pub use crate::config::{Config, ConfigError};

/// Errors raised while validating configuration or assembling an entity.
///
/// These are fatal for the thing being created: an entity whose assembly
/// fails never reaches the `Active` state.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Fixed delta must be a positive finite number of seconds
    #[error("fixed delta time must be positive and finite, got {0}")]
    InvalidFixedDelta(f32),

    /// At least one fixed step per frame must be allowed
    #[error("max fixed steps per frame must be at least 1")]
    ZeroStepCap,

    /// A component declared a sibling dependency that the entity lacks
    #[error("component `{component}` on entity {entity:?} requires missing sibling `{dependency}`")]
    MissingDependency {
        /// Entity being assembled
        entity: EntityId,
        /// Component that declared the dependency
        component: &'static str,
        /// Type name of the missing sibling
        dependency: &'static str,
    },

    /// A component's awake hook rejected its configuration
    #[error("component `{component}` on entity {entity:?} failed to awaken: {reason}")]
    AwakeFailed {
        /// Entity being assembled
        entity: EntityId,
        /// Component whose awake hook failed
        component: &'static str,
        /// Failure reported by the hook
        reason: String,
    },

    /// Two entity pools were registered under one name
    #[error("entity pool `{0}` is already registered")]
    DuplicatePool(String),
}

/// # Scheduler Configuration
///
/// Cadence and sizing parameters for the frame scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds simulated by one fixed step
    pub fixed_delta_time: f32,
    /// Frame rate the host driver paces to (0 = uncapped)
    pub target_frame_rate: u32,
    /// Upper bound on fixed steps run in one frame
    pub max_fixed_steps_per_frame: u32,
    /// Default number of instances pre-warmed into each entity pool
    pub initial_pool_capacity: usize,
    /// Per-pool overrides of `initial_pool_capacity`, keyed by pool name
    pub pool_capacities: BTreeMap<String, usize>,
}

impl SchedulerConfig {
    /// Create a configuration with the default cadence
    pub fn new() -> Self {
        Self {
            fixed_delta_time: 1.0 / 50.0,
            target_frame_rate: 60,
            max_fixed_steps_per_frame: 5,
            initial_pool_capacity: 0,
            pool_capacities: BTreeMap::new(),
        }
    }

    /// Set the fixed step duration in seconds
    pub fn with_fixed_delta_time(mut self, seconds: f32) -> Self {
        self.fixed_delta_time = seconds;
        self
    }

    /// Set the target frame rate hint
    pub fn with_target_frame_rate(mut self, fps: u32) -> Self {
        self.target_frame_rate = fps;
        self
    }

    /// Set the catch-up cap
    pub fn with_max_fixed_steps(mut self, steps: u32) -> Self {
        self.max_fixed_steps_per_frame = steps;
        self
    }

    /// Set the default pool pre-warm size
    pub fn with_initial_pool_capacity(mut self, capacity: usize) -> Self {
        self.initial_pool_capacity = capacity;
        self
    }

    /// Override the pre-warm size of one named pool
    pub fn with_pool_capacity(mut self, pool: impl Into<String>, capacity: usize) -> Self {
        self.pool_capacities.insert(pool.into(), capacity);
        self
    }

    /// Pre-warm size for the named pool
    pub fn pool_capacity(&self, pool: &str) -> usize {
        self.pool_capacities
            .get(pool)
            .copied()
            .unwrap_or(self.initial_pool_capacity)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.fixed_delta_time.is_finite() || self.fixed_delta_time <= 0.0 {
            return Err(ConfigurationError::InvalidFixedDelta(self.fixed_delta_time));
        }
        if self.max_fixed_steps_per_frame == 0 {
            return Err(ConfigurationError::ZeroStepCap);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for SchedulerConfig {}

/// # Complete Application Configuration
///
/// Top-level configuration an application hands to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name used in log output
    pub name: String,
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Scheduler configuration
    pub scheduler: SchedulerConfig,
}

impl ApplicationConfig {
    /// Create a new application configuration with defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log_level: "info".to_string(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the scheduler configuration
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.scheduler.validate()
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self::new("Frame Engine Application")
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_relative_eq!(config.fixed_delta_time, 0.02);
        assert_eq!(config.target_frame_rate, 60);
        assert_eq!(config.max_fixed_steps_per_frame, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_fixed_delta_rejected() {
        let config = SchedulerConfig::new().with_fixed_delta_time(0.0);
        assert_eq!(config.validate(), Err(ConfigurationError::InvalidFixedDelta(0.0)));

        let config = SchedulerConfig::new().with_fixed_delta_time(-0.01);
        assert!(matches!(config.validate(), Err(ConfigurationError::InvalidFixedDelta(_))));

        let config = SchedulerConfig::new().with_fixed_delta_time(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_step_cap_rejected() {
        let config = SchedulerConfig::new().with_max_fixed_steps(0);
        assert_eq!(config.validate(), Err(ConfigurationError::ZeroStepCap));
    }

    #[test]
    fn test_pool_capacity_override() {
        let config = SchedulerConfig::new()
            .with_initial_pool_capacity(4)
            .with_pool_capacity("bullets", 64);
        assert_eq!(config.pool_capacity("bullets"), 64);
        assert_eq!(config.pool_capacity("sparks"), 4);
    }

    #[test]
    fn test_parse_toml_with_partial_keys() {
        let text = r#"
            name = "demo"
            [scheduler]
            fixed_delta_time = 0.01
            max_fixed_steps_per_frame = 8
            [scheduler.pool_capacities]
            bullets = 32
        "#;
        let config = ApplicationConfig::parse(text, ConfigFormat::Toml).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.log_level, "info");
        assert_relative_eq!(config.scheduler.fixed_delta_time, 0.01);
        assert_eq!(config.scheduler.max_fixed_steps_per_frame, 8);
        assert_eq!(config.scheduler.target_frame_rate, 60);
        assert_eq!(config.scheduler.pool_capacity("bullets"), 32);
    }

    #[test]
    fn test_parse_ron() {
        let text = "(log_level: \"debug\", scheduler: (target_frame_rate: 144))";
        let config = ApplicationConfig::parse(text, ConfigFormat::Ron).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.scheduler.target_frame_rate, 144);
        assert_relative_eq!(config.scheduler.fixed_delta_time, 0.02);
    }
}
