//! # Core Engine Module
//!
//! Shared configuration types and the configuration error taxonomy used by
//! every subsystem.
//!
//! ## Organization
//!
//! - **Config**: scheduler cadence, pool sizing and application settings

pub mod config;

pub use config::{ApplicationConfig, ConfigurationError, SchedulerConfig};
